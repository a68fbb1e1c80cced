//! Usage data access over the graph and blob channels

use super::blob::{BlobStore, Channel, MemoryBlobStore, SqliteBlobStore};
use super::codec::{decode, encode};
use super::graph::GraphDb;
use super::types::{
    Direction, Label, NodeId, NodeProps, OpenStore, RelType, Relationship, StorageError, StorageResult,
};
use crate::config::StoreConfig;
use crate::model::{NameUsage, NameUsageIssue, NubUsage, UsageExtensions, UsageMetrics, VerbatimUsage};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// File locations of a persistent dao
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaoPaths {
    pub graph: PathBuf,
    pub kvp: PathBuf,
}

/// Read/write access to usages of one dataset graph.
///
/// Topology and the indexed properties live in the [`GraphDb`], full
/// usage records, verbatim snapshots, extensions and metrics live in a
/// [`BlobStore`] keyed by node.
pub struct UsageDao {
    graph: GraphDb,
    blobs: Box<dyn BlobStore>,
    paths: Option<DaoPaths>,
    batch_size: usize,
}

impl UsageDao {
    /// An in-memory dao for a single run.
    pub fn temporary(batch_size: usize) -> StorageResult<Self> {
        Ok(Self {
            graph: GraphDb::open_in_memory()?,
            blobs: Box::new(MemoryBlobStore::new()),
            paths: None,
            batch_size: batch_size.max(1),
        })
    }

    /// A disk dao under the configured repository, optionally erasing any
    /// previous content of the dataset.
    pub fn persistent(cfg: &StoreConfig, dataset: &Uuid, erase: bool) -> StorageResult<Self> {
        let paths = DaoPaths {
            graph: cfg.graph_path(dataset),
            kvp: cfg.kvp_path(dataset),
        };
        if erase {
            let dir = cfg.dataset_dir(dataset);
            if dir.exists() {
                info!(dataset = %dataset, dir = %dir.display(), "Erasing existing dataset graph");
                std::fs::remove_dir_all(&dir)?;
            }
            remove_sqlite_files(&paths.kvp)?;
        }
        Ok(Self {
            graph: GraphDb::open(&paths.graph)?,
            blobs: Box::new(SqliteBlobStore::open(&paths.kvp)?),
            paths: Some(paths),
            batch_size: cfg.batch_size.max(1),
        })
    }

    pub fn graph(&self) -> &GraphDb {
        &self.graph
    }

    pub fn paths(&self) -> Option<&DaoPaths> {
        self.paths.as_ref()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    // === Batches ===

    pub fn begin(&self) -> StorageResult<()> {
        self.graph.begin()?;
        self.blobs.begin()
    }

    pub fn commit(&self) -> StorageResult<()> {
        self.graph.commit()?;
        self.blobs.commit()
    }

    /// Starts a batch and returns a cursor that commits every `batch_size` ticks.
    pub fn cursor(&self) -> StorageResult<BatchCursor<'_>> {
        self.begin()?;
        Ok(BatchCursor {
            dao: self,
            pending: 0,
            committed: 0,
        })
    }

    // === Nodes & relations ===

    pub fn create_node(&self) -> StorageResult<NodeId> {
        self.graph.create_node()
    }

    /// Creates a taxon node and stores the usage on it.
    pub fn create_usage(&self, usage: &NameUsage) -> StorageResult<NodeId> {
        let node = self.graph.create_node()?;
        self.graph.add_label(node, Label::Taxon)?;
        self.store_usage(node, usage)?;
        Ok(node)
    }

    pub fn add_edge(&self, start: NodeId, end: NodeId, rel_type: RelType) -> StorageResult<Relationship> {
        self.graph.add_edge(start, end, rel_type)
    }

    pub fn delete_edges(&self, node: NodeId, rel_type: RelType, dir: Direction) -> StorageResult<usize> {
        self.graph.delete_edges(node, Some(rel_type), dir)
    }

    pub fn all_nodes(&self) -> StorageResult<Vec<NodeId>> {
        self.graph.all_nodes()
    }

    pub fn root_nodes(&self) -> StorageResult<Vec<NodeId>> {
        self.graph.nodes_with_label(Label::Root)
    }

    pub fn nodes_with_label(&self, label: Label) -> StorageResult<Vec<NodeId>> {
        self.graph.nodes_with_label(label)
    }

    // === Usages ===

    /// Stores the usage payload and syncs the indexed properties and the
    /// synonym label with it.
    pub fn store_usage(&self, node: NodeId, usage: &NameUsage) -> StorageResult<()> {
        self.graph.set_props(
            node,
            &NodeProps {
                taxon_id: usage.taxon_id.clone(),
                scientific_name: usage.scientific_name.clone(),
                canonical_name: usage.canonical_name.clone(),
                rank: usage.rank,
            },
        )?;
        if usage.synonym {
            self.graph.add_label(node, Label::Synonym)?;
        } else {
            self.graph.remove_label(node, Label::Synonym)?;
        }
        self.put(Channel::Usages, node, usage)
    }

    /// Reads a usage, with `key` set to the node and the synonym flag taken
    /// from the graph. With `read_relations` the accepted, parent and
    /// basionym references are filled in from the relationships.
    pub fn read_usage(&self, node: NodeId, read_relations: bool) -> StorageResult<Option<NameUsage>> {
        let Some(mut usage) = self.get::<NameUsage>(Channel::Usages, node)? else {
            return Ok(None);
        };
        usage.key = Some(node.get());
        usage.synonym = self.graph.has_label(node, Label::Synonym)?;
        if read_relations {
            self.read_relations(node, &mut usage)?;
        }
        Ok(Some(usage))
    }

    /// Like [`UsageDao::read_usage`] but a missing usage is an error.
    pub fn require_usage(&self, node: NodeId) -> StorageResult<NameUsage> {
        self.read_usage(node, false)?.ok_or(StorageError::NodeNotFound(node))
    }

    /// Reads, modifies and stores a usage in one step.
    pub fn update_usage(&self, node: NodeId, update: impl FnOnce(&mut NameUsage)) -> StorageResult<()> {
        let mut usage = self.require_usage(node)?;
        update(&mut usage);
        self.store_usage(node, &usage)
    }

    fn read_relations(&self, node: NodeId, usage: &mut NameUsage) -> StorageResult<()> {
        let basionyms = self.graph.neighbours(node, RelType::BasionymOf, Direction::Incoming)?;
        match basionyms.as_slice() {
            [] => {}
            [b] => {
                usage.basionym_key = Some(b.get());
                usage.basionym = self.scientific_name(*b)?;
            }
            _ => {
                usage.add_issue(NameUsageIssue::RelationshipMissing);
                usage.add_remark("Multiple original name relations");
            }
        }

        let accepted = self.graph.neighbours(node, RelType::SynonymOf, Direction::Outgoing)?;
        match accepted.as_slice() {
            [] => {}
            [a] => {
                usage.accepted_key = Some(a.get());
                usage.accepted = self.scientific_name(*a)?;
            }
            _ => {
                usage.add_issue(NameUsageIssue::RelationshipMissing);
                usage.add_remark("Multiple accepted name relations");
            }
        }

        // synonyms take the parent of their accepted usage
        let classified = match usage.accepted_key {
            Some(a) => NodeId::new(a),
            None => node,
        };
        let parents = self.graph.neighbours(classified, RelType::ParentOf, Direction::Incoming)?;
        match parents.as_slice() {
            [] => {}
            [p] => {
                usage.parent_key = Some(p.get());
                usage.parent = self.scientific_name(*p)?;
            }
            _ => {
                usage.add_issue(NameUsageIssue::RelationshipMissing);
                usage.add_remark("Multiple parent relations");
            }
        }
        Ok(())
    }

    fn scientific_name(&self, node: NodeId) -> StorageResult<Option<String>> {
        Ok(self.graph.props(node)?.and_then(|p| p.scientific_name))
    }

    // === Other payloads ===

    pub fn store_verbatim(&self, node: NodeId, verbatim: &VerbatimUsage) -> StorageResult<()> {
        self.put(Channel::Verbatim, node, verbatim)
    }

    pub fn read_verbatim(&self, node: NodeId) -> StorageResult<Option<VerbatimUsage>> {
        self.get(Channel::Verbatim, node)
    }

    pub fn store_extensions(&self, node: NodeId, extensions: &UsageExtensions) -> StorageResult<()> {
        self.put(Channel::Extensions, node, extensions)
    }

    pub fn read_extensions(&self, node: NodeId) -> StorageResult<Option<UsageExtensions>> {
        self.get(Channel::Extensions, node)
    }

    pub fn store_metrics(&self, node: NodeId, metrics: &UsageMetrics) -> StorageResult<()> {
        self.put(Channel::Facts, node, metrics)
    }

    pub fn read_metrics(&self, node: NodeId) -> StorageResult<Option<UsageMetrics>> {
        self.get(Channel::Facts, node)
    }

    pub fn store_nub(&self, node: NodeId, nub: &NubUsage) -> StorageResult<()> {
        self.put(Channel::Nub, node, nub)
    }

    /// Reads a backbone usage with its `node` set.
    pub fn read_nub(&self, node: NodeId) -> StorageResult<Option<NubUsage>> {
        Ok(self.get::<NubUsage>(Channel::Nub, node)?.map(|mut nub| {
            nub.node = Some(node);
            nub
        }))
    }

    /// Number of stored usage payloads.
    pub fn count_usages(&self) -> StorageResult<usize> {
        self.blobs.len(Channel::Usages)
    }

    fn put<T: Serialize>(&self, channel: Channel, node: NodeId, value: &T) -> StorageResult<()> {
        self.blobs.put(channel, node, &encode(value)?)
    }

    fn get<T: DeserializeOwned>(&self, channel: Channel, node: NodeId) -> StorageResult<Option<T>> {
        match self.blobs.get(channel, node)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn remove_sqlite_files(path: &Path) -> StorageResult<()> {
    let mut wal = path.as_os_str().to_owned();
    wal.push("-wal");
    let mut shm = path.as_os_str().to_owned();
    shm.push("-shm");
    for file in [path.to_path_buf(), PathBuf::from(wal), PathBuf::from(shm)] {
        if file.exists() {
            std::fs::remove_file(&file)?;
        }
    }
    Ok(())
}

/// Commits every `batch_size` ticks.
///
/// Everything before the last commit is durable, a failed run resumes from
/// there.
pub struct BatchCursor<'a> {
    dao: &'a UsageDao,
    pending: usize,
    committed: usize,
}

impl BatchCursor<'_> {
    /// Counts one unit of work. Returns true if a batch was committed.
    pub fn tick(&mut self) -> StorageResult<bool> {
        self.pending += 1;
        if self.pending < self.dao.batch_size {
            return Ok(false);
        }
        self.dao.commit()?;
        self.committed += self.pending;
        self.pending = 0;
        debug!(committed = self.committed, "Batch committed");
        self.dao.begin()?;
        Ok(true)
    }

    /// Units of work committed so far
    pub fn committed(&self) -> usize {
        self.committed
    }

    /// Units of work counted so far
    pub fn processed(&self) -> usize {
        self.committed + self.pending
    }

    /// Commits the last partial batch.
    pub fn finish(mut self) -> StorageResult<usize> {
        self.dao.commit()?;
        self.committed += self.pending;
        self.pending = 0;
        Ok(self.committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Rank, TaxonomicStatus, Term};
    use tempfile::tempdir;

    fn create_test_dao() -> UsageDao {
        UsageDao::temporary(2).unwrap()
    }

    fn usage(id: &str, name: &str) -> NameUsage {
        NameUsage::new()
            .with_taxon_id(id)
            .with_scientific_name(name)
            .with_canonical_name(name)
            .with_rank(Rank::Species)
    }

    // ========================================================================
    // Usage round trip
    // ========================================================================

    #[test]
    fn test_usage_round_trip_keeps_empty_strings() {
        let dao = create_test_dao();
        let mut u = usage("1", "Abies alba");
        u.published_in = Some(String::new());
        let n = dao.create_usage(&u).unwrap();

        let mut read = dao.read_usage(n, false).unwrap().unwrap();
        assert_eq!(read.key, Some(n.get()));
        assert_eq!(read.published_in.as_deref(), Some(""));
        assert_eq!(read.according_to, None);
        read.key = None;
        assert_eq!(read, u);
    }

    #[test]
    fn test_store_usage_syncs_synonym_label() {
        let dao = create_test_dao();
        let u = usage("1", "Abies alba").with_status(TaxonomicStatus::Synonym);
        let n = dao.create_usage(&u).unwrap();
        assert!(dao.graph().has_label(n, Label::Synonym).unwrap());

        dao.update_usage(n, |u| u.set_status(TaxonomicStatus::Accepted)).unwrap();
        assert!(!dao.graph().has_label(n, Label::Synonym).unwrap());
        assert!(!dao.require_usage(n).unwrap().synonym);
    }

    #[test]
    fn test_missing_usage() {
        let dao = create_test_dao();
        let n = dao.create_node().unwrap();
        assert!(dao.read_usage(n, true).unwrap().is_none());
        assert!(matches!(dao.require_usage(n), Err(StorageError::NodeNotFound(_))));
    }

    // ========================================================================
    // Relations
    // ========================================================================

    #[test]
    fn test_read_relations() {
        let dao = create_test_dao();
        let genus = dao.create_usage(&usage("g", "Abies")).unwrap();
        let acc = dao.create_usage(&usage("a", "Abies alba")).unwrap();
        let syn = dao
            .create_usage(&usage("s", "Picea alba").with_status(TaxonomicStatus::Synonym))
            .unwrap();
        let bas = dao.create_usage(&usage("b", "Pinus alba")).unwrap();
        dao.add_edge(genus, acc, RelType::ParentOf).unwrap();
        dao.add_edge(syn, acc, RelType::SynonymOf).unwrap();
        dao.add_edge(bas, acc, RelType::BasionymOf).unwrap();

        let a = dao.read_usage(acc, true).unwrap().unwrap();
        assert_eq!(a.parent_key, Some(genus.get()));
        assert_eq!(a.parent.as_deref(), Some("Abies"));
        assert_eq!(a.basionym.as_deref(), Some("Pinus alba"));

        let s = dao.read_usage(syn, true).unwrap().unwrap();
        assert_eq!(s.accepted_key, Some(acc.get()));
        assert_eq!(s.parent_key, Some(genus.get()));
    }

    #[test]
    fn test_multiple_parents_flag_relationship_missing() {
        let dao = create_test_dao();
        let p1 = dao.create_usage(&usage("p1", "Abies")).unwrap();
        let p2 = dao.create_usage(&usage("p2", "Picea")).unwrap();
        let c = dao.create_usage(&usage("c", "Abies alba")).unwrap();
        dao.add_edge(p1, c, RelType::ParentOf).unwrap();
        dao.add_edge(p2, c, RelType::ParentOf).unwrap();

        let u = dao.read_usage(c, true).unwrap().unwrap();
        assert!(u.has_issue(NameUsageIssue::RelationshipMissing));
        assert_eq!(u.parent_key, None);
        assert_eq!(u.remarks.as_deref(), Some("Multiple parent relations"));
    }

    // ========================================================================
    // Batches & persistence
    // ========================================================================

    #[test]
    fn test_cursor_commits_in_batches() {
        let dao = create_test_dao();
        let mut cursor = dao.cursor().unwrap();
        let mut commits = 0;
        for i in 0..5 {
            dao.create_usage(&usage(&i.to_string(), "Abies alba")).unwrap();
            if cursor.tick().unwrap() {
                commits += 1;
            }
        }
        assert_eq!(commits, 2);
        assert_eq!(cursor.committed(), 4);
        assert_eq!(cursor.finish().unwrap(), 5);
        assert_eq!(dao.count_usages().unwrap(), 5);
    }

    #[test]
    fn test_persistent_dao_reopen_and_erase() {
        let dir = tempdir().unwrap();
        let cfg = StoreConfig::default().with_repository(dir.path());
        let key = Uuid::new_v4();
        let node = {
            let dao = UsageDao::persistent(&cfg, &key, true).unwrap();
            let n = dao.create_usage(&usage("1", "Abies alba")).unwrap();
            let mut v = VerbatimUsage::new();
            v.set_core_field(Term::TaxonId, Some("1".into()));
            dao.store_verbatim(n, &v).unwrap();
            n
        };

        let dao = UsageDao::persistent(&cfg, &key, false).unwrap();
        assert_eq!(dao.paths().unwrap().graph, cfg.graph_path(&key));
        assert!(dao.read_usage(node, false).unwrap().is_some());
        assert_eq!(dao.read_verbatim(node).unwrap().unwrap().core_field(Term::TaxonId), Some("1"));
        drop(dao);

        let dao = UsageDao::persistent(&cfg, &key, true).unwrap();
        assert_eq!(dao.graph().count_nodes().unwrap(), 0);
        assert_eq!(dao.count_usages().unwrap(), 0);
    }
}
