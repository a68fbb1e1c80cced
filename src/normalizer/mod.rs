//! Turns a checklist archive into a consistent usage graph
//!
//! A run has four phases, each committing in batches:
//!
//! 1. insert: one node per usable core record, stored in bulk mode
//! 2. relations: accepted, parent and basionym references resolved into
//!    edges, with placeholders for dangling or ambiguous references
//! 3. denormalized classification: flat higher-rank columns linked into
//!    parent chains
//! 4. cleanup: synonym cycles cut, synonym chains collapsed, parent
//!    edges moved off synonyms and classification loops broken
//!
//! Finally a walk over the accepted tree stores usage metrics and builds
//! the [`NormalizerStats`].

mod cleanup;
mod denormed;
mod inserter;
mod metadata;
mod relations;
mod stats;

pub use inserter::clean;
pub use metadata::InsertMetadata;
pub use relations::split_by_common_delimiters;
pub use stats::NormalizerStats;

use crate::archive::{Archive, ArchiveError, DwcaDirectory};
use crate::config::Config;
use crate::model::{NameUsage, NameUsageIssue, Origin, Rank, TaxonomicStatus, Term, VerbatimUsage};
use crate::parsers::{BasicNameParser, NameParser};
use crate::storage::{Direction, Label, NodeId, NodeProperty, RelType, StorageError, StorageResult, UsageDao};
use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Failures that abort a normalization run
#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Name parser setup failed: {0}")]
    Parser(#[from] regex_lite::Error),
}

pub type NormalizationResult<T> = Result<T, NormalizationError>;

/// Normalizes archives into the graph of a [`UsageDao`].
///
/// The dao must be fresh: the insert phase puts its graph into bulk mode,
/// which is possible once per store.
pub struct Normalizer<'a> {
    dao: &'a UsageDao,
    parser: Box<dyn NameParser>,
    constituents: HashMap<String, Uuid>,
}

impl<'a> Normalizer<'a> {
    pub fn new(dao: &'a UsageDao, parser: Box<dyn NameParser>) -> Self {
        Self {
            dao,
            parser,
            constituents: HashMap::new(),
        }
    }

    pub fn with_default_parser(dao: &'a UsageDao) -> NormalizationResult<Self> {
        Ok(Self::new(dao, Box::new(BasicNameParser::new()?)))
    }

    /// Maps `datasetID` values of the archive to constituent dataset keys.
    pub fn with_constituents(mut self, constituents: HashMap<String, Uuid>) -> Self {
        self.constituents = constituents;
        self
    }

    pub fn run(&self, archive: &dyn Archive) -> NormalizationResult<NormalizerStats> {
        let started = Utc::now();
        info!("Start normalization");
        let meta = inserter::Inserter::new(self.dao, self.parser.as_ref(), &self.constituents).insert(archive)?;

        relations::RelationResolver::new(self.dao, &meta).run()?;
        denormed::apply(self.dao, &meta)?;
        let cycles = cleanup::cleanup(self.dao)?;

        let stats = stats::build(self.dao, &meta, cycles, started)?;
        info!(
            records = stats.records,
            ignored = stats.ignored,
            synonyms = stats.synonyms,
            roots = stats.roots,
            "Normalization succeeded"
        );
        Ok(stats)
    }
}

/// Normalizes the archive of a dataset from the configured archive
/// repository into a freshly erased persistent graph.
pub fn normalize_dataset(cfg: &Config, dataset: &Uuid) -> NormalizationResult<NormalizerStats> {
    let dir = cfg.archive_dir(dataset);
    info!(dataset = %dataset, dir = %dir.display(), "Reading archive");
    let archive = DwcaDirectory::open(&dir)?;
    let dao = UsageDao::persistent(&cfg.store, dataset, true)?;
    Normalizer::with_default_parser(&dao)?.run(&archive)
}

// === Graph editing shared by the phases ===

/// A usage created for a reference that points nowhere
struct Placeholder<'n> {
    origin: Origin,
    name: &'n str,
    rank: Option<Rank>,
    status: TaxonomicStatus,
    taxon_id: Option<&'n str>,
    remarks: Option<String>,
}

impl<'n> Placeholder<'n> {
    fn new(origin: Origin, name: &'n str, status: TaxonomicStatus) -> Self {
        Self {
            origin,
            name,
            rank: None,
            status,
            taxon_id: None,
            remarks: None,
        }
    }

    fn rank(mut self, rank: Option<Rank>) -> Self {
        self.rank = rank;
        self
    }

    fn taxon_id(mut self, taxon_id: &'n str) -> Self {
        self.taxon_id = Some(taxon_id);
        self
    }

    fn remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }

    fn to_usage(&self) -> NameUsage {
        let mut u = NameUsage::new()
            .with_scientific_name(self.name)
            .with_canonical_name(self.name)
            .with_status(self.status);
        u.rank = self.rank;
        u.origin = Some(self.origin);
        u.taxon_id = self.taxon_id.map(str::to_string);
        u.remarks = self.remarks.clone();
        u
    }

    /// Creates the node, labeled ROOT if `root` is set.
    fn create(&self, dao: &UsageDao, root: bool) -> StorageResult<NodeId> {
        let node = dao.create_usage(&self.to_usage())?;
        if root {
            dao.graph().add_label(node, Label::Root)?;
        }
        debug!(node = %node, origin = self.origin.as_str(), name = self.name, "Created placeholder");
        Ok(node)
    }

    /// Creates the node with the classification of `source` and a verbatim
    /// record holding only the parent references of `source_verbatim`, so
    /// that relation setup gives it a parent later.
    fn create_with_classification(
        &self,
        dao: &UsageDao,
        source: &NameUsage,
        source_verbatim: &VerbatimUsage,
    ) -> StorageResult<NodeId> {
        let mut u = self.to_usage();
        u.classification = source.classification.clone();
        let node = dao.create_usage(&u)?;
        let mut v = VerbatimUsage::new();
        for term in [Term::ParentNameUsageId, Term::ParentNameUsage] {
            v.set_core_field(term, source_verbatim.core_field(term).map(str::to_string));
        }
        dao.store_verbatim(node, &v)?;
        debug!(node = %node, origin = self.origin.as_str(), name = self.name, "Created placeholder");
        Ok(node)
    }
}

/// Outcome of resolving a name reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameRef {
    Found(NodeId),
    /// The name is the referencing usage's own canonical name
    Own,
    Missing,
    NotUnique,
}

/// Resolves a name by scientific name, then by canonical name.
fn node_by_name(dao: &UsageDao, name: &str, usage: &NameUsage) -> StorageResult<NameRef> {
    match dao.graph().find_unique(NodeProperty::ScientificName, name) {
        Ok(Some(node)) => return Ok(NameRef::Found(node)),
        Ok(None) => {}
        Err(StorageError::NotUnique { .. }) => return Ok(NameRef::NotUnique),
        Err(e) => return Err(e),
    }
    if usage.canonical_name.as_deref() == Some(name) {
        return Ok(NameRef::Own);
    }
    match dao.graph().find_unique(NodeProperty::CanonicalName, name) {
        Ok(Some(node)) => Ok(NameRef::Found(node)),
        Ok(None) => Ok(NameRef::Missing),
        Err(StorageError::NotUnique { .. }) => Ok(NameRef::NotUnique),
        Err(e) => Err(e),
    }
}

/// Reads a usage, adds issues and an optional remark, and stores it again.
fn add_issue_remark(
    dao: &UsageDao,
    node: NodeId,
    remark: Option<&str>,
    issues: &[NameUsageIssue],
) -> StorageResult<()> {
    dao.update_usage(node, |u| {
        for issue in issues {
            u.add_issue(*issue);
        }
        if let Some(remark) = remark {
            u.add_remark(remark);
        }
    })
}

/// Links a synonym to its accepted usage. The accepted usage takes over the
/// parent of the synonym if it has none.
fn create_synonym_rel(dao: &UsageDao, synonym: NodeId, accepted: NodeId) -> StorageResult<()> {
    let graph = dao.graph();
    graph.add_edge(synonym, accepted, RelType::SynonymOf)?;
    let parents = graph.edges(synonym, Some(RelType::ParentOf), Direction::Incoming)?;
    match parents.as_slice() {
        [] => {}
        [rel] => {
            if rel.start != accepted && !graph.has_edge(accepted, RelType::ParentOf, Direction::Incoming)? {
                graph.add_edge(rel.start, accepted, RelType::ParentOf)?;
                graph.remove_label(accepted, Label::Root)?;
            }
        }
        _ => warn!(synonym = %synonym, "Synonym has multiple parent relationships"),
    }
    Ok(())
}

fn assign_parent(dao: &UsageDao, parent: NodeId, child: NodeId) -> StorageResult<()> {
    dao.graph().add_edge(parent, child, RelType::ParentOf)?;
    dao.graph().remove_label(child, Label::Root)
}
