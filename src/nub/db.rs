use super::{MatchError, MatchResult};
use crate::authorship::AuthorComparator;
use crate::model::{Kingdom, NameUsage, NameUsageIssue, NubUsage, Origin, Rank, SrcUsage, TaxonomicStatus};
use crate::parsers::KingdomParser;
use crate::storage::{Direction, Label, NodeId, NodeProperty, NodeProps, RelType, StorageResult, UsageDao};
use crate::traverse;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, error, info};
use uuid::Uuid;

/// The backbone under construction
pub struct NubDb {
    pub(super) dao: UsageDao,
    pub(super) authors: AuthorComparator,
    pub(super) kingdom_parser: KingdomParser,
    pub(super) kingdoms: HashMap<Kingdom, NubUsage>,
}

impl NubDb {
    /// Starts a new backbone in an empty dao.
    pub fn create(dao: UsageDao) -> Self {
        Self {
            dao,
            authors: AuthorComparator,
            kingdom_parser: KingdomParser,
            kingdoms: HashMap::new(),
        }
    }

    /// Opens an existing backbone, restoring the kingdom cache from its
    /// root usages.
    pub fn open(dao: UsageDao) -> StorageResult<Self> {
        let mut db = Self::create(dao);
        for root in db.dao.root_nodes()? {
            if let Some(nub) = db.dao.read_nub(root)? {
                if nub.rank == Rank::Kingdom {
                    db.kingdoms.insert(nub.kingdom, nub);
                }
            }
        }
        info!(kingdoms = db.kingdoms.len(), "Opened backbone");
        Ok(db)
    }

    pub fn dao(&self) -> &UsageDao {
        &self.dao
    }

    pub fn into_dao(self) -> UsageDao {
        self.dao
    }

    /// All backbone usages with the given canonical name.
    pub fn find_nub_usages(&self, canonical: &str) -> StorageResult<Vec<NubUsage>> {
        let mut usages = Vec::new();
        for node in self.dao.graph().find_nodes(NodeProperty::CanonicalName, canonical)? {
            if let Some(nub) = self.dao.read_nub(node)? {
                usages.push(nub);
            }
        }
        Ok(usages)
    }

    /// The single accepted usage of a name at a rank within a kingdom.
    /// Doubtful usages are ignored when there is more than one.
    pub fn find_accepted_nub_usage(
        &self,
        kingdom: Kingdom,
        canonical: &str,
        rank: Rank,
    ) -> MatchResult<Option<NubUsage>> {
        let mut usages: Vec<NubUsage> = self
            .find_nub_usages(canonical)?
            .into_iter()
            .filter(|u| u.kingdom == kingdom && u.rank == rank && u.status.is_accepted())
            .collect();
        if usages.len() > 1 {
            usages.retain(|u| u.status != TaxonomicStatus::Doubtful);
        }
        match usages.len() {
            0 => Ok(None),
            1 => Ok(usages.pop()),
            n => {
                error!(homonyms = n, rank = rank.as_str(), canonical, "Accepted homonyms encountered");
                Err(MatchError::AcceptedHomonym {
                    kingdom,
                    rank,
                    canonical: canonical.to_string(),
                })
            }
        }
    }

    /// The accepted node of a synonym or the classification parent of an
    /// accepted node. None for roots.
    pub fn parent_of(&self, node: NodeId) -> StorageResult<Option<NodeId>> {
        let graph = self.dao.graph();
        if graph.has_label(node, Label::Synonym)? {
            traverse::accepted(graph, node)
        } else {
            Ok(graph
                .single_edge(node, RelType::ParentOf, Direction::Incoming)?
                .map(|rel| rel.start))
        }
    }

    pub fn parent(&self, child: &NubUsage) -> MatchResult<Option<NubUsage>> {
        match self.parent_of(node_of(child)?)? {
            Some(parent) => Ok(self.dao.read_nub(parent)?),
            None => Ok(None),
        }
    }

    pub fn kingdom(&self, kingdom: Kingdom) -> Option<&NubUsage> {
        self.kingdoms.get(&kingdom)
    }

    /// Creates a usage from a source usage below `parent`, or as a synonym
    /// of it.
    pub fn add_usage(
        &mut self,
        parent: &NubUsage,
        src: &SrcUsage,
        origin: Origin,
        dataset: Uuid,
        issues: &[NameUsageIssue],
    ) -> MatchResult<NubUsage> {
        debug!(
            origin = origin.as_str(),
            name = %src.scientific_name,
            rank = src.rank.as_str(),
            parent = %parent.parsed_name.scientific_name,
            "Create backbone usage"
        );
        let mut nub = NubUsage::from_source(src, origin, parent.kingdom);
        nub.dataset_key = Some(dataset);
        nub.issues.extend(issues.iter().copied());
        self.add(Some(parent), nub)
    }

    /// Adds a prepared usage below `parent`, or as a synonym of it.
    pub fn add_nub_usage(&mut self, parent: &NubUsage, nub: NubUsage) -> MatchResult<NubUsage> {
        self.add(Some(parent), nub)
    }

    pub fn add_root(&mut self, nub: NubUsage) -> MatchResult<NubUsage> {
        self.add(None, nub)
    }

    fn add(&mut self, parent: Option<&NubUsage>, mut nub: NubUsage) -> MatchResult<NubUsage> {
        let graph = self.dao.graph();
        let node = match nub.node {
            Some(node) => node,
            None => {
                let node = graph.create_node()?;
                graph.add_label(node, Label::Taxon)?;
                nub.node = Some(node);
                node
            }
        };
        match parent {
            None => graph.add_label(node, Label::Root)?,
            Some(parent) => {
                let parent_node = node_of(parent)?;
                nub.kingdom = parent.kingdom;
                if nub.is_synonym() {
                    graph.add_label(node, Label::Synonym)?;
                    graph.add_edge(node, parent_node, RelType::SynonymOf)?;
                } else {
                    graph.add_edge(parent_node, node, RelType::ParentOf)?;
                }
            }
        }
        if let Some(label) = rank_label(nub.rank) {
            graph.add_label(node, label)?;
        }
        Ok(self.store(nub)?)
    }

    /// Stores a usage and mirrors its names and rank onto the node.
    pub fn store(&mut self, nub: NubUsage) -> MatchResult<NubUsage> {
        let node = node_of(&nub)?;
        self.dao.graph().set_props(
            node,
            &NodeProps {
                taxon_id: None,
                scientific_name: Some(nub.parsed_name.full_name()),
                canonical_name: Some(nub.canonical_name()),
                rank: Some(nub.rank),
            },
        )?;
        self.dao.store_nub(node, &nub)?;
        if nub.rank == Rank::Kingdom {
            self.kingdoms.insert(nub.kingdom, nub.clone());
        }
        Ok(nub)
    }

    /// Makes `parent` the only parent of `node`.
    pub fn update_parent_rel(&self, node: NodeId, parent: NodeId) -> StorageResult<()> {
        let graph = self.dao.graph();
        graph.delete_edges(node, Some(RelType::ParentOf), Direction::Incoming)?;
        graph.add_edge(parent, node, RelType::ParentOf)?;
        graph.remove_label(node, Label::Root)
    }

    /// Turns `synonym` into a synonym of `accepted`, dropping its parent and
    /// previous accepted relations.
    pub fn create_synonym_relation(&self, synonym: NodeId, accepted: NodeId) -> StorageResult<()> {
        let graph = self.dao.graph();
        graph.delete_edges(synonym, Some(RelType::ParentOf), Direction::Incoming)?;
        graph.delete_edges(synonym, Some(RelType::SynonymOf), Direction::Outgoing)?;
        graph.add_label(synonym, Label::Synonym)?;
        graph.remove_label(synonym, Label::Root)?;
        graph.add_edge(synonym, accepted, RelType::SynonymOf)?;
        Ok(())
    }

    /// Moves all children of `node` to `parent`, adding `issues` to each
    /// child and NAME_PARENT_MISMATCH where the genus differs.
    pub fn assign_parent_to_children(
        &mut self,
        node: NodeId,
        parent: &NubUsage,
        issues: &[NameUsageIssue],
    ) -> MatchResult<()> {
        let parent_node = node_of(parent)?;
        for rel in self.dao.graph().edges(node, Some(RelType::ParentOf), Direction::Outgoing)? {
            let child = rel.end;
            self.dao.graph().delete_edge(&rel)?;
            self.dao.graph().add_edge(parent_node, child, RelType::ParentOf)?;
            let Some(mut cu) = self.dao.read_nub(child)? else {
                continue;
            };
            cu.issues.extend(issues.iter().copied());
            if cu.parsed_name.genus_or_above != parent.parsed_name.genus_or_above {
                cu.issues.insert(NameUsageIssue::NameParentMismatch);
            }
            self.store(cu)?;
        }
        Ok(())
    }

    /// Moves all synonyms of `node` to `accepted`.
    pub fn assign_accepted_to_synonyms(&self, node: NodeId, accepted: NodeId) -> StorageResult<()> {
        let graph = self.dao.graph();
        let mut synonyms = BTreeSet::new();
        for rel_type in [RelType::SynonymOf, RelType::ProparteSynonymOf] {
            for rel in graph.edges(node, Some(rel_type), Direction::Incoming)? {
                graph.delete_edge(&rel)?;
                synonyms.insert(rel.start);
            }
        }
        for syn in synonyms {
            graph.add_edge(syn, accepted, RelType::SynonymOf)?;
        }
        Ok(())
    }

    /// True if `search` is `node` or one of its parents. Synonyms are
    /// placed at their accepted node.
    pub fn exists_in_classification(&self, node: NodeId, search: NodeId) -> StorageResult<bool> {
        if node == search {
            return Ok(true);
        }
        let mut start = node;
        if self.dao.graph().has_label(node, Label::Synonym)? {
            match self.parent_of(node)? {
                Some(accepted) if accepted == search => return Ok(true),
                Some(accepted) => start = accepted,
                None => return Ok(false),
            }
        }
        Ok(traverse::parents(self.dao.graph(), start)?.contains(&search))
    }

    /// Backbone usages of the basionym group of a node. Nodes without a
    /// backbone payload are skipped.
    pub fn list_basionym_group(&self, node: NodeId) -> StorageResult<Vec<NubUsage>> {
        let mut group = Vec::new();
        for n in traverse::basionym_group(self.dao.graph(), node)? {
            if let Some(nub) = self.dao.read_nub(n)? {
                group.push(nub);
            }
        }
        Ok(group)
    }

    pub fn count_taxa(&self) -> StorageResult<usize> {
        self.dao.graph().count_nodes()
    }

    /// Writes a name usage for every backbone usage into the usage channel.
    pub fn convert_nub_usages(&self) -> StorageResult<usize> {
        info!("Converting backbone usages to name usages");
        let mut cursor = self.dao.cursor()?;
        for node in self.dao.all_nodes()? {
            let Some(nub) = self.dao.read_nub(node)? else {
                continue;
            };
            self.dao.store_usage(node, &to_name_usage(&nub))?;
            cursor.tick()?;
        }
        let converted = cursor.finish()?;
        info!(converted, "Backbone usages converted");
        Ok(converted)
    }
}

fn node_of(nub: &NubUsage) -> MatchResult<NodeId> {
    nub.node
        .ok_or_else(|| MatchError::NotStored(nub.parsed_name.scientific_name.clone()))
}

fn rank_label(rank: Rank) -> Option<Label> {
    match rank {
        Rank::Family => Some(Label::Family),
        Rank::Genus => Some(Label::Genus),
        Rank::Species => Some(Label::Species),
        Rank::Subspecies | Rank::Variety | Rank::Subvariety | Rank::Form | Rank::Subform => {
            Some(Label::Infraspecies)
        }
        _ => None,
    }
}

fn to_name_usage(nub: &NubUsage) -> NameUsage {
    let mut u = NameUsage::new()
        .with_scientific_name(nub.parsed_name.full_name())
        .with_canonical_name(nub.canonical_name())
        .with_rank(nub.rank)
        .with_status(nub.status);
    u.nub_key = nub.usage_key;
    u.authorship = nub.parsed_name.authorship_complete();
    u.name_type = Some(nub.parsed_name.name_type);
    u.nomenclatural_status = nub.nom_status.clone();
    u.origin = Some(nub.origin);
    u.published_in = nub.published_in.clone();
    u.constituent_key = nub.dataset_key;
    u.issues = nub.issues.clone();
    u.classification.set(Rank::Kingdom, Some(nub.kingdom.scientific_name().to_string()));
    for remark in &nub.remarks {
        u.add_remark(remark);
    }
    u
}
