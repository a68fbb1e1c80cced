//! Normalization statistics and per-usage tree metrics

use super::metadata::InsertMetadata;
use crate::model::{NameUsageIssue, Origin, Rank, UsageMetrics};
use crate::storage::{Label, NodeId, StorageResult, UsageDao};
use crate::traverse::{self, StartEndHandler, TaxonWalker};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Summary of one normalization run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerStats {
    /// Core records that became usages
    pub records: usize,
    pub ignored: usize,
    pub usages: usize,
    pub roots: usize,
    pub synonyms: usize,
    /// Deepest level of the accepted tree, roots being level 1
    pub depth: u32,
    pub count_by_rank: BTreeMap<Rank, usize>,
    pub count_by_origin: BTreeMap<Origin, usize>,
    pub count_by_issue: BTreeMap<NameUsageIssue, usize>,
    /// taxonIDs of usages whose synonym or parent cycle was cut
    pub cycles: Vec<String>,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
}

impl NormalizerStats {
    pub fn count_by_rank(&self, rank: Rank) -> usize {
        self.count_by_rank.get(&rank).copied().unwrap_or(0)
    }

    pub fn count_by_origin(&self, origin: Origin) -> usize {
        self.count_by_origin.get(&origin).copied().unwrap_or(0)
    }

    pub fn count_by_issue(&self, issue: NameUsageIssue) -> usize {
        self.count_by_issue.get(&issue).copied().unwrap_or(0)
    }
}

/// Open frame of the walk
struct Frame {
    node: NodeId,
    metrics: UsageMetrics,
}

/// Stores [`UsageMetrics`] for every accepted usage once its subtree is done.
struct MetricsHandler<'a> {
    dao: &'a UsageDao,
    stack: Vec<Frame>,
    max_depth: u32,
}

impl<'a> MetricsHandler<'a> {
    fn new(dao: &'a UsageDao) -> Self {
        Self {
            dao,
            stack: Vec::new(),
            max_depth: 0,
        }
    }
}

impl StartEndHandler for MetricsHandler<'_> {
    fn start(&mut self, node: NodeId) -> StorageResult<()> {
        let depth = self.stack.len() as u32 + 1;
        self.max_depth = self.max_depth.max(depth);
        let metrics = UsageMetrics {
            num_synonyms: traverse::synonyms(self.dao.graph(), node)?.len() as u32,
            depth,
            ..UsageMetrics::default()
        };
        self.stack.push(Frame { node, metrics });
        Ok(())
    }

    fn end(&mut self, node: NodeId) -> StorageResult<()> {
        let Some(frame) = self.stack.pop() else {
            return Ok(());
        };
        debug_assert_eq!(frame.node, node);
        let props = self.dao.graph().props(node)?.unwrap_or_default();
        let is_species = props.rank == Some(Rank::Species);
        if let Some(parent) = self.stack.last_mut() {
            parent.metrics.num_children += 1;
            parent.metrics.num_descendants += frame.metrics.num_descendants + 1;
            parent.metrics.num_species += frame.metrics.num_species + u32::from(is_species);
        }
        self.dao.store_metrics(frame.node, &frame.metrics)
    }
}

/// Walks the accepted tree storing usage metrics and counts all usages.
pub(super) fn build(
    dao: &UsageDao,
    meta: &InsertMetadata,
    cycles: Vec<String>,
    started: DateTime<Utc>,
) -> StorageResult<NormalizerStats> {
    info!("Walking accepted tree for usage metrics");
    let mut metrics = MetricsHandler::new(dao);
    let walked = TaxonWalker::new(dao.graph()).walk_accepted(&mut [&mut metrics])?;
    dao.commit()?;
    dao.begin()?;

    let mut count_by_rank = BTreeMap::new();
    let mut count_by_origin = BTreeMap::new();
    let mut count_by_issue = BTreeMap::new();
    let mut usages = 0;
    for node in dao.nodes_with_label(Label::Taxon)? {
        let Some(u) = dao.read_usage(node, false)? else {
            continue;
        };
        usages += 1;
        if let Some(rank) = u.rank {
            *count_by_rank.entry(rank).or_insert(0) += 1;
        }
        if let Some(origin) = u.origin {
            *count_by_origin.entry(origin).or_insert(0) += 1;
        }
        for issue in &u.issues {
            *count_by_issue.entry(*issue).or_insert(0) += 1;
        }
    }
    dao.commit()?;

    let stats = NormalizerStats {
        records: meta.records,
        ignored: meta.ignored,
        usages,
        roots: dao.root_nodes()?.len(),
        synonyms: dao.nodes_with_label(Label::Synonym)?.len(),
        depth: metrics.max_depth,
        count_by_rank,
        count_by_origin,
        count_by_issue,
        cycles,
        started,
        finished: Utc::now(),
    };
    info!(walked, depth = stats.depth, usages, "Usage metrics stored");
    Ok(stats)
}
