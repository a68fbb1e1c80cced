//! Usages used while building the backbone

use super::name::ParsedName;
use super::vocab::{Kingdom, NameUsageIssue, NomenclaturalStatus, Origin, Rank, TaxonomicStatus};
use crate::storage::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A usage of the backbone under construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NubUsage {
    /// Graph node of this usage, set once stored
    pub node: Option<NodeId>,
    /// Stable identifier, assigned from the identifier lookup
    pub usage_key: Option<i64>,
    /// Dataset the usage was first taken from
    pub dataset_key: Option<Uuid>,
    pub parsed_name: ParsedName,
    pub rank: Rank,
    pub kingdom: Kingdom,
    pub status: TaxonomicStatus,
    pub nom_status: BTreeSet<NomenclaturalStatus>,
    pub origin: Origin,
    /// Keys of every source usage merged into this one
    pub source_ids: Vec<i64>,
    pub published_in: Option<String>,
    pub issues: BTreeSet<NameUsageIssue>,
    pub remarks: Vec<String>,
}

impl NubUsage {
    pub fn new(parsed_name: ParsedName, rank: Rank, kingdom: Kingdom, status: TaxonomicStatus) -> Self {
        Self {
            node: None,
            usage_key: None,
            dataset_key: None,
            parsed_name,
            rank,
            kingdom,
            status,
            nom_status: BTreeSet::new(),
            origin: Origin::Source,
            source_ids: Vec::new(),
            published_in: None,
            issues: BTreeSet::new(),
            remarks: Vec::new(),
        }
    }

    /// Builds a backbone usage from a source usage.
    pub fn from_source(src: &SrcUsage, origin: Origin, kingdom: Kingdom) -> Self {
        let mut nub = Self::new(src.parsed_name.clone(), src.rank, kingdom, src.status);
        nub.origin = origin;
        nub.nom_status = src.nom_status.clone();
        nub.source_ids.push(src.key);
        nub.published_in = src.published_in.clone();
        nub
    }

    pub fn canonical_name(&self) -> String {
        self.parsed_name
            .canonical_name()
            .unwrap_or_else(|| self.parsed_name.scientific_name.clone())
    }

    pub fn is_synonym(&self) -> bool {
        self.status.is_synonym()
    }

    pub fn add_remark(&mut self, remark: impl Into<String>) {
        self.remarks.push(remark.into());
    }
}

/// A usage of a source checklist offered for merging into the backbone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrcUsage {
    pub key: i64,
    pub parent_key: Option<i64>,
    pub scientific_name: String,
    pub parsed_name: ParsedName,
    pub rank: Rank,
    pub status: TaxonomicStatus,
    pub nom_status: BTreeSet<NomenclaturalStatus>,
    pub published_in: Option<String>,
}

impl SrcUsage {
    pub fn new(key: i64, parsed_name: ParsedName, rank: Rank, status: TaxonomicStatus) -> Self {
        Self {
            key,
            parent_key: None,
            scientific_name: parsed_name.full_name(),
            parsed_name,
            rank,
            status,
            nom_status: BTreeSet::new(),
            published_in: None,
        }
    }

    pub fn canonical_name(&self) -> String {
        self.parsed_name
            .canonical_name()
            .unwrap_or_else(|| self.scientific_name.clone())
    }
}
