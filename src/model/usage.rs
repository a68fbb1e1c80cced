//! Name usages as stored in the blob channel

use super::vocab::{NameType, NameUsageIssue, NomenclaturalStatus, Origin, Rank, TaxonomicStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Flat linnean classification strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub kingdom: Option<String>,
    pub phylum: Option<String>,
    pub class: Option<String>,
    pub order: Option<String>,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub subgenus: Option<String>,
}

impl Classification {
    pub fn get(&self, rank: Rank) -> Option<&str> {
        let value = match rank {
            Rank::Kingdom => &self.kingdom,
            Rank::Phylum => &self.phylum,
            Rank::Class => &self.class,
            Rank::Order => &self.order,
            Rank::Family => &self.family,
            Rank::Genus => &self.genus,
            Rank::Subgenus => &self.subgenus,
            _ => return None,
        };
        value.as_deref()
    }

    /// Sets a classification slot. Ranks outside the flat classification are ignored.
    pub fn set(&mut self, rank: Rank, name: Option<String>) {
        let slot = match rank {
            Rank::Kingdom => &mut self.kingdom,
            Rank::Phylum => &mut self.phylum,
            Rank::Class => &mut self.class,
            Rank::Order => &mut self.order,
            Rank::Family => &mut self.family,
            Rank::Genus => &mut self.genus,
            Rank::Subgenus => &mut self.subgenus,
            _ => return,
        };
        *slot = name;
    }

    pub fn is_empty(&self) -> bool {
        Rank::DWC_RANKS.iter().all(|r| self.get(*r).is_none())
    }
}

/// A single name usage: an accepted taxon, synonym or doubtful name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameUsage {
    /// Node identity, filled in when read back from a store
    pub key: Option<i64>,
    /// Stable backbone identifier, assigned late
    pub nub_key: Option<i64>,
    pub taxon_id: Option<String>,
    pub scientific_name: Option<String>,
    pub canonical_name: Option<String>,
    pub authorship: Option<String>,
    pub name_type: Option<NameType>,
    pub rank: Option<Rank>,
    pub taxonomic_status: Option<TaxonomicStatus>,
    pub nomenclatural_status: BTreeSet<NomenclaturalStatus>,
    pub synonym: bool,
    pub origin: Option<Origin>,
    pub classification: Classification,
    pub accepted_key: Option<i64>,
    pub accepted: Option<String>,
    pub parent_key: Option<i64>,
    pub parent: Option<String>,
    pub basionym_key: Option<i64>,
    pub basionym: Option<String>,
    pub published_in: Option<String>,
    pub according_to: Option<String>,
    pub references: Option<String>,
    pub remarks: Option<String>,
    pub constituent_key: Option<Uuid>,
    pub issues: BTreeSet<NameUsageIssue>,
}

impl NameUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scientific_name(mut self, name: impl Into<String>) -> Self {
        self.scientific_name = Some(name.into());
        self
    }

    pub fn with_canonical_name(mut self, name: impl Into<String>) -> Self {
        self.canonical_name = Some(name.into());
        self
    }

    pub fn with_taxon_id(mut self, id: impl Into<String>) -> Self {
        self.taxon_id = Some(id.into());
        self
    }

    pub fn with_rank(mut self, rank: Rank) -> Self {
        self.rank = Some(rank);
        self
    }

    /// Sets the status and keeps the synonym flag in agreement with it.
    pub fn with_status(mut self, status: TaxonomicStatus) -> Self {
        self.set_status(status);
        self
    }

    pub fn set_status(&mut self, status: TaxonomicStatus) {
        self.taxonomic_status = Some(status);
        self.synonym = status.is_synonym();
    }

    pub fn add_issue(&mut self, issue: NameUsageIssue) {
        self.issues.insert(issue);
    }

    pub fn has_issue(&self, issue: NameUsageIssue) -> bool {
        self.issues.contains(&issue)
    }

    /// Appends a remark, separating multiple remarks with `; `.
    pub fn add_remark(&mut self, remark: impl AsRef<str>) {
        let remark = remark.as_ref();
        match &mut self.remarks {
            Some(existing) if !existing.is_empty() => {
                existing.push_str("; ");
                existing.push_str(remark);
            }
            _ => self.remarks = Some(remark.to_string()),
        }
    }

    /// Name used in remarks and log messages.
    pub fn display_name(&self) -> &str {
        self.scientific_name
            .as_deref()
            .or(self.canonical_name.as_deref())
            .unwrap_or("")
    }
}

/// Tree metrics of a single accepted usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub num_children: u32,
    pub num_synonyms: u32,
    pub num_descendants: u32,
    pub num_species: u32,
    pub depth: u32,
}
