//! Facts collected while inserting an archive

use crate::archive::ArchiveSchema;
use crate::model::{Rank, Term};
use std::collections::BTreeMap;

/// Counters and mapped-term flags of one insert run.
///
/// Filled during insert, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertMetadata {
    pub records: usize,
    pub ignored: usize,
    /// The core has no taxonID column, the record id is used instead
    pub core_id_used: bool,
    pub denormed_classification_mapped: bool,
    pub parent_name_mapped: bool,
    pub accepted_name_mapped: bool,
    pub original_name_mapped: bool,
    /// Declared multi-value delimiters per core term
    pub multi_value_delimiters: BTreeMap<Term, String>,
    pub ranks: BTreeMap<Rank, usize>,
}

impl InsertMetadata {
    pub fn from_schema(schema: &ArchiveSchema) -> Self {
        Self {
            core_id_used: !schema.has_term(Term::TaxonId),
            denormed_classification_mapped: schema.has_any(&Term::CLASSIFICATION),
            parent_name_mapped: schema.has_any(&[Term::ParentNameUsageId, Term::ParentNameUsage]),
            accepted_name_mapped: schema.has_any(&[Term::AcceptedNameUsageId, Term::AcceptedNameUsage]),
            original_name_mapped: schema.has_any(&[Term::OriginalNameUsageId, Term::OriginalNameUsage]),
            multi_value_delimiters: schema
                .delimiters
                .iter()
                .filter(|(_, d)| !d.is_empty())
                .map(|(t, d)| (*t, d.clone()))
                .collect(),
            ..Self::default()
        }
    }

    /// Splits a value by the delimiter declared for its term, or `None` if
    /// the term has none.
    pub fn split(&self, term: Term, value: &str) -> Option<Vec<String>> {
        let delimiter = self.multi_value_delimiters.get(&term)?;
        Some(
            value
                .split(delimiter.as_str())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub(crate) fn inc_rank(&mut self, rank: Option<Rank>) {
        if let Some(rank) = rank {
            *self.ranks.entry(rank).or_insert(0) += 1;
        }
    }
}
