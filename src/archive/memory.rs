//! Archives assembled in memory

use super::{Archive, ArchiveResult, ArchiveSchema, StarRecord};
use crate::model::Term;

/// An archive built record by record, mostly for tests and small imports
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    schema: ArchiveSchema,
    records: Vec<StarRecord>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a multi-value delimiter for a core term.
    pub fn with_delimiter(mut self, term: Term, delimiter: impl Into<String>) -> Self {
        self.schema.delimiters.insert(term, delimiter.into());
        self
    }

    /// Declares a core column even if no record uses it.
    pub fn with_term(mut self, term: Term) -> Self {
        self.add_term(term);
        self
    }

    pub fn with_record(mut self, record: StarRecord) -> Self {
        self.push(record);
        self
    }

    pub fn push(&mut self, record: StarRecord) {
        for term in record.core.keys() {
            self.add_term(*term);
        }
        for ext in record.extensions.keys() {
            if !self.schema.extensions.contains(ext) {
                self.schema.extensions.push(*ext);
            }
        }
        self.records.push(record);
    }

    fn add_term(&mut self, term: Term) {
        if !self.schema.core_terms.contains(&term) {
            self.schema.core_terms.push(term);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Archive for MemoryArchive {
    fn schema(&self) -> &ArchiveSchema {
        &self.schema
    }

    fn records(&self) -> ArchiveResult<Box<dyn Iterator<Item = ArchiveResult<StarRecord>> + '_>> {
        Ok(Box::new(self.records.iter().cloned().map(Ok)))
    }
}
