//! Source archives of star records
//!
//! A star record is one core row plus the extension rows that point to it.

mod dwca;
mod memory;

pub use dwca::{ArchiveDescriptor, DwcaDirectory, ExtensionDescriptor, FileDescriptor};
pub use memory::MemoryArchive;

use crate::model::{Extension, ExtensionRecord, Term};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed delimited text: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid archive descriptor: {0}")]
    Descriptor(#[from] serde_yaml::Error),

    #[error("No core data file found in {0}")]
    MissingCore(PathBuf),

    #[error("Invalid field delimiter {0:?}")]
    Delimiter(String),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Raw values of one core record with its extension rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StarRecord {
    /// Core identifier linking extension rows
    pub id: Option<String>,
    pub core: BTreeMap<Term, String>,
    pub extensions: BTreeMap<Extension, Vec<ExtensionRecord>>,
}

impl StarRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with(mut self, term: Term, value: impl Into<String>) -> Self {
        self.core.insert(term, value.into());
        self
    }

    pub fn with_extension(mut self, extension: Extension, row: ExtensionRecord) -> Self {
        self.extensions.entry(extension).or_default().push(row);
        self
    }

    pub fn get(&self, term: Term) -> Option<&str> {
        self.core.get(&term).map(String::as_str)
    }
}

/// What an archive declares about its columns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSchema {
    /// Terms present as core columns
    pub core_terms: Vec<Term>,
    /// Declared multi-value delimiters per core term
    pub delimiters: BTreeMap<Term, String>,
    pub extensions: Vec<Extension>,
}

impl ArchiveSchema {
    pub fn has_term(&self, term: Term) -> bool {
        self.core_terms.contains(&term)
    }

    pub fn has_any(&self, terms: &[Term]) -> bool {
        terms.iter().any(|t| self.has_term(*t))
    }
}

/// An ordered source of star records
pub trait Archive {
    fn schema(&self) -> &ArchiveSchema;

    /// Iterates all records in source order.
    ///
    /// Failing to open the data is reported up front, per-record
    /// failures are yielded by the iterator.
    fn records(&self) -> ArchiveResult<Box<dyn Iterator<Item = ArchiveResult<StarRecord>> + '_>>;
}
