//! Storage handles, relationship vocabulary and errors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("taxonID {taxon_id} not unique: used by nodes {existing} and {added}")]
    TaxonIdNotUnique {
        taxon_id: String,
        existing: NodeId,
        added: NodeId,
    },

    #[error("{property} {value} not unique")]
    NotUnique { property: NodeProperty, value: String },

    #[error("Bulk mode can only be entered once on a fresh store")]
    BulkModeClosed,

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for stores that can be opened from a file or in memory
pub trait OpenStore: Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Open an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}

/// Handle of a node in the usage graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(i64);

impl NodeId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for NodeId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relationship types of the usage graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelType {
    /// classification parent to child
    ParentOf,
    /// synonym to accepted
    SynonymOf,
    /// synonym to one of several accepted usages
    ProparteSynonymOf,
    /// original name to recombination
    BasionymOf,
}

impl RelType {
    pub const ALL: [RelType; 4] = [
        RelType::ParentOf,
        RelType::SynonymOf,
        RelType::ProparteSynonymOf,
        RelType::BasionymOf,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelType::ParentOf => "PARENT_OF",
            RelType::SynonymOf => "SYNONYM_OF",
            RelType::ProparteSynonymOf => "PROPARTE_SYNONYM_OF",
            RelType::BasionymOf => "BASIONYM_OF",
        }
    }

    pub fn from_code(code: &str) -> Option<RelType> {
        Self::ALL.iter().copied().find(|r| r.as_str() == code)
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node labels used for fast iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Taxon,
    Synonym,
    Root,
    Family,
    Genus,
    Species,
    Infraspecies,
}

impl Label {
    pub const ALL: [Label; 7] = [
        Label::Taxon,
        Label::Synonym,
        Label::Root,
        Label::Family,
        Label::Genus,
        Label::Species,
        Label::Infraspecies,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Taxon => "TAXON",
            Label::Synonym => "SYNONYM",
            Label::Root => "ROOT",
            Label::Family => "FAMILY",
            Label::Genus => "GENUS",
            Label::Species => "SPECIES",
            Label::Infraspecies => "INFRASPECIES",
        }
    }

    pub fn from_code(code: &str) -> Option<Label> {
        Self::ALL.iter().copied().find(|l| l.as_str() == code)
    }
}

/// Direction of relationships relative to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// A stored, directed relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relationship {
    pub id: i64,
    pub start: NodeId,
    pub end: NodeId,
    pub rel_type: RelType,
}

impl Relationship {
    /// The node on the other side of `node`.
    pub fn other(&self, node: NodeId) -> NodeId {
        if self.start == node {
            self.end
        } else {
            self.start
        }
    }
}

/// Scalar node properties held in the graph channel for exact-match lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeProperty {
    TaxonId,
    ScientificName,
    CanonicalName,
}

impl NodeProperty {
    pub(crate) fn column(self) -> &'static str {
        match self {
            NodeProperty::TaxonId => "taxon_id",
            NodeProperty::ScientificName => "scientific_name",
            NodeProperty::CanonicalName => "canonical_name",
        }
    }
}

impl fmt::Display for NodeProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// The indexed subset of a usage kept on the graph node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeProps {
    pub taxon_id: Option<String>,
    pub scientific_name: Option<String>,
    pub canonical_name: Option<String>,
    pub rank: Option<crate::model::Rank>,
}
