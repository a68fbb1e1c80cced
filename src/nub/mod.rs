//! Backbone database and matching of source usages against it
//!
//! A [`NubDb`] wraps the [`UsageDao`](crate::storage::UsageDao) of the
//! backbone under construction. Usages are kept as [`NubUsage`] payloads in
//! the nub channel, with canonical name and rank mirrored on the graph node
//! for lookups. [`NubDb::find_match`] decides whether a source usage is
//! already represented.

mod db;
mod matching;

pub use db::NubDb;

use crate::model::{Kingdom, NubUsage, Rank};
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Several accepted candidates without a shared parent. Fatal for the
    /// single source usage only.
    #[error("Homonym {name}")]
    Homonym { name: String },

    #[error("Accepted homonym encountered for {kingdom} kingdom: {rank:?} {canonical}")]
    AcceptedHomonym {
        kingdom: Kingdom,
        rank: Rank,
        canonical: String,
    },

    #[error("Backbone usage {0} is not stored")]
    NotStored(String),
}

pub type MatchResult<T> = Result<T, MatchError>;

/// Outcome of matching a source usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NubMatch {
    Empty,
    Matched(NubUsage),
    /// Snapped to a candidate without a clear match. `homonym` is set when
    /// the candidate was flagged HOMONYM.
    Ambiguous { usage: NubUsage, homonym: bool },
}

impl NubMatch {
    pub fn is_empty(&self) -> bool {
        matches!(self, NubMatch::Empty)
    }

    pub fn usage(&self) -> Option<&NubUsage> {
        match self {
            NubMatch::Empty => None,
            NubMatch::Matched(usage) | NubMatch::Ambiguous { usage, .. } => Some(usage),
        }
    }

    pub fn into_usage(self) -> Option<NubUsage> {
        match self {
            NubMatch::Empty => None,
            NubMatch::Matched(usage) | NubMatch::Ambiguous { usage, .. } => Some(usage),
        }
    }
}
