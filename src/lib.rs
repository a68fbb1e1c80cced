//! Taxograph: taxonomic usage graphs
//!
//! Builds per-dataset graphs of scientific name usages from checklist
//! archives and merges them into a backbone whose identifiers stay stable
//! across rebuilds.
//!
//! # Core Concepts
//!
//! - **Usages**: accepted taxa, synonyms and doubtful names, one graph node each
//! - **Relations**: PARENT_OF, SYNONYM_OF, PROPARTE_SYNONYM_OF and BASIONYM_OF edges
//! - **Normalizer**: turns loosely linked archive records into a consistent graph
//! - **Backbone**: a cumulative graph matched against with [`NubDb::find_match`]
//! - **Identifier lookup**: keeps backbone identifiers stable across builds
//!
//! # Example
//!
//! ```
//! use taxograph::archive::{MemoryArchive, StarRecord};
//! use taxograph::model::Term;
//! use taxograph::normalizer::Normalizer;
//! use taxograph::storage::UsageDao;
//!
//! let archive = MemoryArchive::new().with_record(
//!     StarRecord::new("1")
//!         .with(Term::TaxonId, "1")
//!         .with(Term::ScientificName, "Abies alba Mill."),
//! );
//! let dao = UsageDao::temporary(1000).unwrap();
//! let stats = Normalizer::with_default_parser(&dao).unwrap().run(&archive).unwrap();
//! assert_eq!(stats.records, 1);
//! ```

pub mod archive;
pub mod authorship;
pub mod config;
pub mod lookup;
pub mod model;
pub mod normalizer;
pub mod nub;
pub mod parsers;
pub mod storage;
pub mod traverse;

pub use config::{Config, ConfigError, LookupConfig, StoreConfig};
pub use lookup::{AmbiguityPolicy, IdLookup, LookupError, LookupUsage};
pub use normalizer::{NormalizationError, Normalizer, NormalizerStats};
pub use nub::{MatchError, NubDb, NubMatch};
pub use storage::{NodeId, StorageError, StorageResult, UsageDao};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
