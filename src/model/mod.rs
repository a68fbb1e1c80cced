//! Data model of usages, names and verbatim records

mod extensions;
mod name;
mod nub;
mod usage;
mod verbatim;
mod vocab;

pub use extensions::{
    Description, Distribution, ExtensionInterpreter, Identifier, Reference, UsageExtensions, VernacularName,
};
pub use name::ParsedName;
pub use nub::{NubUsage, SrcUsage};
pub use usage::{Classification, NameUsage, UsageMetrics};
pub use verbatim::{Extension, ExtensionRecord, Term, VerbatimUsage};
pub use vocab::{
    Equality, Kingdom, NameType, NameUsageIssue, NomenclaturalStatus, Origin, Rank, TaxonomicStatus,
};

/// Name given to placeholder usages created for missing references.
pub const INCERTAE_SEDIS: &str = "Incertae sedis";
