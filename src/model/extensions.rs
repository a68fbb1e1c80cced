//! Interpreted extension data of a usage

use super::verbatim::{Extension, ExtensionRecord, Term, VerbatimUsage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VernacularName {
    pub name: String,
    pub language: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub locality: Option<String>,
    pub country: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub citation: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub description: String,
    pub kind: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub identifier: String,
    pub kind: Option<String>,
}

/// Extension records of one usage after interpretation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageExtensions {
    pub vernacular_names: Vec<VernacularName>,
    pub distributions: Vec<Distribution>,
    pub references: Vec<Reference>,
    pub descriptions: Vec<Description>,
    pub identifiers: Vec<Identifier>,
}

impl UsageExtensions {
    pub fn is_empty(&self) -> bool {
        self.vernacular_names.is_empty()
            && self.distributions.is_empty()
            && self.references.is_empty()
            && self.descriptions.is_empty()
            && self.identifiers.is_empty()
    }
}

/// Turns verbatim extension rows into [`UsageExtensions`].
///
/// Rows without their defining value are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtensionInterpreter;

impl ExtensionInterpreter {
    pub fn interpret(&self, v: &VerbatimUsage) -> UsageExtensions {
        UsageExtensions {
            vernacular_names: v
                .extension(Extension::VernacularName)
                .iter()
                .filter_map(|row| {
                    Some(VernacularName {
                        name: value(row, Term::VernacularName)?,
                        language: value(row, Term::Language),
                        country: value(row, Term::CountryCode),
                    })
                })
                .collect(),
            distributions: v
                .extension(Extension::Distribution)
                .iter()
                .filter(|row| row.contains_key(&Term::Locality) || row.contains_key(&Term::CountryCode))
                .map(|row| Distribution {
                    locality: value(row, Term::Locality),
                    country: value(row, Term::CountryCode),
                    status: value(row, Term::OccurrenceStatus),
                })
                .collect(),
            references: v
                .extension(Extension::Reference)
                .iter()
                .filter_map(|row| {
                    Some(Reference {
                        citation: value(row, Term::BibliographicCitation)?,
                        link: value(row, Term::References).or_else(|| value(row, Term::Identifier)),
                    })
                })
                .collect(),
            descriptions: v
                .extension(Extension::Description)
                .iter()
                .filter_map(|row| {
                    Some(Description {
                        description: value(row, Term::Description)?,
                        kind: value(row, Term::Type),
                        language: value(row, Term::Language),
                    })
                })
                .collect(),
            identifiers: v
                .extension(Extension::Identifier)
                .iter()
                .filter_map(|row| {
                    Some(Identifier {
                        identifier: value(row, Term::Identifier)?,
                        kind: value(row, Term::Type),
                    })
                })
                .collect(),
        }
    }
}

fn value(row: &ExtensionRecord, term: Term) -> Option<String> {
    row.get(&term).cloned()
}
