//! Verbatim source records

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Source terms recognised in archive core and extension files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    TaxonId,
    ScientificName,
    ScientificNameAuthorship,
    CanonicalName,
    GenericName,
    SpecificEpithet,
    InfraspecificEpithet,
    TaxonRank,
    VerbatimTaxonRank,
    TaxonomicStatus,
    NomenclaturalStatus,
    AcceptedNameUsageId,
    AcceptedNameUsage,
    ParentNameUsageId,
    ParentNameUsage,
    OriginalNameUsageId,
    OriginalNameUsage,
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Subgenus,
    NamePublishedIn,
    NamePublishedInYear,
    NameAccordingTo,
    TaxonRemarks,
    References,
    Source,
    DatasetId,
    // extension terms
    VernacularName,
    Language,
    Locality,
    CountryCode,
    OccurrenceStatus,
    BibliographicCitation,
    Identifier,
    Description,
    Type,
}

impl Term {
    const ALL: [Term; 40] = [
        Term::TaxonId,
        Term::ScientificName,
        Term::ScientificNameAuthorship,
        Term::CanonicalName,
        Term::GenericName,
        Term::SpecificEpithet,
        Term::InfraspecificEpithet,
        Term::TaxonRank,
        Term::VerbatimTaxonRank,
        Term::TaxonomicStatus,
        Term::NomenclaturalStatus,
        Term::AcceptedNameUsageId,
        Term::AcceptedNameUsage,
        Term::ParentNameUsageId,
        Term::ParentNameUsage,
        Term::OriginalNameUsageId,
        Term::OriginalNameUsage,
        Term::Kingdom,
        Term::Phylum,
        Term::Class,
        Term::Order,
        Term::Family,
        Term::Genus,
        Term::Subgenus,
        Term::NamePublishedIn,
        Term::NamePublishedInYear,
        Term::NameAccordingTo,
        Term::TaxonRemarks,
        Term::References,
        Term::Source,
        Term::DatasetId,
        Term::VernacularName,
        Term::Language,
        Term::Locality,
        Term::CountryCode,
        Term::OccurrenceStatus,
        Term::BibliographicCitation,
        Term::Identifier,
        Term::Description,
        Term::Type,
    ];

    /// Higher classification terms that denormalize a parent chain.
    pub const CLASSIFICATION: [Term; 7] = [
        Term::Kingdom,
        Term::Phylum,
        Term::Class,
        Term::Order,
        Term::Family,
        Term::Genus,
        Term::Subgenus,
    ];

    pub fn simple_name(self) -> &'static str {
        match self {
            Term::TaxonId => "taxonID",
            Term::ScientificName => "scientificName",
            Term::ScientificNameAuthorship => "scientificNameAuthorship",
            Term::CanonicalName => "canonicalName",
            Term::GenericName => "genericName",
            Term::SpecificEpithet => "specificEpithet",
            Term::InfraspecificEpithet => "infraspecificEpithet",
            Term::TaxonRank => "taxonRank",
            Term::VerbatimTaxonRank => "verbatimTaxonRank",
            Term::TaxonomicStatus => "taxonomicStatus",
            Term::NomenclaturalStatus => "nomenclaturalStatus",
            Term::AcceptedNameUsageId => "acceptedNameUsageID",
            Term::AcceptedNameUsage => "acceptedNameUsage",
            Term::ParentNameUsageId => "parentNameUsageID",
            Term::ParentNameUsage => "parentNameUsage",
            Term::OriginalNameUsageId => "originalNameUsageID",
            Term::OriginalNameUsage => "originalNameUsage",
            Term::Kingdom => "kingdom",
            Term::Phylum => "phylum",
            Term::Class => "class",
            Term::Order => "order",
            Term::Family => "family",
            Term::Genus => "genus",
            Term::Subgenus => "subgenus",
            Term::NamePublishedIn => "namePublishedIn",
            Term::NamePublishedInYear => "namePublishedInYear",
            Term::NameAccordingTo => "nameAccordingTo",
            Term::TaxonRemarks => "taxonRemarks",
            Term::References => "references",
            Term::Source => "source",
            Term::DatasetId => "datasetID",
            Term::VernacularName => "vernacularName",
            Term::Language => "language",
            Term::Locality => "locality",
            Term::CountryCode => "countryCode",
            Term::OccurrenceStatus => "occurrenceStatus",
            Term::BibliographicCitation => "bibliographicCitation",
            Term::Identifier => "identifier",
            Term::Description => "description",
            Term::Type => "type",
        }
    }

    /// Resolves a column header or qualified term name.
    ///
    /// Namespace prefixes (`dwc:taxonID`) and term URIs
    /// (`http://rs.tdwg.org/dwc/terms/taxonID`) are accepted, matching is
    /// case insensitive.
    pub fn from_name(name: &str) -> Option<Term> {
        let name = name.trim();
        let simple = name
            .rsplit(|c: char| c == '/' || c == ':' || c == '#')
            .next()
            .unwrap_or(name);
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.simple_name().eq_ignore_ascii_case(simple))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.simple_name())
    }
}

/// Extension record groups attached to a core record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Extension {
    VernacularName,
    Distribution,
    Reference,
    Description,
    Identifier,
}

impl Extension {
    pub const ALL: [Extension; 5] = [
        Extension::VernacularName,
        Extension::Distribution,
        Extension::Reference,
        Extension::Description,
        Extension::Identifier,
    ];

    /// The conventional file stem of the extension in an archive directory.
    pub fn file_stem(self) -> &'static str {
        match self {
            Extension::VernacularName => "vernacularname",
            Extension::Distribution => "distribution",
            Extension::Reference => "reference",
            Extension::Description => "description",
            Extension::Identifier => "identifier",
        }
    }

    pub fn from_name(name: &str) -> Option<Extension> {
        let lower = name.trim().to_ascii_lowercase();
        let simple = lower.rsplit('/').next().unwrap_or(&lower);
        let simple = simple.trim_end_matches('s');
        Self::ALL.iter().copied().find(|e| simple == e.file_stem())
    }
}

/// One extension row: term values of a single extension record.
pub type ExtensionRecord = BTreeMap<Term, String>;

/// Immutable snapshot of the cleaned source values of one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbatimUsage {
    pub core_id: Option<String>,
    pub core: BTreeMap<Term, String>,
    pub extensions: BTreeMap<Extension, Vec<ExtensionRecord>>,
}

impl VerbatimUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn core_field(&self, term: Term) -> Option<&str> {
        self.core.get(&term).map(String::as_str)
    }

    /// Sets a core value, removing the term when the value is absent.
    pub fn set_core_field(&mut self, term: Term, value: Option<String>) {
        match value {
            Some(v) => {
                self.core.insert(term, v);
            }
            None => {
                self.core.remove(&term);
            }
        }
    }

    /// The first present value among the given terms.
    pub fn first_of(&self, terms: &[Term]) -> Option<&str> {
        terms.iter().find_map(|t| self.core_field(*t))
    }

    pub fn has_core_field(&self, term: Term) -> bool {
        self.core.contains_key(&term)
    }

    pub fn extension(&self, ext: Extension) -> &[ExtensionRecord] {
        self.extensions.get(&ext).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_extensions(&self) -> bool {
        self.extensions.values().any(|rows| !rows.is_empty())
    }
}
