//! Closed vocabularies shared by the normalizer, matcher and lookup

use serde::{Deserialize, Serialize};
use std::fmt;

/// Taxonomic rank, ordered from highest to lowest.
///
/// `Other`, `Informal` and `Unranked` sort last and are not part of the
/// linnean hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    Domain,
    Kingdom,
    Subkingdom,
    Phylum,
    Subphylum,
    Superclass,
    Class,
    Subclass,
    Superorder,
    Order,
    Suborder,
    Infraorder,
    Superfamily,
    Family,
    Subfamily,
    Tribe,
    Subtribe,
    SupragenericName,
    Genus,
    Subgenus,
    Section,
    Series,
    InfragenericName,
    SpeciesAggregate,
    Species,
    InfraspecificName,
    Subspecies,
    InfrasubspecificName,
    Variety,
    Subvariety,
    Form,
    Subform,
    Cultivar,
    Strain,
    Other,
    Informal,
    Unranked,
}

impl Rank {
    /// Ranks that can be given as flat classification columns in an archive,
    /// ordered from highest to lowest.
    pub const DWC_RANKS: [Rank; 7] = [
        Rank::Kingdom,
        Rank::Phylum,
        Rank::Class,
        Rank::Order,
        Rank::Family,
        Rank::Genus,
        Rank::Subgenus,
    ];

    /// Ranks that cannot be placed in the linnean hierarchy.
    pub fn is_uncomparable(self) -> bool {
        matches!(self, Rank::Informal | Rank::Unranked)
    }

    fn is_linnean_ordered(self) -> bool {
        !matches!(self, Rank::Other | Rank::Informal | Rank::Unranked)
    }

    pub fn is_suprageneric(self) -> bool {
        self < Rank::Genus
    }

    pub fn is_species_or_below(self) -> bool {
        self >= Rank::Species && self.is_linnean_ordered()
    }

    pub fn is_infraspecific(self) -> bool {
        self > Rank::Species && self.is_linnean_ordered()
    }

    /// True if `self` sits strictly above `other` in the hierarchy.
    pub fn higher_than(self, other: Rank) -> bool {
        self < other
    }

    /// The rank marker used when rendering infraspecific names.
    pub fn marker(self) -> Option<&'static str> {
        match self {
            Rank::Subgenus => Some("subgen."),
            Rank::Section => Some("sect."),
            Rank::Series => Some("ser."),
            Rank::SpeciesAggregate => Some("agg."),
            Rank::Species => Some("sp."),
            Rank::Subspecies => Some("subsp."),
            Rank::Variety => Some("var."),
            Rank::Subvariety => Some("subvar."),
            Rank::Form => Some("f."),
            Rank::Subform => Some("subf."),
            Rank::Cultivar => Some("cv."),
            Rank::Strain => Some("strain"),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rank::Domain => "DOMAIN",
            Rank::Kingdom => "KINGDOM",
            Rank::Subkingdom => "SUBKINGDOM",
            Rank::Phylum => "PHYLUM",
            Rank::Subphylum => "SUBPHYLUM",
            Rank::Superclass => "SUPERCLASS",
            Rank::Class => "CLASS",
            Rank::Subclass => "SUBCLASS",
            Rank::Superorder => "SUPERORDER",
            Rank::Order => "ORDER",
            Rank::Suborder => "SUBORDER",
            Rank::Infraorder => "INFRAORDER",
            Rank::Superfamily => "SUPERFAMILY",
            Rank::Family => "FAMILY",
            Rank::Subfamily => "SUBFAMILY",
            Rank::Tribe => "TRIBE",
            Rank::Subtribe => "SUBTRIBE",
            Rank::SupragenericName => "SUPRAGENERIC_NAME",
            Rank::Genus => "GENUS",
            Rank::Subgenus => "SUBGENUS",
            Rank::Section => "SECTION",
            Rank::Series => "SERIES",
            Rank::InfragenericName => "INFRAGENERIC_NAME",
            Rank::SpeciesAggregate => "SPECIES_AGGREGATE",
            Rank::Species => "SPECIES",
            Rank::InfraspecificName => "INFRASPECIFIC_NAME",
            Rank::Subspecies => "SUBSPECIES",
            Rank::InfrasubspecificName => "INFRASUBSPECIFIC_NAME",
            Rank::Variety => "VARIETY",
            Rank::Subvariety => "SUBVARIETY",
            Rank::Form => "FORM",
            Rank::Subform => "SUBFORM",
            Rank::Cultivar => "CULTIVAR",
            Rank::Strain => "STRAIN",
            Rank::Other => "OTHER",
            Rank::Informal => "INFORMAL",
            Rank::Unranked => "UNRANKED",
        }
    }

    /// Inverse of [`Rank::as_str`].
    pub fn from_code(code: &str) -> Option<Rank> {
        Self::ALL.iter().copied().find(|r| r.as_str() == code)
    }

    const ALL: [Rank; 37] = [
        Rank::Domain,
        Rank::Kingdom,
        Rank::Subkingdom,
        Rank::Phylum,
        Rank::Subphylum,
        Rank::Superclass,
        Rank::Class,
        Rank::Subclass,
        Rank::Superorder,
        Rank::Order,
        Rank::Suborder,
        Rank::Infraorder,
        Rank::Superfamily,
        Rank::Family,
        Rank::Subfamily,
        Rank::Tribe,
        Rank::Subtribe,
        Rank::SupragenericName,
        Rank::Genus,
        Rank::Subgenus,
        Rank::Section,
        Rank::Series,
        Rank::InfragenericName,
        Rank::SpeciesAggregate,
        Rank::Species,
        Rank::InfraspecificName,
        Rank::Subspecies,
        Rank::InfrasubspecificName,
        Rank::Variety,
        Rank::Subvariety,
        Rank::Form,
        Rank::Subform,
        Rank::Cultivar,
        Rank::Strain,
        Rank::Other,
        Rank::Informal,
        Rank::Unranked,
    ];
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The backbone kingdoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kingdom {
    IncertaeSedis,
    Animalia,
    Archaea,
    Bacteria,
    Chromista,
    Fungi,
    Plantae,
    Protozoa,
    Viruses,
}

impl Kingdom {
    pub const ALL: [Kingdom; 9] = [
        Kingdom::IncertaeSedis,
        Kingdom::Animalia,
        Kingdom::Archaea,
        Kingdom::Bacteria,
        Kingdom::Chromista,
        Kingdom::Fungi,
        Kingdom::Plantae,
        Kingdom::Protozoa,
        Kingdom::Viruses,
    ];

    pub fn scientific_name(self) -> &'static str {
        match self {
            Kingdom::IncertaeSedis => "incertae sedis",
            Kingdom::Animalia => "Animalia",
            Kingdom::Archaea => "Archaea",
            Kingdom::Bacteria => "Bacteria",
            Kingdom::Chromista => "Chromista",
            Kingdom::Fungi => "Fungi",
            Kingdom::Plantae => "Plantae",
            Kingdom::Protozoa => "Protozoa",
            Kingdom::Viruses => "Viruses",
        }
    }

    /// Collapses kingdoms into the three buckets used for homonym checks.
    ///
    /// Animals and protozoa share a nomenclatural code, as do plants, fungi
    /// and chromists. Everything else is uncertain.
    pub fn nub_bucket(self) -> Kingdom {
        match self {
            Kingdom::Animalia | Kingdom::Protozoa => Kingdom::Animalia,
            Kingdom::Plantae | Kingdom::Fungi | Kingdom::Chromista => Kingdom::Plantae,
            _ => Kingdom::IncertaeSedis,
        }
    }
}

impl fmt::Display for Kingdom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scientific_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxonomicStatus {
    Accepted,
    Doubtful,
    Synonym,
    HeterotypicSynonym,
    HomotypicSynonym,
    ProparteSynonym,
    Misapplied,
}

impl TaxonomicStatus {
    pub fn is_synonym(self) -> bool {
        !self.is_accepted()
    }

    /// Accepted and doubtful usages both count as accepted taxa.
    pub fn is_accepted(self) -> bool {
        matches!(self, TaxonomicStatus::Accepted | TaxonomicStatus::Doubtful)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NomenclaturalStatus {
    Legitimate,
    Valid,
    Illegitimate,
    Invalid,
    Conserved,
    Rejected,
    Doubtful,
    Nudum,
    Oblitum,
    Superfluous,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Origin {
    Source,
    DenormedClassification,
    VerbatimParent,
    VerbatimAccepted,
    VerbatimBasionym,
    MissingAccepted,
    ImplicitName,
    Autonym,
    Other,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Source => "SOURCE",
            Origin::DenormedClassification => "DENORMED_CLASSIFICATION",
            Origin::VerbatimParent => "VERBATIM_PARENT",
            Origin::VerbatimAccepted => "VERBATIM_ACCEPTED",
            Origin::VerbatimBasionym => "VERBATIM_BASIONYM",
            Origin::MissingAccepted => "MISSING_ACCEPTED",
            Origin::ImplicitName => "IMPLICIT_NAME",
            Origin::Autonym => "AUTONYM",
            Origin::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NameType {
    Scientific,
    Virus,
    Hybrid,
    Informal,
    Cultivar,
    Candidatus,
    Otu,
    Doubtful,
    Placeholder,
    NoName,
}

/// Validation flags attached to a usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NameUsageIssue {
    RankInvalid,
    TaxonomicStatusInvalid,
    NomenclaturalStatusInvalid,
    ScientificNameAssembled,
    AcceptedNameUsageIdInvalid,
    AcceptedNameMissing,
    AcceptedNameNotUnique,
    ParentNameUsageIdInvalid,
    ParentNameNotUnique,
    OriginalNameUsageIdInvalid,
    OriginalNameNotUnique,
    ClassificationNotApplied,
    /// Spelling kept as published in the issue vocabulary.
    ChainedSynoym,
    ParentCycle,
    RelationshipMissing,
    Homonym,
    NameParentMismatch,
}

impl NameUsageIssue {
    pub fn as_str(self) -> &'static str {
        match self {
            NameUsageIssue::RankInvalid => "RANK_INVALID",
            NameUsageIssue::TaxonomicStatusInvalid => "TAXONOMIC_STATUS_INVALID",
            NameUsageIssue::NomenclaturalStatusInvalid => "NOMENCLATURAL_STATUS_INVALID",
            NameUsageIssue::ScientificNameAssembled => "SCIENTIFIC_NAME_ASSEMBLED",
            NameUsageIssue::AcceptedNameUsageIdInvalid => "ACCEPTED_NAME_USAGE_ID_INVALID",
            NameUsageIssue::AcceptedNameMissing => "ACCEPTED_NAME_MISSING",
            NameUsageIssue::AcceptedNameNotUnique => "ACCEPTED_NAME_NOT_UNIQUE",
            NameUsageIssue::ParentNameUsageIdInvalid => "PARENT_NAME_USAGE_ID_INVALID",
            NameUsageIssue::ParentNameNotUnique => "PARENT_NAME_NOT_UNIQUE",
            NameUsageIssue::OriginalNameUsageIdInvalid => "ORIGINAL_NAME_USAGE_ID_INVALID",
            NameUsageIssue::OriginalNameNotUnique => "ORIGINAL_NAME_NOT_UNIQUE",
            NameUsageIssue::ClassificationNotApplied => "CLASSIFICATION_NOT_APPLIED",
            NameUsageIssue::ChainedSynoym => "CHAINED_SYNOYM",
            NameUsageIssue::ParentCycle => "PARENT_CYCLE",
            NameUsageIssue::RelationshipMissing => "RELATIONSHIP_MISSING",
            NameUsageIssue::Homonym => "HOMONYM",
            NameUsageIssue::NameParentMismatch => "NAME_PARENT_MISMATCH",
        }
    }
}

impl fmt::Display for NameUsageIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of comparing two values that may be incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Equality {
    Equal,
    Different,
    Unknown,
}

impl Equality {
    /// Combines two independent comparisons. Any difference wins, then any
    /// equality, otherwise the outcome stays unknown.
    pub fn and(self, other: Equality) -> Equality {
        match (self, other) {
            (Equality::Different, _) | (_, Equality::Different) => Equality::Different,
            (Equality::Equal, _) | (_, Equality::Equal) => Equality::Equal,
            _ => Equality::Unknown,
        }
    }
}
