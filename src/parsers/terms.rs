//! Lookup parsers for controlled term values

use crate::model::{Kingdom, NomenclaturalStatus, Rank, TaxonomicStatus};

/// Outcome of parsing a term value. Parsers never fail hard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult<T> {
    Success(T),
    Failure,
}

impl<T> ParseResult<T> {
    pub fn is_successful(&self) -> bool {
        matches!(self, ParseResult::Success(_))
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            ParseResult::Success(v) => Some(v),
            ParseResult::Failure => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            ParseResult::Success(v) => Some(v),
            ParseResult::Failure => None,
        }
    }
}

/// Parses a verbatim term value into a controlled vocabulary entry
pub trait TermParser<T> {
    fn parse(&self, value: &str) -> ParseResult<T>;
}

/// Lower-cases and drops everything but letters and digits, so that
/// `Nom. illeg.`, `nom illeg` and `NOM_ILLEG` all read the same.
fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn lookup<T: Copy>(value: &str, table: &[(&str, T)]) -> ParseResult<T> {
    let key = normalize(value);
    if key.is_empty() {
        return ParseResult::Failure;
    }
    table
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| ParseResult::Success(*v))
        .unwrap_or(ParseResult::Failure)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RankParser;

const RANKS: &[(&str, Rank)] = &[
    ("domain", Rank::Domain),
    ("superkingdom", Rank::Domain),
    ("kingdom", Rank::Kingdom),
    ("regnum", Rank::Kingdom),
    ("subkingdom", Rank::Subkingdom),
    ("phylum", Rank::Phylum),
    ("division", Rank::Phylum),
    ("divisio", Rank::Phylum),
    ("subphylum", Rank::Subphylum),
    ("subdivision", Rank::Subphylum),
    ("superclass", Rank::Superclass),
    ("class", Rank::Class),
    ("classis", Rank::Class),
    ("subclass", Rank::Subclass),
    ("subclassis", Rank::Subclass),
    ("superorder", Rank::Superorder),
    ("order", Rank::Order),
    ("ordo", Rank::Order),
    ("suborder", Rank::Suborder),
    ("infraorder", Rank::Infraorder),
    ("superfamily", Rank::Superfamily),
    ("family", Rank::Family),
    ("familia", Rank::Family),
    ("fam", Rank::Family),
    ("subfamily", Rank::Subfamily),
    ("subfam", Rank::Subfamily),
    ("tribe", Rank::Tribe),
    ("tribus", Rank::Tribe),
    ("subtribe", Rank::Subtribe),
    ("supragenericname", Rank::SupragenericName),
    ("genus", Rank::Genus),
    ("gen", Rank::Genus),
    ("subgenus", Rank::Subgenus),
    ("subgen", Rank::Subgenus),
    ("section", Rank::Section),
    ("sect", Rank::Section),
    ("series", Rank::Series),
    ("ser", Rank::Series),
    ("infragenericname", Rank::InfragenericName),
    ("speciesaggregate", Rank::SpeciesAggregate),
    ("agg", Rank::SpeciesAggregate),
    ("species", Rank::Species),
    ("sp", Rank::Species),
    ("spec", Rank::Species),
    ("infraspecificname", Rank::InfraspecificName),
    ("infraspecies", Rank::InfraspecificName),
    ("subspecies", Rank::Subspecies),
    ("subsp", Rank::Subspecies),
    ("ssp", Rank::Subspecies),
    ("infrasubspecificname", Rank::InfrasubspecificName),
    ("variety", Rank::Variety),
    ("varietas", Rank::Variety),
    ("var", Rank::Variety),
    ("subvariety", Rank::Subvariety),
    ("subvar", Rank::Subvariety),
    ("form", Rank::Form),
    ("forma", Rank::Form),
    ("f", Rank::Form),
    ("fo", Rank::Form),
    ("subform", Rank::Subform),
    ("subf", Rank::Subform),
    ("cultivar", Rank::Cultivar),
    ("cv", Rank::Cultivar),
    ("strain", Rank::Strain),
    ("other", Rank::Other),
    ("informal", Rank::Informal),
    ("unranked", Rank::Unranked),
    ("norank", Rank::Unranked),
];

impl TermParser<Rank> for RankParser {
    fn parse(&self, value: &str) -> ParseResult<Rank> {
        lookup(value, RANKS)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TaxStatusParser;

const TAX_STATUS: &[(&str, TaxonomicStatus)] = &[
    ("accepted", TaxonomicStatus::Accepted),
    ("acceptedname", TaxonomicStatus::Accepted),
    ("valid", TaxonomicStatus::Accepted),
    ("validname", TaxonomicStatus::Accepted),
    ("doubtful", TaxonomicStatus::Doubtful),
    ("taxoninquirendum", TaxonomicStatus::Doubtful),
    ("provisionallyaccepted", TaxonomicStatus::Doubtful),
    ("synonym", TaxonomicStatus::Synonym),
    ("invalid", TaxonomicStatus::Synonym),
    ("heterotypicsynonym", TaxonomicStatus::HeterotypicSynonym),
    ("subjectivesynonym", TaxonomicStatus::HeterotypicSynonym),
    ("homotypicsynonym", TaxonomicStatus::HomotypicSynonym),
    ("objectivesynonym", TaxonomicStatus::HomotypicSynonym),
    ("nomenclaturalsynonym", TaxonomicStatus::HomotypicSynonym),
    ("proparte", TaxonomicStatus::ProparteSynonym),
    ("propartesynonym", TaxonomicStatus::ProparteSynonym),
    ("misapplied", TaxonomicStatus::Misapplied),
    ("misappliedname", TaxonomicStatus::Misapplied),
];

impl TermParser<TaxonomicStatus> for TaxStatusParser {
    fn parse(&self, value: &str) -> ParseResult<TaxonomicStatus> {
        lookup(value, TAX_STATUS)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NomStatusParser;

const NOM_STATUS: &[(&str, NomenclaturalStatus)] = &[
    ("legitimate", NomenclaturalStatus::Legitimate),
    ("nomlegit", NomenclaturalStatus::Legitimate),
    ("valid", NomenclaturalStatus::Valid),
    ("available", NomenclaturalStatus::Valid),
    ("illegitimate", NomenclaturalStatus::Illegitimate),
    ("nomillegit", NomenclaturalStatus::Illegitimate),
    ("nomilleg", NomenclaturalStatus::Illegitimate),
    ("invalid", NomenclaturalStatus::Invalid),
    ("nominval", NomenclaturalStatus::Invalid),
    ("conserved", NomenclaturalStatus::Conserved),
    ("nomcons", NomenclaturalStatus::Conserved),
    ("rejected", NomenclaturalStatus::Rejected),
    ("nomrej", NomenclaturalStatus::Rejected),
    ("nomrejic", NomenclaturalStatus::Rejected),
    ("doubtful", NomenclaturalStatus::Doubtful),
    ("nomdub", NomenclaturalStatus::Doubtful),
    ("nomendubium", NomenclaturalStatus::Doubtful),
    ("nudum", NomenclaturalStatus::Nudum),
    ("nomnud", NomenclaturalStatus::Nudum),
    ("nomennudum", NomenclaturalStatus::Nudum),
    ("oblitum", NomenclaturalStatus::Oblitum),
    ("nomenoblitum", NomenclaturalStatus::Oblitum),
    ("superfluous", NomenclaturalStatus::Superfluous),
    ("nomsuperfl", NomenclaturalStatus::Superfluous),
    ("unavailable", NomenclaturalStatus::Unavailable),
];

impl TermParser<NomenclaturalStatus> for NomStatusParser {
    fn parse(&self, value: &str) -> ParseResult<NomenclaturalStatus> {
        lookup(value, NOM_STATUS)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct KingdomParser;

const KINGDOMS: &[(&str, Kingdom)] = &[
    ("animalia", Kingdom::Animalia),
    ("animals", Kingdom::Animalia),
    ("metazoa", Kingdom::Animalia),
    ("plantae", Kingdom::Plantae),
    ("plants", Kingdom::Plantae),
    ("viridiplantae", Kingdom::Plantae),
    ("fungi", Kingdom::Fungi),
    ("chromista", Kingdom::Chromista),
    ("protozoa", Kingdom::Protozoa),
    ("bacteria", Kingdom::Bacteria),
    ("archaea", Kingdom::Archaea),
    ("viruses", Kingdom::Viruses),
    ("virus", Kingdom::Viruses),
    ("incertaesedis", Kingdom::IncertaeSedis),
];

impl TermParser<Kingdom> for KingdomParser {
    fn parse(&self, value: &str) -> ParseResult<Kingdom> {
        lookup(value, KINGDOMS)
    }
}
