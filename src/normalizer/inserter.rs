//! Insert phase: one node per usable core record

use super::metadata::InsertMetadata;
use super::NormalizationResult;
use crate::archive::{Archive, StarRecord};
use crate::model::{
    ExtensionInterpreter, NameUsage, NameUsageIssue, Origin, ParsedName, Rank, Term, VerbatimUsage,
};
use crate::parsers::{NameParser, NomStatusParser, RankParser, TaxStatusParser, TermParser};
use crate::storage::{StorageResult, UsageDao};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

const NULL_MARKERS: [&str; 4] = ["\\N", "NULL", "\\NULL", "null"];

/// Trims a raw value, treating empty strings and null markers as absent.
pub fn clean(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || NULL_MARKERS.contains(&trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Why a record does not become a node
#[derive(Debug)]
struct Ignored(&'static str);

pub(super) struct Inserter<'a> {
    dao: &'a UsageDao,
    parser: &'a dyn NameParser,
    constituents: &'a HashMap<String, Uuid>,
    extensions: ExtensionInterpreter,
}

impl<'a> Inserter<'a> {
    pub(super) fn new(dao: &'a UsageDao, parser: &'a dyn NameParser, constituents: &'a HashMap<String, Uuid>) -> Self {
        Self {
            dao,
            parser,
            constituents,
            extensions: ExtensionInterpreter,
        }
    }

    /// Inserts all records in bulk mode and builds the indexes afterwards.
    pub(super) fn insert(&self, archive: &dyn Archive) -> NormalizationResult<InsertMetadata> {
        let mut meta = InsertMetadata::from_schema(archive.schema());
        if meta.core_id_used {
            warn!("Using core ID for taxonID");
        }
        let records = archive.records()?;

        self.dao.graph().enter_bulk_mode()?;
        let mut cursor = self.dao.cursor()?;
        for record in records {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable record");
                    meta.ignored += 1;
                    continue;
                }
            };
            match self.insert_record(&record, &mut meta)? {
                Ok(()) => {
                    if cursor.tick()? && meta.records % (self.dao.batch_size() * 10) == 0 {
                        info!(records = meta.records, "Inserts done");
                    }
                }
                Err(Ignored(reason)) => {
                    meta.ignored += 1;
                    info!(id = record.id.as_deref().unwrap_or(""), reason, "Ignoring record");
                }
            }
        }
        cursor.finish()?;
        self.dao.graph().close_bulk_mode()?;
        info!(records = meta.records, ignored = meta.ignored, "Data insert completed");
        Ok(meta)
    }

    fn insert_record(
        &self,
        record: &StarRecord,
        meta: &mut InsertMetadata,
    ) -> StorageResult<Result<(), Ignored>> {
        let v = verbatim(record, meta.core_id_used);
        let usage = match self.build_usage(&v) {
            Ok(usage) => usage,
            Err(ignored) => return Ok(Err(ignored)),
        };
        let node = self.dao.create_usage(&usage)?;
        self.dao.store_verbatim(node, &v)?;
        let extensions = self.extensions.interpret(&v);
        if !extensions.is_empty() {
            self.dao.store_extensions(node, &extensions)?;
        }
        meta.records += 1;
        meta.inc_rank(usage.rank);
        Ok(Ok(()))
    }

    fn build_usage(&self, v: &VerbatimUsage) -> Result<NameUsage, Ignored> {
        let mut u = NameUsage::new();
        u.taxon_id = v.core_field(Term::TaxonId).map(str::to_string);
        u.origin = Some(Origin::Source);
        if let Some(dataset) = v.core_field(Term::DatasetId) {
            u.constituent_key = self.constituents.get(dataset).copied();
        }

        for (rank, term) in Rank::DWC_RANKS.iter().zip(Term::CLASSIFICATION) {
            u.classification.set(*rank, v.core_field(term).map(str::to_string));
        }

        if let Some(rank) = v.first_of(&[Term::TaxonRank, Term::VerbatimTaxonRank]) {
            match RankParser.parse(rank).into_option() {
                Some(rank) => u.rank = Some(rank),
                None => u.add_issue(NameUsageIssue::RankInvalid),
            }
        }

        let pn = self.set_scientific_name(&mut u, v)?;

        if let Some(status) = v.core_field(Term::TaxonomicStatus) {
            match TaxStatusParser.parse(status).into_option() {
                Some(status) => u.set_status(status),
                None => u.add_issue(NameUsageIssue::TaxonomicStatusInvalid),
            }
        }
        if let Some(status) = v.core_field(Term::NomenclaturalStatus) {
            match NomStatusParser.parse(status).into_option() {
                Some(status) => {
                    u.nomenclatural_status.insert(status);
                }
                None => u.add_issue(NameUsageIssue::NomenclaturalStatusInvalid),
            }
        }
        if let Some(status) = pn.nom_status.as_deref().and_then(|s| NomStatusParser.parse(s).into_option()) {
            u.nomenclatural_status.insert(status);
        }

        u.published_in = v.core_field(Term::NamePublishedIn).map(str::to_string);
        u.according_to = v.core_field(Term::NameAccordingTo).map(str::to_string);
        u.remarks = v.core_field(Term::TaxonRemarks).map(str::to_string);
        u.authorship = v
            .core_field(Term::ScientificNameAuthorship)
            .map(str::to_string)
            .or_else(|| pn.authorship_complete());
        u.references = v.first_of(&[Term::References, Term::Source]).map(str::to_string);
        Ok(u)
    }

    /// Sets scientific and canonical name, parsing the verbatim name or
    /// assembling one from atomized name parts.
    fn set_scientific_name(&self, u: &mut NameUsage, v: &VerbatimUsage) -> Result<ParsedName, Ignored> {
        let sciname = v.core_field(Term::ScientificName);
        let pn = match sciname {
            Some(name) => match self.parser.parse(name, u.rank) {
                Ok(mut pn) => {
                    let author = v.core_field(Term::ScientificNameAuthorship);
                    if let Some(author) = author.filter(|a| !name.contains(a) && pn.authorship.is_none()) {
                        u.add_issue(NameUsageIssue::ScientificNameAssembled);
                        pn.authorship = Some(author.to_string());
                        if pn.year.is_none() {
                            pn.year = v.core_field(Term::NamePublishedInYear).map(str::to_string);
                        }
                    }
                    pn
                }
                Err(e) => {
                    debug!(name_type = ?e.name_type, name = %e.name, "Unparsable name");
                    ParsedName::new(name, e.name_type)
                }
            },
            None => {
                let genus = v.first_of(&[Term::GenericName, Term::Genus]).ok_or(Ignored("No name found"))?;
                u.add_issue(NameUsageIssue::ScientificNameAssembled);
                ParsedName::from_parts(
                    genus,
                    v.core_field(Term::SpecificEpithet).map(str::to_string),
                    v.core_field(Term::InfraspecificEpithet).map(str::to_string),
                    u.rank,
                )
                .with_authorship(
                    v.core_field(Term::ScientificNameAuthorship).map(str::to_string),
                    v.core_field(Term::NamePublishedInYear).map(str::to_string),
                )
            }
        };

        u.scientific_name = if u.has_issue(NameUsageIssue::ScientificNameAssembled) {
            Some(pn.full_name())
        } else {
            sciname.map(str::to_string)
        };
        u.canonical_name = pn.canonical_name().filter(|c| !c.is_empty());
        u.name_type = Some(pn.name_type);
        Ok(pn)
    }
}

/// Builds the cleaned verbatim record of a star record.
fn verbatim(record: &StarRecord, core_id_used: bool) -> VerbatimUsage {
    let mut v = VerbatimUsage::new();
    v.core_id = record.id.as_deref().and_then(clean);
    for (term, value) in &record.core {
        v.set_core_field(*term, clean(value));
    }
    // set last to override any taxonID column
    let taxon_id = if core_id_used {
        v.core_id.clone()
    } else {
        record.get(Term::TaxonId).and_then(clean)
    };
    v.set_core_field(Term::TaxonId, taxon_id);

    for (ext, rows) in &record.extensions {
        let cleaned = rows
            .iter()
            .map(|row| {
                row.iter()
                    .filter_map(|(term, value)| Some((*term, clean(value)?)))
                    .collect()
            })
            .collect();
        v.extensions.insert(*ext, cleaned);
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;
    use crate::model::{Extension, NameType, NomenclaturalStatus, TaxonomicStatus};
    use crate::parsers::BasicNameParser;
    use crate::normalizer::NormalizationError;
    use crate::storage::StorageError;
    use std::collections::BTreeMap;

    fn insert(archive: &MemoryArchive) -> (UsageDao, NormalizationResult<InsertMetadata>) {
        let dao = UsageDao::temporary(2).unwrap();
        let parser = BasicNameParser::new().unwrap();
        let constituents = HashMap::new();
        let meta = Inserter::new(&dao, &parser, &constituents).insert(archive);
        (dao, meta)
    }

    fn first_usage(dao: &UsageDao) -> NameUsage {
        let node = dao.all_nodes().unwrap()[0];
        dao.require_usage(node).unwrap()
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean("  Abies "), Some("Abies".to_string()));
        assert_eq!(clean(""), None);
        assert_eq!(clean("   "), None);
        assert_eq!(clean("\\N"), None);
        assert_eq!(clean("NULL"), None);
    }

    #[test]
    fn test_interprets_terms() {
        let archive = MemoryArchive::new().with_record(
            StarRecord::new("1")
                .with(Term::TaxonId, "1")
                .with(Term::ScientificName, "Abies alba Mill.")
                .with(Term::TaxonRank, "species")
                .with(Term::TaxonomicStatus, "synonym")
                .with(Term::NomenclaturalStatus, "nom. illeg.")
                .with(Term::Family, "Pinaceae")
                .with(Term::NamePublishedIn, " ")
                .with_extension(
                    Extension::VernacularName,
                    BTreeMap::from([(Term::VernacularName, "Silver fir".to_string())]),
                ),
        );
        let (dao, meta) = insert(&archive);
        let meta = meta.unwrap();
        assert_eq!(meta.records, 1);
        assert_eq!(meta.ranks.get(&Rank::Species), Some(&1));

        let u = first_usage(&dao);
        assert_eq!(u.taxon_id.as_deref(), Some("1"));
        assert_eq!(u.scientific_name.as_deref(), Some("Abies alba Mill."));
        assert_eq!(u.canonical_name.as_deref(), Some("Abies alba"));
        assert_eq!(u.rank, Some(Rank::Species));
        assert_eq!(u.taxonomic_status, Some(TaxonomicStatus::Synonym));
        assert!(u.synonym);
        assert!(u.nomenclatural_status.contains(&NomenclaturalStatus::Illegitimate));
        assert_eq!(u.classification.family.as_deref(), Some("Pinaceae"));
        assert_eq!(u.published_in, None);
        assert_eq!(u.origin, Some(Origin::Source));

        let node = dao.all_nodes().unwrap()[0];
        let ext = dao.read_extensions(node).unwrap().unwrap();
        assert_eq!(ext.vernacular_names[0].name, "Silver fir");
    }

    #[test]
    fn test_invalid_terms_become_issues() {
        let archive = MemoryArchive::new().with_record(
            StarRecord::new("1")
                .with(Term::TaxonId, "1")
                .with(Term::ScientificName, "Abies")
                .with(Term::TaxonRank, "bogus rank")
                .with(Term::TaxonomicStatus, "whatever"),
        );
        let (dao, meta) = insert(&archive);
        assert_eq!(meta.unwrap().records, 1);
        let u = first_usage(&dao);
        assert!(u.has_issue(NameUsageIssue::RankInvalid));
        assert!(u.has_issue(NameUsageIssue::TaxonomicStatusInvalid));
        assert_eq!(u.rank, None);
    }

    #[test]
    fn test_assembles_names() {
        let archive = MemoryArchive::new()
            .with_record(
                StarRecord::new("1")
                    .with(Term::TaxonId, "1")
                    .with(Term::ScientificName, "Abies alba")
                    .with(Term::ScientificNameAuthorship, "Mill."),
            )
            .with_record(
                StarRecord::new("2")
                    .with(Term::TaxonId, "2")
                    .with(Term::Genus, "Picea")
                    .with(Term::SpecificEpithet, "abies")
                    .with(Term::ScientificNameAuthorship, "(L.) H.Karst."),
            )
            .with_record(StarRecord::new("3").with(Term::TaxonId, "3").with(Term::TaxonRank, "species"));
        let (dao, meta) = insert(&archive);
        let meta = meta.unwrap();
        assert_eq!(meta.records, 2);
        assert_eq!(meta.ignored, 1);

        let nodes = dao.all_nodes().unwrap();
        let abies = dao.require_usage(nodes[0]).unwrap();
        assert!(abies.has_issue(NameUsageIssue::ScientificNameAssembled));
        assert_eq!(abies.scientific_name.as_deref(), Some("Abies alba Mill."));

        let picea = dao.require_usage(nodes[1]).unwrap();
        assert!(picea.has_issue(NameUsageIssue::ScientificNameAssembled));
        assert_eq!(picea.canonical_name.as_deref(), Some("Picea abies"));
        assert_eq!(picea.name_type, Some(NameType::Scientific));
    }

    #[test]
    fn test_core_id_used_as_taxon_id() {
        let archive = MemoryArchive::new()
            .with_record(StarRecord::new(" 7 ").with(Term::ScientificName, "Abies"));
        let (dao, meta) = insert(&archive);
        assert!(meta.unwrap().core_id_used);
        assert_eq!(first_usage(&dao).taxon_id.as_deref(), Some("7"));
    }

    #[test]
    fn test_duplicate_taxon_ids_fail_loudly() {
        let archive = MemoryArchive::new()
            .with_record(StarRecord::new("a").with(Term::TaxonId, "1").with(Term::ScientificName, "Abies"))
            .with_record(StarRecord::new("b").with(Term::TaxonId, "1").with(Term::ScientificName, "Picea"));
        let (_dao, meta) = insert(&archive);
        match meta {
            Err(NormalizationError::Storage(StorageError::TaxonIdNotUnique {
                taxon_id,
                existing,
                added,
            })) => {
                assert_eq!(taxon_id, "1");
                assert!(existing < added);
            }
            other => panic!("expected duplicate taxonID error, got {other:?}"),
        }
    }
}
