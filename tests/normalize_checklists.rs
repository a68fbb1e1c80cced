//! Normalization of small checklists end to end
//!
//! Each test feeds an in-memory archive through all phases and checks the
//! resulting graph, the flagged issues and the run statistics.

mod common;

use common::{accepted, assert_invariants, node, nodes_named, normalize, parent, record, scientific_name, usage};
use taxograph::archive::MemoryArchive;
use taxograph::model::{NameUsageIssue, Origin, Rank, TaxonomicStatus, Term, INCERTAE_SEDIS};
use taxograph::storage::{Direction, Label, RelType};

fn synonym(id: &str, name: &str, accepted: &str) -> taxograph::archive::StarRecord {
    record(id, name)
        .with(Term::TaxonomicStatus, "synonym")
        .with(Term::AcceptedNameUsageId, accepted)
}

#[test]
fn test_synonym_chain_and_cycle() {
    let archive = MemoryArchive::new()
        .with_record(record("1", "Abies alba").with(Term::TaxonRank, "species"))
        .with_record(synonym("2", "Abies pectinata", "3"))
        .with_record(synonym("3", "Picea pectinata", "1"))
        .with_record(synonym("4", "Pinus pecten", "5"))
        .with_record(synonym("5", "Pinus pectus", "4"));
    let (dao, stats) = normalize(&archive);
    assert_invariants(&dao);

    let alba = node(&dao, "1");
    assert_eq!(accepted(&dao, node(&dao, "2")), vec![alba]);
    assert_eq!(accepted(&dao, node(&dao, "3")), vec![alba]);
    for id in ["2", "3", "4", "5"] {
        assert!(
            usage(&dao, node(&dao, id)).has_issue(NameUsageIssue::ChainedSynoym),
            "{id} not flagged as chained"
        );
    }
    assert!(!usage(&dao, alba).has_issue(NameUsageIssue::ChainedSynoym));

    // the cycle is cut at one member, both end up at one placeholder
    assert_eq!(stats.cycles.len(), 1);
    let cut = node(&dao, &stats.cycles[0]);
    assert!(usage(&dao, cut).has_issue(NameUsageIssue::ParentCycle));
    let (p4, p5) = (accepted(&dao, node(&dao, "4")), accepted(&dao, node(&dao, "5")));
    assert_eq!(p4, p5);
    assert_eq!(p4.len(), 1);
    let placeholder = usage(&dao, p4[0]);
    assert_eq!(placeholder.scientific_name.as_deref(), Some(INCERTAE_SEDIS));
    assert_eq!(placeholder.taxonomic_status, Some(TaxonomicStatus::Doubtful));
    assert_eq!(placeholder.origin, Some(Origin::MissingAccepted));

    assert_eq!(stats.records, 5);
    assert_eq!(stats.synonyms, 4);
    assert_eq!(stats.count_by_issue(NameUsageIssue::ChainedSynoym), 4);
}

#[test]
fn test_pro_parte_with_unresolved_first_id() {
    let archive = MemoryArchive::new()
        .with_delimiter(Term::AcceptedNameUsageId, "|")
        .with_record(record("2", "Picea abies").with(Term::TaxonRank, "species"))
        .with_record(synonym("3", "Pinus abies", "1|2"));
    let (dao, stats) = normalize(&archive);
    assert_invariants(&dao);

    let syn = node(&dao, "3");
    let placeholder = node(&dao, "1");
    assert_eq!(
        dao.graph().neighbours(syn, RelType::SynonymOf, Direction::Outgoing).unwrap(),
        vec![placeholder]
    );
    assert_eq!(
        dao.graph().neighbours(syn, RelType::ProparteSynonymOf, Direction::Outgoing).unwrap(),
        vec![node(&dao, "2")]
    );
    assert!(usage(&dao, syn).has_issue(NameUsageIssue::AcceptedNameUsageIdInvalid));
    assert_eq!(usage(&dao, placeholder).origin, Some(Origin::MissingAccepted));
    assert_eq!(stats.count_by_origin(Origin::MissingAccepted), 1);
    assert_eq!(stats.count_by_origin(Origin::Source), 2);
}

#[test]
fn test_denormalized_classification_builds_tree() {
    let species = |id: &str, name: &str, genus: &str| {
        record(id, name)
            .with(Term::TaxonRank, "species")
            .with(Term::Kingdom, "Plantae")
            .with(Term::Family, "Pinaceae")
            .with(Term::Genus, genus)
    };
    let archive = MemoryArchive::new()
        .with_record(species("1", "Abies alba", "Abies"))
        .with_record(species("2", "Abies grandis", "Abies"))
        .with_record(species("3", "Picea abies", "Picea"));
    let (dao, stats) = normalize(&archive);
    assert_invariants(&dao);

    for name in ["Plantae", "Pinaceae", "Abies", "Picea"] {
        assert_eq!(nodes_named(&dao, name).len(), 1, "{name} created more than once");
    }
    let abies = nodes_named(&dao, "Abies")[0];
    let pinaceae = nodes_named(&dao, "Pinaceae")[0];
    let plantae = nodes_named(&dao, "Plantae")[0];
    assert_eq!(parent(&dao, node(&dao, "1")), Some(abies));
    assert_eq!(parent(&dao, node(&dao, "2")), Some(abies));
    assert_eq!(parent(&dao, abies), Some(pinaceae));
    assert_eq!(parent(&dao, pinaceae), Some(plantae));
    assert!(dao.graph().has_label(plantae, Label::Root).unwrap());

    assert_eq!(stats.roots, 1);
    assert_eq!(stats.depth, 4);
    assert_eq!(stats.count_by_origin(Origin::DenormedClassification), 4);
    assert_eq!(stats.count_by_rank(Rank::Species), 3);
    assert_eq!(stats.count_by_rank(Rank::Genus), 2);

    let family = dao.read_metrics(pinaceae).unwrap().unwrap();
    assert_eq!(family.num_children, 2);
    assert_eq!(family.num_descendants, 5);
    assert_eq!(family.num_species, 3);
    assert_eq!(family.depth, 2);
    let kingdom = dao.read_metrics(plantae).unwrap().unwrap();
    assert_eq!(kingdom.num_descendants, 6);
    assert_eq!(kingdom.depth, 1);
}

#[test]
fn test_synonym_classification_moves_to_accepted() {
    let archive = MemoryArchive::new()
        .with_record(record("1", "Abies").with(Term::TaxonRank, "genus"))
        .with_record(record("2", "Abies alba").with(Term::TaxonRank, "species"))
        .with_record(
            synonym("3", "Abies pectinata", "2")
                .with(Term::TaxonRank, "species")
                .with(Term::ParentNameUsageId, "1"),
        );
    let (dao, stats) = normalize(&archive);
    assert_invariants(&dao);

    let (genus, alba, syn) = (node(&dao, "1"), node(&dao, "2"), node(&dao, "3"));
    assert_eq!(parent(&dao, syn), None);
    assert_eq!(parent(&dao, alba), Some(genus));
    assert!(!dao.graph().has_label(alba, Label::Root).unwrap());
    let remarks = usage(&dao, alba).remarks.unwrap_or_default();
    assert!(remarks.contains("Abies pectinata"), "unexpected remarks {remarks}");
    assert_eq!(stats.roots, 1);
    assert_eq!(dao.read_metrics(alba).unwrap().unwrap().num_synonyms, 1);
}

#[test]
fn test_parent_cycle_is_broken() {
    let archive = MemoryArchive::new()
        .with_record(
            record("1", "Pinaceae")
                .with(Term::TaxonRank, "family")
                .with(Term::ParentNameUsageId, "2"),
        )
        .with_record(
            record("2", "Abies")
                .with(Term::TaxonRank, "genus")
                .with(Term::ParentNameUsageId, "1"),
        );
    let (dao, stats) = normalize(&archive);
    assert_invariants(&dao);

    let (family, genus) = (node(&dao, "1"), node(&dao, "2"));
    assert_eq!(stats.cycles, vec!["1".to_string()]);
    assert_eq!(parent(&dao, genus), Some(family));
    assert_eq!(parent(&dao, family), None);
    assert!(!dao.graph().has_label(genus, Label::Root).unwrap());
    assert!(dao.graph().has_label(family, Label::Root).unwrap());
    assert!(usage(&dao, family).has_issue(NameUsageIssue::ParentCycle));
    assert_eq!(stats.roots, 1);
    assert_eq!(stats.depth, 2);
}

#[test]
fn test_missing_parent_id_gets_placeholder() {
    let archive = MemoryArchive::new()
        .with_record(
            record("1", "Abies alba")
                .with(Term::ParentNameUsageId, "7")
                .with(Term::ParentNameUsage, "Abies"),
        )
        .with_record(record("2", "Abies grandis").with(Term::ParentNameUsageId, "7"));
    let (dao, stats) = normalize(&archive);
    assert_invariants(&dao);

    let placeholder = node(&dao, "7");
    assert_eq!(scientific_name(&dao, placeholder), "Abies");
    assert_eq!(parent(&dao, node(&dao, "1")), Some(placeholder));
    assert_eq!(parent(&dao, node(&dao, "2")), Some(placeholder));
    assert_eq!(stats.count_by_issue(NameUsageIssue::ParentNameUsageIdInvalid), 2);
    assert_eq!(stats.count_by_origin(Origin::VerbatimParent), 1);
    assert_eq!(stats.roots, 1);
}

#[test]
fn test_normalization_is_deterministic() {
    let archive = MemoryArchive::new()
        .with_delimiter(Term::AcceptedNameUsageId, "|")
        .with_record(record("1", "Abies").with(Term::TaxonRank, "genus").with(Term::Family, "Pinaceae"))
        .with_record(record("2", "Abies alba").with(Term::ParentNameUsageId, "1"))
        .with_record(synonym("3", "Abies pectinata", "2|9"))
        .with_record(synonym("4", "Pinus pecten", "5"))
        .with_record(synonym("5", "Pinus pectus", "4"));
    let (first_dao, first) = normalize(&archive);
    let (second_dao, second) = normalize(&archive);

    let mut first = first;
    first.started = second.started;
    first.finished = second.finished;
    assert_eq!(first, second);

    for rel_type in [RelType::ParentOf, RelType::SynonymOf, RelType::ProparteSynonymOf] {
        let edges = |dao: &taxograph::UsageDao| -> Vec<(String, String)> {
            dao.graph()
                .all_edges(rel_type)
                .unwrap()
                .into_iter()
                .map(|r| (scientific_name(dao, r.start), scientific_name(dao, r.end)))
                .collect()
        };
        assert_eq!(edges(&first_dao), edges(&second_dao), "{rel_type:?} edges differ");
    }
}
