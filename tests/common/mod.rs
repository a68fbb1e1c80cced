//! Shared helpers for the integration tests
//!
//! Archives are built in memory from loosely linked records, normalized
//! into a temporary dao and then checked against the graph invariants every
//! normalized checklist must satisfy.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use taxograph::archive::{MemoryArchive, StarRecord};
use taxograph::model::{NameUsage, Term};
use taxograph::storage::{Direction, Label, NodeId, NodeProperty, RelType};
use taxograph::{Normalizer, NormalizerStats, UsageDao};

/// Routes tracing output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn record(id: &str, name: &str) -> StarRecord {
    StarRecord::new(id)
        .with(Term::TaxonId, id)
        .with(Term::ScientificName, name)
}

/// Normalizes an archive into a fresh temporary dao.
pub fn normalize(archive: &MemoryArchive) -> (UsageDao, NormalizerStats) {
    init_tracing();
    let dao = UsageDao::temporary(7).unwrap();
    let stats = Normalizer::with_default_parser(&dao)
        .unwrap()
        .run(archive)
        .unwrap();
    (dao, stats)
}

/// The single node of a source record.
pub fn node(dao: &UsageDao, taxon_id: &str) -> NodeId {
    dao.graph()
        .find_unique(NodeProperty::TaxonId, taxon_id)
        .unwrap()
        .unwrap_or_else(|| panic!("no usage with taxonID {taxon_id}"))
}

/// All nodes with the given scientific name, in creation order.
pub fn nodes_named(dao: &UsageDao, name: &str) -> Vec<NodeId> {
    dao.graph().find_nodes(NodeProperty::ScientificName, name).unwrap()
}

pub fn usage(dao: &UsageDao, node: NodeId) -> NameUsage {
    dao.require_usage(node).unwrap()
}

pub fn accepted(dao: &UsageDao, node: NodeId) -> Vec<NodeId> {
    let graph = dao.graph();
    let mut accepted = graph.neighbours(node, RelType::SynonymOf, Direction::Outgoing).unwrap();
    accepted.extend(graph.neighbours(node, RelType::ProparteSynonymOf, Direction::Outgoing).unwrap());
    accepted
}

pub fn parent(dao: &UsageDao, node: NodeId) -> Option<NodeId> {
    dao.graph()
        .neighbours(node, RelType::ParentOf, Direction::Incoming)
        .unwrap()
        .first()
        .copied()
}

pub fn scientific_name(dao: &UsageDao, node: NodeId) -> String {
    dao.graph()
        .props(node)
        .unwrap()
        .and_then(|p| p.scientific_name)
        .unwrap_or_default()
}

/// Checks the structural guarantees of a normalized graph.
pub fn assert_invariants(dao: &UsageDao) {
    let graph = dao.graph();
    let synonyms: BTreeSet<NodeId> = graph.nodes_with_label(Label::Synonym).unwrap().into_iter().collect();

    for node in dao.all_nodes().unwrap() {
        let u = usage(dao, node);
        let is_synonym = synonyms.contains(&node);
        let accepted_edges = graph.edges(node, Some(RelType::SynonymOf), Direction::Outgoing).unwrap();
        let parents = graph.edges(node, Some(RelType::ParentOf), Direction::Incoming).unwrap();

        assert_eq!(u.synonym, is_synonym, "synonym label of {node} disagrees with its flag");
        assert_eq!(
            u.taxonomic_status.is_some_and(|s| s.is_synonym()),
            is_synonym,
            "synonym label of {node} disagrees with its status"
        );
        assert_eq!(!accepted_edges.is_empty(), is_synonym, "accepted edge of {node} disagrees with its label");
        assert!(accepted_edges.len() <= 1, "{node} has several accepted usages");
        assert!(parents.len() <= 1, "{node} has several parents");

        for rel in &accepted_edges {
            assert!(!synonyms.contains(&rel.end), "{node} is a synonym of the synonym {}", rel.end);
        }
        if is_synonym {
            assert!(parents.is_empty(), "synonym {node} has a parent");
            assert!(!graph.has_label(node, Label::Root).unwrap(), "synonym {node} is a root");
            assert!(
                graph.edges(node, Some(RelType::ParentOf), Direction::Outgoing).unwrap().is_empty(),
                "synonym {node} has children"
            );
        } else {
            assert_eq!(
                parents.is_empty(),
                graph.has_label(node, Label::Root).unwrap(),
                "root label of {node} disagrees with its parent"
            );
        }
    }
    assert_acyclic(dao);
}

fn assert_acyclic(dao: &UsageDao) {
    let mut parent_of = HashMap::new();
    for rel in dao.graph().all_edges(RelType::ParentOf).unwrap() {
        parent_of.insert(rel.end, rel.start);
    }
    for &start in parent_of.keys() {
        let mut seen = BTreeSet::from([start]);
        let mut current = start;
        while let Some(&p) = parent_of.get(&current) {
            assert!(seen.insert(p), "classification loop through {start}");
            current = p;
        }
    }
}
