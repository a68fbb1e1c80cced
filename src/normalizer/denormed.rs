//! Denormalized classification: flat higher-rank columns become parent chains

use super::metadata::InsertMetadata;
use super::{add_issue_remark, assign_parent, Placeholder};
use crate::model::{NameUsageIssue, Origin, Rank, TaxonomicStatus};
use crate::storage::{Direction, Label, NodeId, NodeProperty, RelType, StorageResult, UsageDao};
use crate::traverse;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
struct RankedName {
    node: NodeId,
    name: String,
    rank: Option<Rank>,
}

fn ranked_name(dao: &UsageDao, node: NodeId) -> StorageResult<RankedName> {
    let props = dao.graph().props(node)?.unwrap_or_default();
    Ok(RankedName {
        node,
        name: props.canonical_name.or(props.scientific_name).unwrap_or_default(),
        rank: props.rank,
    })
}

/// Links every node to the classification given by its higher-rank terms.
pub(super) fn apply(dao: &UsageDao, meta: &InsertMetadata) -> StorageResult<()> {
    info!("Start processing higher denormalized classification");
    if !meta.denormed_classification_mapped {
        info!("No higher classification mapped");
        return Ok(());
    }
    let mut cursor = dao.cursor()?;
    let mut last = None;
    loop {
        let page = dao.graph().node_ids_after(last, dao.batch_size())?;
        if page.is_empty() {
            break;
        }
        for node in page {
            apply_to_node(dao, meta, node)?;
            last = Some(node);
            if cursor.tick()? {
                info!(nodes = cursor.committed(), "Higher classifications processed");
            }
        }
    }
    let processed = cursor.finish()?;
    info!(nodes = processed, "Classification processing completed");
    Ok(())
}

fn apply_to_node(dao: &UsageDao, meta: &InsertMetadata, node: NodeId) -> StorageResult<()> {
    let Some(usage) = dao.read_usage(node, false)? else {
        return Ok(());
    };
    let highest = if meta.parent_name_mapped {
        let highest = match traverse::parents(dao.graph(), node)?.last() {
            Some(top) => ranked_name(dao, *top)?,
            None => ranked_name(dao, node)?,
        };
        if dao.graph().has_edge(highest.node, RelType::ParentOf, Direction::Incoming)? {
            debug!(node = %node, "Parent chain is a loop, left to cleanup");
            return Ok(());
        }
        if highest.node != node && highest.rank.map_or(true, Rank::is_uncomparable) {
            debug!(node = %node, "Existing classification ends in an uncomparable rank");
            return add_issue_remark(dao, node, None, &[NameUsageIssue::ClassificationNotApplied]);
        }
        highest
    } else {
        ranked_name(dao, node)?
    };

    // lowest rank first, only ranks above the highest known one
    let mut entries: Vec<(Rank, String)> = Rank::DWC_RANKS
        .iter()
        .filter(|r| highest.rank.map_or(true, |min| r.higher_than(min)))
        .filter_map(|r| usage.classification.get(*r).map(|name| (*r, name.to_string())))
        .collect();
    entries.reverse();

    // a rankless taxon repeating its own name as the first higher taxon
    if highest.rank.map_or(true, Rank::is_uncomparable) && entries.first().is_some_and(|(_, n)| *n == highest.name) {
        entries.remove(0);
    }
    update_classification(dao, highest.node, &entries)
}

/// Links `taxon` to the first entry, reusing an existing node whose own
/// parents match the remaining entries, and recurses upwards otherwise.
fn update_classification(dao: &UsageDao, taxon: NodeId, entries: &[(Rank, String)]) -> StorageResult<()> {
    let Some(((rank, name), higher)) = entries.split_first() else {
        return Ok(());
    };
    for candidate in dao.graph().find_nodes(NodeProperty::CanonicalName, name)? {
        if candidate != taxon
            && !dao.graph().has_label(candidate, Label::Synonym)?
            && matches_classification(dao, candidate, *rank, higher)?
        {
            return assign_parent(dao, candidate, taxon);
        }
    }
    let parent = Placeholder::new(Origin::DenormedClassification, name, TaxonomicStatus::Accepted)
        .rank(Some(*rank))
        .create(dao, true)?;
    assign_parent(dao, parent, taxon)?;
    update_classification(dao, parent, higher)
}

/// True if the node has a compatible rank and its parent chain starts with
/// the given higher entries.
fn matches_classification(dao: &UsageDao, node: NodeId, rank: Rank, higher: &[(Rank, String)]) -> StorageResult<bool> {
    let own = ranked_name(dao, node)?;
    if own.rank.is_some_and(|r| r != rank) {
        return Ok(false);
    }
    let parents = traverse::parents(dao.graph(), node)?;
    if parents.len() < higher.len() {
        return Ok(false);
    }
    for (parent, (rank, name)) in parents.into_iter().zip(higher) {
        let p = ranked_name(dao, parent)?;
        if p.name != *name || p.rank.is_some_and(|r| r != *rank) {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{MemoryArchive, StarRecord};
    use crate::model::Term;
    use crate::normalizer::inserter::Inserter;
    use crate::normalizer::relations::RelationResolver;
    use crate::parsers::BasicNameParser;
    use std::collections::HashMap;

    fn denormalize(archive: &MemoryArchive) -> UsageDao {
        let dao = UsageDao::temporary(10).unwrap();
        let parser = BasicNameParser::new().unwrap();
        let constituents = HashMap::new();
        let meta = Inserter::new(&dao, &parser, &constituents).insert(archive).unwrap();
        RelationResolver::new(&dao, &meta).run().unwrap();
        apply(&dao, &meta).unwrap();
        dao
    }

    fn by_name(dao: &UsageDao, name: &str) -> Vec<NodeId> {
        dao.graph().find_nodes(NodeProperty::CanonicalName, name).unwrap()
    }

    fn parent_names(dao: &UsageDao, node: NodeId) -> Vec<String> {
        traverse::parents(dao.graph(), node)
            .unwrap()
            .into_iter()
            .map(|p| ranked_name(dao, p).unwrap().name)
            .collect()
    }

    fn species(id: &str, name: &str, family: &str) -> StarRecord {
        StarRecord::new(id)
            .with(Term::TaxonId, id)
            .with(Term::ScientificName, name)
            .with(Term::TaxonRank, "species")
            .with(Term::Kingdom, "Plantae")
            .with(Term::Family, family)
            .with(Term::Genus, name.split(' ').next().unwrap())
    }

    #[test]
    fn test_builds_and_shares_higher_taxa() {
        let archive = MemoryArchive::new()
            .with_record(species("1", "Abies alba", "Pinaceae"))
            .with_record(species("2", "Abies nebrodensis", "Pinaceae"))
            .with_record(species("3", "Picea abies", "Pinaceae"));
        let dao = denormalize(&archive);
        for id in ["1", "3"] {
            let n = dao.graph().find_unique(NodeProperty::TaxonId, id).unwrap().unwrap();
            assert!(!dao.graph().has_label(n, Label::Root).unwrap());
        }
        let alba = by_name(&dao, "Abies alba")[0];
        assert_eq!(parent_names(&dao, alba), vec!["Abies", "Pinaceae", "Plantae"]);
        assert_eq!(by_name(&dao, "Abies").len(), 1);
        assert_eq!(by_name(&dao, "Pinaceae").len(), 1);
        assert_eq!(by_name(&dao, "Plantae").len(), 1);

        let genus = by_name(&dao, "Abies")[0];
        let g = dao.require_usage(genus).unwrap();
        assert_eq!(g.origin, Some(Origin::DenormedClassification));
        assert_eq!(g.rank, Some(Rank::Genus));
        assert_eq!(dao.graph().neighbours(genus, RelType::ParentOf, Direction::Outgoing).unwrap().len(), 2);

        let kingdom = by_name(&dao, "Plantae")[0];
        assert_eq!(dao.root_nodes().unwrap(), vec![kingdom]);
    }

    #[test]
    fn test_homonym_genera_stay_apart() {
        let archive = MemoryArchive::new()
            .with_record(species("1", "Oenanthe aquatica", "Apiaceae"))
            .with_record(species("2", "Oenanthe oenanthe", "Muscicapidae"));
        let dao = denormalize(&archive);
        assert_eq!(by_name(&dao, "Oenanthe").len(), 2);
    }

    #[test]
    fn test_continues_above_parent_chain() {
        let archive = MemoryArchive::new()
            .with_record(
                StarRecord::new("1")
                    .with(Term::TaxonId, "1")
                    .with(Term::ScientificName, "Abies")
                    .with(Term::TaxonRank, "genus")
                    .with(Term::Family, "Pinaceae"),
            )
            .with_record(
                StarRecord::new("2")
                    .with(Term::TaxonId, "2")
                    .with(Term::ScientificName, "Abies alba")
                    .with(Term::TaxonRank, "species")
                    .with(Term::ParentNameUsageId, "1")
                    .with(Term::Family, "Pinaceae"),
            );
        let dao = denormalize(&archive);
        let alba = by_name(&dao, "Abies alba")[0];
        assert_eq!(parent_names(&dao, alba), vec!["Abies", "Pinaceae"]);
        assert_eq!(by_name(&dao, "Pinaceae").len(), 1);
    }

    #[test]
    fn test_uncomparable_top_is_not_applied() {
        let archive = MemoryArchive::new()
            .with_record(
                StarRecord::new("1")
                    .with(Term::TaxonId, "1")
                    .with(Term::ScientificName, "Coniferae")
                    .with(Term::TaxonRank, "unranked"),
            )
            .with_record(
                StarRecord::new("2")
                    .with(Term::TaxonId, "2")
                    .with(Term::ScientificName, "Abies")
                    .with(Term::TaxonRank, "genus")
                    .with(Term::ParentNameUsageId, "1")
                    .with(Term::Family, "Pinaceae"),
            );
        let dao = denormalize(&archive);
        let abies = by_name(&dao, "Abies")[0];
        assert!(dao
            .require_usage(abies)
            .unwrap()
            .has_issue(NameUsageIssue::ClassificationNotApplied));
        assert!(by_name(&dao, "Pinaceae").is_empty());
    }
}
