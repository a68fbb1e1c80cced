//! Cleanup phase: synonym cycles and chains, parent edges on synonyms and
//! classification loops

use super::{add_issue_remark, assign_parent, create_synonym_rel, Placeholder};
use crate::model::{NameUsageIssue, Origin, Rank, TaxonomicStatus, INCERTAE_SEDIS};
use crate::storage::{Direction, Label, NodeId, RelType, Relationship, StorageResult, UsageDao};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// Synonym relation per synonym node
fn synonym_edges(dao: &UsageDao) -> StorageResult<BTreeMap<NodeId, Relationship>> {
    let mut edges = BTreeMap::new();
    for rel in dao.graph().all_edges(RelType::SynonymOf)? {
        edges.entry(rel.start).or_insert(rel);
    }
    Ok(edges)
}

/// Parent relation per child node
fn parent_edges(dao: &UsageDao) -> StorageResult<BTreeMap<NodeId, Relationship>> {
    let mut edges = BTreeMap::new();
    for rel in dao.graph().all_edges(RelType::ParentOf)? {
        edges.entry(rel.end).or_insert(rel);
    }
    Ok(edges)
}

/// Runs all cleanup steps and returns the taxonIDs of the usages whose
/// synonym or parent cycle was cut.
pub(super) fn cleanup(dao: &UsageDao) -> StorageResult<Vec<String>> {
    info!("Cleanup relations");
    dao.begin()?;
    let mut cycles = cut_synonym_cycles(dao)?;
    dao.commit()?;
    dao.begin()?;
    let chained = relink_synonym_chains(dao)?;
    dao.commit()?;
    info!(cycles = cycles.len(), chained, "Synonym relations cleaned up");
    move_synonym_parents(dao)?;
    dao.begin()?;
    let parent_cycles = cut_parent_cycles(dao)?;
    dao.commit()?;
    info!(parent_cycles = parent_cycles.len(), "Parent cycles cut");
    cycles.extend(parent_cycles);
    Ok(cycles)
}

/// Members of every cycle in a graph where each node has at most one
/// successor, starting with the member where the walk entered the cycle.
/// Nodes are walked in ascending order.
fn find_cycles(edges: &BTreeMap<NodeId, Relationship>, next: fn(&Relationship) -> NodeId) -> Vec<Vec<NodeId>> {
    #[derive(PartialEq)]
    enum State {
        OnPath,
        Done,
    }
    let mut state: HashMap<NodeId, State> = HashMap::new();
    let mut cycles = Vec::new();
    for &start in edges.keys() {
        let mut path = Vec::new();
        let mut current = start;
        while !state.contains_key(&current) {
            let Some(rel) = edges.get(&current) else {
                break;
            };
            state.insert(current, State::OnPath);
            path.push(current);
            current = next(rel);
        }
        if state.get(&current) == Some(&State::OnPath) {
            if let Some(pos) = path.iter().position(|n| *n == current) {
                cycles.push(path[pos..].to_vec());
            }
        }
        for n in path {
            state.insert(n, State::Done);
        }
    }
    cycles
}

fn cut_synonym_cycles(dao: &UsageDao) -> StorageResult<Vec<String>> {
    let edges = synonym_edges(dao)?;
    let mut cycles = Vec::new();
    for cycle in find_cycles(&edges, |rel| rel.end) {
        let syn = cycle[0];
        let Some(rel) = edges.get(&syn) else {
            continue;
        };
        let mut taxon_id = None;
        dao.update_usage(syn, |u| {
            u.add_issue(NameUsageIssue::ChainedSynoym);
            u.add_issue(NameUsageIssue::ParentCycle);
            taxon_id = u.taxon_id.clone();
        })?;
        let taxon_id = taxon_id.unwrap_or_default();
        let remark = format!("Synonym cycle cut for taxonID {taxon_id}");
        let accepted = Placeholder::new(Origin::MissingAccepted, INCERTAE_SEDIS, TaxonomicStatus::Doubtful)
            .remarks(remark)
            .create(dao, true)?;
        create_synonym_rel(dao, syn, accepted)?;
        dao.graph().delete_edge(rel)?;
        debug!(synonym = %syn, taxon_id = %taxon_id, "Synonym cycle cut");
        cycles.push(taxon_id);
    }
    Ok(cycles)
}

/// Breaks classification loops at the lowest ranked member: its relation to
/// the child in the loop is cut and that child becomes a root.
fn cut_parent_cycles(dao: &UsageDao) -> StorageResult<Vec<String>> {
    let edges = parent_edges(dao)?;
    let mut cut = Vec::new();
    for cycle in find_cycles(&edges, |rel| rel.start) {
        let mut lowest: Option<(Rank, NodeId)> = None;
        for &node in &cycle {
            let rank = dao.graph().props(node)?.and_then(|p| p.rank).unwrap_or(Rank::Unranked);
            if lowest.map_or(true, |(r, n)| (rank, node) > (r, n)) {
                lowest = Some((rank, node));
            }
        }
        let Some((_, lowest)) = lowest else {
            continue;
        };
        let Some((node, rel)) = cycle
            .iter()
            .filter_map(|n| edges.get(n).map(|rel| (*n, rel)))
            .find(|(_, rel)| rel.start == lowest)
        else {
            continue;
        };
        dao.graph().delete_edge(rel)?;
        dao.graph().add_label(node, Label::Root)?;
        let mut taxon_id = None;
        dao.update_usage(node, |u| {
            u.add_issue(NameUsageIssue::ParentCycle);
            u.add_remark("Parent cycle cut");
            taxon_id = u.taxon_id.clone();
        })?;
        let taxon_id = taxon_id.unwrap_or_default();
        debug!(node = %node, taxon_id = %taxon_id, "Parent cycle cut");
        cut.push(taxon_id);
    }
    Ok(cut)
}

/// Points every synonym of a synonym at the terminal accepted node.
fn relink_synonym_chains(dao: &UsageDao) -> StorageResult<usize> {
    let edges = synonym_edges(dao)?;
    let mut flagged = BTreeSet::new();
    let mut relinked = 0;
    for (&syn, rel) in &edges {
        if !edges.contains_key(&rel.end) {
            continue;
        }
        // follow the chain, cycles are cut already
        let mut terminal = rel.end;
        let mut hops = 0;
        while let Some(next) = edges.get(&terminal) {
            flagged.insert(terminal);
            terminal = next.end;
            hops += 1;
            if hops > edges.len() {
                break;
            }
        }
        flagged.insert(syn);
        create_synonym_rel(dao, syn, terminal)?;
        dao.graph().delete_edge(rel)?;
        relinked += 1;
    }
    for node in flagged {
        add_issue_remark(dao, node, None, &[NameUsageIssue::ChainedSynoym])?;
    }
    Ok(relinked)
}

/// Removes parent relations of synonyms, moving them to the accepted usage
/// where it has none.
fn move_synonym_parents(dao: &UsageDao) -> StorageResult<()> {
    let graph = dao.graph();
    let mut cursor = dao.cursor()?;
    let (mut parent_deleted, mut parent_relinked, mut child_deleted, mut child_relinked) = (0, 0, 0, 0);
    for syn in dao.nodes_with_label(Label::Synonym)? {
        let Some(accepted) = graph.single_edge(syn, RelType::SynonymOf, Direction::Outgoing)?.map(|r| r.end) else {
            continue;
        };
        let name = graph
            .props(syn)?
            .and_then(|p| p.scientific_name)
            .unwrap_or_default();
        let remark = format!("Parent relation taken from synonym {name}");

        for rel in graph.edges(syn, Some(RelType::ParentOf), Direction::Outgoing)? {
            graph.delete_edge(&rel)?;
            if rel.end == accepted {
                // the accepted usage was classified below its own synonym
                graph.add_label(accepted, Label::Root)?;
                parent_deleted += 1;
            } else {
                assign_parent(dao, accepted, rel.end)?;
                add_issue_remark(dao, rel.end, Some(&remark), &[])?;
                parent_relinked += 1;
            }
        }
        for rel in graph.edges(syn, Some(RelType::ParentOf), Direction::Incoming)? {
            if graph.has_edge(accepted, RelType::ParentOf, Direction::Incoming)? || rel.start == accepted {
                debug!(synonym = %name, "Delete parent relation of synonym");
                child_deleted += 1;
            } else {
                debug!(synonym = %name, "Relink parent relation of synonym");
                assign_parent(dao, rel.start, accepted)?;
                add_issue_remark(dao, accepted, Some(&remark), &[])?;
                child_relinked += 1;
            }
            graph.delete_edge(&rel)?;
        }
        graph.remove_label(syn, Label::Root)?;
        cursor.tick()?;
    }
    cursor.finish()?;
    info!(
        child_deleted,
        child_relinked, parent_deleted, parent_relinked, "Parent relations of synonyms cleaned up"
    );
    Ok(())
}
