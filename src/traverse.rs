//! Traversals over the usage graph

use crate::storage::{Direction, GraphDb, Label, NodeId, RelType, StorageResult};
use std::collections::HashSet;

/// Parent chain of a node, nearest first. Stops at a cycle.
pub fn parents(graph: &GraphDb, node: NodeId) -> StorageResult<Vec<NodeId>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::from([node]);
    let mut current = node;
    while let Some(rel) = graph.single_edge(current, RelType::ParentOf, Direction::Incoming)? {
        if !seen.insert(rel.start) {
            break;
        }
        chain.push(rel.start);
        current = rel.start;
    }
    Ok(chain)
}

/// Direct children of a node.
pub fn children(graph: &GraphDb, node: NodeId) -> StorageResult<Vec<NodeId>> {
    graph.neighbours(node, RelType::ParentOf, Direction::Outgoing)
}

/// Synonyms of an accepted node, including pro parte synonyms.
pub fn synonyms(graph: &GraphDb, node: NodeId) -> StorageResult<Vec<NodeId>> {
    let mut synonyms = graph.neighbours(node, RelType::SynonymOf, Direction::Incoming)?;
    for s in graph.neighbours(node, RelType::ProparteSynonymOf, Direction::Incoming)? {
        if !synonyms.contains(&s) {
            synonyms.push(s);
        }
    }
    Ok(synonyms)
}

/// The accepted node of a synonym.
pub fn accepted(graph: &GraphDb, node: NodeId) -> StorageResult<Option<NodeId>> {
    Ok(graph
        .single_edge(node, RelType::SynonymOf, Direction::Outgoing)?
        .map(|rel| rel.end))
}

/// All nodes below a node in the classification, depth first.
pub fn descendants(graph: &GraphDb, node: NodeId) -> StorageResult<Vec<NodeId>> {
    let mut result = Vec::new();
    let mut visited = HashSet::from([node]);
    let mut stack = children(graph, node)?;
    stack.reverse();
    while let Some(n) = stack.pop() {
        if !visited.insert(n) {
            continue;
        }
        result.push(n);
        let mut below = children(graph, n)?;
        below.reverse();
        stack.extend(below);
    }
    Ok(result)
}

/// The basionym of a node together with all its combinations, ordered by
/// node id. Empty if the node takes part in no basionym relation.
pub fn basionym_group(graph: &GraphDb, node: NodeId) -> StorageResult<Vec<NodeId>> {
    let basionym = match graph.single_edge(node, RelType::BasionymOf, Direction::Incoming)? {
        Some(rel) => rel.start,
        None => node,
    };
    let combinations = graph.neighbours(basionym, RelType::BasionymOf, Direction::Outgoing)?;
    if combinations.is_empty() {
        return Ok(Vec::new());
    }
    let mut group = vec![basionym];
    group.extend(combinations);
    group.sort();
    group.dedup();
    Ok(group)
}

/// Callbacks of a [`TaxonWalker`]: `start` when a node is entered, `end`
/// after all its children have been walked.
pub trait StartEndHandler {
    fn start(&mut self, node: NodeId) -> StorageResult<()>;
    fn end(&mut self, node: NodeId) -> StorageResult<()>;
}

/// Depth-first walk over the accepted classification.
///
/// Starts at the ROOT nodes ordered by (rank, scientific name) and visits
/// children in the same order. Synonyms are not entered.
pub struct TaxonWalker<'a> {
    graph: &'a GraphDb,
}

impl<'a> TaxonWalker<'a> {
    pub fn new(graph: &'a GraphDb) -> Self {
        Self { graph }
    }

    /// Walks the tree and returns the number of visited nodes.
    pub fn walk_accepted(&self, handlers: &mut [&mut dyn StartEndHandler]) -> StorageResult<usize> {
        let mut visited = HashSet::new();
        let mut roots = self.graph.nodes_with_label(Label::Root)?;
        self.sort(&mut roots)?;
        for root in roots {
            if self.graph.has_label(root, Label::Synonym)? {
                continue;
            }
            self.walk(root, handlers, &mut visited)?;
        }
        Ok(visited.len())
    }

    fn walk(
        &self,
        root: NodeId,
        handlers: &mut [&mut dyn StartEndHandler],
        visited: &mut HashSet<NodeId>,
    ) -> StorageResult<()> {
        // (node, children entered)
        let mut stack = vec![(root, false)];
        while let Some((node, entered)) = stack.pop() {
            if entered {
                for h in handlers.iter_mut() {
                    h.end(node)?;
                }
                continue;
            }
            if !visited.insert(node) {
                continue;
            }
            for h in handlers.iter_mut() {
                h.start(node)?;
            }
            stack.push((node, true));
            let mut kids = Vec::new();
            for child in children(self.graph, node)? {
                if !visited.contains(&child) && !self.graph.has_label(child, Label::Synonym)? {
                    kids.push(child);
                }
            }
            self.sort(&mut kids)?;
            stack.extend(kids.into_iter().rev().map(|c| (c, false)));
        }
        Ok(())
    }

    fn sort(&self, nodes: &mut Vec<NodeId>) -> StorageResult<()> {
        let mut keyed = Vec::with_capacity(nodes.len());
        for &n in nodes.iter() {
            let props = self.graph.props(n)?.unwrap_or_default();
            keyed.push(((props.rank, props.scientific_name), n));
        }
        // unranked nodes sort last
        keyed.sort_by(|((r1, n1), a), ((r2, n2), b)| {
            r1.is_none()
                .cmp(&r2.is_none())
                .then(r1.cmp(r2))
                .then(n1.cmp(n2))
                .then(a.cmp(b))
        });
        *nodes = keyed.into_iter().map(|(_, n)| n).collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NameUsage, Rank, TaxonomicStatus};
    use crate::storage::UsageDao;

    fn usage(dao: &UsageDao, name: &str, rank: Rank) -> NodeId {
        dao.create_usage(&NameUsage::new().with_scientific_name(name).with_rank(rank))
            .unwrap()
    }

    /// Pinaceae > {Picea > Picea abies, Abies > Abies alba}, Abies pectinata
    /// synonym of Abies alba
    fn tree() -> (UsageDao, Vec<NodeId>) {
        let dao = UsageDao::temporary(10).unwrap();
        let fam = usage(&dao, "Pinaceae", Rank::Family);
        let picea = usage(&dao, "Picea", Rank::Genus);
        let abies = usage(&dao, "Abies", Rank::Genus);
        let picea_abies = usage(&dao, "Picea abies", Rank::Species);
        let alba = usage(&dao, "Abies alba", Rank::Species);
        let syn = dao
            .create_usage(
                &NameUsage::new()
                    .with_scientific_name("Abies pectinata")
                    .with_rank(Rank::Species)
                    .with_status(TaxonomicStatus::Synonym),
            )
            .unwrap();
        dao.graph().add_label(fam, Label::Root).unwrap();
        for (p, c) in [(fam, picea), (fam, abies), (picea, picea_abies), (abies, alba)] {
            dao.add_edge(p, c, RelType::ParentOf).unwrap();
        }
        dao.add_edge(syn, alba, RelType::SynonymOf).unwrap();
        (dao, vec![fam, picea, abies, picea_abies, alba, syn])
    }

    struct Recorder(Vec<String>);

    impl StartEndHandler for Recorder {
        fn start(&mut self, node: NodeId) -> StorageResult<()> {
            self.0.push(format!("+{}", node.get()));
            Ok(())
        }

        fn end(&mut self, node: NodeId) -> StorageResult<()> {
            self.0.push(format!("-{}", node.get()));
            Ok(())
        }
    }

    #[test]
    fn test_parents_and_descendants() {
        let (dao, n) = tree();
        let g = dao.graph();
        assert_eq!(parents(g, n[4]).unwrap(), vec![n[2], n[0]]);
        assert!(parents(g, n[0]).unwrap().is_empty());
        assert_eq!(descendants(g, n[0]).unwrap(), vec![n[1], n[3], n[2], n[4]]);
        assert_eq!(children(g, n[2]).unwrap(), vec![n[4]]);
    }

    #[test]
    fn test_parents_stops_at_cycle() {
        let (dao, n) = tree();
        dao.add_edge(n[4], n[0], RelType::ParentOf).unwrap();
        assert_eq!(parents(dao.graph(), n[4]).unwrap(), vec![n[2], n[0]]);
    }

    #[test]
    fn test_synonyms_and_accepted() {
        let (dao, n) = tree();
        dao.add_edge(n[5], n[3], RelType::ProparteSynonymOf).unwrap();
        let g = dao.graph();
        assert_eq!(synonyms(g, n[4]).unwrap(), vec![n[5]]);
        assert_eq!(synonyms(g, n[3]).unwrap(), vec![n[5]]);
        assert_eq!(accepted(g, n[5]).unwrap(), Some(n[4]));
        assert_eq!(accepted(g, n[4]).unwrap(), None);
    }

    #[test]
    fn test_basionym_group() {
        let (dao, n) = tree();
        let g = dao.graph();
        assert!(basionym_group(g, n[3]).unwrap().is_empty());
        dao.add_edge(n[5], n[4], RelType::BasionymOf).unwrap();
        assert_eq!(basionym_group(g, n[4]).unwrap(), vec![n[4], n[5]]);
        assert_eq!(basionym_group(g, n[5]).unwrap(), vec![n[4], n[5]]);
    }

    #[test]
    fn test_walker_visits_sorted_accepted_tree() {
        let (dao, n) = tree();
        let mut rec = Recorder(Vec::new());
        let visited = TaxonWalker::new(dao.graph()).walk_accepted(&mut [&mut rec]).unwrap();
        assert_eq!(visited, 5);
        let id = |i: usize| n[i].get();
        // Abies sorts before Picea
        let expected = vec![
            format!("+{}", id(0)),
            format!("+{}", id(2)),
            format!("+{}", id(4)),
            format!("-{}", id(4)),
            format!("-{}", id(2)),
            format!("+{}", id(1)),
            format!("+{}", id(3)),
            format!("-{}", id(3)),
            format!("-{}", id(1)),
            format!("-{}", id(0)),
        ];
        assert_eq!(rec.0, expected);
    }
}
