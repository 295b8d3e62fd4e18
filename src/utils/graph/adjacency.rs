//! A plain adjacency-list graph.
//!
//! [`AdjacencyGraph`] carries no node payload. It is used for derived views, such as the SSA
//! graph that adds exceptional edges on top of the instruction graph.

use crate::utils::graph::{GraphBase, NodeId, Predecessors, RootedGraph, Successors};

/// A rooted directed graph stored as successor and predecessor lists.
#[derive(Debug, Clone)]
pub struct AdjacencyGraph {
    successors: Vec<Vec<NodeId>>,
    predecessors: Vec<Vec<NodeId>>,
    entry: NodeId,
}

impl AdjacencyGraph {
    /// Creates a graph with `node_count` isolated nodes.
    #[must_use]
    pub fn new(node_count: usize, entry: NodeId) -> Self {
        AdjacencyGraph {
            successors: vec![Vec::new(); node_count],
            predecessors: vec![Vec::new(); node_count],
            entry,
        }
    }

    /// Builds a copy of any rooted graph's edges.
    pub fn from_graph<G: RootedGraph>(graph: &G) -> Self {
        let mut result = AdjacencyGraph::new(graph.node_count(), graph.entry());
        for node in graph.node_ids() {
            for succ in graph.successors(node) {
                result.add_edge(node, succ);
            }
        }
        result
    }

    /// Adds an edge unless it already exists.
    ///
    /// Returns `false` if either endpoint is outside the graph.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        if from.index() >= self.successors.len() || to.index() >= self.successors.len() {
            return false;
        }
        if !self.successors[from.index()].contains(&to) {
            self.successors[from.index()].push(to);
            self.predecessors[to.index()].push(from);
        }
        true
    }
}

impl GraphBase for AdjacencyGraph {
    fn node_count(&self) -> usize {
        self.successors.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.successors.len()).map(NodeId::new)
    }
}

impl Successors for AdjacencyGraph {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.successors
            .get(node.index())
            .into_iter()
            .flatten()
            .copied()
    }
}

impl Predecessors for AdjacencyGraph {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.predecessors
            .get(node.index())
            .into_iter()
            .flatten()
            .copied()
    }
}

impl RootedGraph for AdjacencyGraph {
    fn entry(&self) -> NodeId {
        self.entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_edge_deduplicates() {
        let mut graph = AdjacencyGraph::new(2, NodeId::new(0));
        assert!(graph.add_edge(NodeId::new(0), NodeId::new(1)));
        assert!(graph.add_edge(NodeId::new(0), NodeId::new(1)));
        assert_eq!(graph.successors(NodeId::new(0)).count(), 1);
        assert_eq!(graph.predecessors(NodeId::new(1)).count(), 1);
    }

    #[test]
    fn test_add_edge_rejects_out_of_range() {
        let mut graph = AdjacencyGraph::new(1, NodeId::new(0));
        assert!(!graph.add_edge(NodeId::new(0), NodeId::new(5)));
        assert_eq!(graph.successors(NodeId::new(9)).count(), 0);
    }
}
