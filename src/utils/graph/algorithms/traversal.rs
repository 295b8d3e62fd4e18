//! Graph traversal algorithms.
//!
//! - [`dfs`] - Iterative depth-first search (pre-order)
//! - [`postorder`] - Depth-first search with post-order visitation
//! - [`reverse_postorder`] - Reverse post-order, the iteration order of forward dataflow
//! - [`reachable`] - The set of nodes reachable from a start node

use crate::utils::graph::{NodeId, Successors};

/// An iterator performing depth-first traversal of a graph.
pub struct DfsIterator<'g, G: Successors> {
    graph: &'g G,
    stack: Vec<NodeId>,
    visited: Vec<bool>,
}

impl<'g, G: Successors> DfsIterator<'g, G> {
    fn new(graph: &'g G, start: NodeId) -> Self {
        let node_count = graph.node_count();
        if start.index() >= node_count {
            return DfsIterator {
                graph,
                stack: Vec::new(),
                visited: Vec::new(),
            };
        }

        let mut visited = vec![false; node_count];
        visited[start.index()] = true;

        DfsIterator {
            graph,
            stack: vec![start],
            visited,
        }
    }
}

impl<G: Successors> Iterator for DfsIterator<'_, G> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;

        // Reverse so successors are visited in their listed order
        let successors: Vec<NodeId> = self.graph.successors(node).collect();
        for &succ in successors.iter().rev() {
            if let Some(seen) = self.visited.get_mut(succ.index()) {
                if !*seen {
                    *seen = true;
                    self.stack.push(succ);
                }
            }
        }

        Some(node)
    }
}

/// Performs a depth-first traversal starting from the given node.
///
/// Returns an empty iterator if `start` is outside the graph.
pub fn dfs<G: Successors>(graph: &G, start: NodeId) -> DfsIterator<'_, G> {
    DfsIterator::new(graph, start)
}

/// Returns a reachability bitmap indexed by node.
pub fn reachable<G: Successors>(graph: &G, start: NodeId) -> Vec<bool> {
    let mut seen = vec![false; graph.node_count()];
    for node in dfs(graph, start) {
        seen[node.index()] = true;
    }
    seen
}

/// Computes the post-order traversal of a graph.
///
/// Each node appears after all nodes reachable from it, except along back edges.
#[allow(clippy::items_after_statements)]
pub fn postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let node_count = graph.node_count();
    if start.index() >= node_count {
        return Vec::new();
    }

    let mut visited = vec![false; node_count];
    let mut result = Vec::with_capacity(node_count);

    #[derive(Clone, Copy)]
    enum State {
        Enter,
        Exit,
    }

    let mut stack = vec![(start, State::Enter)];

    while let Some((node, state)) = stack.pop() {
        match state {
            State::Enter => {
                if visited[node.index()] {
                    continue;
                }
                visited[node.index()] = true;
                stack.push((node, State::Exit));

                let successors: Vec<NodeId> = graph.successors(node).collect();
                for &succ in successors.iter().rev() {
                    if succ.index() < node_count && !visited[succ.index()] {
                        stack.push((succ, State::Enter));
                    }
                }
            }
            State::Exit => result.push(node),
        }
    }

    result
}

/// Computes the reverse post-order of a graph.
///
/// Every node appears before its successors except along back edges.
pub fn reverse_postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let mut result = postorder(graph, start);
    result.reverse();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::graph::AdjacencyGraph;

    fn diamond() -> AdjacencyGraph {
        let mut graph = AdjacencyGraph::new(5, NodeId::new(0));
        for (from, to) in [(0, 1), (0, 2), (1, 3), (2, 3)] {
            graph.add_edge(NodeId::new(from), NodeId::new(to));
        }
        graph
    }

    #[test]
    fn test_dfs_preorder() {
        let graph = diamond();
        let order: Vec<usize> = dfs(&graph, NodeId::new(0)).map(NodeId::index).collect();
        assert_eq!(order, vec![0, 1, 3, 2]);
    }

    #[test]
    fn test_reverse_postorder_places_join_last() {
        let graph = diamond();
        let rpo = reverse_postorder(&graph, NodeId::new(0));
        assert_eq!(rpo.first(), Some(&NodeId::new(0)));
        assert_eq!(rpo.last(), Some(&NodeId::new(3)));
        assert_eq!(rpo.len(), 4);
    }

    #[test]
    fn test_reachable_skips_isolated_node() {
        let graph = diamond();
        let seen = reachable(&graph, NodeId::new(0));
        assert_eq!(seen, vec![true, true, true, true, false]);
    }

    #[test]
    fn test_invalid_start() {
        let graph = diamond();
        assert_eq!(dfs(&graph, NodeId::new(99)).count(), 0);
        assert!(postorder(&graph, NodeId::new(99)).is_empty());
    }
}
