//! Trait definitions for graph abstractions.
//!
//! The graph algorithms in [`crate::utils::graph::algorithms`] are written against these traits,
//! so the same dominator and traversal code runs over the instruction graph, the SSA view with
//! exceptional edges, and the statement list.
//!
//! - [`GraphBase`] - Core properties: node count and node iteration
//! - [`Successors`] - Forward edge traversal (outgoing edges)
//! - [`Predecessors`] - Backward edge traversal (incoming edges)
//! - [`RootedGraph`] - Graphs with a designated entry node

use crate::utils::graph::NodeId;

/// Core graph properties shared by all graph types.
pub trait GraphBase {
    /// Returns the number of node slots in the graph.
    ///
    /// Node identifiers are dense in `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Returns an iterator over all node identifiers in the graph.
    fn node_ids(&self) -> impl Iterator<Item = NodeId>;
}

/// Forward edge traversal.
pub trait Successors: GraphBase {
    /// Returns an iterator over the direct successors of a node.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Backward edge traversal.
pub trait Predecessors: GraphBase {
    /// Returns an iterator over the direct predecessors of a node.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// A graph with a designated entry node.
pub trait RootedGraph: Successors + Predecessors {
    /// Returns the entry node of the graph.
    fn entry(&self) -> NodeId;
}

/// Returns `true` if every successor edge has a matching predecessor edge and vice versa.
///
/// Multi-edges (a switch with two cases sharing a target) count once.
pub fn edges_are_symmetric<G: Successors + Predecessors>(graph: &G) -> bool {
    graph.node_ids().all(|node| {
        graph
            .successors(node)
            .all(|succ| graph.predecessors(succ).any(|pred| pred == node))
            && graph
                .predecessors(node)
                .all(|pred| graph.successors(pred).any(|succ| succ == node))
    })
}
