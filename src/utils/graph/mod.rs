//! Graph infrastructure for control-flow analysis.
//!
//! Every graph in this crate is an index arena: nodes are addressed by [`NodeId`] and edges are
//! stored as indices, never as references. The algorithms in [`algorithms`] are generic over the
//! traits in [`traits`], so they work the same on the instruction graph, on derived views and on
//! the statement list.
//!
//! # Key Components
//!
//! - [`NodeId`] - Strongly-typed node index
//! - [`GraphBase`], [`Successors`], [`Predecessors`], [`RootedGraph`] - Graph abstractions
//! - [`AdjacencyGraph`] - Payload-free adjacency lists for derived views
//! - [`algorithms`] - Traversals, dominator trees and dominance frontiers

pub mod algorithms;

mod adjacency;
mod node;
mod traits;

pub use adjacency::AdjacencyGraph;
pub use node::NodeId;
pub use traits::{edges_are_symmetric, GraphBase, Predecessors, RootedGraph, Successors};
