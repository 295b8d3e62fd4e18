//! Graph algorithms for control-flow analysis.
//!
//! ## Traversal
//!
//! - [`dfs`] - Depth-first search traversal
//! - [`postorder`] / [`reverse_postorder`] - Orderings for dataflow iteration
//! - [`reachable`] - Reachability bitmap
//!
//! ## Dominator Analysis
//!
//! - [`compute_dominators`] - Compute the dominator tree using Lengauer-Tarjan
//! - [`compute_dominance_frontiers`] - Dominance frontiers for SSA join placement
//! - [`iterated_dominance_frontier`] - `DF+` of a definition set
//!
//! | Algorithm | Time Complexity | Use Case |
//! |-----------|-----------------|----------|
//! | DFS | O(V + E) | Reachability, orderings |
//! | Dominators | O(E log V) | SSA construction, loop analysis |
//! | Frontiers | O(E + V·depth) | Join placement |

mod dominators;
mod traversal;

pub use dominators::{
    compute_dominance_frontiers, compute_dominators, iterated_dominance_frontier, DominatorTree,
};
pub use traversal::{dfs, postorder, reachable, reverse_postorder, DfsIterator};
