//! Node identifier for index-addressed graphs.
//!
//! This module provides the [`NodeId`] type, a strongly-typed index into a graph arena. Both the
//! instruction graph and the statement list address their nodes through it, so edges are plain
//! indices and never owning references.

use std::fmt;

/// A strongly-typed identifier for a node in an index arena.
///
/// `NodeId` is a lightweight, copyable handle. The wrapped index is only meaningful for the
/// arena that produced it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a new `NodeId` from a raw index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the underlying index value.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    #[inline]
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

impl From<NodeId> for usize {
    #[inline]
    fn from(node: NodeId) -> Self {
        node.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_node_id_round_trips_index() {
        let node = NodeId::new(42);
        assert_eq!(node.index(), 42);
        assert_eq!(usize::from(node), 42);
        assert_eq!(NodeId::from(42_usize), node);
    }

    #[test]
    fn test_node_id_ordering_matches_index() {
        let set: BTreeSet<NodeId> = [3, 1, 2].into_iter().map(NodeId::new).collect();
        let ordered: Vec<usize> = set.into_iter().map(NodeId::index).collect();
        assert_eq!(ordered, vec![1, 2, 3]);
    }

    #[test]
    fn test_node_id_formatting() {
        let node = NodeId::new(7);
        assert_eq!(format!("{node:?}"), "NodeId(7)");
        assert_eq!(format!("{node}"), "n7");
    }
}
