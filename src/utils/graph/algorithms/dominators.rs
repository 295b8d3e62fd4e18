//! Dominator tree computation using the Lengauer-Tarjan algorithm.
//!
//! The dominator tree drives SSA join placement and the single-entry checks of loop recognition.
//!
//! # Theory
//!
//! A node `d` **dominates** a node `n` if every path from the entry node to `n` passes through
//! `d`. The **immediate dominator** of `n` is the unique strict dominator of `n` that does not
//! strictly dominate any other dominator of `n`. Making each node's immediate dominator its parent
//! yields the dominator tree, rooted at the entry.
//!
//! Method bodies routinely contain dead code (javac leaves unreachable `goto`s behind after
//! `return`), so nodes unreachable from the entry are part of the graph. They have no immediate
//! dominator, dominate nothing and are dominated by nothing.
//!
//! # Algorithm
//!
//! Lengauer-Tarjan with path compression, O(E log V).

use std::collections::BTreeSet;

use crate::utils::graph::{NodeId, Predecessors, RootedGraph, Successors};

/// The dominator tree of a rooted graph.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    entry: NodeId,
    /// Immediate dominator per node; `None` for the entry and unreachable nodes.
    idom: Vec<Option<NodeId>>,
    children: Vec<Vec<NodeId>>,
    reachable: Vec<bool>,
}

impl DominatorTree {
    /// Returns the entry node (root of the tree).
    #[inline]
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns the immediate dominator of a node.
    ///
    /// Returns `None` for the entry node and for nodes unreachable from it.
    #[inline]
    #[must_use]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        self.idom.get(node.index()).copied().flatten()
    }

    /// Returns `true` if `node` is reachable from the entry.
    #[inline]
    #[must_use]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.reachable.get(node.index()).copied().unwrap_or(false)
    }

    /// Returns `true` if `a` dominates `b`.
    ///
    /// Every reachable node dominates itself. Unreachable nodes take part in no dominance
    /// relation.
    #[must_use]
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }

        let mut current = Some(b);
        while let Some(node) = current {
            if node == a {
                return true;
            }
            current = self.immediate_dominator(node);
        }
        false
    }

    /// Returns `true` if `a` strictly dominates `b` (dominates and `a != b`).
    #[inline]
    #[must_use]
    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Returns the children of a node in the dominator tree, in ascending order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.children
            .get(node.index())
            .map_or(&[], |children| children.as_slice())
    }

    /// Returns the depth of a node in the dominator tree (the entry has depth 0).
    #[must_use]
    pub fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = node;
        while let Some(idom) = self.immediate_dominator(current) {
            current = idom;
            depth += 1;
        }
        depth
    }

    /// Returns the number of node slots covered by the tree.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.idom.len()
    }
}

/// Computes the dominator tree of a rooted graph.
pub fn compute_dominators<G>(graph: &G) -> DominatorTree
where
    G: RootedGraph,
{
    let node_count = graph.node_count();
    let entry = graph.entry();

    if node_count == 0 || entry.index() >= node_count {
        return DominatorTree {
            entry,
            idom: Vec::new(),
            children: Vec::new(),
            reachable: Vec::new(),
        };
    }

    let mut lt = LengauerTarjan::new(node_count, entry);
    lt.compute(graph);

    let reachable: Vec<bool> = lt.dfnum.iter().map(|&n| n != 0).collect();
    let mut idom = vec![None; node_count];
    let mut children = vec![Vec::new(); node_count];
    for index in 0..node_count {
        let node = NodeId::new(index);
        if node == entry || !reachable[index] {
            continue;
        }
        let parent = lt.idom[index];
        idom[index] = Some(parent);
        children[parent.index()].push(node);
    }

    DominatorTree {
        entry,
        idom,
        children,
        reachable,
    }
}

struct LengauerTarjan {
    entry: NodeId,
    /// DFS number (1-based); 0 means unvisited.
    dfnum: Vec<usize>,
    vertex: Vec<NodeId>,
    parent: Vec<NodeId>,
    semi: Vec<NodeId>,
    idom: Vec<NodeId>,
    ancestor: Vec<Option<NodeId>>,
    best: Vec<NodeId>,
    bucket: Vec<Vec<NodeId>>,
    dfs_counter: usize,
}

impl LengauerTarjan {
    fn new(n: usize, entry: NodeId) -> Self {
        Self {
            entry,
            dfnum: vec![0; n],
            vertex: vec![entry; n],
            parent: vec![entry; n],
            semi: (0..n).map(NodeId::new).collect(),
            idom: vec![entry; n],
            ancestor: vec![None; n],
            best: (0..n).map(NodeId::new).collect(),
            bucket: vec![Vec::new(); n],
            dfs_counter: 0,
        }
    }

    fn compute<G: Successors + Predecessors>(&mut self, graph: &G) {
        self.dfs(graph);

        for i in (1..self.dfs_counter).rev() {
            let w = self.vertex[i];
            let parent_w = self.parent[w.index()];

            // semi(w) = min over predecessors, via eval for non-tree edges
            let preds: Vec<NodeId> = graph.predecessors(w).collect();
            for v in preds {
                if self.dfnum[v.index()] == 0 {
                    continue;
                }
                let u = self.eval(v);
                if self.dfnum[self.semi[u.index()].index()]
                    < self.dfnum[self.semi[w.index()].index()]
                {
                    self.semi[w.index()] = self.semi[u.index()];
                }
            }

            let semi_w = self.semi[w.index()];
            self.bucket[semi_w.index()].push(w);
            self.ancestor[w.index()] = Some(parent_w);

            let bucket = std::mem::take(&mut self.bucket[parent_w.index()]);
            for v in bucket {
                let u = self.eval(v);
                self.idom[v.index()] = if self.semi[u.index()] == self.semi[v.index()] {
                    parent_w
                } else {
                    u
                };
            }
        }

        for i in 1..self.dfs_counter {
            let w = self.vertex[i];
            if self.idom[w.index()] != self.semi[w.index()] {
                self.idom[w.index()] = self.idom[self.idom[w.index()].index()];
            }
        }

        self.idom[self.entry.index()] = self.entry;
    }

    fn dfs<G: Successors>(&mut self, graph: &G) {
        let mut stack = vec![(self.entry, self.entry)];

        while let Some((node, parent)) = stack.pop() {
            let idx = node.index();
            if idx >= self.dfnum.len() || self.dfnum[idx] != 0 {
                continue;
            }

            self.dfs_counter += 1;
            self.dfnum[idx] = self.dfs_counter;
            self.vertex[self.dfs_counter - 1] = node;
            self.parent[idx] = parent;

            let successors: Vec<NodeId> = graph.successors(node).collect();
            for succ in successors.into_iter().rev() {
                if succ.index() < self.dfnum.len() && self.dfnum[succ.index()] == 0 {
                    stack.push((succ, node));
                }
            }
        }
    }

    fn eval(&mut self, v: NodeId) -> NodeId {
        if self.ancestor[v.index()].is_none() {
            return v;
        }
        self.compress(v);
        self.best[v.index()]
    }

    fn compress(&mut self, v: NodeId) {
        // Iterative form of the classic recursive compression; deep loop nests would
        // otherwise recurse once per nesting level.
        let mut path = Vec::new();
        let mut current = v;
        while let Some(ancestor) = self.ancestor[current.index()] {
            if self.ancestor[ancestor.index()].is_none() {
                break;
            }
            path.push(current);
            current = ancestor;
        }

        for &node in path.iter().rev() {
            let Some(ancestor) = self.ancestor[node.index()] else {
                continue;
            };
            let best_ancestor = self.best[ancestor.index()];
            let best_node = self.best[node.index()];
            if self.dfnum[self.semi[best_ancestor.index()].index()]
                < self.dfnum[self.semi[best_node.index()].index()]
            {
                self.best[node.index()] = best_ancestor;
            }
            self.ancestor[node.index()] = self.ancestor[ancestor.index()];
        }
    }
}

/// Computes the dominance frontier of every node.
///
/// `DF(n)` is the set of nodes `m` such that `n` dominates a predecessor of `m` but does not
/// strictly dominate `m`. Unreachable nodes have empty frontiers and do not contribute.
pub fn compute_dominance_frontiers<G>(graph: &G, dom_tree: &DominatorTree) -> Vec<BTreeSet<NodeId>>
where
    G: Predecessors,
{
    let n = graph.node_count();
    let mut frontiers: Vec<BTreeSet<NodeId>> = vec![BTreeSet::new(); n];

    for node in graph.node_ids() {
        if !dom_tree.is_reachable(node) {
            continue;
        }
        let preds: Vec<NodeId> = graph
            .predecessors(node)
            .filter(|&pred| dom_tree.is_reachable(pred))
            .collect();
        if preds.len() < 2 {
            continue;
        }

        let idom_node = dom_tree.immediate_dominator(node);
        for pred in preds {
            let mut runner = Some(pred);
            while let Some(current) = runner {
                if Some(current) == idom_node {
                    break;
                }
                frontiers[current.index()].insert(node);
                runner = dom_tree.immediate_dominator(current);
            }
        }
    }

    frontiers
}

/// Computes the iterated dominance frontier `DF+` of a set of nodes.
///
/// This is the set of join points where SSA construction places join markers for a variable
/// defined at `defs`.
#[must_use]
pub fn iterated_dominance_frontier(
    frontiers: &[BTreeSet<NodeId>],
    defs: impl IntoIterator<Item = NodeId>,
) -> BTreeSet<NodeId> {
    let mut result = BTreeSet::new();
    let mut worklist: Vec<NodeId> = defs.into_iter().collect();

    while let Some(node) = worklist.pop() {
        let Some(frontier) = frontiers.get(node.index()) else {
            continue;
        };
        for &join in frontier {
            if result.insert(join) {
                worklist.push(join);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::graph::AdjacencyGraph;

    fn graph(count: usize, edges: &[(usize, usize)]) -> AdjacencyGraph {
        let mut graph = AdjacencyGraph::new(count, NodeId::new(0));
        for &(from, to) in edges {
            graph.add_edge(NodeId::new(from), NodeId::new(to));
        }
        graph
    }

    #[test]
    fn test_dominator_linear_chain() {
        let g = graph(4, &[(0, 1), (1, 2), (2, 3)]);
        let tree = compute_dominators(&g);

        assert_eq!(tree.immediate_dominator(NodeId::new(0)), None);
        assert_eq!(tree.immediate_dominator(NodeId::new(3)), Some(NodeId::new(2)));
        assert!(tree.dominates(NodeId::new(1), NodeId::new(3)));
        assert_eq!(tree.depth(NodeId::new(3)), 3);
    }

    #[test]
    fn test_dominator_diamond() {
        // 0 -> 1, 0 -> 2, 1 -> 3, 2 -> 3
        let g = graph(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let tree = compute_dominators(&g);

        assert_eq!(tree.immediate_dominator(NodeId::new(3)), Some(NodeId::new(0)));
        assert!(!tree.dominates(NodeId::new(1), NodeId::new(3)));
        assert_eq!(tree.children(NodeId::new(0)).len(), 3);

        let frontiers = compute_dominance_frontiers(&g, &tree);
        assert!(frontiers[1].contains(&NodeId::new(3)));
        assert!(frontiers[2].contains(&NodeId::new(3)));
        assert!(frontiers[0].is_empty());
    }

    #[test]
    fn test_dominator_loop() {
        // 0 -> 1 -> 2 -> 1, 1 -> 3
        let g = graph(4, &[(0, 1), (1, 2), (2, 1), (1, 3)]);
        let tree = compute_dominators(&g);

        assert!(tree.dominates(NodeId::new(1), NodeId::new(2)));
        assert!(tree.dominates(NodeId::new(1), NodeId::new(3)));

        let frontiers = compute_dominance_frontiers(&g, &tree);
        assert!(frontiers[2].contains(&NodeId::new(1)));
        let idf = iterated_dominance_frontier(&frontiers, [NodeId::new(2)]);
        assert_eq!(idf.into_iter().collect::<Vec<_>>(), vec![NodeId::new(1)]);
    }

    #[test]
    fn test_unreachable_nodes_have_no_dominator() {
        let g = graph(3, &[(0, 1), (2, 1)]);
        let tree = compute_dominators(&g);

        assert!(!tree.is_reachable(NodeId::new(2)));
        assert_eq!(tree.immediate_dominator(NodeId::new(2)), None);
        assert_eq!(tree.immediate_dominator(NodeId::new(1)), Some(NodeId::new(0)));
        assert!(!tree.dominates(NodeId::new(2), NodeId::new(1)));

        let frontiers = compute_dominance_frontiers(&g, &tree);
        assert!(frontiers.iter().all(BTreeSet::is_empty));
    }

    #[test]
    fn test_irreducible_region() {
        // 0 -> 1, 0 -> 2, 1 <-> 2
        let g = graph(3, &[(0, 1), (0, 2), (1, 2), (2, 1)]);
        let tree = compute_dominators(&g);

        assert_eq!(tree.immediate_dominator(NodeId::new(1)), Some(NodeId::new(0)));
        assert_eq!(tree.immediate_dominator(NodeId::new(2)), Some(NodeId::new(0)));
    }
}
