//! The statement list: an index arena of [`SimpleStatement`]s with a positional order.
//!
//! Every structuring pass edits this list. Statements are addressed by [`StatementId`] and keep
//! their id for the lifetime of the method; deleting a statement tombstones it in the arena and
//! [`StatementList::renumber`] later drops it from the positional order. Forward edges
//! (`targets`) and back edges (`sources`) are kept symmetric by the editing methods here, so
//! passes never touch the two sides independently.

use std::{
    collections::{BTreeMap, BTreeSet},
    ops::{Index, IndexMut},
};

use crate::{
    analysis::blocks::{BlockFactory, BlockIdentifier},
    ir::{
        statement::{JoinMarker, Statement},
        variables::{VariableFactory, VariableNamer},
    },
    utils::graph::{GraphBase, NodeId, Predecessors, RootedGraph, Successors},
};

/// Identifier of a statement in a [`StatementList`].
pub type StatementId = NodeId;

/// Version of a slot in effect at a statement, as seen by every path reaching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SsaVersion {
    /// All paths agree.
    Known(u32),
    /// Paths disagree and no join merges them.
    Ambiguous,
}

/// One node of the statement list.
#[derive(Debug, Clone)]
pub struct SimpleStatement {
    /// The statement.
    pub statement: Statement,
    /// Ordered successor edges.
    pub targets: Vec<StatementId>,
    /// Predecessor edges.
    pub sources: BTreeSet<StatementId>,
    /// Dense positional index, valid after [`StatementList::renumber`].
    pub index: usize,
    /// Tombstone flag.
    pub removed: bool,
    /// Blocks this statement is a member of.
    pub blocks: BTreeSet<BlockIdentifier>,
    /// Join markers at entry of this statement.
    pub joins: Vec<JoinMarker>,
    /// Version of every local slot at entry of this statement.
    pub ssa: BTreeMap<u16, SsaVersion>,
    /// Originating bytecode offset.
    pub offset: i32,
}

impl SimpleStatement {
    fn new(statement: Statement, blocks: BTreeSet<BlockIdentifier>, offset: i32) -> Self {
        SimpleStatement {
            statement,
            targets: Vec::new(),
            sources: BTreeSet::new(),
            index: 0,
            removed: false,
            blocks,
            joins: Vec::new(),
            ssa: BTreeMap::new(),
            offset,
        }
    }

    /// The taken target of an `If` or the target of a `Goto`.
    #[must_use]
    pub fn jump_target(&self) -> Option<StatementId> {
        match self.statement {
            Statement::If { .. } => self.targets.get(1).copied(),
            Statement::Goto(_) => self.targets.first().copied(),
            _ => None,
        }
    }

    /// Version of `slot` at entry.
    #[must_use]
    pub fn version_at_entry(&self, slot: u16) -> SsaVersion {
        self.ssa
            .get(&slot)
            .copied()
            .unwrap_or(SsaVersion::Known(0))
    }
}

/// Lowered statements of one method.
#[derive(Debug, Clone)]
pub struct StatementList {
    statements: Vec<SimpleStatement>,
    order: Vec<StatementId>,
    blocks: BlockFactory,
    variables: VariableFactory,
    namer: VariableNamer,
}

impl StatementList {
    /// Creates an empty list that continues minting from `blocks` and versions from
    /// `variables`.
    #[must_use]
    pub fn new(blocks: BlockFactory, variables: VariableFactory, namer: VariableNamer) -> Self {
        StatementList {
            statements: Vec::new(),
            order: Vec::new(),
            blocks,
            variables,
            namer,
        }
    }

    /// Appends a statement at the end of the positional order.
    pub fn push(
        &mut self,
        statement: Statement,
        blocks: BTreeSet<BlockIdentifier>,
        offset: i32,
    ) -> StatementId {
        let id = NodeId::new(self.statements.len());
        let mut simple = SimpleStatement::new(statement, blocks, offset);
        simple.index = self.order.len();
        self.statements.push(simple);
        self.order.push(id);
        id
    }

    /// Inserts an unlinked statement positionally before `before`.
    pub fn insert_before(
        &mut self,
        before: StatementId,
        statement: Statement,
        blocks: BTreeSet<BlockIdentifier>,
    ) -> StatementId {
        let id = NodeId::new(self.statements.len());
        let position = self[before].index;
        let offset = self[before].offset;
        self.statements
            .push(SimpleStatement::new(statement, blocks, offset));
        self.order.insert(position, id);
        self.reindex_from(position);
        id
    }

    /// Moves `id` positionally to just before `before`.
    pub fn move_before(&mut self, id: StatementId, before: StatementId) {
        let from = self[id].index;
        self.order.remove(from);
        let to = self[before].index;
        let to = if from < to { to - 1 } else { to };
        self.order.insert(to, id);
        self.reindex_from(from.min(to));
    }

    fn reindex_from(&mut self, position: usize) {
        for index in position..self.order.len() {
            let id = self.order[index];
            self.statements[id.index()].index = index;
        }
    }

    /// Drops tombstoned statements from the positional order and assigns dense indices.
    pub fn renumber(&mut self) {
        let statements = &self.statements;
        self.order.retain(|id| !statements[id.index()].removed);
        self.reindex_from(0);
    }

    /// Number of live statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order
            .iter()
            .filter(|id| !self.statements[id.index()].removed)
            .count()
    }

    /// Returns `true` if no live statement remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The positional order. May contain tombstones until the next [`Self::renumber`].
    #[must_use]
    pub fn order(&self) -> &[StatementId] {
        &self.order
    }

    /// Live statements in positional order.
    pub fn live(&self) -> impl Iterator<Item = StatementId> + '_ {
        self.order
            .iter()
            .copied()
            .filter(|id| !self.statements[id.index()].removed)
    }

    /// Statement at positional index `position`, if any.
    #[must_use]
    pub fn at(&self, position: usize) -> Option<StatementId> {
        self.order.get(position).copied()
    }

    /// The next live statement positionally.
    #[must_use]
    pub fn next(&self, id: StatementId) -> Option<StatementId> {
        self.order[self[id].index + 1..]
            .iter()
            .copied()
            .find(|next| !self[*next].removed)
    }

    /// The previous live statement positionally.
    #[must_use]
    pub fn prev(&self, id: StatementId) -> Option<StatementId> {
        self.order[..self[id].index]
            .iter()
            .rev()
            .copied()
            .find(|prev| !self[*prev].removed)
    }

    /// The next live statement that is not a no-op.
    #[must_use]
    pub fn next_non_nop(&self, id: StatementId) -> Option<StatementId> {
        let mut current = self.next(id)?;
        while self[current].statement.is_nop() {
            current = self.next(current)?;
        }
        Some(current)
    }

    /// The previous live statement that is not a no-op.
    #[must_use]
    pub fn prev_non_nop(&self, id: StatementId) -> Option<StatementId> {
        let mut current = self.prev(id)?;
        while self[current].statement.is_nop() {
            current = self.prev(current)?;
        }
        Some(current)
    }

    /// Skips no-ops starting at `id` itself.
    #[must_use]
    pub fn skip_nops(&self, id: StatementId) -> StatementId {
        let mut current = id;
        while self[current].statement.is_nop() && self[current].targets.len() == 1 {
            let target = self[current].targets[0];
            if self[target].index <= self[current].index {
                break;
            }
            current = target;
        }
        current
    }

    /// Live statements strictly between positions `start` and `end`.
    pub fn between(&self, start: usize, end: usize) -> impl Iterator<Item = StatementId> + '_ {
        self.order[(start + 1).min(end)..end]
            .iter()
            .copied()
            .filter(|id| !self.statements[id.index()].removed)
    }

    /// Live statements at positions `start..=end`.
    pub fn range(&self, start: usize, end: usize) -> impl Iterator<Item = StatementId> + '_ {
        self.order[start..=end]
            .iter()
            .copied()
            .filter(|id| !self.statements[id.index()].removed)
    }

    /// Adds the edge `from -> to`.
    pub fn add_edge(&mut self, from: StatementId, to: StatementId) {
        self.statements[from.index()].targets.push(to);
        self.statements[to.index()].sources.insert(from);
    }

    fn unlink_source(&mut self, from: StatementId, to: StatementId) {
        if !self.statements[from.index()].targets.contains(&to) {
            self.statements[to.index()].sources.remove(&from);
        }
    }

    /// Removes one `from -> to` edge.
    pub fn remove_edge(&mut self, from: StatementId, to: StatementId) {
        let targets = &mut self.statements[from.index()].targets;
        if let Some(position) = targets.iter().position(|t| *t == to) {
            targets.remove(position);
        }
        self.unlink_source(from, to);
    }

    /// Replaces every `from -> old` edge with `from -> new`.
    pub fn replace_target(&mut self, from: StatementId, old: StatementId, new: StatementId) {
        if old == new {
            return;
        }
        for target in &mut self.statements[from.index()].targets {
            if *target == old {
                *target = new;
            }
        }
        self.statements[old.index()].sources.remove(&from);
        self.statements[new.index()].sources.insert(from);
    }

    /// Replaces the ordered targets of `from`.
    pub fn set_targets(&mut self, from: StatementId, targets: Vec<StatementId>) {
        let old = std::mem::take(&mut self.statements[from.index()].targets);
        for target in old {
            self.statements[target.index()].sources.remove(&from);
        }
        for target in &targets {
            self.statements[target.index()].sources.insert(from);
        }
        self.statements[from.index()].targets = targets;
    }

    /// Retargets every source of `old` for which `filter` holds to `new`.
    pub fn redirect_sources(
        &mut self,
        old: StatementId,
        new: StatementId,
        filter: impl Fn(&StatementList, StatementId) -> bool,
    ) {
        let sources: Vec<StatementId> = self[old].sources.iter().copied().collect();
        for source in sources {
            if source != new && filter(self, source) {
                self.replace_target(source, old, new);
            }
        }
    }

    /// Tombstones `id`. Its sources are relinked to its single target and its join markers move
    /// forward to that target.
    pub fn remove(&mut self, id: StatementId) {
        let targets = self.statements[id.index()].targets.clone();
        let mut unique: Vec<StatementId> = targets.clone();
        unique.dedup();
        let forward = match unique.as_slice() {
            [single] if *single != id => Some(*single),
            _ => None,
        };

        let sources: Vec<StatementId> = self[id].sources.iter().copied().collect();
        for source in sources {
            if source == id {
                continue;
            }
            match forward {
                Some(target) => self.replace_target(source, id, target),
                None => {
                    self.statements[source.index()]
                        .targets
                        .retain(|target| *target != id);
                    self.statements[id.index()].sources.remove(&source);
                }
            }
        }
        self.set_targets(id, Vec::new());
        self.statements[id.index()].sources.clear();

        let joins = std::mem::take(&mut self.statements[id.index()].joins);
        if let Some(target) = forward {
            self.statements[target.index()].joins.extend(joins);
        }
        let statement = &mut self.statements[id.index()];
        statement.statement = Statement::Nop;
        statement.removed = true;
    }

    /// Turns `id` into a no-op that continues at `next`.
    pub fn make_nop(&mut self, id: StatementId, next: StatementId) {
        self.set_targets(id, vec![next]);
        self.statements[id.index()].statement = Statement::Nop;
    }

    /// Live members of `block`, positionally.
    #[must_use]
    pub fn members(&self, block: BlockIdentifier) -> Vec<StatementId> {
        self.live()
            .filter(|id| self[*id].blocks.contains(&block))
            .collect()
    }

    /// Positions of the first and last live member of `block`.
    #[must_use]
    pub fn block_range(&self, block: BlockIdentifier) -> Option<(usize, usize)> {
        let mut members = self.live().filter(|id| self[*id].blocks.contains(&block));
        let first = members.next()?;
        let last = members.last().unwrap_or(first);
        Some((self[first].index, self[last].index))
    }

    /// The live header statement opening `block`.
    #[must_use]
    pub fn header_of(&self, block: BlockIdentifier) -> Option<StatementId> {
        self.live()
            .find(|id| self[*id].statement.opened_block() == Some(block))
    }

    /// Returns `true` if positions `start..=end` can become a new block: every block that a
    /// member of the range belongs to, beyond those of the statement at `start`, lies entirely
    /// within the range, and every range member is in all blocks of the statement at `start`.
    #[must_use]
    pub fn range_respects_nesting(&self, start: usize, end: usize) -> bool {
        let Some(first) = self.at(start) else {
            return false;
        };
        let outer = &self[first].blocks;
        let mut inner = BTreeSet::new();
        for id in self.range(start, end) {
            let blocks = &self[id].blocks;
            if !outer.is_subset(blocks) {
                return false;
            }
            inner.extend(blocks.difference(outer).copied());
            if let Some(block) = self[id].statement.opened_block() {
                inner.insert(block);
            }
        }
        inner.iter().all(|block| {
            self.block_range(*block)
                .is_none_or(|(first, last)| first >= start && last <= end)
        })
    }

    /// Returns `true` if every live source of the statements at positions `start..=end`, other
    /// than those of the statement at `start`, lies inside the range.
    #[must_use]
    pub fn is_single_entry(&self, start: usize, end: usize) -> bool {
        self.range(start, end).skip(1).all(|id| {
            self[id].sources.iter().all(|source| {
                let index = self[*source].index;
                index >= start && index <= end
            })
        })
    }

    /// The block factory.
    pub fn blocks_mut(&mut self) -> &mut BlockFactory {
        &mut self.blocks
    }

    /// The variable factory.
    #[must_use]
    pub fn variables(&self) -> &VariableFactory {
        &self.variables
    }

    /// Mutable variable factory.
    pub fn variables_mut(&mut self) -> &mut VariableFactory {
        &mut self.variables
    }

    /// The naming service.
    #[must_use]
    pub fn namer(&self) -> &VariableNamer {
        &self.namer
    }

    /// Iterates over all arena entries, tombstones included.
    pub fn iter(&self) -> impl Iterator<Item = (StatementId, &SimpleStatement)> {
        self.statements
            .iter()
            .enumerate()
            .map(|(index, statement)| (NodeId::new(index), statement))
    }

    /// Renders the list one statement per line, for tracing and tests.
    #[must_use]
    pub fn listing(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        for id in self.live() {
            let statement = &self[id];
            let targets: Vec<String> = statement
                .targets
                .iter()
                .map(|t| self[*t].index.to_string())
                .collect();
            let _ = writeln!(
                out,
                "{:>3}: {} -> [{}]",
                statement.index,
                statement.statement.display(&self.namer),
                targets.join(", ")
            );
        }
        out
    }
}

impl Index<StatementId> for StatementList {
    type Output = SimpleStatement;

    fn index(&self, id: StatementId) -> &SimpleStatement {
        &self.statements[id.index()]
    }
}

impl IndexMut<StatementId> for StatementList {
    fn index_mut(&mut self, id: StatementId) -> &mut SimpleStatement {
        &mut self.statements[id.index()]
    }
}

impl GraphBase for StatementList {
    fn node_count(&self) -> usize {
        self.statements.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.statements.len()).map(NodeId::new)
    }
}

impl Successors for StatementList {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.statements[node.index()].targets.iter().copied()
    }
}

impl Predecessors for StatementList {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.statements[node.index()].sources.iter().copied()
    }
}

impl RootedGraph for StatementList {
    fn entry(&self) -> NodeId {
        self.live().next().unwrap_or(NodeId::new(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{expression::Expression, statement::JumpKind},
        metadata::descriptor::MethodDescriptor,
        utils::graph::edges_are_symmetric,
    };

    fn list() -> StatementList {
        let namer = VariableNamer::new(true, &MethodDescriptor::parse("()V").unwrap());
        let variables = VariableFactory::new(&namer);
        StatementList::new(BlockFactory::new(), variables, namer)
    }

    fn chain(list: &mut StatementList, statements: Vec<Statement>) -> Vec<StatementId> {
        let ids: Vec<StatementId> = statements
            .into_iter()
            .map(|s| list.push(s, BTreeSet::new(), 0))
            .collect();
        for pair in ids.windows(2) {
            if list[pair[0]].statement.falls_through() {
                list.add_edge(pair[0], pair[1]);
            }
        }
        ids
    }

    #[test]
    fn test_remove_relinks_sources() {
        let mut list = list();
        let ids = chain(
            &mut list,
            vec![
                Statement::Nop,
                Statement::Nop,
                Statement::Return(None),
            ],
        );
        list.remove(ids[1]);
        assert_eq!(list[ids[0]].targets, vec![ids[2]]);
        assert!(list[ids[2]].sources.contains(&ids[0]));
        assert!(edges_are_symmetric(&list));

        list.renumber();
        assert_eq!(list.len(), 2);
        assert_eq!(list[ids[2]].index, 1);
        assert_eq!(list.next(ids[0]), Some(ids[2]));
    }

    #[test]
    fn test_insert_before_reindexes() {
        let mut list = list();
        let ids = chain(&mut list, vec![Statement::Nop, Statement::Return(None)]);
        let goto = list.insert_before(ids[1], Statement::Goto(JumpKind::Goto), BTreeSet::new());
        list.replace_target(ids[0], ids[1], goto);
        list.add_edge(goto, ids[1]);

        assert_eq!(list[goto].index, 1);
        assert_eq!(list[ids[1]].index, 2);
        assert_eq!(list.prev(ids[1]), Some(goto));
        assert!(edges_are_symmetric(&list));
    }

    #[test]
    fn test_duplicate_targets_keep_source() {
        let mut list = list();
        let ids = chain(
            &mut list,
            vec![
                Statement::If {
                    condition: Expression::boolean(true),
                    jump: JumpKind::Goto,
                },
                Statement::Return(None),
            ],
        );
        list.add_edge(ids[0], ids[1]);
        list.remove_edge(ids[0], ids[1]);
        assert!(list[ids[1]].sources.contains(&ids[0]));
        list.remove_edge(ids[0], ids[1]);
        assert!(list[ids[1]].sources.is_empty());
    }

    #[test]
    fn test_single_entry_range() {
        let mut list = list();
        let ids = chain(
            &mut list,
            vec![
                Statement::Nop,
                Statement::Nop,
                Statement::Nop,
                Statement::Return(None),
            ],
        );
        assert!(list.is_single_entry(1, 2));
        list.add_edge(ids[3], ids[2]);
        assert!(!list.is_single_entry(1, 2));
        assert!(list.range_respects_nesting(0, 3));
    }
}
