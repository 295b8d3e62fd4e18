//! Trivial join resolution and per-statement version states.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    analysis::ssa::ssa_graph,
    compiler::{pass::PassContext, EventKind, StructuringPass},
    ir::{SsaVersion, StatementId, StatementList, Variable},
    utils::graph::{algorithms::reverse_postorder, GraphBase, Predecessors, RootedGraph},
};

type VersionState = BTreeMap<u16, SsaVersion>;

/// Resolves trivial joins and annotates every statement with the versions in effect at entry.
///
/// A join whose incoming versions, other than its own result and undefined entry values, name a
/// single variable is replaced by that variable everywhere. Afterwards a forward dataflow over
/// the SSA view records, for every statement, which version of each slot all paths agree on.
/// [`crate::compiler::CondenseAssignmentsPass`] relies on this to move pure values past other
/// statements.
pub struct SsaIdentifiersPass;

impl Default for SsaIdentifiersPass {
    fn default() -> Self {
        Self::new()
    }
}

impl SsaIdentifiersPass {
    /// Creates a new SSA identifier pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn find_trivial_join(list: &StatementList) -> Option<(StatementId, usize, Variable, Variable)> {
        for id in list.live() {
            for (position, join) in list[id].joins.iter().enumerate() {
                let distinct: BTreeSet<Variable> = join
                    .incoming
                    .iter()
                    .copied()
                    .filter(|v| *v != join.result && !list.variables().is_undefined(*v))
                    .collect();
                match distinct.len() {
                    0 => {
                        let entry = list.variables().entry_value(join.slot);
                        return Some((id, position, join.result, entry));
                    }
                    1 => {
                        let single = distinct.into_iter().next()?;
                        return Some((id, position, join.result, single));
                    }
                    _ => {}
                }
            }
        }
        None
    }

    fn resolve_trivial_joins(&self, list: &mut StatementList, ctx: &PassContext<'_>) -> bool {
        let mut changed = false;
        while let Some((at, position, result, replacement)) = Self::find_trivial_join(list) {
            list[at].joins.remove(position);

            let live: Vec<StatementId> = list.live().collect();
            for id in live {
                let statement = &mut list[id];
                statement
                    .statement
                    .for_each_expression_mut(&mut |e| e.rename_local(result, replacement));
                for join in &mut statement.joins {
                    for incoming in &mut join.incoming {
                        if *incoming == result {
                            *incoming = replacement;
                        }
                    }
                    join.incoming.sort();
                    join.incoming.dedup();
                }
            }

            ctx.record(EventKind::JoinResolved, self.name(), list, at)
                .message(format!("join {result} resolved to {replacement}"));
            changed = true;
        }
        changed
    }

    fn meet(list: &StatementList, state: &mut VersionState, other: &VersionState) {
        let slots: BTreeSet<u16> = state.keys().chain(other.keys()).copied().collect();
        for slot in slots {
            let ours = state.get(&slot).copied().unwrap_or(SsaVersion::Known(0));
            let theirs = other.get(&slot).copied().unwrap_or(SsaVersion::Known(0));
            let undefined = |version: SsaVersion| {
                version == SsaVersion::Known(0)
                    && list.variables().is_undefined(Variable::new(slot, 0))
            };
            let merged = if ours == theirs || undefined(theirs) {
                ours
            } else if undefined(ours) {
                theirs
            } else {
                SsaVersion::Ambiguous
            };
            state.insert(slot, merged);
        }
    }

    /// Forward dataflow of slot versions. Returns `true` if any stored state changed.
    fn annotate_versions(list: &mut StatementList) -> bool {
        if list.is_empty() {
            return false;
        }
        let graph = ssa_graph(list);
        let order = reverse_postorder(&graph, graph.entry());
        let count = graph.node_count();
        let mut entry: Vec<Option<VersionState>> = vec![None; count];
        let mut exit: Vec<Option<VersionState>> = vec![None; count];

        let mut changed = true;
        let mut rounds = 0;
        while changed && rounds <= count {
            changed = false;
            rounds += 1;
            for node in &order {
                let mut state: Option<VersionState> = None;
                for predecessor in graph.predecessors(*node) {
                    let Some(incoming) = &exit[predecessor.index()] else {
                        continue;
                    };
                    match &mut state {
                        None => state = Some(incoming.clone()),
                        Some(current) => Self::meet(list, current, incoming),
                    }
                }
                let mut state = state.unwrap_or_default();
                for join in &list[*node].joins {
                    state.insert(join.slot, SsaVersion::Known(join.result.version));
                }

                let mut after = state.clone();
                if let Some(defined) = list[*node].statement.defined_local() {
                    after.insert(defined.slot, SsaVersion::Known(defined.version));
                }

                if entry[node.index()].as_ref() != Some(&state) {
                    entry[node.index()] = Some(state);
                    changed = true;
                }
                if exit[node.index()].as_ref() != Some(&after) {
                    exit[node.index()] = Some(after);
                    changed = true;
                }
            }
        }

        let mut any = false;
        for node in order {
            let state = entry[node.index()].take().unwrap_or_default();
            if list[node].ssa != state {
                list[node].ssa = state;
                any = true;
            }
        }
        any
    }
}

impl StructuringPass for SsaIdentifiersPass {
    fn name(&self) -> &'static str {
        "ssa-identifiers"
    }

    fn description(&self) -> &'static str {
        "Resolves trivial joins and records the versions live at every statement"
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let resolved = self.resolve_trivial_joins(list, ctx);
        let annotated = Self::annotate_versions(list);
        resolved || annotated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::InstructionAssembler,
        compiler::{DecompilerComments, EventLog},
        config::DecompilerConfig,
        ir::{Expression, Statement},
        test::versioned_statements,
    };

    fn reads_of_slot(list: &StatementList, slot: u16) -> Vec<(StatementId, Variable)> {
        list.live()
            .flat_map(|id| {
                list[id]
                    .statement
                    .local_reads()
                    .into_iter()
                    .filter(move |v| v.slot == slot)
                    .map(move |v| (id, v))
            })
            .collect()
    }

    #[test]
    fn test_join_with_undefined_input_is_resolved() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.iload(0)?
            .ifeq("skip")?
            .iconst(5)?
            .istore(1)?
            .label("skip")?
            .iload(0)?
            .ifeq("zero")?
            .iload(1)?
            .ireturn()?
            .label("zero")?
            .iconst(0)?
            .ireturn()?;
        let mut list = versioned_statements(asm, "(I)I", true)?;
        assert!(list.live().any(|id| !list[id].joins.is_empty()));

        let config = DecompilerConfig::default();
        let events = EventLog::new();
        let mut comments = DecompilerComments::new();
        let mut ctx = PassContext::new("trivial", &config, &events, &mut comments);
        assert!(SsaIdentifiersPass::new().run(&mut list, &mut ctx));

        assert!(list.live().all(|id| list[id].joins.is_empty()));
        assert!(events.has(EventKind::JoinResolved));
        let reads = reads_of_slot(&list, 1);
        assert_eq!(reads.len(), 1);
        let (at, variable) = reads[0];
        assert_eq!(variable, Variable::new(1, 1));
        assert_eq!(list[at].version_at_entry(1), SsaVersion::Known(1));
        Ok(())
    }

    #[test]
    fn test_loop_join_survives_and_is_visible_in_body() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.iconst(0)?
            .istore(1)?
            .label("head")?
            .iload(1)?
            .iload(0)?
            .if_icmpge("exit")?
            .iinc(1, 1)?
            .goto("head")?
            .label("exit")?
            .iload(1)?
            .ireturn()?;
        let mut list = versioned_statements(asm, "(I)I", true)?;

        let config = DecompilerConfig::default();
        let events = EventLog::new();
        let mut comments = DecompilerComments::new();
        let mut ctx = PassContext::new("loop", &config, &events, &mut comments);
        SsaIdentifiersPass::new().run(&mut list, &mut ctx);

        let joins: usize = list.live().map(|id| list[id].joins.len()).sum();
        assert_eq!(joins, 1);
        let increment = list
            .live()
            .find(|id| {
                matches!(
                    &list[*id].statement,
                    Statement::Assignment(a) if matches!(a.value, Expression::Arithmetic { .. })
                        && a.target.local().is_some()
                )
            })
            .unwrap();
        assert_eq!(list[increment].version_at_entry(1), SsaVersion::Known(2));
        assert!(!events.has(EventKind::JoinResolved));

        // a second run finds nothing new
        assert!(!SsaIdentifiersPass::new().run(&mut list, &mut ctx));
        Ok(())
    }
}
