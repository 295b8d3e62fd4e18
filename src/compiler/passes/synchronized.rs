//! Synchronized blocks.

use crate::{
    analysis::BlockKind,
    compiler::{pass::PassContext, EventKind, StructuringPass},
    config::DecompilerConfig,
    ir::{Expression, LValue, Statement, StatementId, StatementList},
};

/// Pairs `monitorenter` with the `monitorexit` statements on the same lock variable.
///
/// The block runs from the enter to the last exit and must be single-entry. Exits on early-exit
/// paths inside the range are paired too. javac stores the lock in a local before entering; when
/// that local is only used by the exits, the stored expression becomes the block's monitor.
/// Monitor statements that cannot be paired are left in place.
pub struct IdentifySynchronizedPass;

impl Default for IdentifySynchronizedPass {
    fn default() -> Self {
        Self::new()
    }
}

/// The lock of a `monitorenter`.
struct Lock {
    slot: u16,
    monitor: Expression,
    /// Stack definition and local store folded into the header.
    folded: Vec<StatementId>,
}

impl IdentifySynchronizedPass {
    /// Creates a new synchronized block identification pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn exits_slot(statement: &Statement, slot: u16) -> bool {
        matches!(statement, Statement::MonitorExit(Expression::Local(variable)) if variable.slot == slot)
    }

    /// `s = e; v = s; monitorenter(s)` or `monitorenter(v)`.
    fn lock(list: &StatementList, enter: StatementId) -> Option<Lock> {
        let Statement::MonitorEnter(value) = &list[enter].statement else {
            return None;
        };
        match value {
            Expression::Local(variable) => Some(Lock {
                slot: variable.slot,
                monitor: value.clone(),
                folded: Vec::new(),
            }),
            Expression::Stack(stack) => {
                let store = list.prev_non_nop(enter)?;
                let Statement::Assignment(assignment) = &list[store].statement else {
                    return None;
                };
                let variable = assignment.target.local()?;
                if assignment.value != Expression::Stack(*stack) {
                    return None;
                }
                let definition = list.prev_non_nop(store)?;
                let Statement::Assignment(defined) = &list[definition].statement else {
                    return None;
                };
                if defined.target != LValue::Stack(*stack)
                    || list[definition].blocks != list[enter].blocks
                    || list[store].blocks != list[enter].blocks
                {
                    return None;
                }
                Some(Lock {
                    slot: variable.slot,
                    monitor: defined.value.clone(),
                    folded: vec![definition, store],
                })
            }
            _ => None,
        }
    }

    fn identify(&self, list: &mut StatementList, enter: StatementId, ctx: &PassContext<'_>) -> bool {
        let Some(mut lock) = Self::lock(list, enter) else {
            return false;
        };
        let start = list[enter].index + 1;
        let exits: Vec<StatementId> = list
            .live()
            .filter(|id| list[*id].index >= start)
            .take_while(|id| !matches!(list[*id].statement, Statement::MonitorEnter(_)))
            .filter(|id| Self::exits_slot(&list[*id].statement, lock.slot))
            .collect();
        let Some(&last) = exits.last() else {
            return false;
        };
        let end = list[last].index;
        if !list.range_respects_nesting(start, end)
            || !list.is_single_entry(start, end)
            || list.at(start).is_some_and(|first| list[first].blocks != list[enter].blocks)
        {
            return false;
        }

        // Keep the local when the body reads it.
        let read_in_body = list
            .range(start, end)
            .filter(|id| !exits.contains(id))
            .any(|id| {
                let mut reads = 0;
                list[id]
                    .statement
                    .for_each_expression(&mut |e| reads += e.count_slot(lock.slot));
                reads > 0
            });
        let kept = match lock.folded[..] {
            [definition, store] if read_in_body => Some((definition, store)),
            _ => None,
        };
        if let Some((definition, store)) = kept {
            if let Statement::Assignment(assignment) = &mut list[store].statement {
                assignment.value = lock.monitor.clone();
                if let Some(variable) = assignment.target.local() {
                    lock.monitor = Expression::Local(variable);
                }
            }
            lock.folded = vec![definition];
        }

        let block = list.blocks_mut().mint(BlockKind::Synchronized);
        let members: Vec<StatementId> = list.range(start, end).collect();
        for id in members {
            list[id].blocks.insert(block);
        }
        for id in &exits {
            list[*id].statement = Statement::Nop;
        }
        list[enter].statement = Statement::Synchronized {
            monitor: lock.monitor,
            block,
        };
        for id in lock.folded {
            list.remove(id);
        }

        ctx.record(EventKind::SynchronizedIdentified, self.name(), list, enter)
            .message(format!(
                "synchronized {} with {} exits",
                block.label(),
                exits.len()
            ));
        true
    }
}

impl StructuringPass for IdentifySynchronizedPass {
    fn name(&self) -> &'static str {
        "identify-synchronized"
    }

    fn description(&self) -> &'static str {
        "Pairs monitor enter and exit statements into synchronized blocks"
    }

    fn should_run(&self, config: &DecompilerConfig) -> bool {
        config.recognise_synchronized
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let enters: Vec<StatementId> = list
            .live()
            .filter(|id| matches!(list[*id].statement, Statement::MonitorEnter(_)))
            .collect();
        let mut changed = false;
        // Innermost first.
        for enter in enters.into_iter().rev() {
            changed |= self.identify(list, enter, ctx);
        }
        changed
    }
}
