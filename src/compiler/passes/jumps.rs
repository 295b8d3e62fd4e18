//! Jump threading, pointless-jump removal and negative-jump inversion.

use crate::{
    compiler::{
        pass::PassContext,
        passes::{landing_after, raw_jump_target, same_landing, straight_successor, take_condition},
        DecompilerComment, EventKind, StructuringPass,
    },
    ir::{JumpKind, Statement, StatementId, StatementList},
};

/// Threads goto chains and turns jumps to the next statement into no-ops.
///
/// A raw jump whose target is itself a raw `goto` is retargeted to the final destination,
/// provided the intermediate jump is not nested deeper than the source. A raw `goto`, or a raw
/// `if` with a side-effect-free condition, whose target is the statement it would reach anyway
/// becomes a no-op. Both rewrites repeat until nothing changes, so the pass is idempotent.
pub struct RemovePointlessJumpsPass;

impl Default for RemovePointlessJumpsPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RemovePointlessJumpsPass {
    /// Creates a new pointless jump removal pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn final_destination(list: &StatementList, source: StatementId, target: StatementId) -> StatementId {
        let mut destination = target;
        for _ in 0..list.len() {
            let landing = list.skip_nops(destination);
            if !list[landing].statement.is_raw_goto()
                || !list[landing].blocks.is_subset(&list[source].blocks)
            {
                break;
            }
            match list[landing].targets.first() {
                Some(next) if *next != landing && *next != destination => destination = *next,
                _ => break,
            }
        }
        destination
    }

    fn thread(&self, list: &mut StatementList, ctx: &PassContext<'_>) -> bool {
        let mut changed = false;
        let jumps: Vec<StatementId> = list.live().collect();
        for id in jumps {
            let Some(target) = raw_jump_target(list, id) else {
                continue;
            };
            let destination = Self::final_destination(list, id, target);
            if destination == target {
                continue;
            }

            match list[id].statement {
                Statement::If { .. } => {
                    let fallthrough = list[id].targets[0];
                    list.set_targets(id, vec![fallthrough, destination]);
                }
                _ => list.replace_target(id, target, destination),
            }
            ctx.record(EventKind::JumpThreaded, self.name(), list, id)
                .message(format!("jump at {} threaded", list[id].index));
            changed = true;
        }
        changed
    }

    fn remove_pointless(&self, list: &mut StatementList, ctx: &PassContext<'_>) -> bool {
        let mut changed = false;
        let jumps: Vec<StatementId> = list.live().collect();
        for id in jumps.into_iter().rev() {
            let Some(target) = raw_jump_target(list, id) else {
                continue;
            };
            if landing_after(list, id) != Some(list.skip_nops(target)) {
                continue;
            }
            let next = match &list[id].statement {
                Statement::Goto(_) => target,
                Statement::If { condition, .. } if condition.is_pure() => list[id].targets[0],
                _ => continue,
            };
            ctx.record(EventKind::JumpRemoved, self.name(), list, id)
                .message(format!("jump at {} removed", list[id].index));
            list.make_nop(id, next);
            changed = true;
        }
        changed
    }
}

impl StructuringPass for RemovePointlessJumpsPass {
    fn name(&self) -> &'static str {
        "remove-pointless-jumps"
    }

    fn description(&self) -> &'static str {
        "Threads goto chains and removes jumps to the next statement"
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let mut any = false;
        loop {
            let threaded = self.thread(list, ctx);
            let removed = self.remove_pointless(list, ctx);
            if !threaded && !removed {
                break;
            }
            any = true;
        }
        any
    }
}

/// Inverts `if c goto L1; goto L2; L1:` into `if !c goto L2`.
///
/// With [`crate::config::DecompilerConfig::remove_try_back_edges`] set (the default), also deletes
/// unconditional back jumps from inside a try block to that try's handler. That rewrite can
/// change behaviour and is reported as a warning.
pub struct RewriteNegativeJumpsPass;

impl Default for RewriteNegativeJumpsPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RewriteNegativeJumpsPass {
    /// Creates a new negative jump rewrite pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn invert(&self, list: &mut StatementList, ctx: &PassContext<'_>) -> bool {
        let mut changed = false;
        let candidates: Vec<StatementId> = list.live().collect();
        for id in candidates {
            if list[id].removed || raw_jump_target(list, id).is_none() {
                continue;
            }
            let Statement::If { .. } = list[id].statement else {
                continue;
            };
            let Some(goto) = straight_successor(list, id) else {
                continue;
            };
            if !list[goto].statement.is_raw_goto() {
                continue;
            }
            let taken = list[id].targets[1];
            let Some(landing) = landing_after(list, goto) else {
                continue;
            };
            if !same_landing(list, taken, landing) {
                continue;
            }
            let Some(&far) = list[goto].targets.first() else {
                continue;
            };

            if let Some(condition) = take_condition(&mut list[id].statement) {
                let (condition, _) = condition.negate().simplify();
                list[id].statement = Statement::If {
                    condition,
                    jump: JumpKind::Goto,
                };
            }
            list.set_targets(id, vec![taken, far]);
            list.remove(goto);
            ctx.record(EventKind::JumpInverted, self.name(), list, id)
                .message(format!("negative jump at {} inverted", list[id].index));
            changed = true;
        }
        changed
    }

    fn enters_handler_of(list: &StatementList, target: StatementId, source: StatementId) -> bool {
        let handler_of = |id: StatementId| match &list[id].statement {
            Statement::Catch { try_block, .. } => list[source].blocks.contains(try_block),
            _ => false,
        };
        handler_of(target) || list[target].sources.iter().any(|s| handler_of(*s))
    }

    fn remove_back_edges(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let mut changed = false;
        let candidates: Vec<StatementId> = list.live().collect();
        for id in candidates {
            if !list[id].statement.is_raw_goto() {
                continue;
            }
            let Some(target) = list[id].jump_target() else {
                continue;
            };
            if list[target].index >= list[id].index || !Self::enters_handler_of(list, target, id) {
                continue;
            }

            ctx.record(EventKind::BackEdgeRemoved, self.name(), list, id)
                .message(format!("back jump at {} into its handler removed", list[id].index));
            ctx.events
                .warn(format!("{}: removed back jump from a try to a catch block", ctx.method));
            ctx.comment(DecompilerComment::TryBackEdgeRemoved);
            match list.next(id) {
                Some(next) => list.make_nop(id, next),
                None => {
                    list.set_targets(id, Vec::new());
                    list[id].statement = Statement::Nop;
                }
            }
            changed = true;
        }
        changed
    }
}

impl StructuringPass for RewriteNegativeJumpsPass {
    fn name(&self) -> &'static str {
        "rewrite-negative-jumps"
    }

    fn description(&self) -> &'static str {
        "Inverts conditional jumps over unconditional jumps"
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let mut changed = false;
        if ctx.config.remove_try_back_edges {
            changed |= self.remove_back_edges(list, ctx);
        }
        changed |= self.invert(list, ctx);
        changed
    }
}
