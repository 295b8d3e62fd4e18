//! Structuring passes.
//!
//! Every pass implements [`crate::compiler::StructuringPass`] and is a total rewrite of one
//! method's [`StatementList`]: a pattern that is not recognised is left untouched.
//!
//! # Categories
//!
//! - **Cleanup**: [`RenumberPass`], [`RemovePointlessJumpsPass`], [`RemoveNopsPass`]
//! - **Values**: [`SsaIdentifiersPass`], [`CondenseAssignmentsPass`], [`CollapseAssignmentsPass`]
//! - **Conditions**: [`CondenseConditionalsPass`], [`SimplifyConditionalsPass`],
//!   [`RewriteNegativeJumpsPass`], [`IdentifyConditionalsPass`]
//! - **Loops**: [`IdentifyLoopsPass`], [`RewriteBreaksPass`], [`RewriteForLoopsPass`],
//!   [`RecogniseIterationPass`]
//! - **Regions**: [`ReplaceRawSwitchesPass`], [`IdentifyCatchBlocksPass`],
//!   [`RemoveSynchronizedCatchesPass`], [`IdentifySynchronizedPass`]

mod cleanup;
mod condense;
mod conditionals;
mod exceptions;
mod iteration;
mod jumps;
mod loops;
mod ssa;
mod switches;
mod synchronized;

pub use cleanup::{RemoveNopsPass, RenumberPass};
pub use condense::{CollapseAssignmentsPass, CondenseAssignmentsPass};
pub use conditionals::{CondenseConditionalsPass, IdentifyConditionalsPass, SimplifyConditionalsPass};
pub use exceptions::{IdentifyCatchBlocksPass, RemoveSynchronizedCatchesPass};
pub use iteration::RecogniseIterationPass;
pub use jumps::{RemovePointlessJumpsPass, RewriteNegativeJumpsPass};
pub use loops::{IdentifyLoopsPass, RewriteBreaksPass, RewriteForLoopsPass};
pub use ssa::SsaIdentifiersPass;
pub use switches::ReplaceRawSwitchesPass;
pub use synchronized::IdentifySynchronizedPass;

use crate::ir::{JumpKind, Statement, StatementId, StatementList};

/// Target of `id` if it is a raw `goto` or a raw conditional jump.
fn raw_jump_target(list: &StatementList, id: StatementId) -> Option<StatementId> {
    match list[id].statement.jump_kind() {
        Some(JumpKind::Goto) => list[id].jump_target(),
        _ => None,
    }
}

/// The statement control reaches from `id` when it falls through, following no-ops that have a
/// single source and a single target. Returns `None` unless the statement reached is entered
/// only along that path.
fn straight_successor(list: &StatementList, id: StatementId) -> Option<StatementId> {
    let mut from = id;
    let mut current = *list[id].targets.first()?;
    loop {
        if list[current].sources.len() != 1 || !list[current].sources.contains(&from) {
            return None;
        }
        if !list[current].statement.is_nop() {
            return Some(current);
        }
        match list[current].targets.as_slice() {
            [next] if *next != current => {
                from = current;
                current = *next;
            }
            _ => return None,
        }
    }
}

/// The first statement after `id` positionally that is not a no-op, resolved through forward
/// no-op chains.
fn landing_after(list: &StatementList, id: StatementId) -> Option<StatementId> {
    list.next(id).map(|next| list.skip_nops(next))
}

/// Returns `true` if `a` and `b` land on the same statement once forward no-ops are skipped.
fn same_landing(list: &StatementList, a: StatementId, b: StatementId) -> bool {
    list.skip_nops(a) == list.skip_nops(b)
}

/// Takes the condition out of an `If`, leaving `true` behind.
fn take_condition(statement: &mut Statement) -> Option<crate::ir::Expression> {
    match statement {
        Statement::If { condition, .. } => Some(std::mem::replace(
            condition,
            crate::ir::Expression::boolean(true),
        )),
        _ => None,
    }
}
