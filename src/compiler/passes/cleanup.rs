//! Renumbering and no-op removal.

use crate::{
    compiler::{pass::PassContext, EventKind, StructuringPass},
    ir::{StatementId, StatementList},
};

/// Compacts the positional order, dropping tombstoned statements.
///
/// The pipeline already renumbers after every changing pass; as a pass of its own it makes the
/// compaction point explicit at the start of the pipeline.
pub struct RenumberPass;

impl Default for RenumberPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenumberPass {
    /// Creates a new renumbering pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StructuringPass for RenumberPass {
    fn name(&self) -> &'static str {
        "renumber"
    }

    fn description(&self) -> &'static str {
        "Assigns dense positional indices and drops deleted statements"
    }

    fn run(&self, list: &mut StatementList, _ctx: &mut PassContext<'_>) -> bool {
        let had_tombstones = list.order().len() != list.len();
        list.renumber();
        had_tombstones
    }
}

/// Unlinks no-op statements.
///
/// A no-op with a single forward target hands its sources and join markers to that target.
/// A no-op nothing reaches is deleted outright.
pub struct RemoveNopsPass;

impl Default for RemoveNopsPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoveNopsPass {
    /// Creates a new no-op removal pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn removable(list: &StatementList, id: StatementId) -> bool {
        let statement = &list[id];
        if !statement.statement.is_nop() {
            return false;
        }
        match statement.targets.as_slice() {
            [] => statement.sources.iter().all(|source| *source == id),
            [target] => *target != id,
            _ => false,
        }
    }
}

impl StructuringPass for RemoveNopsPass {
    fn name(&self) -> &'static str {
        "remove-nops"
    }

    fn description(&self) -> &'static str {
        "Relinks the sources of no-ops to their targets"
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let candidates: Vec<StatementId> = list.live().collect();
        let mut removed = 0usize;
        for id in candidates {
            if Self::removable(list, id) {
                list.remove(id);
                removed += 1;
            }
        }
        if removed > 0 {
            ctx.events
                .record(EventKind::NopRemoved)
                .method(ctx.method)
                .pass(self.name())
                .message(format!("removed {removed} no-ops"));
        }
        removed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::InstructionAssembler,
        compiler::{DecompilerComments, EventLog},
        config::DecompilerConfig,
        test::versioned_statements,
        utils::graph::edges_are_symmetric,
    };

    #[test]
    fn test_nops_are_unlinked() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.emit(crate::assembly::opcodes::NOP)?
            .emit(crate::assembly::opcodes::NOP)?
            .iconst(3)?
            .ireturn()?;
        let mut list = versioned_statements(asm, "()I", true)?;
        let before = list.len();

        let config = DecompilerConfig::default();
        let events = EventLog::new();
        let mut comments = DecompilerComments::new();
        let mut ctx = PassContext::new("nops", &config, &events, &mut comments);

        let pass = RemoveNopsPass::new();
        assert!(pass.run(&mut list, &mut ctx));
        list.renumber();
        // the sentinel and both nop instructions
        assert_eq!(list.len(), before - 3);
        assert!(edges_are_symmetric(&list));
        assert!(events.has(EventKind::NopRemoved));

        assert!(!pass.run(&mut list, &mut ctx));
        Ok(())
    }

    #[test]
    fn test_renumber_reports_tombstones() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.iconst(1)?.ireturn()?;
        let mut list = versioned_statements(asm, "()I", true)?;

        let config = DecompilerConfig::default();
        let events = EventLog::new();
        let mut comments = DecompilerComments::new();
        let mut ctx = PassContext::new("renumber", &config, &events, &mut comments);

        let pass = RenumberPass::new();
        assert!(!pass.run(&mut list, &mut ctx));
        let first = list.live().next().unwrap();
        list.remove(first);
        assert!(pass.run(&mut list, &mut ctx));
        assert_eq!(pass.name(), "renumber");
        Ok(())
    }
}
