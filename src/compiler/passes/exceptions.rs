//! Catch bodies and synchronized catch-all pruning.

use std::collections::BTreeSet;

use crate::{
    analysis::{BlockIdentifier, CatchType},
    compiler::{
        pass::PassContext,
        passes::{landing_after, raw_jump_target, same_landing},
        DecompilerComment, EventKind, StructuringPass,
    },
    config::DecompilerConfig,
    ir::{JumpKind, Statement, StatementId, StatementList},
};

/// Gives every catch handler a body block.
///
/// The body is the contiguous run after the catch header that stays in the header's enclosing
/// blocks and is entered only from within; it stops at the next handler of any try. The
/// jump over the handlers at the end of the try body, and a jump at the end of a catch body to
/// the statement after the last handler, become `EndBlock` jumps.
pub struct IdentifyCatchBlocksPass;

impl Default for IdentifyCatchBlocksPass {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentifyCatchBlocksPass {
    /// Creates a new catch block identification pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Inclusive positions of the body of the catch at `catch`, if it is not empty.
    fn body(list: &StatementList, catch: StatementId) -> Option<(usize, usize)> {
        let Statement::Catch { try_block, .. } = list[catch].statement else {
            return None;
        };
        let outer = &list[catch].blocks;
        let header = list[catch].index;

        let mut end = header;
        for id in list.live().filter(|id| list[*id].index > header) {
            let statement = &list[id];
            let closes = matches!(statement.statement, Statement::Catch { .. })
                || statement.blocks.contains(&try_block)
                || !outer.is_subset(&statement.blocks);
            if closes {
                break;
            }
            end = statement.index;
        }

        while end > header {
            let entered = list.range(header + 1, end).find(|id| {
                list[*id].sources.iter().any(|source| {
                    let index = list[*source].index;
                    index < header || index > end
                })
            });
            match entered {
                Some(id) => end = list[id].index - 1,
                None => break,
            }
        }
        (end > header).then_some((header + 1, end))
    }

    fn identify(&self, list: &mut StatementList, catch: StatementId, ctx: &PassContext<'_>) -> bool {
        let Statement::Catch { block, .. } = list[catch].statement else {
            return false;
        };
        if list.block_range(block).is_some() {
            return false;
        }
        let Some((start, end)) = Self::body(list, catch) else {
            return false;
        };
        if !list.range_respects_nesting(start, end) {
            return false;
        }
        let members: Vec<StatementId> = list.range(start, end).collect();
        for id in &members {
            list[*id].blocks.insert(block);
        }
        ctx.record(EventKind::CatchIdentified, self.name(), list, catch)
            .message(format!("catch {} has {} statements", block.label(), members.len()));
        true
    }

    /// Turns the jumps over a try's handlers into `EndBlock` jumps.
    fn close_try(list: &mut StatementList, try_block: BlockIdentifier) -> bool {
        let catches: Vec<(StatementId, BlockIdentifier)> = list
            .live()
            .filter_map(|id| match list[id].statement {
                Statement::Catch {
                    try_block: owner,
                    block,
                    ..
                } if owner == try_block => Some((id, block)),
                _ => None,
            })
            .collect();
        let Some((_, last_protected)) = list.block_range(try_block) else {
            return false;
        };
        let Some(first_catch) = catches.iter().map(|(id, _)| list[*id].index).min() else {
            return false;
        };
        let handlers_end = catches
            .iter()
            .map(|(id, block)| list.block_range(*block).map_or(list[*id].index, |(_, last)| last))
            .max()
            .unwrap_or(first_catch);
        let Some(exit) = list.at(handlers_end).and_then(|id| landing_after(list, id)) else {
            return false;
        };

        let mut changed = false;
        if first_catch > last_protected {
            let gap: Vec<StatementId> = list.between(last_protected, first_catch).collect();
            if gap.iter().all(|id| {
                let statement = &list[*id].statement;
                statement.is_nop() || statement.is_raw_goto()
            }) {
                for id in gap {
                    changed |= list[id].blocks.insert(try_block);
                }
            }
            let jumps: Vec<StatementId> = list.range(last_protected, first_catch - 1).collect();
            for id in jumps {
                if list[id].statement.is_raw_goto()
                    && raw_jump_target(list, id).is_some_and(|target| same_landing(list, target, exit))
                {
                    list[id].statement = Statement::Goto(JumpKind::EndBlock(try_block));
                    changed = true;
                }
            }
        }

        for (_, block) in catches {
            let Some(last) = list.block_range(block).and_then(|(_, last)| list.at(last)) else {
                continue;
            };
            if list[last].statement.is_raw_goto()
                && raw_jump_target(list, last).is_some_and(|target| same_landing(list, target, exit))
            {
                list[last].statement = Statement::Goto(JumpKind::EndBlock(block));
                changed = true;
            }
        }
        changed
    }
}

impl StructuringPass for IdentifyCatchBlocksPass {
    fn name(&self) -> &'static str {
        "identify-catch-blocks"
    }

    fn description(&self) -> &'static str {
        "Identifies catch bodies and the jumps over them"
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let catches: Vec<StatementId> = list
            .live()
            .filter(|id| matches!(list[*id].statement, Statement::Catch { .. }))
            .collect();
        let mut changed = false;
        for catch in catches {
            changed |= self.identify(list, catch, ctx);
        }

        let tries: Vec<BlockIdentifier> = list
            .live()
            .filter_map(|id| match list[id].statement {
                Statement::Try { block } => Some(block),
                _ => None,
            })
            .collect();
        for block in tries {
            changed |= Self::close_try(list, block);
        }
        changed
    }
}

/// Deletes the catch-all handlers javac emits to release a monitor.
///
/// A catch-all whose body is exactly `monitorexit(x); throw e` is removed. A try left without
/// handlers loses its header, its block membership and its `EndBlock` jumps, which turn back
/// into raw jumps.
pub struct RemoveSynchronizedCatchesPass;

impl Default for RemoveSynchronizedCatchesPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoveSynchronizedCatchesPass {
    /// Creates a new synchronized catch removal pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Removes the handler at `catch` if it only releases a monitor. Returns its try block.
    fn prune(list: &mut StatementList, catch: StatementId) -> Option<BlockIdentifier> {
        let Statement::Catch {
            try_block,
            block,
            catch_types,
            ..
        } = &list[catch].statement
        else {
            return None;
        };
        if catch_types.as_slice() != [CatchType::Any] {
            return None;
        }
        let (try_block, block) = (*try_block, *block);

        let members = list.members(block);
        let body: Vec<&Statement> = members
            .iter()
            .map(|id| &list[*id].statement)
            .filter(|statement| !statement.is_nop())
            .collect();
        if !matches!(
            body.as_slice(),
            [Statement::MonitorExit(_), Statement::Throw(_)]
        ) {
            return None;
        }

        for id in members.into_iter().rev() {
            list.remove(id);
        }
        list.remove(catch);
        Some(try_block)
    }

    fn dissolve_try(list: &mut StatementList, try_block: BlockIdentifier) {
        let has_handler = list.live().any(|id| {
            matches!(list[id].statement, Statement::Catch { try_block: owner, .. } if owner == try_block)
        });
        if has_handler {
            return;
        }
        if let Some(header) = list.header_of(try_block) {
            list.remove(header);
        }
        let members = list.members(try_block);
        for id in members {
            list[id].blocks.remove(&try_block);
            if list[id].statement == Statement::Goto(JumpKind::EndBlock(try_block)) {
                list[id].statement = Statement::Goto(JumpKind::Goto);
            }
        }
    }
}

impl StructuringPass for RemoveSynchronizedCatchesPass {
    fn name(&self) -> &'static str {
        "remove-synchronized-catches"
    }

    fn description(&self) -> &'static str {
        "Removes catch-all handlers that only release a monitor"
    }

    fn should_run(&self, config: &DecompilerConfig) -> bool {
        config.prune_synchronized_catches
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let catches: Vec<StatementId> = list
            .live()
            .filter(|id| matches!(list[*id].statement, Statement::Catch { .. }))
            .collect();

        let mut pruned = BTreeSet::new();
        for catch in catches {
            if let Some(try_block) = Self::prune(list, catch) {
                ctx.record(EventKind::ExceptionPruned, self.name(), list, catch)
                    .message(format!("catch-all of {} removed", try_block.label()));
                pruned.insert(try_block);
            }
        }
        if pruned.is_empty() {
            return false;
        }
        for try_block in pruned {
            Self::dissolve_try(list, try_block);
        }
        ctx.comment(DecompilerComment::PrunedExceptions);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::InstructionAssembler,
        test::{rendered, structured_until, EXCEPTION, PRINTLN_INT, SYSTEM_OUT},
        utils::graph::edges_are_symmetric,
    };

    fn print(asm: &mut InstructionAssembler, value: i32) -> crate::Result<()> {
        asm.getstatic(SYSTEM_OUT)?
            .iconst(value)?
            .invokevirtual(PRINTLN_INT)?;
        Ok(())
    }

    fn catch_blocks(list: &StatementList) -> Vec<(StatementId, BlockIdentifier)> {
        list.live()
            .filter_map(|id| match list[id].statement {
                Statement::Catch { block, .. } => Some((id, block)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_catch_bodies_and_end_jumps() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.label("start")?;
        print(&mut asm, 1)?;
        asm.label("end")?.goto("after")?.label("first")?.astore(0)?;
        print(&mut asm, 2)?;
        asm.goto("after")?.label("second")?.astore(0)?;
        print(&mut asm, 3)?;
        asm.label("after")?
            .vreturn()?
            .exception_handler("start", "end", "first", Some(EXCEPTION))?
            .exception_handler("start", "end", "second", None)?;

        let result = structured_until(
            asm,
            "()V",
            true,
            "identify-catch-blocks",
            &DecompilerConfig::default(),
        )?;
        let list = &result.list;
        let lines = rendered(list);
        let try_block = list
            .live()
            .find_map(|id| match list[id].statement {
                Statement::Try { block } => Some(block),
                _ => None,
            })
            .unwrap();
        assert!(lines.contains(&format!("end {}", try_block.label())));
        assert!(lines
            .iter()
            .any(|line| line.starts_with("catch (java.lang.Exception v0_")));
        assert!(lines
            .iter()
            .any(|line| line.starts_with("catch (java.lang.Throwable v0_")));

        let catches = catch_blocks(list);
        assert_eq!(catches.len(), 2);
        let (_, first) = catches[0];
        let (_, second) = catches[1];
        assert!(lines.contains(&format!("end {}", first.label())));
        assert_eq!(list.members(first).len(), 2);
        assert_eq!(list.members(second).len(), 1);
        // the shared return is in neither handler
        let ret = list
            .live()
            .find(|id| matches!(list[*id].statement, Statement::Return(_)))
            .unwrap();
        assert!(list[ret].blocks.is_empty());
        assert_eq!(result.events.count_kind(EventKind::CatchIdentified), 2);
        assert!(edges_are_symmetric(list));
        Ok(())
    }

    fn synchronized_print() -> crate::Result<InstructionAssembler> {
        let mut asm = InstructionAssembler::new();
        asm.aload(0)?
            .dup()?
            .astore(1)?
            .monitorenter()?
            .label("start")?;
        print(&mut asm, 1)?;
        asm.aload(1)?
            .monitorexit()?
            .label("end")?
            .goto("after")?
            .label("handler")?
            .astore(2)?
            .aload(1)?
            .monitorexit()?
            .aload(2)?
            .athrow()?
            .label("after")?
            .vreturn()?
            .exception_handler("start", "end", "handler", None)?;
        Ok(asm)
    }

    #[test]
    fn test_monitor_release_handler_is_pruned() -> crate::Result<()> {
        let result = structured_until(
            synchronized_print()?,
            "(Ljava/lang/Object;)V",
            true,
            "remove-synchronized-catches",
            &DecompilerConfig::default(),
        )?;
        let list = &result.list;
        let lines = rendered(list);
        assert!(!lines.iter().any(|line| line == "try" || line.starts_with("catch")));
        assert!(!lines.iter().any(|line| line.starts_with("throw")));
        assert_eq!(
            lines.iter().filter(|line| line.starts_with("monitorexit(")).count(),
            1
        );
        assert!(list.live().all(|id| list[id].blocks.is_empty()));
        assert!(result.comments.contains(DecompilerComment::PrunedExceptions));
        assert!(result.events.has(EventKind::ExceptionPruned));
        assert!(edges_are_symmetric(list));
        Ok(())
    }

    #[test]
    fn test_pruning_disabled_keeps_handler() -> crate::Result<()> {
        let result = structured_until(
            synchronized_print()?,
            "(Ljava/lang/Object;)V",
            true,
            "remove-synchronized-catches",
            &DecompilerConfig::minimal(),
        )?;
        let lines = rendered(&result.list);
        assert!(lines.contains(&"try".to_string()));
        assert!(lines.iter().any(|line| line.starts_with("catch (java.lang.Throwable")));
        assert!(!result.comments.contains(DecompilerComment::PrunedExceptions));
        Ok(())
    }
}
