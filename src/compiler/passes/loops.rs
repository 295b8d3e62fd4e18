//! Loop identification, break/continue rewriting and for-loop recovery.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    analysis::{BlockIdentifier, BlockKind},
    compiler::{
        pass::PassContext,
        passes::{landing_after, raw_jump_target, same_landing, straight_successor, take_condition},
        EventKind, StructuringPass,
    },
    config::DecompilerConfig,
    ir::{JumpKind, Statement, StatementId, StatementList},
};

/// Turns back jumps into loops.
///
/// A raw jump whose target does not lie after it closes a loop over the statements from the
/// target to the jump. Only the last back jump to each target is considered, and the smallest
/// ranges are handled first so inner loops are built before the loops around them.
///
/// | Shape | Result |
/// |-------|--------|
/// | `goto T; B: ...; T: if c goto B` | `while (c)` replacing the entry jump |
/// | `B: ...; if c goto B` | `do { } while (c)` |
/// | `B: if c goto X; ...; goto B; X:` | `while (!c)` replacing the top test |
/// | `B: ...; goto B` | `while (true)` |
///
/// The back jump becomes the loop's `LoopEnd`. A candidate entered from outside the range, or
/// that would cut through an existing block, is left raw.
pub struct IdentifyLoopsPass;

impl Default for IdentifyLoopsPass {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentifyLoopsPass {
    /// Creates a new loop identification pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// `(target, jump)` pairs for the last back jump to each target, smallest range first.
    fn back_jumps(list: &StatementList) -> Vec<(StatementId, StatementId)> {
        let mut last = BTreeMap::new();
        for id in list.live() {
            let Some(target) = raw_jump_target(list, id) else {
                continue;
            };
            if list[target].index <= list[id].index {
                last.insert(target, id);
            }
        }
        let mut jumps: Vec<(StatementId, StatementId)> = last.into_iter().collect();
        jumps.sort_by_key(|(target, jump)| {
            (
                list[*jump].index - list[*target].index,
                list[*target].index,
            )
        });
        jumps
    }

    fn identify(
        &self,
        list: &mut StatementList,
        header: StatementId,
        jump: StatementId,
        ctx: &PassContext<'_>,
    ) -> bool {
        // A jump back to the header of a loop it is already inside is a continue.
        if let Some(block) = list[header].statement.opened_block() {
            if block.kind().is_loop() && list[jump].blocks.contains(&block) {
                return false;
            }
        }

        let built = match list[jump].statement {
            Statement::If { .. } => Self::test_at_end(list, header, jump)
                .or_else(|| Self::do_while(list, header, jump)),
            Statement::Goto(_) => Self::test_at_top(list, header, jump)
                .or_else(|| Self::unconditional(list, header, jump)),
            _ => None,
        };
        let Some((head, block, shape)) = built else {
            return false;
        };
        ctx.record(EventKind::LoopIdentified, self.name(), list, head)
            .message(format!("{shape} loop {}", block.label()));
        true
    }

    /// `goto T; B: body; T: if c goto B`
    fn test_at_end(
        list: &mut StatementList,
        header: StatementId,
        jump: StatementId,
    ) -> Option<(StatementId, BlockIdentifier, &'static str)> {
        let entry = list.prev_non_nop(header)?;
        let enters_test = list[entry].statement.is_raw_goto()
            && list[entry]
                .jump_target()
                .is_some_and(|target| same_landing(list, target, jump));
        if !enters_test || list[entry].blocks != list[header].blocks {
            return None;
        }

        let (start, end) = (list[entry].index + 1, list[jump].index);
        let closed = list.range(start, end).all(|id| {
            list[id].sources.iter().all(|source| {
                *source == entry || (start..=end).contains(&list[*source].index)
            })
        });
        if !closed || !list.range_respects_nesting(start, end) {
            return None;
        }
        let exit = *list[jump].targets.first()?;
        let members: Vec<StatementId> = list.range(start, end).collect();

        let condition = take_condition(&mut list[jump].statement)?;
        let block = list.blocks_mut().mint(BlockKind::Loop);
        list[entry].statement = Statement::While {
            condition: Some(condition),
            block,
        };
        list.set_targets(entry, vec![header, exit]);
        list[jump].statement = Statement::LoopEnd {
            condition: None,
            block,
        };
        list.set_targets(jump, vec![entry]);
        for id in members {
            list[id].blocks.insert(block);
        }
        Some((entry, block, "while"))
    }

    /// `B: body; if c goto B`
    fn do_while(
        list: &mut StatementList,
        header: StatementId,
        jump: StatementId,
    ) -> Option<(StatementId, BlockIdentifier, &'static str)> {
        let (start, end) = (list[header].index, list[jump].index);
        if !list.is_single_entry(start, end) || !list.range_respects_nesting(start, end) {
            return None;
        }
        let exit = *list[jump].targets.first()?;
        let members: BTreeSet<StatementId> = list.range(start, end).collect();

        let condition = take_condition(&mut list[jump].statement)?;
        let block = list.blocks_mut().mint(BlockKind::DoLoop);
        let blocks = list[header].blocks.clone();
        let head = list.insert_before(header, Statement::Do { block }, blocks);
        list.redirect_sources(header, head, |_, source| !members.contains(&source));
        list.add_edge(head, header);

        list[jump].statement = Statement::LoopEnd {
            condition: Some(condition),
            block,
        };
        list.set_targets(jump, vec![exit, head]);
        for id in members {
            list[id].blocks.insert(block);
        }
        Some((head, block, "do"))
    }

    /// `B: if c goto X; body; goto B; X:`
    fn test_at_top(
        list: &mut StatementList,
        header: StatementId,
        jump: StatementId,
    ) -> Option<(StatementId, BlockIdentifier, &'static str)> {
        if !matches!(
            list[header].statement,
            Statement::If {
                jump: JumpKind::Goto,
                ..
            }
        ) || header == jump
        {
            return None;
        }
        let exit = *list[header].targets.get(1)?;
        let after = landing_after(list, jump)?;
        // The exit may already be threaded through the jump that follows the loop, such as the
        // jump over a try's handlers.
        let threaded = !same_landing(list, exit, after)
            && list[after].statement.is_raw_goto()
            && list[after]
                .jump_target()
                .is_some_and(|target| same_landing(list, exit, target));
        if !threaded && !same_landing(list, exit, after) {
            return None;
        }
        let (start, end) = (list[header].index, list[jump].index);
        if !list.is_single_entry(start, end) || !list.range_respects_nesting(start, end) {
            return None;
        }
        let members: Vec<StatementId> = list.range(start + 1, end).collect();

        let condition = take_condition(&mut list[header].statement)?;
        if threaded {
            list.replace_target(header, exit, after);
        }
        let block = list.blocks_mut().mint(BlockKind::Loop);
        list[header].statement = Statement::While {
            condition: Some(condition.negate().simplify().0),
            block,
        };
        list[jump].statement = Statement::LoopEnd {
            condition: None,
            block,
        };
        for id in members {
            list[id].blocks.insert(block);
        }
        Some((header, block, "while"))
    }

    /// `B: body; goto B`
    fn unconditional(
        list: &mut StatementList,
        header: StatementId,
        jump: StatementId,
    ) -> Option<(StatementId, BlockIdentifier, &'static str)> {
        let (start, end) = (list[header].index, list[jump].index);
        if !list.is_single_entry(start, end) || !list.range_respects_nesting(start, end) {
            return None;
        }
        let members: Vec<StatementId> = list.range(start, end).collect();

        let block = list.blocks_mut().mint(BlockKind::Loop);
        let blocks = list[header].blocks.clone();
        let head = list.insert_before(
            header,
            Statement::While {
                condition: None,
                block,
            },
            blocks,
        );
        list.redirect_sources(header, head, |_, _| true);
        list.add_edge(head, header);
        list[jump].statement = Statement::LoopEnd {
            condition: None,
            block,
        };
        for id in members {
            list[id].blocks.insert(block);
        }
        Some((head, block, "while (true)"))
    }
}

impl StructuringPass for IdentifyLoopsPass {
    fn name(&self) -> &'static str {
        "identify-loops"
    }

    fn description(&self) -> &'static str {
        "Turns back jumps into while, do and endless loops"
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let mut attempted = BTreeSet::new();
        let mut changed = false;
        loop {
            let candidate = Self::back_jumps(list)
                .into_iter()
                .find(|pair| !attempted.contains(pair));
            let Some((header, jump)) = candidate else {
                break;
            };
            attempted.insert((header, jump));
            changed |= self.identify(list, header, jump, ctx);
        }
        changed
    }
}

/// Rewrites raw jumps that leave or restart an enclosing breakable block.
///
/// Enclosing loops and switches are tried innermost first. A jump to a loop's continue point
/// (a while header, or the loop end of any loop) becomes `continue`; a jump to the statement
/// after a block becomes `break`. Jumps that match neither stay raw.
pub struct RewriteBreaksPass;

impl Default for RewriteBreaksPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RewriteBreaksPass {
    /// Creates a new break rewrite pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn continue_points(list: &StatementList, block: BlockIdentifier) -> Vec<StatementId> {
        let mut points: Vec<StatementId> = list
            .members(block)
            .into_iter()
            .filter(|id| {
                matches!(list[*id].statement, Statement::LoopEnd { block: owner, .. } if owner == block)
            })
            .collect();
        if block.kind() == BlockKind::Loop {
            if let Some(header) = list.header_of(block) {
                if matches!(list[header].statement, Statement::While { .. }) {
                    points.push(header);
                }
            }
        }
        points
    }

    fn classify(list: &StatementList, block: BlockIdentifier, target: StatementId) -> Option<JumpKind> {
        if block.kind().is_loop()
            && Self::continue_points(list, block)
                .iter()
                .any(|point| same_landing(list, target, *point))
        {
            return Some(JumpKind::Continue(block));
        }
        let (_, last) = list.block_range(block)?;
        let exit = landing_after(list, list.at(last)?)?;
        (list.skip_nops(target) == exit).then_some(JumpKind::Break(block))
    }

    fn rewrite(&self, list: &mut StatementList, id: StatementId, ctx: &PassContext<'_>) -> bool {
        let Some(target) = raw_jump_target(list, id) else {
            return false;
        };
        let mut enclosing: Vec<(usize, BlockIdentifier)> = list[id]
            .blocks
            .iter()
            .filter(|block| block.kind().is_breakable())
            .filter_map(|block| list.block_range(*block).map(|(start, _)| (start, *block)))
            .collect();
        enclosing.sort_by(|a, b| b.cmp(a));

        let Some(kind) = enclosing
            .into_iter()
            .find_map(|(_, block)| Self::classify(list, block, target))
        else {
            return false;
        };
        if let Some(jump) = list[id].statement.jump_kind_mut() {
            *jump = kind;
        }
        let what = match kind {
            JumpKind::Continue(block) => format!("continue {}", block.label()),
            JumpKind::Break(block) => format!("break {}", block.label()),
            _ => return true,
        };
        ctx.record(EventKind::BreakRewritten, self.name(), list, id)
            .message(what);
        true
    }
}

impl StructuringPass for RewriteBreaksPass {
    fn name(&self) -> &'static str {
        "rewrite-breaks"
    }

    fn description(&self) -> &'static str {
        "Rewrites jumps out of loops and switches as break and continue"
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let jumps: Vec<StatementId> = list.live().collect();
        let mut changed = false;
        for id in jumps {
            changed |= self.rewrite(list, id, ctx);
        }
        changed
    }
}

/// Recovers `for (init; condition; update)` from a while loop.
///
/// The statement falling into the loop must assign a local slot that the condition reads, and
/// the last statement of the body must assign the same slot and fall straight into the loop
/// end. Jumps to the update become `continue`.
pub struct RewriteForLoopsPass;

impl Default for RewriteForLoopsPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RewriteForLoopsPass {
    /// Creates a new for-loop rewrite pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn assigned_slot(list: &StatementList, id: StatementId) -> Option<u16> {
        match &list[id].statement {
            Statement::Assignment(assignment) => assignment.target.local().map(|v| v.slot),
            _ => None,
        }
    }

    fn loop_end(list: &StatementList, block: BlockIdentifier) -> Option<StatementId> {
        list.members(block).into_iter().rev().find(|id| {
            matches!(list[*id].statement, Statement::LoopEnd { block: owner, .. } if owner == block)
        })
    }

    fn rewrite(&self, list: &mut StatementList, header: StatementId, ctx: &PassContext<'_>) -> bool {
        let Statement::While {
            condition: Some(condition),
            block,
        } = &list[header].statement
        else {
            return false;
        };
        let block = *block;

        let Some(end) = Self::loop_end(list, block) else {
            return false;
        };
        let Some(update) = list.prev_non_nop(end) else {
            return false;
        };
        if update == header
            || list[update].blocks != list[end].blocks
            || straight_successor(list, update) != Some(end)
        {
            return false;
        }
        let Some(slot) = Self::assigned_slot(list, update) else {
            return false;
        };
        if condition.count_slot(slot) == 0 {
            return false;
        }

        let Some(init) = list.prev_non_nop(header) else {
            return false;
        };
        if Self::assigned_slot(list, init) != Some(slot)
            || list[init].blocks != list[header].blocks
            || list[init].targets.first().map(|t| list.skip_nops(*t)) != Some(header)
        {
            return false;
        }
        let init_index = list[init].index;
        let entered_elsewhere = list[header].sources.iter().any(|source| {
            let statement = &list[*source];
            *source != init
                && *source != end
                && !statement.blocks.contains(&block)
                && !(statement.statement.is_nop() && statement.index > init_index)
        });
        if entered_elsewhere {
            return false;
        }

        let (Statement::Assignment(init_assignment), Statement::Assignment(update_assignment)) =
            (list[init].statement.clone(), list[update].statement.clone())
        else {
            return false;
        };
        let Statement::While {
            condition: Some(condition),
            ..
        } = std::mem::replace(&mut list[header].statement, Statement::Nop)
        else {
            return false;
        };

        let continues: Vec<StatementId> = list[update]
            .sources
            .iter()
            .copied()
            .filter(|source| raw_jump_target(list, *source) == Some(update))
            .collect();
        for source in continues {
            if let Some(jump) = list[source].statement.jump_kind_mut() {
                *jump = JumpKind::Continue(block);
            }
        }
        list.remove(update);
        list.remove(init);

        list[header].statement = Statement::For {
            init: Some(init_assignment),
            condition,
            update: update_assignment,
            block,
        };
        ctx.record(EventKind::ForLoopCreated, self.name(), list, header)
            .message(format!("for loop {}", block.label()));
        true
    }
}

impl StructuringPass for RewriteForLoopsPass {
    fn name(&self) -> &'static str {
        "rewrite-for-loops"
    }

    fn description(&self) -> &'static str {
        "Rewrites counting while loops as for loops"
    }

    fn should_run(&self, config: &DecompilerConfig) -> bool {
        config.recognise_for_loops
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let headers: Vec<StatementId> = list
            .live()
            .filter(|id| matches!(list[*id].statement, Statement::While { .. }))
            .collect();
        let mut changed = false;
        for header in headers {
            changed |= self.rewrite(list, header, ctx);
        }
        changed
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

    fn counting_loop() -> crate::Result<InstructionAssembler> {
        let mut asm = InstructionAssembler::new();
        asm.iconst(0)?
            .istore(1)?
            .label("top")?
            .iload(1)?
            .iload(0)?
            .if_icmpge("end")?
            .getstatic(SYSTEM_OUT)?
            .iload(1)?
            .invokevirtual(PRINTLN_INT)?
            .iinc(1, 1)?
            .goto("top")?
            .label("end")?
            .vreturn()?;
        Ok(asm)
    }

    fn loop_block(list: &StatementList) -> BlockIdentifier {
        list.live()
            .find_map(|id| list[id].statement.opened_block())
            .unwrap()
    }

    #[test]
    fn test_top_test_loop_becomes_while() -> crate::Result<()> {
        let result = structured_until(
            counting_loop()?,
            "(I)V",
            true,
            "identify-loops",
            &DecompilerConfig::default(),
        )?;
        let list = &result.list;
        let lines = rendered(list);
        assert!(lines
            .iter()
            .any(|line| line.starts_with("while (v1_") && line.ends_with(" < v0_0)")));
        assert!(lines.contains(&"loop end".to_string()));
        assert!(!lines.iter().any(|line| line.ends_with("goto")));

        let block = loop_block(list);
        assert_eq!(block.kind(), BlockKind::Loop);
        let header = list.header_of(block).unwrap();
        assert!(!list[header].blocks.contains(&block));
        assert!(result.events.has(EventKind::LoopIdentified));
        assert!(edges_are_symmetric(list));
        Ok(())
    }

    #[test]
    fn test_counting_loop_becomes_for() -> crate::Result<()> {
        let result = structured_until(
            counting_loop()?,
            "(I)V",
            true,
            "rewrite-for-loops",
            &DecompilerConfig::default(),
        )?;
        let list = &result.list;
        let lines = rendered(list);
        let header = lines.iter().find(|line| line.starts_with("for (")).unwrap();
        assert!(header.starts_with("for (v1_"));
        assert!(header.contains(" = 0; v1_"));
        assert!(header.contains(" < v0_0; v1_"));
        assert!(header.ends_with(" + 1)"));
        assert!(!lines.iter().any(|line| line.ends_with(" = 0") || line.ends_with(" + 1")));
        assert!(result.events.has(EventKind::ForLoopCreated));
        assert!(edges_are_symmetric(list));

        let plain = structured_until(
            counting_loop()?,
            "(I)V",
            true,
            "rewrite-for-loops",
            &DecompilerConfig::minimal(),
        )?;
        assert!(!rendered(&plain.list).iter().any(|line| line.starts_with("for (")));
        Ok(())
    }

    #[test]
    fn test_conditional_back_jump_becomes_do_while() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.label("top")?
            .iinc(0, -1)?
            .iload(0)?
            .ifne("top")?
            .iload(0)?
            .ireturn()?;
        let result =
            structured_until(asm, "(I)I", true, "identify-loops", &DecompilerConfig::default())?;
        let list = &result.list;
        let lines = rendered(list);
        assert_eq!(lines[0], "do");
        assert!(lines
            .iter()
            .any(|line| line.starts_with("while (v0_") && line.ends_with(" != 0)")));

        let block = loop_block(list);
        assert_eq!(block.kind(), BlockKind::DoLoop);
        let end = list
            .live()
            .find(|id| matches!(list[*id].statement, Statement::LoopEnd { .. }))
            .unwrap();
        assert!(list[end].blocks.contains(&block));
        assert_eq!(list[end].targets[1], list.header_of(block).unwrap());
        assert!(edges_are_symmetric(list));
        Ok(())
    }

    fn goto_test_loop() -> crate::Result<InstructionAssembler> {
        let mut asm = InstructionAssembler::new();
        asm.iconst(0)?
            .istore(1)?
            .goto("test")?
            .label("body")?
            .iinc(1, 1)?
            .label("test")?
            .iload(1)?
            .iload(0)?
            .if_icmplt("body")?
            .iload(1)?
            .ireturn()?;
        Ok(asm)
    }

    #[test]
    fn test_goto_test_form_becomes_while() -> crate::Result<()> {
        let result = structured_until(
            goto_test_loop()?,
            "(I)I",
            true,
            "identify-loops",
            &DecompilerConfig::default(),
        )?;
        let list = &result.list;
        let lines = rendered(list);
        assert!(lines
            .iter()
            .any(|line| line.starts_with("while (v1_") && line.ends_with(" < v0_0)")));
        assert!(!lines.iter().any(|line| line.ends_with("goto")));
        assert!(edges_are_symmetric(list));

        let fors = structured_until(
            goto_test_loop()?,
            "(I)I",
            true,
            "rewrite-for-loops",
            &DecompilerConfig::default(),
        )?;
        assert!(rendered(&fors.list)
            .iter()
            .any(|line| line.starts_with("for (v1_")));
        Ok(())
    }

    #[test]
    fn test_loop_exit_through_try_end_jump() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.label("start")?
            .label("top")?
            .iload(0)?
            .ifeq("done")?
            .getstatic(SYSTEM_OUT)?
            .iload(0)?
            .invokevirtual(PRINTLN_INT)?
            .iinc(0, -1)?
            .goto("top")?
            .label("done")?
            .label("end")?
            .goto("after")?
            .label("handler")?
            .astore(1)?
            .vreturn()?
            .label("after")?
            .vreturn()?
            .exception_handler("start", "end", "handler", Some(EXCEPTION))?;
        let result =
            structured_until(asm, "(I)V", true, "identify-loops", &DecompilerConfig::default())?;
        let list = &result.list;
        let lines = rendered(list);
        assert!(lines
            .iter()
            .any(|line| line.starts_with("while (v0_") && line.ends_with(" != 0)")));
        assert!(!lines.iter().any(|line| line == "while (true)"));

        // the loop exits to the jump over the handler, not past it
        let header = list
            .live()
            .find(|id| matches!(list[*id].statement, Statement::While { .. }))
            .unwrap();
        let exit = list[header].targets[1];
        assert!(list[exit].statement.is_raw_goto());
        assert!(edges_are_symmetric(list));
        Ok(())
    }

    #[test]
    fn test_endless_loop_with_break() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.label("top")?
            .iinc(0, 1)?
            .iload(0)?
            .iconst(10)?
            .if_icmpge("out")?
            .getstatic(SYSTEM_OUT)?
            .iload(0)?
            .invokevirtual(PRINTLN_INT)?
            .goto("top")?
            .label("out")?
            .iload(0)?
            .ireturn()?;
        let result =
            structured_until(asm, "(I)I", true, "rewrite-breaks", &DecompilerConfig::default())?;
        let list = &result.list;
        let lines = rendered(list);
        let block = loop_block(list);
        assert_eq!(lines[0], "while (true)");
        let brk = format!("break {}", block.label());
        assert!(lines
            .iter()
            .any(|line| line.starts_with("if (v0_") && line.ends_with(&brk)));
        assert!(result.events.has(EventKind::BreakRewritten));
        assert!(edges_are_symmetric(list));
        Ok(())
    }

    #[test]
    fn test_jump_to_header_becomes_continue() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.label("top")?
            .iload(0)?
            .ifeq("end")?
            .iinc(0, -1)?
            .iload(0)?
            .iconst(5)?
            .if_icmpge("top")?
            .getstatic(SYSTEM_OUT)?
            .iload(0)?
            .invokevirtual(PRINTLN_INT)?
            .goto("top")?
            .label("end")?
            .iload(0)?
            .ireturn()?;
        let result =
            structured_until(asm, "(I)I", true, "rewrite-breaks", &DecompilerConfig::default())?;
        let list = &result.list;
        let lines = rendered(list);
        let block = loop_block(list);
        assert!(lines
            .iter()
            .any(|line| line.starts_with("while (v0_") && line.ends_with(" != 0)")));
        let cont = format!("continue {}", block.label());
        assert!(lines
            .iter()
            .any(|line| line.starts_with("if (v0_") && line.ends_with(&cont)));
        // one loop only
        assert_eq!(
            list.live()
                .filter(|id| list[*id].statement.opened_block().is_some())
                .count(),
            1
        );
        Ok(())
    }
}
