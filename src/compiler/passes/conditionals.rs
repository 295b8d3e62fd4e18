//! Short-circuit conditions and if/else blocks.

use crate::{
    analysis::BlockKind,
    compiler::{
        pass::PassContext,
        passes::{raw_jump_target, same_landing, straight_successor, take_condition},
        EventKind, StructuringPass,
    },
    config::DecompilerConfig,
    ir::{BooleanOp, Expression, JumpKind, Statement, StatementId, StatementList},
};

fn is_raw_if(list: &StatementList, id: StatementId) -> bool {
    matches!(
        list[id].statement,
        Statement::If {
            jump: JumpKind::Goto,
            ..
        }
    )
}

/// Merges chains of conditional jumps into `&&` and `||` conditions.
///
/// ```text
/// if (a) goto X          if (a) goto Y
/// if (b) goto X          if (b) goto X
///                        Y:
/// ```
///
/// become `if (a || b) goto X` and `if (!a && b) goto X`. The second test must be reachable only
/// from the first.
pub struct CondenseConditionalsPass;

impl Default for CondenseConditionalsPass {
    fn default() -> Self {
        Self::new()
    }
}

impl CondenseConditionalsPass {
    /// Creates a new conditional condensing pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn combine(&self, list: &mut StatementList, first: StatementId, ctx: &PassContext<'_>) -> bool {
        if !is_raw_if(list, first) {
            return false;
        }
        let Some(second) = straight_successor(list, first) else {
            return false;
        };
        if !is_raw_if(list, second) {
            return false;
        }
        let taken = list[first].targets[1];
        let (next, far) = (list[second].targets[0], list[second].targets[1]);
        if taken == second {
            return false;
        }

        let op = if same_landing(list, taken, far) {
            BooleanOp::Or
        } else if same_landing(list, taken, next) {
            BooleanOp::And
        } else {
            return false;
        };

        let (Some(lhs), Some(rhs)) = (
            take_condition(&mut list[first].statement),
            take_condition(&mut list[second].statement),
        ) else {
            return false;
        };
        let lhs = match op {
            BooleanOp::Or => lhs,
            BooleanOp::And => lhs.negate(),
        };
        list[first].statement = Statement::If {
            condition: Expression::Boolean {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            jump: JumpKind::Goto,
        };
        list.set_targets(first, vec![next, far]);
        list.remove(second);

        ctx.record(EventKind::ConditionalCondensed, self.name(), list, first)
            .message(format!("conditions merged with {op}"));
        true
    }
}

impl StructuringPass for CondenseConditionalsPass {
    fn name(&self) -> &'static str {
        "condense-conditionals"
    }

    fn description(&self) -> &'static str {
        "Merges chained conditional jumps into short-circuit conditions"
    }

    fn should_run(&self, config: &DecompilerConfig) -> bool {
        config.recognise_conditionals
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let mut any = false;
        loop {
            let mut changed = false;
            let candidates: Vec<StatementId> = list.live().collect();
            for id in candidates {
                if !list[id].removed && self.combine(list, id, ctx) {
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            any = true;
        }
        any
    }
}

/// Folds negations, comparisons against `Xcmp` results and boolean literals in conditions.
pub struct SimplifyConditionalsPass;

impl Default for SimplifyConditionalsPass {
    fn default() -> Self {
        Self::new()
    }
}

impl SimplifyConditionalsPass {
    /// Creates a new condition simplification pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StructuringPass for SimplifyConditionalsPass {
    fn name(&self) -> &'static str {
        "simplify-conditionals"
    }

    fn description(&self) -> &'static str {
        "Simplifies branch conditions"
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let mut changed = false;
        let candidates: Vec<StatementId> = list.live().collect();
        for id in candidates {
            let Statement::If { condition, .. } = &mut list[id].statement else {
                continue;
            };
            let original = std::mem::replace(condition, Expression::boolean(true));
            let (simplified, simpler) = original.simplify();
            *condition = simplified;
            if simpler {
                ctx.record(EventKind::ConditionalSimplified, self.name(), list, id)
                    .message(format!("condition at {} simplified", list[id].index));
                changed = true;
            }
        }
        changed
    }
}

/// Builds `if` and `if/else` blocks from forward conditional jumps.
///
/// `if (c) goto X; body; X:` becomes `if (!c) { body }` when the body is entered only through
/// the test and no raw jump leaves it. If the body ends in a raw `goto Y` past `X` and the range
/// `X..Y` is equally well formed, it becomes the else block. Tests are examined innermost first.
pub struct IdentifyConditionalsPass;

impl Default for IdentifyConditionalsPass {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentifyConditionalsPass {
    /// Creates a new conditional identification pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns `true` if positions `start..=end` form a well nested, single-entry region whose
    /// raw jumps stay inside it, `skip` excepted.
    fn is_region(list: &StatementList, start: usize, end: usize, skip: Option<StatementId>) -> bool {
        if start > end || !list.is_single_entry(start, end) || !list.range_respects_nesting(start, end) {
            return false;
        }
        list.range(start, end)
            .filter(|id| Some(*id) != skip)
            .all(|id| match raw_jump_target(list, id) {
                Some(target) => {
                    let index = list[target].index;
                    index >= start && index <= end
                }
                None => true,
            })
    }

    fn identify(&self, list: &mut StatementList, test: StatementId, ctx: &PassContext<'_>) -> bool {
        if !is_raw_if(list, test) {
            return false;
        }
        let (first, skip) = (list[test].targets[0], list[test].targets[1]);
        if list.next(test) != Some(first)
            || list[skip].index <= list[first].index
            || list[first].sources.len() != 1
            || list[first].blocks != list[test].blocks
        {
            return false;
        }
        let (start, end) = (list[first].index, list[skip].index - 1);

        let last = list.range(start, end).last();
        let else_end = last.and_then(|last| {
            let target = raw_jump_target(list, last)?;
            let beyond = list[target].index;
            (list[last].statement.is_raw_goto()
                && beyond > list[skip].index
                && list[skip].sources.len() == 1
                && list[skip].sources.contains(&test)
                && list[skip].blocks == list[test].blocks
                && Self::is_region(list, start, end, Some(last))
                && Self::is_region(list, list[skip].index, beyond - 1, None))
            .then(|| (last, beyond - 1))
        });

        if else_end.is_none() && !Self::is_region(list, start, end, None) {
            return false;
        }

        let then_block = list.blocks_mut().mint(BlockKind::Conditional);
        let else_block = else_end.map(|_| list.blocks_mut().mint(BlockKind::Else));
        let Some(condition) = take_condition(&mut list[test].statement) else {
            return false;
        };
        let (condition, _) = condition.negate().simplify();
        list[test].statement = Statement::IfBlock {
            condition,
            block: then_block,
            else_block,
        };

        let then_members: Vec<StatementId> = list.range(start, end).collect();
        for id in then_members {
            list[id].blocks.insert(then_block);
        }
        if let (Some((last, else_last)), Some(else_block)) = (else_end, else_block) {
            list[last].statement = Statement::Goto(JumpKind::EndBlock(then_block));
            let else_members: Vec<StatementId> =
                list.range(list[skip].index, else_last).collect();
            for id in else_members {
                list[id].blocks.insert(else_block);
            }
        }

        ctx.record(EventKind::ConditionalIdentified, self.name(), list, test)
            .message(if else_block.is_some() {
                "if/else block identified"
            } else {
                "if block identified"
            });
        true
    }
}

impl StructuringPass for IdentifyConditionalsPass {
    fn name(&self) -> &'static str {
        "identify-conditionals"
    }

    fn description(&self) -> &'static str {
        "Builds if and if/else blocks from forward conditional jumps"
    }

    fn should_run(&self, config: &DecompilerConfig) -> bool {
        config.recognise_conditionals
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let candidates: Vec<StatementId> = list.live().collect();
        let mut changed = false;
        for test in candidates.into_iter().rev() {
            changed |= self.identify(list, test, ctx);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::InstructionAssembler,
        test::{rendered, structured_until, PRINTLN_INT, SYSTEM_OUT},
        utils::graph::edges_are_symmetric,
    };

    #[test]
    fn test_or_chain_is_condensed() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.iload(0)?
            .ifeq("yes")?
            .iload(1)?
            .ifeq("yes")?
            .iconst(0)?
            .ireturn()?
            .label("yes")?
            .iconst(1)?
            .ireturn()?;
        let result = structured_until(
            asm,
            "(II)I",
            true,
            "condense-conditionals",
            &DecompilerConfig::default(),
        )?;
        let lines = rendered(&result.list);
        assert!(lines.contains(&"if (v0_0 == 0 || v1_0 == 0) goto".to_string()));
        assert!(result.events.has(EventKind::ConditionalCondensed));
        assert!(edges_are_symmetric(&result.list));
        Ok(())
    }

    #[test]
    fn test_and_chain_is_condensed() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.iload(0)?
            .ifeq("no")?
            .iload(1)?
            .ifeq("no")?
            .iconst(1)?
            .ireturn()?
            .label("no")?
            .iconst(0)?
            .ireturn()?;
        let result = structured_until(
            asm,
            "(II)I",
            true,
            "condense-conditionals",
            &DecompilerConfig::default(),
        )?;
        let lines = rendered(&result.list);
        assert!(lines.contains(&"if (v0_0 == 0 || v1_0 == 0) goto".to_string()));

        // javac's `a || b` jumps over the second test into the body
        let mut asm = InstructionAssembler::new();
        asm.iload(0)?
            .ifne("body")?
            .iload(1)?
            .ifeq("other")?
            .label("body")?
            .iconst(1)?
            .ireturn()?
            .label("other")?
            .iconst(0)?
            .ireturn()?;
        let result = structured_until(
            asm,
            "(II)I",
            true,
            "condense-conditionals",
            &DecompilerConfig::default(),
        )?;
        let lines = rendered(&result.list);
        assert!(lines.contains(&"if (v0_0 == 0 && v1_0 == 0) goto".to_string()));
        Ok(())
    }

    #[test]
    fn test_not_folded_by_simplify() -> crate::Result<()> {
        let config = DecompilerConfig::default();
        let events = crate::compiler::EventLog::new();
        let mut comments = crate::compiler::DecompilerComments::new();
        let mut ctx = PassContext::new("simplify", &config, &events, &mut comments);

        let mut asm = InstructionAssembler::new();
        asm.iload(0)?.ifeq("zero")?.iconst(1)?.ireturn()?.label("zero")?.iconst(0)?.ireturn()?;
        let mut list = crate::test::versioned_statements(asm, "(I)I", true)?;
        let test = list
            .live()
            .find(|id| matches!(list[*id].statement, Statement::If { .. }))
            .unwrap();
        if let Statement::If { condition, .. } = &mut list[test].statement {
            let inner = std::mem::replace(condition, Expression::boolean(true));
            *condition = Expression::Not(Box::new(inner));
        }

        let pass = SimplifyConditionalsPass::new();
        assert!(pass.run(&mut list, &mut ctx));
        assert_eq!(
            list[test].statement.display(&crate::ir::RawNames).to_string(),
            "if (s0 != 0) goto"
        );
        assert!(!pass.run(&mut list, &mut ctx));
        Ok(())
    }

    #[test]
    fn test_if_block_is_identified() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.iload(0)?
            .ifeq("skip")?
            .getstatic(SYSTEM_OUT)?
            .iload(0)?
            .invokevirtual(PRINTLN_INT)?
            .label("skip")?
            .iconst(0)?
            .ireturn()?;
        let result = structured_until(
            asm,
            "(I)I",
            true,
            "identify-conditionals",
            &DecompilerConfig::default(),
        )?;
        let list = &result.list;
        let (header, block) = list
            .live()
            .find_map(|id| match list[id].statement {
                Statement::IfBlock {
                    block,
                    else_block: None,
                    ..
                } => Some((id, block)),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            list[header].statement.display(&crate::ir::RawNames).to_string(),
            "if (v0_0 != 0)"
        );
        let members = list.members(block);
        assert_eq!(members.len(), 1);
        assert!(list[members[0]]
            .statement
            .display(&crate::ir::RawNames)
            .to_string()
            .contains("println(v0_0)"));
        assert!(result.events.has(EventKind::ConditionalIdentified));
        Ok(())
    }

    #[test]
    fn test_if_else_is_identified() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.iload(0)?
            .ifeq("other")?
            .iconst(1)?
            .istore(1)?
            .goto("end")?
            .label("other")?
            .iconst(2)?
            .istore(1)?
            .label("end")?
            .iload(1)?
            .ireturn()?;
        let result = structured_until(
            asm,
            "(I)I",
            true,
            "identify-conditionals",
            &DecompilerConfig::default(),
        )?;
        let list = &result.list;
        let (then_block, else_block) = list
            .live()
            .find_map(|id| match list[id].statement {
                Statement::IfBlock {
                    block,
                    else_block: Some(else_block),
                    ..
                } => Some((block, else_block)),
                _ => None,
            })
            .unwrap();
        assert!(list
            .live()
            .any(|id| list[id].statement == Statement::Goto(JumpKind::EndBlock(then_block))));
        assert_eq!(
            rendered(list)
                .iter()
                .filter(|line| line.starts_with("v1_"))
                .count(),
            2
        );
        let else_members = list.members(else_block);
        assert_eq!(else_members.len(), 1);
        assert!(!list.live().any(|id| list[id].statement.is_raw_goto()));
        Ok(())
    }
}
