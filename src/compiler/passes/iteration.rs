//! For-each recognition.

use crate::{
    analysis::BlockIdentifier,
    assembly::{BinaryOp, CompareOp},
    compiler::{pass::PassContext, EventKind, StructuringPass},
    config::DecompilerConfig,
    ir::{Assignment, Expression, LValue, Literal, Statement, StatementId, StatementList},
};

/// Rewrites javac's expansions of the enhanced for statement into `ForEach` headers.
///
/// Two shapes are recognised:
///
/// - arrays: `a = e; n = a.length; for (i = 0; i < n; i = i + 1) { x = a[i]; ... }`
/// - iterables: `it = e.iterator(); while (it.hasNext()) { x = (T) it.next(); ... }`
///
/// The temporaries must not be read anywhere else in the body.
pub struct RecogniseIterationPass;

impl Default for RecogniseIterationPass {
    fn default() -> Self {
        Self::new()
    }
}

/// The pieces of a recognised loop.
struct ForEachShape {
    variable: LValue,
    iterable: Expression,
    block: BlockIdentifier,
    /// Statements folded into the header.
    folded: Vec<StatementId>,
    kind: &'static str,
}

fn local_slot(expression: &Expression) -> Option<u16> {
    match expression {
        Expression::Local(variable) => Some(variable.slot),
        _ => None,
    }
}

fn assignment(list: &StatementList, id: StatementId) -> Option<&Assignment> {
    match &list[id].statement {
        Statement::Assignment(assignment) => Some(assignment),
        _ => None,
    }
}

fn assigned_slot(assignment: &Assignment) -> Option<u16> {
    assignment.target.local().map(|variable| variable.slot)
}

/// `receiver.name()` with no arguments.
fn nullary_call<'e>(expression: &'e Expression, method: &str) -> Option<&'e Expression> {
    match expression {
        Expression::Invoke {
            receiver: Some(receiver),
            name,
            args,
            ..
        } if name == method && args.is_empty() => Some(receiver),
        _ => None,
    }
}

impl RecogniseIterationPass {
    /// Creates a new iteration recognition pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns `true` if a member of `block` other than `skip` reads `slot`.
    fn body_reads(list: &StatementList, block: BlockIdentifier, skip: StatementId, slot: u16) -> bool {
        list.members(block).into_iter().filter(|id| *id != skip).any(|id| {
            let mut reads = 0;
            list[id]
                .statement
                .for_each_expression(&mut |e| reads += e.count_slot(slot));
            reads > 0
        })
    }

    /// First body statement of the loop opened at `header`.
    fn first_in_body(list: &StatementList, header: StatementId, block: BlockIdentifier) -> Option<StatementId> {
        let first = list.next_non_nop(header)?;
        list[first].blocks.contains(&block).then_some(first)
    }

    fn array_loop(list: &StatementList, header: StatementId) -> Option<ForEachShape> {
        let Statement::For {
            init: Some(init),
            condition,
            update,
            block,
        } = &list[header].statement
        else {
            return None;
        };
        let block = *block;
        let index = assigned_slot(init)?;
        if init.value != Expression::int(0) {
            return None;
        }
        let Expression::Compare {
            op: CompareOp::Lt,
            lhs,
            rhs,
        } = condition
        else {
            return None;
        };
        if local_slot(lhs)? != index {
            return None;
        }
        let length = local_slot(rhs)?;
        let increments = assigned_slot(update) == Some(index)
            && matches!(&update.value, Expression::Arithmetic { op: BinaryOp::Add, lhs, rhs }
                if local_slot(lhs) == Some(index) && **rhs == Expression::int(1));
        if !increments {
            return None;
        }

        let length_def = list.prev_non_nop(header)?;
        let length_assignment = assignment(list, length_def)?;
        if assigned_slot(length_assignment)? != length {
            return None;
        }
        let Expression::ArrayLength(array) = &length_assignment.value else {
            return None;
        };
        let array_slot = local_slot(array)?;
        let array_def = list.prev_non_nop(length_def)?;
        let array_assignment = assignment(list, array_def)?;
        if assigned_slot(array_assignment)? != array_slot
            || list[length_def].blocks != list[header].blocks
            || list[array_def].blocks != list[header].blocks
        {
            return None;
        }

        let first = Self::first_in_body(list, header, block)?;
        let element = assignment(list, first)?;
        element.target.local()?;
        let Expression::ArrayIndex {
            array: indexed,
            index: position,
        } = &element.value
        else {
            return None;
        };
        if local_slot(indexed) != Some(array_slot) || local_slot(position) != Some(index) {
            return None;
        }
        if [index, length, array_slot]
            .into_iter()
            .any(|slot| Self::body_reads(list, block, first, slot))
        {
            return None;
        }

        Some(ForEachShape {
            variable: element.target.clone(),
            iterable: array_assignment.value.clone(),
            block,
            folded: vec![first, length_def, array_def],
            kind: "array",
        })
    }

    /// Slot of `it` in `it.hasNext()`, also accepting `it.hasNext() != 0`.
    fn has_next_slot(condition: &Expression) -> Option<u16> {
        match condition {
            Expression::Compare {
                op: CompareOp::Ne,
                lhs,
                rhs,
            } if matches!(
                **rhs,
                Expression::Literal(Literal::Int(0) | Literal::Boolean(false))
            ) =>
            {
                Self::has_next_slot(lhs)
            }
            other => nullary_call(other, "hasNext").and_then(local_slot),
        }
    }

    fn iterator_loop(list: &StatementList, header: StatementId) -> Option<ForEachShape> {
        let Statement::While {
            condition: Some(condition),
            block,
        } = &list[header].statement
        else {
            return None;
        };
        let block = *block;
        let iterator = Self::has_next_slot(condition)?;

        let iterator_def = list.prev_non_nop(header)?;
        let iterator_assignment = assignment(list, iterator_def)?;
        if assigned_slot(iterator_assignment)? != iterator
            || list[iterator_def].blocks != list[header].blocks
        {
            return None;
        }
        let iterable = nullary_call(&iterator_assignment.value, "iterator")?;

        let first = Self::first_in_body(list, header, block)?;
        let element = assignment(list, first)?;
        element.target.local()?;
        let next = match &element.value {
            Expression::Cast { value, .. } => value.as_ref(),
            other => other,
        };
        if nullary_call(next, "next").and_then(local_slot) != Some(iterator)
            || Self::body_reads(list, block, first, iterator)
        {
            return None;
        }

        Some(ForEachShape {
            variable: element.target.clone(),
            iterable: iterable.clone(),
            block,
            folded: vec![first, iterator_def],
            kind: "iterator",
        })
    }

    fn rewrite(&self, list: &mut StatementList, header: StatementId, ctx: &PassContext<'_>) -> bool {
        let Some(shape) = Self::array_loop(list, header).or_else(|| Self::iterator_loop(list, header))
        else {
            return false;
        };
        list[header].statement = Statement::ForEach {
            variable: shape.variable,
            iterable: shape.iterable,
            block: shape.block,
        };
        for id in shape.folded {
            list.remove(id);
        }
        ctx.record(EventKind::IterationRecognised, self.name(), list, header)
            .message(format!("{} iteration {}", shape.kind, shape.block.label()));
        true
    }
}

impl StructuringPass for RecogniseIterationPass {
    fn name(&self) -> &'static str {
        "recognise-iteration"
    }

    fn description(&self) -> &'static str {
        "Recognises array and iterator for-each loops"
    }

    fn should_run(&self, config: &DecompilerConfig) -> bool {
        config.recognise_for_each
    }

    fn run(&self, list: &mut StatementList, ctx: &mut PassContext<'_>) -> bool {
        let headers: Vec<StatementId> = list
            .live()
            .filter(|id| {
                matches!(
                    list[*id].statement,
                    Statement::For { .. } | Statement::While { .. }
                )
            })
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
        assembly::{opcodes, InstructionAssembler},
        test::{
            rendered, structured_until, HAS_NEXT, LIST_ITERATOR, NEXT, PRINTLN_INT,
            PRINTLN_STRING, STRING, SYSTEM_OUT,
        },
        utils::graph::edges_are_symmetric,
    };

    fn array_loop() -> crate::Result<InstructionAssembler> {
        let mut asm = InstructionAssembler::new();
        asm.aload(0)?
            .astore(1)?
            .aload(1)?
            .arraylength()?
            .istore(2)?
            .iconst(0)?
            .istore(3)?
            .label("top")?
            .iload(3)?
            .iload(2)?
            .if_icmpge("end")?
            .aload(1)?
            .iload(3)?
            .iaload()?
            .istore(4)?
            .getstatic(SYSTEM_OUT)?
            .iload(4)?
            .invokevirtual(PRINTLN_INT)?
            .iinc(3, 1)?
            .goto("top")?
            .label("end")?
            .vreturn()?;
        Ok(asm)
    }

    #[test]
    fn test_array_loop_becomes_for_each() -> crate::Result<()> {
        let result = structured_until(
            array_loop()?,
            "([I)V",
            true,
            "recognise-iteration",
            &DecompilerConfig::default(),
        )?;
        let list = &result.list;
        let lines = rendered(list);
        assert!(lines
            .iter()
            .any(|line| line.starts_with("for (v4_") && line.ends_with(" : v0_0)")));
        assert!(!lines.iter().any(|line| line.contains(".length")));
        assert!(!lines.iter().any(|line| line.contains('[')));
        assert!(lines
            .iter()
            .any(|line| line.starts_with("java.lang.System.out.println(v4_")));
        assert!(result.events.has(EventKind::IterationRecognised));
        assert!(edges_are_symmetric(list));
        Ok(())
    }

    #[test]
    fn test_iterator_loop_becomes_for_each() -> crate::Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.aload(0)?
            .invokeinterface(LIST_ITERATOR, 1)?
            .astore(1)?
            .label("top")?
            .aload(1)?
            .invokeinterface(HAS_NEXT, 1)?
            .ifeq("end")?
            .aload(1)?
            .invokeinterface(NEXT, 1)?
            .emit_u16(opcodes::CHECKCAST, STRING)?
            .astore(2)?
            .getstatic(SYSTEM_OUT)?
            .aload(2)?
            .invokevirtual(PRINTLN_STRING)?
            .goto("top")?
            .label("end")?
            .vreturn()?;
        let result = structured_until(
            asm,
            "(Ljava/util/List;)V",
            true,
            "recognise-iteration",
            &DecompilerConfig::default(),
        )?;
        let list = &result.list;
        let lines = rendered(list);
        assert!(lines
            .iter()
            .any(|line| line.starts_with("for (v2_") && line.ends_with(" : v0_0)")));
        assert!(!lines
            .iter()
            .any(|line| line.contains("iterator()") || line.contains("hasNext()")));
        assert!(edges_are_symmetric(list));
        Ok(())
    }

    #[test]
    fn test_disabled_keeps_counting_loop() -> crate::Result<()> {
        let mut config = DecompilerConfig::default();
        config.recognise_for_each = false;
        let result = structured_until(array_loop()?, "([I)V", true, "recognise-iteration", &config)?;
        let lines = rendered(&result.list);
        assert!(lines.iter().any(|line| line.starts_with("for (v3_")));
        assert!(lines.iter().any(|line| line.contains(".length")));
        Ok(())
    }
}
