//! Statements of the lowered IR.

use std::fmt;

use crate::{
    analysis::{blocks::BlockIdentifier, graph::CatchType},
    ir::{
        expression::{Expression, LValue, Variable},
        variables::VariableNames,
    },
};

/// How a jump is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JumpKind {
    /// A raw jump with no structural meaning yet.
    Goto,
    /// Leaves the given block.
    Break(BlockIdentifier),
    /// Continues the given loop.
    Continue(BlockIdentifier),
    /// Falls out of the end of the given block; not rendered.
    EndBlock(BlockIdentifier),
}

impl JumpKind {
    /// Returns `true` for raw jumps.
    #[must_use]
    pub fn is_raw(&self) -> bool {
        matches!(self, JumpKind::Goto)
    }
}

/// `target = value`
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Assigned location.
    pub target: LValue,
    /// Assigned value.
    pub value: Expression,
}

impl Assignment {
    /// Creates an assignment.
    #[must_use]
    pub fn new(target: LValue, value: Expression) -> Self {
        Assignment { target, value }
    }
}

/// Merge of several versions of one slot at a control-flow join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinMarker {
    /// The local slot.
    pub slot: u16,
    /// The merged version.
    pub result: Variable,
    /// Incoming versions, sorted and unique.
    pub incoming: Vec<Variable>,
}

/// The kind of a simple statement.
///
/// Jump targets are not stored here: they are the ordered `targets` of the owning
/// [`crate::ir::SimpleStatement`]. `If` targets are `[fallthrough, taken]`; raw switches target
/// `[default, cases...]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// No operation.
    Nop,
    /// `target = value`
    Assignment(Assignment),
    /// An expression evaluated for its effect.
    Expression(Expression),
    /// Test-and-branch.
    If {
        /// Jump taken when true.
        condition: Expression,
        /// Interpretation of the taken jump.
        jump: JumpKind,
    },
    /// Unconditional jump.
    Goto(JumpKind),
    /// `return` with optional value.
    Return(Option<Expression>),
    /// `throw value`
    Throw(Expression),
    /// `monitorenter`
    MonitorEnter(Expression),
    /// `monitorexit`
    MonitorExit(Expression),
    /// Table or lookup switch before structuring. `keys[i]` selects target `i + 1`.
    RawSwitch {
        /// Switch selector.
        value: Expression,
        /// Case keys, parallel to the non-default targets.
        keys: Vec<i32>,
    },
    /// Structured switch header.
    Switch {
        /// Switch selector.
        value: Expression,
        /// Switch body identifier.
        block: BlockIdentifier,
    },
    /// One case label group of a switch.
    Case {
        /// Case keys; empty for the default-only case.
        values: Vec<i32>,
        /// Whether this case is also the default.
        is_default: bool,
        /// Owning switch.
        switch: BlockIdentifier,
        /// Case body identifier.
        block: BlockIdentifier,
    },
    /// Start of a try block.
    Try {
        /// Protected range identifier.
        block: BlockIdentifier,
    },
    /// Start of a catch handler.
    Catch {
        /// The try block this handler belongs to.
        try_block: BlockIdentifier,
        /// Handler body identifier.
        block: BlockIdentifier,
        /// Caught types.
        catch_types: Vec<CatchType>,
        /// Where the caught exception is stored.
        target: LValue,
    },
    /// `while (condition)`; `None` is `while (true)`.
    While {
        /// Loop condition.
        condition: Option<Expression>,
        /// Loop body identifier.
        block: BlockIdentifier,
    },
    /// `do {`
    Do {
        /// Loop body identifier.
        block: BlockIdentifier,
    },
    /// Loop end. For do loops this carries `while (condition)`.
    LoopEnd {
        /// Continue condition; `None` loops unconditionally.
        condition: Option<Expression>,
        /// The loop.
        block: BlockIdentifier,
    },
    /// `for (init; condition; update)`
    For {
        /// Initialiser, moved from before the loop.
        init: Option<Assignment>,
        /// Loop condition.
        condition: Expression,
        /// Update, moved from the end of the body.
        update: Assignment,
        /// Loop body identifier.
        block: BlockIdentifier,
    },
    /// `for (variable : iterable)`
    ForEach {
        /// Loop variable.
        variable: LValue,
        /// Iterated array or `Iterable`.
        iterable: Expression,
        /// Loop body identifier.
        block: BlockIdentifier,
    },
    /// `if (condition) {` with optional else block.
    IfBlock {
        /// Branch condition.
        condition: Expression,
        /// Then-block identifier.
        block: BlockIdentifier,
        /// Else-block identifier.
        else_block: Option<BlockIdentifier>,
    },
    /// `synchronized (monitor) {`
    Synchronized {
        /// Lock expression.
        monitor: Expression,
        /// Body identifier.
        block: BlockIdentifier,
    },
}

impl Statement {
    /// The block this header statement opens.
    #[must_use]
    pub fn opened_block(&self) -> Option<BlockIdentifier> {
        match self {
            Statement::Switch { block, .. }
            | Statement::Case { block, .. }
            | Statement::Try { block }
            | Statement::Catch { block, .. }
            | Statement::While { block, .. }
            | Statement::Do { block }
            | Statement::For { block, .. }
            | Statement::ForEach { block, .. }
            | Statement::IfBlock { block, .. }
            | Statement::Synchronized { block, .. } => Some(*block),
            _ => None,
        }
    }

    /// Returns `true` for structured header statements.
    #[must_use]
    pub fn is_header(&self) -> bool {
        self.opened_block().is_some()
    }

    /// Returns `true` for no-ops.
    #[must_use]
    pub fn is_nop(&self) -> bool {
        matches!(self, Statement::Nop)
    }

    /// Interpretation of the jump, for `If` and `Goto`.
    #[must_use]
    pub fn jump_kind(&self) -> Option<JumpKind> {
        match self {
            Statement::If { jump, .. } | Statement::Goto(jump) => Some(*jump),
            _ => None,
        }
    }

    /// Mutable access to the jump interpretation.
    pub fn jump_kind_mut(&mut self) -> Option<&mut JumpKind> {
        match self {
            Statement::If { jump, .. } | Statement::Goto(jump) => Some(jump),
            _ => None,
        }
    }

    /// Returns `true` for a raw `goto`.
    #[must_use]
    pub fn is_raw_goto(&self) -> bool {
        matches!(self, Statement::Goto(JumpKind::Goto))
    }

    /// Returns `true` if control can continue with the positionally next statement.
    #[must_use]
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            Statement::Goto(_)
                | Statement::Return(_)
                | Statement::Throw(_)
                | Statement::RawSwitch { .. }
                | Statement::LoopEnd {
                    condition: None,
                    ..
                }
        )
    }

    /// The assigned location, for statements that define one.
    #[must_use]
    pub fn lvalue(&self) -> Option<&LValue> {
        match self {
            Statement::Assignment(assignment) => Some(&assignment.target),
            Statement::Catch { target, .. } | Statement::ForEach { variable: target, .. } => {
                Some(target)
            }
            _ => None,
        }
    }

    /// Mutable access to the assigned location.
    pub fn lvalue_mut(&mut self) -> Option<&mut LValue> {
        match self {
            Statement::Assignment(assignment) => Some(&mut assignment.target),
            Statement::Catch { target, .. } | Statement::ForEach { variable: target, .. } => {
                Some(target)
            }
            _ => None,
        }
    }

    /// The local variable this statement defines at top level.
    #[must_use]
    pub fn defined_local(&self) -> Option<Variable> {
        self.lvalue().and_then(LValue::local)
    }

    /// Calls `f` on every expression the statement evaluates, including reads inside the
    /// assigned location.
    pub fn for_each_expression(&self, f: &mut dyn FnMut(&Expression)) {
        match self {
            Statement::Nop
            | Statement::Goto(_)
            | Statement::Try { .. }
            | Statement::Do { .. }
            | Statement::Case { .. } => {}
            Statement::Catch { target, .. } => target.for_each_read(f),
            Statement::Assignment(assignment) => {
                assignment.target.for_each_read(f);
                f(&assignment.value);
            }
            Statement::Expression(e)
            | Statement::Throw(e)
            | Statement::MonitorEnter(e)
            | Statement::MonitorExit(e)
            | Statement::If { condition: e, .. }
            | Statement::RawSwitch { value: e, .. }
            | Statement::Switch { value: e, .. }
            | Statement::IfBlock { condition: e, .. }
            | Statement::Synchronized { monitor: e, .. } => f(e),
            Statement::Return(value) | Statement::While { condition: value, .. } => {
                if let Some(e) = value {
                    f(e);
                }
            }
            Statement::LoopEnd { condition, .. } => {
                if let Some(e) = condition {
                    f(e);
                }
            }
            Statement::For {
                init,
                condition,
                update,
                ..
            } => {
                if let Some(init) = init {
                    init.target.for_each_read(f);
                    f(&init.value);
                }
                f(condition);
                update.target.for_each_read(f);
                f(&update.value);
            }
            Statement::ForEach {
                variable, iterable, ..
            } => {
                variable.for_each_read(f);
                f(iterable);
            }
        }
    }

    /// Mutable variant of [`Statement::for_each_expression`].
    pub fn for_each_expression_mut(&mut self, f: &mut dyn FnMut(&mut Expression)) {
        match self {
            Statement::Nop
            | Statement::Goto(_)
            | Statement::Try { .. }
            | Statement::Do { .. }
            | Statement::Case { .. } => {}
            Statement::Catch { target, .. } => target.for_each_read_mut(f),
            Statement::Assignment(assignment) => {
                assignment.target.for_each_read_mut(f);
                f(&mut assignment.value);
            }
            Statement::Expression(e)
            | Statement::Throw(e)
            | Statement::MonitorEnter(e)
            | Statement::MonitorExit(e)
            | Statement::If { condition: e, .. }
            | Statement::RawSwitch { value: e, .. }
            | Statement::Switch { value: e, .. }
            | Statement::IfBlock { condition: e, .. }
            | Statement::Synchronized { monitor: e, .. } => f(e),
            Statement::Return(value) | Statement::While { condition: value, .. } => {
                if let Some(e) = value {
                    f(e);
                }
            }
            Statement::LoopEnd { condition, .. } => {
                if let Some(e) = condition {
                    f(e);
                }
            }
            Statement::For {
                init,
                condition,
                update,
                ..
            } => {
                if let Some(init) = init {
                    init.target.for_each_read_mut(f);
                    f(&mut init.value);
                }
                f(condition);
                update.target.for_each_read_mut(f);
                f(&mut update.value);
            }
            Statement::ForEach {
                variable, iterable, ..
            } => {
                variable.for_each_read_mut(f);
                f(iterable);
            }
        }
    }

    /// Local variables read by this statement.
    #[must_use]
    pub fn local_reads(&self) -> Vec<Variable> {
        let mut reads = Vec::new();
        self.for_each_expression(&mut |e| reads.extend(e.local_reads()));
        reads
    }

    /// Formats this statement with `names`.
    #[must_use]
    pub fn display<'a>(&'a self, names: &'a dyn VariableNames) -> StatementDisplay<'a> {
        StatementDisplay {
            statement: self,
            names,
        }
    }
}

/// [`fmt::Display`] adapter for a [`Statement`].
pub struct StatementDisplay<'a> {
    statement: &'a Statement,
    names: &'a dyn VariableNames,
}

fn write_jump(f: &mut fmt::Formatter<'_>, jump: &JumpKind) -> fmt::Result {
    match jump {
        JumpKind::Goto => f.write_str("goto"),
        JumpKind::Break(block) => write!(f, "break {}", block.label()),
        JumpKind::Continue(block) => write!(f, "continue {}", block.label()),
        JumpKind::EndBlock(block) => write!(f, "end {}", block.label()),
    }
}

impl fmt::Display for StatementDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.names;
        match self.statement {
            Statement::Nop => f.write_str("nop"),
            Statement::Assignment(assignment) => write!(
                f,
                "{} = {}",
                assignment.target.display(names),
                assignment.value.display(names)
            ),
            Statement::Expression(e) => write!(f, "{}", e.display(names)),
            Statement::If { condition, jump } => {
                write!(f, "if ({}) ", condition.display(names))?;
                write_jump(f, jump)
            }
            Statement::Goto(jump) => write_jump(f, jump),
            Statement::Return(None) => f.write_str("return"),
            Statement::Return(Some(value)) => write!(f, "return {}", value.display(names)),
            Statement::Throw(value) => write!(f, "throw {}", value.display(names)),
            Statement::MonitorEnter(value) => {
                write!(f, "monitorenter({})", value.display(names))
            }
            Statement::MonitorExit(value) => write!(f, "monitorexit({})", value.display(names)),
            Statement::RawSwitch { value, keys } => {
                write!(f, "switch ({}) {keys:?}", value.display(names))
            }
            Statement::Switch { value, .. } => write!(f, "switch ({})", value.display(names)),
            Statement::Case {
                values, is_default, ..
            } => {
                let mut labels: Vec<String> =
                    values.iter().map(|v| format!("case {v}:")).collect();
                if *is_default {
                    labels.push("default:".to_string());
                }
                f.write_str(&labels.join(" "))
            }
            Statement::Try { .. } => f.write_str("try"),
            Statement::Catch {
                catch_types,
                target,
                ..
            } => {
                let types: Vec<String> = catch_types.iter().map(ToString::to_string).collect();
                write!(f, "catch ({} {})", types.join(" | "), target.display(names))
            }
            Statement::While {
                condition: Some(condition),
                ..
            } => write!(f, "while ({})", condition.display(names)),
            Statement::While {
                condition: None, ..
            } => f.write_str("while (true)"),
            Statement::Do { .. } => f.write_str("do"),
            Statement::LoopEnd {
                condition: Some(condition),
                ..
            } => write!(f, "while ({})", condition.display(names)),
            Statement::LoopEnd {
                condition: None, ..
            } => f.write_str("loop end"),
            Statement::For {
                init,
                condition,
                update,
                ..
            } => {
                f.write_str("for (")?;
                if let Some(init) = init {
                    write!(
                        f,
                        "{} = {}",
                        init.target.display(names),
                        init.value.display(names)
                    )?;
                }
                write!(
                    f,
                    "; {}; {} = {})",
                    condition.display(names),
                    update.target.display(names),
                    update.value.display(names)
                )
            }
            Statement::ForEach {
                variable, iterable, ..
            } => write!(
                f,
                "for ({} : {})",
                variable.display(names),
                iterable.display(names)
            ),
            Statement::IfBlock { condition, .. } => {
                write!(f, "if ({})", condition.display(names))
            }
            Statement::Synchronized { monitor, .. } => {
                write!(f, "synchronized ({})", monitor.display(names))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::blocks::{BlockFactory, BlockKind},
        assembly::CompareOp,
        ir::{expression::StackValue, variables::RawNames},
    };

    #[test]
    fn test_header_blocks() {
        let mut factory = BlockFactory::new();
        let block = factory.mint(BlockKind::Loop);
        let header = Statement::While {
            condition: None,
            block,
        };
        assert_eq!(header.opened_block(), Some(block));
        assert!(header.falls_through());
        assert!(!Statement::Goto(JumpKind::Break(block)).falls_through());
        assert!(Statement::Nop.opened_block().is_none());
    }

    #[test]
    fn test_display() {
        let condition = Expression::Compare {
            op: CompareOp::Lt,
            lhs: Box::new(Expression::Local(Variable::new(1, 1))),
            rhs: Box::new(Expression::Stack(StackValue(3))),
        };
        let statement = Statement::If {
            condition,
            jump: JumpKind::Goto,
        };
        assert_eq!(
            statement.display(&RawNames).to_string(),
            "if (v1_1 < s3) goto"
        );

        let assign = Statement::Assignment(Assignment::new(
            LValue::Local(Variable::new(2, 1)),
            Expression::int(7),
        ));
        assert_eq!(assign.display(&RawNames).to_string(), "v2_1 = 7");
        assert_eq!(assign.defined_local(), Some(Variable::new(2, 1)));
    }

    #[test]
    fn test_expression_visiting() {
        let mut statement = Statement::Assignment(Assignment::new(
            LValue::ArrayElement {
                array: Box::new(Expression::Stack(StackValue(0))),
                index: Box::new(Expression::Local(Variable::new(1, 0))),
            },
            Expression::Stack(StackValue(2)),
        ));
        let mut count = 0;
        statement.for_each_expression(&mut |_| count += 1);
        assert_eq!(count, 3);

        statement.for_each_expression_mut(&mut |e| {
            e.replace_stack(StackValue(2), &Expression::int(9));
        });
        assert_eq!(
            statement.display(&RawNames).to_string(),
            "s0[v1_0] = 9"
        );
        assert_eq!(statement.local_reads(), vec![Variable::new(1, 0)]);
    }
}
