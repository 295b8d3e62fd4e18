//! Expressions of the lowered statement IR.

use std::fmt;

use strum::Display;

use crate::{
    assembly::{BinaryOp, CompareOp, InvokeKind},
    ir::variables::VariableNames,
    metadata::descriptor::{JavaType, StackType},
};

/// A versioned local variable.
///
/// Version 0 is the value a slot holds on method entry: the parameter for parameter slots,
/// undefined otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    /// Local variable slot.
    pub slot: u16,
    /// SSA version.
    pub version: u32,
}

impl Variable {
    /// Creates a variable.
    #[must_use]
    pub const fn new(slot: u16, version: u32) -> Self {
        Variable { slot, version }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}_{}", self.slot, self.version)
    }
}

/// A stack temporary, named by the root of its unified stack entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackValue(pub usize);

impl fmt::Display for StackValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// A literal constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `null`
    Null,
    /// `true`/`false`
    Boolean(bool),
    /// An `int` (also used for byte, char and short)
    Int(i32),
    /// A `long`
    Long(i64),
    /// A `float`
    Float(f32),
    /// A `double`
    Double(f64),
    /// A string constant
    String(String),
    /// A class literal
    Class(JavaType),
    /// A method type constant, as its descriptor
    MethodType(String),
    /// A method handle constant, as `Class.member`
    MethodHandle(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Boolean(value) => write!(f, "{value}"),
            Literal::Int(value) => write!(f, "{value}"),
            Literal::Long(value) => write!(f, "{value}L"),
            Literal::Float(value) => write!(f, "{value:?}F"),
            Literal::Double(value) => write!(f, "{value:?}"),
            Literal::String(value) => write!(f, "{value:?}"),
            Literal::Class(ty) => write!(f, "{ty}.class"),
            Literal::MethodType(descriptor) => write!(f, "MethodType({descriptor})"),
            Literal::MethodHandle(handle) => write!(f, "MethodHandle({handle})"),
        }
    }
}

/// Short-circuit boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BooleanOp {
    /// `&&`
    #[strum(to_string = "&&")]
    And,
    /// `||`
    #[strum(to_string = "||")]
    Or,
}

impl BooleanOp {
    /// The De Morgan dual.
    #[must_use]
    pub const fn dual(self) -> Self {
        match self {
            BooleanOp::And => BooleanOp::Or,
            BooleanOp::Or => BooleanOp::And,
        }
    }
}

/// An assignable location.
#[derive(Debug, Clone, PartialEq)]
pub enum LValue {
    /// A local variable.
    Local(Variable),
    /// A stack temporary.
    Stack(StackValue),
    /// A static (`owner == None`) or instance field.
    Field {
        /// Receiver of an instance field.
        owner: Option<Box<Expression>>,
        /// Declaring class, internal name.
        class: String,
        /// Field name.
        name: String,
    },
    /// An array element.
    ArrayElement {
        /// The array.
        array: Box<Expression>,
        /// The index.
        index: Box<Expression>,
    },
}

impl LValue {
    /// The local variable this assigns, if any.
    #[must_use]
    pub fn local(&self) -> Option<Variable> {
        match self {
            LValue::Local(variable) => Some(*variable),
            _ => None,
        }
    }

    /// The stack value this assigns, if any.
    #[must_use]
    pub fn stack(&self) -> Option<StackValue> {
        match self {
            LValue::Stack(value) => Some(*value),
            _ => None,
        }
    }

    /// Sub-expressions evaluated when assigning (receivers, arrays, indices).
    pub fn for_each_read(&self, f: &mut dyn FnMut(&Expression)) {
        match self {
            LValue::Local(_) | LValue::Stack(_) => {}
            LValue::Field { owner, .. } => {
                if let Some(owner) = owner {
                    f(owner);
                }
            }
            LValue::ArrayElement { array, index } => {
                f(array);
                f(index);
            }
        }
    }

    /// Mutable variant of [`LValue::for_each_read`].
    pub fn for_each_read_mut(&mut self, f: &mut dyn FnMut(&mut Expression)) {
        match self {
            LValue::Local(_) | LValue::Stack(_) => {}
            LValue::Field { owner, .. } => {
                if let Some(owner) = owner {
                    f(owner);
                }
            }
            LValue::ArrayElement { array, index } => {
                f(array);
                f(index);
            }
        }
    }

    /// Formats this location with `names`.
    #[must_use]
    pub fn display<'a>(&'a self, names: &'a dyn VariableNames) -> LValueDisplay<'a> {
        LValueDisplay { lvalue: self, names }
    }
}

/// An expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A constant.
    Literal(Literal),
    /// A local variable read.
    Local(Variable),
    /// A stack temporary read.
    Stack(StackValue),
    /// Binary arithmetic, bitwise or shift operation.
    Arithmetic {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expression>,
        /// Right operand.
        rhs: Box<Expression>,
    },
    /// Arithmetic negation.
    Negate(Box<Expression>),
    /// Primitive conversion or reference cast.
    Cast {
        /// Target type.
        ty: JavaType,
        /// Converted value.
        value: Box<Expression>,
    },
    /// Three-way comparison (`lcmp`, `fcmpl`, ...).
    Cmp {
        /// Operand category.
        ty: StackType,
        /// Left operand.
        lhs: Box<Expression>,
        /// Right operand.
        rhs: Box<Expression>,
    },
    /// Relational test.
    Compare {
        /// Operator.
        op: CompareOp,
        /// Left operand.
        lhs: Box<Expression>,
        /// Right operand.
        rhs: Box<Expression>,
    },
    /// Logical negation.
    Not(Box<Expression>),
    /// Short-circuit combination.
    Boolean {
        /// Operator.
        op: BooleanOp,
        /// Left operand.
        lhs: Box<Expression>,
        /// Right operand.
        rhs: Box<Expression>,
    },
    /// `array[index]`
    ArrayIndex {
        /// The array.
        array: Box<Expression>,
        /// The index.
        index: Box<Expression>,
    },
    /// `array.length`
    ArrayLength(Box<Expression>),
    /// Array allocation.
    NewArray {
        /// Type of the allocated array.
        ty: JavaType,
        /// Dimension sizes, outermost first.
        dimensions: Vec<Expression>,
    },
    /// An allocated but not yet constructed object.
    New(JavaType),
    /// A condensed `new C(args)`.
    Construct {
        /// The constructed class.
        class: JavaType,
        /// Constructor arguments.
        args: Vec<Expression>,
    },
    /// Static (`owner == None`) or instance field read.
    Field {
        /// Receiver of an instance field.
        owner: Option<Box<Expression>>,
        /// Declaring class, internal name.
        class: String,
        /// Field name.
        name: String,
    },
    /// Method invocation.
    Invoke {
        /// Invocation kind.
        kind: InvokeKind,
        /// Receiver for instance invocations.
        receiver: Option<Box<Expression>>,
        /// Owner class, internal name.
        class: String,
        /// Method name.
        name: String,
        /// Method descriptor.
        descriptor: String,
        /// Arguments.
        args: Vec<Expression>,
    },
    /// `value instanceof ty`
    InstanceOf {
        /// Tested value.
        value: Box<Expression>,
        /// Tested type.
        ty: JavaType,
    },
    /// An assignment embedded in an expression.
    Assignment {
        /// Assigned location.
        target: Box<LValue>,
        /// Assigned value.
        value: Box<Expression>,
    },
}

impl Expression {
    /// Shorthand for an `int` literal.
    #[must_use]
    pub fn int(value: i32) -> Self {
        Expression::Literal(Literal::Int(value))
    }

    /// Shorthand for a boolean literal.
    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Expression::Literal(Literal::Boolean(value))
    }

    /// Calls `f` on every direct sub-expression, including reads inside assignment targets.
    pub fn for_each_child(&self, f: &mut dyn FnMut(&Expression)) {
        match self {
            Expression::Literal(_)
            | Expression::Local(_)
            | Expression::Stack(_)
            | Expression::New(_) => {}
            Expression::Arithmetic { lhs, rhs, .. }
            | Expression::Cmp { lhs, rhs, .. }
            | Expression::Compare { lhs, rhs, .. }
            | Expression::Boolean { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Expression::Negate(inner)
            | Expression::Not(inner)
            | Expression::ArrayLength(inner)
            | Expression::Cast { value: inner, .. }
            | Expression::InstanceOf { value: inner, .. } => f(inner),
            Expression::ArrayIndex { array, index } => {
                f(array);
                f(index);
            }
            Expression::NewArray { dimensions, .. } => dimensions.iter().for_each(f),
            Expression::Construct { args, .. } => args.iter().for_each(f),
            Expression::Field { owner, .. } => {
                if let Some(owner) = owner {
                    f(owner);
                }
            }
            Expression::Invoke { receiver, args, .. } => {
                if let Some(receiver) = receiver {
                    f(receiver);
                }
                args.iter().for_each(f);
            }
            Expression::Assignment { target, value } => {
                target.for_each_read(f);
                f(value);
            }
        }
    }

    /// Mutable variant of [`Expression::for_each_child`].
    pub fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expression)) {
        match self {
            Expression::Literal(_)
            | Expression::Local(_)
            | Expression::Stack(_)
            | Expression::New(_) => {}
            Expression::Arithmetic { lhs, rhs, .. }
            | Expression::Cmp { lhs, rhs, .. }
            | Expression::Compare { lhs, rhs, .. }
            | Expression::Boolean { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Expression::Negate(inner)
            | Expression::Not(inner)
            | Expression::ArrayLength(inner)
            | Expression::Cast { value: inner, .. }
            | Expression::InstanceOf { value: inner, .. } => f(inner),
            Expression::ArrayIndex { array, index } => {
                f(array);
                f(index);
            }
            Expression::NewArray { dimensions, .. } => dimensions.iter_mut().for_each(f),
            Expression::Construct { args, .. } => args.iter_mut().for_each(f),
            Expression::Field { owner, .. } => {
                if let Some(owner) = owner {
                    f(owner);
                }
            }
            Expression::Invoke { receiver, args, .. } => {
                if let Some(receiver) = receiver {
                    f(receiver);
                }
                args.iter_mut().for_each(f);
            }
            Expression::Assignment { target, value } => {
                target.for_each_read_mut(f);
                f(value);
            }
        }
    }

    /// Pre-order walk over this expression and all sub-expressions.
    pub fn walk(&self, f: &mut dyn FnMut(&Expression)) {
        f(self);
        self.for_each_child(&mut |child| child.walk(&mut *f));
    }

    /// Post-order mutable walk over all sub-expressions and then this expression.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Expression)) {
        self.for_each_child_mut(&mut |child| child.walk_mut(&mut *f));
        f(self);
    }

    /// Number of reads of `value`.
    #[must_use]
    pub fn count_stack(&self, value: StackValue) -> usize {
        let mut count = 0;
        self.walk(&mut |e| {
            if *e == Expression::Stack(value) {
                count += 1;
            }
        });
        count
    }

    /// Number of reads of `variable`.
    #[must_use]
    pub fn count_local(&self, variable: Variable) -> usize {
        let mut count = 0;
        self.walk(&mut |e| {
            if *e == Expression::Local(variable) {
                count += 1;
            }
        });
        count
    }

    /// Number of reads of any version of `slot`.
    #[must_use]
    pub fn count_slot(&self, slot: u16) -> usize {
        let mut count = 0;
        self.walk(&mut |e| {
            if matches!(e, Expression::Local(v) if v.slot == slot) {
                count += 1;
            }
        });
        count
    }

    /// All local variables read, in evaluation order, with repeats.
    #[must_use]
    pub fn local_reads(&self) -> Vec<Variable> {
        let mut reads = Vec::new();
        self.walk(&mut |e| {
            if let Expression::Local(variable) = e {
                reads.push(*variable);
            }
        });
        reads
    }

    /// All stack values read, with repeats.
    #[must_use]
    pub fn stack_reads(&self) -> Vec<StackValue> {
        let mut reads = Vec::new();
        self.walk(&mut |e| {
            if let Expression::Stack(value) = e {
                reads.push(*value);
            }
        });
        reads
    }

    /// Replaces every read of `value` by `replacement`. Returns the number of replacements.
    pub fn replace_stack(&mut self, value: StackValue, replacement: &Expression) -> usize {
        let mut count = 0;
        self.walk_mut(&mut |e| {
            if *e == Expression::Stack(value) {
                *e = replacement.clone();
                count += 1;
            }
        });
        count
    }

    /// Renames every read of `from` to `to`.
    pub fn rename_local(&mut self, from: Variable, to: Variable) {
        self.walk_mut(&mut |e| {
            if *e == Expression::Local(from) {
                *e = Expression::Local(to);
            }
        });
    }

    /// Returns `true` if evaluating the expression has no side effects and reads no memory
    /// that another statement could change, so it can be moved past other statements.
    #[must_use]
    pub fn is_pure(&self) -> bool {
        let mut pure = true;
        self.walk(&mut |e| {
            if matches!(
                e,
                Expression::Invoke { .. }
                    | Expression::Construct { .. }
                    | Expression::New(_)
                    | Expression::NewArray { .. }
                    | Expression::Assignment { .. }
                    | Expression::Field { .. }
                    | Expression::ArrayIndex { .. }
                    | Expression::ArrayLength(_)
            ) {
                pure = false;
            }
        });
        pure
    }

    /// Logical negation, folding double negation, comparisons and literals.
    #[must_use]
    pub fn negate(self) -> Expression {
        match self {
            Expression::Not(inner) => *inner,
            Expression::Compare { op, lhs, rhs } => Expression::Compare {
                op: op.negate(),
                lhs,
                rhs,
            },
            Expression::Literal(Literal::Boolean(value)) => Expression::boolean(!value),
            other => Expression::Not(Box::new(other)),
        }
    }

    /// Bottom-up simplification of a condition. Returns the simplified expression and whether
    /// anything changed.
    #[must_use]
    pub fn simplify(self) -> (Expression, bool) {
        let mut changed = false;
        let mut expression = self;
        expression.walk_mut(&mut |e| {
            if let Some(simpler) = simplify_node(e) {
                *e = simpler;
                changed = true;
            }
        });
        (expression, changed)
    }

    /// Formats this expression with `names`.
    #[must_use]
    pub fn display<'a>(&'a self, names: &'a dyn VariableNames) -> ExpressionDisplay<'a> {
        ExpressionDisplay {
            expression: self,
            names,
        }
    }

    fn is_atomic(&self) -> bool {
        matches!(
            self,
            Expression::Literal(_)
                | Expression::Local(_)
                | Expression::Stack(_)
                | Expression::ArrayIndex { .. }
                | Expression::ArrayLength(_)
                | Expression::NewArray { .. }
                | Expression::New(_)
                | Expression::Construct { .. }
                | Expression::Field { .. }
                | Expression::Invoke { .. }
                | Expression::Cmp { .. }
        )
    }
}

fn simplify_node(expression: &Expression) -> Option<Expression> {
    match expression {
        Expression::Not(inner) => match inner.as_ref() {
            Expression::Not(_)
            | Expression::Compare { .. }
            | Expression::Literal(Literal::Boolean(_)) => Some(inner.as_ref().clone().negate()),
            Expression::Boolean { op, lhs, rhs } => Some(Expression::Boolean {
                op: op.dual(),
                lhs: Box::new(lhs.as_ref().clone().negate()),
                rhs: Box::new(rhs.as_ref().clone().negate()),
            }),
            _ => None,
        },
        Expression::Compare { op, lhs, rhs } => match (lhs.as_ref(), rhs.as_ref()) {
            (Expression::Cmp { lhs, rhs, .. }, Expression::Literal(Literal::Int(0))) => {
                Some(Expression::Compare {
                    op: *op,
                    lhs: lhs.clone(),
                    rhs: rhs.clone(),
                })
            }
            _ => None,
        },
        Expression::Boolean { op, lhs, rhs } => {
            match (op, lhs.as_ref(), rhs.as_ref()) {
                (BooleanOp::And, Expression::Literal(Literal::Boolean(true)), other)
                | (BooleanOp::Or, Expression::Literal(Literal::Boolean(false)), other) => {
                    Some(other.clone())
                }
                (BooleanOp::And, Expression::Literal(Literal::Boolean(false)), _) => {
                    Some(Expression::boolean(false))
                }
                (BooleanOp::Or, Expression::Literal(Literal::Boolean(true)), _) => {
                    Some(Expression::boolean(true))
                }
                (BooleanOp::And, other, Expression::Literal(Literal::Boolean(true)))
                | (BooleanOp::Or, other, Expression::Literal(Literal::Boolean(false))) => {
                    Some(other.clone())
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// [`fmt::Display`] adapter for an [`Expression`].
pub struct ExpressionDisplay<'a> {
    expression: &'a Expression,
    names: &'a dyn VariableNames,
}

impl ExpressionDisplay<'_> {
    fn operand<'b>(&'b self, expression: &'b Expression) -> Operand<'b> {
        Operand {
            expression,
            names: self.names,
        }
    }

    fn child<'b>(&'b self, expression: &'b Expression) -> ExpressionDisplay<'b> {
        ExpressionDisplay {
            expression,
            names: self.names,
        }
    }

    fn args(&self, f: &mut fmt::Formatter<'_>, args: &[Expression]) -> fmt::Result {
        f.write_str("(")?;
        for (index, arg) in args.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", self.child(arg))?;
        }
        f.write_str(")")
    }
}

struct Operand<'a> {
    expression: &'a Expression,
    names: &'a dyn VariableNames,
}

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.expression.display(self.names);
        if self.expression.is_atomic() {
            write!(f, "{inner}")
        } else {
            write!(f, "({inner})")
        }
    }
}

impl fmt::Display for ExpressionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expression {
            Expression::Literal(literal) => write!(f, "{literal}"),
            Expression::Local(variable) => f.write_str(&self.names.local_name(*variable)),
            Expression::Stack(value) => f.write_str(&self.names.stack_name(*value)),
            Expression::Arithmetic { op, lhs, rhs } => {
                write!(f, "{} {} {}", self.operand(lhs), op, self.operand(rhs))
            }
            Expression::Negate(inner) => write!(f, "-{}", self.operand(inner)),
            Expression::Cast { ty, value } => write!(f, "({ty}){}", self.operand(value)),
            Expression::Cmp { ty, lhs, rhs } => {
                let owner = match ty {
                    StackType::Long => "Long",
                    StackType::Float => "Float",
                    _ => "Double",
                };
                write!(
                    f,
                    "{owner}.compare({}, {})",
                    self.child(lhs),
                    self.child(rhs)
                )
            }
            Expression::Compare { op, lhs, rhs } => {
                write!(f, "{} {} {}", self.operand(lhs), op, self.operand(rhs))
            }
            Expression::Not(inner) => write!(f, "!{}", self.operand(inner)),
            Expression::Boolean { op, lhs, rhs } => {
                let side = |side: &Expression| {
                    let bare = side.is_atomic()
                        || matches!(
                            side,
                            Expression::Compare { .. }
                                | Expression::Not(_)
                                | Expression::InstanceOf { .. }
                        )
                        || matches!(side, Expression::Boolean { op: inner, .. } if inner == op);
                    if bare {
                        self.child(side).to_string()
                    } else {
                        format!("({})", self.child(side))
                    }
                };
                write!(f, "{} {op} {}", side(lhs), side(rhs))
            }
            Expression::ArrayIndex { array, index } => {
                write!(f, "{}[{}]", self.operand(array), self.child(index))
            }
            Expression::ArrayLength(array) => write!(f, "{}.length", self.operand(array)),
            Expression::NewArray { ty, dimensions } => {
                let mut base = ty;
                let mut depth = 0;
                while let Some(component) = base.component() {
                    base = component;
                    depth += 1;
                }
                write!(f, "new {base}")?;
                for dimension in dimensions {
                    write!(f, "[{}]", self.child(dimension))?;
                }
                for _ in dimensions.len()..depth {
                    f.write_str("[]")?;
                }
                Ok(())
            }
            Expression::New(ty) => write!(f, "new {ty}"),
            Expression::Construct { class, args } => {
                write!(f, "new {class}")?;
                self.args(f, args)
            }
            Expression::Field { owner, class, name } => match owner {
                Some(owner) => write!(f, "{}.{name}", self.operand(owner)),
                None => write!(f, "{}.{name}", class.replace('/', ".")),
            },
            Expression::Invoke {
                receiver,
                class,
                name,
                args,
                ..
            } => {
                match receiver {
                    Some(receiver) => write!(f, "{}.{name}", self.operand(receiver))?,
                    None => write!(f, "{}.{name}", class.replace('/', "."))?,
                }
                self.args(f, args)
            }
            Expression::InstanceOf { value, ty } => {
                write!(f, "{} instanceof {ty}", self.operand(value))
            }
            Expression::Assignment { target, value } => {
                write!(f, "{} = {}", target.display(self.names), self.child(value))
            }
        }
    }
}

/// [`fmt::Display`] adapter for an [`LValue`].
pub struct LValueDisplay<'a> {
    lvalue: &'a LValue,
    names: &'a dyn VariableNames,
}

impl fmt::Display for LValueDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lvalue {
            LValue::Local(variable) => f.write_str(&self.names.local_name(*variable)),
            LValue::Stack(value) => f.write_str(&self.names.stack_name(*value)),
            LValue::Field { owner, class, name } => match owner {
                Some(owner) => write!(
                    f,
                    "{}.{name}",
                    Operand {
                        expression: owner,
                        names: self.names
                    }
                ),
                None => write!(f, "{}.{name}", class.replace('/', ".")),
            },
            LValue::ArrayElement { array, index } => write!(
                f,
                "{}[{}]",
                Operand {
                    expression: array,
                    names: self.names
                },
                index.display(self.names)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::variables::RawNames;

    fn local(slot: u16, version: u32) -> Expression {
        Expression::Local(Variable::new(slot, version))
    }

    #[test]
    fn test_display_precedence() {
        let sum = Expression::Arithmetic {
            op: BinaryOp::Add,
            lhs: Box::new(local(1, 1)),
            rhs: Box::new(Expression::int(2)),
        };
        let product = Expression::Arithmetic {
            op: BinaryOp::Mul,
            lhs: Box::new(sum),
            rhs: Box::new(Expression::Stack(StackValue(4))),
        };
        assert_eq!(product.display(&RawNames).to_string(), "(v1_1 + 2) * s4");
    }

    #[test]
    fn test_negate_and_simplify() {
        let test = Expression::Compare {
            op: CompareOp::Lt,
            lhs: Box::new(local(1, 1)),
            rhs: Box::new(local(2, 0)),
        };
        let negated = test.clone().negate();
        assert_eq!(negated.display(&RawNames).to_string(), "v1_1 >= v2_0");
        assert_eq!(negated.negate(), test);

        let double = Expression::Not(Box::new(Expression::Not(Box::new(local(3, 1)))));
        let (simplified, changed) = double.simplify();
        assert!(changed);
        assert_eq!(simplified, local(3, 1));
    }

    #[test]
    fn test_simplify_cmp_against_zero() {
        let cmp = Expression::Compare {
            op: CompareOp::Gt,
            lhs: Box::new(Expression::Cmp {
                ty: StackType::Long,
                lhs: Box::new(local(1, 0)),
                rhs: Box::new(Expression::Literal(Literal::Long(0))),
            }),
            rhs: Box::new(Expression::int(0)),
        };
        let (simplified, changed) = cmp.simplify();
        assert!(changed);
        assert_eq!(simplified.display(&RawNames).to_string(), "v1_0 > 0L");
    }

    #[test]
    fn test_simplify_de_morgan() {
        let a = Expression::Compare {
            op: CompareOp::Eq,
            lhs: Box::new(local(1, 0)),
            rhs: Box::new(Expression::int(0)),
        };
        let b = Expression::Compare {
            op: CompareOp::Ne,
            lhs: Box::new(local(2, 0)),
            rhs: Box::new(Expression::Literal(Literal::Null)),
        };
        let not_and = Expression::Not(Box::new(Expression::Boolean {
            op: BooleanOp::And,
            lhs: Box::new(a),
            rhs: Box::new(b),
        }));
        let (simplified, _) = not_and.simplify();
        assert_eq!(
            simplified.display(&RawNames).to_string(),
            "v1_0 != 0 || v2_0 == null"
        );
    }

    #[test]
    fn test_replace_and_count() {
        let mut e = Expression::Arithmetic {
            op: BinaryOp::Add,
            lhs: Box::new(Expression::Stack(StackValue(1))),
            rhs: Box::new(Expression::Stack(StackValue(2))),
        };
        assert_eq!(e.count_stack(StackValue(1)), 1);
        assert_eq!(e.replace_stack(StackValue(1), &local(5, 2)), 1);
        assert_eq!(e.count_stack(StackValue(1)), 0);
        assert_eq!(e.local_reads(), vec![Variable::new(5, 2)]);
        assert!(e.is_pure());

        let call = Expression::Invoke {
            kind: InvokeKind::Static,
            receiver: None,
            class: "java/lang/Math".into(),
            name: "abs".into(),
            descriptor: "(I)I".into(),
            args: vec![e],
        };
        assert!(!call.is_pure());
        assert_eq!(
            call.display(&RawNames).to_string(),
            "java.lang.Math.abs(v5_2 + s2)"
        );
    }

    #[test]
    fn test_new_array_display() {
        let array = Expression::NewArray {
            ty: JavaType::parse("[[I").unwrap(),
            dimensions: vec![Expression::int(3)],
        };
        assert_eq!(array.display(&RawNames).to_string(), "new int[3][]");
    }
}
