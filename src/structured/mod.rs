//! The structured statement tree and its diagnostic dump.
//!
//! [`assemble`] folds a fully structured [`crate::ir::StatementList`] into a tree of
//! [`StructuredStatement`]s; [`Dumper`] renders that tree as Java-like text for tests and
//! debugging. The dump is not a source printer: types are not declared, and residual jumps and
//! labels are shown as they are.

mod assembler;

use std::fmt::Write;

pub use assembler::assemble;

use crate::{
    analysis::{BlockIdentifier, CatchType},
    ir::{Assignment, Expression, LValue, Statement, VariableNames},
};

/// One case group of a switch.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// Case keys.
    pub values: Vec<i32>,
    /// Whether the group is also the default.
    pub is_default: bool,
    /// Case body; falls through to the next case unless it breaks.
    pub body: StructuredStatement,
}

/// One handler of a try statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// Caught types.
    pub catch_types: Vec<CatchType>,
    /// Where the exception is stored.
    pub variable: LValue,
    /// Handler body.
    pub body: StructuredStatement,
}

/// A node of the structured tree. Every node owns its children.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredStatement {
    /// A sequence.
    Block(Vec<StructuredStatement>),
    /// A simple statement.
    Statement(Statement),
    /// `if (condition) then else otherwise`
    If {
        /// Branch condition.
        condition: Expression,
        /// Taken branch.
        then: Box<StructuredStatement>,
        /// Else branch.
        otherwise: Option<Box<StructuredStatement>>,
    },
    /// `while (condition)`; `None` is `while (true)`.
    While {
        /// Loop condition.
        condition: Option<Expression>,
        /// Loop identifier.
        block: BlockIdentifier,
        /// Set when a labelled jump targets the loop.
        label: Option<String>,
        /// Loop body.
        body: Box<StructuredStatement>,
    },
    /// `do body while (condition)`; `None` loops forever.
    DoWhile {
        /// Condition tested after the body.
        condition: Option<Expression>,
        /// Loop identifier.
        block: BlockIdentifier,
        /// Set when a labelled jump targets the loop.
        label: Option<String>,
        /// Loop body.
        body: Box<StructuredStatement>,
    },
    /// `for (init; condition; update)`
    For {
        /// Initialiser.
        init: Option<Assignment>,
        /// Loop condition.
        condition: Expression,
        /// Update.
        update: Assignment,
        /// Loop identifier.
        block: BlockIdentifier,
        /// Set when a labelled jump targets the loop.
        label: Option<String>,
        /// Loop body.
        body: Box<StructuredStatement>,
    },
    /// `for (variable : iterable)`
    ForEach {
        /// Loop variable.
        variable: LValue,
        /// Iterated array or `Iterable`.
        iterable: Expression,
        /// Loop identifier.
        block: BlockIdentifier,
        /// Set when a labelled jump targets the loop.
        label: Option<String>,
        /// Loop body.
        body: Box<StructuredStatement>,
    },
    /// `switch (value)`
    Switch {
        /// Selector.
        value: Expression,
        /// Switch identifier.
        block: BlockIdentifier,
        /// Set when a labelled jump targets the switch.
        label: Option<String>,
        /// Case groups in positional order.
        cases: Vec<SwitchCase>,
    },
    /// `try body catch ...`
    TryCatch {
        /// Protected range identifier.
        block: BlockIdentifier,
        /// Protected body.
        body: Box<StructuredStatement>,
        /// Handlers in table order.
        catches: Vec<CatchClause>,
    },
    /// `synchronized (monitor)`
    Synchronized {
        /// Lock expression.
        monitor: Expression,
        /// Body.
        body: Box<StructuredStatement>,
    },
    /// `break`, with the target label when it is not the innermost breakable block.
    Break(Option<String>),
    /// `continue`, with the target label when it is not the innermost loop.
    Continue(Option<String>),
    /// A jump that could not be structured.
    Jump {
        /// Condition of a conditional jump.
        condition: Option<Expression>,
        /// Target label.
        target: String,
    },
    /// Target of an unstructured [`StructuredStatement::Jump`].
    Label(String),
}

impl StructuredStatement {
    /// Wraps `children` in a block, unless there is exactly one.
    #[must_use]
    pub fn sequence(mut children: Vec<StructuredStatement>) -> Self {
        if children.len() == 1 {
            if let Some(only) = children.pop() {
                return only;
            }
        }
        StructuredStatement::Block(children)
    }

    /// The statements of a sequence, or this statement alone.
    #[must_use]
    pub fn statements(&self) -> &[StructuredStatement] {
        match self {
            StructuredStatement::Block(children) => children,
            other => std::slice::from_ref(other),
        }
    }

    /// Returns `true` for loop nodes.
    #[must_use]
    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            StructuredStatement::While { .. }
                | StructuredStatement::DoWhile { .. }
                | StructuredStatement::For { .. }
                | StructuredStatement::ForEach { .. }
        )
    }

    /// Calls `f` on this node and every node below it, parents first.
    pub fn walk(&self, f: &mut dyn FnMut(&StructuredStatement)) {
        f(self);
        match self {
            StructuredStatement::Block(children) => {
                for child in children {
                    child.walk(f);
                }
            }
            StructuredStatement::If {
                then, otherwise, ..
            } => {
                then.walk(f);
                if let Some(otherwise) = otherwise {
                    otherwise.walk(f);
                }
            }
            StructuredStatement::While { body, .. }
            | StructuredStatement::DoWhile { body, .. }
            | StructuredStatement::For { body, .. }
            | StructuredStatement::ForEach { body, .. }
            | StructuredStatement::Synchronized { body, .. } => body.walk(f),
            StructuredStatement::Switch { cases, .. } => {
                for case in cases {
                    case.body.walk(f);
                }
            }
            StructuredStatement::TryCatch { body, catches, .. } => {
                body.walk(f);
                for catch in catches {
                    catch.body.walk(f);
                }
            }
            StructuredStatement::Statement(_)
            | StructuredStatement::Break(_)
            | StructuredStatement::Continue(_)
            | StructuredStatement::Jump { .. }
            | StructuredStatement::Label(_) => {}
        }
    }

    /// Number of nodes matching `predicate` in this subtree.
    pub fn count(&self, predicate: impl Fn(&StructuredStatement) -> bool) -> usize {
        let mut count = 0;
        self.walk(&mut |node| {
            if predicate(node) {
                count += 1;
            }
        });
        count
    }
}

/// Renders a [`StructuredStatement`] tree as indented Java-like text.
///
/// ```text
/// for (var1 = 0; var1 < param1; var1 = var1 + 1) {
///     java.lang.System.out.println(var1);
/// }
/// ```
pub struct Dumper<'a> {
    names: &'a dyn VariableNames,
    out: String,
    depth: usize,
}

impl<'a> Dumper<'a> {
    /// Creates a dumper that names variables with `names`.
    #[must_use]
    pub fn new(names: &'a dyn VariableNames) -> Self {
        Dumper {
            names,
            out: String::new(),
            depth: 0,
        }
    }

    /// Renders `root`.
    #[must_use]
    pub fn dump(mut self, root: &StructuredStatement) -> String {
        self.node(root);
        self.out
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn nested(&mut self, body: &StructuredStatement) {
        self.depth += 1;
        self.node(body);
        self.depth -= 1;
    }

    fn expression(&self, expression: &Expression) -> String {
        expression.display(self.names).to_string()
    }

    fn assignment(&self, assignment: &Assignment) -> String {
        format!(
            "{} = {}",
            assignment.target.display(self.names),
            assignment.value.display(self.names)
        )
    }

    fn labelled(label: Option<&String>, text: String) -> String {
        match label {
            Some(label) => format!("{label}: {text}"),
            None => text,
        }
    }

    fn node(&mut self, node: &StructuredStatement) {
        match node {
            StructuredStatement::Block(children) => {
                for child in children {
                    self.node(child);
                }
            }
            StructuredStatement::Statement(statement) => {
                let text = statement.display(self.names).to_string();
                match statement {
                    Statement::MonitorEnter(_) | Statement::MonitorExit(_) => {
                        self.line(&format!("// {text}"));
                    }
                    _ => self.line(&format!("{text};")),
                }
            }
            StructuredStatement::If {
                condition,
                then,
                otherwise,
            } => {
                let header = format!("if ({}) {{", self.expression(condition));
                self.line(&header);
                self.nested(then);
                if let Some(otherwise) = otherwise {
                    self.line("} else {");
                    self.nested(otherwise);
                }
                self.line("}");
            }
            StructuredStatement::While {
                condition,
                label,
                body,
                ..
            } => {
                let test = condition
                    .as_ref()
                    .map_or_else(|| "true".to_string(), |c| self.expression(c));
                self.line(&Self::labelled(label.as_ref(), format!("while ({test}) {{")));
                self.nested(body);
                self.line("}");
            }
            StructuredStatement::DoWhile {
                condition,
                label,
                body,
                ..
            } => {
                self.line(&Self::labelled(label.as_ref(), "do {".to_string()));
                self.nested(body);
                let test = condition
                    .as_ref()
                    .map_or_else(|| "true".to_string(), |c| self.expression(c));
                self.line(&format!("}} while ({test});"));
            }
            StructuredStatement::For {
                init,
                condition,
                update,
                label,
                body,
                ..
            } => {
                let init = init.as_ref().map(|a| self.assignment(a)).unwrap_or_default();
                let header = format!(
                    "for ({init}; {}; {}) {{",
                    self.expression(condition),
                    self.assignment(update)
                );
                self.line(&Self::labelled(label.as_ref(), header));
                self.nested(body);
                self.line("}");
            }
            StructuredStatement::ForEach {
                variable,
                iterable,
                label,
                body,
                ..
            } => {
                let header = format!(
                    "for ({} : {}) {{",
                    variable.display(self.names),
                    self.expression(iterable)
                );
                self.line(&Self::labelled(label.as_ref(), header));
                self.nested(body);
                self.line("}");
            }
            StructuredStatement::Switch {
                value,
                label,
                cases,
                ..
            } => {
                let header = format!("switch ({}) {{", self.expression(value));
                self.line(&Self::labelled(label.as_ref(), header));
                self.depth += 1;
                for case in cases {
                    for value in &case.values {
                        self.line(&format!("case {value}:"));
                    }
                    if case.is_default {
                        self.line("default:");
                    }
                    self.nested(&case.body);
                }
                self.depth -= 1;
                self.line("}");
            }
            StructuredStatement::TryCatch { body, catches, .. } => {
                self.line("try {");
                self.nested(body);
                for catch in catches {
                    let types: Vec<String> =
                        catch.catch_types.iter().map(ToString::to_string).collect();
                    let header = format!(
                        "}} catch ({} {}) {{",
                        types.join(" | "),
                        catch.variable.display(self.names)
                    );
                    self.line(&header);
                    self.nested(&catch.body);
                }
                self.line("}");
            }
            StructuredStatement::Synchronized { monitor, body } => {
                let header = format!("synchronized ({}) {{", self.expression(monitor));
                self.line(&header);
                self.nested(body);
                self.line("}");
            }
            StructuredStatement::Break(label) => match label {
                Some(label) => self.line(&format!("break {label};")),
                None => self.line("break;"),
            },
            StructuredStatement::Continue(label) => match label {
                Some(label) => self.line(&format!("continue {label};")),
                None => self.line("continue;"),
            },
            StructuredStatement::Jump { condition, target } => {
                let text = match condition {
                    Some(condition) => {
                        format!("if ({}) goto {target};", self.expression(condition))
                    }
                    None => format!("goto {target};"),
                };
                self.line(&text);
            }
            StructuredStatement::Label(label) => {
                let mut text = String::new();
                let _ = write!(text, "{label}:");
                self.line(&text);
            }
        }
    }
}
