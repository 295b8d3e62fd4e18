//! The lowered statement IR.
//!
//! Lowering turns every graph node into one or more [`SimpleStatement`]s held in a
//! [`StatementList`]. Stack traffic is explicit: each stack entry is a [`StackValue`] that is
//! assigned once and read by its consumers, and locals are SSA-versioned [`Variable`]s.
//!
//! # Key Components
//!
//! - [`Expression`], [`LValue`], [`Literal`] - Expression trees
//! - [`Statement`], [`JumpKind`], [`JoinMarker`] - Statement kinds
//! - [`StatementList`], [`SimpleStatement`] - The editable statement arena
//! - [`VariableNamer`], [`VariableFactory`] - Naming and SSA version allocation

pub mod expression;
pub mod list;
pub mod statement;
pub mod variables;

pub use expression::{BooleanOp, Expression, LValue, Literal, StackValue, Variable};
pub use list::{SimpleStatement, SsaVersion, StatementId, StatementList};
pub use statement::{Assignment, JoinMarker, JumpKind, Statement};
pub use variables::{RawNames, VariableFactory, VariableNamer, VariableNames};
