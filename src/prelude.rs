//! # jvmscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the jvmscope library. Import this module to get quick access to the essential
//! types for decompiling methods.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all jvmscope operations
pub use crate::Error;

/// The result type used throughout jvmscope
pub use crate::Result;

/// Options consulted by the structuring pipeline
pub use crate::DecompilerConfig;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Decompiler driving one method through every stage
pub use crate::decompiler::{decompile_method, DecompiledMethod, MethodDecompiler};

// ================================================================================================
// Method Input
// ================================================================================================

/// Method bodies and their exception tables
pub use crate::metadata::method::{ExceptionTableEntry, MethodBody, MethodFlags};

/// Constant-pool lookup service and its in-memory implementation
pub use crate::metadata::constants::{ConstantPool, ConstantPoolMap};

/// Label-based bytecode builder
pub use crate::assembly::InstructionAssembler;

// ================================================================================================
// Output and Diagnostics
// ================================================================================================

/// The structured tree
pub use crate::structured::{CatchClause, Dumper, StructuredStatement, SwitchCase};

/// Per-method annotations and the transformation trace
pub use crate::compiler::{DecompilerComment, DecompilerComments, Event, EventKind, EventLog};

/// Variable naming
pub use crate::ir::{RawNames, VariableNamer, VariableNames};
