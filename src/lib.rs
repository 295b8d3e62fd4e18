// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # jvmscope
//!
//! A per-method JVM bytecode structuring core. `jvmscope` takes the raw code of one method,
//! its descriptor, its exception table and a constant-pool lookup service, and recovers a tree of
//! structured statements: `if`/`else`, `while`, `do`/`while`, `for`, for-each, `switch`,
//! `try`/`catch`, `synchronized` and labelled `break`/`continue`.
//!
//! ## Features
//!
//! - **Bounds-checked decoding** - every opcode of the JVM instruction set, including `wide`,
//!   `tableswitch` and `lookupswitch`
//! - **Stack simulation** - operand stack shapes are checked at every merge point
//! - **SSA lowering** - locals are versioned, join points carry explicit markers
//! - **Structuring pipeline** - a fixed order of rewrite passes over a flat statement list
//! - **Observability** - every rewrite is recorded in a per-method [`compiler::EventLog`]
//! - **Batch mode** - independent methods are decompiled in parallel with `rayon`
//!
//! ## Quick Start
//!
//! ```rust
//! use jvmscope::prelude::*;
//!
//! let mut pool = ConstantPoolMap::new();
//! let out = pool.add_field("java/lang/System", "out", "Ljava/io/PrintStream;");
//! let println = pool.add_method("java/io/PrintStream", "println", "(I)V");
//!
//! // static void count(int n) { for (int i = 0; i < n; i++) System.out.println(i); }
//! let mut asm = InstructionAssembler::new();
//! asm.iconst(0)?
//!     .istore(1)?
//!     .label("test")?
//!     .iload(1)?
//!     .iload(0)?
//!     .if_icmpge("end")?
//!     .getstatic(out)?
//!     .iload(1)?
//!     .invokevirtual(println)?
//!     .iinc(1, 1)?
//!     .goto("test")?
//!     .label("end")?
//!     .vreturn()?;
//! let (code, table) = asm.finish()?;
//!
//! let method = MethodBody::new("count", "(I)V", code)
//!     .with_flags(MethodFlags::STATIC)
//!     .with_exception_table(table);
//! let result = MethodDecompiler::new(&pool).decompile(&method)?;
//! println!("{}", result.dump());
//! # Ok::<(), jvmscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`assembly`] - instruction decoding and a label-based bytecode assembler
//! - [`analysis`] - instruction graph, exception regions, stack simulation, lowering, SSA
//! - [`ir`] - expressions, statements and the statement list the passes rewrite
//! - [`compiler`] - the structuring passes, the pipeline, events and comments
//! - [`structured`] - the final statement tree and its diagnostic dump
//! - [`metadata`] - method bodies, constant pools and descriptors
//!
//! ## Error Handling
//!
//! Only decoding, graph building, stack simulation and lowering can fail. Structuring is total:
//! what cannot be structured stays as labelled jumps and is reported through
//! [`compiler::DecompilerComment`]s.

#[macro_use]
pub(crate) mod error;
pub mod file;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use jvmscope::prelude::*;
///
/// let pool = ConstantPoolMap::new();
/// let method = MethodBody::new("nothing", "()V", vec![0xB1]).with_flags(MethodFlags::STATIC);
/// assert_eq!(decompile_method(&method, &pool)?.dump(), "return;\n");
/// # Ok::<(), jvmscope::Error>(())
/// ```
pub mod prelude;

pub mod analysis;
pub mod assembly;
pub mod compiler;
pub mod config;
pub mod decompiler;
pub mod ir;
pub mod metadata;
pub mod structured;
pub mod utils;

/// `jvmscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `jvmscope` Error type
///
/// Only decoding, graph building, stack simulation and lowering produce errors.
pub use error::Error;

/// Bounds-checked big-endian reader over a code buffer.
pub use file::parser::Parser;

pub use config::DecompilerConfig;
pub use decompiler::{decompile_method, DecompiledMethod, MethodDecompiler};
pub use metadata::{
    constants::{ConstantPool, ConstantPoolMap},
    method::{ExceptionTableEntry, MethodBody, MethodFlags},
};
