//! Method-level metadata consumed by the decompiler.
//!
//! The crate does not parse class files. This module defines the boundary types an embedding
//! application fills in from its own class-file model.
//!
//! # Key Components
//!
//! - [`method`] - [`method::MethodBody`], access flags and exception table entries
//! - [`constants`] - The [`constants::ConstantPool`] lookup service and an in-memory implementation
//! - [`descriptor`] - Field and method descriptor parsing into stack types
//!
//! # Examples
//!
//! ```rust
//! use jvmscope::metadata::{
//!     constants::ConstantPoolMap,
//!     method::{ExceptionTableEntry, MethodBody, MethodFlags},
//! };
//!
//! let mut pool = ConstantPoolMap::new();
//! let io_exception = pool.add_class("java/io/IOException");
//!
//! let method = MethodBody::new("read", "(I)I", vec![0x1B, 0xAC])
//!     .with_flags(MethodFlags::STATIC)
//!     .with_exception_table(vec![ExceptionTableEntry::new(0, 1, 1, Some(io_exception))]);
//! assert!(method.is_static());
//! ```

pub mod constants;
pub mod descriptor;
pub mod method;
