//! Low-level access to method code buffers.
//!
//! - [`crate::file::parser::Parser`] - Cursor-based, bounds-checked reader
//! - [`crate::file::io`] - Big-endian primitive decoding

pub mod io;
pub mod parser;
