//! Cursor-based big-endian parser for JVM code arrays.
//!
//! This module provides the [`crate::file::parser::Parser`] type used by the instruction decoder.
//! It keeps a position within a borrowed byte slice and offers bounds-checked reads of the
//! operand types found in JVM instructions, plus the 4-byte alignment needed by
//! `tableswitch` and `lookupswitch`.
//!
//! # Examples
//!
//! ```rust
//! use jvmscope::Parser;
//!
//! let data = [0x10, 0x2A, 0x00, 0x05];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_be::<u8>()?, 0x10);
//! assert_eq!(parser.read_be::<i8>()?, 42);
//! assert_eq!(parser.read_be::<u16>()?, 5);
//! assert!(!parser.has_more_data());
//! # Ok::<(), jvmscope::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, ByteIO},
    Result,
};

/// A binary data parser for JVM bytecode.
///
/// `Parser` maintains an internal position cursor and validates every read against the end of
/// the underlying data, so truncated instructions surface as errors instead of panics.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the current position to the specified index.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos >= self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        if self.position + step > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position += step;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is at or beyond the data length.
    pub fn peek_byte(&self) -> Result<u8> {
        if self.position >= self.data.len() {
            return Err(out_of_bounds_error!());
        }
        Ok(self.data[self.position])
    }

    /// Skip padding bytes until the position is a multiple of `alignment`.
    ///
    /// Switch instructions pad their operands to a 4-byte boundary measured from the start of
    /// the code array, which is the start of the parser's buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the padding runs past the end of the data.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = (alignment - (self.position % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// Read a value of type `T` in big-endian order and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading `T` would exceed the data length.
    pub fn read_be<T: ByteIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Returns the number of bytes between the position and the end of the data.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Read `length` raw bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `length` bytes remain.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        if length > self.remaining() {
            return Err(out_of_bounds_error!());
        }
        let slice = &self.data[self.position..self.position + length];
        self.position += length;
        Ok(slice)
    }

    /// Returns the bytes between `start` and the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `start` lies beyond the current position.
    pub fn slice_from(&self, start: usize) -> Result<&'a [u8]> {
        if start > self.position {
            return Err(out_of_bounds_error!());
        }
        Ok(&self.data[start..self.position])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_relative_to_buffer_start() {
        let data = [0xAA, 0, 0, 0, 0, 0, 0, 0x07];
        let mut parser = Parser::new(&data);
        parser.advance_by(1).unwrap();
        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 4);
        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 4);
        assert_eq!(parser.read_be::<u32>().unwrap(), 7);
    }

    #[test]
    fn test_error_handling() {
        let data = [0x01, 0x02];
        let mut parser = Parser::new(&data);
        assert!(parser.read_be::<u32>().is_err());
        assert!(parser.seek(2).is_err());
        assert!(parser.read_bytes(3).is_err());
        assert_eq!(parser.read_bytes(2).unwrap(), &[0x01, 0x02]);
        assert!(parser.peek_byte().is_err());
    }

    #[test]
    fn test_slice_from() {
        let data = [0x10, 0x11, 0x12];
        let mut parser = Parser::new(&data);
        parser.advance_by(2).unwrap();
        assert_eq!(parser.slice_from(0).unwrap(), &[0x10, 0x11]);
        assert!(parser.slice_from(3).is_err());
    }
}
