//! Big-endian reading utilities for JVM bytecode.
//!
//! The JVM stores every multi-byte operand in big-endian order, so unlike a general purpose
//! binary reader this module only provides the big-endian half. The [`crate::file::io::ByteIO`]
//! trait gives a uniform, bounds-checked interface over the primitive types that appear in
//! instruction operands.
//!
//! # Key Components
//!
//! - [`crate::file::io::ByteIO`] - Trait implemented for the primitive operand types
//! - [`crate::file::io::read_be`] - Read a value from the start of a buffer
//! - [`crate::file::io::read_be_at`] - Read a value at an offset and advance the offset
//!
//! # Examples
//!
//! ```rust,ignore
//! use jvmscope::file::io::read_be_at;
//!
//! let data = [0x00, 0x10, 0xFF, 0xFE];
//! let mut offset = 0;
//! let index: u16 = read_be_at(&data, &mut offset)?;
//! let delta: i16 = read_be_at(&data, &mut offset)?;
//! assert_eq!(index, 0x10);
//! assert_eq!(delta, -2);
//! # Ok::<(), jvmscope::Error>(())
//! ```

use crate::Result;

/// Trait for primitive types that can be decoded from big-endian bytes.
pub trait ByteIO: Sized {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_byte_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl ByteIO for $ty {
                type Bytes = [u8; $len];

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }
            }
        )*
    };
}

impl_byte_io!(
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
);

/// Reads a value of type `T` from the start of `data` in big-endian order.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn read_be<T: ByteIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_be_at(data, &mut offset)
}

/// Reads a value of type `T` at `offset` in big-endian order and advances the offset.
///
/// # Arguments
///
/// * `data` - The byte buffer to read from
/// * `offset` - Mutable reference to the offset position (will be advanced after reading)
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes remaining.
pub fn read_be_at<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let end = offset
        .checked_add(type_len)
        .ok_or_else(|| out_of_bounds_error!())?;
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;

    Ok(T::from_be_bytes(read))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_signed_and_unsigned_values() {
        let data = [0xFF, 0xFE, 0x00, 0x00, 0x01, 0x00];
        let mut offset = 0;
        assert_eq!(read_be_at::<i16>(&data, &mut offset).unwrap(), -2);
        assert_eq!(read_be_at::<u32>(&data, &mut offset).unwrap(), 0x100);
        assert_eq!(offset, 6);
    }

    #[test]
    fn rejects_short_buffers() {
        let data = [0x01];
        let mut offset = 0;
        assert!(read_be_at::<u16>(&data, &mut offset).is_err());
        assert_eq!(offset, 0);
        assert!(read_be::<i32>(&data).is_err());
    }
}
