//! Low-level byte order and safe reading utilities for PE and CLI metadata parsing.
//!
//! Every structure the sandbox inspects is stored little-endian. This module provides the
//! bounds-checked primitives that all higher layers build on, so that a truncated or hostile
//! assembly results in [`crate::Error::OutOfBounds`] rather than a panic.
//!
//! # Key Components
//!
//! - [`crate::file::io::CilIO`] - Trait implemented by every primitive that can be read
//! - [`crate::file::io::read_le`] - Read a value from the start of a buffer
//! - [`crate::file::io::read_le_at`] - Read a value at an offset and advance the offset
//! - [`crate::file::io::read_le_at_dyn`] - Read a 2 or 4 byte index, widened to `u32`
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use dotsandbox::file::io::read_le_at;
//!
//! let data = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00];
//! let mut offset = 0;
//!
//! let first: u16 = read_le_at(&data, &mut offset)?;
//! let second: u16 = read_le_at(&data, &mut offset)?;
//! let third: u32 = read_le_at(&data, &mut offset)?;
//!
//! assert_eq!((first, second, third), (1, 2, 3));
//! assert_eq!(offset, 8);
//! ```
//!
//! # Thread Safety
//!
//! All functions in this module are pure and operate on borrowed slices.

use crate::Result;

/// Trait for primitive types that can be decoded from raw little-endian bytes.
///
/// The associated `Bytes` type is the fixed-size array the value is decoded from, which lets
/// [`read_le_at`] stay generic over every integer width the metadata format uses.
pub trait CilIO: Sized {
    /// Fixed-size byte array holding the encoded value
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Decode a value from little-endian bytes
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_cil_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_cil_io!(
    u64 => 8,
    i64 => 8,
    u32 => 4,
    i32 => 4,
    u16 => 2,
    i16 => 2,
    u8 => 1,
    i8 => 1,
);

/// Safely reads a value of type `T` in little-endian byte order from the start of a buffer.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is shorter than `T`.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at `offset`, advancing the offset
/// by the size of `T` on success.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!());
    };

    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Reads a heap or table index whose width depends on the metadata header.
///
/// Metadata indexes are either 2 or 4 bytes wide. When `is_large` is set a `u32` is read,
/// otherwise a `u16` which is widened to `u32`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are not enough bytes left.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    let res = if is_large {
        read_le_at::<u32>(data, offset)?
    } else {
        u32::from(read_le_at::<u16>(data, offset)?)
    };

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_le_u8() {
        let result = read_le::<u8>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x01);
    }

    #[test]
    fn read_le_i8() {
        let result = read_le::<i8>(&[0xFF]).unwrap();
        assert_eq!(result, -1);
    }

    #[test]
    fn read_le_u16() {
        let result = read_le::<u16>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0201);
    }

    #[test]
    fn read_le_u32() {
        let result = read_le::<u32>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0403_0201);
    }

    #[test]
    fn read_le_u64() {
        let result = read_le::<u64>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0807_0605_0403_0201);
    }

    #[test]
    fn read_le_at_advances() {
        let mut offset = 2;
        let value = read_le_at::<u16>(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(value, 0x0403);
        assert_eq!(offset, 4);

        let value = read_le_at::<u32>(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(value, 0x0807_0605);
        assert_eq!(offset, 8);
    }

    #[test]
    fn read_le_at_dyn_widths() {
        let mut offset = 0;
        let small = read_le_at_dyn(&TEST_BUFFER, &mut offset, false).unwrap();
        assert_eq!(small, 0x0201);
        assert_eq!(offset, 2);

        let large = read_le_at_dyn(&TEST_BUFFER, &mut offset, true).unwrap();
        assert_eq!(large, 0x0605_0403);
        assert_eq!(offset, 6);
    }

    #[test]
    fn errors() {
        let buffer = [0xFF, 0xFF, 0xFF, 0xFF];

        let result = read_le::<u64>(&buffer);
        assert!(matches!(result, Err(Error::OutOfBounds { .. })));

        let mut offset = 3;
        let result = read_le_at::<u16>(&buffer, &mut offset);
        assert!(matches!(result, Err(Error::OutOfBounds { .. })));
        assert_eq!(offset, 3);

        let mut offset = usize::MAX;
        assert!(read_le_at::<u8>(&buffer, &mut offset).is_err());
    }
}
