//! Fixed-width and compressed integer primitives for blob decoding.
//!
//! This module holds the lowest layer of the codec: the [`CilIO`] trait that turns byte
//! arrays into numeric values, the bounds-checked [`read_le_at`] / [`read_be_at`] helpers
//! that every [`crate::Parser`] read goes through, and the ECMA-335 §II.23.2 compressed
//! integer encoders.
//!
//! The encoders are the inverse of [`crate::Parser::read_compressed_uint`] and
//! [`crate::Parser::read_compressed_int`]. They always emit the minimal-width form, which
//! is the only form the CLR itself produces.
//!
//! # Examples
//!
//! ```rust
//! use cilblob::{file::io::write_compressed_uint, Parser};
//!
//! let mut encoded = Vec::new();
//! write_compressed_uint(0x3FFF, &mut encoded)?;
//! assert_eq!(encoded, [0xBF, 0xFF]);
//!
//! let mut parser = Parser::new(&encoded);
//! assert_eq!(parser.read_compressed_uint()?, 0x3FFF);
//! # Ok::<(), cilblob::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// Largest value representable by a compressed unsigned integer.
pub const MAX_COMPRESSED_UINT: u32 = 0x1FFF_FFFF;

/// Smallest value representable by a compressed signed integer.
pub const MIN_COMPRESSED_INT: i32 = -0x1000_0000;

/// Largest value representable by a compressed signed integer.
pub const MAX_COMPRESSED_INT: i32 = 0x0FFF_FFFF;

/// Trait for types that can be read from a little- or big-endian byte buffer.
///
/// Each implementation defines a `Bytes` associated type holding the fixed-size byte array
/// of that numeric type (e.g. `[u8; 4]` for `u32`).
pub trait CilIO: Sized {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_cil_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }
            }
        )*
    };
}

impl_cil_io!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Safely reads a value of type `T` in little-endian byte order from a data buffer.
///
/// The offset is advanced by `size_of::<T>()` on success and left untouched on failure.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
///
/// # Examples
///
/// ```rust
/// use cilblob::file::io::read_le_at;
///
/// let data = [0x01, 0x00, 0x02, 0x00];
/// let mut offset = 0;
///
/// let first: u16 = read_le_at(&data, &mut offset)?;
/// assert_eq!(first, 1);
/// assert_eq!(offset, 2);
/// # Ok::<(), cilblob::Error>(())
/// ```
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let bytes = take_at::<T>(data, offset)?;
    Ok(T::from_le_bytes(bytes))
}

/// Safely reads a value of type `T` in big-endian byte order from a data buffer.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_be_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let bytes = take_at::<T>(data, offset)?;
    Ok(T::from_be_bytes(bytes))
}

fn take_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T::Bytes> {
    let type_len = std::mem::size_of::<T>();
    let end = offset.checked_add(type_len).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;
    Ok(read)
}

/// Appends the minimal-width compressed encoding of `value` to `out`.
///
/// | Range | Width | Layout |
/// |---|---|---|
/// | `0x00..=0x7F` | 1 | `0xxxxxxx` |
/// | `0x80..=0x3FFF` | 2 | `10xxxxxx xxxxxxxx` |
/// | `0x4000..=0x1FFF_FFFF` | 4 | `110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx` |
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if `value` exceeds [`MAX_COMPRESSED_UINT`].
pub fn write_compressed_uint(value: u32, out: &mut Vec<u8>) -> Result<()> {
    let width = match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=MAX_COMPRESSED_UINT => 4,
        _ => {
            return Err(malformed_error!(
                "Value 0x{:08X} is too large for a compressed uint",
                value
            ))
        }
    };

    push_compressed(value, width, out);
    Ok(())
}

/// Appends the minimal-width compressed encoding of a signed `value` to `out`.
///
/// The magnitude is rotated left by one bit so the sign lands in bit 0, then truncated to
/// the 7, 14 or 29 bit payload of the chosen width.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if `value` is outside
/// [`MIN_COMPRESSED_INT`]`..=`[`MAX_COMPRESSED_INT`].
pub fn write_compressed_int(value: i32, out: &mut Vec<u8>) -> Result<()> {
    #[allow(clippy::cast_sign_loss)]
    let (payload, width) = match value {
        -0x40..=0x3F => ((value as u32) & 0x3F, 1),
        -0x2000..=0x1FFF => ((value as u32) & 0x1FFF, 2),
        MIN_COMPRESSED_INT..=MAX_COMPRESSED_INT => ((value as u32) & 0x0FFF_FFFF, 4),
        _ => {
            return Err(malformed_error!(
                "Value {} is out of range for a compressed int",
                value
            ))
        }
    };

    // The width is fixed by the signed range, not by the rotated payload
    push_compressed((payload << 1) | u32::from(value < 0), width, out);
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn push_compressed(encoded: u32, width: usize, out: &mut Vec<u8>) {
    match width {
        1 => out.push(encoded as u8),
        2 => {
            out.push(0x80 | (encoded >> 8) as u8);
            out.push(encoded as u8);
        }
        _ => {
            out.push(0xC0 | (encoded >> 24) as u8);
            out.push((encoded >> 16) as u8);
            out.push((encoded >> 8) as u8);
            out.push(encoded as u8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Parser};

    #[test]
    fn read_le_at_advances() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut offset = 0;

        assert_eq!(read_le_at::<u32>(&data, &mut offset).unwrap(), 0x0403_0201);
        assert_eq!(offset, 4);
        assert!(matches!(
            read_le_at::<u16>(&data, &mut offset),
            Err(Error::OutOfBounds)
        ));
        assert_eq!(offset, 4);
    }

    #[test]
    fn read_be_at_order() {
        let data = [0x01, 0x02];
        let mut offset = 0;
        assert_eq!(read_be_at::<u16>(&data, &mut offset).unwrap(), 0x0102);
    }

    #[test]
    fn read_at_offset_overflow() {
        let data = [0x00; 4];
        let mut offset = usize::MAX;
        assert!(matches!(
            read_le_at::<u32>(&data, &mut offset),
            Err(Error::OutOfBounds)
        ));
    }

    #[test]
    fn compressed_uint_widths() {
        let cases: &[(u32, &[u8])] = &[
            (0x03, &[0x03]),
            (0x7F, &[0x7F]),
            (0x80, &[0x80, 0x80]),
            (0x2E57, &[0xAE, 0x57]),
            (0x3FFF, &[0xBF, 0xFF]),
            (0x4000, &[0xC0, 0x00, 0x40, 0x00]),
            (0x1FFF_FFFF, &[0xDF, 0xFF, 0xFF, 0xFF]),
        ];

        for (value, expected) in cases {
            let mut out = Vec::new();
            write_compressed_uint(*value, &mut out).unwrap();
            assert_eq!(&out, expected, "encoding of 0x{value:X}");
        }
    }

    #[test]
    fn compressed_uint_too_large() {
        let mut out = Vec::new();
        assert!(write_compressed_uint(0x2000_0000, &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn compressed_int_ecma_examples() {
        // ECMA-335 II.23.2 worked examples
        let cases: &[(i32, &[u8])] = &[
            (3, &[0x06]),
            (-3, &[0x7B]),
            (64, &[0x80, 0x80]),
            (-64, &[0x01]),
            (8192, &[0xC0, 0x00, 0x40, 0x00]),
            (-8192, &[0x80, 0x01]),
            (268_435_455, &[0xDF, 0xFF, 0xFF, 0xFE]),
            (-268_435_456, &[0xC0, 0x00, 0x00, 0x01]),
        ];

        for (value, expected) in cases {
            let mut out = Vec::new();
            write_compressed_int(*value, &mut out).unwrap();
            assert_eq!(&out, expected, "encoding of {value}");
        }
    }

    #[test]
    fn compressed_uint_sampled_roundtrip() {
        let mut value = 0u32;
        while value <= MAX_COMPRESSED_UINT {
            let mut out = Vec::new();
            write_compressed_uint(value, &mut out).unwrap();
            let mut parser = Parser::new(&out);
            assert_eq!(parser.read_compressed_uint().unwrap(), value);
            assert!(!parser.has_more_data());

            value = if value < 0x5000 { value + 1 } else { value + 0x1F3 };
        }
    }

    #[test]
    fn compressed_int_sampled_roundtrip() {
        let mut value = MIN_COMPRESSED_INT;
        while value <= MAX_COMPRESSED_INT {
            let mut out = Vec::new();
            write_compressed_int(value, &mut out).unwrap();
            let mut parser = Parser::new(&out);
            assert_eq!(parser.read_compressed_int().unwrap(), value);

            value = if (-0x3000..0x3000).contains(&value) {
                value + 1
            } else {
                value + 0x2F1
            };
        }
    }
}
