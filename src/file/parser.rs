//! Low-level byte cursor for blob decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor over a single blob
//! taken from the metadata blob heap. Every decoder in the crate owns a private `Parser`, so
//! cursor state is never shared between decode calls.
//!
//! # Key Components
//!
//! ## Navigation Methods
//! - [`crate::file::parser::Parser::seek`] - Move to specific position
//! - [`crate::file::parser::Parser::advance_by`] - Move forward by specified bytes
//! - [`crate::file::parser::Parser::pos`] - Get current position
//! - [`crate::file::parser::Parser::remaining`] - Bytes left before the end of the blob
//!
//! ## Data Access Methods
//! - [`crate::file::parser::Parser::read_le`] - Read primitive types (little-endian)
//! - [`crate::file::parser::Parser::peek_byte`] - Peek at current byte without advancing
//! - [`crate::file::parser::Parser::read_bytes`] - Borrow a run of bytes from the blob
//!
//! ## Metadata Reading Methods
//! - [`crate::file::parser::Parser::read_compressed_uint`] - Read compressed unsigned integers
//! - [`crate::file::parser::Parser::read_compressed_int`] - Read compressed signed integers
//! - [`crate::file::parser::Parser::read_coded_index`] - Read a compressed coded token
//! - [`crate::file::parser::Parser::read_ser_string`] - Read a nullable serialized UTF-8 string
//!
//! # Usage Examples
//!
//! ```rust
//! use cilblob::Parser;
//!
//! // param count 3, then the coded token 0x49 (TypeRef row 18)
//! let data = [0x03, 0x49];
//! let mut parser = Parser::new(&data);
//!
//! let param_count = parser.read_compressed_uint()?;
//! let type_token = parser.read_type_def_or_ref()?;
//!
//! assert_eq!(param_count, 3);
//! assert_eq!(type_token.value(), 0x0100_0012);
//! # Ok::<(), cilblob::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, read_le_at, CilIO},
    metadata::{codedindex::CodedIndexType, token::Token},
    Result,
};

/// Marker byte of a null `SerString`.
pub const SER_STRING_NULL: u8 = 0xFF;

/// A bounds-checked cursor over a blob.
///
/// `Parser` reads fixed-width little-endian values and the compressed encodings of
/// ECMA-335 §II.23.2. Every read validates the remaining length first, so a truncated or
/// hostile blob produces [`crate::Error::OutOfBounds`] instead of an over-read.
///
/// # Examples
///
/// ```rust
/// use cilblob::Parser;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
/// let mut parser = Parser::new(&data);
///
/// let first = parser.read_le::<u32>()?;
/// assert_eq!(first, 0x04030201);
///
/// parser.seek(6)?;
/// let last_bytes = parser.read_le::<u16>()?;
/// assert_eq!(last_bytes, 0x0807);
/// # Ok::<(), cilblob::Error>(())
/// ```
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
    ///
    /// This is the "can I still read" check used before every optional trailing field.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cilblob::Parser;
    /// let data = [0x01];
    /// let mut parser = Parser::new(&data);
    /// assert!(parser.has_more_data());
    ///
    /// let _byte = parser.read_le::<u8>()?;
    /// assert!(!parser.has_more_data());
    /// # Ok::<(), cilblob::Error>(())
    /// ```
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Number of bytes between the cursor and the end of the blob.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Move the current position to the specified index.
    ///
    /// Seeking to `len()` is allowed and leaves the parser exhausted.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
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
        if step > self.remaining() {
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

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is at or beyond the data length.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.position)
            .copied()
            .ok_or(out_of_bounds_error!())
    }

    /// Read a value of type `T` in little-endian format and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading `T` would exceed the data length.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a value of type `T` in big-endian format and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading `T` would exceed the data length.
    pub fn read_be<T: CilIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Borrow the next `len` bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(out_of_bounds_error!());
        }

        let bytes = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    /// Read a compressed unsigned integer (ECMA-335 §II.23.2).
    ///
    /// The top bits of the lead byte select the width: `0xxxxxxx` is one byte, `10xxxxxx`
    /// two bytes and `110xxxxx` four bytes. Any other lead byte is rejected.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an invalid lead byte and
    /// [`crate::Error::OutOfBounds`] if the encoding is truncated.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cilblob::Parser;
    ///
    /// let mut parser = Parser::new(&[0x03, 0x80, 0x80, 0xC0, 0x00, 0x40, 0x00]);
    /// assert_eq!(parser.read_compressed_uint()?, 0x03);
    /// assert_eq!(parser.read_compressed_uint()?, 0x80);
    /// assert_eq!(parser.read_compressed_uint()?, 0x4000);
    /// # Ok::<(), cilblob::Error>(())
    /// ```
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.peek_byte()?;

        // 1-byte encoding: 0xxxxxxx
        if (first_byte & 0x80) == 0 {
            self.position += 1;
            return Ok(u32::from(first_byte));
        }

        // 2-byte encoding: 10xxxxxx xxxxxxxx
        if (first_byte & 0xC0) == 0x80 {
            let bytes = self.read_bytes(2)?;
            return Ok(((u32::from(bytes[0]) & 0x3F) << 8) | u32::from(bytes[1]));
        }

        // 4-byte encoding: 110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx
        if (first_byte & 0xE0) == 0xC0 {
            let bytes = self.read_bytes(4)?;
            return Ok(((u32::from(bytes[0]) & 0x1F) << 24)
                | (u32::from(bytes[1]) << 16)
                | (u32::from(bytes[2]) << 8)
                | u32::from(bytes[3]));
        }

        Err(malformed_error!(
            "Invalid compressed uint lead byte - 0x{:02X}",
            first_byte
        ))
    }

    /// Read a compressed signed integer (ECMA-335 §II.23.2).
    ///
    /// The width is selected exactly like [`Parser::read_compressed_uint`]. Bit 0 of the
    /// decoded payload carries the sign; the remaining bits are sign-extended from the
    /// payload width (6, 13 or 28 bits).
    ///
    /// # Errors
    /// Same as [`Parser::read_compressed_uint`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cilblob::Parser;
    ///
    /// let mut parser = Parser::new(&[0x06, 0x7B, 0x80, 0x01]);
    /// assert_eq!(parser.read_compressed_int()?, 3);
    /// assert_eq!(parser.read_compressed_int()?, -3);
    /// assert_eq!(parser.read_compressed_int()?, -8192);
    /// # Ok::<(), cilblob::Error>(())
    /// ```
    pub fn read_compressed_int(&mut self) -> Result<i32> {
        let start = self.position;
        let unsigned = self.read_compressed_uint()?;

        let sign_adjust: i32 = match self.position - start {
            1 => 0x40,
            2 => 0x2000,
            _ => 0x1000_0000,
        };

        #[allow(clippy::cast_possible_wrap)]
        let magnitude = (unsigned >> 1) as i32;
        if (unsigned & 1) == 0 {
            Ok(magnitude)
        } else {
            Ok(magnitude - sign_adjust)
        }
    }

    /// Read a compressed coded token and decode it against `kind`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the table selector does not name a table of
    /// this coded-index column, plus the errors of [`Parser::read_compressed_uint`].
    pub fn read_coded_index(&mut self, kind: CodedIndexType) -> Result<Token> {
        let coded = self.read_compressed_uint()?;
        kind.decode(coded).ok_or_else(|| {
            malformed_error!("Invalid {:?} coded token - 0x{:08X}", kind, coded)
        })
    }

    /// Read a `TypeDefOrRefOrSpecEncoded` token, the coded form used inside signatures.
    ///
    /// # Errors
    /// See [`Parser::read_coded_index`].
    pub fn read_type_def_or_ref(&mut self) -> Result<Token> {
        self.read_coded_index(CodedIndexType::TypeDefOrRef)
    }

    /// Read a `SerString`: `0xFF` for null, otherwise a compressed length and that many UTF-8 bytes.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; custom attribute strings written by
    /// obfuscators are frequently not valid UTF-8.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the length prefix or the string is truncated.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cilblob::Parser;
    ///
    /// let mut parser = Parser::new(&[0x02, b'h', b'i', 0xFF, 0x00]);
    /// assert_eq!(parser.read_ser_string()?, Some("hi".to_string()));
    /// assert_eq!(parser.read_ser_string()?, None);
    /// assert_eq!(parser.read_ser_string()?, Some(String::new()));
    /// # Ok::<(), cilblob::Error>(())
    /// ```
    pub fn read_ser_string(&mut self) -> Result<Option<String>> {
        if self.peek_byte()? == SER_STRING_NULL {
            self.position += 1;
            return Ok(None);
        }

        let length = self.read_compressed_uint()? as usize;
        let bytes = self.read_bytes(length)?;
        Ok(Some(String::from_utf8_lossy(bytes).into_owned()))
    }

    /// Read a compressed length followed by that many UTF-8 bytes, treating `0xFF` as an
    /// ordinary lead byte.
    ///
    /// Marshaling descriptors and security blobs encode their strings this way.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the length prefix or the string is truncated.
    pub fn read_prefixed_string_utf8(&mut self) -> Result<String> {
        let length = self.read_compressed_uint()? as usize;
        let bytes = self.read_bytes(length)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_read_compressed_uint() {
        let test_cases = vec![
            (vec![0x03], 3),
            (vec![0x7F], 0x7F),
            (vec![0x80, 0x80], 0x80),
            (vec![0xAE, 0x57], 0x2E57),
            (vec![0xBF, 0xFF], 0x3FFF),
            (vec![0xC0, 0x00, 0x40, 0x00], 0x4000),
            (vec![0xDF, 0xFF, 0xFF, 0xFF], 0x1FFF_FFFF),
        ];

        for (input, expected) in test_cases {
            let mut parser = Parser::new(&input);
            let result = parser.read_compressed_uint().unwrap();
            assert_eq!(result, expected);
            assert_eq!(parser.pos(), input.len());
        }
    }

    #[test]
    fn test_read_compressed_uint_invalid_lead() {
        for lead in [0xE0u8, 0xF0, 0xFF] {
            let data = [lead, 0x00, 0x00, 0x00];
            let mut parser = Parser::new(&data);
            assert!(matches!(
                parser.read_compressed_uint(),
                Err(Error::Malformed { .. })
            ));
        }
    }

    #[test]
    fn test_read_compressed_uint_truncated() {
        let truncated: [&[u8]; 4] = [&[], &[0x80], &[0xC0, 0x00], &[0xC0, 0x00, 0x00]];
        for input in truncated {
            let mut parser = Parser::new(input);
            assert!(matches!(
                parser.read_compressed_uint(),
                Err(Error::OutOfBounds)
            ));
            // Position must not move past the lead byte on failure
            assert_eq!(parser.pos(), 0);
        }
    }

    #[test]
    fn test_read_compressed_int() {
        let test_cases = vec![
            (vec![0x06], 3),
            (vec![0x7B], -3),
            (vec![0x80, 0x80], 64),
            (vec![0x01], -64),
            (vec![0xC0, 0x00, 0x40, 0x00], 8192),
            (vec![0x80, 0x01], -8192),
            (vec![0xDF, 0xFF, 0xFF, 0xFE], 268_435_455),
            (vec![0xC0, 0x00, 0x00, 0x01], -268_435_456),
        ];

        for (input, expected) in test_cases {
            let mut parser = Parser::new(&input);
            assert_eq!(parser.read_compressed_int().unwrap(), expected);
        }
    }

    #[test]
    fn test_read_type_def_or_ref() {
        let test_cases = vec![
            (vec![0x08], Token::new(0x0200_0002)), // TypeDef row 2
            (vec![0x49], Token::new(0x0100_0012)), // TypeRef row 18
            (vec![0x06], Token::new(0x1B00_0001)), // TypeSpec row 1
        ];

        for (input, expected) in test_cases {
            let mut parser = Parser::new(&input);
            assert_eq!(parser.read_type_def_or_ref().unwrap(), expected);
        }
    }

    #[test]
    fn test_read_type_def_or_ref_invalid_selector() {
        // Selector 3 is unused in TypeDefOrRef
        let mut parser = Parser::new(&[0x07]);
        assert!(matches!(
            parser.read_type_def_or_ref(),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_read_ser_string() {
        let data = [
            0x05, b'h', b'e', b'l', b'l', b'o', // "hello"
            0xFF, // null
            0x00, // ""
            0x02, 0xC3, 0x28, // invalid UTF-8
        ];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_ser_string().unwrap().as_deref(), Some("hello"));
        assert_eq!(parser.read_ser_string().unwrap(), None);
        assert_eq!(parser.read_ser_string().unwrap().as_deref(), Some(""));
        assert_eq!(
            parser.read_ser_string().unwrap().as_deref(),
            Some("\u{FFFD}(")
        );
        assert!(!parser.has_more_data());
    }

    #[test]
    fn test_read_ser_string_truncated() {
        let mut parser = Parser::new(&[0x05, b'h', b'i']);
        assert!(matches!(parser.read_ser_string(), Err(Error::OutOfBounds)));
    }

    #[test]
    fn test_navigation() {
        let data = [0x01, 0x02, 0x03];
        let mut parser = Parser::new(&data);

        parser.advance_by(2).unwrap();
        assert_eq!(parser.remaining(), 1);
        assert!(parser.advance_by(2).is_err());
        parser.seek(3).unwrap();
        assert!(!parser.has_more_data());
        assert!(parser.seek(4).is_err());
        assert!(matches!(parser.peek_byte(), Err(Error::OutOfBounds)));
    }
}
