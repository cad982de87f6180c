//! Metadata tokens.
//!
//! A token packs a table id into its top byte and a 1-based row id into the low 24 bits.
//! Blob decoders produce tokens when they decode coded indexes; resolving a token to an
//! entity is the job of a [`crate::metadata::context::TypeResolver`].

use std::fmt;

use crate::metadata::codedindex::TableId;

/// A metadata token (`table << 24 | row`).
///
/// # Examples
///
/// ```rust
/// use cilblob::{metadata::codedindex::TableId, Token};
///
/// let token = Token::from_parts(TableId::TypeRef, 18);
/// assert_eq!(token.value(), 0x0100_0012);
/// assert_eq!(token.table(), 0x01);
/// assert_eq!(token.row(), 18);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Create a token from its raw 32-bit value.
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Create a token from a table and a row id. Row ids above 24 bits are truncated.
    #[must_use]
    pub fn from_parts(table: TableId, row: u32) -> Self {
        Token((u32::from(table as u8) << 24) | (row & 0x00FF_FFFF))
    }

    /// The raw 32-bit token value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// The table id stored in the top byte.
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The row id stored in the low 24 bits.
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// A null token refers to no row at all.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.row() == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_parts() {
        let token = Token::new(0x1B00_0004);
        assert_eq!(token.table(), TableId::TypeSpec as u8);
        assert_eq!(token.row(), 4);
        assert_eq!(Token::from_parts(TableId::TypeSpec, 4), token);
    }

    #[test]
    fn test_token_is_null() {
        assert!(Token::new(0).is_null());
        assert!(Token::from_parts(TableId::TypeDef, 0).is_null());
        assert!(!Token::from_parts(TableId::TypeDef, 1).is_null());
    }

    #[test]
    fn test_token_formatting() {
        let token = Token::new(0x0200_0005);
        assert_eq!(format!("{token}"), "0x02000005");
        assert_eq!(
            format!("{token:?}"),
            "Token(0x02000005, table: 0x02, row: 5)"
        );
    }
}
