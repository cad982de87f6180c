//! The `#Blob` heap.
//!
//! Blobs are stored back to back, each prefixed by its compressed length. Every decoder in
//! this crate is keyed by a heap offset: it asks [`Blob::get`] for the bytes at that offset
//! and then reads them through a private [`crate::Parser`].
//!
//! # Examples
//!
//! ```rust
//! use cilblob::metadata::streams::Blob;
//!
//! // null blob at 0, then a 3 byte blob at offset 1
//! let heap = [0x00, 0x03, 0x06, 0x08, 0x0E];
//! let blob = Blob::from(&heap)?;
//! assert_eq!(blob.get(1)?, &[0x06, 0x08, 0x0E]);
//! # Ok::<(), cilblob::Error>(())
//! ```

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// A read-only view of the `#Blob` heap.
pub struct Blob<'a> {
    data: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Create a blob heap view. The heap must start with the empty blob (a single `0x00`).
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the data is empty or does not start with `0x00`.
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!("Invalid memory for #Blob heap"));
        }

        Ok(Blob { data })
    }

    /// Size of the heap in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the heap holds only the mandatory empty blob.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() <= 1
    }

    /// Get the blob stored at heap offset `index`, without its length prefix.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the offset or the declared length points
    /// past the end of the heap, and [`crate::Error::Malformed`] for an invalid length prefix.
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        let Some(tail) = self.data.get(index..) else {
            return Err(OutOfBounds);
        };

        let mut parser = Parser::new(tail);
        let len = parser.read_compressed_uint()? as usize;
        parser.read_bytes(len)
    }
}
