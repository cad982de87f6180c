//! Outcome of a fail-soft blob decode.
//!
//! Custom attribute, marshaling and security blobs are decoded as an optimization over
//! keeping their bytes. [`Decoded`] makes the three possible outcomes explicit instead of
//! hiding the fallback behind a swallowed error.

use crate::Error;

/// Result of decoding a blob that has a raw-bytes fallback.
#[derive(Debug)]
pub enum Decoded<T> {
    /// The blob was decoded
    Value(T),
    /// The blob could not be decoded; its bytes are kept untouched
    RawFallback(Vec<u8>),
    /// Not even the raw bytes could be retrieved, e.g. the heap offset is invalid
    Fatal(Error),
}

impl<T> Decoded<T> {
    /// Converts a decode result, falling back to `raw` on error.
    ///
    /// `what` and `offset` only feed the debug log.
    pub fn from_result(result: crate::Result<T>, raw: &[u8], what: &str, offset: usize) -> Self {
        match result {
            Ok(value) => Decoded::Value(value),
            Err(error) => {
                log::debug!("{what} at blob offset 0x{offset:X} kept as raw bytes: {error}");
                Decoded::RawFallback(raw.to_vec())
            }
        }
    }

    /// Returns true if the blob was decoded
    #[must_use]
    pub fn is_value(&self) -> bool {
        matches!(self, Decoded::Value(_))
    }

    /// Returns true if only the raw bytes are available
    #[must_use]
    pub fn is_raw(&self) -> bool {
        matches!(self, Decoded::RawFallback(_))
    }

    /// The decoded value, if any
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Decoded::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The retained raw bytes, if the decode fell back
    #[must_use]
    pub fn raw(&self) -> Option<&[u8]> {
        match self {
            Decoded::RawFallback(raw) => Some(raw),
            _ => None,
        }
    }

    /// Consumes `self`, returning the decoded value
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Decoded::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Maps the decoded value, leaving the fallbacks as they are
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        match self {
            Decoded::Value(value) => Decoded::Value(f(value)),
            Decoded::RawFallback(raw) => Decoded::RawFallback(raw),
            Decoded::Fatal(error) => Decoded::Fatal(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_keeps_bytes() {
        let raw = [0x01, 0x00, 0xFF];
        let decoded: Decoded<u32> =
            Decoded::from_result(Err(Error::OutOfBounds), &raw, "Test blob", 0x10);
        assert!(decoded.is_raw());
        assert_eq!(decoded.raw(), Some(&raw[..]));
        assert!(decoded.value().is_none());
    }

    #[test]
    fn value_and_map() {
        let decoded = Decoded::from_result(Ok(21u32), &[], "Test blob", 0).map(|v| v * 2);
        assert!(decoded.is_value());
        assert_eq!(decoded.into_value(), Some(42));

        let fatal: Decoded<u32> = Decoded::Fatal(Error::NotSupported);
        assert!(!fatal.is_value() && !fatal.is_raw());
        assert!(matches!(fatal.map(|v| v + 1), Decoded::Fatal(Error::NotSupported)));
    }
}
