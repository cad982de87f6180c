use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

/// The generic Error type, which provides coverage for all errors the blob decoders can
/// produce internally.
///
/// The public fail-soft entry points never hand these errors to callers directly: a failed
/// signature decode becomes `None`, and a failed custom attribute, marshaling or security
/// decode becomes a raw-bytes fallback. The error values are still surfaced through
/// [`crate::metadata::decoded::Decoded`] and the lower level `parse_*` functions, so tooling
/// can report why a blob was not decoded.
///
/// # Error Categories
///
/// ## Structural Errors
/// - [`Error::Malformed`] - Bad prolog, unknown tag, invalid table selector or integer encoding
/// - [`Error::OutOfBounds`] - Attempted to read past the end of the blob
/// - [`Error::NotSupported`] - Encoding the decoder deliberately refuses (e.g. unmanaged calling conventions)
///
/// ## Resource Limits
/// - [`Error::RecursionLimit`] - Nesting depth ceiling was hit
///
/// ## Resolution Errors
/// - [`Error::Unresolved`] - A coded token or serialized type name could not be resolved
///
/// # Examples
///
/// ```rust
/// use cilblob::{Error, Parser};
///
/// // 0xE0 is not a valid lead byte for a compressed integer
/// let mut parser = Parser::new(&[0xE0, 0x00, 0x00, 0x00]);
/// match parser.read_compressed_uint() {
///     Err(Error::Malformed { message, .. }) => println!("rejected: {message}"),
///     other => panic!("unexpected result: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The blob is damaged and could not be decoded.
    ///
    /// Covers every structural violation: an invalid custom attribute prolog, an unknown
    /// element or serialization tag, an invalid coded-token table selector or an integer
    /// encoding that does not fit the format. The error includes the source location where
    /// the malformation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while decoding a blob.
    ///
    /// Raised before any byte past the declared end of the blob is touched.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This encoding is not supported.
    ///
    /// Used for shapes the decoder recognises but deliberately refuses, such as the
    /// `Unmanaged` and `NativeVarArg` calling conventions.
    #[error("This encoding is not supported")]
    NotSupported,

    /// Recursion limit reached.
    ///
    /// Every recursive decode path shares a bounded depth counter. This error indicates
    /// the ceiling was hit and the enclosing decode was aborted instead of recursing further.
    ///
    /// The associated value shows the recursion limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// A reference could not be resolved.
    ///
    /// Raised when a type name or coded token that the decode cannot do without fails to
    /// resolve, for example the `System.Type` argument of a custom attribute.
    #[error("Failed to resolve - {0}")]
    Unresolved(String),
}
