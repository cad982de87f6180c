//! Custom attribute parsing and representation for .NET metadata.
//!
//! This module decodes .NET custom attribute blobs according to ECMA-335 II.23.3. A blob
//! holds the values passed to the attribute constructor followed by named field and property
//! assignments.
//!
//! # Custom Attribute Format
//!
//! - **Prolog** - Standard 0x0001 marker indicating a valid custom attribute blob
//! - **Fixed Arguments** - Constructor parameter values in declaration order
//! - **Named Arguments** - Field and property values with name/value pairs
//!
//! # Failure Policy
//!
//! A custom attribute never blocks module loading. [`decode_custom_attribute`] keeps the
//! constructor of an attribute whose blob cannot be decoded and retains the blob's bytes.
//!
//! # Examples
//!
//! ```rust
//! use cilblob::metadata::{
//!     context::ModuleContext,
//!     customattributes::{decode_custom_attribute, AttributeCtor},
//!     signatures::parse_method_signature,
//!     streams::Blob,
//!     token::Token,
//! };
//!
//! let ctx = ModuleContext::default();
//! // instance void .ctor(int32)
//! let signature = parse_method_signature(&[0x20, 0x01, 0x01, 0x08], &ctx)?;
//! let ctor = AttributeCtor::new(Token::new(0x0A00_0001), signature);
//!
//! let heap = [0x00, 0x06, 0x01, 0x00, 0x2A, 0x00, 0x00, 0x00];
//! let blob = Blob::from(&heap)?;
//!
//! let attribute = decode_custom_attribute(&blob, 1, &ctor, &ctx);
//! println!("{}", attribute.fixed_args()[0]);
//! # Ok::<(), cilblob::Error>(())
//! ```
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 23.3 - Custom Attributes

mod parser;
mod types;

pub use parser::{
    decode_custom_attribute, decode_custom_attributes_parallel, parse_custom_attribute_data,
    CustomAttributeParser,
};
pub use types::*;
