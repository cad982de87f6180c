// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! # cilblob
//!
//! Decoders for the binary blobs of .NET (ECMA-335) metadata: type signatures, custom
//! attribute arguments, native marshaling descriptors and declarative security permission
//! sets.
//!
//! Blob data is fully attacker controlled when analysing arbitrary or obfuscated
//! assemblies. Every read is bounds checked, every recursive path shares a depth counter
//! with a ceiling of 100, and no decode ever panics. A blob that does not decode degrades
//! gracefully instead of failing the module:
//!
//! - signatures become `None`
//! - custom attributes keep their raw bytes ([`metadata::decoded::Decoded`])
//! - marshaling descriptors become [`metadata::marshalling::MarshalType::RawBlob`]
//! - permission sets become an empty attribute list
//!
//! ## Module context
//!
//! Blob decoding needs a few answers only the owning module can give: which type a coded
//! token refers to, the underlying type of an enum, how to parse a serialized type name.
//! These come from a [`metadata::context::TypeResolver`] implementation, bundled with the
//! corlib primitive singletons and the [`metadata::context::DecoderOptions`] in a
//! [`metadata::context::ModuleContext`]. One context per module; it is `Send + Sync` and
//! independent blobs can be decoded from many threads at once.
//!
//! ## Quick Start
//!
//! ```rust
//! use cilblob::prelude::*;
//!
//! let context = ModuleContext::default();
//!
//! // static string Format(string, object[])
//! let method = parse_method_signature(&[0x00, 0x02, 0x0E, 0x0E, 0x1D, 0x1C], &context)?;
//! assert_eq!(method.params.len(), 2);
//! assert_eq!(method.params[1].to_string(), "System.Object[]");
//! # Ok::<(), cilblob::Error>(())
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and installs no logger. Fail-soft fallbacks are
//! reported at `debug`, a rejected enum guess and unrecognised legacy XML at `warn`.

#![doc(html_no_source)]
#![deny(missing_docs)]

#[macro_use]
pub(crate) mod error;

/// Byte-level cursor and integer codecs
pub mod file;

/// ECMA-335 metadata blob decoders
///
/// # Key Components
///
/// - [`metadata::signatures`] - Type, method, field, property and local signatures
/// - [`metadata::customattributes`] - Custom attribute argument blobs
/// - [`metadata::marshalling`] - Native marshaling descriptors
/// - [`metadata::security`] - Declarative security permission sets
/// - [`metadata::context`] - Module context the decoders resolve through
pub mod metadata;

/// Convenient re-exports of the most commonly used types and functions.
///
/// # Example
///
/// ```rust
/// use cilblob::prelude::*;
///
/// let context = ModuleContext::default();
/// let field = parse_field_signature(&[0x06, 0x08], &context)?;
/// assert_eq!(field.field_type.corlib_type(), Some(CorLibType::I4));
/// # Ok::<(), cilblob::Error>(())
/// ```
pub mod prelude;

/// Recursion guard shared by the decoders
pub mod utils;

/// `cilblob` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `cilblob` Error type
///
/// # Examples
///
/// ```rust
/// use cilblob::{metadata::signatures::parse_type_spec_signature, metadata::context::ModuleContext, Error};
///
/// match parse_type_spec_signature(&[0x0F], &ModuleContext::default()) {
///     Ok(_) => println!("decoded"),
///     Err(Error::OutOfBounds) => println!("truncated"),
///     Err(Error::Malformed { message, .. }) => println!("Malformed: {}", message),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

/// Byte cursor used by every decoder
pub use file::parser::Parser;

/// Metadata token (table byte and row id)
pub use metadata::token::Token;
