//! Blob decoding for .NET metadata.
//!
//! Everything in this module works on slices of the `#Blob` heap. The heap itself and the
//! metadata tables are owned by the caller; the decoders only need the bytes and a
//! [`context::ModuleContext`] describing the module they belong to.
//!
//! # Key Components
//!
//! - [`token`], [`codedindex`] - Metadata tokens and the coded-index encodings of them
//! - [`streams`] - The `#Blob` heap cursor keyed by heap offset
//! - [`typesystem`] - Element type constants, corlib primitives, type references
//! - [`context`] - Resolver trait, decoder options and the per-module context
//! - [`signatures`] - Signature data model, parser and generic instantiation
//! - [`customattributes`] - Custom attribute blobs
//! - [`marshalling`] - Native marshaling descriptors
//! - [`security`] - Declarative security permission sets
//! - [`decoded`] - The fail-soft decode outcome
//!
//! # Examples
//!
//! ```rust
//! use cilblob::metadata::{context::ModuleContext, signatures::read_type_sig, streams::Blob};
//!
//! // Heap with one TypeSpec blob: int32[]
//! let heap = [0x00, 0x02, 0x1D, 0x08];
//! let blob = Blob::from(&heap)?;
//!
//! let sig = read_type_sig(&blob, 1, &ModuleContext::default()).unwrap();
//! assert_eq!(sig.to_string(), "System.Int32[]");
//! # Ok::<(), cilblob::Error>(())
//! ```

pub mod codedindex;
pub mod context;
pub mod customattributes;
pub mod decoded;
pub mod marshalling;
pub mod security;
pub mod signatures;
pub mod streams;
pub mod token;
pub mod typesystem;
