//! Method and type signature parsing for .NET metadata.
//!
//! This module decodes the signature blobs of ECMA-335 §II.23.2 into trees of shared
//! [`TypeSig`] nodes. Signatures encode type information, method parameters, generic
//! instantiations and calling conventions in a compact, recursive binary format.
//!
//! # Signature Types
//!
//! - **Method Signatures** - Parameter types, return types, vararg tails and calling conventions
//! - **Field Signatures** - Field type information and modifiers
//! - **Property Signatures** - Property type and indexer parameters
//! - **LocalVar Signatures** - Local variable types within method bodies
//! - **MethodSpec Signatures** - Generic method instantiations
//! - **TypeSpec Signatures** - Constructed types referenced from the `TypeSpec` table
//!
//! # Failure Policy
//!
//! The `parse_*` functions return the error that stopped them. [`read_signature`] and
//! [`read_type_sig`] are the fail-soft entry points used while loading a module: a signature
//! that cannot be decoded is absent, never partially built.
//!
//! # Examples
//!
//! ```rust
//! use cilblob::metadata::{context::ModuleContext, signatures::parse_method_signature};
//!
//! let ctx = ModuleContext::default();
//! // instance void (string)
//! let method_sig = parse_method_signature(&[0x20, 0x01, 0x01, 0x0E], &ctx)?;
//! assert_eq!(method_sig.to_string(), "instance System.Void(System.String)");
//! # Ok::<(), cilblob::Error>(())
//! ```
//!
//! ```rust
//! use cilblob::metadata::{context::ModuleContext, signatures::parse_local_var_signature};
//!
//! let ctx = ModuleContext::default();
//! // 2 locals: int32, string
//! let locals_sig = parse_local_var_signature(&[0x07, 0x02, 0x08, 0x0E], &ctx)?;
//!
//! for (i, local_type) in locals_sig.locals.iter().enumerate() {
//!     println!("Local {}: {}", i, local_type);
//! }
//! # Ok::<(), cilblob::Error>(())
//! ```
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 23.2 - Blobs and Signatures

mod generics;
mod parser;
mod types;

pub use generics::GenericArguments;
pub use parser::SignatureParser;
pub use types::*;

use crate::{
    metadata::{context::ModuleContext, streams::Blob},
    Result,
};

/// Parse any signature, dispatching on its calling convention
///
/// # Errors
/// Returns an error if the signature data is malformed or parsing fails
pub fn parse_signature(data: &[u8], context: &ModuleContext) -> Result<CallingConventionSig> {
    SignatureParser::new(data, context).parse_signature()
}

/// Parse a `MethodSig` from a byte slice
///
/// # Errors
/// Returns an error if the signature data is malformed or parsing fails
pub fn parse_method_signature(data: &[u8], context: &ModuleContext) -> Result<MethodSig> {
    SignatureParser::new(data, context).parse_method_signature()
}

/// Parse a `FieldSig` from a byte slice
///
/// # Errors
/// Returns an error if the signature data is malformed or parsing fails
pub fn parse_field_signature(data: &[u8], context: &ModuleContext) -> Result<FieldSig> {
    SignatureParser::new(data, context).parse_field_signature()
}

/// Parse a property signature from a byte slice
///
/// # Errors
/// Returns an error if the signature data is malformed or parsing fails
pub fn parse_property_signature(data: &[u8], context: &ModuleContext) -> Result<MethodSig> {
    SignatureParser::new(data, context).parse_property_signature()
}

/// Parse a `LocalSig` from a byte slice
///
/// # Errors
/// Returns an error if the signature data is malformed or parsing fails
pub fn parse_local_var_signature(data: &[u8], context: &ModuleContext) -> Result<LocalSig> {
    SignatureParser::new(data, context).parse_local_var_signature()
}

/// Parse a `TypeSpec` from a byte slice
///
/// # Errors
/// Returns an error if the signature data is malformed or parsing fails
pub fn parse_type_spec_signature(data: &[u8], context: &ModuleContext) -> Result<TypeSigRc> {
    SignatureParser::new(data, context).parse_type_spec_signature()
}

/// Parse a `MethodSpec` instantiation from a byte slice
///
/// # Errors
/// Returns an error if the signature data is malformed or parsing fails
pub fn parse_method_spec_signature(
    data: &[u8],
    context: &ModuleContext,
) -> Result<GenericInstMethodSig> {
    SignatureParser::new(data, context).parse_method_spec_signature()
}

/// Decodes the signature stored at `offset` of the blob heap.
///
/// Returns `None` when the offset is invalid or the signature is malformed, unsupported or
/// nested too deep.
#[must_use]
pub fn read_signature(
    blob: &Blob<'_>,
    offset: usize,
    context: &ModuleContext,
) -> Option<CallingConventionSig> {
    let decoded = blob
        .get(offset)
        .and_then(|data| parse_signature(data, context));

    match decoded {
        Ok(sig) => Some(sig),
        Err(error) => {
            log::debug!("Signature at blob offset 0x{offset:X} not decoded: {error}");
            None
        }
    }
}

/// Decodes the `TypeSpec` stored at `offset` of the blob heap.
///
/// Returns `None` when the offset is invalid or the type is malformed.
#[must_use]
pub fn read_type_sig(blob: &Blob<'_>, offset: usize, context: &ModuleContext) -> Option<TypeSigRc> {
    let decoded = blob
        .get(offset)
        .and_then(|data| parse_type_spec_signature(data, context));

    match decoded {
        Ok(sig) => Some(sig),
        Err(error) => {
            log::debug!("TypeSpec at blob offset 0x{offset:X} not decoded: {error}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_from_heap() {
        let ctx = ModuleContext::default();
        let heap = [
            0x00, // empty blob
            0x04, 0x20, 0x01, 0x01, 0x0E, // instance void (string)
            0x02, 0x1D, 0x08, // int32[]
            0x02, 0x1D, 0x99, // unknown element type
        ];
        let blob = Blob::from(&heap).unwrap();

        let sig = read_signature(&blob, 1, &ctx).unwrap();
        assert!(sig.calling_convention().has_this());

        let ty = read_type_sig(&blob, 6, &ctx).unwrap();
        assert_eq!(ty.to_string(), "System.Int32[]");

        assert!(read_type_sig(&blob, 9, &ctx).is_none());
        assert!(read_signature(&blob, 0, &ctx).is_none());
        assert!(read_signature(&blob, 0x1000, &ctx).is_none());
    }
}
