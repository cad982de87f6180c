//! # cilblob Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and functions
//! of the cilblob library. Import this module to get quick access to the decoders and the
//! types they produce.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cilblob operations
pub use crate::Error;

/// The result type used throughout cilblob
pub use crate::Result;

/// Low-level byte cursor
pub use crate::Parser;

/// Metadata tokens
pub use crate::metadata::token::Token;

// ================================================================================================
// Module Context
// ================================================================================================

/// Resolution services and configuration for one module
pub use crate::metadata::context::{
    DecoderOptions, EnumResolution, GenericParamContext, ModuleContext, NullResolver,
    TypeNameSearch, TypeResolver,
};

/// Blob heap access
pub use crate::metadata::streams::Blob;

/// Corlib primitives and type references
pub use crate::metadata::typesystem::{
    CorLibType, CorLibTypes, TypeNameParser, TypeRef, TypeRefRc,
};

// ================================================================================================
// Signatures
// ================================================================================================

/// Signature data model
pub use crate::metadata::signatures::{
    CallingConvention, CallingConventionSig, FieldSig, GenericArguments, LocalSig, MethodSig,
    TypeSig, TypeSigRc,
};

/// Signature entry points
pub use crate::metadata::signatures::{
    parse_field_signature, parse_local_var_signature, parse_method_signature,
    parse_method_spec_signature, parse_property_signature, parse_signature,
    parse_type_spec_signature, read_signature, read_type_sig, SignatureParser,
};

// ================================================================================================
// Custom Attributes, Marshaling, Security
// ================================================================================================

/// Custom attribute model and decoders
pub use crate::metadata::customattributes::{
    decode_custom_attribute, decode_custom_attributes_parallel, parse_custom_attribute_data,
    AttributeCtor, CAArgument, CANamedArgument, CAValue, CustomAttribute, CustomAttributeValue,
};

/// Fail-soft decode outcome
pub use crate::metadata::decoded::Decoded;

/// Marshaling descriptors
pub use crate::metadata::marshalling::{
    decode_marshal, parse_marshalling_descriptor, MarshalType, NativeType,
};

/// Declarative security
pub use crate::metadata::security::{
    decode_decl_security, decode_security_attributes, parse_permission_set, DeclSecurity,
    SecurityAction, SecurityAttribute,
};
