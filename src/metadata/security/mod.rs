//! Declarative security (`DeclSecurity`) permission set blobs.
//!
//! A permission set blob comes in one of two formats, told apart by its first byte:
//!
//! - `.` (0x2E): the binary format written since .NET 2.0. A compressed attribute count
//!   follows, then per attribute its serialized type name, a compressed byte length, a
//!   compressed named argument count and that many `NamedArg` entries encoded exactly as in
//!   a custom attribute blob.
//! - anything else: a UTF-16LE XML `PermissionSet` as written by .NET 1.x, passed to an
//!   [`XmlSecurityHandler`].
//!
//! Decoding is all or nothing. [`decode_security_attributes`] returns an empty list for a
//! blob that fails anywhere, and [`DeclSecurity`] keeps the raw bytes either way.
//!
//! # Legacy Status
//!
//! Code Access Security was deprecated starting with .NET Framework 4.0 and is not enforced
//! by .NET Core/.NET 5+. The blobs still appear in older assemblies and in obfuscated ones.
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 22.11 - `DeclSecurity` Table
//! - ECMA-335 6th Edition, Partition II, Section 23.1.3 - Security Actions

mod parser;
mod types;
mod xml;

pub use parser::{
    decode_decl_security, decode_security_attributes, parse_permission_set, SecurityParser,
    BINARY_FORMAT_MARKER,
};
pub use types::*;
pub use xml::{
    decode_xml_text, permission_classes, PermissionSetXmlHandler, XmlSecurityHandler,
    PERMISSION_SET_ATTRIBUTE,
};
