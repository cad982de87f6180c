//! Type system primitives shared by the blob decoders.
//!
//! # Key Components
//!
//! - [`ELEMENT_TYPE`] - Wire values of the signature element-type tags (ECMA-335 §II.23.1.16)
//! - [`CorLibType`] / [`CorLibTypes`] - The primitive corlib types and their shared signature nodes
//! - [`TypeRef`] - A resolved handle to a `TypeDef`, `TypeRef` or parsed type name
//! - [`TypeNameParser`] - Reflection type names embedded in custom attribute and security blobs

mod corlib;
mod typename;
mod typeref;

pub use corlib::{CorLibType, CorLibTypes};
pub use typename::{is_corlib_scope, TypeNameParser};
pub use typeref::{TypeRef, TypeRefRc};

#[allow(non_snake_case)]
#[allow(missing_docs)]
/// All possible `ELEMENT_TYPE` values of a signature, as defined by ECMA-335 and the
/// CLR's `corhdr.h`.
pub mod ELEMENT_TYPE {
    //Marks end of a list
    pub const END: u8 = 0x00;
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0a;
    pub const U8: u8 = 0x0b;
    pub const R4: u8 = 0x0c;
    pub const R8: u8 = 0x0d;
    pub const STRING: u8 = 0x0e;
    // Followed by type
    pub const PTR: u8 = 0x0f;
    // Followed by type
    pub const BYREF: u8 = 0x10;
    // Followed by TypeDef or TypeRef token
    pub const VALUETYPE: u8 = 0x11;
    // Followed by TypeDef or TypeRef token
    pub const CLASS: u8 = 0x12;
    // Generic parameter in a generic type definition, represented as number
    pub const VAR: u8 = 0x13;
    // type rank boundsCount bound1 … loCount lo1 …
    pub const ARRAY: u8 = 0x14;
    // Generic type instantiation. Followed by type type-arg-count type-1 ... type-n
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    // Fixed size value array: followed by type and size (not in ECMA-335, unsupported by the CLR)
    pub const VALUEARRAY: u8 = 0x17;
    // System.IntPtr
    pub const I: u8 = 0x18;
    // System.UIntPtr
    pub const U: u8 = 0x19;
    // Native real (not in ECMA-335, unsupported by the CLR)
    pub const R: u8 = 0x1a;
    // Followed by full method signature
    pub const FNPTR: u8 = 0x1b;
    // System.Object
    pub const OBJECT: u8 = 0x1c;
    // Single-dim array with 0 lower bound
    pub const SZARRAY: u8 = 0x1d;
    // Generic parameter in a generic method definition,represented as number
    pub const MVAR: u8 = 0x1e;
    // Required modifier : followed by a TypeDef or TypeRef token
    pub const CMOD_REQD: u8 = 0x1f;
    // Optional modifier : followed by a TypeDef or TypeRef token
    pub const CMOD_OPT: u8 = 0x20;
    // Implemented within the CLI
    pub const INTERNAL: u8 = 0x21;
    // Module-indexed type: followed by a module index and type
    pub const MODULE: u8 = 0x3f;
    // Or’d with following element types
    pub const MODIFIER: u8 = 0x40;
    // Sentinel for vararg method signature
    pub const SENTINEL: u8 = 0x41;
    // Denotes a local variable that points at a pinned object
    pub const PINNED: u8 = 0x45;
}
