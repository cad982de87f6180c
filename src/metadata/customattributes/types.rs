//! CustomAttribute-specific types and data structures.
//!
//! This module contains all the types used for representing parsed custom attribute data,
//! including argument values, named arguments, and the overall custom attribute value structure.
//! These types follow ECMA-335 II.23.3.

use std::fmt;

use crate::metadata::{
    decoded::Decoded,
    signatures::{MethodSig, TypeSig, TypeSigRc},
    token::Token,
};

/// The value half of a [`CAArgument`]
#[derive(Debug, Clone, PartialEq)]
pub enum CAValue {
    /// Boolean value, any nonzero byte is `true`
    Boolean(bool),
    /// UTF-16 code unit
    Char(u16),
    /// Signed 8-bit integer
    I1(i8),
    /// Unsigned 8-bit integer
    U1(u8),
    /// Signed 16-bit integer
    I2(i16),
    /// Unsigned 16-bit integer
    U2(u16),
    /// Signed 32-bit integer
    I4(i32),
    /// Unsigned 32-bit integer
    U4(u32),
    /// Signed 64-bit integer
    I8(i64),
    /// Unsigned 64-bit integer
    U8(u64),
    /// 32-bit floating point
    R4(f32),
    /// 64-bit floating point
    R8(f64),
    /// UTF-8 string, `None` for a null string
    String(Option<String>),
    /// `System.Type` value, `None` for a null type
    Type(Option<TypeSigRc>),
    /// Array elements, `None` for a null array
    Array(Option<Vec<CAArgument>>),
    /// Value stored in an `object` slot, tagged with its real type
    Boxed(Box<CAArgument>),
}

/// A typed custom attribute argument
///
/// For an enum value, `ty` is the enum type and `value` holds the underlying primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct CAArgument {
    /// Type of the argument
    pub ty: TypeSigRc,
    /// The decoded value
    pub value: CAValue,
}

impl CAArgument {
    /// Creates a new argument
    #[must_use]
    pub fn new(ty: TypeSigRc, value: CAValue) -> Self {
        CAArgument { ty, value }
    }

    /// Returns true if this is an enum value
    #[must_use]
    pub fn is_enum(&self) -> bool {
        matches!(self.ty.as_ref(), TypeSig::ValueType(_) | TypeSig::Class(_))
            && !matches!(
                self.value,
                CAValue::String(_) | CAValue::Type(_) | CAValue::Array(_) | CAValue::Boxed(_)
            )
    }

    /// The value with every layer of boxing removed
    #[must_use]
    pub fn unboxed(&self) -> &CAArgument {
        let mut current = self;
        while let CAValue::Boxed(inner) = &current.value {
            current = inner;
        }
        current
    }

    /// The value as a signed 64-bit integer, for any integral or enum value
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self.unboxed().value {
            CAValue::Boolean(v) => Some(i64::from(v)),
            CAValue::Char(v) => Some(i64::from(v)),
            CAValue::I1(v) => Some(i64::from(v)),
            CAValue::U1(v) => Some(i64::from(v)),
            CAValue::I2(v) => Some(i64::from(v)),
            CAValue::U2(v) => Some(i64::from(v)),
            CAValue::I4(v) => Some(i64::from(v)),
            CAValue::U4(v) => Some(i64::from(v)),
            CAValue::I8(v) => Some(v),
            CAValue::U8(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// The value as a string slice, for a non-null string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match &self.unboxed().value {
            CAValue::String(Some(s)) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CAValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CAValue::Boolean(v) => write!(f, "{v}"),
            CAValue::Char(v) => match char::from_u32(u32::from(*v)) {
                Some(c) => write!(f, "'{c}'"),
                None => write!(f, "'\\u{v:04x}'"),
            },
            CAValue::I1(v) => write!(f, "{v}"),
            CAValue::U1(v) => write!(f, "{v}"),
            CAValue::I2(v) => write!(f, "{v}"),
            CAValue::U2(v) => write!(f, "{v}"),
            CAValue::I4(v) => write!(f, "{v}"),
            CAValue::U4(v) => write!(f, "{v}"),
            CAValue::I8(v) => write!(f, "{v}"),
            CAValue::U8(v) => write!(f, "{v}"),
            CAValue::R4(v) => write!(f, "{v}"),
            CAValue::R8(v) => write!(f, "{v}"),
            CAValue::String(Some(s)) => write!(f, "{s:?}"),
            CAValue::Type(Some(t)) => write!(f, "typeof({t})"),
            CAValue::String(None) | CAValue::Type(None) | CAValue::Array(None) => {
                f.write_str("null")
            }
            CAValue::Array(Some(items)) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
            CAValue::Boxed(inner) => write!(f, "{inner}"),
        }
    }
}

impl fmt::Display for CAArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_enum() {
            write!(f, "({}){}", self.ty, self.value)
        } else {
            write!(f, "{}", self.value)
        }
    }
}

/// A named field or property assignment (II.23.3 `NamedArg`)
#[derive(Debug, Clone, PartialEq)]
pub struct CANamedArgument {
    /// Whether this is a field (true) or property (false)
    pub is_field: bool,
    /// Declared type of the field or property
    pub ty: TypeSigRc,
    /// Name of the field or property
    pub name: String,
    /// The assigned value
    pub argument: CAArgument,
}

impl fmt::Display for CANamedArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.argument)
    }
}

/// Represents a parsed custom attribute value with arguments and named arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomAttributeValue {
    /// Fixed arguments from the constructor signature
    pub fixed_args: Vec<CAArgument>,
    /// Named arguments (fields and properties)
    pub named_args: Vec<CANamedArgument>,
}

impl CustomAttributeValue {
    /// Looks a named argument up by name
    #[must_use]
    pub fn named(&self, name: &str) -> Option<&CANamedArgument> {
        self.named_args.iter().find(|arg| arg.name == name)
    }
}

/// A resolved attribute constructor
#[derive(Debug, Clone)]
pub struct AttributeCtor {
    /// `MethodDef` or `MemberRef` token of the constructor
    pub token: Token,
    /// The constructor's method signature
    pub signature: MethodSig,
    /// The declaring type, when it is a generic instantiation its arguments are applied
    /// to the parameter types
    pub declaring_type: Option<TypeSigRc>,
}

impl AttributeCtor {
    /// Creates a constructor declared on a non-generic type
    #[must_use]
    pub fn new(token: Token, signature: MethodSig) -> Self {
        AttributeCtor {
            token,
            signature,
            declaring_type: None,
        }
    }

    /// Sets the declaring type
    #[must_use]
    pub fn with_declaring_type(mut self, declaring_type: TypeSigRc) -> Self {
        self.declaring_type = Some(declaring_type);
        self
    }
}

/// A custom attribute as attached to its owner
///
/// The constructor is always known. The arguments are either decoded or, when the blob
/// could not be decoded, kept as raw bytes.
#[derive(Debug)]
pub struct CustomAttribute {
    /// `MethodDef` or `MemberRef` token of the constructor
    pub ctor: Token,
    /// The decoded arguments or the raw blob
    pub value: Decoded<CustomAttributeValue>,
}

impl CustomAttribute {
    /// The constructor arguments, empty if the blob was not decoded
    #[must_use]
    pub fn fixed_args(&self) -> &[CAArgument] {
        self.value
            .value()
            .map(|v| v.fixed_args.as_slice())
            .unwrap_or_default()
    }

    /// The named arguments, empty if the blob was not decoded
    #[must_use]
    pub fn named_args(&self) -> &[CANamedArgument] {
        self.value
            .value()
            .map(|v| v.named_args.as_slice())
            .unwrap_or_default()
    }

    /// The undecoded blob, if decoding failed
    #[must_use]
    pub fn raw_data(&self) -> Option<&[u8]> {
        self.value.raw()
    }
}

/// .NET `CorSerializationType` constants as defined in corhdr.h
#[allow(non_snake_case, missing_docs)]
pub mod SERIALIZATION_TYPE {
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0A;
    pub const U8: u8 = 0x0B;
    pub const R4: u8 = 0x0C;
    pub const R8: u8 = 0x0D;
    pub const STRING: u8 = 0x0E;
    pub const SZARRAY: u8 = 0x1D;
    pub const TYPE: u8 = 0x50;
    pub const TAGGED_OBJECT: u8 = 0x51;
    pub const FIELD: u8 = 0x53;
    pub const PROPERTY: u8 = 0x54;
    pub const ENUM: u8 = 0x55;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metadata::{
        signatures::TypeDefOrRefSig,
        typesystem::{CorLibTypes, TypeRef},
    };

    #[test]
    fn display() {
        let corlib = CorLibTypes::new();
        let array = CAArgument::new(
            Arc::new(TypeSig::SzArray(corlib.int32())),
            CAValue::Array(Some(vec![
                CAArgument::new(corlib.int32(), CAValue::I4(1)),
                CAArgument::new(corlib.int32(), CAValue::I4(2)),
            ])),
        );
        assert_eq!(array.to_string(), "{1, 2}");

        let named = CANamedArgument {
            is_field: true,
            ty: corlib.int32(),
            name: "X".to_string(),
            argument: CAArgument::new(corlib.int32(), CAValue::I4(7)),
        };
        assert_eq!(named.to_string(), "X = 7");

        let null = CAArgument::new(corlib.string(), CAValue::String(None));
        assert_eq!(null.to_string(), "null");
        let text = CAArgument::new(corlib.string(), CAValue::String(Some("hi".into())));
        assert_eq!(text.to_string(), "\"hi\"");
    }

    #[test]
    fn enum_and_boxing() {
        let corlib = CorLibTypes::new();
        let action = Arc::new(TypeSig::ValueType(TypeDefOrRefSig::synthesized(
            TypeRef::new("System.Security.Permissions", "SecurityAction"),
        )));

        let value = CAArgument::new(action, CAValue::I4(2));
        assert!(value.is_enum());
        assert_eq!(
            value.to_string(),
            "(System.Security.Permissions.SecurityAction)2"
        );

        let boxed = CAArgument::new(corlib.object(), CAValue::Boxed(Box::new(value.clone())));
        assert!(!boxed.is_enum());
        assert_eq!(boxed.unboxed(), &value);
        assert_eq!(boxed.as_i64(), Some(2));
    }
}
