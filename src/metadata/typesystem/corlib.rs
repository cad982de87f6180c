use std::{fmt, sync::Arc};

use strum::{EnumCount, EnumIter, IntoEnumIterator};

use crate::metadata::{
    signatures::{TypeDefOrRefSig, TypeSig, TypeSigRc},
    typesystem::{TypeRef, ELEMENT_TYPE},
};

/// The primitive types that signatures encode with a single element-type byte.
///
/// Every variant maps one-to-one onto an `ELEMENT_TYPE` value and a `System.*` type of the
/// core library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum CorLibType {
    /// `System.Void`
    Void,
    /// `System.Boolean`
    Boolean,
    /// `System.Char`
    Char,
    /// `System.SByte`
    I1,
    /// `System.Byte`
    U1,
    /// `System.Int16`
    I2,
    /// `System.UInt16`
    U2,
    /// `System.Int32`
    I4,
    /// `System.UInt32`
    U4,
    /// `System.Int64`
    I8,
    /// `System.UInt64`
    U8,
    /// `System.Single`
    R4,
    /// `System.Double`
    R8,
    /// `System.String`
    String,
    /// `System.TypedReference`
    TypedReference,
    /// `System.IntPtr`
    I,
    /// `System.UIntPtr`
    U,
    /// `System.Object`
    Object,
}

impl CorLibType {
    /// Maps an element-type byte onto its primitive, if it names one.
    #[must_use]
    pub fn from_element_type(element_type: u8) -> Option<Self> {
        Some(match element_type {
            ELEMENT_TYPE::VOID => CorLibType::Void,
            ELEMENT_TYPE::BOOLEAN => CorLibType::Boolean,
            ELEMENT_TYPE::CHAR => CorLibType::Char,
            ELEMENT_TYPE::I1 => CorLibType::I1,
            ELEMENT_TYPE::U1 => CorLibType::U1,
            ELEMENT_TYPE::I2 => CorLibType::I2,
            ELEMENT_TYPE::U2 => CorLibType::U2,
            ELEMENT_TYPE::I4 => CorLibType::I4,
            ELEMENT_TYPE::U4 => CorLibType::U4,
            ELEMENT_TYPE::I8 => CorLibType::I8,
            ELEMENT_TYPE::U8 => CorLibType::U8,
            ELEMENT_TYPE::R4 => CorLibType::R4,
            ELEMENT_TYPE::R8 => CorLibType::R8,
            ELEMENT_TYPE::STRING => CorLibType::String,
            ELEMENT_TYPE::TYPEDBYREF => CorLibType::TypedReference,
            ELEMENT_TYPE::I => CorLibType::I,
            ELEMENT_TYPE::U => CorLibType::U,
            ELEMENT_TYPE::OBJECT => CorLibType::Object,
            _ => return None,
        })
    }

    /// The element-type byte this primitive is encoded as.
    #[must_use]
    pub fn element_type(self) -> u8 {
        match self {
            CorLibType::Void => ELEMENT_TYPE::VOID,
            CorLibType::Boolean => ELEMENT_TYPE::BOOLEAN,
            CorLibType::Char => ELEMENT_TYPE::CHAR,
            CorLibType::I1 => ELEMENT_TYPE::I1,
            CorLibType::U1 => ELEMENT_TYPE::U1,
            CorLibType::I2 => ELEMENT_TYPE::I2,
            CorLibType::U2 => ELEMENT_TYPE::U2,
            CorLibType::I4 => ELEMENT_TYPE::I4,
            CorLibType::U4 => ELEMENT_TYPE::U4,
            CorLibType::I8 => ELEMENT_TYPE::I8,
            CorLibType::U8 => ELEMENT_TYPE::U8,
            CorLibType::R4 => ELEMENT_TYPE::R4,
            CorLibType::R8 => ELEMENT_TYPE::R8,
            CorLibType::String => ELEMENT_TYPE::STRING,
            CorLibType::TypedReference => ELEMENT_TYPE::TYPEDBYREF,
            CorLibType::I => ELEMENT_TYPE::I,
            CorLibType::U => ELEMENT_TYPE::U,
            CorLibType::Object => ELEMENT_TYPE::OBJECT,
        }
    }

    /// The simple name of the backing `System` type, e.g. `SByte` for [`CorLibType::I1`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            CorLibType::Void => "Void",
            CorLibType::Boolean => "Boolean",
            CorLibType::Char => "Char",
            CorLibType::I1 => "SByte",
            CorLibType::U1 => "Byte",
            CorLibType::I2 => "Int16",
            CorLibType::U2 => "UInt16",
            CorLibType::I4 => "Int32",
            CorLibType::U4 => "UInt32",
            CorLibType::I8 => "Int64",
            CorLibType::U8 => "UInt64",
            CorLibType::R4 => "Single",
            CorLibType::R8 => "Double",
            CorLibType::String => "String",
            CorLibType::TypedReference => "TypedReference",
            CorLibType::I => "IntPtr",
            CorLibType::U => "UIntPtr",
            CorLibType::Object => "Object",
        }
    }

    /// The namespace-qualified name, e.g. `System.SByte`.
    #[must_use]
    pub fn full_name(self) -> String {
        format!("System.{}", self.name())
    }

    /// Looks a primitive up by its namespace-qualified name.
    #[must_use]
    pub fn from_full_name(full_name: &str) -> Option<Self> {
        let name = full_name.strip_prefix("System.")?;
        CorLibType::iter().find(|t| t.name() == name)
    }

    /// Returns true for the integral types a custom attribute blob can carry as the
    /// underlying type of an enum (`Boolean` through `UInt64`).
    #[must_use]
    pub fn is_integral(self) -> bool {
        (ELEMENT_TYPE::BOOLEAN..=ELEMENT_TYPE::U8).contains(&self.element_type())
    }
}

impl fmt::Display for CorLibType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "System.{}", self.name())
    }
}

/// The shared primitive signature nodes of one module.
///
/// Decoding `int32` twice yields the same `Arc`, so consumers can compare primitive
/// signatures with [`Arc::ptr_eq`]. `System.Type`, which custom attributes need but which
/// has no element-type byte of its own, is carried along as a synthesized class reference.
pub struct CorLibTypes {
    types: Vec<TypeSigRc>,
    system_type: TypeSigRc,
}

impl CorLibTypes {
    /// Builds the singleton set.
    #[must_use]
    pub fn new() -> Self {
        let types = CorLibType::iter()
            .map(|t| Arc::new(TypeSig::CorLib(t)))
            .collect();

        let system_type = Arc::new(TypeSig::Class(TypeDefOrRefSig::synthesized(
            TypeRef::new("System", "Type"),
        )));

        CorLibTypes { types, system_type }
    }

    /// Returns the shared node for `corlib_type`.
    #[must_use]
    pub fn get(&self, corlib_type: CorLibType) -> TypeSigRc {
        self.types[corlib_type as usize].clone()
    }

    /// Returns the shared node for an element-type byte, if it names a primitive.
    #[must_use]
    pub fn from_element_type(&self, element_type: u8) -> Option<TypeSigRc> {
        CorLibType::from_element_type(element_type).map(|t| self.get(t))
    }

    /// `System.Object`
    #[must_use]
    pub fn object(&self) -> TypeSigRc {
        self.get(CorLibType::Object)
    }

    /// `System.String`
    #[must_use]
    pub fn string(&self) -> TypeSigRc {
        self.get(CorLibType::String)
    }

    /// `System.Int32`
    #[must_use]
    pub fn int32(&self) -> TypeSigRc {
        self.get(CorLibType::I4)
    }

    /// `System.Type`
    #[must_use]
    pub fn system_type(&self) -> TypeSigRc {
        self.system_type.clone()
    }
}

impl Default for CorLibTypes {
    fn default() -> Self {
        Self::new()
    }
}

const _: () = assert!(CorLibType::COUNT == 18);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_type_mapping() {
        for t in CorLibType::iter() {
            assert_eq!(CorLibType::from_element_type(t.element_type()), Some(t));
        }
        assert_eq!(CorLibType::from_element_type(ELEMENT_TYPE::CLASS), None);
        assert_eq!(CorLibType::from_element_type(ELEMENT_TYPE::R), None);
    }

    #[test]
    fn names() {
        assert_eq!(CorLibType::I1.full_name(), "System.SByte");
        assert_eq!(CorLibType::U.full_name(), "System.UIntPtr");
        assert_eq!(
            CorLibType::from_full_name("System.Int64"),
            Some(CorLibType::I8)
        );
        assert_eq!(CorLibType::from_full_name("Int64"), None);
        assert_eq!(CorLibType::TypedReference.to_string(), "System.TypedReference");
    }

    #[test]
    fn integral() {
        assert!(CorLibType::Boolean.is_integral());
        assert!(CorLibType::U8.is_integral());
        assert!(!CorLibType::R4.is_integral());
        assert!(!CorLibType::I.is_integral());
        assert!(!CorLibType::String.is_integral());
    }

    #[test]
    fn singletons_are_shared() {
        let corlib = CorLibTypes::new();
        assert!(Arc::ptr_eq(&corlib.int32(), &corlib.get(CorLibType::I4)));
        assert!(Arc::ptr_eq(
            &corlib.string(),
            &corlib.from_element_type(ELEMENT_TYPE::STRING).unwrap()
        ));
        assert_eq!(corlib.system_type().full_name(), "System.Type");
    }
}
