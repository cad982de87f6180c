//! Coded tokens: compact table-plus-row references (ECMA-335 §II.24.2.6).
//!
//! Inside blobs a coded token is stored as a compressed unsigned integer whose low bits
//! select a table from a fixed per-column list and whose remaining bits are the row id.
//! [`CodedIndexType::decode`] turns such a value into a [`Token`]. An out-of-range
//! selector, or a selector naming an unused slot, is reported as `None` so callers can
//! treat it as "unresolvable" instead of failing hard.

use strum::{EnumCount, EnumIter};

use crate::metadata::token::Token;

/// Metadata tables a coded token can refer to. The discriminant is the table number used
/// in the top byte of a [`Token`].
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum TableId {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    Field = 0x04,
    MethodDef = 0x06,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0A,
    DeclSecurity = 0x0E,
    StandAloneSig = 0x11,
    Event = 0x14,
    Property = 0x17,
    ModuleRef = 0x1A,
    TypeSpec = 0x1B,
    Assembly = 0x20,
    AssemblyRef = 0x23,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    GenericParam = 0x2A,
    MethodSpec = 0x2B,
    GenericParamConstraint = 0x2C,
}

/// Every coded-index column defined by ECMA-335.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, EnumIter, EnumCount)]
pub enum CodedIndexType {
    /// `TypeDef`, `TypeRef` or `TypeSpec`; the form used inside signatures
    TypeDefOrRef,
    /// Owner of a `Constant` row
    HasConstant,
    /// Owner of a `CustomAttribute` row
    HasCustomAttribute,
    /// Owner of a `FieldMarshal` row
    HasFieldMarshal,
    /// Owner of a `DeclSecurity` row
    HasDeclSecurity,
    /// Parent of a `MemberRef`
    MemberRefParent,
    /// `Event` or `Property` of a `MethodSemantics` row
    HasSemantics,
    /// `MethodDef` or `MemberRef`
    MethodDefOrRef,
    /// Target of an `ImplMap` row
    MemberForwarded,
    /// Location of an exported type or manifest resource
    Implementation,
    /// Constructor of a custom attribute
    CustomAttributeType,
    /// Scope a `TypeRef` is resolved in
    ResolutionScope,
    /// Owner of a `GenericParam`
    TypeOrMethodDef,
}

impl CodedIndexType {
    /// The table selected by each tag value, in tag order. `None` marks a reserved slot.
    #[must_use]
    pub fn tables(&self) -> &'static [Option<TableId>] {
        match self {
            CodedIndexType::TypeDefOrRef => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexType::HasConstant => &[
                Some(TableId::Field),
                Some(TableId::Param),
                Some(TableId::Property),
            ],
            CodedIndexType::HasCustomAttribute => &[
                Some(TableId::MethodDef),
                Some(TableId::Field),
                Some(TableId::TypeRef),
                Some(TableId::TypeDef),
                Some(TableId::Param),
                Some(TableId::InterfaceImpl),
                Some(TableId::MemberRef),
                Some(TableId::Module),
                Some(TableId::DeclSecurity),
                Some(TableId::Property),
                Some(TableId::Event),
                Some(TableId::StandAloneSig),
                Some(TableId::ModuleRef),
                Some(TableId::TypeSpec),
                Some(TableId::Assembly),
                Some(TableId::AssemblyRef),
                Some(TableId::File),
                Some(TableId::ExportedType),
                Some(TableId::ManifestResource),
                Some(TableId::GenericParam),
                Some(TableId::GenericParamConstraint),
                Some(TableId::MethodSpec),
            ],
            CodedIndexType::HasFieldMarshal => &[Some(TableId::Field), Some(TableId::Param)],
            CodedIndexType::HasDeclSecurity => &[
                Some(TableId::TypeDef),
                Some(TableId::MethodDef),
                Some(TableId::Assembly),
            ],
            CodedIndexType::MemberRefParent => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::ModuleRef),
                Some(TableId::MethodDef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexType::HasSemantics => &[Some(TableId::Event), Some(TableId::Property)],
            CodedIndexType::MethodDefOrRef => {
                &[Some(TableId::MethodDef), Some(TableId::MemberRef)]
            }
            CodedIndexType::MemberForwarded => &[Some(TableId::Field), Some(TableId::MethodDef)],
            CodedIndexType::Implementation => &[
                Some(TableId::File),
                Some(TableId::AssemblyRef),
                Some(TableId::ExportedType),
            ],
            CodedIndexType::CustomAttributeType => &[
                None,
                None,
                Some(TableId::MethodDef),
                Some(TableId::MemberRef),
                None,
            ],
            CodedIndexType::ResolutionScope => &[
                Some(TableId::Module),
                Some(TableId::ModuleRef),
                Some(TableId::AssemblyRef),
                Some(TableId::TypeRef),
            ],
            CodedIndexType::TypeOrMethodDef => &[Some(TableId::TypeDef), Some(TableId::MethodDef)],
        }
    }

    /// Number of low bits holding the table selector.
    #[must_use]
    pub fn tag_bits(&self) -> u32 {
        let slots = self.tables().len();
        usize::BITS - (slots - 1).leading_zeros()
    }

    /// Decode a coded value into a token.
    ///
    /// Returns `None` when the selector is past the end of the table list or names a
    /// reserved slot.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cilblob::metadata::codedindex::CodedIndexType;
    ///
    /// let token = CodedIndexType::TypeDefOrRef.decode(0x49).unwrap();
    /// assert_eq!(token.value(), 0x0100_0012);
    ///
    /// // Selector 3 is not used by TypeDefOrRef
    /// assert!(CodedIndexType::TypeDefOrRef.decode(0x4B).is_none());
    /// ```
    #[must_use]
    pub fn decode(&self, value: u32) -> Option<Token> {
        let bits = self.tag_bits();
        let selector = (value & ((1 << bits) - 1)) as usize;
        let table = self.tables().get(selector).copied().flatten()?;
        Some(Token::from_parts(table, value >> bits))
    }

    /// Encode a token as a coded value of this column.
    ///
    /// Returns `None` if the token's table is not part of this column.
    #[must_use]
    pub fn encode(&self, token: Token) -> Option<u32> {
        let selector = self
            .tables()
            .iter()
            .position(|table| table.is_some_and(|t| t as u8 == token.table()))?;
        #[allow(clippy::cast_possible_truncation)]
        Some((token.row() << self.tag_bits()) | selector as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn tag_bits_match_table_counts() {
        assert_eq!(CodedIndexType::TypeDefOrRef.tag_bits(), 2);
        assert_eq!(CodedIndexType::HasCustomAttribute.tag_bits(), 5);
        assert_eq!(CodedIndexType::HasFieldMarshal.tag_bits(), 1);
        assert_eq!(CodedIndexType::MemberRefParent.tag_bits(), 3);
        assert_eq!(CodedIndexType::CustomAttributeType.tag_bits(), 3);
        assert_eq!(CodedIndexType::ResolutionScope.tag_bits(), 2);
    }

    #[test]
    fn decode_type_def_or_ref() {
        let decode = |v| CodedIndexType::TypeDefOrRef.decode(v);
        assert_eq!(decode(0x08), Some(Token::new(0x0200_0002)));
        assert_eq!(decode(0x49), Some(Token::new(0x0100_0012)));
        assert_eq!(decode(0x06), Some(Token::new(0x1B00_0001)));
        assert_eq!(decode(0x07), None);
    }

    #[test]
    fn decode_reserved_and_out_of_range_slots() {
        // CustomAttributeType selectors 0, 1 and 4 are reserved
        assert!(CodedIndexType::CustomAttributeType.decode(0x08).is_none());
        assert!(CodedIndexType::CustomAttributeType.decode(0x09).is_none());
        assert!(CodedIndexType::CustomAttributeType.decode(0x0C).is_none());
        assert_eq!(
            CodedIndexType::CustomAttributeType.decode(0x0B),
            Some(Token::new(0x0A00_0001))
        );

        // HasDeclSecurity has 3 tables in a 2-bit selector
        assert!(CodedIndexType::HasDeclSecurity.decode(0x07).is_none());
    }

    #[test]
    fn encode_inverts_decode() {
        for kind in CodedIndexType::iter() {
            for (selector, table) in kind.tables().iter().enumerate() {
                let Some(table) = table else { continue };
                let token = Token::from_parts(*table, 77);
                let coded = kind.encode(token).unwrap();
                assert_eq!(coded & ((1 << kind.tag_bits()) - 1), selector as u32);
                assert_eq!(kind.decode(coded), Some(token), "{kind:?}");
            }
        }
    }

    #[test]
    fn encode_rejects_foreign_table() {
        let token = Token::from_parts(TableId::MethodDef, 1);
        assert!(CodedIndexType::TypeDefOrRef.encode(token).is_none());
    }
}
