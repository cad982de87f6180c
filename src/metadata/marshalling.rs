//! Native marshaling descriptors (ECMA-335 II.23.4) for P/Invoke and COM interop.
//!
//! A `FieldMarshal` row points at a short blob whose first byte is a [`NATIVE_TYPE`] tag.
//! Depending on the tag, a few trailing fields follow. Compilers routinely omit trailing
//! fields, so every one of them is read only if bytes remain; a field that is absent is
//! reported as `None` (or [`NativeType::NotInitialized`] for nested type tags), never as zero.
//!
//! # Descriptor shapes
//!
//! | Tag | Trailing fields |
//! |---|---|
//! | `FIXEDSYSSTRING` | `Opt<size>` |
//! | `SAFEARRAY` | `Opt<variant type>` `Opt<user defined sub type name>` |
//! | `FIXEDARRAY` | `Opt<size>` `Opt<element type>` |
//! | `ARRAY` | `Opt<element type>` `Opt<param number>` `Opt<size>` `Opt<flags>` |
//! | `CUSTOMMARSHALER` | `guid` `native type name` `marshaler type name` `cookie` |
//! | `IUNKNOWN` `IDISPATCH` `INTERFACE` | `Opt<iid param index>` |
//! | anything else | none |
//!
//! Decoding never fails from the caller's point of view: [`decode_marshal`] turns every
//! error into [`MarshalType::RawBlob`] holding the original bytes.
//!
//! # Examples
//!
//! ```rust
//! use cilblob::metadata::{
//!     context::ModuleContext,
//!     marshalling::{parse_marshalling_descriptor, MarshalType, NativeType, NATIVE_TYPE},
//! };
//!
//! let context = ModuleContext::default();
//!
//! // [MarshalAs(UnmanagedType.ByValArray, SizeConst = 16)] with no element type
//! let marshal = parse_marshalling_descriptor(&[NATIVE_TYPE::FIXEDARRAY, 0x10], &context)?;
//! assert_eq!(
//!     marshal,
//!     MarshalType::FixedArray {
//!         size: Some(16),
//!         element_type: NativeType::NotInitialized,
//!     }
//! );
//! # Ok::<(), cilblob::Error>(())
//! ```

use std::fmt;

use crate::{
    file::parser::Parser,
    metadata::{
        context::{ModuleContext, TypeNameSearch},
        signatures::TypeSigRc,
        streams::Blob,
    },
    Result,
};

#[allow(non_snake_case)]
/// Native type constants as defined in ECMA-335 II.23.4 and `CoreCLR` extensions.
///
/// # Constant Categories
///
/// - **Primitive Types** (0x01-0x0c): Basic numeric and boolean types
/// - **String Types** (0x13-0x16, 0x30): Various string encodings and formats
/// - **COM Types** (0x0e-0x12, 0x19-0x1a, 0x2e): COM and OLE automation types
/// - **Array Types** (0x1d-0x1e, 0x2a): Fixed and variable arrays
/// - **Special Types** (0x17-0x2d): Structured types, interfaces, and custom marshaling
/// - **`WinRT` Types** (0x2e-0x30): Windows Runtime specific types
pub mod NATIVE_TYPE {
    /// End marker (0x00)
    pub const END: u8 = 0x00;
    /// Void type (0x01)
    pub const VOID: u8 = 0x01;
    /// Boolean type (0x02) - 4-byte Win32 BOOL
    pub const BOOLEAN: u8 = 0x02;
    /// Signed 8-bit integer (0x03)
    pub const I1: u8 = 0x03;
    /// Unsigned 8-bit integer (0x04)
    pub const U1: u8 = 0x04;
    /// Signed 16-bit integer (0x05)
    pub const I2: u8 = 0x05;
    /// Unsigned 16-bit integer (0x06)
    pub const U2: u8 = 0x06;
    /// Signed 32-bit integer (0x07)
    pub const I4: u8 = 0x07;
    /// Unsigned 32-bit integer (0x08)
    pub const U4: u8 = 0x08;
    /// Signed 64-bit integer (0x09)
    pub const I8: u8 = 0x09;
    /// Unsigned 64-bit integer (0x0a)
    pub const U8: u8 = 0x0a;
    /// 32-bit floating point (0x0b)
    pub const R4: u8 = 0x0b;
    /// 64-bit floating point (0x0c)
    pub const R8: u8 = 0x0c;
    /// System character type (0x0d)
    pub const SYSCHAR: u8 = 0x0d;
    /// COM VARIANT type (0x0e)
    pub const VARIANT: u8 = 0x0e;
    /// OLE automation currency (0x0f)
    pub const CURRENCY: u8 = 0x0f;
    /// Raw pointer (0x10)
    pub const PTR: u8 = 0x10;
    /// .NET decimal (0x11)
    pub const DECIMAL: u8 = 0x11;
    /// OLE automation date (0x12)
    pub const DATE: u8 = 0x12;
    /// Length-prefixed wide string (0x13)
    pub const BSTR: u8 = 0x13;
    /// Null-terminated ANSI string pointer (0x14)
    pub const LPSTR: u8 = 0x14;
    /// Null-terminated Unicode string pointer (0x15)
    pub const LPWSTR: u8 = 0x15;
    /// Null-terminated platform string pointer (0x16)
    pub const LPTSTR: u8 = 0x16;
    /// Fixed-length character array embedded in a structure (0x17)
    pub const FIXEDSYSSTRING: u8 = 0x17;
    /// Managed object reference (0x18)
    pub const OBJECTREF: u8 = 0x18;
    /// COM `IUnknown` interface pointer (0x19)
    pub const IUNKNOWN: u8 = 0x19;
    /// COM `IDispatch` interface pointer (0x1a)
    pub const IDISPATCH: u8 = 0x1a;
    /// Native structure (0x1b)
    pub const STRUCT: u8 = 0x1b;
    /// COM interface with optional IID parameter (0x1c)
    pub const INTERFACE: u8 = 0x1c;
    /// COM safe array (0x1d)
    pub const SAFEARRAY: u8 = 0x1d;
    /// Fixed-size array (0x1e)
    pub const FIXEDARRAY: u8 = 0x1e;
    /// Platform-dependent signed integer (0x1f)
    pub const INT: u8 = 0x1f;
    /// Platform-dependent unsigned integer (0x20)
    pub const UINT: u8 = 0x20;
    /// Nested value type (0x21)
    pub const NESTEDSTRUCT: u8 = 0x21;
    /// Fixed-length string embedded in a structure (0x22)
    pub const BYVALSTR: u8 = 0x22;
    /// ANSI BSTR (0x23)
    pub const ANSIBSTR: u8 = 0x23;
    /// Platform-dependent BSTR (0x24)
    pub const TBSTR: u8 = 0x24;
    /// COM `VARIANT_BOOL` (0x25)
    pub const VARIANTBOOL: u8 = 0x25;
    /// Native function pointer (0x26)
    pub const FUNC: u8 = 0x26;
    /// Marshal as any compatible type (0x28)
    pub const ASANY: u8 = 0x28;
    /// Variable array (0x2a)
    pub const ARRAY: u8 = 0x2a;
    /// Pointer to native structure (0x2b)
    pub const LPSTRUCT: u8 = 0x2b;
    /// User-defined custom marshaler (0x2c)
    pub const CUSTOMMARSHALER: u8 = 0x2c;
    /// HRESULT (0x2d)
    pub const ERROR: u8 = 0x2d;
    /// Windows Runtime `IInspectable` interface (0x2e)
    pub const IINSPECTABLE: u8 = 0x2e;
    /// Windows Runtime string handle (0x2f)
    pub const HSTRING: u8 = 0x2f;
    /// Null-terminated UTF-8 string pointer (0x30)
    pub const LPUTF8STR: u8 = 0x30;
    /// Upper bound marker (0x50)
    pub const MAX: u8 = 0x50;
}

#[allow(non_snake_case)]
/// COM VARIANT type constants (`VARTYPE`) used by safe array descriptors.
///
/// The high-order bits modify the base type:
/// - [`VARIANT_TYPE::VECTOR`]: One-dimensional array
/// - [`VARIANT_TYPE::ARRAY`]: Multi-dimensional array
/// - [`VARIANT_TYPE::BYREF`]: Passed by reference
/// - [`VARIANT_TYPE::TYPEMASK`]: Mask to extract base type
pub mod VARIANT_TYPE {
    /// Empty/uninitialized variant (0)
    pub const EMPTY: u32 = 0;
    /// SQL NULL (1)
    pub const NULL: u32 = 1;
    /// 16-bit signed integer (2)
    pub const I2: u32 = 2;
    /// 32-bit signed integer (3)
    pub const I4: u32 = 3;
    /// 32-bit floating point (4)
    pub const R4: u32 = 4;
    /// 64-bit floating point (5)
    pub const R8: u32 = 5;
    /// Currency (6)
    pub const CY: u32 = 6;
    /// Date (7)
    pub const DATE: u32 = 7;
    /// BSTR string (8)
    pub const BSTR: u32 = 8;
    /// `IDispatch` interface (9)
    pub const DISPATCH: u32 = 9;
    /// SCODE (10)
    pub const ERROR: u32 = 10;
    /// `VARIANT_BOOL` (11)
    pub const BOOL: u32 = 11;
    /// Nested VARIANT (12)
    pub const VARIANT: u32 = 12;
    /// `IUnknown` interface (13)
    pub const UNKNOWN: u32 = 13;
    /// 128-bit decimal (14)
    pub const DECIMAL: u32 = 14;
    /// 8-bit signed integer (16)
    pub const I1: u32 = 16;
    /// 8-bit unsigned integer (17)
    pub const UI1: u32 = 17;
    /// 16-bit unsigned integer (18)
    pub const UI2: u32 = 18;
    /// 32-bit unsigned integer (19)
    pub const UI4: u32 = 19;
    /// 64-bit signed integer (20)
    pub const I8: u32 = 20;
    /// 64-bit unsigned integer (21)
    pub const UI8: u32 = 21;
    /// Machine integer (22)
    pub const INT: u32 = 22;
    /// Machine unsigned integer (23)
    pub const UINT: u32 = 23;
    /// Void (24)
    pub const VOID: u32 = 24;
    /// HRESULT (25)
    pub const HRESULT: u32 = 25;
    /// Pointer (26)
    pub const PTR: u32 = 26;
    /// Safe array (27)
    pub const SAFEARRAY: u32 = 27;
    /// C-style array (28)
    pub const CARRAY: u32 = 28;
    /// User-defined type (29)
    pub const USERDEFINED: u32 = 29;
    /// ANSI string pointer (30)
    pub const LPSTR: u32 = 30;
    /// Unicode string pointer (31)
    pub const LPWSTR: u32 = 31;
    /// Record (36)
    pub const RECORD: u32 = 36;
    /// Integer pointer (37)
    pub const INT_PTR: u32 = 37;
    /// Unsigned integer pointer (38)
    pub const UINT_PTR: u32 = 38;
    /// File time (64)
    pub const FILETIME: u32 = 64;
    /// Binary blob (65)
    pub const BLOB: u32 = 65;
    /// `IStream` (66)
    pub const STREAM: u32 = 66;
    /// `IStorage` (67)
    pub const STORAGE: u32 = 67;
    /// Object stored in a stream (68)
    pub const STREAMED_OBJECT: u32 = 68;
    /// Object stored in storage (69)
    pub const STORED_OBJECT: u32 = 69;
    /// Object stored as a blob (70)
    pub const BLOB_OBJECT: u32 = 70;
    /// Clipboard format (71)
    pub const CF: u32 = 71;
    /// COM class identifier (72)
    pub const CLSID: u32 = 72;
    /// Vector modifier (0x1000)
    pub const VECTOR: u32 = 0x1000;
    /// Array modifier (0x2000)
    pub const ARRAY: u32 = 0x2000;
    /// By-reference modifier (0x4000)
    pub const BYREF: u32 = 0x4000;
    /// Mask to extract the base type from the modifiers
    pub const TYPEMASK: u32 = 0xfff;
}

/// A native type tag.
///
/// Nested tags (array element types) are compressed integers in the blob, so any value can
/// appear; values outside the known set are kept as [`NativeType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum NativeType {
    End,
    Void,
    Boolean,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    SysChar,
    Variant,
    Currency,
    Ptr,
    Decimal,
    Date,
    BStr,
    LPStr,
    LPWStr,
    LPTStr,
    FixedSysString,
    ObjectRef,
    IUnknown,
    IDispatch,
    Struct,
    Interface,
    SafeArray,
    FixedArray,
    Int,
    UInt,
    NestedStruct,
    ByValStr,
    AnsiBStr,
    TBStr,
    VariantBool,
    Func,
    AsAny,
    Array,
    LPStruct,
    CustomMarshaler,
    Error,
    IInspectable,
    HString,
    LPUtf8Str,
    Max,
    /// A tag value with no named native type
    Other(u32),
    /// The field was absent from the blob
    NotInitialized,
}

impl From<u32> for NativeType {
    fn from(value: u32) -> Self {
        let Ok(tag) = u8::try_from(value) else {
            return NativeType::Other(value);
        };

        match tag {
            NATIVE_TYPE::END => NativeType::End,
            NATIVE_TYPE::VOID => NativeType::Void,
            NATIVE_TYPE::BOOLEAN => NativeType::Boolean,
            NATIVE_TYPE::I1 => NativeType::I1,
            NATIVE_TYPE::U1 => NativeType::U1,
            NATIVE_TYPE::I2 => NativeType::I2,
            NATIVE_TYPE::U2 => NativeType::U2,
            NATIVE_TYPE::I4 => NativeType::I4,
            NATIVE_TYPE::U4 => NativeType::U4,
            NATIVE_TYPE::I8 => NativeType::I8,
            NATIVE_TYPE::U8 => NativeType::U8,
            NATIVE_TYPE::R4 => NativeType::R4,
            NATIVE_TYPE::R8 => NativeType::R8,
            NATIVE_TYPE::SYSCHAR => NativeType::SysChar,
            NATIVE_TYPE::VARIANT => NativeType::Variant,
            NATIVE_TYPE::CURRENCY => NativeType::Currency,
            NATIVE_TYPE::PTR => NativeType::Ptr,
            NATIVE_TYPE::DECIMAL => NativeType::Decimal,
            NATIVE_TYPE::DATE => NativeType::Date,
            NATIVE_TYPE::BSTR => NativeType::BStr,
            NATIVE_TYPE::LPSTR => NativeType::LPStr,
            NATIVE_TYPE::LPWSTR => NativeType::LPWStr,
            NATIVE_TYPE::LPTSTR => NativeType::LPTStr,
            NATIVE_TYPE::FIXEDSYSSTRING => NativeType::FixedSysString,
            NATIVE_TYPE::OBJECTREF => NativeType::ObjectRef,
            NATIVE_TYPE::IUNKNOWN => NativeType::IUnknown,
            NATIVE_TYPE::IDISPATCH => NativeType::IDispatch,
            NATIVE_TYPE::STRUCT => NativeType::Struct,
            NATIVE_TYPE::INTERFACE => NativeType::Interface,
            NATIVE_TYPE::SAFEARRAY => NativeType::SafeArray,
            NATIVE_TYPE::FIXEDARRAY => NativeType::FixedArray,
            NATIVE_TYPE::INT => NativeType::Int,
            NATIVE_TYPE::UINT => NativeType::UInt,
            NATIVE_TYPE::NESTEDSTRUCT => NativeType::NestedStruct,
            NATIVE_TYPE::BYVALSTR => NativeType::ByValStr,
            NATIVE_TYPE::ANSIBSTR => NativeType::AnsiBStr,
            NATIVE_TYPE::TBSTR => NativeType::TBStr,
            NATIVE_TYPE::VARIANTBOOL => NativeType::VariantBool,
            NATIVE_TYPE::FUNC => NativeType::Func,
            NATIVE_TYPE::ASANY => NativeType::AsAny,
            NATIVE_TYPE::ARRAY => NativeType::Array,
            NATIVE_TYPE::LPSTRUCT => NativeType::LPStruct,
            NATIVE_TYPE::CUSTOMMARSHALER => NativeType::CustomMarshaler,
            NATIVE_TYPE::ERROR => NativeType::Error,
            NATIVE_TYPE::IINSPECTABLE => NativeType::IInspectable,
            NATIVE_TYPE::HSTRING => NativeType::HString,
            NATIVE_TYPE::LPUTF8STR => NativeType::LPUtf8Str,
            NATIVE_TYPE::MAX => NativeType::Max,
            _ => NativeType::Other(value),
        }
    }
}

impl NativeType {
    /// The tag value, or `None` for [`NativeType::NotInitialized`]
    #[must_use]
    pub fn value(&self) -> Option<u32> {
        let tag = match self {
            NativeType::End => NATIVE_TYPE::END,
            NativeType::Void => NATIVE_TYPE::VOID,
            NativeType::Boolean => NATIVE_TYPE::BOOLEAN,
            NativeType::I1 => NATIVE_TYPE::I1,
            NativeType::U1 => NATIVE_TYPE::U1,
            NativeType::I2 => NATIVE_TYPE::I2,
            NativeType::U2 => NATIVE_TYPE::U2,
            NativeType::I4 => NATIVE_TYPE::I4,
            NativeType::U4 => NATIVE_TYPE::U4,
            NativeType::I8 => NATIVE_TYPE::I8,
            NativeType::U8 => NATIVE_TYPE::U8,
            NativeType::R4 => NATIVE_TYPE::R4,
            NativeType::R8 => NATIVE_TYPE::R8,
            NativeType::SysChar => NATIVE_TYPE::SYSCHAR,
            NativeType::Variant => NATIVE_TYPE::VARIANT,
            NativeType::Currency => NATIVE_TYPE::CURRENCY,
            NativeType::Ptr => NATIVE_TYPE::PTR,
            NativeType::Decimal => NATIVE_TYPE::DECIMAL,
            NativeType::Date => NATIVE_TYPE::DATE,
            NativeType::BStr => NATIVE_TYPE::BSTR,
            NativeType::LPStr => NATIVE_TYPE::LPSTR,
            NativeType::LPWStr => NATIVE_TYPE::LPWSTR,
            NativeType::LPTStr => NATIVE_TYPE::LPTSTR,
            NativeType::FixedSysString => NATIVE_TYPE::FIXEDSYSSTRING,
            NativeType::ObjectRef => NATIVE_TYPE::OBJECTREF,
            NativeType::IUnknown => NATIVE_TYPE::IUNKNOWN,
            NativeType::IDispatch => NATIVE_TYPE::IDISPATCH,
            NativeType::Struct => NATIVE_TYPE::STRUCT,
            NativeType::Interface => NATIVE_TYPE::INTERFACE,
            NativeType::SafeArray => NATIVE_TYPE::SAFEARRAY,
            NativeType::FixedArray => NATIVE_TYPE::FIXEDARRAY,
            NativeType::Int => NATIVE_TYPE::INT,
            NativeType::UInt => NATIVE_TYPE::UINT,
            NativeType::NestedStruct => NATIVE_TYPE::NESTEDSTRUCT,
            NativeType::ByValStr => NATIVE_TYPE::BYVALSTR,
            NativeType::AnsiBStr => NATIVE_TYPE::ANSIBSTR,
            NativeType::TBStr => NATIVE_TYPE::TBSTR,
            NativeType::VariantBool => NATIVE_TYPE::VARIANTBOOL,
            NativeType::Func => NATIVE_TYPE::FUNC,
            NativeType::AsAny => NATIVE_TYPE::ASANY,
            NativeType::Array => NATIVE_TYPE::ARRAY,
            NativeType::LPStruct => NATIVE_TYPE::LPSTRUCT,
            NativeType::CustomMarshaler => NATIVE_TYPE::CUSTOMMARSHALER,
            NativeType::Error => NATIVE_TYPE::ERROR,
            NativeType::IInspectable => NATIVE_TYPE::IINSPECTABLE,
            NativeType::HString => NATIVE_TYPE::HSTRING,
            NativeType::LPUtf8Str => NATIVE_TYPE::LPUTF8STR,
            NativeType::Max => NATIVE_TYPE::MAX,
            NativeType::Other(value) => return Some(*value),
            NativeType::NotInitialized => return None,
        };
        Some(u32::from(tag))
    }
}

/// A decoded marshaling descriptor.
///
/// Optional trailing fields that were absent from the blob are `None`; absent nested type
/// tags are [`NativeType::NotInitialized`].
#[derive(Debug, Clone, PartialEq)]
pub enum MarshalType {
    /// A tag without trailing fields
    Simple(NativeType),
    /// `FIXEDSYSSTRING`
    FixedSysString {
        /// Buffer size in characters
        size: Option<u32>,
    },
    /// `SAFEARRAY`
    SafeArray {
        /// `VARTYPE` of the elements, see [`VARIANT_TYPE`]
        variant_type: Option<u32>,
        /// The user-defined element type, when its name parsed
        user_defined_sub_type: Option<TypeSigRc>,
        /// The user-defined element type name as stored in the blob
        user_defined_sub_type_name: Option<String>,
    },
    /// `FIXEDARRAY`
    FixedArray {
        /// Number of elements
        size: Option<u32>,
        /// Element type
        element_type: NativeType,
    },
    /// `ARRAY`
    Array {
        /// Element type
        element_type: NativeType,
        /// Index of the parameter carrying the element count
        param_number: Option<u32>,
        /// Constant element count
        size: Option<u32>,
        /// Flags, bit 0 tells whether `param_number` was specified
        flags: Option<u32>,
    },
    /// `CUSTOMMARSHALER`
    CustomMarshaler {
        /// GUID string exactly as encoded, usually empty
        guid: String,
        /// Unmanaged type name, usually empty
        native_type_name: String,
        /// The marshaler type, when its name parsed
        custom_marshaler: Option<TypeSigRc>,
        /// The marshaler type name as stored in the blob
        custom_marshaler_name: String,
        /// Cookie handed to the marshaler
        cookie: String,
    },
    /// `IUNKNOWN`, `IDISPATCH` or `INTERFACE`
    Interface {
        /// Which of the three interface tags
        native_type: NativeType,
        /// Index of the parameter carrying the IID
        iid_param_index: Option<u32>,
    },
    /// The descriptor could not be decoded; the bytes are kept
    RawBlob(Vec<u8>),
}

impl MarshalType {
    /// The descriptor's leading tag, `None` for [`MarshalType::RawBlob`]
    #[must_use]
    pub fn native_type(&self) -> Option<NativeType> {
        match self {
            MarshalType::Simple(native_type) | MarshalType::Interface { native_type, .. } => {
                Some(*native_type)
            }
            MarshalType::FixedSysString { .. } => Some(NativeType::FixedSysString),
            MarshalType::SafeArray { .. } => Some(NativeType::SafeArray),
            MarshalType::FixedArray { .. } => Some(NativeType::FixedArray),
            MarshalType::Array { .. } => Some(NativeType::Array),
            MarshalType::CustomMarshaler { .. } => Some(NativeType::CustomMarshaler),
            MarshalType::RawBlob(_) => None,
        }
    }

    /// Returns true if this is the raw-bytes fallback
    #[must_use]
    pub fn is_raw(&self) -> bool {
        matches!(self, MarshalType::RawBlob(_))
    }

    /// Parses the GUID of a custom marshaler descriptor.
    ///
    /// Accepts the plain and the braced registry form. Returns `None` for other descriptors
    /// and for GUID strings that are empty or malformed.
    #[must_use]
    pub fn guid(&self) -> Option<uguid::Guid> {
        let MarshalType::CustomMarshaler { guid, .. } = self else {
            return None;
        };

        let trimmed = guid.trim();
        let bare = trimmed
            .strip_prefix('{')
            .and_then(|inner| inner.strip_suffix('}'))
            .unwrap_or(trimmed);
        uguid::Guid::try_parse(bare).ok()
    }
}

impl fmt::Display for MarshalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarshalType::RawBlob(data) => write!(f, "raw({} bytes)", data.len()),
            MarshalType::CustomMarshaler {
                custom_marshaler_name,
                cookie,
                ..
            } => write!(f, "CustomMarshaler({custom_marshaler_name}, \"{cookie}\")"),
            other => match other.native_type() {
                Some(native_type) => write!(f, "{native_type:?}"),
                None => f.write_str("?"),
            },
        }
    }
}

/// Parses a marshaling descriptor
///
/// # Errors
/// Returns an error if the descriptor is empty or a field that must be present is truncated
pub fn parse_marshalling_descriptor(data: &[u8], context: &ModuleContext) -> Result<MarshalType> {
    MarshallingParser::new(data, context).parse_descriptor()
}

/// Decodes the marshaling descriptor at `offset` in the blob heap.
///
/// Never fails: any error, including an invalid heap offset, yields
/// [`MarshalType::RawBlob`] with whatever bytes could be retrieved.
#[must_use]
pub fn decode_marshal(blob: &Blob<'_>, offset: usize, context: &ModuleContext) -> MarshalType {
    let data = match blob.get(offset) {
        Ok(data) => data,
        Err(error) => {
            log::debug!("Marshal blob offset 0x{offset:X} is invalid: {error}");
            return MarshalType::RawBlob(Vec::new());
        }
    };

    match parse_marshalling_descriptor(data, context) {
        Ok(marshal) => marshal,
        Err(error) => {
            log::debug!("Marshal descriptor at blob offset 0x{offset:X} kept as raw bytes: {error}");
            MarshalType::RawBlob(data.to_vec())
        }
    }
}

/// Parser for marshaling descriptor blobs
pub struct MarshallingParser<'a, 'c> {
    parser: Parser<'a>,
    context: &'c ModuleContext,
}

impl<'a, 'c> MarshallingParser<'a, 'c> {
    /// Creates a parser over `data`
    #[must_use]
    pub fn new(data: &'a [u8], context: &'c ModuleContext) -> Self {
        MarshallingParser {
            parser: Parser::new(data),
            context,
        }
    }

    /// Parses the descriptor
    ///
    /// # Errors
    /// Returns an error if the leading tag is missing or a mandatory field is truncated
    pub fn parse_descriptor(&mut self) -> Result<MarshalType> {
        let head_byte = self.parser.read_le::<u8>()?;
        let native_type = NativeType::from(u32::from(head_byte));

        let marshal = match native_type {
            NativeType::FixedSysString => MarshalType::FixedSysString {
                size: self.read_optional_uint()?,
            },
            NativeType::SafeArray => {
                let variant_type = self.read_optional_uint()?;
                let user_defined_sub_type_name = if self.parser.has_more_data() {
                    Some(self.parser.read_prefixed_string_utf8()?)
                } else {
                    None
                };
                let user_defined_sub_type = user_defined_sub_type_name.as_deref().and_then(|name| {
                    self.context
                        .parse_type_name(name, TypeNameSearch::NoImplicitAssembly)
                });

                MarshalType::SafeArray {
                    variant_type,
                    user_defined_sub_type,
                    user_defined_sub_type_name,
                }
            }
            NativeType::FixedArray => MarshalType::FixedArray {
                size: self.read_optional_uint()?,
                element_type: self.read_optional_native_type()?,
            },
            NativeType::Array => MarshalType::Array {
                element_type: self.read_optional_native_type()?,
                param_number: self.read_optional_uint()?,
                size: self.read_optional_uint()?,
                flags: self.read_optional_uint()?,
            },
            NativeType::CustomMarshaler => {
                let guid = self.parser.read_prefixed_string_utf8()?;
                let native_type_name = self.parser.read_prefixed_string_utf8()?;
                let custom_marshaler_name = self.parser.read_prefixed_string_utf8()?;
                let custom_marshaler = if custom_marshaler_name.is_empty() {
                    None
                } else {
                    self.context.parse_type_name(
                        &custom_marshaler_name,
                        TypeNameSearch::CurrentModuleThenCorLib,
                    )
                };
                let cookie = self.parser.read_prefixed_string_utf8()?;

                MarshalType::CustomMarshaler {
                    guid,
                    native_type_name,
                    custom_marshaler,
                    custom_marshaler_name,
                    cookie,
                }
            }
            NativeType::IUnknown | NativeType::IDispatch | NativeType::Interface => {
                MarshalType::Interface {
                    native_type,
                    iid_param_index: self.read_optional_uint()?,
                }
            }
            other => MarshalType::Simple(other),
        };

        Ok(marshal)
    }

    fn read_optional_uint(&mut self) -> Result<Option<u32>> {
        if self.parser.has_more_data() {
            Ok(Some(self.parser.read_compressed_uint()?))
        } else {
            Ok(None)
        }
    }

    fn read_optional_native_type(&mut self) -> Result<NativeType> {
        Ok(self
            .read_optional_uint()?
            .map_or(NativeType::NotInitialized, NativeType::from))
    }
}
