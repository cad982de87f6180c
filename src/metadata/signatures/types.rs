use std::{fmt, sync::Arc};

use bitflags::bitflags;
use strum::FromRepr;

use crate::metadata::{
    token::Token,
    typesystem::{CorLibType, TypeRef, TypeRefRc, ELEMENT_TYPE},
};

/// A shared, immutable type signature node
pub type TypeSigRc = Arc<TypeSig>;

/// A `TypeDefOrRef` reference embedded in a signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDefOrRefSig {
    /// The decoded coded token, null for synthesized references
    pub token: Token,
    /// The resolved type, `None` if the module could not resolve the token
    pub type_ref: Option<TypeRefRc>,
}

impl TypeDefOrRefSig {
    /// Wraps a decoded token and its resolution
    #[must_use]
    pub fn new(token: Token, type_ref: Option<TypeRefRc>) -> Self {
        TypeDefOrRefSig { token, type_ref }
    }

    /// Wraps a type that has no row of its own, such as one parsed from a type name
    #[must_use]
    pub fn synthesized(type_ref: TypeRef) -> Self {
        TypeDefOrRefSig {
            token: type_ref.token,
            type_ref: Some(Arc::new(type_ref)),
        }
    }

    /// Display name, falling back to the raw token when unresolved
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.type_ref {
            Some(type_ref) => type_ref.full_name(),
            None => format!("<{}>", self.token),
        }
    }
}

/// Array with explicit rank, sizes and lower bounds (II.23.2.13)
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySig {
    /// Element type
    pub element: TypeSigRc,
    /// Number of dimensions, 0 means no dimension information
    pub rank: u32,
    /// Sizes of the leading dimensions
    pub sizes: Vec<u32>,
    /// Lower bounds of the leading dimensions
    pub lower_bounds: Vec<i32>,
}

/// Instantiation of a generic type
#[derive(Debug, Clone, PartialEq)]
pub struct GenericInstSig {
    /// The open generic type, always a `Class` or `ValueType` node
    pub generic_type: TypeSigRc,
    /// The type arguments
    pub args: Vec<TypeSigRc>,
}

/// A `modreq` / `modopt` applied to the following type
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierSig {
    /// The modifier type
    pub modifier: TypeDefOrRefSig,
    /// The modified type
    pub next: TypeSigRc,
}

/// Fixed size value array
#[derive(Debug, Clone, PartialEq)]
pub struct ValueArraySig {
    /// Element type
    pub next: TypeSigRc,
    /// Element count
    pub size: u32,
}

/// Type living in another module of the assembly
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSig {
    /// Module index
    pub index: u32,
    /// The type
    pub next: TypeSigRc,
}

/// A decoded type signature (II.23.2.12)
///
/// Each variant owns exactly the data its element-type tag carries. Child nodes are
/// shared `Arc`s: primitives come from the module's [`crate::metadata::typesystem::CorLibTypes`],
/// and generic instantiation reuses any sub-tree it does not have to change.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSig {
    /// One of the primitive corlib types
    CorLib(CorLibType),
    /// Unmanaged pointer
    Ptr(TypeSigRc),
    /// Managed pointer
    ByRef(TypeSigRc),
    /// Single-dimension, zero-based array
    SzArray(TypeSigRc),
    /// Pinned local
    Pinned(TypeSigRc),
    /// Value type
    ValueType(TypeDefOrRefSig),
    /// Reference type
    Class(TypeDefOrRefSig),
    /// General array
    Array(ArraySig),
    /// Generic instantiation
    GenericInst(GenericInstSig),
    /// Generic parameter of the declaring type
    Var(u32),
    /// Generic parameter of the declaring method
    MVar(u32),
    /// Function pointer
    FnPtr(Arc<CallingConventionSig>),
    /// Required custom modifier
    CModReqd(ModifierSig),
    /// Optional custom modifier
    CModOpt(ModifierSig),
    /// Start of the vararg part of a call site signature
    Sentinel,
    /// Fixed size value array
    ValueArray(ValueArraySig),
    /// Module-indexed type
    Module(ModuleSig),
}

impl TypeSig {
    /// The element-type byte this node is encoded with
    #[must_use]
    pub fn element_type(&self) -> u8 {
        match self {
            TypeSig::CorLib(t) => t.element_type(),
            TypeSig::Ptr(_) => ELEMENT_TYPE::PTR,
            TypeSig::ByRef(_) => ELEMENT_TYPE::BYREF,
            TypeSig::SzArray(_) => ELEMENT_TYPE::SZARRAY,
            TypeSig::Pinned(_) => ELEMENT_TYPE::PINNED,
            TypeSig::ValueType(_) => ELEMENT_TYPE::VALUETYPE,
            TypeSig::Class(_) => ELEMENT_TYPE::CLASS,
            TypeSig::Array(_) => ELEMENT_TYPE::ARRAY,
            TypeSig::GenericInst(_) => ELEMENT_TYPE::GENERICINST,
            TypeSig::Var(_) => ELEMENT_TYPE::VAR,
            TypeSig::MVar(_) => ELEMENT_TYPE::MVAR,
            TypeSig::FnPtr(_) => ELEMENT_TYPE::FNPTR,
            TypeSig::CModReqd(_) => ELEMENT_TYPE::CMOD_REQD,
            TypeSig::CModOpt(_) => ELEMENT_TYPE::CMOD_OPT,
            TypeSig::Sentinel => ELEMENT_TYPE::SENTINEL,
            TypeSig::ValueArray(_) => ELEMENT_TYPE::VALUEARRAY,
            TypeSig::Module(_) => ELEMENT_TYPE::MODULE,
        }
    }

    /// The single wrapped child of a chain node
    #[must_use]
    pub fn next(&self) -> Option<&TypeSigRc> {
        match self {
            TypeSig::Ptr(next)
            | TypeSig::ByRef(next)
            | TypeSig::SzArray(next)
            | TypeSig::Pinned(next) => Some(next),
            TypeSig::Array(array) => Some(&array.element),
            TypeSig::CModReqd(modifier) | TypeSig::CModOpt(modifier) => Some(&modifier.next),
            TypeSig::ValueArray(value_array) => Some(&value_array.next),
            TypeSig::Module(module) => Some(&module.next),
            _ => None,
        }
    }

    /// The referenced type of a `Class` or `ValueType` node
    #[must_use]
    pub fn type_def_or_ref(&self) -> Option<&TypeDefOrRefSig> {
        match self {
            TypeSig::Class(t) | TypeSig::ValueType(t) => Some(t),
            _ => None,
        }
    }

    /// The resolved type behind a `Class` or `ValueType` node
    #[must_use]
    pub fn type_ref(&self) -> Option<&TypeRefRc> {
        self.type_def_or_ref().and_then(|t| t.type_ref.as_ref())
    }

    /// Returns the primitive this node is, if any
    #[must_use]
    pub fn corlib_type(&self) -> Option<CorLibType> {
        match self {
            TypeSig::CorLib(t) => Some(*t),
            _ => None,
        }
    }

    /// Returns true for a `Class` / `ValueType` node referencing `namespace.name`
    #[must_use]
    pub fn is_type(&self, namespace: &str, name: &str) -> bool {
        self.type_ref().is_some_and(|t| t.is(namespace, name))
    }

    /// Returns true if this node is a `Var` or `MVar`
    #[must_use]
    pub fn is_generic_parameter(&self) -> bool {
        matches!(self, TypeSig::Var(_) | TypeSig::MVar(_))
    }

    /// Returns true if a `Var` or `MVar` appears anywhere in this tree
    #[must_use]
    pub fn contains_generic_parameter(&self) -> bool {
        match self {
            TypeSig::Var(_) | TypeSig::MVar(_) => true,
            TypeSig::GenericInst(inst) => {
                inst.generic_type.contains_generic_parameter()
                    || inst.args.iter().any(|a| a.contains_generic_parameter())
            }
            TypeSig::FnPtr(sig) => sig.contains_generic_parameter(),
            other => other.next().is_some_and(|n| n.contains_generic_parameter()),
        }
    }

    /// Strips the `modreq`/`modopt` wrappers at the top of `sig`
    #[must_use]
    pub fn remove_modifiers(sig: &TypeSigRc) -> TypeSigRc {
        let mut current = sig;
        while let TypeSig::CModReqd(m) | TypeSig::CModOpt(m) = current.as_ref() {
            current = &m.next;
        }
        current.clone()
    }

    /// Strips the `pinned`, `modreq` and `modopt` wrappers at the top of `sig`
    #[must_use]
    pub fn remove_pinned_and_modifiers(sig: &TypeSigRc) -> TypeSigRc {
        let mut current = sig;
        loop {
            match current.as_ref() {
                TypeSig::CModReqd(m) | TypeSig::CModOpt(m) => current = &m.next,
                TypeSig::Pinned(next) => current = next,
                _ => return current.clone(),
            }
        }
    }

    /// Human readable name in reflection-like notation, e.g. `System.Int32[]`
    #[must_use]
    pub fn full_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSig::CorLib(t) => write!(f, "{t}"),
            TypeSig::Ptr(next) => write!(f, "{next}*"),
            TypeSig::ByRef(next) => write!(f, "{next}&"),
            TypeSig::SzArray(next) => write!(f, "{next}[]"),
            TypeSig::Pinned(next) => write!(f, "{next}"),
            TypeSig::ValueType(t) | TypeSig::Class(t) => f.write_str(&t.full_name()),
            TypeSig::Array(array) => {
                write!(f, "{}[", array.element)?;
                match array.rank {
                    0 => f.write_str("?")?,
                    1 if array.sizes.is_empty() && array.lower_bounds.is_empty() => {
                        f.write_str("*")?;
                    }
                    rank => {
                        for dim in 0..rank as usize {
                            if dim > 0 {
                                f.write_str(",")?;
                            }
                            let lower = array.lower_bounds.get(dim).copied();
                            match (lower, array.sizes.get(dim).copied()) {
                                (Some(lo), Some(size)) => {
                                    write!(f, "{}...{}", lo, i64::from(lo) + i64::from(size) - 1)?;
                                }
                                (Some(lo), None) => write!(f, "{lo}...")?,
                                (None, Some(size)) => write!(f, "0...{}", i64::from(size) - 1)?,
                                (None, None) => {}
                            }
                        }
                    }
                }
                f.write_str("]")
            }
            TypeSig::GenericInst(inst) => {
                write!(f, "{}<", inst.generic_type)?;
                for (i, arg) in inst.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
            TypeSig::Var(n) => write!(f, "!{n}"),
            TypeSig::MVar(n) => write!(f, "!!{n}"),
            TypeSig::FnPtr(sig) => write!(f, "method {sig}"),
            TypeSig::CModReqd(m) => write!(f, "{} modreq({})", m.next, m.modifier.full_name()),
            TypeSig::CModOpt(m) => write!(f, "{} modopt({})", m.next, m.modifier.full_name()),
            TypeSig::Sentinel => f.write_str("..."),
            TypeSig::ValueArray(v) => write!(f, "ValueArray<{}, {}>", v.next, v.size),
            TypeSig::Module(m) => write!(f, "[module:{}]{}", m.index, m.next),
        }
    }
}

/// The low nibble of a signature's first byte (II.23.2.1 - II.23.2.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum CallingConventionKind {
    /// Managed method, `default`
    Default = 0x0,
    /// Native `cdecl`
    C = 0x1,
    /// Native `stdcall`
    StdCall = 0x2,
    /// Native `thiscall`
    ThisCall = 0x3,
    /// Native `fastcall`
    FastCall = 0x4,
    /// Managed `vararg`
    VarArg = 0x5,
    /// Field signature
    Field = 0x6,
    /// Local variable signature
    LocalSig = 0x7,
    /// Property signature
    Property = 0x8,
    /// Unmanaged calling convention carried in modifiers
    Unmanaged = 0x9,
    /// Generic method instantiation (`MethodSpec`)
    GenericInst = 0xA,
    /// Native vararg
    NativeVarArg = 0xB,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// The high nibble flags of a signature's first byte
    pub struct CallingConventionFlags: u8 {
        /// The method has generic parameters
        const GENERIC = 0x10;
        /// Instance method, `this` is passed
        const HAS_THIS = 0x20;
        /// `this` is an explicit first parameter
        const EXPLICIT_THIS = 0x40;
    }
}

/// A raw calling-convention byte
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CallingConvention(pub u8);

impl CallingConvention {
    /// Mask selecting the kind nibble
    pub const KIND_MASK: u8 = 0x0F;

    /// Decodes the kind nibble, `None` for reserved values
    #[must_use]
    pub fn kind(self) -> Option<CallingConventionKind> {
        CallingConventionKind::from_repr(self.0 & Self::KIND_MASK)
    }

    /// The flag bits that are set
    #[must_use]
    pub fn flags(self) -> CallingConventionFlags {
        CallingConventionFlags::from_bits_truncate(self.0)
    }

    /// Generic method
    #[must_use]
    pub fn is_generic(self) -> bool {
        self.flags().contains(CallingConventionFlags::GENERIC)
    }

    /// Instance method
    #[must_use]
    pub fn has_this(self) -> bool {
        self.flags().contains(CallingConventionFlags::HAS_THIS)
    }

    /// Explicit `this`
    #[must_use]
    pub fn explicit_this(self) -> bool {
        self.flags().contains(CallingConventionFlags::EXPLICIT_THIS)
    }

    /// Managed vararg or native vararg
    #[must_use]
    pub fn is_vararg(self) -> bool {
        matches!(
            self.kind(),
            Some(CallingConventionKind::VarArg | CallingConventionKind::NativeVarArg)
        )
    }
}

impl fmt::Debug for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallingConvention(0x{:02x}, {:?}, {:?})", self.0, self.kind(), self.flags())
    }
}

/// Method, property or call-site signature (II.23.2.1 - II.23.2.3, II.23.2.5)
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    /// The calling-convention byte
    pub calling_convention: CallingConvention,
    /// Number of generic parameters, 0 unless the `GENERIC` flag is set
    pub generic_param_count: u32,
    /// Return type, or the property type
    pub ret_type: TypeSigRc,
    /// Fixed parameters
    pub params: Vec<TypeSigRc>,
    /// Parameters after the vararg sentinel, `None` if no sentinel was present
    pub params_after_sentinel: Option<Vec<TypeSigRc>>,
}

/// Field signature (II.23.2.4)
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSig {
    /// The calling-convention byte
    pub calling_convention: CallingConvention,
    /// The field type, including its custom modifiers
    pub field_type: TypeSigRc,
}

/// Local variable signature (II.23.2.6)
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSig {
    /// The calling-convention byte
    pub calling_convention: CallingConvention,
    /// Local types, pinned locals are wrapped in [`TypeSig::Pinned`]
    pub locals: Vec<TypeSigRc>,
}

/// Generic method instantiation (II.23.2.15)
#[derive(Debug, Clone, PartialEq)]
pub struct GenericInstMethodSig {
    /// The calling-convention byte
    pub calling_convention: CallingConvention,
    /// The method type arguments
    pub generic_args: Vec<TypeSigRc>,
}

/// A decoded signature blob
#[derive(Debug, Clone, PartialEq)]
pub enum CallingConventionSig {
    /// Method definition, reference or call site
    Method(MethodSig),
    /// Field
    Field(FieldSig),
    /// Property
    Property(MethodSig),
    /// Local variables
    Local(LocalSig),
    /// `MethodSpec` instantiation
    GenericInstMethod(GenericInstMethodSig),
}

impl CallingConventionSig {
    /// The calling-convention byte the blob started with
    #[must_use]
    pub fn calling_convention(&self) -> CallingConvention {
        match self {
            CallingConventionSig::Method(sig) | CallingConventionSig::Property(sig) => {
                sig.calling_convention
            }
            CallingConventionSig::Field(sig) => sig.calling_convention,
            CallingConventionSig::Local(sig) => sig.calling_convention,
            CallingConventionSig::GenericInstMethod(sig) => sig.calling_convention,
        }
    }

    /// The method signature of a `Method` or `Property`
    #[must_use]
    pub fn as_method(&self) -> Option<&MethodSig> {
        match self {
            CallingConventionSig::Method(sig) | CallingConventionSig::Property(sig) => Some(sig),
            _ => None,
        }
    }

    /// Returns true if a `Var` or `MVar` appears anywhere in the signature
    #[must_use]
    pub fn contains_generic_parameter(&self) -> bool {
        let any = |types: &[TypeSigRc]| types.iter().any(|t| t.contains_generic_parameter());
        match self {
            CallingConventionSig::Method(sig) | CallingConventionSig::Property(sig) => {
                sig.ret_type.contains_generic_parameter()
                    || any(&sig.params)
                    || sig.params_after_sentinel.as_deref().is_some_and(any)
            }
            CallingConventionSig::Field(sig) => sig.field_type.contains_generic_parameter(),
            CallingConventionSig::Local(sig) => any(&sig.locals),
            CallingConventionSig::GenericInstMethod(sig) => any(&sig.generic_args),
        }
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.calling_convention.has_this() {
            f.write_str("instance ")?;
        }
        write!(f, "{}", self.ret_type)?;
        if self.generic_param_count > 0 {
            write!(f, "<{}>", self.generic_param_count)?;
        }
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{param}")?;
        }
        if let Some(varargs) = &self.params_after_sentinel {
            if !self.params.is_empty() {
                f.write_str(",")?;
            }
            f.write_str("...")?;
            for param in varargs {
                write!(f, ",{param}")?;
            }
        }
        f.write_str(")")
    }
}

impl fmt::Display for CallingConventionSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallingConventionSig::Method(sig) => write!(f, "{sig}"),
            CallingConventionSig::Property(sig) => write!(f, "property {sig}"),
            CallingConventionSig::Field(sig) => write!(f, "{}", sig.field_type),
            CallingConventionSig::Local(sig) => {
                f.write_str("locals(")?;
                for (i, local) in sig.locals.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{local}")?;
                }
                f.write_str(")")
            }
            CallingConventionSig::GenericInstMethod(sig) => {
                f.write_str("<")?;
                for (i, arg) in sig.generic_args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::typesystem::CorLibTypes;

    fn class(namespace: &str, name: &str) -> TypeSigRc {
        Arc::new(TypeSig::Class(TypeDefOrRefSig::synthesized(TypeRef::new(
            namespace, name,
        ))))
    }

    #[test]
    fn calling_convention_bits() {
        let cc = CallingConvention(0x30);
        assert_eq!(cc.kind(), Some(CallingConventionKind::Default));
        assert!(cc.has_this());
        assert!(cc.is_generic());
        assert!(!cc.explicit_this());

        assert_eq!(CallingConvention(0x05).kind(), Some(CallingConventionKind::VarArg));
        assert!(CallingConvention(0x05).is_vararg());
        assert_eq!(CallingConvention(0x0C).kind(), None);
    }

    #[test]
    fn display_names() {
        let corlib = CorLibTypes::new();
        let int32 = corlib.int32();

        assert_eq!(TypeSig::SzArray(int32.clone()).to_string(), "System.Int32[]");
        assert_eq!(TypeSig::Ptr(int32.clone()).to_string(), "System.Int32*");
        assert_eq!(TypeSig::MVar(1).to_string(), "!!1");

        let list = TypeSig::GenericInst(GenericInstSig {
            generic_type: class("System.Collections.Generic", "List`1"),
            args: vec![corlib.string()],
        });
        assert_eq!(
            list.full_name(),
            "System.Collections.Generic.List`1<System.String>"
        );

        let array = TypeSig::Array(ArraySig {
            element: int32.clone(),
            rank: 2,
            sizes: vec![3],
            lower_bounds: vec![1, 0],
        });
        assert_eq!(array.to_string(), "System.Int32[1...3,0...]");

        let rank_zero = TypeSig::Array(ArraySig {
            element: int32,
            rank: 0,
            sizes: Vec::new(),
            lower_bounds: Vec::new(),
        });
        assert_eq!(rank_zero.to_string(), "System.Int32[?]");
    }

    #[test]
    fn modifier_stripping() {
        let corlib = CorLibTypes::new();
        let volatile = TypeDefOrRefSig::synthesized(TypeRef::new(
            "System.Runtime.CompilerServices",
            "IsVolatile",
        ));

        let pinned = Arc::new(TypeSig::Pinned(corlib.int32()));
        let wrapped = Arc::new(TypeSig::CModReqd(ModifierSig {
            modifier: volatile,
            next: pinned.clone(),
        }));

        assert!(Arc::ptr_eq(&TypeSig::remove_modifiers(&wrapped), &pinned));
        assert!(Arc::ptr_eq(
            &TypeSig::remove_pinned_and_modifiers(&wrapped),
            &corlib.int32()
        ));
        assert!(wrapped.to_string().contains("modreq(System.Runtime.CompilerServices.IsVolatile)"));
    }

    #[test]
    fn generic_parameter_detection() {
        let corlib = CorLibTypes::new();
        let nested = TypeSig::SzArray(Arc::new(TypeSig::GenericInst(GenericInstSig {
            generic_type: class("System", "Nullable`1"),
            args: vec![Arc::new(TypeSig::Var(0))],
        })));
        assert!(nested.contains_generic_parameter());
        assert!(!TypeSig::SzArray(corlib.object()).contains_generic_parameter());
    }
}
