use std::fmt;

use crate::metadata::{customattributes::CANamedArgument, signatures::TypeSigRc};

/// Security actions as defined in ECMA-335 and .NET Framework
///
/// These values control how permissions are applied to code elements (methods, types, assemblies).
/// Each action has different semantics for how the CLR enforces permissions.
///
/// # Reference
/// * ECMA-335 II.20 + II.22.11
/// * <https://learn.microsoft.com/en-us/dotnet/api/system.security.permissions.securityaction>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityAction {
    /// Without further checks, refuse Demand for the specified permission.
    Deny,
    /// Check that all callers in the call chain have been granted specified permission.
    Demand,
    /// Without further checks, satisfy Demand for the specified permission.
    Assert,
    /// Check that the current assembly has been granted the specified permission.
    NonCasDemand,
    /// Check that the immediate caller has been granted the specified permission.
    LinkDemand,
    /// The specified permission shall be granted in order to inherit from class or override virtual method.
    InheritanceDemand,
    /// Specify the minimum permissions required to run.
    RequestMinimum,
    /// Specify the optional permissions to grant.
    RequestOptional,
    /// Specify the permissions not to be granted.
    RequestRefuse,
    /// Reserved for prejitting.
    PrejitGrant,
    /// Reserved for prejitting.
    PrejitDeny,
    /// Non-CAS version of `LinkDemand`.
    NonCasLinkDemand,
    /// Non-CAS version of `InheritanceDemand`.
    NonCasInheritance,
    /// Link demand for one of the given permissions.
    LinkDemandChoice,
    /// Inheritance demand for one of the given permissions.
    InheritanceDemandChoice,
    /// Demand for one of the given permissions.
    DemandChoice,
    /// Without further checks, refuse Demand for all permissions other than those specified.
    PermitOnly,
    /// Unknown security action.
    Unknown(u16),
}

impl From<u16> for SecurityAction {
    fn from(value: u16) -> Self {
        match value {
            0x0001 => SecurityAction::Deny,
            0x0002 => SecurityAction::Demand,
            0x0003 => SecurityAction::Assert,
            0x0004 => SecurityAction::NonCasDemand,
            0x0005 => SecurityAction::LinkDemand,
            0x0006 => SecurityAction::InheritanceDemand,
            0x0007 => SecurityAction::RequestMinimum,
            0x0008 => SecurityAction::RequestOptional,
            0x0009 => SecurityAction::RequestRefuse,
            0x000A => SecurityAction::PrejitGrant,
            0x000B => SecurityAction::PrejitDeny,
            0x000C => SecurityAction::NonCasLinkDemand,
            0x000D => SecurityAction::NonCasInheritance,
            0x000E => SecurityAction::LinkDemandChoice,
            0x000F => SecurityAction::InheritanceDemandChoice,
            0x0010 => SecurityAction::DemandChoice,
            0x0011 => SecurityAction::PermitOnly,
            _ => SecurityAction::Unknown(value),
        }
    }
}

impl From<SecurityAction> for u16 {
    fn from(action: SecurityAction) -> Self {
        match action {
            SecurityAction::Deny => 0x0001,
            SecurityAction::Demand => 0x0002,
            SecurityAction::Assert => 0x0003,
            SecurityAction::NonCasDemand => 0x0004,
            SecurityAction::LinkDemand => 0x0005,
            SecurityAction::InheritanceDemand => 0x0006,
            SecurityAction::RequestMinimum => 0x0007,
            SecurityAction::RequestOptional => 0x0008,
            SecurityAction::RequestRefuse => 0x0009,
            SecurityAction::PrejitGrant => 0x000A,
            SecurityAction::PrejitDeny => 0x000B,
            SecurityAction::NonCasLinkDemand => 0x000C,
            SecurityAction::NonCasInheritance => 0x000D,
            SecurityAction::LinkDemandChoice => 0x000E,
            SecurityAction::InheritanceDemandChoice => 0x000F,
            SecurityAction::DemandChoice => 0x0010,
            SecurityAction::PermitOnly => 0x0011,
            SecurityAction::Unknown(value) => value,
        }
    }
}

/// One security attribute of a declarative security blob
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityAttribute {
    /// The attribute type, `None` if its name did not parse
    pub attribute_type: Option<TypeSigRc>,
    /// The attribute type name as stored in the blob
    pub type_name: String,
    /// Property and field assignments
    pub named_args: Vec<CANamedArgument>,
}

impl SecurityAttribute {
    /// Looks up a named argument by field or property name
    #[must_use]
    pub fn named(&self, name: &str) -> Option<&CANamedArgument> {
        self.named_args.iter().find(|arg| arg.name == name)
    }
}

impl fmt::Display for SecurityAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attribute_type {
            Some(ty) => write!(f, "[{ty}(")?,
            None => write!(f, "[{}(", self.type_name)?,
        }
        for (i, arg) in self.named_args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")]")
    }
}

/// A `DeclSecurity` row: an action and the decoded permission set blob
#[derive(Debug, Clone, PartialEq)]
pub struct DeclSecurity {
    /// How the permissions are enforced
    pub action: SecurityAction,
    /// The decoded attributes, empty if the blob could not be decoded
    pub attributes: Vec<SecurityAttribute>,
    /// The permission set blob as stored
    pub raw: Vec<u8>,
}

impl DeclSecurity {
    /// Returns true if the blob holds data but none of it could be decoded
    #[must_use]
    pub fn is_undecoded(&self) -> bool {
        self.attributes.is_empty() && !self.raw.is_empty()
    }
}
