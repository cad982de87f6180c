use std::{fmt, sync::Arc};

use crate::metadata::token::Token;

/// A reference to a `TypeRef` / `TypeDef` / `TypeSpec` row
pub type TypeRefRc = Arc<TypeRef>;

/// A resolved type handle as the blob decoders see it.
///
/// Produced by a [`crate::metadata::context::TypeResolver`] for a coded token, or
/// synthesized from a serialized type name. Synthesized references carry a null token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    /// The metadata token this handle was resolved from, null when synthesized
    pub token: Token,
    /// Namespace, empty for the global namespace and for nested types
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// Assembly the type lives in, when known
    pub scope: Option<String>,
    /// Enclosing type of a nested type
    pub declaring_type: Option<TypeRefRc>,
}

impl TypeRef {
    /// Creates a synthesized, unscoped reference
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        TypeRef {
            token: Token::new(0),
            namespace: namespace.to_string(),
            name: name.to_string(),
            scope: None,
            declaring_type: None,
        }
    }

    /// Creates a reference that originates from a metadata row
    #[must_use]
    pub fn with_token(token: Token, namespace: &str, name: &str) -> Self {
        TypeRef {
            token,
            ..TypeRef::new(namespace, name)
        }
    }

    /// Sets the resolution scope
    #[must_use]
    pub fn scoped(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    /// The `Namespace.Name` form, with `/` separating nested types
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.declaring_type {
            Some(outer) => format!("{}/{}", outer.full_name(), self.name),
            None if self.namespace.is_empty() => self.name.clone(),
            None => format!("{}.{}", self.namespace, self.name),
        }
    }

    /// Returns true when this handle names `namespace.name` at the top level
    #[must_use]
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.declaring_type.is_none() && self.namespace == namespace && self.name == name
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_names() {
        let outer = TypeRef::new("System", "Environment");
        assert_eq!(outer.full_name(), "System.Environment");

        let mut inner = TypeRef::new("", "SpecialFolder");
        inner.declaring_type = Some(Arc::new(outer));
        assert_eq!(inner.full_name(), "System.Environment/SpecialFolder");
        assert_eq!(TypeRef::new("", "Global").full_name(), "Global");
    }
}
