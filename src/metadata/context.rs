//! Per-module decoding context.
//!
//! Everything the blob decoders need from the surrounding module lives here, behind an
//! explicit [`ModuleContext`] that is built when a module is loaded and dropped with it:
//!
//! - [`TypeResolver`] - The seam to the metadata tables (coded tokens, enum underlying types, type names)
//! - [`CorLibTypes`] - The shared primitive signature nodes
//! - [`DecoderOptions`] - Limits and heuristics
//! - A concurrent cache of resolved coded tokens
//!
//! Nothing in this module is global. Two modules decoded side by side never share
//! singletons or caches.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use cilblob::metadata::context::{DecoderOptions, ModuleContext, NullResolver};
//!
//! let ctx = ModuleContext::with_options(Arc::new(NullResolver), DecoderOptions::strict());
//! assert!(!ctx.options().enum_underlying_heuristic);
//! ```

use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    metadata::{
        signatures::TypeSigRc,
        token::Token,
        typesystem::{CorLibType, CorLibTypes, TypeNameParser, TypeRef, TypeRefRc},
    },
    utils::{RecursionCounter, MAX_RECURSION_DEPTH},
};

/// How an unqualified serialized type name is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeNameSearch {
    /// Search the current module, then the core library. Used by custom attributes, the
    /// custom marshaler type and security attribute types.
    #[default]
    CurrentModuleThenCorLib,
    /// Only the assembly named in the type name is searched. Used by the safe-array
    /// user-defined sub type.
    NoImplicitAssembly,
}

/// Outcome of asking a [`TypeResolver`] for the underlying type of an enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumResolution {
    /// The type is an enum with this underlying primitive
    Enum(CorLibType),
    /// The type was resolved and is not an enum
    NotEnum,
    /// The type definition could not be found
    Unresolved,
}

/// Access to the metadata tables that the blob decoders depend on.
///
/// Implementations must be thread safe. A single resolver is shared by every decode of a
/// module, including concurrent ones.
pub trait TypeResolver: Send + Sync {
    /// Resolves a `TypeDef`, `TypeRef` or `TypeSpec` token.
    fn resolve_type_def_or_ref(&self, token: Token) -> Option<TypeRefRc>;

    /// Returns the underlying type of `type_ref` if it names an enum.
    fn enum_underlying_type(&self, _type_ref: &TypeRef) -> EnumResolution {
        EnumResolution::Unresolved
    }

    /// Parses a serialized (reflection) type name.
    ///
    /// The default runs [`TypeNameParser`] with `search`: arrays, pointers, by-refs and
    /// generic instantiations become the matching signature nodes, corlib primitives map
    /// onto the shared singletons when the core library is visible, and every other named
    /// type becomes a synthesized class reference. A name that does not parse yields `None`.
    fn parse_type_name(
        &self,
        type_name: &str,
        search: TypeNameSearch,
        corlib: &CorLibTypes,
    ) -> Option<TypeSigRc> {
        match TypeNameParser::new(type_name, search, corlib).parse() {
            Ok(sig) => Some(sig),
            Err(error) => {
                log::debug!("type name '{type_name}' not parsed: {error}");
                None
            }
        }
    }
}

/// A resolver that knows no types at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResolver;

impl TypeResolver for NullResolver {
    fn resolve_type_def_or_ref(&self, _token: Token) -> Option<TypeRefRc> {
        None
    }
}

/// Limits and heuristics applied by every decoder of a [`ModuleContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Nesting ceiling shared by all recursive decode paths (default: 100)
    pub max_recursion_depth: usize,

    /// Largest rank, sizes count and lower-bounds count accepted in an array signature (default: 64)
    pub max_array_rank: u32,

    /// Lookup policy for type names embedded in custom attribute and security blobs
    pub ca_type_search: TypeNameSearch,

    /// Assume `Int32` when the underlying type of an enum argument cannot be resolved,
    /// accepting the guess only if the blob is consumed exactly
    pub enum_underlying_heuristic: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            max_recursion_depth: MAX_RECURSION_DEPTH,
            max_array_rank: 64,
            ca_type_search: TypeNameSearch::CurrentModuleThenCorLib,
            enum_underlying_heuristic: true,
        }
    }
}

impl DecoderOptions {
    /// Never guess: an enum argument whose underlying type is unknown fails the decode
    #[must_use]
    pub fn strict() -> Self {
        Self {
            enum_underlying_heuristic: false,
            ..Self::default()
        }
    }

    /// Same behavior as the CLR tooling: the `Int32` enum guess is enabled
    #[must_use]
    pub fn lenient() -> Self {
        Self::default()
    }
}

/// Arity of the generic owner a signature is declared in.
///
/// When an arity is known, a `Var`/`MVar` placeholder indexing past it is malformed.
/// Unknown arity disables the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenericParamContext {
    /// Generic parameter count of the declaring type
    pub type_arity: Option<u32>,
    /// Generic parameter count of the declaring method
    pub method_arity: Option<u32>,
}

impl GenericParamContext {
    /// Context of a member declared on a type with `type_arity` generic parameters and
    /// itself taking `method_arity` generic parameters.
    #[must_use]
    pub fn new(type_arity: u32, method_arity: u32) -> Self {
        GenericParamContext {
            type_arity: Some(type_arity),
            method_arity: Some(method_arity),
        }
    }

    /// Returns true when `Var(index)` may appear
    #[must_use]
    pub fn allows_var(&self, index: u32) -> bool {
        self.type_arity.is_none_or(|arity| index < arity)
    }

    /// Returns true when `MVar(index)` may appear
    #[must_use]
    pub fn allows_mvar(&self, index: u32) -> bool {
        self.method_arity.is_none_or(|arity| index < arity)
    }
}

/// Everything a decode call borrows from the module it belongs to.
pub struct ModuleContext {
    corlib: CorLibTypes,
    resolver: Arc<dyn TypeResolver>,
    options: DecoderOptions,
    type_cache: DashMap<Token, Option<TypeRefRc>>,
}

impl ModuleContext {
    /// Creates a context with default options
    #[must_use]
    pub fn new(resolver: Arc<dyn TypeResolver>) -> Self {
        Self::with_options(resolver, DecoderOptions::default())
    }

    /// Creates a context with explicit options
    #[must_use]
    pub fn with_options(resolver: Arc<dyn TypeResolver>, options: DecoderOptions) -> Self {
        ModuleContext {
            corlib: CorLibTypes::new(),
            resolver,
            options,
            type_cache: DashMap::new(),
        }
    }

    /// The primitive singletons of this module
    #[must_use]
    pub fn corlib(&self) -> &CorLibTypes {
        &self.corlib
    }

    /// The decoder options
    #[must_use]
    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    /// The underlying resolver
    #[must_use]
    pub fn resolver(&self) -> &dyn TypeResolver {
        self.resolver.as_ref()
    }

    /// Resolves a `TypeDefOrRef` token, consulting the per-module cache first.
    ///
    /// Failed resolutions are cached as well.
    #[must_use]
    pub fn resolve_type(&self, token: Token) -> Option<TypeRefRc> {
        if let Some(hit) = self.type_cache.get(&token) {
            return hit.value().clone();
        }

        let resolved = self.resolver.resolve_type_def_or_ref(token);
        self.type_cache.insert(token, resolved.clone());
        resolved
    }

    /// Asks the resolver for the underlying type of an enum
    #[must_use]
    pub fn enum_underlying_type(&self, type_ref: &TypeRef) -> EnumResolution {
        self.resolver.enum_underlying_type(type_ref)
    }

    /// Parses a serialized type name
    #[must_use]
    pub fn parse_type_name(&self, type_name: &str, search: TypeNameSearch) -> Option<TypeSigRc> {
        self.resolver.parse_type_name(type_name, search, &self.corlib)
    }

    /// Number of cached token resolutions
    #[must_use]
    pub fn cached_types(&self) -> usize {
        self.type_cache.len()
    }

    /// A fresh recursion counter for one decode call
    #[must_use]
    pub fn recursion_counter(&self) -> RecursionCounter {
        RecursionCounter::with_limit(self.options.max_recursion_depth)
    }
}

impl Default for ModuleContext {
    fn default() -> Self {
        Self::new(Arc::new(NullResolver))
    }
}
