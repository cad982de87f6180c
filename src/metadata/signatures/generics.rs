//! Substitution of generic parameter placeholders.
//!
//! [`GenericArguments`] keeps two independent stacks of argument lists, one for type-level
//! (`!n`) and one for method-level (`!!n`) placeholders. A list is pushed when decoding
//! enters a generic instantiation and popped when it leaves, so nested instantiations see
//! their own arguments first and fall back to the enclosing ones.

use std::sync::Arc;

use crate::{
    metadata::signatures::{
        ArraySig, CallingConventionSig, GenericInstSig, MethodSig, ModifierSig, ModuleSig,
        TypeSig, TypeSigRc, ValueArraySig,
    },
    utils::RecursionCounter,
    Result,
};

/// Stacked generic arguments of the enclosing instantiations.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use cilblob::metadata::{
///     signatures::{GenericArguments, TypeSig},
///     typesystem::CorLibTypes,
/// };
///
/// let corlib = CorLibTypes::new();
/// let mut generic_args = GenericArguments::new();
///
/// let var0 = Arc::new(TypeSig::Var(0));
/// let resolved = generic_args.with_type_args(vec![corlib.int32()], |args| args.resolve(&var0));
/// assert!(Arc::ptr_eq(&resolved, &corlib.int32()));
/// ```
#[derive(Debug, Default, Clone)]
pub struct GenericArguments {
    type_args: Vec<Vec<TypeSigRc>>,
    method_args: Vec<Vec<TypeSigRc>>,
}

impl GenericArguments {
    /// Creates empty stacks
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes the arguments of a generic type instantiation
    pub fn push_type_args(&mut self, args: Vec<TypeSigRc>) {
        self.type_args.push(args);
    }

    /// Pops the innermost type arguments
    pub fn pop_type_args(&mut self) -> Option<Vec<TypeSigRc>> {
        self.type_args.pop()
    }

    /// Pushes the arguments of a generic method instantiation
    pub fn push_method_args(&mut self, args: Vec<TypeSigRc>) {
        self.method_args.push(args);
    }

    /// Pops the innermost method arguments
    pub fn pop_method_args(&mut self) -> Option<Vec<TypeSigRc>> {
        self.method_args.pop()
    }

    /// Runs `f` with `args` pushed as the innermost type arguments
    pub fn with_type_args<R>(&mut self, args: Vec<TypeSigRc>, f: impl FnOnce(&mut Self) -> R) -> R {
        self.type_args.push(args);
        let result = f(self);
        self.type_args.pop();
        result
    }

    /// Runs `f` with `args` pushed as the innermost method arguments
    pub fn with_method_args<R>(
        &mut self,
        args: Vec<TypeSigRc>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        self.method_args.push(args);
        let result = f(self);
        self.method_args.pop();
        result
    }

    /// Returns true if no arguments are pushed at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.type_args.is_empty() && self.method_args.is_empty()
    }

    /// Substitutes a top-level `Var` / `MVar` placeholder.
    ///
    /// If the innermost argument is itself a placeholder of the same kind, the lookup
    /// continues in the enclosing argument list. An index past the end of a list, or an
    /// empty stack, leaves the placeholder as it is. Every other shape is returned unchanged.
    #[must_use]
    pub fn resolve(&self, sig: &TypeSigRc) -> TypeSigRc {
        let (stack, mut number, is_type_var) = match sig.as_ref() {
            TypeSig::Var(n) => (&self.type_args, *n, true),
            TypeSig::MVar(n) => (&self.method_args, *n, false),
            _ => return sig.clone(),
        };

        let mut result: Option<&TypeSigRc> = None;
        for args in stack.iter().rev() {
            let Some(arg) = args.get(number as usize) else {
                break;
            };

            match (arg.as_ref(), is_type_var) {
                (TypeSig::Var(n), true) | (TypeSig::MVar(n), false) => {
                    result = Some(arg);
                    number = *n;
                }
                _ => return arg.clone(),
            }
        }

        result.unwrap_or(sig).clone()
    }

    /// Substitutes placeholders throughout `sig`.
    ///
    /// Sub-trees without placeholders are shared with the input, not copied.
    ///
    /// # Errors
    /// Returns [`crate::Error::RecursionLimit`] if `sig` is nested too deep
    pub fn instantiate(&self, sig: &TypeSigRc) -> Result<TypeSigRc> {
        let mut depth = RecursionCounter::new();
        self.instantiate_guarded(sig, &mut depth)
    }

    /// Substitutes placeholders in the return and parameter types of `sig`
    ///
    /// # Errors
    /// Returns [`crate::Error::RecursionLimit`] if a type is nested too deep
    pub fn instantiate_method_sig(&self, sig: &MethodSig) -> Result<MethodSig> {
        let mut depth = RecursionCounter::new();
        self.instantiate_method(sig, &mut depth)
    }

    fn instantiate_method(&self, sig: &MethodSig, depth: &mut RecursionCounter) -> Result<MethodSig> {
        let params_after_sentinel = match &sig.params_after_sentinel {
            Some(params) => Some(self.instantiate_all(params, depth)?),
            None => None,
        };

        Ok(MethodSig {
            calling_convention: sig.calling_convention,
            generic_param_count: sig.generic_param_count,
            ret_type: self.instantiate_guarded(&sig.ret_type, depth)?,
            params: self.instantiate_all(&sig.params, depth)?,
            params_after_sentinel,
        })
    }

    fn instantiate_all(
        &self,
        sigs: &[TypeSigRc],
        depth: &mut RecursionCounter,
    ) -> Result<Vec<TypeSigRc>> {
        sigs.iter()
            .map(|sig| self.instantiate_guarded(sig, depth))
            .collect()
    }

    fn instantiate_guarded(&self, sig: &TypeSigRc, depth: &mut RecursionCounter) -> Result<TypeSigRc> {
        depth.enter()?;
        let result = self.instantiate_node(sig, depth);
        depth.leave();
        result
    }

    fn rewrap(
        &self,
        sig: &TypeSigRc,
        next: &TypeSigRc,
        depth: &mut RecursionCounter,
        wrap: impl FnOnce(TypeSigRc) -> TypeSig,
    ) -> Result<TypeSigRc> {
        let instantiated = self.instantiate_guarded(next, depth)?;
        if Arc::ptr_eq(&instantiated, next) {
            Ok(sig.clone())
        } else {
            Ok(Arc::new(wrap(instantiated)))
        }
    }

    fn instantiate_node(&self, sig: &TypeSigRc, depth: &mut RecursionCounter) -> Result<TypeSigRc> {
        match sig.as_ref() {
            TypeSig::Var(_) | TypeSig::MVar(_) => Ok(self.resolve(sig)),
            TypeSig::CorLib(_) | TypeSig::ValueType(_) | TypeSig::Class(_) | TypeSig::Sentinel => {
                Ok(sig.clone())
            }
            TypeSig::Ptr(next) => self.rewrap(sig, next, depth, TypeSig::Ptr),
            TypeSig::ByRef(next) => self.rewrap(sig, next, depth, TypeSig::ByRef),
            TypeSig::SzArray(next) => self.rewrap(sig, next, depth, TypeSig::SzArray),
            TypeSig::Pinned(next) => self.rewrap(sig, next, depth, TypeSig::Pinned),
            TypeSig::Array(array) => self.rewrap(sig, &array.element, depth, |element| {
                TypeSig::Array(ArraySig {
                    element,
                    rank: array.rank,
                    sizes: array.sizes.clone(),
                    lower_bounds: array.lower_bounds.clone(),
                })
            }),
            TypeSig::CModReqd(m) => self.rewrap(sig, &m.next, depth, |next| {
                TypeSig::CModReqd(ModifierSig {
                    modifier: m.modifier.clone(),
                    next,
                })
            }),
            TypeSig::CModOpt(m) => self.rewrap(sig, &m.next, depth, |next| {
                TypeSig::CModOpt(ModifierSig {
                    modifier: m.modifier.clone(),
                    next,
                })
            }),
            TypeSig::ValueArray(v) => self.rewrap(sig, &v.next, depth, |next| {
                TypeSig::ValueArray(ValueArraySig { next, size: v.size })
            }),
            TypeSig::Module(m) => self.rewrap(sig, &m.next, depth, |next| {
                TypeSig::Module(ModuleSig {
                    index: m.index,
                    next,
                })
            }),
            TypeSig::GenericInst(inst) => {
                let args = self.instantiate_all(&inst.args, depth)?;
                if args.iter().zip(&inst.args).all(|(new, old)| Arc::ptr_eq(new, old)) {
                    return Ok(sig.clone());
                }

                Ok(Arc::new(TypeSig::GenericInst(GenericInstSig {
                    generic_type: inst.generic_type.clone(),
                    args,
                })))
            }
            TypeSig::FnPtr(nested) => match nested.as_ref() {
                CallingConventionSig::Method(method) if nested.contains_generic_parameter() => {
                    let instantiated = self.instantiate_method(method, depth)?;
                    Ok(Arc::new(TypeSig::FnPtr(Arc::new(
                        CallingConventionSig::Method(instantiated),
                    ))))
                }
                _ => Ok(sig.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            signatures::TypeDefOrRefSig,
            typesystem::{CorLibTypes, TypeRef},
        },
        Error,
    };

    fn list_of(arg: TypeSigRc) -> TypeSigRc {
        Arc::new(TypeSig::GenericInst(GenericInstSig {
            generic_type: Arc::new(TypeSig::Class(TypeDefOrRefSig::synthesized(TypeRef::new(
                "System.Collections.Generic",
                "List`1",
            )))),
            args: vec![arg],
        }))
    }

    #[test]
    fn resolves_pushed_argument() {
        let corlib = CorLibTypes::new();
        let mut generic_args = GenericArguments::new();
        generic_args.push_type_args(vec![corlib.int32()]);

        let resolved = generic_args.resolve(&Arc::new(TypeSig::Var(0)));
        assert!(Arc::ptr_eq(&resolved, &corlib.int32()));

        // Method placeholders use their own stack
        let mvar = Arc::new(TypeSig::MVar(0));
        assert!(Arc::ptr_eq(&generic_args.resolve(&mvar), &mvar));
    }

    #[test]
    fn out_of_range_is_unchanged() {
        let corlib = CorLibTypes::new();
        let mut generic_args = GenericArguments::new();

        let var5 = Arc::new(TypeSig::Var(5));
        assert!(Arc::ptr_eq(&generic_args.resolve(&var5), &var5));

        generic_args.push_type_args(vec![corlib.int32()]);
        assert!(Arc::ptr_eq(&generic_args.resolve(&var5), &var5));
    }

    #[test]
    fn walks_enclosing_frames() {
        let corlib = CorLibTypes::new();
        let mut generic_args = GenericArguments::new();

        generic_args.push_type_args(vec![corlib.string(), corlib.int32()]);
        generic_args.push_type_args(vec![Arc::new(TypeSig::Var(1))]);

        let resolved = generic_args.resolve(&Arc::new(TypeSig::Var(0)));
        assert!(Arc::ptr_eq(&resolved, &corlib.int32()));

        assert_eq!(generic_args.pop_type_args().map(|a| a.len()), Some(1));
        assert_eq!(generic_args.pop_type_args().map(|a| a.len()), Some(2));
        assert!(generic_args.is_empty());
    }

    #[test]
    fn frame_chain_stops_at_missing_index() {
        let corlib = CorLibTypes::new();
        let mut generic_args = GenericArguments::new();

        generic_args.push_type_args(vec![corlib.int32()]);
        generic_args.push_type_args(vec![Arc::new(TypeSig::Var(3))]);

        let resolved = generic_args.resolve(&Arc::new(TypeSig::Var(0)));
        assert_eq!(*resolved, TypeSig::Var(3));
    }

    #[test]
    fn scoped_helpers_pop() {
        let corlib = CorLibTypes::new();
        let mut generic_args = GenericArguments::new();

        let inner = generic_args.with_method_args(vec![corlib.string()], |args| {
            args.with_type_args(vec![corlib.object()], |args| {
                (
                    args.resolve(&Arc::new(TypeSig::MVar(0))),
                    args.resolve(&Arc::new(TypeSig::Var(0))),
                )
            })
        });

        assert!(Arc::ptr_eq(&inner.0, &corlib.string()));
        assert!(Arc::ptr_eq(&inner.1, &corlib.object()));
        assert!(generic_args.is_empty());
    }

    #[test]
    fn deep_instantiation() {
        let corlib = CorLibTypes::new();
        let mut generic_args = GenericArguments::new();
        generic_args.push_type_args(vec![corlib.int32()]);

        let open = Arc::new(TypeSig::SzArray(list_of(Arc::new(TypeSig::Var(0)))));
        let closed = generic_args.instantiate(&open).unwrap();
        assert_eq!(
            closed.to_string(),
            "System.Collections.Generic.List`1<System.Int32>[]"
        );

        let untouched = Arc::new(TypeSig::SzArray(list_of(corlib.string())));
        assert!(Arc::ptr_eq(
            &generic_args.instantiate(&untouched).unwrap(),
            &untouched
        ));
    }

    #[test]
    fn deep_instantiation_is_bounded() {
        let generic_args = GenericArguments::new();
        let mut sig = Arc::new(TypeSig::Var(0));
        for _ in 0..150 {
            sig = Arc::new(TypeSig::Ptr(sig));
        }

        assert!(matches!(
            generic_args.instantiate(&sig),
            Err(Error::RecursionLimit(_))
        ));
    }
}
