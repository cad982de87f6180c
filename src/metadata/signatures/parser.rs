use std::sync::Arc;

use crate::{
    file::parser::Parser,
    metadata::{
        context::{GenericParamContext, ModuleContext},
        signatures::{
            ArraySig, CallingConvention, CallingConventionKind, CallingConventionSig, FieldSig,
            GenericInstMethodSig, GenericInstSig, LocalSig, MethodSig, ModifierSig, ModuleSig,
            TypeDefOrRefSig, TypeSig, TypeSigRc, ValueArraySig,
        },
        typesystem::ELEMENT_TYPE,
    },
    utils::RecursionCounter,
    Error::NotSupported,
    Result,
};

/// Signature parser that handles all signature kinds of ECMA-335 §II.23.2
///
/// Each instance owns its cursor and a fresh [`RecursionCounter`]. Every recursive type
/// position (chain element, array element, generic argument, custom modifier, nested
/// function pointer) enters the counter before recursing, so adversarial nesting ends in
/// [`crate::Error::RecursionLimit`] instead of a stack overflow.
///
/// Any error aborts the whole signature. There are no partially built results.
///
/// # Example
///
/// ```rust
/// use cilblob::metadata::{context::ModuleContext, signatures::SignatureParser};
///
/// let ctx = ModuleContext::default();
/// // instance void (string)
/// let mut parser = SignatureParser::new(&[0x20, 0x01, 0x01, 0x0E], &ctx);
/// let sig = parser.parse_method_signature()?;
/// assert_eq!(sig.params.len(), 1);
/// # Ok::<(), cilblob::Error>(())
/// ```
///
/// ## Notes:
/// - Besides ECMA-335, it's also worth looking at <https://github.com/dotnet/runtime/blob/main/docs/design/coreclr/profiling/davbr-blog-archive/samples/sigparse.cpp>
/// - Do not re-use a parser instance for multiple signatures.
pub struct SignatureParser<'a, 'c> {
    parser: Parser<'a>,
    context: &'c ModuleContext,
    generic_context: GenericParamContext,
    depth: RecursionCounter,
}

impl<'a, 'c> SignatureParser<'a, 'c> {
    /// Create a new `SignatureParser` from a byte slice
    ///
    /// ## Arguments
    /// * 'data'    - The byte slice to read from
    /// * 'context' - The module the signature belongs to
    #[must_use]
    pub fn new(data: &'a [u8], context: &'c ModuleContext) -> Self {
        SignatureParser {
            parser: Parser::new(data),
            context,
            generic_context: GenericParamContext::default(),
            depth: context.recursion_counter(),
        }
    }

    /// Checks `Var`/`MVar` indices against the arity of the declaring type and method
    #[must_use]
    pub fn with_generic_context(mut self, generic_context: GenericParamContext) -> Self {
        self.generic_context = generic_context;
        self
    }

    /// Number of bytes consumed so far
    #[must_use]
    pub fn position(&self) -> usize {
        self.parser.pos()
    }

    /// Parse any signature, dispatching on the calling-convention byte
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for the `Unmanaged` and `NativeVarArg` kinds and
    /// an error for malformed or truncated data
    pub fn parse_signature(&mut self) -> Result<CallingConventionSig> {
        let cc = CallingConvention(self.parser.read_le::<u8>()?);
        match cc.kind() {
            Some(
                CallingConventionKind::Default
                | CallingConventionKind::C
                | CallingConventionKind::StdCall
                | CallingConventionKind::ThisCall
                | CallingConventionKind::FastCall
                | CallingConventionKind::VarArg,
            ) => Ok(CallingConventionSig::Method(self.read_method(cc)?)),
            Some(CallingConventionKind::Field) => {
                Ok(CallingConventionSig::Field(self.read_field(cc)?))
            }
            Some(CallingConventionKind::Property) => {
                Ok(CallingConventionSig::Property(self.read_method(cc)?))
            }
            Some(CallingConventionKind::LocalSig) => {
                Ok(CallingConventionSig::Local(self.read_locals(cc)?))
            }
            Some(CallingConventionKind::GenericInst) => Ok(
                CallingConventionSig::GenericInstMethod(self.read_generic_inst_method(cc)?),
            ),
            Some(CallingConventionKind::Unmanaged | CallingConventionKind::NativeVarArg) => {
                Err(NotSupported)
            }
            None => Err(malformed_error!(
                "Invalid calling convention - 0x{:02X}",
                cc.0
            )),
        }
    }

    /// Parse a method signature from the blob - `MethodDefSig`, `MethodRefSig`, `StandAloneMethodSig`
    ///
    /// # Errors
    /// Returns an error if the blob is not a method signature or is malformed
    pub fn parse_method_signature(&mut self) -> Result<MethodSig> {
        match self.parse_signature()? {
            CallingConventionSig::Method(sig) => Ok(sig),
            other => Err(malformed_error!(
                "Expected a method signature - got 0x{:02X}",
                other.calling_convention().0
            )),
        }
    }

    /// Parse a field signature from the blob - `FieldSig`
    ///
    /// # Errors
    /// Returns an error if the blob is not a field signature or is malformed
    pub fn parse_field_signature(&mut self) -> Result<FieldSig> {
        match self.parse_signature()? {
            CallingConventionSig::Field(sig) => Ok(sig),
            other => Err(malformed_error!(
                "Expected a field signature - got 0x{:02X}",
                other.calling_convention().0
            )),
        }
    }

    /// Parse a property signature from the blob - `PropertySig`
    ///
    /// # Errors
    /// Returns an error if the blob is not a property signature or is malformed
    pub fn parse_property_signature(&mut self) -> Result<MethodSig> {
        match self.parse_signature()? {
            CallingConventionSig::Property(sig) => Ok(sig),
            other => Err(malformed_error!(
                "Expected a property signature - got 0x{:02X}",
                other.calling_convention().0
            )),
        }
    }

    /// Parse a local variable signature from the blob - `LocalVarSig`
    ///
    /// # Errors
    /// Returns an error if the blob is not a local variable signature or is malformed
    pub fn parse_local_var_signature(&mut self) -> Result<LocalSig> {
        match self.parse_signature()? {
            CallingConventionSig::Local(sig) => Ok(sig),
            other => Err(malformed_error!(
                "Expected a local variable signature - got 0x{:02X}",
                other.calling_convention().0
            )),
        }
    }

    /// Parse a generic method instantiation from the blob - `MethodSpec`
    ///
    /// # Errors
    /// Returns an error if the blob is not a method specification or is malformed
    pub fn parse_method_spec_signature(&mut self) -> Result<GenericInstMethodSig> {
        match self.parse_signature()? {
            CallingConventionSig::GenericInstMethod(sig) => Ok(sig),
            other => Err(malformed_error!(
                "Expected a method specification - got 0x{:02X}",
                other.calling_convention().0
            )),
        }
    }

    /// Parse a type specification from the blob - `TypeSpec`
    ///
    /// # Errors
    /// Returns an error if the type is malformed
    pub fn parse_type_spec_signature(&mut self) -> Result<TypeSigRc> {
        self.parse_type()
    }

    /// Parse a single type from the signature blob
    ///
    /// # Errors
    /// Returns an error if the type is malformed or nested too deep
    pub fn parse_type(&mut self) -> Result<TypeSigRc> {
        self.guarded(Self::read_type_node)
    }

    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.depth.enter()?;
        let result = f(self);
        self.depth.leave();
        result
    }

    fn capacity(&self, count: u32) -> usize {
        (count as usize).min(self.parser.remaining())
    }

    fn read_method(&mut self, calling_convention: CallingConvention) -> Result<MethodSig> {
        let generic_param_count = if calling_convention.is_generic() {
            self.parser.read_compressed_uint()?
        } else {
            0
        };

        let param_count = self.parser.read_compressed_uint()?;
        let ret_type = self.parse_type()?;

        let mut params = Vec::with_capacity(self.capacity(param_count));
        let mut params_after_sentinel: Option<Vec<TypeSigRc>> = None;

        // The sentinel does not count towards the parameter count
        let mut read = 0;
        while read < param_count {
            let param = self.parse_type()?;
            if matches!(param.as_ref(), TypeSig::Sentinel) {
                if params_after_sentinel.is_none() {
                    params_after_sentinel =
                        Some(Vec::with_capacity(self.capacity(param_count - read)));
                }
                continue;
            }

            match params_after_sentinel.as_mut() {
                Some(varargs) => varargs.push(param),
                None => params.push(param),
            }
            read += 1;
        }

        Ok(MethodSig {
            calling_convention,
            generic_param_count,
            ret_type,
            params,
            params_after_sentinel,
        })
    }

    fn read_field(&mut self, calling_convention: CallingConvention) -> Result<FieldSig> {
        Ok(FieldSig {
            calling_convention,
            field_type: self.parse_type()?,
        })
    }

    fn read_locals(&mut self, calling_convention: CallingConvention) -> Result<LocalSig> {
        let count = self.parser.read_compressed_uint()?;
        let mut locals = Vec::with_capacity(self.capacity(count));
        for _ in 0..count {
            locals.push(self.parse_type()?);
        }

        Ok(LocalSig {
            calling_convention,
            locals,
        })
    }

    fn read_generic_inst_method(
        &mut self,
        calling_convention: CallingConvention,
    ) -> Result<GenericInstMethodSig> {
        let count = self.parser.read_compressed_uint()?;
        let mut generic_args = Vec::with_capacity(self.capacity(count));
        for _ in 0..count {
            generic_args.push(self.parse_type()?);
        }

        Ok(GenericInstMethodSig {
            calling_convention,
            generic_args,
        })
    }

    fn read_type_def_or_ref(&mut self) -> Result<TypeDefOrRefSig> {
        let token = self.parser.read_type_def_or_ref()?;
        Ok(TypeDefOrRefSig::new(token, self.context.resolve_type(token)))
    }

    fn read_type_node(&mut self) -> Result<TypeSigRc> {
        let current_byte = self.parser.read_le::<u8>()?;
        if let Some(primitive) = self.context.corlib().from_element_type(current_byte) {
            return Ok(primitive);
        }

        let sig = match current_byte {
            ELEMENT_TYPE::PTR => TypeSig::Ptr(self.parse_type()?),
            ELEMENT_TYPE::BYREF => TypeSig::ByRef(self.parse_type()?),
            ELEMENT_TYPE::SZARRAY => TypeSig::SzArray(self.parse_type()?),
            ELEMENT_TYPE::PINNED => TypeSig::Pinned(self.parse_type()?),
            ELEMENT_TYPE::VALUETYPE => TypeSig::ValueType(self.read_type_def_or_ref()?),
            ELEMENT_TYPE::CLASS => TypeSig::Class(self.read_type_def_or_ref()?),
            ELEMENT_TYPE::VAR => {
                let index = self.parser.read_compressed_uint()?;
                if !self.generic_context.allows_var(index) {
                    return Err(malformed_error!(
                        "VAR - Index {} exceeds the declaring type's generic arity",
                        index
                    ));
                }
                TypeSig::Var(index)
            }
            ELEMENT_TYPE::MVAR => {
                let index = self.parser.read_compressed_uint()?;
                if !self.generic_context.allows_mvar(index) {
                    return Err(malformed_error!(
                        "MVAR - Index {} exceeds the declaring method's generic arity",
                        index
                    ));
                }
                TypeSig::MVar(index)
            }
            ELEMENT_TYPE::ARRAY => TypeSig::Array(self.read_array()?),
            ELEMENT_TYPE::GENERICINST => {
                let generic_type = self.parse_type()?;
                if !matches!(
                    generic_type.as_ref(),
                    TypeSig::Class(_) | TypeSig::ValueType(_)
                ) {
                    return Err(malformed_error!(
                        "GENERICINST - Generic type is not CLASS or VALUETYPE - 0x{:02X}",
                        generic_type.element_type()
                    ));
                }

                let arg_count = self.parser.read_compressed_uint()?;
                let mut args = Vec::with_capacity(self.capacity(arg_count));
                for _ in 0..arg_count {
                    args.push(self.parse_type()?);
                }

                TypeSig::GenericInst(GenericInstSig { generic_type, args })
            }
            ELEMENT_TYPE::FNPTR => {
                let nested = self.guarded(Self::parse_signature)?;
                if !matches!(nested, CallingConventionSig::Method(_)) {
                    return Err(malformed_error!(
                        "FNPTR - Embedded signature is not a method - 0x{:02X}",
                        nested.calling_convention().0
                    ));
                }
                TypeSig::FnPtr(Arc::new(nested))
            }
            ELEMENT_TYPE::CMOD_REQD => TypeSig::CModReqd(ModifierSig {
                modifier: self.read_type_def_or_ref()?,
                next: self.parse_type()?,
            }),
            ELEMENT_TYPE::CMOD_OPT => TypeSig::CModOpt(ModifierSig {
                modifier: self.read_type_def_or_ref()?,
                next: self.parse_type()?,
            }),
            ELEMENT_TYPE::SENTINEL => TypeSig::Sentinel,
            ELEMENT_TYPE::VALUEARRAY => {
                let next = self.parse_type()?;
                let size = self.parser.read_compressed_uint()?;
                TypeSig::ValueArray(ValueArraySig { next, size })
            }
            ELEMENT_TYPE::MODULE => {
                let index = self.parser.read_compressed_uint()?;
                let next = self.parse_type()?;
                TypeSig::Module(ModuleSig { index, next })
            }
            _ => {
                return Err(malformed_error!(
                    "Unsupported ELEMENT_TYPE - 0x{:02X}",
                    current_byte
                ))
            }
        };

        Ok(Arc::new(sig))
    }

    fn read_array(&mut self) -> Result<ArraySig> {
        let max_rank = self.context.options().max_array_rank;

        let element = self.parse_type()?;
        let rank = self.parser.read_compressed_uint()?;
        if rank > max_rank {
            return Err(malformed_error!(
                "ARRAY - Rank {} exceeds the maximum of {}",
                rank,
                max_rank
            ));
        }

        // Rank 0 carries no dimension information at all
        if rank == 0 {
            return Ok(ArraySig {
                element,
                rank,
                sizes: Vec::new(),
                lower_bounds: Vec::new(),
            });
        }

        let num_sizes = self.parser.read_compressed_uint()?;
        if num_sizes > max_rank {
            return Err(malformed_error!(
                "ARRAY - {} sizes exceed the maximum of {}",
                num_sizes,
                max_rank
            ));
        }
        let mut sizes = Vec::with_capacity(self.capacity(num_sizes));
        for _ in 0..num_sizes {
            sizes.push(self.parser.read_compressed_uint()?);
        }

        let num_lo_bounds = self.parser.read_compressed_uint()?;
        if num_lo_bounds > max_rank {
            return Err(malformed_error!(
                "ARRAY - {} lower bounds exceed the maximum of {}",
                num_lo_bounds,
                max_rank
            ));
        }
        let mut lower_bounds = Vec::with_capacity(self.capacity(num_lo_bounds));
        for _ in 0..num_lo_bounds {
            lower_bounds.push(self.parser.read_compressed_int()?);
        }

        Ok(ArraySig {
            element,
            rank,
            sizes,
            lower_bounds,
        })
    }
}
