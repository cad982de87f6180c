//! Custom attribute blob parsing (ECMA-335 II.23.3).
//!
//! The decoder is driven by the constructor's parameter types: each parameter is stripped of
//! its custom modifiers, instantiated against the declaring type's generic arguments and then
//! decoded as one `FixedArg`. Slots typed `object` carry a one-byte tag with the real type.
//!
//! Enum parameters need the enum's underlying type, which only the module can tell. When the
//! enum cannot be resolved the decoder assumes `Int32` and accepts that guess only if the
//! blob is consumed exactly.

use rayon::prelude::*;

use crate::{
    file::parser::Parser,
    metadata::{
        context::{EnumResolution, ModuleContext},
        customattributes::{
            AttributeCtor, CAArgument, CANamedArgument, CAValue, CustomAttribute,
            CustomAttributeValue, SERIALIZATION_TYPE,
        },
        decoded::Decoded,
        signatures::{GenericArguments, TypeSig, TypeSigRc},
        streams::Blob,
        typesystem::CorLibType,
    },
    utils::RecursionCounter,
    Error, Result,
};

/// Parses a custom attribute blob against its constructor
///
/// # Errors
/// Returns an error if the blob is malformed, truncated, nested too deep or references a
/// type that cannot be resolved
///
/// # Examples
///
/// ```rust
/// use cilblob::metadata::{
///     context::ModuleContext,
///     customattributes::{parse_custom_attribute_data, AttributeCtor},
///     signatures::parse_method_signature,
///     token::Token,
/// };
///
/// let ctx = ModuleContext::default();
/// // instance void .ctor(string)
/// let signature = parse_method_signature(&[0x20, 0x01, 0x01, 0x0E], &ctx)?;
/// let ctor = AttributeCtor::new(Token::new(0x0A00_0001), signature);
///
/// let blob = [0x01, 0x00, 0x02, b'h', b'i', 0x00, 0x00];
/// let value = parse_custom_attribute_data(&blob, &ctor, &ctx)?;
/// assert_eq!(value.fixed_args[0].as_str(), Some("hi"));
/// # Ok::<(), cilblob::Error>(())
/// ```
pub fn parse_custom_attribute_data(
    data: &[u8],
    ctor: &AttributeCtor,
    context: &ModuleContext,
) -> Result<CustomAttributeValue> {
    CustomAttributeParser::new(data, context).parse_custom_attribute(ctor)
}

/// Decodes the custom attribute blob stored at `offset` of the blob heap.
///
/// Never fails: a blob that cannot be decoded is kept as [`Decoded::RawFallback`], and an
/// invalid heap offset yields [`Decoded::Fatal`]. Either way the constructor is preserved.
#[must_use]
pub fn decode_custom_attribute(
    blob: &Blob<'_>,
    offset: usize,
    ctor: &AttributeCtor,
    context: &ModuleContext,
) -> CustomAttribute {
    let value = match blob.get(offset) {
        Ok(data) => Decoded::from_result(
            parse_custom_attribute_data(data, ctor, context),
            data,
            "Custom attribute",
            offset,
        ),
        Err(error) => {
            log::debug!("Custom attribute blob offset 0x{offset:X} is invalid: {error}");
            Decoded::Fatal(error)
        }
    };

    CustomAttribute {
        ctor: ctor.token,
        value,
    }
}

/// Decodes many custom attributes of one module concurrently.
///
/// Each decode owns its cursor and recursion counter; the context is only read (apart from
/// its internally synchronized resolution cache). Results keep the input order.
#[must_use]
pub fn decode_custom_attributes_parallel(
    blob: &Blob<'_>,
    attributes: &[(usize, AttributeCtor)],
    context: &ModuleContext,
) -> Vec<CustomAttribute> {
    attributes
        .par_iter()
        .map(|(offset, ctor)| decode_custom_attribute(blob, *offset, ctor, context))
        .collect()
}

/// Custom attribute blob parser
///
/// Do not re-use a parser instance for multiple blobs.
pub struct CustomAttributeParser<'a, 'c> {
    parser: Parser<'a>,
    context: &'c ModuleContext,
    generic_args: GenericArguments,
    depth: RecursionCounter,
    verify_read_all: bool,
}

impl<'a, 'c> CustomAttributeParser<'a, 'c> {
    /// Creates a parser over `data`
    #[must_use]
    pub fn new(data: &'a [u8], context: &'c ModuleContext) -> Self {
        CustomAttributeParser {
            parser: Parser::new(data),
            context,
            generic_args: GenericArguments::new(),
            depth: context.recursion_counter(),
            verify_read_all: false,
        }
    }

    /// Number of bytes consumed so far
    #[must_use]
    pub fn position(&self) -> usize {
        self.parser.pos()
    }

    /// Returns true once an enum argument was decoded with the `Int32` guess
    #[must_use]
    pub fn used_enum_heuristic(&self) -> bool {
        self.verify_read_all
    }

    /// Parses a complete `CustomAttrib` blob
    ///
    /// # Errors
    /// See [`parse_custom_attribute_data`]
    pub fn parse_custom_attribute(&mut self, ctor: &AttributeCtor) -> Result<CustomAttributeValue> {
        let pushed = match ctor.declaring_type.as_deref() {
            Some(TypeSig::GenericInst(inst)) => {
                self.generic_args.push_type_args(inst.args.clone());
                true
            }
            _ => false,
        };

        let result = self.read_custom_attribute(ctor);

        if pushed {
            self.generic_args.pop_type_args();
        }
        result
    }

    fn read_custom_attribute(&mut self, ctor: &AttributeCtor) -> Result<CustomAttributeValue> {
        let params = &ctor.signature.params;

        // A parameterless attribute may be stored as an empty blob
        if !(params.is_empty() && self.parser.is_empty()) {
            let prolog = self.parser.read_le::<u16>()?;
            if prolog != 0x0001 {
                return Err(malformed_error!(
                    "Invalid custom attribute prolog - expected 0x0001, got 0x{:04X}",
                    prolog
                ));
            }
        }

        let mut fixed_args = Vec::with_capacity(params.len().min(self.parser.remaining()));
        for param in params {
            let param_type = self.fix_type(param);
            fixed_args.push(self.read_fixed_arg(&param_type)?);
        }

        // Some compilers omit the count when there are no named arguments
        let named_count = if self.parser.has_more_data() {
            self.parser.read_le::<u16>()?
        } else {
            0
        };
        let named_args = self.parse_named_arguments(u32::from(named_count))?;

        if self.verify_read_all && self.parser.has_more_data() {
            log::warn!(
                "Int32 guess for an unresolved enum left {} custom attribute bytes unread",
                self.parser.remaining()
            );
            return Err(malformed_error!(
                "Not all custom attribute bytes were read - {} remaining",
                self.parser.remaining()
            ));
        }

        Ok(CustomAttributeValue {
            fixed_args,
            named_args,
        })
    }

    /// Parses up to `count` `NamedArg` entries
    ///
    /// Stops early at the end of the data, since some writers overstate the count.
    ///
    /// # Errors
    /// Returns an error if a named argument is malformed
    pub fn parse_named_arguments(&mut self, count: u32) -> Result<Vec<CANamedArgument>> {
        let mut named_args = Vec::with_capacity((count as usize).min(self.parser.remaining()));
        for _ in 0..count {
            if !self.parser.has_more_data() {
                break;
            }
            named_args.push(self.read_named_argument()?);
        }

        Ok(named_args)
    }

    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.depth.enter()?;
        let result = f(self);
        self.depth.leave();
        result
    }

    fn fix_type(&self, param: &TypeSigRc) -> TypeSigRc {
        let stripped = TypeSig::remove_modifiers(param);
        let resolved = self.generic_args.resolve(&stripped);
        TypeSig::remove_pinned_and_modifiers(&resolved)
    }

    fn read_named_argument(&mut self) -> Result<CANamedArgument> {
        let is_field = match self.parser.read_le::<u8>()? {
            SERIALIZATION_TYPE::FIELD => true,
            SERIALIZATION_TYPE::PROPERTY => false,
            other => {
                return Err(malformed_error!(
                    "Invalid named argument kind - 0x{:02X}",
                    other
                ))
            }
        };

        let ty = self.read_field_or_prop_type()?;
        let Some(name) = self.parser.read_ser_string()? else {
            return Err(malformed_error!("Named argument without a name"));
        };
        let argument = self.read_fixed_arg(&ty)?;

        Ok(CANamedArgument {
            is_field,
            ty,
            name,
            argument,
        })
    }

    fn read_fixed_arg(&mut self, ty: &TypeSigRc) -> Result<CAArgument> {
        self.guarded(|p| match ty.as_ref() {
            TypeSig::SzArray(element) => p.read_array(ty, element),
            _ => p.read_elem(ty),
        })
    }

    fn read_array(&mut self, ty: &TypeSigRc, element: &TypeSigRc) -> Result<CAArgument> {
        let count = self.parser.read_le::<i32>()?;
        let items = match count {
            -1 => None,
            n if n < 0 => {
                return Err(malformed_error!("Invalid custom attribute array length - {}", n))
            }
            n => {
                let n = n.unsigned_abs() as usize;
                let mut items = Vec::with_capacity(n.min(self.parser.remaining()));
                for _ in 0..n {
                    items.push(self.read_fixed_arg(element)?);
                }
                Some(items)
            }
        };

        Ok(CAArgument::new(ty.clone(), CAValue::Array(items)))
    }

    fn read_elem(&mut self, ty: &TypeSigRc) -> Result<CAArgument> {
        match ty.as_ref() {
            TypeSig::CorLib(CorLibType::Object) => self.read_boxed(ty),
            TypeSig::CorLib(primitive) => {
                let value = self.read_primitive(*primitive)?;
                Ok(CAArgument::new(ty.clone(), value))
            }
            TypeSig::Class(_) if ty.is_type("System", "Type") => {
                let value = self.read_type_value()?;
                Ok(CAArgument::new(ty.clone(), value))
            }
            TypeSig::Class(_) if ty.is_type("System", "String") => {
                let value = self.read_primitive(CorLibType::String)?;
                Ok(CAArgument::new(ty.clone(), value))
            }
            TypeSig::Class(_) if ty.is_type("System", "Object") => self.read_boxed(ty),
            TypeSig::ValueType(_) => self.read_enum(ty, true),
            // Only value types may fall back to the Int32 guess
            TypeSig::Class(_) => self.read_enum(ty, false),
            _ => Err(malformed_error!(
                "Invalid custom attribute argument type - {}",
                ty
            )),
        }
    }

    fn read_primitive(&mut self, primitive: CorLibType) -> Result<CAValue> {
        Ok(match primitive {
            CorLibType::Boolean => CAValue::Boolean(self.parser.read_le::<u8>()? != 0),
            CorLibType::Char => CAValue::Char(self.parser.read_le::<u16>()?),
            CorLibType::I1 => CAValue::I1(self.parser.read_le::<i8>()?),
            CorLibType::U1 => CAValue::U1(self.parser.read_le::<u8>()?),
            CorLibType::I2 => CAValue::I2(self.parser.read_le::<i16>()?),
            CorLibType::U2 => CAValue::U2(self.parser.read_le::<u16>()?),
            CorLibType::I4 => CAValue::I4(self.parser.read_le::<i32>()?),
            CorLibType::U4 => CAValue::U4(self.parser.read_le::<u32>()?),
            CorLibType::I8 => CAValue::I8(self.parser.read_le::<i64>()?),
            CorLibType::U8 => CAValue::U8(self.parser.read_le::<u64>()?),
            CorLibType::R4 => CAValue::R4(self.parser.read_le::<f32>()?),
            CorLibType::R8 => CAValue::R8(self.parser.read_le::<f64>()?),
            CorLibType::String => CAValue::String(self.parser.read_ser_string()?),
            other => {
                return Err(malformed_error!(
                    "{} cannot be stored in a custom attribute",
                    other
                ))
            }
        })
    }

    fn read_boxed(&mut self, ty: &TypeSigRc) -> Result<CAArgument> {
        let real_type = self.read_field_or_prop_type()?;
        let inner = self.read_fixed_arg(&real_type)?;

        Ok(CAArgument::new(ty.clone(), CAValue::Boxed(Box::new(inner))))
    }

    fn read_enum(&mut self, ty: &TypeSigRc, may_guess: bool) -> Result<CAArgument> {
        let resolution = match ty.type_ref() {
            Some(type_ref) => self.context.enum_underlying_type(type_ref),
            None => EnumResolution::Unresolved,
        };

        let underlying = match resolution {
            EnumResolution::Enum(underlying) if underlying.is_integral() => underlying,
            EnumResolution::Enum(underlying) => {
                return Err(malformed_error!(
                    "Invalid underlying type {} for enum {}",
                    underlying,
                    ty
                ))
            }
            EnumResolution::NotEnum => {
                return Err(malformed_error!(
                    "{} is neither an enum nor a custom attribute type",
                    ty
                ))
            }
            EnumResolution::Unresolved => {
                if !may_guess || !self.context.options().enum_underlying_heuristic {
                    return Err(Error::Unresolved(format!("Underlying type of enum {ty}")));
                }

                self.verify_read_all = true;
                CorLibType::I4
            }
        };

        let value = self.read_primitive(underlying)?;
        Ok(CAArgument::new(ty.clone(), value))
    }

    fn read_type_value(&mut self) -> Result<CAValue> {
        match self.parser.read_ser_string()? {
            None => Ok(CAValue::Type(None)),
            Some(name) => Ok(CAValue::Type(Some(self.parse_type_name(&name)?))),
        }
    }

    fn parse_type_name(&self, name: &str) -> Result<TypeSigRc> {
        self.context
            .parse_type_name(name, self.context.options().ca_type_search)
            .ok_or_else(|| Error::Unresolved(format!("Type name '{name}'")))
    }

    fn read_field_or_prop_type(&mut self) -> Result<TypeSigRc> {
        self.guarded(|p| {
            let tag = p.parser.read_le::<u8>()?;
            match tag {
                SERIALIZATION_TYPE::BOOLEAN..=SERIALIZATION_TYPE::STRING => p
                    .context
                    .corlib()
                    .from_element_type(tag)
                    .ok_or_else(|| malformed_error!("Invalid serialization type - 0x{:02X}", tag)),
                SERIALIZATION_TYPE::TYPE => Ok(p.context.corlib().system_type()),
                SERIALIZATION_TYPE::TAGGED_OBJECT => Ok(p.context.corlib().object()),
                SERIALIZATION_TYPE::SZARRAY => {
                    let element = p.read_field_or_prop_type()?;
                    Ok(std::sync::Arc::new(TypeSig::SzArray(element)))
                }
                SERIALIZATION_TYPE::ENUM => match p.parser.read_ser_string()? {
                    Some(name) => {
                        // A named enum type is a value type
                        let ty = p.parse_type_name(&name)?;
                        if let TypeSig::Class(enum_type) = ty.as_ref() {
                            return Ok(std::sync::Arc::new(TypeSig::ValueType(enum_type.clone())));
                        }
                        Ok(ty)
                    }
                    None => Err(malformed_error!("Enum type name is null")),
                },
                _ => Err(malformed_error!(
                    "Invalid serialization type - 0x{:02X}",
                    tag
                )),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metadata::{
        context::{DecoderOptions, TypeNameSearch, TypeResolver},
        signatures::{
            CallingConvention, GenericInstSig, MethodSig, TypeDefOrRefSig,
        },
        token::Token,
        typesystem::{CorLibTypes, TypeRef, TypeRefRc},
    };

    // TypeRef row 1 is an Int16-based enum, row 2 a plain class, row 3 unknown
    struct TestResolver;

    impl TypeResolver for TestResolver {
        fn resolve_type_def_or_ref(&self, token: Token) -> Option<TypeRefRc> {
            match token.value() {
                0x0100_0001 => Some(Arc::new(TypeRef::with_token(token, "Demo", "Color"))),
                0x0100_0002 => Some(Arc::new(TypeRef::with_token(token, "Demo", "Widget"))),
                _ => None,
            }
        }

        fn enum_underlying_type(&self, type_ref: &TypeRef) -> EnumResolution {
            match type_ref.name.as_str() {
                "Color" => EnumResolution::Enum(CorLibType::I2),
                "Widget" => EnumResolution::NotEnum,
                _ => EnumResolution::Unresolved,
            }
        }
    }

    fn ctx() -> ModuleContext {
        ModuleContext::new(Arc::new(TestResolver))
    }

    fn value_type(ctx: &ModuleContext, row: u32) -> TypeSigRc {
        let token = Token::new(0x0100_0000 | row);
        Arc::new(TypeSig::ValueType(TypeDefOrRefSig::new(
            token,
            ctx.resolve_type(token),
        )))
    }

    fn ctor(params: Vec<TypeSigRc>) -> AttributeCtor {
        let corlib = CorLibTypes::new();
        AttributeCtor::new(
            Token::new(0x0A00_0001),
            MethodSig {
                calling_convention: CallingConvention(0x20),
                generic_param_count: 0,
                ret_type: corlib.get(CorLibType::Void),
                params,
                params_after_sentinel: None,
            },
        )
    }

    fn parse(data: &[u8], params: Vec<TypeSigRc>, ctx: &ModuleContext) -> Result<CustomAttributeValue> {
        parse_custom_attribute_data(data, &ctor(params), ctx)
    }

    #[test]
    fn test_parse_empty_blob() {
        let ctx = ctx();
        let value = parse(&[], vec![], &ctx).unwrap();
        assert!(value.fixed_args.is_empty() && value.named_args.is_empty());

        // Prolog only
        let value = parse(&[0x01, 0x00], vec![], &ctx).unwrap();
        assert!(value.fixed_args.is_empty());

        // Parameters but no data
        assert!(parse(&[], vec![ctx.corlib().int32()], &ctx).is_err());
    }

    #[test]
    fn test_parse_invalid_prolog() {
        let ctx = ctx();
        let result = parse(&[0x00, 0x01], vec![], &ctx);
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_parse_primitive_arguments() {
        let ctx = ctx();
        let c = ctx.corlib();
        let data = [
            0x01, 0x00, // prolog
            0x02, // bool (nonzero)
            0x41, 0x00, // char 'A'
            0xFF, // i1 -1
            0xFE, 0xFF, // i2 -2
            0x78, 0x56, 0x34, 0x12, // u4
            0x00, 0x00, 0xC0, 0x3F, // r4 1.5
            0x00, 0x00, // no named args
        ];
        let value = parse(
            &data,
            vec![
                c.get(CorLibType::Boolean),
                c.get(CorLibType::Char),
                c.get(CorLibType::I1),
                c.get(CorLibType::I2),
                c.get(CorLibType::U4),
                c.get(CorLibType::R4),
            ],
            &ctx,
        )
        .unwrap();

        let values: Vec<&CAValue> = value.fixed_args.iter().map(|a| &a.value).collect();
        assert_eq!(
            values,
            [
                &CAValue::Boolean(true),
                &CAValue::Char(0x41),
                &CAValue::I1(-1),
                &CAValue::I2(-2),
                &CAValue::U4(0x1234_5678),
                &CAValue::R4(1.5),
            ]
        );
    }

    #[test]
    fn test_parse_strings() {
        let ctx = ctx();
        let data = [0x01, 0x00, 0xFF, 0x00, 0x03, b'a', b'b', b'c'];
        let value = parse(
            &data,
            vec![ctx.corlib().string(), ctx.corlib().string(), ctx.corlib().string()],
            &ctx,
        )
        .unwrap();

        assert_eq!(value.fixed_args[0].value, CAValue::String(None));
        assert_eq!(value.fixed_args[1].value, CAValue::String(Some(String::new())));
        assert_eq!(value.fixed_args[2].as_str(), Some("abc"));
    }

    #[test]
    fn test_parse_resolved_enum() {
        let ctx = ctx();
        let color = value_type(&ctx, 1);
        let value = parse(&[0x01, 0x00, 0x05, 0x00], vec![color.clone()], &ctx).unwrap();

        let arg = &value.fixed_args[0];
        assert!(arg.is_enum());
        assert_eq!(arg.value, CAValue::I2(5));
        assert!(Arc::ptr_eq(&arg.ty, &color));
    }

    #[test]
    fn test_parse_non_enum_value_type() {
        let ctx = ctx();
        let widget = value_type(&ctx, 2);
        assert!(parse(&[0x01, 0x00, 0x05, 0x00, 0x00, 0x00], vec![widget], &ctx).is_err());
    }

    #[test]
    fn test_enum_heuristic() {
        let ctx = ctx();
        let unknown = value_type(&ctx, 3);

        // Exactly four bytes after the prolog: the Int32 guess holds
        let value = parse(&[0x01, 0x00, 0x07, 0x00, 0x00, 0x00], vec![unknown.clone()], &ctx)
            .unwrap();
        assert_eq!(value.fixed_args[0].value, CAValue::I4(7));

        // Underlying type is really Int64: bytes remain, the guess is rejected
        let data = [
            0x01, 0x00, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let mut parser = CustomAttributeParser::new(&data, &ctx);
        let result = parser.parse_custom_attribute(&ctor(vec![unknown.clone()]));
        assert!(matches!(result, Err(Error::Malformed { .. })));
        assert!(parser.used_enum_heuristic());

        // Strict options never guess
        let strict = ModuleContext::with_options(Arc::new(TestResolver), DecoderOptions::strict());
        let result = parse(&[0x01, 0x00, 0x07, 0x00, 0x00, 0x00], vec![value_type(&strict, 3)], &strict);
        assert!(matches!(result, Err(Error::Unresolved(_))));
    }

    #[test]
    fn test_class_slot_never_guesses() {
        let ctx = ctx();
        let class = |row: u32| {
            let token = Token::new(0x0100_0000 | row);
            Arc::new(TypeSig::Class(TypeDefOrRefSig::new(token, ctx.resolve_type(token))))
        };

        let result = parse(&[0x01, 0x00, 0x07, 0x00, 0x00, 0x00], vec![class(3)], &ctx);
        assert!(matches!(result, Err(Error::Unresolved(_))));

        // A class slot naming a known enum still decodes
        let value = parse(&[0x01, 0x00, 0x03, 0x00], vec![class(1)], &ctx).unwrap();
        assert_eq!(value.fixed_args[0].value, CAValue::I2(3));
    }

    #[test]
    fn test_boxed_nesting_depth() {
        let ctx = ctx();

        // Each tagged object costs one nesting level
        let nested = |levels: usize| {
            let mut data = vec![0x01, 0x00];
            data.extend(std::iter::repeat(SERIALIZATION_TYPE::TAGGED_OBJECT).take(levels));
            data.push(SERIALIZATION_TYPE::I4);
            data.extend_from_slice(&5i32.to_le_bytes());
            data
        };

        let value = parse(&nested(95), vec![ctx.corlib().object()], &ctx).unwrap();
        assert_eq!(value.fixed_args[0].unboxed().value, CAValue::I4(5));

        let result = parse(&nested(120), vec![ctx.corlib().object()], &ctx);
        assert!(matches!(result, Err(Error::RecursionLimit(100))));
    }

    #[test]
    fn test_parse_arrays() {
        let ctx = ctx();
        let int_array = Arc::new(TypeSig::SzArray(ctx.corlib().int32()));

        let null = parse(&[0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF], vec![int_array.clone()], &ctx)
            .unwrap();
        assert_eq!(null.fixed_args[0].value, CAValue::Array(None));

        let empty = parse(&[0x01, 0x00, 0x00, 0x00, 0x00, 0x00], vec![int_array.clone()], &ctx)
            .unwrap();
        assert_eq!(empty.fixed_args[0].value, CAValue::Array(Some(Vec::new())));

        let data = [
            0x01, 0x00, // prolog
            0x02, 0x00, 0x00, 0x00, // 2 elements
            0x0A, 0x00, 0x00, 0x00, // 10
            0x14, 0x00, 0x00, 0x00, // 20
        ];
        let two = parse(&data, vec![int_array.clone()], &ctx).unwrap();
        assert_eq!(two.fixed_args[0].to_string(), "{10, 20}");

        // -2 is not a valid length
        assert!(parse(&[0x01, 0x00, 0xFE, 0xFF, 0xFF, 0xFF], vec![int_array.clone()], &ctx).is_err());

        // Huge length with no data behind it
        assert!(matches!(
            parse(&[0x01, 0x00, 0xFF, 0xFF, 0xFF, 0x7F], vec![int_array], &ctx),
            Err(Error::OutOfBounds)
        ));
    }

    #[test]
    fn test_parse_boxed_object() {
        let ctx = ctx();
        let data = [
            0x01, 0x00, // prolog
            0x08, 0x2A, 0x00, 0x00, 0x00, // int32 42
            0x1D, 0x0E, 0x01, 0x00, 0x00, 0x00, 0x01, b'x', // string[] {"x"}
        ];
        let value = parse(&data, vec![ctx.corlib().object(), ctx.corlib().object()], &ctx).unwrap();

        let CAValue::Boxed(inner) = &value.fixed_args[0].value else {
            panic!("expected a boxed value");
        };
        assert_eq!(inner.value, CAValue::I4(42));
        assert!(Arc::ptr_eq(&inner.ty, &ctx.corlib().int32()));

        assert_eq!(value.fixed_args[1].unboxed().to_string(), "{\"x\"}");

        // Unknown tag
        assert!(parse(&[0x01, 0x00, 0x99], vec![ctx.corlib().object()], &ctx).is_err());
    }

    #[test]
    fn test_parse_type_argument() {
        let ctx = ctx();
        let system_type = ctx.corlib().system_type();
        let mut data = vec![0x01, 0x00, 0x0C];
        data.extend_from_slice(b"System.Int32");
        data.push(0xFF);

        let value = parse(&data, vec![system_type.clone(), system_type], &ctx).unwrap();
        let CAValue::Type(Some(ty)) = &value.fixed_args[0].value else {
            panic!("expected a type");
        };
        assert!(Arc::ptr_eq(ty, &ctx.corlib().int32()));
        assert_eq!(value.fixed_args[1].value, CAValue::Type(None));
    }

    #[test]
    fn test_parse_constructed_type_arguments() {
        let ctx = ctx();
        let system_type = ctx.corlib().system_type();
        let list = "System.Collections.Generic.List`1[[System.Int32, mscorlib]]";

        let mut data = vec![0x01, 0x00, 0x0E];
        data.extend_from_slice(b"System.Int32[]");
        data.push(list.len() as u8);
        data.extend_from_slice(list.as_bytes());

        let value = parse(&data, vec![system_type.clone(), system_type], &ctx).unwrap();
        let CAValue::Type(Some(array)) = &value.fixed_args[0].value else {
            panic!("expected a type");
        };
        assert!(matches!(array.as_ref(), TypeSig::SzArray(e) if Arc::ptr_eq(e, &ctx.corlib().int32())));

        let CAValue::Type(Some(generic)) = &value.fixed_args[1].value else {
            panic!("expected a type");
        };
        assert_eq!(
            generic.to_string(),
            "System.Collections.Generic.List`1<System.Int32>"
        );
    }

    #[test]
    fn test_parse_unparsable_type_name() {
        let ctx = ctx();
        let mut data = vec![0x01, 0x00, 0x07];
        data.extend_from_slice(b"List`1[");
        let result = parse(&data, vec![ctx.corlib().system_type()], &ctx);
        assert!(matches!(result, Err(Error::Unresolved(_))));
    }

    #[test]
    fn test_parse_named_arguments() {
        let ctx = ctx();
        let data = [
            0x01, 0x00, // prolog
            0x02, 0x00, // 2 named args
            0x53, 0x08, 0x01, b'X', 0x07, 0x00, 0x00, 0x00, // field int32 X = 7
            0x54, 0x0E, 0x01, b'Y', 0x01, b'z', // property string Y = "z"
        ];
        let value = parse(&data, vec![], &ctx).unwrap();

        assert_eq!(value.named_args.len(), 2);
        assert!(value.named_args[0].is_field);
        assert_eq!(value.named_args[0].to_string(), "X = 7");
        assert!(!value.named_args[1].is_field);
        assert_eq!(value.named("Y").unwrap().argument.as_str(), Some("z"));
    }

    #[test]
    fn test_parse_named_enum_argument() {
        let ctx = ctx();
        let mut data = vec![0x01, 0x00, 0x01, 0x00, 0x54, 0x55, 0x0A];
        data.extend_from_slice(b"Demo.Color");
        data.extend_from_slice(&[0x04, b'M', b'o', b'd', b'e', 0x03, 0x00]);

        let value = parse(&data, vec![], &ctx).unwrap();
        let named = &value.named_args[0];
        assert_eq!(named.ty.to_string(), "Demo.Color");
        assert!(named.argument.is_enum());
        assert_eq!(named.argument.value, CAValue::I2(3));
    }

    #[test]
    fn test_parse_invalid_named_argument() {
        let ctx = ctx();
        // 0x52 is neither FIELD nor PROPERTY
        assert!(parse(&[0x01, 0x00, 0x01, 0x00, 0x52, 0x08], vec![], &ctx).is_err());
        // Unknown field-or-prop type
        assert!(parse(&[0x01, 0x00, 0x01, 0x00, 0x53, 0x11, 0x01, b'X'], vec![], &ctx).is_err());
    }

    #[test]
    fn test_overstated_named_count() {
        let ctx = ctx();
        let data = [
            0x01, 0x00, 0x05, 0x00, // claims 5 named args
            0x53, 0x02, 0x01, b'B', 0x01, // field bool B = true
        ];
        let value = parse(&data, vec![], &ctx).unwrap();
        assert_eq!(value.named_args.len(), 1);
    }

    #[test]
    fn test_generic_declaring_type() {
        let ctx = ctx();
        let owner = Arc::new(TypeSig::GenericInst(GenericInstSig {
            generic_type: Arc::new(TypeSig::Class(TypeDefOrRefSig::synthesized(TypeRef::new(
                "Demo", "Holder`1",
            )))),
            args: vec![ctx.corlib().int32()],
        }));

        let data = [0x01, 0x00, 0x2A, 0x00, 0x00, 0x00];
        let closed = ctor(vec![Arc::new(TypeSig::Var(0))]).with_declaring_type(owner);
        let value = parse_custom_attribute_data(&data, &closed, &ctx).unwrap();
        assert_eq!(value.fixed_args[0].value, CAValue::I4(42));

        // Without the owner the placeholder cannot be decoded
        let open = ctor(vec![Arc::new(TypeSig::Var(0))]);
        assert!(parse_custom_attribute_data(&data, &open, &ctx).is_err());
    }

    #[test]
    fn test_decode_fallback() {
        let ctx = ctx();
        let heap = [
            0x00, // empty
            0x06, 0x01, 0x00, 0x2A, 0x00, 0x00, 0x00, // (42)
            0x03, 0x02, 0x00, 0x2A, // bad prolog
        ];
        let blob = Blob::from(&heap).unwrap();
        let int_ctor = ctor(vec![ctx.corlib().int32()]);

        let good = decode_custom_attribute(&blob, 1, &int_ctor, &ctx);
        assert_eq!(good.fixed_args()[0].value, CAValue::I4(42));
        assert!(good.raw_data().is_none());

        let bad = decode_custom_attribute(&blob, 8, &int_ctor, &ctx);
        assert_eq!(bad.ctor, Token::new(0x0A00_0001));
        assert!(bad.fixed_args().is_empty());
        assert_eq!(bad.raw_data(), Some(&[0x02, 0x00, 0x2A][..]));

        let fatal = decode_custom_attribute(&blob, 0x100, &int_ctor, &ctx);
        assert!(matches!(fatal.value, Decoded::Fatal(_)));
    }

    #[test]
    fn test_parallel_decoding_keeps_order() {
        let ctx = ctx();
        let heap = [
            0x00, 0x06, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x00, 0x02, 0x00, 0x00,
            0x00,
        ];
        let blob = Blob::from(&heap).unwrap();
        let int_ctor = ctor(vec![ctx.corlib().int32()]);

        let jobs: Vec<(usize, AttributeCtor)> = (0..64)
            .map(|i| (if i % 2 == 0 { 1 } else { 8 }, int_ctor.clone()))
            .collect();
        let decoded = decode_custom_attributes_parallel(&blob, &jobs, &ctx);

        assert_eq!(decoded.len(), 64);
        for (i, attribute) in decoded.iter().enumerate() {
            let expected = if i % 2 == 0 { 1 } else { 2 };
            assert_eq!(attribute.fixed_args()[0].value, CAValue::I4(expected));
        }
    }

    #[test]
    fn test_ca_type_search_option() {
        let ctx = ModuleContext::with_options(
            Arc::new(TestResolver),
            DecoderOptions {
                ca_type_search: TypeNameSearch::NoImplicitAssembly,
                ..DecoderOptions::default()
            },
        );
        let mut data = vec![0x01, 0x00, 0x0C];
        data.extend_from_slice(b"System.Int32");

        let value = parse(&data, vec![ctx.corlib().system_type()], &ctx).unwrap();
        let CAValue::Type(Some(ty)) = &value.fixed_args[0].value else {
            panic!("expected a type");
        };
        assert!(matches!(ty.as_ref(), TypeSig::Class(_)));
    }
}
