//! Reflection type names as serialized in custom attribute, marshaling and security blobs.
//!
//! ```text
//! System.Collections.Generic.Dictionary`2[[System.String, mscorlib],[System.Int32[], mscorlib]], mscorlib
//! ```
//!
//! A name is a dotted namespace and type name with `+` separating nested types, followed by
//! an optional generic argument list, any number of `[]`, `[,]`, `[*]`, `*` and `&`
//! suffixes, and an optional assembly. `\` escapes the next character.

use std::sync::Arc;

use crate::{
    metadata::{
        context::TypeNameSearch,
        signatures::{ArraySig, GenericInstSig, TypeDefOrRefSig, TypeSig, TypeSigRc},
        typesystem::{CorLibType, CorLibTypes, TypeRef},
    },
    utils::RecursionCounter,
    Result,
};

/// Largest array rank the runtime accepts
const MAX_ARRAY_RANK: u32 = 32;

/// Assemblies whose types are the corlib primitives
const CORLIB_ASSEMBLIES: [&str; 4] = [
    "mscorlib",
    "System.Private.CoreLib",
    "System.Runtime",
    "netstandard",
];

/// Returns true when the assembly part of a type name names a core library
#[must_use]
pub fn is_corlib_scope(scope: &str) -> bool {
    let assembly = scope.split(',').next().unwrap_or_default().trim();
    CORLIB_ASSEMBLIES.contains(&assembly)
}

/// Where the type being read sits, which decides how far its assembly part runs
#[derive(Clone, Copy, PartialEq, Eq)]
enum Nesting {
    /// The whole input; the assembly runs to the end
    TopLevel,
    /// A `[...]` generic argument; the assembly runs to the closing bracket
    Bracketed,
    /// A bare generic argument; a `,` starts the next argument, not an assembly
    Bare,
}

enum Suffix {
    Ptr,
    ByRef,
    SzArray,
    Array(u32),
}

/// Parser for one reflection type name.
///
/// Simple names of corlib primitives map onto the shared [`CorLibTypes`] nodes when the
/// core library is visible under the [`TypeNameSearch`] policy. Every other named type
/// becomes a synthesized `Class` node; arrays, pointers, by-refs and generic
/// instantiations wrap it.
///
/// # Examples
///
/// ```rust
/// use cilblob::metadata::{
///     context::TypeNameSearch,
///     typesystem::{CorLibTypes, TypeNameParser},
/// };
///
/// let corlib = CorLibTypes::new();
/// let sig = TypeNameParser::new(
///     "System.Collections.Generic.List`1[[System.Int32, mscorlib]][]",
///     TypeNameSearch::CurrentModuleThenCorLib,
///     &corlib,
/// )
/// .parse()?;
/// assert_eq!(sig.to_string(), "System.Collections.Generic.List`1<System.Int32>[]");
/// # Ok::<(), cilblob::Error>(())
/// ```
pub struct TypeNameParser<'a> {
    input: &'a str,
    pos: usize,
    search: TypeNameSearch,
    corlib: &'a CorLibTypes,
    depth: RecursionCounter,
}

impl<'a> TypeNameParser<'a> {
    /// Creates a parser over `input`
    #[must_use]
    pub fn new(input: &'a str, search: TypeNameSearch, corlib: &'a CorLibTypes) -> Self {
        TypeNameParser {
            input,
            pos: 0,
            search,
            corlib,
            depth: RecursionCounter::new(),
        }
    }

    /// Parses the whole input as one type name
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the name is empty, unbalanced or followed by
    /// stray characters, and [`crate::Error::RecursionLimit`] if generic arguments nest too
    /// deep
    pub fn parse(mut self) -> Result<TypeSigRc> {
        let sig = self.read_type(Nesting::TopLevel)?;

        self.skip_whitespace();
        if self.pos != self.input.len() {
            return Err(malformed_error!(
                "Unexpected character at {} in type name '{}'",
                self.pos,
                self.input
            ));
        }

        Ok(sig)
    }

    fn read_type(&mut self, nesting: Nesting) -> Result<TypeSigRc> {
        self.depth.enter()?;
        let result = self.read_type_unguarded(nesting);
        self.depth.leave();
        result
    }

    fn read_type_unguarded(&mut self, nesting: Nesting) -> Result<TypeSigRc> {
        self.skip_whitespace();
        let mut type_ref = self.read_type_ref()?;

        let args = if self.at_generic_args() {
            self.read_generic_args()?
        } else {
            Vec::new()
        };
        let suffixes = self.read_suffixes()?;

        if nesting != Nesting::Bare {
            type_ref.scope = self.read_assembly(nesting)?;
        }

        let mut sig = if args.is_empty() {
            self.named_type(type_ref)
        } else {
            Arc::new(TypeSig::GenericInst(GenericInstSig {
                generic_type: Arc::new(TypeSig::Class(TypeDefOrRefSig::synthesized(type_ref))),
                args,
            }))
        };

        for suffix in suffixes {
            sig = Arc::new(match suffix {
                Suffix::Ptr => TypeSig::Ptr(sig),
                Suffix::ByRef => TypeSig::ByRef(sig),
                Suffix::SzArray => TypeSig::SzArray(sig),
                Suffix::Array(rank) => TypeSig::Array(ArraySig {
                    element: sig,
                    rank,
                    sizes: Vec::new(),
                    lower_bounds: Vec::new(),
                }),
            });
        }

        Ok(sig)
    }

    fn named_type(&self, type_ref: TypeRef) -> TypeSigRc {
        let corlib_visible = match type_ref.scope.as_deref() {
            None => self.search == TypeNameSearch::CurrentModuleThenCorLib,
            Some(scope) => is_corlib_scope(scope),
        };

        if corlib_visible && type_ref.declaring_type.is_none() {
            if let Some(primitive) = CorLibType::from_full_name(&type_ref.full_name()) {
                return self.corlib.get(primitive);
            }
        }

        Arc::new(TypeSig::Class(TypeDefOrRefSig::synthesized(type_ref)))
    }

    fn read_type_ref(&mut self) -> Result<TypeRef> {
        let mut segments = Vec::new();
        let mut namespace_end = None;
        let mut current = String::new();

        while let Some(c) = self.peek() {
            match c {
                '[' | ']' | ',' | '*' | '&' => break,
                '\\' => {
                    self.pos += 1;
                    let escaped = self
                        .next_char()
                        .ok_or_else(|| malformed_error!("Dangling escape in type name '{}'", self.input))?;
                    current.push(escaped);
                }
                '+' => {
                    self.pos += 1;
                    segments.push(std::mem::take(&mut current));
                }
                '.' if segments.is_empty() => {
                    self.pos += 1;
                    namespace_end = Some(current.len());
                    current.push('.');
                }
                _ => {
                    self.pos += c.len_utf8();
                    current.push(c);
                }
            }
        }
        segments.push(current.trim_end().to_string());

        let (namespace, name) = match namespace_end {
            Some(end) => (&segments[0][..end], &segments[0][end + 1..]),
            None => ("", segments[0].as_str()),
        };
        if name.is_empty() || segments[1..].iter().any(String::is_empty) {
            return Err(malformed_error!("Empty name in type name '{}'", self.input));
        }

        let mut type_ref = TypeRef::new(namespace, name);
        for nested_name in &segments[1..] {
            let mut nested = TypeRef::new("", nested_name);
            nested.declaring_type = Some(Arc::new(type_ref));
            type_ref = nested;
        }
        Ok(type_ref)
    }

    /// A `[` that opens a generic argument list rather than an array suffix
    fn at_generic_args(&self) -> bool {
        let mut chars = self.input[self.pos..].chars();
        chars.next() == Some('[')
            && !matches!(
                chars.find(|c| !c.is_whitespace()),
                None | Some(']' | ',' | '*')
            )
    }

    fn read_generic_args(&mut self) -> Result<Vec<TypeSigRc>> {
        self.expect('[')?;

        let mut args = Vec::new();
        loop {
            self.skip_whitespace();
            let arg = if self.peek() == Some('[') {
                self.pos += 1;
                let arg = self.read_type(Nesting::Bracketed)?;
                self.skip_whitespace();
                self.expect(']')?;
                arg
            } else {
                self.read_type(Nesting::Bare)?
            };
            args.push(arg);

            self.skip_whitespace();
            match self.next_char() {
                Some(',') => {}
                Some(']') => return Ok(args),
                _ => {
                    return Err(malformed_error!(
                        "Unterminated generic arguments in type name '{}'",
                        self.input
                    ))
                }
            }
        }
    }

    fn read_suffixes(&mut self) -> Result<Vec<Suffix>> {
        let mut suffixes = Vec::new();
        loop {
            match self.peek() {
                Some('*') => {
                    self.pos += 1;
                    suffixes.push(Suffix::Ptr);
                }
                Some('&') => {
                    self.pos += 1;
                    suffixes.push(Suffix::ByRef);
                }
                Some('[') if !self.at_generic_args() => {
                    self.pos += 1;
                    suffixes.push(self.read_array_suffix()?);
                }
                _ => return Ok(suffixes),
            }
        }
    }

    fn read_array_suffix(&mut self) -> Result<Suffix> {
        let mut rank = 1;
        let mut bounded = false;
        loop {
            match self.next_char() {
                Some(']') => break,
                Some(',') => rank += 1,
                Some('*') => bounded = true,
                Some(c) if c.is_whitespace() => {}
                _ => {
                    return Err(malformed_error!(
                        "Invalid array suffix in type name '{}'",
                        self.input
                    ))
                }
            }

            if rank > MAX_ARRAY_RANK {
                return Err(malformed_error!(
                    "Array rank above {} in type name '{}'",
                    MAX_ARRAY_RANK,
                    self.input
                ));
            }
        }

        Ok(if rank == 1 && !bounded {
            Suffix::SzArray
        } else {
            Suffix::Array(rank)
        })
    }

    fn read_assembly(&mut self, nesting: Nesting) -> Result<Option<String>> {
        self.skip_whitespace();
        if self.peek() != Some(',') {
            return Ok(None);
        }
        self.pos += 1;

        let rest = &self.input[self.pos..];
        let end = match nesting {
            Nesting::Bracketed => rest.find(']').ok_or_else(|| {
                malformed_error!("Unterminated assembly name in type name '{}'", self.input)
            })?,
            _ => rest.len(),
        };

        let assembly = rest[..end].trim();
        if assembly.is_empty() {
            return Err(malformed_error!(
                "Empty assembly name in type name '{}'",
                self.input
            ));
        }

        self.pos += end;
        Ok(Some(assembly.to_string()))
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.next_char() {
            Some(c) if c == expected => Ok(()),
            _ => Err(malformed_error!(
                "Expected '{}' at {} in type name '{}'",
                expected,
                self.pos,
                self.input
            )),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }
}
