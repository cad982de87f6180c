use crate::{
    file::parser::Parser,
    metadata::{
        context::ModuleContext,
        customattributes::CustomAttributeParser,
        security::{
            decode_xml_text, DeclSecurity, PermissionSetXmlHandler, SecurityAction,
            SecurityAttribute, XmlSecurityHandler,
        },
        streams::Blob,
    },
    Result,
};

/// Leading byte of the binary permission set format
pub const BINARY_FORMAT_MARKER: u8 = b'.';

/// Parses a permission set blob, handing legacy XML to the default handler
///
/// # Errors
/// Returns an error if the binary format is malformed or truncated
///
/// # Examples
///
/// ```rust
/// use cilblob::metadata::{context::ModuleContext, security::parse_permission_set};
///
/// // One attribute, no named arguments
/// let mut blob = vec![b'.', 0x01, 0x0B];
/// blob.extend_from_slice(b"MyAttribute");
/// blob.extend_from_slice(&[0x01, 0x00]);
///
/// let attributes = parse_permission_set(&blob, &ModuleContext::default())?;
/// assert_eq!(attributes[0].type_name, "MyAttribute");
/// # Ok::<(), cilblob::Error>(())
/// ```
pub fn parse_permission_set(data: &[u8], context: &ModuleContext) -> Result<Vec<SecurityAttribute>> {
    SecurityParser::new(data, context).parse()
}

/// Decodes a permission set blob, yielding an empty list on any error.
///
/// Never returns a partially decoded list.
#[must_use]
pub fn decode_security_attributes(data: &[u8], context: &ModuleContext) -> Vec<SecurityAttribute> {
    match parse_permission_set(data, context) {
        Ok(attributes) => attributes,
        Err(error) => {
            log::debug!("Permission set of {} bytes left undecoded: {error}", data.len());
            Vec::new()
        }
    }
}

/// Decodes the permission set at `offset` in the blob heap for a `DeclSecurity` row
#[must_use]
pub fn decode_decl_security(
    blob: &Blob<'_>,
    offset: usize,
    action: u16,
    context: &ModuleContext,
) -> DeclSecurity {
    let action = SecurityAction::from(action);
    let data = match blob.get(offset) {
        Ok(data) => data,
        Err(error) => {
            log::debug!("Permission set blob offset 0x{offset:X} is invalid: {error}");
            return DeclSecurity {
                action,
                attributes: Vec::new(),
                raw: Vec::new(),
            };
        }
    };

    DeclSecurity {
        action,
        attributes: decode_security_attributes(data, context),
        raw: data.to_vec(),
    }
}

/// Parser for `DeclSecurity` permission set blobs
pub struct SecurityParser<'a, 'c> {
    parser: Parser<'a>,
    context: &'c ModuleContext,
    xml_handler: &'c dyn XmlSecurityHandler,
}

impl<'a, 'c> SecurityParser<'a, 'c> {
    /// Creates a parser using [`PermissionSetXmlHandler`] for legacy XML
    #[must_use]
    pub fn new(data: &'a [u8], context: &'c ModuleContext) -> Self {
        SecurityParser {
            parser: Parser::new(data),
            context,
            xml_handler: &PermissionSetXmlHandler,
        }
    }

    /// Replaces the legacy XML handler
    #[must_use]
    pub fn with_xml_handler(mut self, handler: &'c dyn XmlSecurityHandler) -> Self {
        self.xml_handler = handler;
        self
    }

    /// Parses the blob
    ///
    /// # Errors
    /// Returns an error if the binary format is malformed or truncated, or if the XML
    /// handler rejects the text
    pub fn parse(&mut self) -> Result<Vec<SecurityAttribute>> {
        if self.parser.is_empty() {
            return Ok(Vec::new());
        }

        if self.parser.peek_byte()? != BINARY_FORMAT_MARKER {
            let xml = decode_xml_text(self.parser.data());
            return self.xml_handler.parse_xml(&xml, self.context);
        }

        self.parser.advance_by(1)?;
        let count = self.parser.read_compressed_uint()? as usize;

        let mut attributes = Vec::with_capacity(count.min(self.parser.remaining()));
        for _ in 0..count {
            attributes.push(self.read_attribute()?);
        }

        Ok(attributes)
    }

    fn read_attribute(&mut self) -> Result<SecurityAttribute> {
        let type_name = self.parser.read_prefixed_string_utf8()?;
        let attribute_type = self
            .context
            .parse_type_name(&type_name, self.context.options().ca_type_search);

        // The per-attribute length is redundant with the named arguments that follow
        let _blob_length = self.parser.read_compressed_uint()?;
        let named_count = self.parser.read_compressed_uint()?;

        let data = self.parser.data();
        let mut named_parser = CustomAttributeParser::new(&data[self.parser.pos()..], self.context);
        let named_args = named_parser.parse_named_arguments(named_count)?;
        self.parser.advance_by(named_parser.position())?;

        Ok(SecurityAttribute {
            attribute_type,
            type_name,
            named_args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            customattributes::{CAValue, SERIALIZATION_TYPE},
            security::PERMISSION_SET_ATTRIBUTE,
            typesystem::CorLibType,
        },
        Error,
    };

    const SECURITY_PERMISSION: &str = "System.Security.Permissions.SecurityPermissionAttribute, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089";

    fn push_string(data: &mut Vec<u8>, text: &str) {
        assert!(text.len() < 0x80);
        data.push(text.len() as u8);
        data.extend_from_slice(text.as_bytes());
    }

    /// `[SecurityPermission(SecurityAction.Demand, SkipVerification = true)]`
    fn skip_verification() -> Vec<u8> {
        let mut named = vec![
            0x01, // named count
            SERIALIZATION_TYPE::PROPERTY,
            SERIALIZATION_TYPE::BOOLEAN,
        ];
        push_string(&mut named, "SkipVerification");
        named.push(0x01);

        let mut data = vec![b'.', 0x01];
        data.push(0x80);
        data.push(SECURITY_PERMISSION.len() as u8);
        data.extend_from_slice(SECURITY_PERMISSION.as_bytes());
        data.push(named.len() as u8);
        data.extend(named);
        data
    }

    #[test]
    fn binary_single_attribute() {
        let context = ModuleContext::default();
        let attributes = parse_permission_set(&skip_verification(), &context).unwrap();

        assert_eq!(attributes.len(), 1);
        let attribute = &attributes[0];
        assert_eq!(attribute.type_name, SECURITY_PERMISSION);
        assert_eq!(
            attribute.attribute_type.as_ref().unwrap().full_name(),
            "System.Security.Permissions.SecurityPermissionAttribute"
        );

        let named = attribute.named("SkipVerification").unwrap();
        assert!(!named.is_field);
        assert_eq!(named.ty.corlib_type(), Some(CorLibType::Boolean));
        assert_eq!(named.argument.value, CAValue::Boolean(true));
        assert_eq!(
            attribute.to_string(),
            "[System.Security.Permissions.SecurityPermissionAttribute(SkipVerification = true)]"
        );
    }

    #[test]
    fn binary_multiple_attributes() {
        let mut data = vec![b'.', 0x02];

        push_string(&mut data, "A.First");
        let mut named = vec![0x01, SERIALIZATION_TYPE::FIELD, SERIALIZATION_TYPE::I4];
        push_string(&mut named, "X");
        named.extend_from_slice(&7i32.to_le_bytes());
        data.push(named.len() as u8);
        data.extend(named);

        push_string(&mut data, "A.Second");
        data.extend_from_slice(&[0x01, 0x00]);

        let attributes = parse_permission_set(&data, &ModuleContext::default()).unwrap();
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[0].named_args.len(), 1);
        assert!(attributes[0].named_args[0].is_field);
        assert_eq!(attributes[0].named_args[0].argument.as_i64(), Some(7));
        assert_eq!(attributes[1].type_name, "A.Second");
        assert!(attributes[1].named_args.is_empty());
    }

    #[test]
    fn binary_zero_blob_length() {
        // name "", blob length 0, named count 0
        let data = [b'.', 0x01, 0x00, 0x00, 0x00];
        let attributes = parse_permission_set(&data, &ModuleContext::default()).unwrap();
        assert_eq!(attributes.len(), 1);
        assert!(attributes[0].type_name.is_empty());
        assert!(attributes[0].attribute_type.is_none());
    }

    #[test]
    fn binary_zero_blob_length_keeps_alignment() {
        #[rustfmt::skip]
        let data = [
            b'.', 0x02,
            0x01, b'A', 0x00, 0x00, // blob length 0, named count 0
            0x01, b'B', 0x01, 0x00, // blob length 1, named count 0
        ];
        let attributes = parse_permission_set(&data, &ModuleContext::default()).unwrap();
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[0].type_name, "A");
        assert_eq!(attributes[1].type_name, "B");
        assert!(attributes.iter().all(|a| a.named_args.is_empty()));
    }

    #[test]
    fn binary_empty_set() {
        let attributes = parse_permission_set(b".\x00", &ModuleContext::default()).unwrap();
        assert!(attributes.is_empty());
    }

    #[test]
    fn empty_blob() {
        assert!(parse_permission_set(&[], &ModuleContext::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn truncated_yields_empty_list() {
        let mut data = skip_verification();
        data.truncate(data.len() - 1);

        let context = ModuleContext::default();
        assert!(matches!(
            parse_permission_set(&data, &context),
            Err(Error::OutOfBounds)
        ));
        assert!(decode_security_attributes(&data, &context).is_empty());
    }

    #[test]
    fn second_attribute_broken_yields_no_partial_list() {
        let mut data = vec![b'.', 0x02];
        push_string(&mut data, "A.First");
        data.extend_from_slice(&[0x01, 0x00]);
        push_string(&mut data, "A.Second");
        data.extend_from_slice(&[0x03, 0x01, 0x99]);

        assert!(decode_security_attributes(&data, &ModuleContext::default()).is_empty());
    }

    #[test]
    fn legacy_xml() {
        let xml = "<PermissionSet class=\"System.Security.PermissionSet\" version=\"1\" Unrestricted=\"true\"/>";
        let data: Vec<u8> = xml.encode_utf16().flat_map(u16::to_le_bytes).collect();

        let attributes = parse_permission_set(&data, &ModuleContext::default()).unwrap();
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0].type_name, PERMISSION_SET_ATTRIBUTE);
        assert_eq!(attributes[0].named("XML").unwrap().argument.as_str(), Some(xml));
    }

    struct RejectingHandler;

    impl XmlSecurityHandler for RejectingHandler {
        fn parse_xml(&self, _xml: &str, _context: &ModuleContext) -> Result<Vec<SecurityAttribute>> {
            Err(malformed_error!("XML permission sets are not accepted"))
        }
    }

    #[test]
    fn custom_xml_handler() {
        let context = ModuleContext::default();
        let data = b"<PermissionSet/>";
        let result = SecurityParser::new(data, &context)
            .with_xml_handler(&RejectingHandler)
            .parse();
        assert!(result.is_err());
    }

    #[test]
    fn decl_security_from_heap() {
        let set = skip_verification();
        let mut heap = vec![0x00];
        heap.push(set.len() as u8);
        heap.extend_from_slice(&set);
        let blob = Blob::from(&heap).unwrap();
        let context = ModuleContext::default();

        let decl = decode_decl_security(&blob, 1, 0x0002, &context);
        assert_eq!(decl.action, SecurityAction::Demand);
        assert_eq!(decl.attributes.len(), 1);
        assert_eq!(decl.raw, set);
        assert!(!decl.is_undecoded());

        let missing = decode_decl_security(&blob, 0x1000, 0x0005, &context);
        assert_eq!(missing.action, SecurityAction::LinkDemand);
        assert!(missing.attributes.is_empty());
        assert!(missing.raw.is_empty());
    }
}
