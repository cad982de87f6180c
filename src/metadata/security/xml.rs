//! Legacy XML permission sets.
//!
//! Before .NET 2.0, `DeclSecurity` blobs held a serialized `PermissionSet` as UTF-16LE XML.
//! The decoder does not interpret code access security; it hands the text to an
//! [`XmlSecurityHandler`]. The default handler wraps it in a single
//! `System.Security.Permissions.PermissionSetAttribute` whose `XML` property holds the text,
//! which is also how the attribute would be written back.

use quick_xml::{events::Event, Reader};
use widestring::U16Str;

use crate::{
    metadata::{
        context::{ModuleContext, TypeNameSearch},
        customattributes::{CAArgument, CANamedArgument, CAValue},
        security::SecurityAttribute,
    },
    Result,
};

/// Full name of the attribute legacy XML permission sets are presented as
pub const PERMISSION_SET_ATTRIBUTE: &str = "System.Security.Permissions.PermissionSetAttribute";

/// Turns a legacy XML permission set into security attributes
pub trait XmlSecurityHandler: Send + Sync {
    /// Converts the XML text of one blob
    ///
    /// # Errors
    /// Returns an error if the handler rejects the XML; the blob then decodes to an empty list
    fn parse_xml(&self, xml: &str, context: &ModuleContext) -> Result<Vec<SecurityAttribute>>;
}

/// Wraps the XML text in a `PermissionSetAttribute` with an `XML` property
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissionSetXmlHandler;

impl XmlSecurityHandler for PermissionSetXmlHandler {
    fn parse_xml(&self, xml: &str, context: &ModuleContext) -> Result<Vec<SecurityAttribute>> {
        if !xml.trim_start().starts_with("<PermissionSet") {
            log::warn!("Legacy security XML does not start with a PermissionSet element");
        }

        let string = context.corlib().string();
        let argument = CANamedArgument {
            is_field: false,
            ty: string.clone(),
            name: "XML".to_string(),
            argument: CAArgument::new(string, CAValue::String(Some(xml.to_string()))),
        };

        Ok(vec![SecurityAttribute {
            attribute_type: context
                .parse_type_name(PERMISSION_SET_ATTRIBUTE, TypeNameSearch::CurrentModuleThenCorLib),
            type_name: PERMISSION_SET_ATTRIBUTE.to_string(),
            named_args: vec![argument],
        }])
    }
}

/// Decodes the text of a legacy permission set blob.
///
/// The CLR writes UTF-16LE, optionally behind a byte order mark. Blobs written by some
/// obfuscators hold plain UTF-8, which is detected by the absence of zero high bytes.
#[must_use]
pub fn decode_xml_text(data: &[u8]) -> String {
    let data = data.strip_prefix(&[0xFF, 0xFE]).unwrap_or(data);

    let looks_utf16 = data.len() >= 2 && data.len() % 2 == 0 && data[1] == 0;
    if !looks_utf16 {
        return String::from_utf8_lossy(data).into_owned();
    }

    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    U16Str::from_slice(&units)
        .to_string_lossy()
        .trim_end_matches('\0')
        .to_string()
}

/// Lists the `class` attribute of every `IPermission` element of a permission set.
///
/// Intended for inspection only; the result is not used by the decoder.
///
/// # Errors
/// Returns an error if the XML is not well-formed
///
/// # Examples
///
/// ```rust
/// use cilblob::metadata::security::permission_classes;
///
/// let xml = r#"<PermissionSet class="System.Security.PermissionSet" version="1">
///   <IPermission class="System.Security.Permissions.SecurityPermission" Flags="Execution"/>
/// </PermissionSet>"#;
///
/// assert_eq!(
///     permission_classes(xml)?,
///     ["System.Security.Permissions.SecurityPermission"]
/// );
/// # Ok::<(), cilblob::Error>(())
/// ```
pub fn permission_classes(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut classes = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(element) | Event::Empty(element)) => {
                if element.name().as_ref() != b"IPermission" {
                    continue;
                }

                let class = element
                    .attributes()
                    .filter_map(std::result::Result::ok)
                    .find(|attr| attr.key.as_ref() == b"class")
                    .map(|attr| String::from_utf8_lossy(&attr.value).into_owned());
                match class {
                    Some(class) => classes.push(class),
                    None => log::warn!("IPermission element without a class attribute"),
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(error) => {
                return Err(malformed_error!(
                    "Invalid permission set XML at position {} - {}",
                    reader.buffer_position(),
                    error
                ))
            }
        }
    }

    Ok(classes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    #[test]
    fn text_utf16() {
        let xml = "<PermissionSet/>";
        assert_eq!(decode_xml_text(&utf16le(xml)), xml);
    }

    #[test]
    fn text_utf16_bom() {
        let mut data = vec![0xFF, 0xFE];
        data.extend(utf16le("<PermissionSet/>"));
        assert_eq!(decode_xml_text(&data), "<PermissionSet/>");
    }

    #[test]
    fn text_utf8() {
        assert_eq!(decode_xml_text(b"<PermissionSet/>"), "<PermissionSet/>");
    }

    #[test]
    fn default_handler() {
        let context = ModuleContext::default();
        let xml = "<PermissionSet class=\"System.Security.PermissionSet\"/>";
        let attributes = PermissionSetXmlHandler.parse_xml(xml, &context).unwrap();

        assert_eq!(attributes.len(), 1);
        let attribute = &attributes[0];
        assert_eq!(attribute.type_name, PERMISSION_SET_ATTRIBUTE);
        assert_eq!(
            attribute.attribute_type.as_ref().unwrap().full_name(),
            PERMISSION_SET_ATTRIBUTE
        );

        let named = attribute.named("XML").unwrap();
        assert!(!named.is_field);
        assert_eq!(named.argument.as_str(), Some(xml));
    }

    #[test]
    fn classes() {
        let xml = r#"<PermissionSet class="System.Security.PermissionSet" version="1">
            <IPermission class="System.Security.Permissions.FileIOPermission" Read="C:\"/>
            <IPermission class="System.Security.Permissions.UIPermission" Unrestricted="true"></IPermission>
            <IPermission version="1"/>
        </PermissionSet>"#;

        assert_eq!(
            permission_classes(xml).unwrap(),
            [
                "System.Security.Permissions.FileIOPermission",
                "System.Security.Permissions.UIPermission"
            ]
        );
    }

    #[test]
    fn classes_malformed() {
        assert!(permission_classes("<PermissionSet><IPermission></PermissionSet>").is_err());
    }
}
