//! Decoding of the authentication options document.
//!
//! The options document is the OPTIONS response from a service's `auth`
//! resource:
//!
//! ```xml
//! <options version="0.3">
//!   <backend name="basic" schema="password" capabilities="register reset"/>
//!   <description>...</description>
//!   <terminology><term key="user">reader</term></terminology>
//! </options>
//! ```
//!
//! `description` and `terminology` are document-wide and applied to every
//! backend the document lists.

use std::collections::BTreeMap;

use roxmltree::{Document, Node};

use crate::error::ParseError;
use crate::service_document::split_capabilities;
use crate::types::AuthBackend;

/// Options-document protocol version this client understands.
pub const OPTIONS_VERSION: &str = "0.3";

/// A decoded options document: authentication backends keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsDocument {
    pub backends: BTreeMap<String, AuthBackend>,
}

/// Decodes an options document body.
///
/// A document that yields no backends is an error.
pub fn parse_options_document(body: &str) -> Result<OptionsDocument, ParseError> {
    let doc = Document::parse(body)?;
    let root = doc.root_element();
    if root.tag_name().name() != "options" || root.attribute("version") != Some(OPTIONS_VERSION) {
        return Err(ParseError::UnexpectedRoot {
            tag: root.tag_name().name().to_string(),
            version: root.attribute("version").map(str::to_string),
        });
    }

    let description = root
        .children()
        .find(|n| n.has_tag_name("description"))
        .map(text_of)
        .unwrap_or_default();

    let mut terminology = BTreeMap::new();
    if let Some(section) = root.children().find(|n| n.has_tag_name("terminology")) {
        for term in section.children().filter(|n| n.has_tag_name("term")) {
            match term.attribute("key") {
                Some(key) if !key.is_empty() => {
                    terminology.insert(key.to_string(), text_of(term));
                }
                _ => {}
            }
        }
    }

    let mut backends = BTreeMap::new();
    for node in root.children().filter(|n| n.has_tag_name("backend")) {
        let name = node.attribute("name").unwrap_or_default().to_string();
        backends.insert(
            name.clone(),
            AuthBackend {
                name,
                schema: node.attribute("schema").unwrap_or_default().to_string(),
                capabilities: split_capabilities(
                    node.attribute("capabilities").unwrap_or_default(),
                ),
                description: description.clone(),
                terminology: terminology.clone(),
            },
        );
    }

    if backends.is_empty() {
        return Err(ParseError::NoBackends);
    }

    Ok(OptionsDocument { backends })
}

fn text_of(node: Node<'_, '_>) -> String {
    node.text().unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backends_with_shared_metadata() {
        let body = r#"
            <options version="0.3">
              <backend name="basic" schema="password" capabilities="register reset"/>
              <backend name="orcid" schema="oauth2"/>
              <description>Example accounts</description>
              <terminology>
                <term key="user">reader</term>
                <term key="password">passphrase</term>
              </terminology>
            </options>"#;

        let doc = parse_options_document(body).unwrap();
        assert_eq!(doc.backends.len(), 2);

        let basic = &doc.backends["basic"];
        assert_eq!(basic.schema, "password");
        assert_eq!(basic.capabilities, ["register", "reset"]);
        assert_eq!(basic.description, "Example accounts");
        assert_eq!(basic.terminology["user"], "reader");

        let orcid = &doc.backends["orcid"];
        assert_eq!(orcid.schema, "oauth2");
        assert!(orcid.capabilities.is_empty());
        assert_eq!(orcid.description, "Example accounts");
    }

    #[test]
    fn terms_without_keys_are_skipped() {
        let body = r#"
            <options version="0.3">
              <backend name="basic" schema="password"/>
              <terminology><term>orphan</term><term key="">empty</term></terminology>
            </options>"#;

        let doc = parse_options_document(body).unwrap();
        assert!(doc.backends["basic"].terminology.is_empty());
    }

    #[test]
    fn zero_backends_is_an_error() {
        let body = r#"<options version="0.3"><description>empty</description></options>"#;
        assert!(matches!(
            parse_options_document(body),
            Err(ParseError::NoBackends)
        ));
    }

    #[test]
    fn wrong_root_or_version_is_rejected() {
        assert!(matches!(
            parse_options_document(r#"<options version="0.2"><backend name="b"/></options>"#),
            Err(ParseError::UnexpectedRoot { .. })
        ));
        assert!(matches!(
            parse_options_document(r#"<services version="0.3"/>"#),
            Err(ParseError::UnexpectedRoot { .. })
        ));
    }
}
