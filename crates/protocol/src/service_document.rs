//! Decoding of the top-level service document.
//!
//! The service document is the GET response for a service URL:
//!
//! ```xml
//! <services version="0.7">
//!   <service name="...">
//!     <resource type="documents" href="..." capabilities="cap1 cap2"/>
//!   </service>
//! </services>
//! ```

use std::collections::BTreeMap;

use roxmltree::Document;
use url::Url;

use crate::error::ParseError;
use crate::types::{ResourceRecord, ResourceType};

/// Service-document protocol version this client understands.
pub const SERVICES_VERSION: &str = "0.7";

/// A decoded service document: the service's name plus its resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDocument {
    pub name: String,
    pub resources: BTreeMap<ResourceType, ResourceRecord>,
}

/// Decodes a service document body, resolving resource hrefs against `base`.
///
/// Only the first `<service>` child is read. Resources with an unknown
/// `type` or an unusable `href` are skipped; a document that yields no
/// resources at all is an error. Trailing slashes are stripped from
/// resource paths so later URL joins behave predictably.
pub fn parse_service_document(body: &str, base: &Url) -> Result<ServiceDocument, ParseError> {
    let doc = Document::parse(body)?;
    let root = doc.root_element();
    if root.tag_name().name() != "services"
        || root.attribute("version") != Some(SERVICES_VERSION)
    {
        return Err(ParseError::UnexpectedRoot {
            tag: root.tag_name().name().to_string(),
            version: root.attribute("version").map(str::to_string),
        });
    }

    let Some(service) = root.children().find(|n| n.has_tag_name("service")) else {
        return Err(ParseError::NoResources);
    };

    let name = service.attribute("name").unwrap_or_default().to_string();
    let mut resources = BTreeMap::new();
    for node in service.children().filter(|n| n.has_tag_name("resource")) {
        let Some(kind) = node.attribute("type").and_then(ResourceType::from_wire) else {
            continue;
        };
        let Some(href) = node.attribute("href") else {
            continue;
        };
        let Ok(url) = base.join(href) else {
            continue;
        };
        resources.insert(
            kind,
            ResourceRecord {
                url: strip_trailing_slashes(url),
                capabilities: split_capabilities(
                    node.attribute("capabilities").unwrap_or_default(),
                ),
            },
        );
    }

    if resources.is_empty() {
        return Err(ParseError::NoResources);
    }

    Ok(ServiceDocument { name, resources })
}

/// Drops trailing `/` characters from a URL's path.
pub(crate) fn strip_trailing_slashes(mut url: Url) -> Url {
    if url.path().ends_with('/') {
        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }
    url
}

/// Splits a whitespace-separated capability attribute, dropping empty tokens.
pub(crate) fn split_capabilities(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://svc.example.com/kend").unwrap()
    }

    #[test]
    fn parses_a_full_document() {
        let body = r#"
            <services version="0.7">
              <service name="Example Annotation Service">
                <resource type="documents" href="https://svc.example.com/documents/"/>
                <resource type="annotations" href="https://svc.example.com/annotations" capabilities="search   publish"/>
                <resource type="auth" href="https://svc.example.com/auth"/>
              </service>
            </services>"#;

        let doc = parse_service_document(body, &base()).unwrap();
        assert_eq!(doc.name, "Example Annotation Service");
        assert_eq!(doc.resources.len(), 3);

        let documents = &doc.resources[&ResourceType::Documents];
        assert_eq!(documents.url.as_str(), "https://svc.example.com/documents");
        assert!(documents.capabilities.is_empty());

        let annotations = &doc.resources[&ResourceType::Annotations];
        assert_eq!(annotations.capabilities, ["search", "publish"]);
    }

    #[test]
    fn unknown_resource_types_are_skipped() {
        let body = r#"
            <services version="0.7">
              <service name="svc">
                <resource type="telemetry" href="https://svc.example.com/telemetry"/>
                <resource type="lookup" href="https://svc.example.com/lookup"/>
              </service>
            </services>"#;

        let doc = parse_service_document(body, &base()).unwrap();
        assert_eq!(doc.resources.len(), 1);
        assert!(doc.resources.contains_key(&ResourceType::Definitions));
    }

    #[test]
    fn relative_hrefs_resolve_against_base() {
        let body = r#"
            <services version="0.7">
              <service name="svc">
                <resource type="documents" href="/documents"/>
              </service>
            </services>"#;

        let doc = parse_service_document(body, &base()).unwrap();
        assert_eq!(
            doc.resources[&ResourceType::Documents].url.as_str(),
            "https://svc.example.com/documents"
        );
    }

    #[test]
    fn zero_resources_is_an_error() {
        let body = r#"<services version="0.7"><service name="svc"/></services>"#;
        assert!(matches!(
            parse_service_document(body, &base()),
            Err(ParseError::NoResources)
        ));
    }

    #[test]
    fn wrong_root_or_version_is_rejected() {
        let wrong_root = r#"<sessions version="0.7"/>"#;
        assert!(matches!(
            parse_service_document(wrong_root, &base()),
            Err(ParseError::UnexpectedRoot { .. })
        ));

        let wrong_version = r#"<services version="0.8"><service name="svc"/></services>"#;
        assert!(matches!(
            parse_service_document(wrong_version, &base()),
            Err(ParseError::UnexpectedRoot { .. })
        ));
    }

    #[test]
    fn garbage_body_is_rejected() {
        assert!(matches!(
            parse_service_document("not xml at all", &base()),
            Err(ParseError::Xml(_))
        ));
    }

    #[test]
    fn trailing_slash_stripping_handles_repeats() {
        let url = Url::parse("https://svc.example.com/a///").unwrap();
        assert_eq!(strip_trailing_slashes(url).path(), "/a");
    }
}
