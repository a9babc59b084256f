//! Core protocol data types shared by both discovery documents.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// A named capability endpoint advertised by a service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Documents,
    Annotations,
    Definitions,
    Authentication,
}

impl ResourceType {
    /// Maps a service-document `type` attribute onto a resource type.
    ///
    /// Unknown attribute values yield `None`; callers skip those resources
    /// rather than rejecting the whole document.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "documents" => Some(Self::Documents),
            "annotations" => Some(Self::Annotations),
            "lookup" => Some(Self::Definitions),
            "auth" => Some(Self::Authentication),
            _ => None,
        }
    }

    /// The `type` attribute value this resource type appears as on the wire.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Documents => "documents",
            Self::Annotations => "annotations",
            Self::Definitions => "lookup",
            Self::Authentication => "auth",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// One discovered resource endpoint and its advertised capabilities.
///
/// Records are replaced wholesale on re-discovery, never partially mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub url: Url,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// A named authentication method advertised by the options document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthBackend {
    pub name: String,
    pub schema: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub terminology: BTreeMap<String, String>,
}
