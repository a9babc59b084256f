//! Decode errors for discovery documents.

use thiserror::Error;

/// Why a discovery document could not be decoded.
///
/// Callers generally collapse these into a single "cannot parse" failure;
/// the variants exist so logs can say what was actually wrong.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body was not well-formed XML at all.
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The root element or its protocol version was not the expected one.
    #[error("unexpected root element <{tag}> (version {version:?})")]
    UnexpectedRoot {
        tag: String,
        version: Option<String>,
    },

    /// A service document that advertises no usable resources.
    #[error("service document advertises no resources")]
    NoResources,

    /// An options document that advertises no authentication backends.
    #[error("options document advertises no backends")]
    NoBackends,
}
