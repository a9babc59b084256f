//! Wire types for the marginalia discovery protocol.
//!
//! This crate contains the document shapes exchanged during the two-phase
//! discovery handshake: the service document returned by a GET of the
//! service URL, and the options document returned by an OPTIONS probe of
//! the authentication resource. These types represent the "protocol layer" -
//! the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No I/O, no session state
//! * 1:1 with protocol: Match the discovery document schemas exactly
//! * Stable: Changes only when the wire protocol changes
//!
//! The stateful client (state machine, cache, transport) is built on top of
//! these types in `marginalia-client`.

pub mod error;
pub mod options_document;
pub mod service_document;
pub mod types;

pub use error::*;
pub use options_document::*;
pub use service_document::*;
pub use types::*;
