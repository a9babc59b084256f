//! Discovery and session client for marginalia annotation services.
//!
//! This crate centralizes endpoint discovery, the session state machine,
//! and login/logout coordination against a discovered service. The
//! credential exchange itself is delegated to an [`AuthAgent`] supplied by
//! the embedding application; HTTP lives behind the [`Transport`] seam.

/// Delegation seam for the external credential exchange.
pub mod agent;
/// Persistent discovery cache keyed by service URL.
pub mod cache;
/// Stored account configuration round-trip.
pub mod config;
/// Two-phase discovery handshake with cache fallback.
pub mod discovery;
/// Error taxonomy shared across the client.
pub mod error;
/// One-way notifications broadcast to subscribers.
pub mod events;
/// Bounded transparent redirect following.
pub mod redirect;
/// Account-level facade tying the pieces together.
pub mod service;
/// Authenticated session data.
pub mod session;
/// Guarded session state machine.
pub mod state;
/// Scripted transport for tests.
pub mod testing;
/// HTTP transport seam and its reqwest-backed default.
pub mod transport;

pub use agent::{AuthAgent, Credentials, LoginOutcome, LoginRequest};
pub use cache::{DiscoveryCache, DiscoveryEntry};
pub use config::AccountConfig;
pub use discovery::DiscoveryClient;
pub use error::{Error, ErrorKind, Result};
pub use events::{EventSink, ServiceEvent};
pub use redirect::{MAX_REDIRECTS, RedirectFollower};
pub use service::Service;
pub use session::Session;
pub use state::{ServiceState, StateMachine};
pub use transport::{
    HttpTransport, Method, Transport, TransportError, TransportReply, TransportRequest,
};
