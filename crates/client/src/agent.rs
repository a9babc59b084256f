//! Delegation seam for the external credential exchange.
//!
//! The client never performs the username/password exchange itself; it
//! hands the discovered authentication endpoint and the account's opaque
//! credentials to an [`AuthAgent`] and reacts to the outcome. Agents must
//! eventually resolve; an agent that never does leaves the state machine
//! in `LoggingIn`/`LoggingOut`, which is the caller's cue to reset.

use std::collections::BTreeMap;

use async_trait::async_trait;
use url::Url;

use crate::error::Error;
use crate::session::Session;

/// Opaque user-supplied credentials, passed through unopened.
pub type Credentials = BTreeMap<String, String>;

/// Successful credential exchange result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
	pub user_uri: String,
	pub token: String,
}

/// Everything an agent needs to run one credential exchange.
#[derive(Debug, Clone)]
pub struct LoginRequest {
	/// The discovered Authentication resource URL.
	pub auth_url: Url,
	/// The chosen backend name; empty when the account has not picked one.
	pub method: String,
	pub credentials: Credentials,
	pub anonymous: bool,
}

/// External authentication backend driver.
///
/// Errors carry the agent-side [`Error`] kinds (`InvalidCredentials`,
/// `AuthenticationServerError`, `AuthenticationServerInaccessible`).
#[async_trait]
pub trait AuthAgent: Send + Sync {
	/// Exchanges credentials for a token and user URI.
	async fn log_in(&self, request: LoginRequest) -> Result<LoginOutcome, Error>;

	/// Invalidates the session's token upstream.
	async fn log_out(&self, session: Session, auth_url: Url) -> Result<(), Error>;

	/// Authentication schemas this agent knows how to drive.
	fn supported_schemas(&self) -> Vec<String>;
}
