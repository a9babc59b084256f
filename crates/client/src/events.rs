//! One-way notifications broadcast to interested subscribers.
//!
//! Delivery is fire-and-forget with at-most-once semantics per subscriber:
//! events go out over a [`tokio::sync::broadcast`] channel that UI or
//! logging consumers poll or select on. Nobody listening is fine; slow
//! subscribers lose the oldest events rather than blocking the client.

use tokio::sync::broadcast;

use crate::state::ServiceState;

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_BUFFER: usize = 64;

/// Notifications a service broadcasts while it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
	/// The state machine committed a transition.
	StateChanged(ServiceState),
	Populating,
	Stopped,
	Started,
	LoggingIn,
	LoggingOut,
	Error,
	/// A fresh token was issued for the given user URI.
	NewToken { user_uri: String, token: String },
	ServiceNameChanged(String),
	CredentialsChanged,
	AnonymityChanged(bool),
	/// A redirect chain reached its terminal reply or gave up.
	RequestSettled,
}

/// Subscriber fanout for [`ServiceEvent`]s.
#[derive(Debug, Clone)]
pub struct EventSink {
	tx: broadcast::Sender<ServiceEvent>,
}

impl EventSink {
	pub fn new() -> Self {
		let (tx, _) = broadcast::channel(EVENT_BUFFER);
		Self { tx }
	}

	/// Registers a new subscriber; it sees events emitted from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
		self.tx.subscribe()
	}

	/// Sends to whoever is listening; silently dropped when nobody is.
	pub fn emit(&self, event: ServiceEvent) {
		let _ = self.tx.send(event);
	}
}

impl Default for EventSink {
	fn default() -> Self {
		Self::new()
	}
}
