//! Guarded session state machine.
//!
//! Exactly one [`ServiceState`] is current at any time, and this module is
//! the only place that mutates it. Every other component requests
//! transitions through [`StateMachine::change_state`] and reacts to the
//! broadcast events.

use tracing::trace;

use crate::events::{EventSink, ServiceEvent};

/// Lifecycle of one service session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServiceState {
	/// No URL configured yet.
	#[default]
	Empty,
	/// Discovery in flight.
	Populating,
	/// Discovered but not running.
	Stopped,
	/// Running; API calls may be issued.
	Started,
	LoggingIn,
	LoggingOut,
	/// A failure was recorded; recover with `reset`.
	Error,
}

impl ServiceState {
	pub(crate) fn name(self) -> &'static str {
		match self {
			Self::Empty => "empty",
			Self::Populating => "populating",
			Self::Stopped => "stopped",
			Self::Started => "started",
			Self::LoggingIn => "logging-in",
			Self::LoggingOut => "logging-out",
			Self::Error => "error",
		}
	}
}

/// Whether the transition `current -> desired` is legal.
///
/// `Error` is reachable from anywhere; `Empty` is never a target.
fn permits(current: ServiceState, desired: ServiceState) -> bool {
	use ServiceState::*;
	match desired {
		Populating => current == Empty,
		Stopped => matches!(current, Populating | Started | Error),
		Started => matches!(current, Stopped | LoggingIn | LoggingOut),
		LoggingIn | LoggingOut => current == Started,
		Error => true,
		Empty => false,
	}
}

/// The state-specific event mirroring a committed transition.
fn event_for(state: ServiceState) -> Option<ServiceEvent> {
	match state {
		ServiceState::Populating => Some(ServiceEvent::Populating),
		ServiceState::Stopped => Some(ServiceEvent::Stopped),
		ServiceState::Started => Some(ServiceEvent::Started),
		ServiceState::LoggingIn => Some(ServiceEvent::LoggingIn),
		ServiceState::LoggingOut => Some(ServiceEvent::LoggingOut),
		ServiceState::Error => Some(ServiceEvent::Error),
		ServiceState::Empty => None,
	}
}

/// Owner of the current [`ServiceState`].
#[derive(Debug)]
pub struct StateMachine {
	state: ServiceState,
	events: EventSink,
}

impl StateMachine {
	pub fn new(events: EventSink) -> Self {
		Self { state: ServiceState::Empty, events }
	}

	#[cfg(test)]
	pub(crate) fn with_state(state: ServiceState, events: EventSink) -> Self {
		Self { state, events }
	}

	pub fn current(&self) -> ServiceState {
		self.state
	}

	/// Commits `desired` when the transition is legal and reports whether
	/// it was. Re-requesting the current state is a no-op that still
	/// reports success and emits nothing.
	///
	/// A committed transition emits [`ServiceEvent::StateChanged`] followed
	/// by the state-specific event.
	pub fn change_state(&mut self, desired: ServiceState) -> bool {
		if self.state == desired {
			return true;
		}

		if !permits(self.state, desired) {
			trace!(
				target: "marginalia.session",
				from = self.state.name(),
				to = desired.name(),
				"transition rejected"
			);
			return false;
		}

		trace!(
			target: "marginalia.session",
			from = self.state.name(),
			to = desired.name(),
			"transition"
		);
		self.state = desired;
		self.events.emit(ServiceEvent::StateChanged(desired));
		if let Some(event) = event_for(desired) {
			self.events.emit(event);
		}
		true
	}
}
