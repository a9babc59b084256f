//! Error taxonomy for the service client.
//!
//! Every failure is classified into one of the [`ErrorKind`]s so UI layers
//! can react to the class while logging the message. All failures reach the
//! caller through the state machine's error state; see
//! [`Service::set_error`](crate::service::Service::set_error).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Machine-readable classification of a client failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Malformed discovery or options document.
	ServiceServerError,
	/// Network failure, timeout, or redirect limit exceeded.
	ServiceServerInaccessible,
	/// The authentication backend rejected the supplied credentials.
	InvalidCredentials,
	/// The authentication backend answered with a server-side failure.
	AuthenticationServerError,
	/// The authentication backend could not be reached.
	AuthenticationServerInaccessible,
	/// An illegal state transition was attempted.
	UnknownError,
}

/// A classified client failure and its human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	#[error("{0}")]
	ServiceServer(String),
	#[error("{0}")]
	ServiceServerInaccessible(String),
	#[error("{0}")]
	InvalidCredentials(String),
	#[error("{0}")]
	AuthenticationServer(String),
	#[error("{0}")]
	AuthenticationServerInaccessible(String),
	#[error("{0}")]
	Unknown(String),
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::ServiceServer(_) => ErrorKind::ServiceServerError,
			Self::ServiceServerInaccessible(_) => ErrorKind::ServiceServerInaccessible,
			Self::InvalidCredentials(_) => ErrorKind::InvalidCredentials,
			Self::AuthenticationServer(_) => ErrorKind::AuthenticationServerError,
			Self::AuthenticationServerInaccessible(_) => {
				ErrorKind::AuthenticationServerInaccessible
			}
			Self::Unknown(_) => ErrorKind::UnknownError,
		}
	}
}
