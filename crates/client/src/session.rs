//! Authenticated session data.

/// Session credentials for one service account.
///
/// A non-empty token is necessary but not sufficient for
/// `is_logged_in`; the state machine must also be in `Started`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
	pub token: String,
	pub user_uri: String,
	pub anonymous: bool,
}

impl Session {
	/// Drops the token and user URI, keeping the anonymity preference.
	pub(crate) fn clear(&mut self) {
		self.token.clear();
		self.user_uri.clear();
	}
}
