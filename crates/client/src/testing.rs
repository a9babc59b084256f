//! Scripted transport for exercising discovery flows without a network.
//!
//! Replies are staged per `(method, url)` and consumed in order, so a
//! redirect chain is scripted as one staged reply per hop. Sent requests
//! are recorded for inspection.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::transport::{Method, Transport, TransportError, TransportReply, TransportRequest};

type StagedReply = Result<TransportReply, TransportError>;

/// In-memory transport backed by staged replies.
#[derive(Debug, Default)]
pub struct FakeTransport {
	replies: Mutex<HashMap<(Method, String), VecDeque<StagedReply>>>,
	sent: Mutex<Vec<(Method, TransportRequest)>>,
}

impl FakeTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stages the next reply for `method` on `url`.
	pub fn stage(&self, method: Method, url: &str, reply: TransportReply) {
		self.replies
			.lock()
			.entry((method, url.to_string()))
			.or_default()
			.push_back(Ok(reply));
	}

	/// Stages a transport-level failure for `method` on `url`.
	pub fn stage_error(&self, method: Method, url: &str, error: TransportError) {
		self.replies
			.lock()
			.entry((method, url.to_string()))
			.or_default()
			.push_back(Err(error));
	}

	/// Every request sent so far, in order.
	pub fn sent(&self) -> Vec<(Method, TransportRequest)> {
		self.sent.lock().clone()
	}
}

#[async_trait]
impl Transport for FakeTransport {
	async fn send(
		&self,
		method: Method,
		request: TransportRequest,
	) -> Result<TransportReply, TransportError> {
		self.sent.lock().push((method, request.clone()));
		let staged = self
			.replies
			.lock()
			.get_mut(&(method, request.url.as_str().to_string()))
			.and_then(VecDeque::pop_front);
		staged.unwrap_or_else(|| {
			Err(TransportError::Connection(format!(
				"no staged reply for {method:?} {}",
				request.url
			)))
		})
	}
}
