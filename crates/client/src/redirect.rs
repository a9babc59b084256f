//! Bounded transparent redirect following.
//!
//! One logical request may traverse several redirect hops; each hop
//! re-issues the *same* method at the new target. The hop counter lives in
//! a per-chain context, so one follower can serve consecutive requests
//! without any counter leaking between them.

use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::events::{EventSink, ServiceEvent};
use crate::transport::{Method, Transport, TransportError, TransportReply, TransportRequest};

/// Hops followed before a chain is abandoned.
pub const MAX_REDIRECTS: u32 = 4;

/// Per-chain bookkeeping: where the chain started and how far it has hopped.
#[derive(Debug)]
struct RedirectChain {
	origin: Url,
	hops: u32,
}

/// Re-issues a logical request across redirect hops until a terminal reply
/// or the hop budget is reached.
pub struct RedirectFollower<'a> {
	transport: &'a dyn Transport,
	events: &'a EventSink,
}

impl<'a> RedirectFollower<'a> {
	pub fn new(transport: &'a dyn Transport, events: &'a EventSink) -> Self {
		Self { transport, events }
	}

	/// Sends `request`, transparently following redirects.
	///
	/// Emits [`ServiceEvent::RequestSettled`] exactly once per call,
	/// whether the chain ended in a terminal reply or in the redirect
	/// limit.
	pub async fn send(&self, method: Method, request: TransportRequest) -> Result<TransportReply> {
		let result = self.drive(method, request).await;
		self.events.emit(ServiceEvent::RequestSettled);
		result
	}

	async fn drive(&self, method: Method, mut request: TransportRequest) -> Result<TransportReply> {
		let mut chain = RedirectChain { origin: request.url.clone(), hops: 0 };
		loop {
			let reply = self
				.transport
				.send(method, request.clone())
				.await
				.map_err(map_transport_error)?;

			let Some(target) = reply.redirect_target.as_deref() else {
				return Ok(reply);
			};
			let Some(next) = resolve_redirect(&chain.origin, target) else {
				// Unusable Location header; the reply is terminal.
				return Ok(reply);
			};

			if chain.hops >= MAX_REDIRECTS {
				return Err(Error::ServiceServerInaccessible(
					"Cannot resolve service URL (too many redirects)".to_string(),
				));
			}
			chain.hops += 1;
			debug!(
				target: "marginalia.discovery",
				hop = chain.hops,
				url = %next,
				"following redirect"
			);
			request.url = next;
		}
	}
}

/// Resolves a redirect target against the URL the chain started from.
///
/// Absolute targets win outright. Relative targets join against the chain
/// origin, so an authority-less target inherits the *original* authority
/// (not the previous hop's) while a protocol-relative target keeps its own.
fn resolve_redirect(origin: &Url, target: &str) -> Option<Url> {
	if let Ok(absolute) = Url::parse(target) {
		return Some(absolute);
	}
	origin.join(target).ok()
}

fn map_transport_error(err: TransportError) -> Error {
	match err {
		TransportError::TimedOut => {
			Error::ServiceServerInaccessible("Connection timed out".to_string())
		}
		TransportError::Connection(_) => {
			Error::ServiceServerInaccessible("Cannot resolve service URL".to_string())
		}
	}
}
