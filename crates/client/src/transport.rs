//! HTTP transport seam and its reqwest-backed default.
//!
//! The transport issues exactly one request per call and never follows
//! redirects itself; hop semantics belong to
//! [`RedirectFollower`](crate::redirect::RedirectFollower). Implementations
//! report redirects by surfacing the raw `Location` value on the reply.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// HTTP verbs the discovery protocol uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
	Get,
	Options,
}

/// One outbound request, before redirect handling.
#[derive(Debug, Clone)]
pub struct TransportRequest {
	pub url: Url,
	pub headers: Vec<(String, String)>,
}

impl TransportRequest {
	pub fn new(url: Url) -> Self {
		Self { url, headers: Vec::new() }
	}

	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}
}

/// One hop's outcome as seen by the redirect follower.
#[derive(Debug, Clone)]
pub struct TransportReply {
	pub status: u16,
	pub body: String,
	/// Raw `Location` value when the reply was a redirect.
	pub redirect_target: Option<String>,
}

impl TransportReply {
	/// A plain 200 reply carrying `body`.
	pub fn ok(body: impl Into<String>) -> Self {
		Self { status: 200, body: body.into(), redirect_target: None }
	}

	/// A redirect reply pointing at `target`.
	pub fn redirect(status: u16, target: impl Into<String>) -> Self {
		Self { status, body: String::new(), redirect_target: Some(target.into()) }
	}

	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Failures below the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
	/// The request timed out or was cancelled before completing.
	#[error("request timed out")]
	TimedOut,
	/// Any other connection-level failure.
	#[error("{0}")]
	Connection(String),
}

/// Issues a single request and returns a single reply.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn send(
		&self,
		method: Method,
		request: TransportRequest,
	) -> Result<TransportReply, TransportError>;
}

/// Default transport on reqwest.
///
/// Redirect following is disabled on the underlying client so redirect
/// replies reach the follower untouched.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	client: reqwest::Client,
}

impl HttpTransport {
	pub fn new(timeout: Duration) -> Result<Self, TransportError> {
		let client = reqwest::Client::builder()
			.redirect(reqwest::redirect::Policy::none())
			.timeout(timeout)
			.build()
			.map_err(|err| TransportError::Connection(err.to_string()))?;
		Ok(Self { client })
	}
}

#[async_trait]
impl Transport for HttpTransport {
	async fn send(
		&self,
		method: Method,
		request: TransportRequest,
	) -> Result<TransportReply, TransportError> {
		let verb = match method {
			Method::Get => reqwest::Method::GET,
			Method::Options => reqwest::Method::OPTIONS,
		};
		let mut builder = self.client.request(verb, request.url.clone());
		for (name, value) in &request.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}

		let response = builder.send().await.map_err(classify)?;
		let status = response.status().as_u16();
		let redirect_target = if response.status().is_redirection() {
			response
				.headers()
				.get(reqwest::header::LOCATION)
				.and_then(|value| value.to_str().ok())
				.map(str::to_string)
		} else {
			None
		};
		let body = response.text().await.map_err(classify)?;

		Ok(TransportReply { status, body, redirect_target })
	}
}

fn classify(err: reqwest::Error) -> TransportError {
	if err.is_timeout() {
		TransportError::TimedOut
	} else {
		TransportError::Connection(err.to_string())
	}
}
