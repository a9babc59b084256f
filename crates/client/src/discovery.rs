//! Two-phase discovery handshake with cache fallback.
//!
//! Phase one GETs the service URL and decodes the service document; phase
//! two, issued only when an Authentication resource was advertised,
//! OPTIONS-probes that resource for the options document. The phases are
//! strictly sequential, and both ride the redirect follower.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};
use url::Url;

use marginalia_protocol::{ResourceType, parse_options_document, parse_service_document};

use crate::cache::{DiscoveryCache, DiscoveryEntry, now_ts};
use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::redirect::RedirectFollower;
use crate::transport::{Method, Transport, TransportReply, TransportRequest};

/// Runs the discovery handshake and keeps the cache fresh.
pub struct DiscoveryClient<'a> {
	transport: &'a dyn Transport,
	cache: &'a DiscoveryCache,
	events: &'a EventSink,
}

impl<'a> DiscoveryClient<'a> {
	pub fn new(
		transport: &'a dyn Transport,
		cache: &'a DiscoveryCache,
		events: &'a EventSink,
	) -> Self {
		Self { transport, cache, events }
	}

	/// Resolves a service's resources, preferring the cache unless
	/// `force_reload`. A successful network pass refreshes the cache.
	///
	/// Cached entries are trusted for as long as they exist; only
	/// `force_reload` (or an empty entry) sends the client back to the
	/// network.
	pub async fn discover(&self, service_url: &Url, force_reload: bool) -> Result<DiscoveryEntry> {
		if !force_reload {
			if let Some(entry) = self.cache.load(service_url) {
				if !entry.resources.is_empty() {
					debug!(
						target: "marginalia.discovery",
						url = %service_url,
						"discovery satisfied from cache"
					);
					return Ok(entry);
				}
			}
		}
		self.discover_from_network(service_url).await
	}

	async fn discover_from_network(&self, service_url: &Url) -> Result<DiscoveryEntry> {
		let follower = RedirectFollower::new(self.transport, self.events);

		let reply = follower
			.send(Method::Get, TransportRequest::new(service_url.clone()))
			.await?;
		ensure_success(&reply)?;
		let document = parse_service_document(&reply.body, service_url).map_err(|err| {
			debug!(target: "marginalia.discovery", error = %err, "service document rejected");
			Error::ServiceServer("Cannot parse service document".to_string())
		})?;

		let mut entry = DiscoveryEntry {
			service_url: service_url.clone(),
			service_name: document.name,
			resources: document.resources,
			auth_backends: BTreeMap::new(),
			last_reloaded: now_ts(),
		};

		if let Some(auth) = entry.resources.get(&ResourceType::Authentication) {
			let reply = follower
				.send(Method::Options, TransportRequest::new(auth.url.clone()))
				.await?;
			ensure_success(&reply)?;
			let options = parse_options_document(&reply.body).map_err(|err| {
				debug!(target: "marginalia.discovery", error = %err, "options document rejected");
				Error::ServiceServer("Cannot parse authentication options".to_string())
			})?;
			entry.auth_backends = options.backends;
		}

		info!(
			target: "marginalia.discovery",
			url = %service_url,
			name = %entry.service_name,
			resources = entry.resources.len(),
			backends = entry.auth_backends.len(),
			"discovery complete"
		);

		// Discovery succeeded even if the snapshot cannot be persisted.
		if let Err(err) = self.cache.save(&entry) {
			warn!(
				target: "marginalia.cache",
				error = %err,
				"failed to persist discovery entry"
			);
		}

		Ok(entry)
	}
}

fn ensure_success(reply: &TransportReply) -> Result<()> {
	if reply.is_success() {
		Ok(())
	} else {
		Err(Error::ServiceServerInaccessible(
			"Cannot resolve service URL".to_string(),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::FakeTransport;

	const SERVICE_URL: &str = "https://svc.example.com/";

	const SERVICE_DOC: &str = r#"
		<services version="0.7">
		  <service name="Example">
		    <resource type="documents" href="https://svc.example.com/documents"/>
		    <resource type="auth" href="https://svc.example.com/auth"/>
		  </service>
		</services>"#;

	const OPTIONS_DOC: &str = r#"
		<options version="0.3">
		  <backend name="basic" schema="password"/>
		</options>"#;

	fn service_url() -> Url {
		Url::parse(SERVICE_URL).unwrap()
	}

	fn cache() -> (tempfile::TempDir, DiscoveryCache) {
		let dir = tempfile::tempdir().unwrap();
		let cache = DiscoveryCache::open(dir.path().join("cache.json"));
		(dir, cache)
	}

	#[tokio::test]
	async fn two_phase_discovery_populates_and_caches() {
		let transport = FakeTransport::new();
		transport.stage(Method::Get, SERVICE_URL, TransportReply::ok(SERVICE_DOC));
		transport.stage(
			Method::Options,
			"https://svc.example.com/auth",
			TransportReply::ok(OPTIONS_DOC),
		);
		let (_dir, cache) = cache();
		let events = EventSink::new();
		let client = DiscoveryClient::new(&transport, &cache, &events);

		let entry = client.discover(&service_url(), false).await.unwrap();
		assert_eq!(entry.service_name, "Example");
		assert_eq!(entry.resources.len(), 2);
		assert_eq!(entry.auth_backends.len(), 1);
		assert_eq!(entry.auth_backends["basic"].schema, "password");

		// The snapshot round-trips through the cache.
		let cached = cache.load(&service_url()).unwrap();
		assert_eq!(cached, entry);
	}

	#[tokio::test]
	async fn the_options_phase_is_skipped_without_an_auth_resource() {
		let transport = FakeTransport::new();
		transport.stage(
			Method::Get,
			SERVICE_URL,
			TransportReply::ok(
				r#"<services version="0.7"><service name="svc">
				   <resource type="documents" href="https://svc.example.com/documents"/>
				   </service></services>"#,
			),
		);
		let (_dir, cache) = cache();
		let events = EventSink::new();
		let client = DiscoveryClient::new(&transport, &cache, &events);

		let entry = client.discover(&service_url(), false).await.unwrap();
		assert!(entry.auth_backends.is_empty());
		assert_eq!(transport.sent().len(), 1);
	}

	#[tokio::test]
	async fn an_empty_service_document_fails() {
		let transport = FakeTransport::new();
		transport.stage(
			Method::Get,
			SERVICE_URL,
			TransportReply::ok(r#"<services version="0.7"><service name="svc"/></services>"#),
		);
		let (_dir, cache) = cache();
		let events = EventSink::new();
		let client = DiscoveryClient::new(&transport, &cache, &events);

		let err = client.discover(&service_url(), false).await.unwrap_err();
		assert_eq!(
			err,
			Error::ServiceServer("Cannot parse service document".to_string())
		);
	}

	#[tokio::test]
	async fn an_empty_options_document_fails() {
		let transport = FakeTransport::new();
		transport.stage(Method::Get, SERVICE_URL, TransportReply::ok(SERVICE_DOC));
		transport.stage(
			Method::Options,
			"https://svc.example.com/auth",
			TransportReply::ok(r#"<options version="0.3"></options>"#),
		);
		let (_dir, cache) = cache();
		let events = EventSink::new();
		let client = DiscoveryClient::new(&transport, &cache, &events);

		let err = client.discover(&service_url(), false).await.unwrap_err();
		assert_eq!(
			err,
			Error::ServiceServer("Cannot parse authentication options".to_string())
		);
	}

	#[tokio::test]
	async fn cache_hits_bypass_the_network() {
		let transport = FakeTransport::new();
		transport.stage(Method::Get, SERVICE_URL, TransportReply::ok(SERVICE_DOC));
		transport.stage(
			Method::Options,
			"https://svc.example.com/auth",
			TransportReply::ok(OPTIONS_DOC),
		);
		let (_dir, cache) = cache();
		let events = EventSink::new();

		let first = {
			let client = DiscoveryClient::new(&transport, &cache, &events);
			client.discover(&service_url(), false).await.unwrap()
		};

		// No further replies staged: a second discovery must come from
		// the cache alone.
		let client = DiscoveryClient::new(&transport, &cache, &events);
		let second = client.discover(&service_url(), false).await.unwrap();
		assert_eq!(first, second);
		assert_eq!(transport.sent().len(), 2);
	}

	#[tokio::test]
	async fn force_reload_ignores_the_cache() {
		let transport = FakeTransport::new();
		transport.stage(Method::Get, SERVICE_URL, TransportReply::ok(SERVICE_DOC));
		transport.stage(
			Method::Options,
			"https://svc.example.com/auth",
			TransportReply::ok(OPTIONS_DOC),
		);
		let (_dir, cache) = cache();
		let events = EventSink::new();

		{
			let client = DiscoveryClient::new(&transport, &cache, &events);
			client.discover(&service_url(), false).await.unwrap();
		}

		// A forced reload with nothing staged has to hit the network and
		// fail, proving the cache was not consulted.
		let client = DiscoveryClient::new(&transport, &cache, &events);
		let err = client.discover(&service_url(), true).await.unwrap_err();
		assert_eq!(err.kind(), crate::error::ErrorKind::ServiceServerInaccessible);
	}

	#[tokio::test]
	async fn http_failures_surface_as_inaccessible() {
		let transport = FakeTransport::new();
		transport.stage(
			Method::Get,
			SERVICE_URL,
			TransportReply { status: 503, body: String::new(), redirect_target: None },
		);
		let (_dir, cache) = cache();
		let events = EventSink::new();
		let client = DiscoveryClient::new(&transport, &cache, &events);

		let err = client.discover(&service_url(), false).await.unwrap_err();
		assert_eq!(
			err,
			Error::ServiceServerInaccessible("Cannot resolve service URL".to_string())
		);
	}
}
