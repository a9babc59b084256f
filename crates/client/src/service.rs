//! Account-level service facade.
//!
//! A [`Service`] owns one state machine and drives one discovery or login
//! chain at a time. Discovery is awaited by the caller; the credential
//! exchange runs on a spawned task and re-enters the machine through the
//! completion callbacks, so `log_in`/`log_out` return as soon as the
//! exchange is underway. Handles are cheap to clone and share one
//! underlying account.
//!
//! `log_in`, `log_out`, and `set_anonymous` spawn onto the ambient Tokio
//! runtime and must be called from within one.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use marginalia_protocol::{AuthBackend, ResourceRecord, ResourceType};

use crate::agent::{AuthAgent, Credentials, LoginRequest};
use crate::cache::DiscoveryCache;
use crate::config::AccountConfig;
use crate::discovery::DiscoveryClient;
use crate::error::{Error, ErrorKind};
use crate::events::{EventSink, ServiceEvent};
use crate::session::Session;
use crate::state::{ServiceState, StateMachine};
use crate::transport::{Transport, TransportRequest};

/// Scheme token on Authorization headers for this service family.
const AUTHORIZATION_SCHEME: &str = "Marginalia";

struct ServiceInner {
	machine: StateMachine,
	last_error: Option<Error>,
	service_url: Option<Url>,
	service_name: String,
	description: String,
	enabled: bool,
	session: Session,
	credentials: Credentials,
	authentication_method: String,
	resources: BTreeMap<ResourceType, ResourceRecord>,
	auth_backends: BTreeMap<String, AuthBackend>,
}

/// One remote service account.
#[derive(Clone)]
pub struct Service {
	uuid: Uuid,
	transport: Arc<dyn Transport>,
	agent: Arc<dyn AuthAgent>,
	cache: DiscoveryCache,
	events: EventSink,
	inner: Arc<Mutex<ServiceInner>>,
}

impl Service {
	pub fn new(
		transport: Arc<dyn Transport>,
		agent: Arc<dyn AuthAgent>,
		cache: DiscoveryCache,
	) -> Self {
		Self::with_uuid(Uuid::new_v4(), transport, agent, cache)
	}

	/// Builds a service with a known identity, e.g. one loaded from an
	/// [`AccountConfig`].
	pub fn with_uuid(
		uuid: Uuid,
		transport: Arc<dyn Transport>,
		agent: Arc<dyn AuthAgent>,
		cache: DiscoveryCache,
	) -> Self {
		let events = EventSink::new();
		let inner = ServiceInner {
			machine: StateMachine::new(events.clone()),
			last_error: None,
			service_url: None,
			service_name: String::new(),
			description: String::new(),
			enabled: true,
			session: Session::default(),
			credentials: Credentials::new(),
			authentication_method: String::new(),
			resources: BTreeMap::new(),
			auth_backends: BTreeMap::new(),
		};
		Self {
			uuid,
			transport,
			agent,
			cache,
			events,
			inner: Arc::new(Mutex::new(inner)),
		}
	}

	pub fn uuid(&self) -> Uuid {
		self.uuid
	}

	/// Registers a subscriber for this service's events.
	pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
		self.events.subscribe()
	}

	pub fn state(&self) -> ServiceState {
		self.inner.lock().machine.current()
	}

	pub fn url(&self) -> Option<Url> {
		self.inner.lock().service_url.clone()
	}

	pub fn service_name(&self) -> String {
		self.inner.lock().service_name.clone()
	}

	pub fn description(&self) -> String {
		self.inner.lock().description.clone()
	}

	pub fn set_description(&self, description: impl Into<String>) {
		self.inner.lock().description = description.into();
	}

	pub fn is_enabled(&self) -> bool {
		self.inner.lock().enabled
	}

	pub fn set_enabled(&self, enabled: bool) {
		self.inner.lock().enabled = enabled;
	}

	pub fn error_code(&self) -> Option<ErrorKind> {
		self.inner.lock().last_error.as_ref().map(Error::kind)
	}

	pub fn error_message(&self) -> Option<String> {
		self.inner.lock().last_error.as_ref().map(Error::to_string)
	}

	pub fn session(&self) -> Session {
		self.inner.lock().session.clone()
	}

	pub fn is_anonymous(&self) -> bool {
		self.inner.lock().session.anonymous
	}

	pub fn credentials(&self) -> Credentials {
		self.inner.lock().credentials.clone()
	}

	/// Replaces the stored credentials, with change detection.
	pub fn set_credentials(&self, credentials: Credentials) {
		let changed = {
			let mut inner = self.inner.lock();
			let changed = inner.credentials != credentials;
			if changed {
				inner.credentials = credentials;
			}
			changed
		};
		if changed {
			self.events.emit(ServiceEvent::CredentialsChanged);
		}
	}

	/// The chosen backend name, when it is among the supported methods.
	pub fn authentication_method(&self) -> Option<String> {
		let inner = self.inner.lock();
		self.authentication_method_locked(&inner)
	}

	pub fn set_authentication_method(&self, method: impl Into<String>) {
		self.inner.lock().authentication_method = method.into();
	}

	/// Discovered backends whose schema the auth agent can drive, as a
	/// name-to-schema map.
	pub fn supported_authentication_methods(&self) -> BTreeMap<String, String> {
		let inner = self.inner.lock();
		self.supported_methods_locked(&inner)
	}

	pub fn resource_url(&self, kind: ResourceType) -> Option<Url> {
		self.inner.lock().resources.get(&kind).map(|r| r.url.clone())
	}

	/// Capabilities of a discovered resource. For the Authentication
	/// resource this answers from the chosen backend instead.
	pub fn resource_capabilities(&self, kind: ResourceType) -> Vec<String> {
		let inner = self.inner.lock();
		if kind == ResourceType::Authentication {
			let Some(method) = self.authentication_method_locked(&inner) else {
				return Vec::new();
			};
			inner
				.auth_backends
				.get(&method)
				.map(|b| b.capabilities.clone())
				.unwrap_or_default()
		} else {
			inner
				.resources
				.get(&kind)
				.map(|r| r.capabilities.clone())
				.unwrap_or_default()
		}
	}

	pub fn is_logged_in(&self) -> bool {
		let inner = self.inner.lock();
		is_logged_in_locked(&inner)
	}

	/// Points the account at a service URL and runs discovery.
	///
	/// Valid once per account (from `Empty`): a later attempt to change
	/// the URL surfaces `UnknownError`. Returns `true` when the machine
	/// lands in `Stopped` with the discovered resources applied; on
	/// failure the machine is left in `Error` for `reset` to recover.
	pub async fn set_url(&self, service_url: Url, reload: bool) -> bool {
		{
			let mut inner = self.inner.lock();
			if inner.service_url.as_ref() == Some(&service_url) {
				return false;
			}
			if !inner.machine.change_state(ServiceState::Populating) {
				set_error_locked(
					&mut inner,
					Error::Unknown("Service URL cannot be changed".to_string()),
				);
				return false;
			}
			inner.service_url = Some(service_url.clone());
		}

		let discovered = DiscoveryClient::new(self.transport.as_ref(), &self.cache, &self.events)
			.discover(&service_url, reload)
			.await;

		let mut inner = self.inner.lock();
		match discovered {
			Ok(entry) => {
				inner.resources = entry.resources;
				inner.auth_backends = entry.auth_backends;
				self.set_service_name_locked(&mut inner, entry.service_name);
				inner.machine.change_state(ServiceState::Stopped)
			}
			Err(err) => {
				set_error_locked(&mut inner, err);
				false
			}
		}
	}

	/// Moves a stopped (or mid-login) session to `Started`.
	pub fn start(&self) -> bool {
		self.inner.lock().machine.change_state(ServiceState::Started)
	}

	/// Moves a running session back to `Stopped`.
	pub fn stop(&self) -> bool {
		self.inner.lock().machine.change_state(ServiceState::Stopped)
	}

	/// Recovers from `Error` (or halts `Populating`/`Started`), clearing
	/// the stored error.
	pub fn reset(&self) -> bool {
		let mut inner = self.inner.lock();
		if !inner.machine.change_state(ServiceState::Stopped) {
			return false;
		}
		inner.last_error = None;
		true
	}

	/// Hands the credential exchange to the auth agent.
	///
	/// Requires a discovered Authentication resource and a legal
	/// `LoggingIn` transition; returns `true` as soon as the exchange is
	/// underway. Completion re-enters through [`Self::on_login_complete`]
	/// or, for agent-reported failures, [`Self::set_error`].
	pub fn log_in(&self) -> bool {
		let request = {
			let mut inner = self.inner.lock();
			let Some(auth) = inner.resources.get(&ResourceType::Authentication) else {
				return false;
			};
			let auth_url = auth.url.clone();
			if !inner.machine.change_state(ServiceState::LoggingIn) {
				return false;
			}
			LoginRequest {
				auth_url,
				method: self.authentication_method_locked(&inner).unwrap_or_default(),
				credentials: inner.credentials.clone(),
				anonymous: inner.session.anonymous,
			}
		};

		let service = self.clone();
		tokio::spawn(async move {
			match service.agent.log_in(request).await {
				Ok(outcome) => service.on_login_complete(outcome.user_uri, outcome.token),
				Err(err) => service.set_error(err),
			}
		});
		true
	}

	/// Completion callback for a finished credential exchange.
	pub fn on_login_complete(&self, user_uri: String, token: String) {
		let mut inner = self.inner.lock();
		inner.session.user_uri = user_uri.clone();
		inner.session.token = token.clone();
		self.events.emit(ServiceEvent::NewToken { user_uri, token });

		if !inner.machine.change_state(ServiceState::Started) {
			set_error_locked(
				&mut inner,
				Error::Unknown("Error while logging in".to_string()),
			);
		}
	}

	/// Asks the auth agent to invalidate the session upstream.
	pub fn log_out(&self) -> bool {
		let (session, auth_url) = {
			let mut inner = self.inner.lock();
			let Some(auth) = inner.resources.get(&ResourceType::Authentication) else {
				return false;
			};
			let auth_url = auth.url.clone();
			if !inner.machine.change_state(ServiceState::LoggingOut) {
				return false;
			}
			(inner.session.clone(), auth_url)
		};

		let service = self.clone();
		tokio::spawn(async move {
			match service.agent.log_out(session, auth_url).await {
				Ok(()) => service.on_logout_complete(),
				Err(err) => service.set_error(err),
			}
		});
		true
	}

	/// Completion callback for a finished logout.
	pub fn on_logout_complete(&self) {
		let mut inner = self.inner.lock();
		inner.session.clear();
		if !inner.machine.change_state(ServiceState::Started) {
			set_error_locked(
				&mut inner,
				Error::Unknown("Error while logging out".to_string()),
			);
		}
	}

	/// Changes the account's anonymity, logging in or out as needed to
	/// match (only while the account is enabled).
	pub fn set_anonymous(&self, anonymous: bool) {
		let (changed, enabled, logged_in) = {
			let inner = self.inner.lock();
			(
				inner.session.anonymous != anonymous,
				inner.enabled,
				is_logged_in_locked(&inner),
			)
		};
		if !changed {
			return;
		}

		if enabled {
			if anonymous {
				if logged_in {
					self.log_out();
				}
			} else if !logged_in {
				self.log_in();
			}
		}

		self.inner.lock().session.anonymous = anonymous;
		self.events.emit(ServiceEvent::AnonymityChanged(anonymous));
	}

	/// Records a failure and forces the machine into `Error`.
	pub fn set_error(&self, error: Error) {
		let mut inner = self.inner.lock();
		set_error_locked(&mut inner, error);
	}

	/// Builds a request to a discovered resource, attaching the session
	/// token while logged in (or logging out, so it can still be revoked
	/// upstream).
	pub fn authenticated_request(&self, url: Url) -> TransportRequest {
		let inner = self.inner.lock();
		let state = inner.machine.current();
		let authenticated = (is_logged_in_locked(&inner)
			|| state == ServiceState::LoggingOut)
			&& !inner.session.token.is_empty();

		let request = TransportRequest::new(url);
		if authenticated {
			request.with_header(
				"Authorization",
				format!("{AUTHORIZATION_SCHEME} {}", inner.session.token),
			)
		} else {
			request
		}
	}

	/// Snapshot of the stored account settings.
	pub fn to_config(&self) -> AccountConfig {
		let inner = self.inner.lock();
		AccountConfig {
			uuid: self.uuid,
			service_url: inner.service_url.clone(),
			description: inner.description.clone(),
			anonymous: inner.session.anonymous,
			enabled: inner.enabled,
			authentication_method: inner.authentication_method.clone(),
			user_uri: inner.session.user_uri.clone(),
		}
	}

	/// Applies stored account settings. The stored service URL is not
	/// applied here; feed it to [`Self::set_url`] so discovery runs.
	pub fn apply_config(&self, config: &AccountConfig) {
		let mut inner = self.inner.lock();
		inner.description = config.description.clone();
		inner.enabled = config.enabled;
		inner.session.anonymous = config.anonymous;
		inner.session.user_uri = config.user_uri.clone();
		inner.authentication_method = config.authentication_method.clone();
		debug!(
			target: "marginalia.session",
			uuid = %self.uuid,
			"applied stored account settings"
		);
	}

	fn authentication_method_locked(&self, inner: &ServiceInner) -> Option<String> {
		let method = inner.authentication_method.as_str();
		if method.is_empty() {
			return None;
		}
		self.supported_methods_locked(inner)
			.contains_key(method)
			.then(|| method.to_string())
	}

	fn supported_methods_locked(&self, inner: &ServiceInner) -> BTreeMap<String, String> {
		let schemas = self.agent.supported_schemas();
		inner
			.auth_backends
			.values()
			.filter(|backend| schemas.contains(&backend.schema))
			.map(|backend| (backend.name.clone(), backend.schema.clone()))
			.collect()
	}

	fn set_service_name_locked(&self, inner: &mut ServiceInner, name: String) {
		if inner.service_name != name {
			inner.service_name = name.clone();
			self.events.emit(ServiceEvent::ServiceNameChanged(name));
		}
		if inner.description.is_empty() {
			inner.description = inner.service_name.clone();
		}
	}
}

fn is_logged_in_locked(inner: &ServiceInner) -> bool {
	inner.machine.current() == ServiceState::Started && !inner.session.token.is_empty()
}

fn set_error_locked(inner: &mut ServiceInner, error: Error) {
	warn!(
		target: "marginalia.session",
		kind = ?error.kind(),
		message = %error,
		"service error"
	);
	inner.last_error = Some(error);
	inner.machine.change_state(ServiceState::Error);
}
