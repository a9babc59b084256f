//! Stored account configuration round-trip.
//!
//! The fields of an account worth keeping between runs. Session tokens are
//! deliberately not stored; a fresh login is required per run. The service
//! URL is stored but applied through `Service::set_url` by the caller so
//! discovery runs through the normal flow.

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Persisted per-account settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountConfig {
	pub uuid: Uuid,
	#[serde(default)]
	pub service_url: Option<Url>,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub anonymous: bool,
	#[serde(default = "default_enabled")]
	pub enabled: bool,
	#[serde(default)]
	pub authentication_method: String,
	#[serde(default)]
	pub user_uri: String,
}

fn default_enabled() -> bool {
	true
}

impl Default for AccountConfig {
	fn default() -> Self {
		Self {
			uuid: Uuid::nil(),
			service_url: None,
			description: String::new(),
			anonymous: false,
			enabled: true,
			authentication_method: String::new(),
			user_uri: String::new(),
		}
	}
}
