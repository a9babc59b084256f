//! Persistent discovery cache keyed by service URL.
//!
//! One JSON store file maps percent-encoded service URLs to their last
//! successful discovery snapshot. Entries are replaced wholesale on save;
//! there is no partial merge. A cached entry is trusted for as long as it
//! exists: `last_reloaded` is recorded on every save but deliberately
//! never aged out, matching the behavior callers rely on.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use marginalia_protocol::{AuthBackend, ResourceRecord, ResourceType};

const CACHE_SCHEMA_VERSION: u32 = 1;

/// RFC 3986 unreserved characters stay readable in store keys.
const CACHE_KEY_SET: &AsciiSet = &NON_ALPHANUMERIC
	.remove(b'-')
	.remove(b'.')
	.remove(b'_')
	.remove(b'~');

/// One cached discovery snapshot for a service URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryEntry {
	pub service_url: Url,
	#[serde(default)]
	pub service_name: String,
	#[serde(default)]
	pub resources: BTreeMap<ResourceType, ResourceRecord>,
	/// Populated only when an Authentication resource was discovered.
	#[serde(default)]
	pub auth_backends: BTreeMap<String, AuthBackend>,
	/// Seconds since the epoch at the time of the last successful save.
	#[serde(default)]
	pub last_reloaded: u64,
}

/// On-disk format for the cache store file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheFile {
	schema: u32,
	#[serde(default)]
	entries: BTreeMap<String, DiscoveryEntry>,
}

impl Default for CacheFile {
	fn default() -> Self {
		Self { schema: CACHE_SCHEMA_VERSION, entries: BTreeMap::new() }
	}
}

/// Load/save/clear facade over the on-disk discovery cache.
#[derive(Debug, Clone)]
pub struct DiscoveryCache {
	path: PathBuf,
}

impl DiscoveryCache {
	/// Opens the cache at the platform default location.
	pub fn open_default() -> Self {
		Self { path: default_cache_path() }
	}

	/// Opens the cache backed by `path`.
	pub fn open(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Returns the cached entry for `service_url`, if any.
	pub fn load(&self, service_url: &Url) -> Option<DiscoveryEntry> {
		let entry = self.read_file().entries.remove(&cache_key(service_url));
		debug!(
			target: "marginalia.cache",
			url = %service_url,
			hit = entry.is_some(),
			"cache lookup"
		);
		entry
	}

	/// Persists `entry`, replacing any prior entry for the same service
	/// URL wholesale.
	pub fn save(&self, entry: &DiscoveryEntry) -> std::io::Result<()> {
		let mut file = self.read_file();
		file.entries.insert(cache_key(&entry.service_url), entry.clone());
		self.write_file(&file)
	}

	/// Drops the entry for `service_url`; reports whether one existed.
	pub fn clear(&self, service_url: &Url) -> std::io::Result<bool> {
		let mut file = self.read_file();
		let existed = file.entries.remove(&cache_key(service_url)).is_some();
		if existed {
			self.write_file(&file)?;
		}
		Ok(existed)
	}

	fn read_file(&self) -> CacheFile {
		fs::read_to_string(&self.path)
			.ok()
			.and_then(|content| serde_json::from_str(&content).ok())
			.unwrap_or_default()
	}

	fn write_file(&self, file: &CacheFile) -> std::io::Result<()> {
		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent)?;
		}
		let json = serde_json::to_string_pretty(file).map_err(std::io::Error::other)?;
		fs::write(&self.path, json)
	}
}

/// Namespaces an entry by its percent-encoded service URL.
fn cache_key(service_url: &Url) -> String {
	utf8_percent_encode(service_url.as_str(), CACHE_KEY_SET).to_string()
}

fn default_cache_path() -> PathBuf {
	dirs::config_dir()
		.unwrap_or_else(|| PathBuf::from("."))
		.join("marginalia/services/cache.json")
}

pub(crate) fn now_ts() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_secs()
}
