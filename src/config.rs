//! Configuration surface for the identity exchange and temp-URL key handling.

// self
use crate::{_prelude::*, auth::Secret};

/// Account-level OpenStack configuration consumed by the authenticator.
///
/// Each value maps onto a field of the Keystone v3 password login body or onto
/// the catalog filter applied to the login response. `project_id` and
/// `project_name` are both optional; fields left at `None` are omitted from
/// the serialized login body entirely.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SwiftConfig {
	/// Base URL of the identity service, e.g. `https://keystone.example.com/v3`.
	pub auth_url: String,
	/// Login user name.
	pub username: String,
	/// Login password.
	pub password: Secret,
	/// Domain the user belongs to.
	pub user_domain_name: String,
	/// Project id used for scoping, if known.
	pub project_id: Option<String>,
	/// Project name used for scoping, if known.
	pub project_name: Option<String>,
	/// Domain the project belongs to.
	pub project_domain_name: String,
	/// Region whose public endpoints are selected from the catalog.
	pub region_name: String,
	/// Base URLs that take precedence over (or fill gaps in) the catalog,
	/// keyed by service name.
	pub endpoint_overrides: HashMap<String, Url>,
	/// Temp-URL key handling options.
	pub temp_url: TempUrlConfig,
}
impl Default for SwiftConfig {
	fn default() -> Self {
		Self {
			auth_url: String::new(),
			username: String::new(),
			password: Secret::new(""),
			user_domain_name: "Default".into(),
			project_id: None,
			project_name: None,
			project_domain_name: "Default".into(),
			region_name: String::new(),
			endpoint_overrides: HashMap::new(),
			temp_url: TempUrlConfig::default(),
		}
	}
}

/// Options governing temp-URL signing-key rotation and caching.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct TempUrlConfig {
	/// Allow local key generation when the container holds no usable key.
	pub auto_generate_keys: bool,
	/// Minimum key age in seconds before rotation may replace it.
	pub keys_min_duration: u64,
	/// Character length of locally generated keys.
	pub key_length: usize,
	/// Seconds a locally cached key is trusted before the container metadata
	/// is consulted again. Only applies while `auto_generate_keys` is enabled;
	/// with generation disabled the cache is trusted indefinitely.
	pub cache_duration: u64,
}
impl Default for TempUrlConfig {
	fn default() -> Self {
		Self {
			auto_generate_keys: true,
			keys_min_duration: 86_400 * 7,
			key_length: 40,
			cache_duration: 3_600,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_match_the_documented_values() {
		let config = SwiftConfig::default();

		assert_eq!(config.user_domain_name, "Default");
		assert_eq!(config.project_domain_name, "Default");
		assert!(config.temp_url.auto_generate_keys);
		assert_eq!(config.temp_url.keys_min_duration, 604_800);
		assert_eq!(config.temp_url.key_length, 40);
		assert_eq!(config.temp_url.cache_duration, 3_600);
	}

	#[test]
	fn config_binds_from_partial_documents() {
		let config: SwiftConfig = serde_json::from_str(
			"{\"auth_url\":\"https://keystone.example.com/v3\",\"username\":\"svc\",\"password\":\"hunter2\",\"region_name\":\"RegionOne\",\"endpoint_overrides\":{\"object-store\":\"https://swift.example.com/v1/AUTH_x/\"},\"temp_url\":{\"key_length\":32}}",
		)
		.expect("Partial config document should bind.");

		assert_eq!(config.auth_url, "https://keystone.example.com/v3");
		assert_eq!(config.password.expose(), "hunter2");
		assert_eq!(
			config.endpoint_overrides.get("object-store").map(Url::as_str),
			Some("https://swift.example.com/v1/AUTH_x/"),
		);
		assert_eq!(config.temp_url.key_length, 32);
		// Unspecified nested fields keep their defaults.
		assert_eq!(config.temp_url.keys_min_duration, 604_800);
	}
}
