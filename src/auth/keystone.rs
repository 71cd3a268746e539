//! Keystone v3 wire types and the identity-exchange transport seam.
//!
//! The authenticator only depends on [`IdentityExchange`], so tests and
//! alternative transports can stand in for the real identity service. The
//! built-in [`KeystoneExchange`] speaks `POST auth/tokens` over reqwest.

// self
use crate::{_prelude::*, config::SwiftConfig, error::TransientError};
#[cfg(feature = "reqwest")] use crate::error::{ConfigError, TransportError};

/// Response header carrying the bearer token after a successful login.
pub const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Boxed future returned by [`IdentityExchange`] implementations.
pub type ExchangeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Transport seam for the Keystone password login exchange.
///
/// Implementations submit the serialized login body to `{auth_url}/auth/tokens`
/// and hand back the subject token header together with the raw response
/// payload; catalog interpretation stays in the authenticator.
pub trait IdentityExchange: Send + Sync {
	/// Performs one login exchange against the identity service.
	fn login<'a>(&'a self, auth_url: &'a str, body: &'a LoginBody) -> ExchangeFuture<'a, IdentityReply>;
}

/// Raw outcome of a successful login exchange.
#[derive(Clone, Debug)]
pub struct IdentityReply {
	/// Bearer token taken from the `X-Subject-Token` response header.
	pub subject_token: String,
	/// Raw JSON token document returned in the response body.
	pub payload: Vec<u8>,
}

/// Keystone v3 password login body.
///
/// Serializes to the documented `{"auth":{"identity":...,"scope":...}}` shape;
/// unset project fields are omitted rather than serialized as `null`.
#[derive(Clone, Debug, Serialize)]
pub struct LoginBody {
	auth: AuthSection,
}
impl LoginBody {
	/// Builds the login body from account configuration.
	pub fn new(config: &SwiftConfig) -> Self {
		Self {
			auth: AuthSection {
				identity: IdentitySection {
					methods: vec!["password"],
					password: PasswordSection {
						user: UserSection {
							name: config.username.clone(),
							domain: DomainSection { name: config.user_domain_name.clone() },
							password: config.password.expose().into(),
						},
					},
				},
				scope: ScopeSection {
					project: ProjectSection {
						id: config.project_id.clone(),
						domain: DomainSection { name: config.project_domain_name.clone() },
						name: config.project_name.clone(),
					},
				},
			},
		}
	}
}

#[derive(Clone, Debug, Serialize)]
struct AuthSection {
	identity: IdentitySection,
	scope: ScopeSection,
}
#[derive(Clone, Debug, Serialize)]
struct IdentitySection {
	methods: Vec<&'static str>,
	password: PasswordSection,
}
#[derive(Clone, Debug, Serialize)]
struct PasswordSection {
	user: UserSection,
}
#[derive(Clone, Debug, Serialize)]
struct UserSection {
	name: String,
	domain: DomainSection,
	password: String,
}
#[derive(Clone, Debug, Serialize)]
struct DomainSection {
	name: String,
}
#[derive(Clone, Debug, Serialize)]
struct ScopeSection {
	project: ProjectSection,
}
#[derive(Clone, Debug, Serialize)]
struct ProjectSection {
	#[serde(skip_serializing_if = "Option::is_none")]
	id: Option<String>,
	domain: DomainSection,
	#[serde(skip_serializing_if = "Option::is_none")]
	name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenDocument {
	pub token: TokenSection,
}
#[derive(Debug, Deserialize)]
pub(crate) struct TokenSection {
	#[serde(default)]
	pub catalog: Vec<CatalogEntry>,
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
}
#[derive(Debug, Deserialize)]
pub(crate) struct CatalogEntry {
	#[serde(rename = "type")]
	pub service_type: String,
	#[serde(default)]
	pub endpoints: Vec<CatalogEndpoint>,
}
#[derive(Debug, Deserialize)]
pub(crate) struct CatalogEndpoint {
	#[serde(default)]
	pub region: Option<String>,
	pub interface: String,
	pub url: String,
}

pub(crate) fn parse_token_document(payload: &[u8]) -> Result<TokenDocument> {
	let mut deserializer = serde_json::Deserializer::from_slice(payload);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| TransientError::IdentityResponseParse { source }.into())
}

/// Reqwest-backed [`IdentityExchange`] speaking Keystone v3.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct KeystoneExchange {
	client: ReqwestClient,
}
#[cfg(feature = "reqwest")]
impl KeystoneExchange {
	/// Builds an exchange with a fresh reqwest client.
	pub fn new() -> Result<Self, ConfigError> {
		Ok(Self {
			client: ReqwestClient::builder().build().map_err(ConfigError::http_client_build)?,
		})
	}

	/// Wraps an existing reqwest client.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client }
	}
}
#[cfg(feature = "reqwest")]
impl IdentityExchange for KeystoneExchange {
	fn login<'a>(
		&'a self,
		auth_url: &'a str,
		body: &'a LoginBody,
	) -> ExchangeFuture<'a, IdentityReply> {
		Box::pin(async move {
			let mut url = auth_url.trim_end_matches('/').to_owned();

			url.push_str("/auth/tokens");

			let payload = serde_json::to_vec(body).map_err(|e| Error::Authentication {
				reason: format!("login body could not be serialized: {e}"),
			})?;
			let response = self
				.client
				.post(&url)
				.header(reqwest::header::CONTENT_TYPE, "application/json")
				.body(payload)
				.send()
				.await
				.map_err(TransportError::from)?;
			let status = response.status();

			if !status.is_success() {
				return Err(Error::Authentication {
					reason: format!("identity service returned status {status}"),
				});
			}

			let subject_token = response
				.headers()
				.get(SUBJECT_TOKEN_HEADER)
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned)
				.ok_or_else(|| Error::Authentication {
					reason: "response is missing the X-Subject-Token header".into(),
				})?;
			let payload = response.bytes().await.map_err(TransportError::from)?.to_vec();

			Ok(IdentityReply { subject_token, payload })
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::Secret;

	fn config() -> SwiftConfig {
		SwiftConfig {
			auth_url: "https://keystone.example.com/v3".into(),
			username: "svc".into(),
			password: Secret::new("hunter2"),
			region_name: "RegionOne".into(),
			project_name: Some("media".into()),
			..Default::default()
		}
	}

	#[test]
	fn login_body_matches_the_keystone_shape() {
		let body = serde_json::to_value(LoginBody::new(&config()))
			.expect("Login body should serialize to JSON.");

		assert_eq!(body["auth"]["identity"]["methods"][0], "password");
		assert_eq!(body["auth"]["identity"]["password"]["user"]["name"], "svc");
		assert_eq!(body["auth"]["identity"]["password"]["user"]["domain"]["name"], "Default");
		assert_eq!(body["auth"]["identity"]["password"]["user"]["password"], "hunter2");
		assert_eq!(body["auth"]["scope"]["project"]["name"], "media");
	}

	#[test]
	fn login_body_omits_unset_project_fields() {
		let mut config = config();

		config.project_id = None;

		let body = serde_json::to_value(LoginBody::new(&config))
			.expect("Login body should serialize to JSON.");
		let project =
			body["auth"]["scope"]["project"].as_object().expect("Project should be an object.");

		assert!(!project.contains_key("id"));
		assert!(project.contains_key("name"));
	}

	#[test]
	fn malformed_token_documents_surface_the_json_path() {
		let err = parse_token_document(b"{\"token\":{\"expires_at\":42}}")
			.expect_err("Numeric expires_at should fail to parse.");

		assert!(matches!(
			err,
			Error::Transient(TransientError::IdentityResponseParse { .. })
		));
		assert!(format!("{err:?}").contains("expires_at"));
	}
}
