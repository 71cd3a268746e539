//! Cached credential model and the redacted secret wrapper it is built from.

// self
use crate::_prelude::*;

/// Redacted secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret(String);
impl Secret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for Secret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Secret").field(&"<redacted>").finish()
	}
}
impl Display for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Authenticated session state produced by one login exchange.
///
/// Credentials are created only by the authenticator and replaced wholesale on
/// each successful refresh; all concurrent callers share the same `Arc`'d
/// instance until it is replaced or invalidated.
#[derive(Clone, Debug)]
pub struct Credential {
	/// Bearer token presented as `X-Auth-Token` on authenticated requests.
	pub token: Secret,
	/// Public base URLs selected from the service catalog, keyed by service
	/// type. Services with no endpoint for the configured region are absent.
	pub endpoints: HashMap<String, Url>,
	/// Local instant after which the credential must not be used.
	pub expires_at: Option<OffsetDateTime>,
}
impl Credential {
	/// Returns whether the credential may still be presented at `now`.
	pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_none_or(|expires_at| expires_at > now)
	}

	/// Looks up the catalog endpoint for a service, if one was selected.
	pub fn endpoint(&self, service: &str) -> Option<&Url> {
		self.endpoints.get(service)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = Secret::new("swordfish");

		assert_eq!(format!("{secret:?}"), "Secret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn credential_without_expiry_is_always_valid() {
		let credential =
			Credential { token: Secret::new("tok"), endpoints: HashMap::new(), expires_at: None };

		assert!(credential.is_valid_at(OffsetDateTime::now_utc() + Duration::days(365)));
	}

	#[test]
	fn credential_expires_at_its_deadline() {
		let now = OffsetDateTime::now_utc();
		let credential = Credential {
			token: Secret::new("tok"),
			endpoints: HashMap::new(),
			expires_at: Some(now),
		};

		assert!(credential.is_valid_at(now - Duration::seconds(1)));
		assert!(!credential.is_valid_at(now));
		assert!(!credential.is_valid_at(now + Duration::seconds(1)));
	}
}
