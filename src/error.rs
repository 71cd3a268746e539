//! Crate-level error types shared across the credential, temp-URL, and retry layers.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Identity service rejected the login exchange.
	#[error("Authentication against the identity service failed: {reason}.")]
	Authentication {
		/// Server- or crate-supplied reason string.
		reason: String,
	},
	/// Storage service rejected an authenticated request (HTTP 401).
	#[error("The storage service rejected the request as unauthorized.")]
	Authorization,
	/// Container does not exist on the storage service.
	#[error("Container `{name}` was not found.")]
	ContainerNotFound {
		/// Container name as sent to the storage service.
		name: String,
	},
	/// Object does not exist on the storage service.
	#[error("Object `{container}/{object}` was not found.")]
	ObjectNotFound {
		/// Container the object was looked up in.
		container: String,
		/// Object name as sent to the storage service.
		object: String,
	},
	/// Object already exists and overwriting was not allowed.
	#[error("Object `{container}/{object}` already exists.")]
	ObjectAlreadyExists {
		/// Container the object was created in.
		container: String,
		/// Object name as sent to the storage service.
		object: String,
	},
}
impl Error {
	/// Classifies the error for [`RetryGate`](crate::retry::RetryGate) branching.
	pub fn retry_class(&self) -> RetryClass {
		match self {
			Self::Authorization => RetryClass::Authorization,
			Self::Transient(_) | Self::Transport(_) => RetryClass::Transient,
			_ => RetryClass::Fatal,
		}
	}
}

/// Closed set of retry classifications derived from an [`Error`].
///
/// Retry decisions branch on this enum instead of matching error variants
/// directly, so the retry layer stays decoupled from the error taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RetryClass {
	/// Invalidate the credential cache and retry the operation once.
	Authorization,
	/// Retry on the fixed backoff schedule.
	Transient,
	/// Surface to the caller unchanged.
	Fatal,
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A URL assembled from configuration or catalog data failed to parse.
	#[error("Invalid URL `{value}`.")]
	InvalidUrl {
		/// Offending URL string.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Container name was empty or contained path separators.
	#[error("Invalid container name `{name}`.")]
	InvalidContainerName {
		/// Rejected container name.
		name: String,
	},
	/// Object name was empty.
	#[error("Object name cannot be empty.")]
	EmptyObjectName,

	/// Endpoint name is absent from the service catalog and no override exists.
	#[error("Unknown endpoint name `{name}`.")]
	UnknownEndpoint {
		/// Requested service name.
		name: String,
	},
	/// No usable signing key exists and local generation is disabled.
	#[error("Keys not available in container `{container}` and `auto_generate_keys` is disabled.")]
	KeysUnavailable {
		/// Container whose metadata was inspected.
		container: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Storage or identity service returned an unexpected non-fatal status.
	#[error("Service returned an unexpected status {status}.")]
	UnexpectedStatus {
		/// HTTP status code returned by the service.
		status: u16,
	},
	/// Identity service responded with malformed JSON that could not be parsed.
	#[error("Identity service returned a malformed token document.")]
	IdentityResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
	/// A metadata timestamp header could not be parsed as RFC 1123.
	#[error("Container metadata timestamp `{value}` is not valid RFC 1123.")]
	MetadataTimestamp {
		/// Offending header value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: time::error::Parse,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the service.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
