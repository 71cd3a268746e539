//! Reqwest-backed container metadata client for OpenStack Swift.

// crates.io
use reqwest::{Method, StatusCode, header::HeaderMap};
// self
use crate::{
	_prelude::*,
	auth::Authenticator,
	error::{ConfigError, TransientError, TransportError},
	retry::RetryGate,
	swift::{
		BackendFuture, ContainerInfo, META_TEMP_URL_KEY, META_TEMP_URL_KEY_2,
		META_TEMP_URL_KEY_2_CREATED, META_TEMP_URL_KEY_CREATED, MetadataBackend, OBJECT_STORE,
		check_container_name, format_metadata_timestamp, parse_metadata_timestamp,
	},
};

const CONTAINER_OBJECT_COUNT: &str = "X-Container-Object-Count";
const CONTAINER_BYTES_USED: &str = "X-Container-Bytes-Used";

/// Talks to the object-store endpoint to read and write container
/// temp-URL-key metadata.
///
/// Every request resolves a fresh [`ServiceClient`](crate::auth::ServiceClient)
/// so a cache invalidation performed by the retry gate is picked up by the
/// very next attempt. All calls run through the gate's composed
/// authorization + transient retry policies.
#[derive(Clone, Debug)]
pub struct SwiftMetadataClient {
	auth: Arc<Authenticator>,
	gate: RetryGate,
	http: ReqwestClient,
}
impl SwiftMetadataClient {
	/// Creates a client with a fresh reqwest transport and default retry gate.
	pub fn new(auth: Arc<Authenticator>) -> Result<Self, ConfigError> {
		let http = ReqwestClient::builder().build().map_err(ConfigError::http_client_build)?;

		Ok(Self::with_client(auth, http))
	}

	/// Wraps an existing reqwest client.
	pub fn with_client(auth: Arc<Authenticator>, http: ReqwestClient) -> Self {
		let gate = RetryGate::new(auth.clone());

		Self { auth, gate, http }
	}

	/// Replaces the retry gate (e.g. to shorten the schedule in tests).
	pub fn with_gate(mut self, gate: RetryGate) -> Self {
		self.gate = gate;

		self
	}

	async fn fetch_info(&self, container: &str) -> Result<ContainerInfo> {
		let client = self.auth.service_client(OBJECT_STORE, &self.http).await?;
		let response = client
			.request(Method::GET, container)?
			.send()
			.await
			.map_err(TransportError::from)?;
		check_status(response.status(), container)?;

		let headers = response.headers();

		Ok(ContainerInfo {
			primary_key: header_str(headers, META_TEMP_URL_KEY),
			primary_key_created: header_timestamp(headers, META_TEMP_URL_KEY_CREATED)?,
			secondary_key: header_str(headers, META_TEMP_URL_KEY_2),
			secondary_key_created: header_timestamp(headers, META_TEMP_URL_KEY_2_CREATED)?,
			object_count: header_i64(headers, CONTAINER_OBJECT_COUNT),
			bytes_used: header_i64(headers, CONTAINER_BYTES_USED),
		})
	}

	async fn apply_info(&self, container: &str, info: &ContainerInfo) -> Result<()> {
		let client = self.auth.service_client(OBJECT_STORE, &self.http).await?;
		let mut request = client.request(Method::POST, container)?;

		if let Some(key) = &info.primary_key {
			request = request.header(META_TEMP_URL_KEY, key);
		}
		if let Some(created) = info.primary_key_created {
			request = request.header(META_TEMP_URL_KEY_CREATED, format_metadata_timestamp(created));
		}
		if let Some(key) = &info.secondary_key {
			request = request.header(META_TEMP_URL_KEY_2, key);
		}
		if let Some(created) = info.secondary_key_created {
			request =
				request.header(META_TEMP_URL_KEY_2_CREATED, format_metadata_timestamp(created));
		}

		let response = request.send().await.map_err(TransportError::from)?;

		check_status(response.status(), container)?;

		Ok(())
	}
}
impl MetadataBackend for SwiftMetadataClient {
	fn read_container<'a>(&'a self, container: &'a str) -> BackendFuture<'a, ContainerInfo> {
		Box::pin(async move {
			check_container_name(container)?;

			self.gate.execute(|| self.fetch_info(container)).await
		})
	}

	fn write_container<'a>(
		&'a self,
		container: &'a str,
		info: ContainerInfo,
	) -> BackendFuture<'a, ()> {
		Box::pin(async move {
			check_container_name(container)?;

			self.gate.execute(|| self.apply_info(container, &info)).await
		})
	}
}

fn check_status(status: StatusCode, container: &str) -> Result<()> {
	if status == StatusCode::UNAUTHORIZED {
		return Err(Error::Authorization);
	}
	if status == StatusCode::NOT_FOUND {
		return Err(Error::ContainerNotFound { name: container.into() });
	}
	if !status.is_success() {
		return Err(TransientError::UnexpectedStatus { status: status.as_u16() }.into());
	}

	Ok(())
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
	let value = headers.get(name)?.to_str().ok()?.trim();

	if value.is_empty() { None } else { Some(value.to_owned()) }
}

fn header_timestamp(headers: &HeaderMap, name: &str) -> Result<Option<OffsetDateTime>> {
	let Some(raw) = header_str(headers, name) else {
		return Ok(None);
	};

	parse_metadata_timestamp(&raw)
		.map(Some)
		.map_err(|source| TransientError::MetadataTimestamp { value: raw, source }.into())
}

fn header_i64(headers: &HeaderMap, name: &str) -> i64 {
	header_str(headers, name).and_then(|value| value.parse().ok()).unwrap_or_default()
}
