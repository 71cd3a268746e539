//! Temp-URL issuance: signing-key cache, two-slot rotation, and URL signing.

pub mod sign;

pub use sign::{EXPIRES_PARAM, SIG_PARAM, signature};

// crates.io
use rand::RngCore;
// self
use crate::{
	_prelude::*,
	auth::{Authenticator, Secret},
	config::TempUrlConfig,
	error::ConfigError,
	obs::{self, OpKind, OpOutcome, OpSpan},
	swift::{ContainerInfo, MetadataBackend, OBJECT_STORE, check_container_name},
};

/// Alphabet used for generated signing keys (62 alphanumeric symbols).
const KEY_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// A temp-URL signing key together with its creation time.
///
/// The container metadata is the authoritative store of the primary/secondary
/// key pair; instances of this type are the locally cached copy of whichever
/// key is currently believed to be primary.
#[derive(Clone, Debug)]
pub struct SigningKey {
	/// Secret key material fed into the HMAC.
	pub value: Secret,
	/// When the key was created, if recorded in the metadata.
	pub created_at: Option<OffsetDateTime>,
}

/// Decides whether a signing key may still be used for new signatures.
#[derive(Clone, Debug)]
pub struct KeyRotationPolicy {
	auto_generate: bool,
	min_duration: Duration,
}
impl KeyRotationPolicy {
	/// Creates a policy from explicit parameters.
	pub fn new(auto_generate: bool, min_duration: Duration) -> Self {
		Self { auto_generate, min_duration }
	}

	/// Derives the policy from temp-URL configuration.
	pub fn from_config(config: &TempUrlConfig) -> Self {
		Self::new(config.auto_generate_keys, Duration::seconds(config.keys_min_duration as i64))
	}

	/// Returns whether `key` is still valid for signing at `now`.
	///
	/// With auto-generation disabled there is nothing to rotate to, so every
	/// key is trusted indefinitely. A key without a recorded creation time is
	/// likewise trusted; it predates creation tracking.
	pub fn is_valid(&self, key: &SigningKey, now: OffsetDateTime) -> bool {
		!self.auto_generate
			|| key.created_at.is_none_or(|created| created + self.min_duration > now)
	}
}

#[derive(Clone, Debug)]
struct CachedKey {
	key: SigningKey,
	cached_at: OffsetDateTime,
}

/// Concurrency-safe cache of the active signing key.
///
/// Shares the double-checked locking shape of
/// [`AuthCache`](crate::auth::AuthCache): valid reads never block, refreshes
/// serialize on the async mutex, and a caller dropped mid-refresh leaves the
/// cache untouched for the next caller.
#[derive(Debug, Default)]
pub struct TempUrlKeyCache {
	current: RwLock<Option<CachedKey>>,
	refresh: AsyncMutex<()>,
}
impl TempUrlKeyCache {
	/// Clears the cached key so the next lookup consults container metadata.
	pub fn invalidate(&self) {
		*self.current.write() = None;
	}

	fn get(&self) -> Option<CachedKey> {
		self.current.read().clone()
	}

	fn store(&self, key: SigningKey, cached_at: OffsetDateTime) {
		*self.current.write() = Some(CachedKey { key, cached_at });
	}
}

/// Parameters for one signed URL.
#[derive(Clone, Debug)]
pub struct TempUrlRequest {
	/// Container holding the object.
	pub container: String,
	/// Object name below the container.
	pub object: String,
	/// HTTP method the URL authorizes.
	pub method: String,
	/// How long the URL stays valid from the moment of signing.
	pub valid_for: Duration,
	/// Download filename advertised via the `filename` query parameter.
	pub filename: Option<String>,
	/// Ask the browser to render inline instead of downloading.
	pub inline: bool,
}
impl TempUrlRequest {
	/// Default URL validity window.
	pub const DEFAULT_VALIDITY: Duration = Duration::seconds(86_400);

	/// Creates a GET request with the default validity window.
	pub fn new(container: impl Into<String>, object: impl Into<String>) -> Self {
		Self {
			container: container.into(),
			object: object.into(),
			method: "GET".into(),
			valid_for: Self::DEFAULT_VALIDITY,
			filename: None,
			inline: false,
		}
	}

	/// Overrides the HTTP method the URL authorizes.
	pub fn with_method(mut self, method: impl Into<String>) -> Self {
		self.method = method.into();

		self
	}

	/// Overrides the validity window.
	pub fn valid_for(mut self, duration: Duration) -> Self {
		self.valid_for = duration;

		self
	}

	/// Sets the advertised download filename.
	pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
		self.filename = Some(filename.into());

		self
	}

	/// Marks the URL for inline rendering.
	pub fn inline(mut self) -> Self {
		self.inline = true;

		self
	}
}

/// Issues time-limited signed URLs, rotating container signing keys on demand.
pub struct TempUrlIssuer {
	auth: Arc<Authenticator>,
	backend: Arc<dyn MetadataBackend>,
	config: TempUrlConfig,
	policy: KeyRotationPolicy,
	cache: TempUrlKeyCache,
}
impl TempUrlIssuer {
	/// Creates an issuer over the authenticator's temp-URL configuration.
	pub fn new(auth: Arc<Authenticator>, backend: Arc<dyn MetadataBackend>) -> Self {
		let config = auth.config().temp_url.clone();
		let policy = KeyRotationPolicy::from_config(&config);

		Self { auth, backend, config, policy, cache: TempUrlKeyCache::default() }
	}

	/// Returns the active signing key for `container`, refreshing or rotating
	/// it through the container metadata when required.
	///
	/// Fails with [`ConfigError::KeysUnavailable`] when no usable key exists
	/// and auto-generation is disabled; the metadata is left untouched in
	/// that case.
	pub async fn signing_key(&self, container: &str) -> Result<SigningKey> {
		check_container_name(container)?;

		let now = OffsetDateTime::now_utc();

		if let Some(cached) = self.cache.get()
			&& self.usable(&cached, now)
		{
			return Ok(cached.key);
		}

		const KIND: OpKind = OpKind::RotateKey;

		let span = OpSpan::new(KIND, "signing_key");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let _refresh = self.cache.refresh.lock().await;
				let now = OffsetDateTime::now_utc();

				// Double-check: a concurrent caller may have refreshed the key
				// while this one waited on the mutex.
				if let Some(cached) = self.cache.get()
					&& self.usable(&cached, now)
				{
					return Ok(cached.key);
				}

				let info = self.backend.read_container(container).await?;
				let metadata_key = match (&info.primary_key, info.primary_key_created) {
					(Some(value), Some(created)) =>
						Some(SigningKey { value: Secret::new(value), created_at: Some(created) }),
					_ => None,
				};

				if let Some(key) = metadata_key
					&& self.policy.is_valid(&key, now)
				{
					self.cache.store(key.clone(), now);

					return Ok(key);
				}
				if !self.config.auto_generate_keys {
					return Err(ConfigError::KeysUnavailable { container: container.into() }.into());
				}

				let value = generate_key(self.config.key_length);
				// Demote the old primary into the secondary slot *before*
				// caching, so URLs signed under it stay verifiable during the
				// grace window. A plain overwrite would orphan them.
				let rotated = ContainerInfo {
					primary_key: Some(value.clone()),
					primary_key_created: Some(now),
					secondary_key: info.primary_key,
					secondary_key_created: info.primary_key_created,
					..Default::default()
				};

				self.backend.write_container(container, rotated).await?;

				let key = SigningKey { value: Secret::new(value), created_at: Some(now) };

				self.cache.store(key.clone(), now);

				Ok(key)
			})
			.await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	/// Signs a URL for the request using the current wall clock.
	pub async fn issue(&self, request: &TempUrlRequest) -> Result<String> {
		self.issue_at(request, OffsetDateTime::now_utc()).await
	}

	/// Signs a URL treating `now` as the moment of signing.
	///
	/// Exposed so callers (and tests) can pin the expiry deterministically.
	pub async fn issue_at(&self, request: &TempUrlRequest, now: OffsetDateTime) -> Result<String> {
		check_container_name(&request.container)?;

		if request.object.trim().is_empty() {
			return Err(ConfigError::EmptyObjectName.into());
		}

		const KIND: OpKind = OpKind::SignUrl;

		let span = OpSpan::new(KIND, "issue");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let key = self.signing_key(&request.container).await?;
				let base = self.auth.endpoint_url(OBJECT_STORE).await?;
				// `?` and `#` are legal in object names but would be read as
				// the query/fragment delimiter; escape them so they stay part
				// of the signed path.
				let object = request.object.replace('%', "%25").replace('?', "%3F").replace('#', "%23");
				let value = format!("{base}{}/{object}", request.container);
				let object_url = Url::parse(&value)
					.map_err(|source| ConfigError::InvalidUrl { value, source })?;
				let expires = now.unix_timestamp() + request.valid_for.whole_seconds();
				let sig =
					sign::signature(key.value.expose(), &request.method, expires, object_url.path());

				Ok(sign::assemble_url(
					object_url.as_str(),
					&sig,
					expires,
					request.filename.as_deref(),
					request.inline,
				))
			})
			.await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	/// Signs a download URL with the default validity window.
	pub async fn get_url(&self, container: &str, object: &str) -> Result<String> {
		self.issue(&TempUrlRequest::new(container, object)).await
	}

	/// Signs an upload URL with the default validity window.
	pub async fn put_url(&self, container: &str, object: &str) -> Result<String> {
		self.issue(&TempUrlRequest::new(container, object).with_method("PUT")).await
	}

	/// Returns whether a cached entry may be reused without a metadata read.
	///
	/// Besides key validity, a locally cached entry is re-verified against
	/// the metadata once `cache_duration` has elapsed, so an out-of-band
	/// rotation by another process is eventually picked up. With
	/// auto-generation disabled the cache is trusted indefinitely.
	fn usable(&self, cached: &CachedKey, now: OffsetDateTime) -> bool {
		if !self.policy.is_valid(&cached.key, now) {
			return false;
		}
		if !self.config.auto_generate_keys {
			return true;
		}

		cached.cached_at + Duration::seconds(self.config.cache_duration as i64) > now
	}
}
impl Debug for TempUrlIssuer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TempUrlIssuer")
			.field("config", &self.config)
			.field("cached", &self.cache.get().is_some())
			.finish()
	}
}

/// Draws `length` bytes from the thread CSPRNG and maps each into the
/// 62-symbol alphanumeric alphabet by modulo.
fn generate_key(length: usize) -> String {
	let mut buffer = vec![0_u8; length];

	rand::rng().fill_bytes(&mut buffer);

	buffer.into_iter().map(|byte| KEY_ALPHABET[byte as usize % KEY_ALPHABET.len()] as char).collect()
}
