//! Credential cache and the Keystone authenticator that refills it.

pub mod credential;
pub mod keystone;

pub use credential::*;
pub use keystone::*;

// self
use crate::{
	_prelude::*,
	config::SwiftConfig,
	error::ConfigError,
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Request header carrying the bearer token on authenticated storage calls.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Fallback credential lifetime applied when the server expiry is already in
/// the past (clock skew), in seconds.
const FALLBACK_LIFETIME_SECS: i64 = 3_000;
/// Fraction of the server-granted lifetime the credential is trusted for.
const LIFETIME_MARGIN: f64 = 0.8;

/// Concurrency-safe slot holding the current [`Credential`].
///
/// Reads of a valid credential take the `RwLock` fast path and never touch the
/// network. Refreshes serialize on the async mutex; waiters re-check the slot
/// after acquiring it so a refresh completed while they waited is reused
/// instead of repeated. Dropping a waiter mid-refresh releases the mutex
/// without mutating the slot.
#[derive(Debug, Default)]
pub struct AuthCache {
	current: RwLock<Option<Arc<Credential>>>,
	refresh: AsyncMutex<()>,
}
impl AuthCache {
	/// Returns the cached credential without validity checks.
	pub fn get(&self) -> Option<Arc<Credential>> {
		self.current.read().clone()
	}

	/// Clears the slot so the next [`Authenticator::credential`] call performs
	/// a fresh login exchange.
	pub fn invalidate(&self) {
		*self.current.write() = None;
	}

	fn store(&self, credential: Arc<Credential>) {
		*self.current.write() = Some(credential);
	}
}

/// Performs Keystone password logins and caches the resulting credential.
pub struct Authenticator {
	config: SwiftConfig,
	exchange: Arc<dyn IdentityExchange>,
	cache: AuthCache,
}
impl Authenticator {
	/// Creates an authenticator over a caller-provided identity transport.
	pub fn new(config: SwiftConfig, exchange: Arc<dyn IdentityExchange>) -> Self {
		Self { config, exchange, cache: AuthCache::default() }
	}

	/// Creates an authenticator backed by the built-in reqwest Keystone
	/// exchange.
	#[cfg(feature = "reqwest")]
	pub fn with_reqwest(config: SwiftConfig) -> Result<Self, ConfigError> {
		Ok(Self::new(config, Arc::new(KeystoneExchange::new()?)))
	}

	/// Returns the account configuration this authenticator was built with.
	pub fn config(&self) -> &SwiftConfig {
		&self.config
	}

	/// Returns a valid credential, performing at most one login exchange.
	///
	/// Concurrent callers finding the cache invalid line up on the refresh
	/// mutex; whichever caller enters first performs the single login, the
	/// rest reuse its result.
	pub async fn credential(&self) -> Result<Arc<Credential>> {
		if let Some(current) = self.cache.get()
			&& current.is_valid_at(OffsetDateTime::now_utc())
		{
			return Ok(current);
		}

		const KIND: OpKind = OpKind::Authenticate;

		let span = OpSpan::new(KIND, "credential");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let _refresh = self.cache.refresh.lock().await;

				// Double-check: another caller may have refreshed while this
				// one waited on the mutex.
				if let Some(current) = self.cache.get()
					&& current.is_valid_at(OffsetDateTime::now_utc())
				{
					return Ok(current);
				}

				let credential = Arc::new(self.login().await?);

				self.cache.store(credential.clone());

				Ok(credential)
			})
			.await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	/// Drops the cached credential; the next call takes the slow path.
	pub fn invalidate(&self) {
		self.cache.invalidate();
	}

	/// Resolves the base URL for a service, preferring the catalog over
	/// configured overrides.
	pub async fn endpoint_url(&self, service: &str) -> Result<Url> {
		let credential = self.credential().await?;

		self.resolve_endpoint(&credential, service)
	}

	/// Builds a per-request client for a service, carrying the resolved base
	/// URL and the current bearer token.
	///
	/// The client is intentionally short-lived: constructing it on every
	/// request keeps the attached token in step with cache invalidation.
	#[cfg(feature = "reqwest")]
	pub async fn service_client(
		&self,
		service: &str,
		http: &ReqwestClient,
	) -> Result<ServiceClient> {
		let credential = self.credential().await?;
		let base = self.resolve_endpoint(&credential, service)?;

		Ok(ServiceClient { base, token: credential.token.clone(), http: http.clone() })
	}

	fn resolve_endpoint(&self, credential: &Credential, service: &str) -> Result<Url> {
		if let Some(url) = credential.endpoint(service) {
			return Ok(url.clone());
		}
		if let Some(url) = self.config.endpoint_overrides.get(service) {
			return Ok(url.clone());
		}

		Err(ConfigError::UnknownEndpoint { name: service.into() }.into())
	}

	async fn login(&self) -> Result<Credential> {
		let body = LoginBody::new(&self.config);
		let reply = self.exchange.login(&self.config.auth_url, &body).await?;
		let document = keystone::parse_token_document(&reply.payload)?;
		let now = OffsetDateTime::now_utc();

		Ok(Credential {
			token: Secret::new(reply.subject_token),
			endpoints: endpoints_for_region(document.token.catalog, &self.config.region_name),
			expires_at: Some(local_expiry(now, document.token.expires_at)),
		})
	}
}
impl Debug for Authenticator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Authenticator")
			.field("auth_url", &self.config.auth_url)
			.field("region_name", &self.config.region_name)
			.field("cached", &self.cache.get().is_some())
			.finish()
	}
}

/// Short-lived handle for one authenticated request against a service.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ServiceClient {
	base: Url,
	token: Secret,
	http: ReqwestClient,
}
#[cfg(feature = "reqwest")]
impl ServiceClient {
	/// Returns the resolved base URL (always slash-terminated).
	pub fn base(&self) -> &Url {
		&self.base
	}

	/// Starts a request for `path` below the base URL with the bearer token
	/// attached.
	pub fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder> {
		let value = format!("{}{path}", self.base);
		let url =
			Url::parse(&value).map_err(|source| ConfigError::InvalidUrl { value, source })?;

		Ok(self.http.request(method, url).header(AUTH_TOKEN_HEADER, self.token.expose()))
	}
}

/// Selects the public endpoint per service for the configured region.
///
/// Services with no matching region/interface pair are left out of the map;
/// resolution fails, and loudly, only when such a service is requested.
fn endpoints_for_region(catalog: Vec<CatalogEntry>, region: &str) -> HashMap<String, Url> {
	let mut endpoints = HashMap::new();

	for entry in catalog {
		let Some(endpoint) = entry
			.endpoints
			.into_iter()
			.find(|e| e.interface == "public" && e.region.as_deref() == Some(region))
		else {
			continue;
		};
		let normalized = format!("{}/", endpoint.url.trim_end_matches('/'));

		// Catalog rows with unparsable URLs are skipped like region misses.
		if let Ok(url) = Url::parse(&normalized) {
			endpoints.insert(entry.service_type, url);
		}
	}

	endpoints
}

/// Computes the local trust deadline for a server-granted expiry.
///
/// The credential is trusted for 80% of the remaining server lifetime so it is
/// never presented in its final moments; a server expiry at or before `now`
/// falls back to a fixed window. The margin also absorbs moderate clock skew.
fn local_expiry(now: OffsetDateTime, server_expiry: OffsetDateTime) -> OffsetDateTime {
	let remaining = server_expiry - now;

	if remaining.is_positive() {
		now + Duration::seconds_f64(remaining.as_seconds_f64() * LIFETIME_MARGIN)
	} else {
		now + Duration::seconds(FALLBACK_LIFETIME_SECS)
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	struct CountingExchange(AtomicUsize);
	impl IdentityExchange for CountingExchange {
		fn login<'a>(
			&'a self,
			_auth_url: &'a str,
			_body: &'a LoginBody,
		) -> ExchangeFuture<'a, IdentityReply> {
			self.0.fetch_add(1, Ordering::SeqCst);

			Box::pin(async {
				Ok(IdentityReply {
					subject_token: "tok".into(),
					payload:
						b"{\"token\":{\"catalog\":[],\"expires_at\":\"2099-01-01T00:00:00Z\"}}"
							.to_vec(),
				})
			})
		}
	}

	fn catalog_entry(service: &str, region: &str, interface: &str, url: &str) -> CatalogEntry {
		CatalogEntry {
			service_type: service.into(),
			endpoints: vec![CatalogEndpoint {
				region: Some(region.into()),
				interface: interface.into(),
				url: url.into(),
			}],
		}
	}

	#[test]
	fn local_expiry_keeps_an_eighty_percent_margin() {
		let now = OffsetDateTime::now_utc();
		let expiry = local_expiry(now, now + Duration::seconds(1_000));

		assert_eq!(expiry, now + Duration::seconds(800));
	}

	#[test]
	fn local_expiry_falls_back_when_the_server_expiry_passed() {
		let now = OffsetDateTime::now_utc();
		let expiry = local_expiry(now, now - Duration::seconds(5));

		assert_eq!(expiry, now + Duration::seconds(3_000));
	}

	#[test]
	fn endpoints_filter_by_region_and_public_interface() {
		let catalog = vec![
			catalog_entry(
				"object-store",
				"RegionOne",
				"public",
				"https://swift.example.com/v1/AUTH_x",
			),
			catalog_entry("baremetal", "RegionOne", "internal", "https://ironic.internal/v1"),
			catalog_entry("compute", "RegionTwo", "public", "https://nova.example.com"),
		];
		let endpoints = endpoints_for_region(catalog, "RegionOne");

		assert_eq!(
			endpoints.get("object-store").map(Url::as_str),
			Some("https://swift.example.com/v1/AUTH_x/"),
		);
		assert!(!endpoints.contains_key("baremetal"));
		assert!(!endpoints.contains_key("compute"));
	}

	#[test]
	fn endpoint_urls_gain_exactly_one_trailing_slash() {
		let catalog = vec![catalog_entry(
			"object-store",
			"RegionOne",
			"public",
			"https://swift.example.com/v1/AUTH_x/",
		)];
		let endpoints = endpoints_for_region(catalog, "RegionOne");

		assert_eq!(
			endpoints.get("object-store").map(Url::as_str),
			Some("https://swift.example.com/v1/AUTH_x/"),
		);
	}

	#[tokio::test]
	async fn expired_credentials_trigger_exactly_one_refresh() {
		let exchange = Arc::new(CountingExchange(AtomicUsize::new(0)));
		let auth = Authenticator::new(
			SwiftConfig::default(),
			exchange.clone() as Arc<dyn IdentityExchange>,
		);

		auth.cache.store(Arc::new(Credential {
			token: Secret::new("stale"),
			endpoints: HashMap::new(),
			expires_at: Some(OffsetDateTime::now_utc() - Duration::seconds(1)),
		}));

		let refreshed = auth.credential().await.expect("Refresh should succeed.");

		assert_eq!(exchange.0.load(Ordering::SeqCst), 1);
		assert_eq!(refreshed.token.expose(), "tok");
		assert!(refreshed.is_valid_at(OffsetDateTime::now_utc()));
	}

	#[test]
	fn invalidate_clears_the_cache_slot() {
		let cache = AuthCache::default();

		cache.store(Arc::new(Credential {
			token: Secret::new("tok"),
			endpoints: HashMap::new(),
			expires_at: None,
		}));
		assert!(cache.get().is_some());

		cache.invalidate();
		assert!(cache.get().is_none());
	}
}
