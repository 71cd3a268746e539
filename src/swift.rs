//! Storage-side collaborator surface: container metadata contracts and the
//! built-in backends.
//!
//! The temp-URL layer only depends on [`MetadataBackend`], so tests and demos
//! can run against [`MemoryMetadata`] while production code uses the
//! reqwest-backed [`SwiftMetadataClient`](client::SwiftMetadataClient).

#[cfg(feature = "reqwest")] pub mod client;
#[cfg(feature = "reqwest")] pub use client::*;

// crates.io
use time::{
	PrimitiveDateTime, format_description::BorrowedFormatItem, macros::format_description,
};
// self
use crate::{_prelude::*, error::ConfigError};

/// Service-catalog name of the object storage service.
pub const OBJECT_STORE: &str = "object-store";

/// Container metadata header holding the primary temp-URL key.
pub const META_TEMP_URL_KEY: &str = "X-Container-Meta-Temp-URL-Key";
/// Container metadata header holding the primary key's creation timestamp.
pub const META_TEMP_URL_KEY_CREATED: &str = "X-Container-Meta-Temp-URL-Key-Created";
/// Container metadata header holding the secondary (grace) temp-URL key.
pub const META_TEMP_URL_KEY_2: &str = "X-Container-Meta-Temp-URL-Key-2";
/// Container metadata header holding the secondary key's creation timestamp.
pub const META_TEMP_URL_KEY_2_CREATED: &str = "X-Container-Meta-Temp-URL-Key-2-Created";

/// RFC 1123 timestamp format used by the metadata headers,
/// e.g. `Tue, 10 Nov 2026 09:23:11 GMT`.
const RFC_1123: &[BorrowedFormatItem<'static>] = format_description!(
	"[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Boxed future returned by [`MetadataBackend`] implementations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Container-level state consumed and produced by the key-rotation algorithm.
///
/// The primary/secondary pair stored in the container metadata is the
/// authoritative copy of the signing keys; `object_count` and `bytes_used`
/// ride along from the same metadata response and are never written back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContainerInfo {
	/// Current primary signing key, if one is set.
	pub primary_key: Option<String>,
	/// Creation timestamp of the primary key.
	pub primary_key_created: Option<OffsetDateTime>,
	/// Demoted previous primary key, kept so in-flight URLs stay verifiable.
	pub secondary_key: Option<String>,
	/// Creation timestamp of the secondary key.
	pub secondary_key_created: Option<OffsetDateTime>,
	/// Number of objects in the container.
	pub object_count: i64,
	/// Total bytes stored in the container.
	pub bytes_used: i64,
}

/// Contract for reading and writing container temp-URL-key metadata.
///
/// Writes apply only the key fields that are `Some`; fields left at `None`
/// keep whatever value the container already holds. The stats fields are
/// ignored on write.
pub trait MetadataBackend: Send + Sync {
	/// Reads the container's metadata, failing with
	/// [`Error::ContainerNotFound`] when the container does not exist.
	fn read_container<'a>(&'a self, container: &'a str) -> BackendFuture<'a, ContainerInfo>;

	/// Applies the provided key metadata to the container.
	fn write_container<'a>(
		&'a self,
		container: &'a str,
		info: ContainerInfo,
	) -> BackendFuture<'a, ()>;
}

/// Rejects container names the storage service would misinterpret.
pub(crate) fn check_container_name(name: &str) -> Result<(), ConfigError> {
	if name.trim().is_empty() || name.contains(['/', '\\']) {
		return Err(ConfigError::InvalidContainerName { name: name.into() });
	}

	Ok(())
}

/// Formats a metadata timestamp as RFC 1123 in UTC.
pub(crate) fn format_metadata_timestamp(instant: OffsetDateTime) -> String {
	instant
		.to_offset(time::UtcOffset::UTC)
		.format(&RFC_1123)
		.expect("RFC 1123 formatting of an OffsetDateTime cannot fail.")
}

/// Parses an RFC 1123 metadata timestamp, assuming UTC.
pub(crate) fn parse_metadata_timestamp(value: &str) -> Result<OffsetDateTime, time::error::Parse> {
	PrimitiveDateTime::parse(value, &RFC_1123).map(PrimitiveDateTime::assume_utc)
}

type InfoMap = Arc<RwLock<HashMap<String, ContainerInfo>>>;

/// Thread-safe in-process [`MetadataBackend`] for tests and local development.
#[derive(Clone, Debug, Default)]
pub struct MemoryMetadata(InfoMap);
impl MemoryMetadata {
	/// Creates an empty container entry, as if `PUT /container` had run.
	pub fn create_container(&self, name: &str) {
		self.0.write().entry(name.to_owned()).or_default();
	}

	/// Returns a copy of the stored metadata, if the container exists.
	pub fn snapshot(&self, name: &str) -> Option<ContainerInfo> {
		self.0.read().get(name).cloned()
	}

	fn read_now(map: InfoMap, container: String) -> Result<ContainerInfo> {
		map.read()
			.get(&container)
			.cloned()
			.ok_or(Error::ContainerNotFound { name: container })
	}

	fn write_now(map: InfoMap, container: String, info: ContainerInfo) -> Result<()> {
		let mut guard = map.write();
		let Some(existing) = guard.get_mut(&container) else {
			return Err(Error::ContainerNotFound { name: container });
		};

		if info.primary_key.is_some() {
			existing.primary_key = info.primary_key;
		}
		if info.primary_key_created.is_some() {
			existing.primary_key_created = info.primary_key_created;
		}
		if info.secondary_key.is_some() {
			existing.secondary_key = info.secondary_key;
		}
		if info.secondary_key_created.is_some() {
			existing.secondary_key_created = info.secondary_key_created;
		}

		Ok(())
	}
}
impl MetadataBackend for MemoryMetadata {
	fn read_container<'a>(&'a self, container: &'a str) -> BackendFuture<'a, ContainerInfo> {
		let map = self.0.clone();
		let container = container.to_owned();

		Box::pin(async move { Self::read_now(map, container) })
	}

	fn write_container<'a>(
		&'a self,
		container: &'a str,
		info: ContainerInfo,
	) -> BackendFuture<'a, ()> {
		let map = self.0.clone();
		let container = container.to_owned();

		Box::pin(async move { Self::write_now(map, container, info) })
	}
}
