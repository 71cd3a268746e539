//! Demonstrates key rotation and grace-window verification entirely in process, using the
//! in-memory metadata backend and a canned identity exchange.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use time::{Duration, OffsetDateTime};
// self
use swift_access::{
	auth::{Authenticator, ExchangeFuture, IdentityExchange, IdentityReply, LoginBody, Secret},
	config::SwiftConfig,
	swift::{ContainerInfo, MemoryMetadata, MetadataBackend},
	tempurl::{TempUrlIssuer, signature},
};

struct CannedExchange;
impl IdentityExchange for CannedExchange {
	fn login<'a>(&'a self, _: &'a str, _: &'a LoginBody) -> ExchangeFuture<'a, IdentityReply> {
		Box::pin(async {
			Ok(IdentityReply {
				subject_token: "offline-token".into(),
				payload: br#"{"token":{"catalog":[{"type":"object-store","endpoints":[{"region":"RegionOne","interface":"public","url":"https://swift.example.com/v1/AUTH_demo"}]}],"expires_at":"2099-01-01T00:00:00Z"}}"#
					.to_vec(),
			})
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let auth = Arc::new(Authenticator::new(
		SwiftConfig {
			auth_url: "https://keystone.example.com/v3".into(),
			username: "demo".into(),
			password: Secret::new("demo-password"),
			region_name: "RegionOne".into(),
			..Default::default()
		},
		Arc::new(CannedExchange),
	));
	let backend = MemoryMetadata::default();

	backend.create_container("reports");
	// Seed a primary key old enough to be rotated out on first use.
	backend
		.write_container("reports", ContainerInfo {
			primary_key: Some("worn-out-key".into()),
			primary_key_created: Some(OffsetDateTime::now_utc() - Duration::days(30)),
			..Default::default()
		})
		.await?;

	// Sign a URL under the old primary before the rotation happens.
	let expires = OffsetDateTime::now_utc().unix_timestamp() + 600;
	let pre_rotation_sig =
		signature("worn-out-key", "GET", expires, "/v1/AUTH_demo/reports/archive.zip");
	let issuer = TempUrlIssuer::new(auth, Arc::new(backend.clone()));
	let url = issuer.get_url("reports", "archive.zip").await?;
	let info = backend.snapshot("reports").ok_or_else(|| color_eyre::eyre::eyre!("container vanished"))?;
	let demoted =
		info.secondary_key.ok_or_else(|| color_eyre::eyre::eyre!("no key was demoted"))?;

	println!("Fresh signed URL: {url}");
	println!(
		"Pre-rotation signature still verifiable via demoted key: {}",
		signature(&demoted, "GET", expires, "/v1/AUTH_demo/reports/archive.zip")
			== pre_rotation_sig,
	);

	Ok(())
}
