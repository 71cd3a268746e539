//! Demonstrates the full issuance path against mock Keystone and Swift endpoints: password
//! login, first-use key generation persisted to the container metadata, and a signed GET URL.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use swift_access::{
	auth::{Authenticator, Secret},
	config::SwiftConfig,
	swift::SwiftMetadataClient,
	tempurl::TempUrlIssuer,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_document = format!(
		r#"{{"token":{{"catalog":[{{"type":"object-store","endpoints":[{{"region":"RegionOne","interface":"public","url":"{}"}}]}}],"expires_at":"2099-01-01T00:00:00Z"}}}}"#,
		server.url("/v1/AUTH_demo"),
	);
	let login_mock = server
		.mock_async(move |when, then| {
			when.method(POST).path("/v3/auth/tokens");
			then.status(201).header("X-Subject-Token", "demo-token").body(token_document);
		})
		.await;
	let read_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/AUTH_demo/reports");
			then.status(204);
		})
		.await;
	let write_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/AUTH_demo/reports");
			then.status(204);
		})
		.await;
	let auth = Arc::new(Authenticator::with_reqwest(SwiftConfig {
		auth_url: server.url("/v3"),
		username: "demo".into(),
		password: Secret::new("demo-password"),
		region_name: "RegionOne".into(),
		project_name: Some("demo".into()),
		..Default::default()
	})?);
	let metadata = Arc::new(SwiftMetadataClient::new(auth.clone())?);
	let issuer = TempUrlIssuer::new(auth, metadata);
	let url = issuer.get_url("reports", "q3-summary.pdf").await?;

	println!("Signed download URL: {url}");

	login_mock.assert_async().await;
	read_mock.assert_async().await;
	write_mock.assert_async().await;

	Ok(())
}
