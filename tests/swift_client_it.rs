#![cfg(feature = "reqwest")]

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use httpmock::prelude::*;
use time::macros::datetime;
// self
use swift_access::{
	auth::{Authenticator, ExchangeFuture, IdentityExchange, IdentityReply, LoginBody, Secret},
	config::SwiftConfig,
	error::{Error, TransientError},
	retry::RetryGate,
	swift::{ContainerInfo, MetadataBackend, SwiftMetadataClient},
};

const TOKEN_DOCUMENT: &str =
	r#"{"token":{"catalog":[],"expires_at":"2099-01-01T00:00:00Z"}}"#;
const ZERO_SCHEDULE: [StdDuration; 3] = [StdDuration::ZERO; 3];

struct StaticExchange;
impl IdentityExchange for StaticExchange {
	fn login<'a>(&'a self, _: &'a str, _: &'a LoginBody) -> ExchangeFuture<'a, IdentityReply> {
		Box::pin(async {
			Ok(IdentityReply {
				subject_token: "token-static".into(),
				payload: TOKEN_DOCUMENT.as_bytes().to_vec(),
			})
		})
	}
}

fn client_for(server: &MockServer) -> SwiftMetadataClient {
	let mut config = SwiftConfig {
		auth_url: "https://keystone.example.com/v3".into(),
		username: "svc".into(),
		password: Secret::new("hunter2"),
		region_name: "RegionOne".into(),
		..Default::default()
	};

	config.endpoint_overrides.insert(
		"object-store".into(),
		url::Url::parse(&server.url("/v1/AUTH_test/"))
			.expect("Mock object-store endpoint should parse."),
	);

	let auth = Arc::new(Authenticator::new(config, Arc::new(StaticExchange)));
	let gate = RetryGate::new(auth.clone()).with_schedule(ZERO_SCHEDULE);

	SwiftMetadataClient::new(auth).expect("Metadata client should build.").with_gate(gate)
}

#[tokio::test]
async fn container_reads_parse_the_metadata_headers() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v1/AUTH_test/assets")
				.header("X-Auth-Token", "token-static");
			then.status(204)
				.header("X-Container-Meta-Temp-URL-Key", "primary-secret")
				.header("X-Container-Meta-Temp-URL-Key-Created", "Tue, 10 Nov 2026 09:23:11 GMT")
				.header("X-Container-Meta-Temp-URL-Key-2", "secondary-secret")
				.header("X-Container-Meta-Temp-URL-Key-2-Created", "Sun, 01 Nov 2026 00:00:00 GMT")
				.header("X-Container-Object-Count", "12")
				.header("X-Container-Bytes-Used", "34567");
		})
		.await;
	let client = client_for(&server);
	let info = client.read_container("assets").await.expect("Container read should succeed.");

	mock.assert_async().await;

	assert_eq!(info, ContainerInfo {
		primary_key: Some("primary-secret".into()),
		primary_key_created: Some(datetime!(2026-11-10 09:23:11 UTC)),
		secondary_key: Some("secondary-secret".into()),
		secondary_key_created: Some(datetime!(2026-11-01 00:00:00 UTC)),
		object_count: 12,
		bytes_used: 34_567,
	});
}

#[tokio::test]
async fn containers_without_keys_read_as_empty_metadata() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/AUTH_test/assets");
			then.status(204);
		})
		.await;
	let client = client_for(&server);
	let info = client.read_container("assets").await.expect("Container read should succeed.");

	assert_eq!(info, ContainerInfo::default());
}

#[tokio::test]
async fn container_writes_post_only_the_set_key_headers() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/v1/AUTH_test/assets")
				.header("X-Auth-Token", "token-static")
				.header("X-Container-Meta-Temp-URL-Key", "fresh-secret")
				.header("X-Container-Meta-Temp-URL-Key-Created", "Tue, 10 Nov 2026 09:23:11 GMT");
			then.status(204);
		})
		.await;
	let client = client_for(&server);

	client
		.write_container("assets", ContainerInfo {
			primary_key: Some("fresh-secret".into()),
			primary_key_created: Some(datetime!(2026-11-10 09:23:11 UTC)),
			..Default::default()
		})
		.await
		.expect("Container write should succeed.");

	mock.assert_async().await;
}

#[tokio::test]
async fn missing_containers_are_not_retried() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/AUTH_test/ghost");
			then.status(404);
		})
		.await;
	let client = client_for(&server);
	let err = client
		.read_container("ghost")
		.await
		.expect_err("Missing containers should be reported.");

	assert!(matches!(err, Error::ContainerNotFound { name } if name == "ghost"));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn unauthorized_responses_replay_exactly_once() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/AUTH_test/assets");
			then.status(401);
		})
		.await;
	let client = client_for(&server);
	let err = client
		.read_container("assets")
		.await
		.expect_err("Persistent 401s should surface after one replay.");

	assert!(matches!(err, Error::Authorization));

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn unexpected_statuses_exhaust_the_transient_schedule() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/AUTH_test/assets");
			then.status(503);
		})
		.await;
	let client = client_for(&server);
	let err = client
		.read_container("assets")
		.await
		.expect_err("Persistent 503s should surface once retries are exhausted.");

	assert!(matches!(
		err,
		Error::Transient(TransientError::UnexpectedStatus { status: 503 })
	));

	mock.assert_calls_async(4).await;
}
