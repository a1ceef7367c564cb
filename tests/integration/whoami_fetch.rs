//! Integration tests for the HTTP whoami lookup.

// crates.io
use whoami_session::{Claim, Error, ProviderConfig, Result, WhoamiClient};
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{header, method, path, query_param},
};

const WHOAMI_PATH: &str = "/bff/whoami";
const CLAIMS_BODY: &str = r#"[
    { "type": "sub", "value": "88421113" },
    { "type": "role", "value": "admin" },
    { "type": "bff:session_expires_in", "value": 1209600 }
]"#;

fn config(server: &MockServer) -> ProviderConfig {
	ProviderConfig::new(format!("{}/bff", server.uri()))
		.expect("config")
		.with_require_https(false)
}

#[tokio::test]
async fn fetches_claims_with_sliding_disabled() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(WHOAMI_PATH))
		.and(query_param("slide", "false"))
		.and(header("accept", "application/json"))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_string(CLAIMS_BODY)
				.insert_header("content-type", "application/json"),
		)
		.expect(1)
		.mount(&server)
		.await;

	let client = WhoamiClient::new(&config(&server))?;

	assert_eq!(client.url().path(), WHOAMI_PATH);
	assert_eq!(client.url().query(), Some("slide=false"));

	let claims = client.fetch().await?;

	assert_eq!(claims.len(), 3);
	assert!(claims.contains(&Claim::new("role", "admin")));
	assert!(claims.contains(&Claim::new("bff:session_expires_in", "1209600")));

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn unauthorized_means_no_session() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(WHOAMI_PATH))
		.respond_with(ResponseTemplate::new(401))
		.expect(1)
		.mount(&server)
		.await;

	let claims = WhoamiClient::new(&config(&server))?.fetch().await?;

	assert!(claims.is_empty());

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn null_body_means_no_session() -> Result<()> {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(WHOAMI_PATH))
		.respond_with(ResponseTemplate::new(200).set_body_string("null"))
		.mount(&server)
		.await;

	let claims = WhoamiClient::new(&config(&server))?.fetch().await?;

	assert!(claims.is_empty());
	Ok(())
}

#[tokio::test]
async fn upstream_failures_are_reported() -> Result<()> {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(WHOAMI_PATH))
		.respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
		.mount(&server)
		.await;

	let err = WhoamiClient::new(&config(&server))?.fetch().await.unwrap_err();

	match err {
		Error::HttpStatus { status, body, .. } => {
			assert_eq!(status.as_u16(), 503);
			assert_eq!(body.as_deref(), Some("maintenance"));
		},
		other => panic!("expected HttpStatus, got {other:?}"),
	}

	Ok(())
}

#[tokio::test]
async fn malformed_and_oversized_payloads_are_rejected() -> Result<()> {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(WHOAMI_PATH))
		.respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
		.mount(&server)
		.await;

	let err = WhoamiClient::new(&config(&server))?.fetch().await.unwrap_err();

	assert!(matches!(err, Error::Serde(_)), "unexpected error {err:?}");

	let mut limited = config(&server);

	limited.max_response_bytes = 8;

	let err = WhoamiClient::new(&limited)?.fetch().await.unwrap_err();

	assert!(
		matches!(err, Error::Validation { field: "max_response_bytes", .. }),
		"unexpected error {err:?}"
	);

	Ok(())
}

#[tokio::test]
async fn null_claim_value_fails_the_lookup() -> Result<()> {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(WHOAMI_PATH))
		.respond_with(
			ResponseTemplate::new(200).set_body_string(r#"[{ "type": "sub", "value": null }]"#),
		)
		.mount(&server)
		.await;

	let err = WhoamiClient::new(&config(&server))?.fetch().await.unwrap_err();

	assert!(matches!(err, Error::Serde(_)), "unexpected error {err:?}");

	Ok(())
}

#[test]
fn plain_http_is_rejected_by_default() {
	let config = ProviderConfig::new("http://app.example.com/bff").expect("config");

	assert!(matches!(WhoamiClient::new(&config), Err(Error::Security(_))));
}
