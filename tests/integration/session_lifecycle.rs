//! Integration coverage for the provider against a live mock backend.

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use whoami_session::{AuthStateProvider, FetchOutcome, PollerState, ProviderConfig, Result};
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};

const WHOAMI_PATH: &str = "/bff/whoami";
const CLAIMS_BODY: &str = r#"[
    { "type": "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier", "value": "alice" },
    { "type": "role", "value": "admin" }
]"#;

fn config(server: &MockServer) -> ProviderConfig {
	ProviderConfig::new(format!("{}/bff/", server.uri()))
		.expect("config")
		.with_require_https(false)
		.with_poll_schedule(Duration::from_millis(50), Duration::from_millis(100))
}

#[tokio::test]
async fn detects_server_side_logout() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let authenticated = ResponseTemplate::new(200)
		.set_body_string(CLAIMS_BODY)
		.insert_header("content-type", "application/json");
	let logged_out = ResponseTemplate::new(401);
	let request_counter = Arc::new(AtomicUsize::new(0));
	let counter_handle = request_counter.clone();

	Mock::given(method("GET"))
		.and(path(WHOAMI_PATH))
		.respond_with(move |_: &wiremock::Request| {
			match counter_handle.fetch_add(1, Ordering::SeqCst) {
				0 | 1 => authenticated.clone(),
				_ => logged_out.clone(),
			}
		})
		.mount(&server)
		.await;

	let provider = AuthStateProvider::new(config(&server))?;
	let mut events = provider.subscribe();
	let identity = provider.get_state().await;

	assert!(identity.is_authenticated());
	assert_eq!(identity.name(), Some("alice"));
	assert!(identity.is_in_role("admin"));

	let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
		.await
		.expect("logout detected in time")
		.expect("event");

	assert!(!event.identity.is_authenticated());

	// Give a would-be extra tick the chance to run.
	tokio::time::sleep(Duration::from_millis(300)).await;

	assert_eq!(request_counter.load(Ordering::SeqCst), 3);
	assert_eq!(provider.poller_state().await, PollerState::Stopped);
	assert!(!provider.get_state().await.is_authenticated());
	assert_eq!(request_counter.load(Ordering::SeqCst), 3, "logout is served from cache");

	Ok(())
}

#[tokio::test]
async fn failing_backend_is_treated_as_logged_out() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(WHOAMI_PATH))
		.respond_with(ResponseTemplate::new(500))
		.expect(1)
		.mount(&server)
		.await;

	let provider = AuthStateProvider::new(config(&server))?;

	assert!(!provider.get_state().await.is_authenticated());
	assert!(!provider.get_state().await.is_authenticated());

	let status = provider.status().await;

	assert_eq!(status.last_outcome, Some(FetchOutcome::Failed));
	assert_eq!(status.poller, PollerState::Idle);

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn shutdown_stops_polling_the_backend() -> Result<()> {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(WHOAMI_PATH))
		.respond_with(ResponseTemplate::new(200).set_body_string(CLAIMS_BODY))
		.mount(&server)
		.await;

	let provider = AuthStateProvider::new(config(&server))?;

	assert!(provider.get_state().await.is_authenticated());

	tokio::time::sleep(Duration::from_millis(200)).await;
	provider.shutdown().await;
	tokio::time::sleep(Duration::from_millis(50)).await;

	let seen = server.received_requests().await.map(|requests| requests.len()).unwrap_or(0);

	tokio::time::sleep(Duration::from_millis(300)).await;

	let after = server.received_requests().await.map(|requests| requests.len()).unwrap_or(0);

	assert!(seen >= 2, "poller should have ticked before shutdown");
	assert_eq!(seen, after);

	Ok(())
}
