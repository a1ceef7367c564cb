//! `reqwest`-backed whoami lookup.

// crates.io
use http::{StatusCode, header::ACCEPT};
use reqwest::{Client, redirect::Policy};
use url::Url;
// self
use crate::{
	_prelude::*,
	config::{self, ProviderConfig},
	fetcher::{ClaimsFetcher, ClaimsFuture},
	identity::Claim,
};

/// Maximum redirect depth followed by the default client.
pub const MAX_REDIRECTS: usize = 5;

/// Fetches the current user's claims from the whoami endpoint.
#[derive(Clone, Debug)]
pub struct WhoamiClient {
	client: Client,
	url: Url,
	require_https: bool,
	request_timeout: Duration,
	max_response_bytes: u64,
}
impl WhoamiClient {
	/// Build a client with the default reqwest configuration.
	pub fn new(config: &ProviderConfig) -> Result<Self> {
		let client = Client::builder()
			.redirect(Policy::limited(MAX_REDIRECTS))
			.user_agent(format!("whoami-session/{}", env!("CARGO_PKG_VERSION")))
			.connect_timeout(Duration::from_secs(5))
			.build()?;

		Self::with_client(config, client)
	}

	/// Build a client around a caller-supplied reqwest client (cookie store, default headers).
	pub fn with_client(config: &ProviderConfig, client: Client) -> Result<Self> {
		config.validate()?;

		Ok(Self {
			client,
			url: config.whoami_url()?,
			require_https: config.require_https,
			request_timeout: config.request_timeout,
			max_response_bytes: config.max_response_bytes,
		})
	}

	/// Resolved whoami endpoint.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Perform one whoami request.
	///
	/// `401 Unauthorized` is a normal "no session" answer and maps to an empty claim list.
	pub async fn fetch(&self) -> Result<Vec<Claim>> {
		if self.require_https {
			config::enforce_https(&self.url)?;
		}

		let start = Instant::now();
		let response = self
			.client
			.get(self.url.clone())
			.header(ACCEPT, "application/json")
			.timeout(self.request_timeout)
			.send()
			.await?;
		let elapsed = start.elapsed();
		let status = response.status();

		if status == StatusCode::UNAUTHORIZED {
			tracing::debug!(url = %self.url, elapsed = ?elapsed, "whoami reports no session");

			return Ok(Vec::new());
		}
		if !status.is_success() {
			let body = response.text().await.ok();

			return Err(Error::HttpStatus { status, url: self.url.clone(), body });
		}

		let bytes = response.bytes().await?;

		if bytes.len() as u64 > self.max_response_bytes {
			return Err(Error::Validation {
				field: "max_response_bytes",
				reason: format!(
					"Response size {size} bytes exceeds the configured guard of {limit} bytes.",
					size = bytes.len(),
					limit = self.max_response_bytes
				),
			});
		}

		let claims: Option<Vec<Claim>> = serde_json::from_slice(&bytes)?;
		let claims = claims.unwrap_or_default();

		tracing::debug!(
			url = %self.url,
			status = %status,
			elapsed = ?elapsed,
			claims = claims.len(),
			"whoami fetch complete"
		);

		Ok(claims)
	}
}
impl ClaimsFetcher for WhoamiClient {
	fn fetch_claims(&self) -> ClaimsFuture<'_> {
		Box::pin(self.fetch())
	}
}
