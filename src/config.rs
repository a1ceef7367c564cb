//! Provider configuration and validation.

// crates.io
use serde::{Deserialize, Serialize};
use url::Url;
// self
use crate::_prelude::*;

/// Maximum age of a cached identity before a foreground lookup re-fetches it.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
/// Delay before the first session poll tick.
pub const DEFAULT_POLL_INITIAL_DELAY: Duration = Duration::from_secs(1);
/// Interval between session poll ticks.
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(5);
/// Timeout applied to each whoami request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Default size guard (64 KiB).
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 65_536;
/// Default path of the whoami resource relative to the base URL.
pub const DEFAULT_WHOAMI_PATH: &str = "whoami";
/// Default buffer size of the state-change channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 16;

/// Settings describing where to look up the session and how often to re-check it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
	/// Base URL of the backend hosting the whoami resource.
	pub base_url: Url,
	/// Path of the whoami resource relative to `base_url`.
	#[serde(default = "default_whoami_path")]
	pub whoami_path: String,
	/// Time-to-live of the cached identity.
	#[serde(default = "default_cache_ttl")]
	pub cache_ttl: Duration,
	/// Delay before the first poll tick once a session is observed.
	#[serde(default = "default_poll_initial_delay")]
	pub poll_initial_delay: Duration,
	/// Interval between poll ticks.
	#[serde(default = "default_poll_period")]
	pub poll_period: Duration,
	/// Timeout applied to each whoami request.
	#[serde(default = "default_request_timeout")]
	pub request_timeout: Duration,
	/// Maximum size allowed for whoami payloads in bytes.
	#[serde(default = "default_max_response_bytes")]
	pub max_response_bytes: u64,
	/// Whether HTTPS is required for the whoami endpoint.
	#[serde(default = "default_true")]
	pub require_https: bool,
	/// Buffer size of the state-change broadcast channel.
	#[serde(default = "default_event_capacity")]
	pub event_capacity: usize,
}
impl ProviderConfig {
	/// Construct a configuration with default timings.
	pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
		let base_url = Url::parse(base_url.as_ref())?;

		Ok(Self {
			base_url,
			whoami_path: DEFAULT_WHOAMI_PATH.into(),
			cache_ttl: DEFAULT_CACHE_TTL,
			poll_initial_delay: DEFAULT_POLL_INITIAL_DELAY,
			poll_period: DEFAULT_POLL_PERIOD,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
			require_https: true,
			event_capacity: DEFAULT_EVENT_CAPACITY,
		})
	}

	/// Set HTTPS requirement to the desired value.
	pub fn with_require_https(mut self, require_https: bool) -> Self {
		self.require_https = require_https;

		self
	}

	/// Override the cache time-to-live.
	pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
		self.cache_ttl = ttl;

		self
	}

	/// Override the poll schedule.
	pub fn with_poll_schedule(mut self, initial_delay: Duration, period: Duration) -> Self {
		self.poll_initial_delay = initial_delay;
		self.poll_period = period;

		self
	}

	/// Resolve the whoami endpoint, with session sliding disabled.
	///
	/// A base URL without a trailing slash is treated as a directory, so
	/// `https://host/bff` resolves to `https://host/bff/whoami?slide=false`.
	pub fn whoami_url(&self) -> Result<Url> {
		let mut base = self.base_url.clone();

		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());

			base.set_path(&path);
		}

		let mut url = base.join(self.whoami_path.trim_start_matches('/'))?;

		url.query_pairs_mut().append_pair("slide", "false");

		Ok(url)
	}

	/// Validate the configuration against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if self.require_https {
			enforce_https(&self.base_url)?;
		}
		if self.base_url.host_str().is_none() {
			return Err(Error::Validation {
				field: "base_url",
				reason: "Must include a host component.".into(),
			});
		}
		if self.whoami_path.trim_matches('/').is_empty() {
			return Err(Error::Validation {
				field: "whoami_path",
				reason: "Must not be empty.".into(),
			});
		}
		if self.cache_ttl.is_zero() {
			return Err(Error::Validation {
				field: "cache_ttl",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.poll_period.is_zero() {
			return Err(Error::Validation {
				field: "poll_period",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.request_timeout.is_zero() {
			return Err(Error::Validation {
				field: "request_timeout",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.max_response_bytes == 0 {
			return Err(Error::Validation {
				field: "max_response_bytes",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.event_capacity == 0 {
			return Err(Error::Validation {
				field: "event_capacity",
				reason: "Must be greater than zero.".into(),
			});
		}

		Ok(())
	}
}

/// Ensure the provided URL uses HTTPS.
pub fn enforce_https(url: &Url) -> Result<()> {
	if url.scheme() == "https" {
		Ok(())
	} else {
		Err(Error::Security(format!("Upstream URL {url} must use HTTPS.")))
	}
}

fn default_whoami_path() -> String {
	DEFAULT_WHOAMI_PATH.into()
}

fn default_cache_ttl() -> Duration {
	DEFAULT_CACHE_TTL
}

fn default_poll_initial_delay() -> Duration {
	DEFAULT_POLL_INITIAL_DELAY
}

fn default_poll_period() -> Duration {
	DEFAULT_POLL_PERIOD
}

fn default_request_timeout() -> Duration {
	DEFAULT_REQUEST_TIMEOUT
}

fn default_max_response_bytes() -> u64 {
	DEFAULT_MAX_RESPONSE_BYTES
}

fn default_true() -> bool {
	true
}

fn default_event_capacity() -> usize {
	DEFAULT_EVENT_CAPACITY
}
