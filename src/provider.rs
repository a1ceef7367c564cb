//! Public entry point combining the identity cache and the session poller.

// std
use std::collections::HashMap;
// crates.io
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	cache::{entry::FetchOutcome, manager::IdentityCache},
	config::ProviderConfig,
	events::{AuthStateChanged, StateNotifier},
	fetcher::ClaimsFetcher,
	http::client::WhoamiClient,
	identity::Identity,
	metrics::ProviderMetrics,
	poller::{PollSchedule, PollerExit, PollerState, SessionPoller},
};

/// Tracks the current user's authentication state.
///
/// [`get_state`](Self::get_state) serves the cached identity and starts a background
/// poller the first time it sees an authenticated session. The poller reports a logout
/// through [`subscribe`](Self::subscribe) and then stops. Clones share state; dropping the
/// last clone cancels the poller.
#[derive(Clone, Debug)]
pub struct AuthStateProvider {
	cache: IdentityCache,
	notifier: StateNotifier,
	schedule: PollSchedule,
	poller: Arc<Mutex<Option<SessionPoller>>>,
	closed: CancellationToken,
}
impl AuthStateProvider {
	/// Build a provider that queries the configured whoami endpoint over HTTP.
	pub fn new(config: ProviderConfig) -> Result<Self> {
		let client = WhoamiClient::new(&config)?;

		Self::with_fetcher(&config, client)
	}

	/// Build a provider around a custom claims fetcher, using the timings from `config`.
	pub fn with_fetcher<F>(config: &ProviderConfig, fetcher: F) -> Result<Self>
	where
		F: ClaimsFetcher + 'static,
	{
		config.validate()?;

		let endpoint = config.base_url.as_str();
		let cache = IdentityCache::with_parts(
			Arc::new(fetcher),
			config.cache_ttl,
			endpoint,
			ProviderMetrics::new(),
		);
		let schedule =
			PollSchedule { initial_delay: config.poll_initial_delay, period: config.poll_period };

		Ok(Self {
			cache,
			notifier: StateNotifier::new(config.event_capacity),
			schedule,
			poller: Arc::new(Mutex::new(None)),
			closed: CancellationToken::new(),
		})
	}

	/// Return the current identity, starting the session poller when it is authenticated.
	pub async fn get_state(&self) -> Arc<Identity> {
		let identity = self.cache.get(true).await;

		if identity.is_authenticated() {
			self.ensure_poller().await;
		}

		identity
	}

	/// Re-fetch the identity regardless of the cache TTL.
	pub async fn refresh(&self) -> Arc<Identity> {
		let identity = self.cache.get(false).await;

		if identity.is_authenticated() {
			self.ensure_poller().await;
		}

		identity
	}

	/// Forward a new identity to every subscriber.
	pub fn notify(&self, identity: Arc<Identity>) -> usize {
		self.notifier.notify(identity)
	}

	/// Subscribe to authentication state changes.
	pub fn subscribe(&self) -> broadcast::Receiver<AuthStateChanged> {
		self.notifier.subscribe()
	}

	/// Lifecycle state of the session poller.
	pub async fn poller_state(&self) -> PollerState {
		match self.poller.lock().await.as_ref() {
			Some(poller) => poller.state(),
			None if self.closed.is_cancelled() => PollerState::Stopped,
			None => PollerState::Idle,
		}
	}

	/// Capture a status report for diagnostics.
	pub async fn status(&self) -> ProviderStatus {
		let snapshot = self.cache.snapshot().await;
		let poller = self.poller_state().await;
		let metrics = self.cache.metrics().snapshot();
		let endpoint = self.cache.endpoint();
		let mut status_metrics = vec![
			StatusMetric::new("whoami_session_lookups_total", metrics.lookups as f64, endpoint),
			StatusMetric::new("whoami_session_cache_hits_total", metrics.cache_hits as f64, endpoint),
			StatusMetric::new("whoami_session_fetch_total", metrics.fetches as f64, endpoint),
			StatusMetric::new(
				"whoami_session_fetch_failures_total",
				metrics.fetch_failures as f64,
				endpoint,
			),
			StatusMetric::new("whoami_session_poll_ticks_total", metrics.poll_ticks as f64, endpoint),
			StatusMetric::new("whoami_session_logouts_total", metrics.logouts as f64, endpoint),
		];

		if let Some(last_micros) = metrics.last_fetch_micros {
			status_metrics.push(StatusMetric::new(
				"whoami_session_last_fetch_micros",
				last_micros as f64,
				endpoint,
			));
		}

		ProviderStatus {
			endpoint: endpoint.to_owned(),
			authenticated: snapshot.identity.is_authenticated(),
			name: snapshot.identity.name().map(str::to_owned),
			claim_count: snapshot.identity.claim_count(),
			last_checked_at: snapshot.last_checked_at,
			expires_at: snapshot.expires_at,
			last_outcome: snapshot.last_outcome,
			poller,
			hit_rate: metrics.hit_rate(),
			metrics: status_metrics,
		}
	}

	/// Cancel the session poller and wait for it to exit.
	///
	/// No poller is started afterwards; notifications already delivered stay delivered.
	pub async fn shutdown(&self) -> Option<PollerExit> {
		self.closed.cancel();

		let poller = { self.poller.lock().await.take() };

		match poller {
			Some(poller) => poller.shutdown().await,
			None => None,
		}
	}

	async fn ensure_poller(&self) {
		let mut slot = self.poller.lock().await;

		if self.closed.is_cancelled() || slot.as_ref().is_some_and(SessionPoller::is_active) {
			return;
		}
		if slot.take().is_some() {
			tracing::debug!(endpoint = self.cache.endpoint(), "replacing stopped session poller");
		}

		*slot = Some(SessionPoller::spawn(self.cache.clone(), self.notifier.clone(), self.schedule));
	}
}

/// Status projection for a provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderStatus {
	/// Endpoint label of the provider.
	pub endpoint: String,
	/// Whether the cached identity is authenticated.
	pub authenticated: bool,
	/// Name claim of the cached identity.
	pub name: Option<String>,
	/// Number of claims on the cached identity.
	pub claim_count: usize,
	/// Timestamp of the most recent refresh.
	pub last_checked_at: Option<DateTime<Utc>>,
	/// Timestamp after which a cached lookup re-fetches.
	pub expires_at: Option<DateTime<Utc>>,
	/// Outcome of the most recent refresh.
	pub last_outcome: Option<FetchOutcome>,
	/// Lifecycle state of the session poller.
	pub poller: PollerState,
	/// Ratio of cached lookups served without a fetch.
	pub hit_rate: f64,
	/// Metrics emitted to describe provider activity.
	pub metrics: Vec<StatusMetric>,
}

/// Metric sample used in provider status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusMetric {
	/// Metric name following the monitoring schema.
	pub name: String,
	/// Numeric value captured for the metric.
	pub value: f64,
	/// Additional labels enriching the metric sample.
	#[serde(default)]
	pub labels: HashMap<String, String>,
}
impl StatusMetric {
	fn new(name: impl Into<String>, value: f64, endpoint: &str) -> Self {
		let mut labels = HashMap::with_capacity(1);

		labels.insert("endpoint".into(), endpoint.into());

		Self { name: name.into(), value, labels }
	}
}
