//! Metrics helpers and per-provider telemetry bookkeeping.

// std
#[cfg(feature = "prometheus")] use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use metrics::Label;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use smallvec::SmallVec;
// self
use crate::{_prelude::*, cache::entry::FetchOutcome};

type LabelSet = SmallVec<[Label; 2]>;

const METRIC_LOOKUPS_TOTAL: &str = "whoami_session_lookups_total";
const METRIC_HITS_TOTAL: &str = "whoami_session_cache_hits_total";
const METRIC_MISSES_TOTAL: &str = "whoami_session_cache_misses_total";
const METRIC_FETCH_TOTAL: &str = "whoami_session_fetch_total";
const METRIC_FETCH_DURATION: &str = "whoami_session_fetch_duration_seconds";
const METRIC_POLL_TICKS_TOTAL: &str = "whoami_session_poll_ticks_total";
const METRIC_LOGOUTS_TOTAL: &str = "whoami_session_logouts_total";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Thread-safe metrics accumulator for a single provider.
#[derive(Debug, Default)]
pub struct ProviderMetrics {
	lookups: AtomicU64,
	cache_hits: AtomicU64,
	fetches: AtomicU64,
	fetch_failures: AtomicU64,
	poll_ticks: AtomicU64,
	poll_tick_failures: AtomicU64,
	logouts: AtomicU64,
	last_fetch_micros: AtomicU64,
}
impl ProviderMetrics {
	/// Create a new metrics accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record a lookup served from the cache.
	pub fn record_hit(&self) {
		self.lookups.fetch_add(1, Ordering::Relaxed);
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a lookup that went upstream.
	pub fn record_miss(&self) {
		self.lookups.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a completed fetch and its latency.
	pub fn record_fetch(&self, outcome: FetchOutcome, duration: Duration) {
		self.fetches.fetch_add(1, Ordering::Relaxed);

		if outcome == FetchOutcome::Failed {
			self.fetch_failures.fetch_add(1, Ordering::Relaxed);
		}

		self.last_fetch_micros.store(duration.as_micros() as u64, Ordering::Relaxed);
	}

	/// Record a poll tick.
	pub fn record_poll_tick(&self, ok: bool) {
		self.poll_ticks.fetch_add(1, Ordering::Relaxed);

		if !ok {
			self.poll_tick_failures.fetch_add(1, Ordering::Relaxed);
		}
	}

	/// Record a detected logout.
	pub fn record_logout(&self) {
		self.logouts.fetch_add(1, Ordering::Relaxed);
	}

	/// Take a point-in-time snapshot for status reporting.
	pub fn snapshot(&self) -> ProviderMetricsSnapshot {
		ProviderMetricsSnapshot {
			lookups: self.lookups.load(Ordering::Relaxed),
			cache_hits: self.cache_hits.load(Ordering::Relaxed),
			fetches: self.fetches.load(Ordering::Relaxed),
			fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
			poll_ticks: self.poll_ticks.load(Ordering::Relaxed),
			poll_tick_failures: self.poll_tick_failures.load(Ordering::Relaxed),
			logouts: self.logouts.load(Ordering::Relaxed),
			last_fetch_micros: match self.last_fetch_micros.load(Ordering::Relaxed) {
				0 => None,
				value => Some(value),
			},
		}
	}
}

/// Read-only snapshot of per-provider telemetry counters.
#[derive(Clone, Debug)]
pub struct ProviderMetricsSnapshot {
	/// Cached lookups observed (foreground `get_state` calls).
	pub lookups: u64,
	/// Lookups served without a fetch.
	pub cache_hits: u64,
	/// Upstream fetches, foreground and background.
	pub fetches: u64,
	/// Fetches that failed and degraded to the anonymous identity.
	pub fetch_failures: u64,
	/// Poll ticks executed.
	pub poll_ticks: u64,
	/// Poll ticks that failed unexpectedly.
	pub poll_tick_failures: u64,
	/// Logouts detected by the poller.
	pub logouts: u64,
	/// Microsecond latency of the most recent fetch.
	pub last_fetch_micros: Option<u64>,
}
impl ProviderMetricsSnapshot {
	/// Ratio of lookups served from the cache.
	pub fn hit_rate(&self) -> f64 {
		if self.lookups == 0 { 0.0 } else { self.cache_hits as f64 / self.lookups as f64 }
	}
}

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = PrometheusBuilder::new()
		.install_recorder()
		.map_err(|err| Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

/// Record a lookup served from the cache.
pub fn record_cache_hit(endpoint: &str) {
	let labels = base_labels(endpoint);

	metrics::counter!(METRIC_LOOKUPS_TOTAL, labels.iter()).increment(1);
	metrics::counter!(METRIC_HITS_TOTAL, labels.iter()).increment(1);
}

/// Record a lookup that required an upstream fetch.
pub fn record_cache_miss(endpoint: &str) {
	let labels = base_labels(endpoint);

	metrics::counter!(METRIC_LOOKUPS_TOTAL, labels.iter()).increment(1);
	metrics::counter!(METRIC_MISSES_TOTAL, labels.iter()).increment(1);
}

/// Record a completed fetch along with its latency.
pub fn record_fetch(endpoint: &str, outcome: FetchOutcome, duration: Duration) {
	metrics::counter!(METRIC_FETCH_TOTAL, outcome_labels(endpoint, outcome.as_str()).iter())
		.increment(1);
	metrics::histogram!(METRIC_FETCH_DURATION, base_labels(endpoint).iter())
		.record(duration.as_secs_f64());
}

/// Record a poll tick, tagging whether it completed.
pub fn record_poll_tick(endpoint: &str, ok: bool) {
	let outcome = if ok { "ok" } else { "error" };

	metrics::counter!(METRIC_POLL_TICKS_TOTAL, outcome_labels(endpoint, outcome).iter())
		.increment(1);
}

/// Record a logout detected by the poller.
pub fn record_logout(endpoint: &str) {
	metrics::counter!(METRIC_LOGOUTS_TOTAL, base_labels(endpoint).iter()).increment(1);
}

fn base_labels(endpoint: &str) -> LabelSet {
	let mut labels = LabelSet::new();

	labels.push(Label::new("endpoint", endpoint.to_owned()));

	labels
}

fn outcome_labels(endpoint: &str, outcome: &'static str) -> LabelSet {
	let mut labels = base_labels(endpoint);

	labels.push(Label::new("outcome", outcome));

	labels
}
