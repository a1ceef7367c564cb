//! Identity cache deciding between the cached identity and an upstream fetch.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use tokio::sync::{Mutex, RwLock};
// self
use crate::{
	_prelude::*,
	cache::entry::{CacheEntry, FetchOutcome},
	fetcher::ClaimsFetcher,
	identity::Identity,
	metrics::{self, ProviderMetrics},
};

/// Holds the last-known identity and refreshes it through a [`ClaimsFetcher`].
///
/// Clones share the same entry. Refreshes are serialised behind a single-flight guard and
/// the entry is only written under its write lock, so readers never see an identity paired
/// with another refresh's timestamp.
#[derive(Clone)]
pub struct IdentityCache {
	fetcher: Arc<dyn ClaimsFetcher>,
	ttl: Duration,
	endpoint: Arc<str>,
	entry: Arc<RwLock<CacheEntry>>,
	single_flight: Arc<Mutex<()>>,
	metrics: Arc<ProviderMetrics>,
}
impl IdentityCache {
	/// Build a cache around the given fetcher.
	pub fn new<F>(fetcher: F, ttl: Duration) -> Self
	where
		F: ClaimsFetcher + 'static,
	{
		Self::with_parts(Arc::new(fetcher), ttl, "custom", ProviderMetrics::new())
	}

	pub(crate) fn with_parts(
		fetcher: Arc<dyn ClaimsFetcher>,
		ttl: Duration,
		endpoint: impl Into<Arc<str>>,
		metrics: Arc<ProviderMetrics>,
	) -> Self {
		Self {
			fetcher,
			ttl,
			endpoint: endpoint.into(),
			entry: Arc::new(RwLock::new(CacheEntry::new())),
			single_flight: Arc::new(Mutex::new(())),
			metrics,
		}
	}

	/// Time-to-live applied to cached lookups.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Access the metrics accumulator shared with the owning provider.
	pub fn metrics(&self) -> Arc<ProviderMetrics> {
		self.metrics.clone()
	}

	/// Endpoint label used for metrics and logs.
	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	/// Return the current identity.
	///
	/// With `use_cache` the cached identity is returned while it is younger than the TTL.
	/// Otherwise the fetcher is called and its result replaces the entry; an empty claim list
	/// or a failed fetch caches the anonymous identity.
	///
	/// Failed and empty fetches also restart the TTL window. This limits retries against a
	/// failing endpoint to one per window, and likewise delays noticing a re-authentication
	/// after a transient failure by up to one TTL.
	#[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
	pub async fn get(&self, use_cache: bool) -> Arc<Identity> {
		if use_cache && let Some(identity) = self.cached(Instant::now()).await {
			self.observe_hit();

			return identity;
		}

		let _guard = self.single_flight.lock().await;
		let now = Instant::now();

		if use_cache {
			// Another caller may have refreshed while we waited on the guard.
			if let Some(identity) = self.cached(now).await {
				self.observe_hit();

				return identity;
			}

			self.observe_miss();
		}

		self.refresh(now).await
	}

	/// Cached identity, without fetching.
	pub async fn peek(&self) -> Arc<Identity> {
		self.entry.read().await.identity().clone()
	}

	/// Capture the entry metadata for status reporting.
	pub async fn snapshot(&self) -> CacheSnapshot {
		let entry = { self.entry.read().await.clone() };
		let last_checked_at = entry.last_checked_wallclock();
		let expires_at = last_checked_at.and_then(|checked| {
			let ttl = TimeDelta::from_std(self.ttl).ok()?;

			checked.checked_add_signed(ttl)
		});

		CacheSnapshot {
			identity: entry.identity().clone(),
			last_checked_at,
			expires_at,
			last_outcome: entry.last_outcome(),
		}
	}

	async fn cached(&self, now: Instant) -> Option<Arc<Identity>> {
		let entry = self.entry.read().await;

		entry.is_fresh(now, self.ttl).then(|| {
			tracing::debug!("taking identity from cache");

			entry.identity().clone()
		})
	}

	async fn refresh(&self, now: Instant) -> Arc<Identity> {
		tracing::debug!("fetching identity");

		let started = Instant::now();
		let (identity, outcome) = match self.fetcher.fetch_claims().await {
			Ok(claims) if claims.is_empty() => (Identity::anonymous(), FetchOutcome::Anonymous),
			Ok(claims) => (Identity::from_claims(claims), FetchOutcome::Authenticated),
			Err(err) => {
				tracing::warn!(error = %err, "fetching identity failed");

				(Identity::anonymous(), FetchOutcome::Failed)
			},
		};
		let identity = Arc::new(identity);

		{
			let mut entry = self.entry.write().await;

			entry.record(identity.clone(), outcome, now);
		}

		self.observe_fetch(outcome, started.elapsed());

		identity
	}

	fn observe_hit(&self) {
		metrics::record_cache_hit(&self.endpoint);

		self.metrics.record_hit();
	}

	fn observe_miss(&self) {
		metrics::record_cache_miss(&self.endpoint);

		self.metrics.record_miss();
	}

	fn observe_fetch(&self, outcome: FetchOutcome, duration: Duration) {
		metrics::record_fetch(&self.endpoint, outcome, duration);

		self.metrics.record_fetch(outcome, duration);
	}
}
impl Debug for IdentityCache {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("IdentityCache")
			.field("ttl", &self.ttl)
			.field("endpoint", &self.endpoint)
			.finish_non_exhaustive()
	}
}

/// Snapshot of the cache entry captured for status reporting.
#[derive(Clone, Debug)]
pub struct CacheSnapshot {
	/// Identity held at capture time.
	pub identity: Arc<Identity>,
	/// Wall-clock time of the last refresh.
	pub last_checked_at: Option<DateTime<Utc>>,
	/// Wall-clock time after which a cached lookup re-fetches.
	pub expires_at: Option<DateTime<Utc>>,
	/// Outcome of the last refresh.
	pub last_outcome: Option<FetchOutcome>,
}
