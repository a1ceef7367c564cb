//! The single cache entry holding the current identity.

// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::{_prelude::*, identity::Identity};

/// Result of the most recent upstream fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
	/// Claims were returned and an authenticated identity was cached.
	Authenticated,
	/// The endpoint reported no session.
	Anonymous,
	/// The fetch failed and the anonymous identity was cached in its place.
	Failed,
}
impl FetchOutcome {
	/// Metric label for the outcome.
	pub fn as_str(self) -> &'static str {
		match self {
			FetchOutcome::Authenticated => "authenticated",
			FetchOutcome::Anonymous => "anonymous",
			FetchOutcome::Failed => "failed",
		}
	}
}

/// Last-known identity plus the time it was checked.
///
/// Identity and timestamps are only ever replaced together through [`CacheEntry::record`].
#[derive(Clone, Debug)]
pub struct CacheEntry {
	identity: Arc<Identity>,
	last_checked_at: Option<Instant>,
	last_checked_wallclock: Option<DateTime<Utc>>,
	last_outcome: Option<FetchOutcome>,
}
impl CacheEntry {
	/// Create an entry holding the anonymous identity that has never been checked.
	pub fn new() -> Self {
		Self {
			identity: Arc::new(Identity::anonymous()),
			last_checked_at: None,
			last_checked_wallclock: None,
			last_outcome: None,
		}
	}

	/// Cached identity.
	pub fn identity(&self) -> &Arc<Identity> {
		&self.identity
	}

	/// Monotonic instant of the last refresh.
	pub fn last_checked_at(&self) -> Option<Instant> {
		self.last_checked_at
	}

	/// Wall-clock time of the last refresh.
	pub fn last_checked_wallclock(&self) -> Option<DateTime<Utc>> {
		self.last_checked_wallclock
	}

	/// Outcome of the last refresh.
	pub fn last_outcome(&self) -> Option<FetchOutcome> {
		self.last_outcome
	}

	/// Whether the entry may be served at `now` under the given TTL.
	///
	/// An entry that was never checked is never fresh.
	pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
		self.last_checked_at.is_some_and(|checked| now < checked + ttl)
	}

	/// Replace the identity and move the check timestamps forward.
	pub fn record(&mut self, identity: Arc<Identity>, outcome: FetchOutcome, now: Instant) {
		self.identity = identity;
		self.last_checked_at = Some(self.last_checked_at.map_or(now, |previous| previous.max(now)));
		self.last_checked_wallclock = Some(Utc::now());
		self.last_outcome = Some(outcome);
	}
}
impl Default for CacheEntry {
	fn default() -> Self {
		Self::new()
	}
}
