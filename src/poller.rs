//! Background session poller detecting server-side logout.

// crates.io
use serde::{Deserialize, Serialize};
use tokio::{
	task::JoinHandle,
	time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	cache::manager::IdentityCache,
	config::{DEFAULT_POLL_INITIAL_DELAY, DEFAULT_POLL_PERIOD},
	events::StateNotifier,
	metrics,
};

/// Lifecycle of the poller owned by a provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollerState {
	/// No poller has been started.
	Idle,
	/// The poller is ticking.
	Active,
	/// The poller has exited and will not tick again.
	Stopped,
}

/// Why a poller exited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollerExit {
	/// An unauthenticated identity was observed and reported.
	LoggedOut,
	/// The poller was cancelled by its owner.
	Cancelled,
}

/// Tick schedule of a poller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSchedule {
	/// Delay before the first tick.
	pub initial_delay: Duration,
	/// Interval between ticks.
	pub period: Duration,
}
impl Default for PollSchedule {
	fn default() -> Self {
		Self { initial_delay: DEFAULT_POLL_INITIAL_DELAY, period: DEFAULT_POLL_PERIOD }
	}
}

/// Handle to a running poller task.
///
/// Each tick forces a cache refresh. The first unauthenticated result is reported through
/// the notifier and ends the task. Dropping the handle cancels the task.
#[derive(Debug)]
pub struct SessionPoller {
	token: CancellationToken,
	task: JoinHandle<PollerExit>,
}
impl SessionPoller {
	/// Start polling on the current tokio runtime.
	pub fn spawn(cache: IdentityCache, notifier: StateNotifier, schedule: PollSchedule) -> Self {
		let token = CancellationToken::new();
		let task = tokio::spawn(run(cache, notifier, schedule, token.clone()));

		Self { token, task }
	}

	/// Current lifecycle state; never [`PollerState::Idle`].
	pub fn state(&self) -> PollerState {
		if self.token.is_cancelled() || self.task.is_finished() {
			PollerState::Stopped
		} else {
			PollerState::Active
		}
	}

	/// Whether the poller is still ticking.
	pub fn is_active(&self) -> bool {
		self.state() == PollerState::Active
	}

	/// Ask the poller to stop without waiting for it.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Cancel the poller and wait for it to exit.
	///
	/// Returns `None` when the task did not finish cleanly.
	pub async fn shutdown(mut self) -> Option<PollerExit> {
		self.token.cancel();

		match (&mut self.task).await {
			Ok(exit) => Some(exit),
			Err(err) => {
				tracing::error!(error = %err, "session poller task failed");

				None
			},
		}
	}
}
impl Drop for SessionPoller {
	fn drop(&mut self) {
		self.token.cancel();
	}
}

async fn run(
	cache: IdentityCache,
	notifier: StateNotifier,
	schedule: PollSchedule,
	token: CancellationToken,
) -> PollerExit {
	// `interval_at` panics on a zero period.
	let period = schedule.period.max(Duration::from_millis(1));
	let mut ticker = time::interval_at(Instant::now() + schedule.initial_delay, period);

	ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

	tracing::info!(endpoint = cache.endpoint(), ?period, "starting background session check");

	loop {
		tokio::select! {
			biased;
			_ = token.cancelled() => break,
			_ = ticker.tick() => {},
		}

		let tick = tokio::spawn({
			let cache = cache.clone();

			async move { cache.get(false).await }
		});
		let abort = tick.abort_handle();
		let joined = tokio::select! {
			biased;
			_ = token.cancelled() => {
				abort.abort();

				break;
			},
			joined = tick => joined,
		};

		match joined {
			Ok(identity) if identity.is_authenticated() => {
				observe_tick(&cache, true);

				tracing::trace!(endpoint = cache.endpoint(), "session still authenticated");
			},
			Ok(identity) => {
				observe_tick(&cache, true);
				metrics::record_logout(cache.endpoint());
				cache.metrics().record_logout();

				tracing::info!(endpoint = cache.endpoint(), "user logged out");

				// Subscribers reacting to the event must already see this poller as stopped.
				token.cancel();
				notifier.notify(identity);

				return PollerExit::LoggedOut;
			},
			Err(err) => {
				observe_tick(&cache, false);

				tracing::error!(
					endpoint = cache.endpoint(),
					error = %err,
					"error retrieving user info during session check"
				);
			},
		}
	}

	tracing::debug!(endpoint = cache.endpoint(), "session poller cancelled");

	PollerExit::Cancelled
}

fn observe_tick(cache: &IdentityCache, ok: bool) {
	metrics::record_poll_tick(cache.endpoint(), ok);

	cache.metrics().record_poll_tick(ok);
}
