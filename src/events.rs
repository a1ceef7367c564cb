//! State-change notifications delivered to subscribers.

// crates.io
use tokio::sync::broadcast;
// self
use crate::{_prelude::*, identity::Identity};

/// Emitted when the observed authentication state changes.
#[derive(Clone, Debug)]
pub struct AuthStateChanged {
	/// Identity observed after the change.
	pub identity: Arc<Identity>,
	/// Wall-clock time the change was observed.
	pub observed_at: DateTime<Utc>,
}

/// Fan-out of [`AuthStateChanged`] events over a broadcast channel.
///
/// Subscribers that fall more than the channel capacity behind observe
/// [`broadcast::error::RecvError::Lagged`] and keep receiving newer events.
#[derive(Clone, Debug)]
pub struct StateNotifier {
	sender: broadcast::Sender<AuthStateChanged>,
}
impl StateNotifier {
	/// Create a notifier buffering up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));

		Self { sender }
	}

	/// Register a new subscriber.
	pub fn subscribe(&self) -> broadcast::Receiver<AuthStateChanged> {
		self.sender.subscribe()
	}

	/// Number of live subscribers.
	pub fn subscriber_count(&self) -> usize {
		self.sender.receiver_count()
	}

	/// Deliver the identity to every current subscriber, returning how many were reached.
	pub fn notify(&self, identity: Arc<Identity>) -> usize {
		let event = AuthStateChanged { identity, observed_at: Utc::now() };

		match self.sender.send(event) {
			Ok(delivered) => delivered,
			Err(_) => {
				tracing::debug!("auth state changed with no subscribers");

				0
			},
		}
	}
}
