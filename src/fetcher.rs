//! Claims lookup contract consumed by the identity cache.

// std
use std::{future::Future, pin::Pin};
// self
use crate::{_prelude::*, identity::Claim};

/// Boxed future returned by [`ClaimsFetcher::fetch_claims`].
pub type ClaimsFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Claim>>> + 'a + Send>>;

/// Remote lookup of the current user's claims.
///
/// Implementations perform a single request per call without retrying and must be safe to
/// call concurrently. Failures are returned as values; the cache turns them into the
/// anonymous identity.
pub trait ClaimsFetcher: Send + Sync {
	/// Fetch the claims of the current session; an empty list means no session.
	fn fetch_claims(&self) -> ClaimsFuture<'_>;
}
impl<T> ClaimsFetcher for Arc<T>
where
	T: ClaimsFetcher + ?Sized,
{
	fn fetch_claims(&self) -> ClaimsFuture<'_> {
		(**self).fetch_claims()
	}
}
