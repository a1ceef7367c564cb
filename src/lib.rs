//! Async authentication-state cache for BFF-backed clients: whoami lookups cached for a short
//! TTL, plus a background poller that reports server-side logout.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod config;
pub mod events;
pub mod fetcher;
pub mod http;
pub mod identity;
pub mod metrics;
pub mod poller;

mod error;
mod provider;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, TimeDelta, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

#[cfg(feature = "prometheus")]
pub use crate::metrics::{install_default_exporter, prometheus_handle};
pub use crate::{
	cache::{entry::FetchOutcome, manager::IdentityCache},
	config::ProviderConfig,
	error::{Error, Result},
	events::AuthStateChanged,
	fetcher::ClaimsFetcher,
	http::client::WhoamiClient,
	identity::{Claim, Identity},
	poller::{PollerExit, PollerState},
	provider::{AuthStateProvider, ProviderStatus, StatusMetric},
};
