//! HTTP transport for the whoami lookup.

pub mod client;
