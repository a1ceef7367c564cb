//! Single-entry identity cache.

pub mod entry;
pub mod manager;
