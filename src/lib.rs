//! World monitoring dashboard backend.
//!
//! Pulls news, earthquakes, conflicts, disasters and GDELT events from public
//! feeds, normalizes them, caches them on disk with a TTL and serves them as a
//! JSON API alongside static map layers.

pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod layers;
pub mod sources;

pub use error::{MonitorError, Result};
