//! PVR backend for sledovanitv.cz / moderntv.eu
//!
//! Keeps an in-memory mirror of the account's channels, EPG, recordings and
//! timers, refreshed by a background worker, and answers host queries from
//! immutable snapshots.

pub mod api;
pub mod call_limiter;
pub mod config;
pub mod engine;
pub mod epg;
pub mod error;
pub mod host;
pub mod models;
pub mod store;

#[cfg(test)]
mod test_support;

pub use config::AddonConfig;
pub use engine::Data;
pub use error::{ApiError, PvrError};
pub use host::{LogHost, PvrHost};
