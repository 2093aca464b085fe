//! alert-relay library crate.
//!
//! Receives Prometheus and Splunk webhooks, matches them against a routing
//! table and delivers rendered messages to Telegram and bulk SMS.

pub mod api;
pub mod clients;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod render;
pub mod routing;
pub mod services;
pub mod template;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
