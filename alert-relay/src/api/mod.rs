//! HTTP front end.
//!
//! Decodes webhook requests into domain events, resolves a destination and
//! hands the event to the dispatcher.

pub mod error;
pub mod routes;
pub mod server;

pub use server::{ApiServer, AppState};
