//! Health check route.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::api::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub destinations: usize,
    pub splunk_destinations: usize,
    pub telegram_enabled: bool,
    pub sms_enabled: bool,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let table = state.services.routing.snapshot();
    let dispatcher = &state.services.dispatcher;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        destinations: table.destinations.len(),
        splunk_destinations: table.splunk_destinations.len(),
        telegram_enabled: dispatcher.telegram().is_some(),
        sms_enabled: dispatcher.sms().is_some(),
    })
}
