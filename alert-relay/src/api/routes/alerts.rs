//! Prometheus / Alertmanager webhook.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use tracing::info;

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::domain::AlertEvent;
use crate::routing::DestinationResolver;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/prom", post(prometheus_alert))
        .route("/prom/", post(prometheus_alert))
}

/// Resolves the alert group and dispatches it. Delivery failures never change
/// the response; only an unmatched receiver does (422).
async fn prometheus_alert(
    State(state): State<AppState>,
    Json(event): Json<AlertEvent>,
) -> ApiResult<StatusCode> {
    info!(
        receiver = %event.receiver,
        status = %event.status,
        alerts = event.alerts.len(),
        "Received prometheus alert"
    );

    let table = state.services.routing.snapshot();
    let destination = DestinationResolver::new(&table).resolve_prometheus(&event)?;

    let summary = state
        .services
        .dispatcher
        .dispatch_prometheus(destination, &event)
        .await;
    info!(
        receiver = %event.receiver,
        delivered = summary.delivered,
        failed = summary.failed,
        skipped = summary.skipped,
        "Prometheus alert dispatched"
    );

    Ok(StatusCode::NO_CONTENT)
}
