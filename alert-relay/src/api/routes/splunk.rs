//! Splunk alert-action webhook.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use tracing::{info, warn};

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::domain::SplunkEvent;
use crate::routing::DestinationResolver;

pub fn router() -> Router<AppState> {
    Router::new().route("/splunk/{route}", post(splunk_alert))
}

/// The body is taken raw: anything that is not a JSON object is wrapped
/// instead of rejected.
async fn splunk_alert(
    State(state): State<AppState>,
    Path(route): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    info!(route = %route, bytes = body.len(), "Received splunk alert");
    let event = SplunkEvent::from_body(&body);

    let table = state.services.routing.snapshot();
    let destination = match DestinationResolver::new(&table).resolve_splunk(&route) {
        Ok(destination) => destination,
        Err(e) => {
            warn!(
                route = %route,
                body = %String::from_utf8_lossy(&body),
                "No splunk destination for route"
            );
            return Err(e.into());
        }
    };

    let summary = state
        .services
        .dispatcher
        .dispatch_splunk(destination, &route, &event)
        .await;
    info!(
        route = %route,
        delivered = summary.delivered,
        failed = summary.failed,
        skipped = summary.skipped,
        "Splunk alert dispatched"
    );

    Ok(StatusCode::NO_CONTENT)
}
