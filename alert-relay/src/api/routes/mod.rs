//! API route modules.

pub mod alerts;
pub mod health;
pub mod metrics;
pub mod probes;
pub mod splunk;

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use crate::api::server::AppState;

/// Create the main router. The probe routes exist only in staging.
pub fn create_router(state: AppState, staging: bool) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .nest(
            "/api/v2/alerts",
            alerts::router().merge(splunk::router()),
        )
        .nest("/health", health::router())
        .nest("/metrics", metrics::router());

    if staging {
        router = router.nest("/tests", probes::router());
    }

    router.with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({"message": "Hello World From Alertbot"}))
}
