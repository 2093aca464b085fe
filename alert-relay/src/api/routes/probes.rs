//! Staging-only probe routes that push a fixed message through the live
//! channel handlers.

use axum::{Json, Router, extract::State, routing::post};
use serde_json::{Value, json};
use tracing::{error, info};

use crate::Error;
use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::render::TelegramMessage;
use crate::routing::TelegramTarget;

const TELEGRAM_PROBE: &str = "Hello World From Alertbot";
const SMS_PROBE: &str = "Hello World From Alertbot Bulk";
/// Group, cluster and receiver label used for probe metrics.
const PROBE_LABEL: &str = "test";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/telegram", post(telegram_probe))
        .route("/sms", post(sms_probe))
}

async fn telegram_probe(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let services = &state.services;
    let handler = services
        .dispatcher
        .telegram()
        .ok_or_else(|| ApiError::service_unavailable("telegram is not active"))?;

    let group_id = services.config.telegram.test_group.clone();
    if group_id.is_empty() {
        return Err(ApiError::bad_request("TG_GROUP_TEST is not set"));
    }

    let target = TelegramTarget {
        group_id,
        topic_id: None,
        silencer: false,
    };
    let message = TelegramMessage {
        text: TELEGRAM_PROBE.to_string(),
        cluster: PROBE_LABEL.to_string(),
        severity: PROBE_LABEL.to_string(),
    };

    handler
        .deliver(&target, &message, PROBE_LABEL)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to send telegram probe");
            ApiError::internal(format!(
                "Failed to send telegram message after {} attempts",
                services.config.telegram.send_retries
            ))
        })?;

    info!(chat_id = %target.group_id, "Telegram probe sent");
    Ok(Json(json!({"message": "Message sent to telegram"})))
}

async fn sms_probe(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let services = &state.services;
    let handler = services
        .sms_handler
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("sms is not active"))?;

    let sms = &services.config.sms;
    handler
        .send(
            PROBE_LABEL,
            PROBE_LABEL,
            &sms.test_numbers,
            SMS_PROBE,
            &sms.default_sender,
        )
        .await
        .map_err(|e| match e {
            Error::Validation(msg) => ApiError::bad_request(msg),
            other => ApiError::internal(other.to_string()),
        })?;

    info!(recipients = sms.test_numbers.len(), "SMS probe sent");
    Ok(Json(json!({"message": "Bulk SMS sent successfully"})))
}
