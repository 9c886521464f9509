//! Endpoint handlers: allowlist gate, batch processing, and the DM relay.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{error, info};

use worklog_discord::{chunk_text, DISCORD_MESSAGE_MAX_CHARS};
use worklog_report::{process_task_batch, AggregatedReport};

use crate::gateway_types::{
    ApiError, GatewayState, SignalPayload, StatusPayload, TaskPayload, SIGNAL_MAX_MESSAGES,
    SIGNAL_MAX_REPEAT, SIGNAL_TEXT_MAX_CHARS,
};

/// Parses a request body into a typed payload with the gateway error envelope.
fn parse_payload<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body)
        .map_err(|error| ApiError::bad_request("invalid_payload", error.to_string()))
}

/// The allowlist gate runs before any state is read or mutated.
fn authorize(state: &GatewayState, user_id: u64) -> Result<(), ApiError> {
    if !state.config.access_policy.is_authorized(user_id) {
        return Err(ApiError::not_allowlisted());
    }
    Ok(())
}

pub(crate) async fn handle_status(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<Value>,
) -> Response {
    let payload = match parse_payload::<StatusPayload>(body) {
        Ok(payload) => payload,
        Err(error) => return error.into_response(),
    };
    if let Err(error) = authorize(&state, payload.user_id) {
        return error.into_response();
    }
    Json(json!({ "status": "Online" })).into_response()
}

pub(crate) async fn handle_login(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<Value>,
) -> Response {
    let payload = match parse_payload::<StatusPayload>(body) {
        Ok(payload) => payload,
        Err(error) => return error.into_response(),
    };
    if let Err(error) = authorize(&state, payload.user_id) {
        return error.into_response();
    }
    Json(json!({ "message": "Login successful" })).into_response()
}

pub(crate) async fn handle_send_signal(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<Value>,
) -> Response {
    let payload = match parse_payload::<SignalPayload>(body) {
        Ok(payload) => payload,
        Err(error) => return error.into_response(),
    };
    if let Err(error) = validate_signal_messages(&payload) {
        return error.into_response();
    }
    if let Err(error) = authorize(&state, payload.user_id) {
        return error.into_response();
    }

    let mut chunks = Vec::new();
    for message in &payload.messages {
        for _ in 0..message.count {
            chunks.push(message.text.clone());
        }
    }
    match state.dispatcher.deliver(payload.user_id, &chunks).await {
        Ok(_) => Json(json!({ "message": "Signal sent successfully" })).into_response(),
        Err(delivery_error) => {
            error!(
                reason_code = %delivery_error.reason_code,
                detail = %delivery_error.detail,
                "signal delivery failed"
            );
            ApiError::delivery(&delivery_error).into_response()
        }
    }
}

fn validate_signal_messages(payload: &SignalPayload) -> Result<(), ApiError> {
    if payload.messages.is_empty() || payload.messages.len() > SIGNAL_MAX_MESSAGES {
        return Err(ApiError::bad_request(
            "invalid_signal",
            format!("you must provide 1 to {SIGNAL_MAX_MESSAGES} messages"),
        ));
    }
    for message in &payload.messages {
        if message.text.chars().count() > SIGNAL_TEXT_MAX_CHARS {
            return Err(ApiError::bad_request(
                "invalid_signal",
                format!("message text exceeds {SIGNAL_TEXT_MAX_CHARS} characters"),
            ));
        }
        if message.count < 1 || message.count > SIGNAL_MAX_REPEAT {
            return Err(ApiError::bad_request(
                "invalid_signal",
                format!("count must be between 1 and {SIGNAL_MAX_REPEAT}"),
            ));
        }
    }
    Ok(())
}

pub(crate) async fn handle_process_tasks(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<Value>,
) -> Response {
    let payload = match parse_payload::<TaskPayload>(body) {
        Ok(payload) => payload,
        Err(error) => return error.into_response(),
    };
    if let Err(error) = authorize(&state, payload.user_id) {
        return error.into_response();
    }

    let report = match run_aggregation(&state, &payload).await {
        Ok(report) => report,
        Err(error) => return error.into_response(),
    };

    // Flush already happened; a delivery failure keeps the new rate rows.
    let chunks = chunk_text(report.report_text.as_str(), DISCORD_MESSAGE_MAX_CHARS);
    if let Err(delivery_error) = state.dispatcher.deliver(payload.user_id, &chunks).await {
        error!(
            reason_code = %delivery_error.reason_code,
            detail = %delivery_error.detail,
            "report delivery failed"
        );
        return ApiError::delivery(&delivery_error).into_response();
    }

    info!(
        user_id = payload.user_id,
        task_count = report.totals.total_task_count,
        new_tasks = report.totals.new_task_names.len(),
        "processed task batch and delivered report"
    );
    Json(json!({
        "message": "Processed tasks and sent report successfully",
        "total_time": report.total_time_display,
        "total_payout": report.total_payout_display,
    }))
    .into_response()
}

pub(crate) async fn handle_get_task_stats(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<Value>,
) -> Response {
    let payload = match parse_payload::<TaskPayload>(body) {
        Ok(payload) => payload,
        Err(error) => return error.into_response(),
    };
    if let Err(error) = authorize(&state, payload.user_id) {
        return error.into_response();
    }

    let report = match run_aggregation(&state, &payload).await {
        Ok(report) => report,
        Err(error) => return error.into_response(),
    };
    Json(json!({
        "message": "Processed tasks successfully",
        "total_time": report.total_time_display,
        "total_payout": report.total_payout_display,
    }))
    .into_response()
}

/// Serializes the load-aggregate-flush cycle behind the table lock.
async fn run_aggregation(
    state: &GatewayState,
    payload: &TaskPayload,
) -> Result<AggregatedReport, ApiError> {
    let _guard = state.rate_table_lock.lock().await;
    process_task_batch(state.config.rate_table_path.as_path(), &payload.tasks)
        .map_err(ApiError::from)
}
