//! Gateway request payloads, server state, and the API error envelope.

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use worklog_access::AccessPolicy;
use worklog_discord::{DeliveryError, ReportDispatcher};
use worklog_report::{ReportError, TaskBatch};

pub const STATUS_ENDPOINT: &str = "/status";
pub const LOGIN_ENDPOINT: &str = "/login";
pub const SEND_SIGNAL_ENDPOINT: &str = "/send_signal";
pub const PROCESS_TASKS_ENDPOINT: &str = "/process_tasks";
pub const GET_TASK_STATS_ENDPOINT: &str = "/get_task_stats";

pub const SIGNAL_TEXT_MAX_CHARS: usize = 120;
pub const SIGNAL_MAX_MESSAGES: usize = 2;
pub const SIGNAL_MAX_REPEAT: i64 = 9;

#[derive(Debug, Clone)]
/// Gateway configuration, injected at construction.
pub struct GatewayConfig {
    pub bind: String,
    pub rate_table_path: PathBuf,
    pub access_policy: AccessPolicy,
}

/// Shared server state.
///
/// `rate_table_lock` serializes every load-aggregate-flush cycle so
/// concurrent batches cannot lose newly created placeholder rows to a
/// last-writer-wins flush race.
pub struct GatewayState {
    pub config: GatewayConfig,
    pub rate_table_lock: Mutex<()>,
    pub dispatcher: Arc<dyn ReportDispatcher>,
}

impl GatewayState {
    pub fn new(config: GatewayConfig, dispatcher: Arc<dyn ReportDispatcher>) -> Self {
        Self {
            config,
            rate_table_lock: Mutex::new(()),
            dispatcher,
        }
    }
}

#[derive(Debug, Deserialize)]
/// Payload for `/status` and `/login`.
pub struct StatusPayload {
    pub user_id: u64,
}

#[derive(Debug, Deserialize)]
/// One ad-hoc relay message.
pub struct SignalMessage {
    pub text: String,
    #[serde(default = "default_signal_repeat")]
    pub count: i64,
}

fn default_signal_repeat() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
/// Payload for `/send_signal`.
pub struct SignalPayload {
    pub user_id: u64,
    pub messages: Vec<SignalMessage>,
}

#[derive(Debug, Deserialize)]
/// Payload for `/process_tasks` and `/get_task_stats`.
pub struct TaskPayload {
    pub user_id: u64,
    pub tasks: TaskBatch,
}

/// Error payload mapped to the gateway's JSON error envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_allowlisted() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "user_not_allowlisted",
            "User not whitelisted",
        )
    }

    pub fn storage() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            "rate table is unavailable",
        )
    }

    /// Maps a delivery failure to the upstream status where available.
    pub fn delivery(error: &DeliveryError) -> Self {
        let status = error
            .http_status
            .and_then(|value| StatusCode::from_u16(value).ok())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        Self::new(status, "delivery_failed", "failed to deliver message")
    }
}

impl From<ReportError> for ApiError {
    fn from(error: ReportError) -> Self {
        match error {
            ReportError::Validation(message) => ApiError::bad_request("invalid_batch", message),
            ReportError::Storage(source) => {
                tracing::error!(error = %source, "rate table storage failure");
                ApiError::storage()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": {
                    "code": self.code,
                    "message": self.message,
                }
            })),
        )
            .into_response()
    }
}
