//! Gateway integration tests over an ephemeral listener.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{json, Value};
use tempfile::tempdir;
use tokio::net::TcpListener;

use worklog_access::AccessPolicy;
use worklog_discord::{DeliveryError, DeliveryResult, ReportDispatcher};
use worklog_rates::RateTable;

use crate::gateway_types::{GatewayConfig, GatewayState};
use crate::server_bootstrap::build_gateway_router;

const OPERATOR_ID: u64 = 184_051;

#[derive(Default)]
struct RecordingDispatcher {
    deliveries: Mutex<Vec<(u64, Vec<String>)>>,
}

impl RecordingDispatcher {
    fn deliveries(&self) -> Vec<(u64, Vec<String>)> {
        self.deliveries.lock().expect("deliveries lock").clone()
    }
}

#[async_trait]
impl ReportDispatcher for RecordingDispatcher {
    async fn deliver(
        &self,
        recipient_id: u64,
        chunks: &[String],
    ) -> Result<DeliveryResult, DeliveryError> {
        self.deliveries
            .lock()
            .expect("deliveries lock")
            .push((recipient_id, chunks.to_vec()));
        Ok(DeliveryResult {
            dm_channel_id: "dm-1".to_string(),
            receipts: Vec::new(),
        })
    }
}

struct FailingDispatcher;

#[async_trait]
impl ReportDispatcher for FailingDispatcher {
    async fn deliver(
        &self,
        _recipient_id: u64,
        chunks: &[String],
    ) -> Result<DeliveryResult, DeliveryError> {
        Err(DeliveryError {
            reason_code: "delivery_rate_limited".to_string(),
            detail: "provider returned HTTP 429".to_string(),
            retryable: true,
            http_status: Some(429),
            chunk_index: 0,
            chunk_count: chunks.len(),
        })
    }
}

fn test_state(root: &Path, dispatcher: Arc<dyn ReportDispatcher>) -> Arc<GatewayState> {
    Arc::new(GatewayState::new(
        GatewayConfig {
            bind: "127.0.0.1:0".to_string(),
            rate_table_path: root.join("tasks.csv"),
            access_policy: AccessPolicy::from_ids([OPERATOR_ID]),
        },
        dispatcher,
    ))
}

async fn spawn_test_server(
    state: Arc<GatewayState>,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind ephemeral listener")?;
    let addr = listener.local_addr().context("resolve listener addr")?;
    let app = build_gateway_router(state);
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    Ok((addr, handle))
}

async fn post_json(addr: SocketAddr, endpoint: &str, body: Value) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("http://{addr}{endpoint}"))
        .json(&body)
        .send()
        .await
        .expect("send request");
    let status = StatusCode::from_u16(response.status().as_u16()).expect("status");
    let payload = response.json::<Value>().await.unwrap_or(Value::Null);
    (status, payload)
}

fn translation_batch() -> Value {
    json!({
        "user_id": OPERATOR_ID,
        "tasks": {
            "Translation": {"dates": {"2025-01-10": 3}, "taskCount": 3, "time": 90}
        }
    })
}

#[tokio::test]
async fn functional_status_and_login_accept_allowlisted_operator() {
    let temp = tempdir().expect("tempdir");
    let state = test_state(temp.path(), Arc::new(RecordingDispatcher::default()));
    let (addr, handle) = spawn_test_server(state).await.expect("spawn server");

    let (status, body) = post_json(addr, "/status", json!({"user_id": OPERATOR_ID})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Online");

    let (status, body) = post_json(addr, "/login", json!({"user_id": OPERATOR_ID})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");

    handle.abort();
}

#[tokio::test]
async fn functional_status_rejects_unknown_operator() {
    let temp = tempdir().expect("tempdir");
    let state = test_state(temp.path(), Arc::new(RecordingDispatcher::default()));
    let (addr, handle) = spawn_test_server(state).await.expect("spawn server");

    let (status, body) = post_json(addr, "/status", json!({"user_id": 42})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "user_not_allowlisted");

    handle.abort();
}

#[tokio::test]
async fn unit_malformed_payload_returns_bad_request_envelope() {
    let temp = tempdir().expect("tempdir");
    let state = test_state(temp.path(), Arc::new(RecordingDispatcher::default()));
    let (addr, handle) = spawn_test_server(state).await.expect("spawn server");

    let (status, body) = post_json(addr, "/status", json!({"user_id": "not-a-number"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_payload");

    handle.abort();
}

#[tokio::test]
async fn functional_process_tasks_delivers_report_and_returns_totals() {
    let temp = tempdir().expect("tempdir");
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = test_state(temp.path(), dispatcher.clone());
    let (addr, handle) = spawn_test_server(state).await.expect("spawn server");

    let (status, body) = post_json(addr, "/process_tasks", translation_batch()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_time"], "0 hour(s) 1 minute(s)");
    assert_eq!(body["total_payout"], "$0.35");

    let deliveries = dispatcher.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, OPERATOR_ID);
    let report = deliveries[0].1.concat();
    assert!(report.contains("New tasks detected"));
    assert!(report.contains("**Translation**"));

    let table = RateTable::load(&temp.path().join("tasks.csv")).expect("load table");
    let row = table.rate_for("Translation").expect("placeholder row");
    assert_eq!(row.seconds_per_task, Some(25.0));
    assert_eq!(row.dollars_per_task, Some(0.118));

    handle.abort();
}

#[tokio::test]
async fn functional_get_task_stats_flushes_without_delivery() {
    let temp = tempdir().expect("tempdir");
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = test_state(temp.path(), dispatcher.clone());
    let (addr, handle) = spawn_test_server(state).await.expect("spawn server");

    let (status, body) = post_json(addr, "/get_task_stats", translation_batch()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_time"], "0 hour(s) 1 minute(s)");
    assert_eq!(body["total_payout"], "$0.35");
    assert!(dispatcher.deliveries().is_empty());

    let table = RateTable::load(&temp.path().join("tasks.csv")).expect("load table");
    assert!(table.rate_for("Translation").is_some());

    handle.abort();
}

#[tokio::test]
async fn functional_send_signal_repeats_each_message_by_count() {
    let temp = tempdir().expect("tempdir");
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = test_state(temp.path(), dispatcher.clone());
    let (addr, handle) = spawn_test_server(state).await.expect("spawn server");

    let (status, _) = post_json(
        addr,
        "/send_signal",
        json!({
            "user_id": OPERATOR_ID,
            "messages": [
                {"text": "ping", "count": 2},
                {"text": "pong"}
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let deliveries = dispatcher.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(
        deliveries[0].1,
        vec!["ping".to_string(), "ping".to_string(), "pong".to_string()]
    );

    handle.abort();
}

#[tokio::test]
async fn regression_send_signal_validates_messages_before_dispatch() {
    let temp = tempdir().expect("tempdir");
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = test_state(temp.path(), dispatcher.clone());
    let (addr, handle) = spawn_test_server(state).await.expect("spawn server");

    let too_many = json!({
        "user_id": OPERATOR_ID,
        "messages": [{"text": "a"}, {"text": "b"}, {"text": "c"}]
    });
    let (status, body) = post_json(addr, "/send_signal", too_many).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_signal");

    let bad_count = json!({
        "user_id": OPERATOR_ID,
        "messages": [{"text": "a", "count": 10}]
    });
    let (status, _) = post_json(addr, "/send_signal", bad_count).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let long_text = json!({
        "user_id": OPERATOR_ID,
        "messages": [{"text": "x".repeat(121)}]
    });
    let (status, _) = post_json(addr, "/send_signal", long_text).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(dispatcher.deliveries().is_empty());
    handle.abort();
}

#[tokio::test]
async fn regression_delivery_failure_preserves_flushed_rate_rows() {
    let temp = tempdir().expect("tempdir");
    let state = test_state(temp.path(), Arc::new(FailingDispatcher));
    let (addr, handle) = spawn_test_server(state).await.expect("spawn server");

    let (status, body) = post_json(addr, "/process_tasks", translation_batch()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "delivery_failed");

    // Flush happens before delivery: the placeholder row must survive.
    let table = RateTable::load(&temp.path().join("tasks.csv")).expect("load table");
    assert!(table.rate_for("Translation").is_some());

    handle.abort();
}

#[tokio::test]
async fn regression_invalid_batch_does_not_dispatch_or_flush() {
    let temp = tempdir().expect("tempdir");
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = test_state(temp.path(), dispatcher.clone());
    let (addr, handle) = spawn_test_server(state).await.expect("spawn server");

    let (status, body) = post_json(
        addr,
        "/process_tasks",
        json!({
            "user_id": OPERATOR_ID,
            "tasks": {
                "Bad": {"dates": {"2025-01-10": 1}, "taskCount": 0, "time": 90}
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_batch");
    assert!(dispatcher.deliveries().is_empty());
    assert!(!temp.path().join("tasks.csv").exists());

    handle.abort();
}

#[tokio::test]
async fn regression_unauthorized_batch_touches_no_state() {
    let temp = tempdir().expect("tempdir");
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = test_state(temp.path(), dispatcher.clone());
    let (addr, handle) = spawn_test_server(state).await.expect("spawn server");

    let mut body = translation_batch();
    body["user_id"] = json!(999);
    let (status, payload) = post_json(addr, "/process_tasks", body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(payload["error"]["code"], "user_not_allowlisted");
    assert!(dispatcher.deliveries().is_empty());
    assert!(!temp.path().join("tasks.csv").exists());

    handle.abort();
}
