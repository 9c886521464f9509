//! Gateway server bootstrap and router wiring.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;

use crate::gateway_handlers::{
    handle_get_task_stats, handle_login, handle_process_tasks, handle_send_signal, handle_status,
};
use crate::gateway_types::{
    GatewayState, GET_TASK_STATS_ENDPOINT, LOGIN_ENDPOINT, PROCESS_TASKS_ENDPOINT,
    SEND_SIGNAL_ENDPOINT, STATUS_ENDPOINT,
};

pub fn build_gateway_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route(STATUS_ENDPOINT, post(handle_status))
        .route(LOGIN_ENDPOINT, post(handle_login))
        .route(SEND_SIGNAL_ENDPOINT, post(handle_send_signal))
        .route(PROCESS_TASKS_ENDPOINT, post(handle_process_tasks))
        .route(GET_TASK_STATS_ENDPOINT, post(handle_get_task_stats))
        .with_state(state)
}

/// Binds the configured address and serves until ctrl-c.
pub async fn run_gateway_server(state: Arc<GatewayState>) -> Result<()> {
    let bind_addr = state
        .config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid bind address '{}'", state.config.bind))?;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind gateway server on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound server address")?;

    println!(
        "worklog gateway listening: addr={} rate_table={} allowlisted_operators={}",
        local_addr,
        state.config.rate_table_path.display(),
        state.config.access_policy.len()
    );

    let app = build_gateway_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("gateway server exited unexpectedly")?;
    Ok(())
}
