//! HTTP gateway for the Worklog task-report service.

pub mod gateway_handlers;
pub mod gateway_types;
pub mod server_bootstrap;

#[cfg(test)]
mod tests;

pub use gateway_types::{GatewayConfig, GatewayState};
pub use server_bootstrap::{build_gateway_router, run_gateway_server};
