mod bootstrap_helpers;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use worklog_access::AccessPolicy;
use worklog_discord::{DiscordDispatcherConfig, DiscordDmDispatcher};
use worklog_gateway::{run_gateway_server, GatewayConfig, GatewayState};

use crate::bootstrap_helpers::init_tracing;

#[derive(Debug, Parser)]
#[command(name = "worklog", about = "Task aggregation and payout report gateway")]
struct CliArgs {
    /// Address the HTTP gateway binds to.
    #[arg(long, env = "WORKLOG_BIND", default_value = "0.0.0.0:8080")]
    bind: String,

    /// Path of the persisted rate table CSV.
    #[arg(long, env = "WORKLOG_RATE_TABLE", default_value = "tasks.csv")]
    rate_table: PathBuf,

    /// Comma-separated operator ids allowed to use the service.
    #[arg(long, env = "AUTHORIZED_USER_ID", default_value = "")]
    allowed_user_ids: String,

    /// Discord bot token used for DM delivery.
    #[arg(long, env = "DISCORD_BOT_TOKEN", hide_env_values = true)]
    discord_bot_token: String,

    /// Discord REST API base URL.
    #[arg(
        long,
        env = "WORKLOG_DISCORD_API_BASE",
        default_value = "https://discord.com/api/v10"
    )]
    discord_api_base: String,

    /// Outbound HTTP timeout in milliseconds.
    #[arg(long, env = "WORKLOG_HTTP_TIMEOUT_MS", default_value_t = 10_000)]
    http_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = CliArgs::parse();

    let access_policy = AccessPolicy::from_id_list(args.allowed_user_ids.as_str());
    if access_policy.is_empty() {
        tracing::warn!("allowlist is empty; every request will be rejected");
    }

    let dispatcher = DiscordDmDispatcher::new(DiscordDispatcherConfig {
        api_base: args.discord_api_base,
        bot_token: args.discord_bot_token,
        http_timeout_ms: args.http_timeout_ms,
    })?;

    let state = Arc::new(GatewayState::new(
        GatewayConfig {
            bind: args.bind,
            rate_table_path: args.rate_table,
            access_policy,
        },
        Arc::new(dispatcher),
    ));
    run_gateway_server(state).await
}
