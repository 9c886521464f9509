use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;

/// Hard per-message character cap imposed by the Discord API.
pub const DISCORD_MESSAGE_MAX_CHARS: usize = 2_000;

const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

/// Splits `text` into contiguous chunks of at most `max_chars` characters.
///
/// Concatenating the result reconstructs the input exactly; split points may
/// fall inside words because the transport cap is a raw length limit. Text
/// that already fits (including the empty string) yields exactly one chunk.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for ch in text.chars() {
        current.push(ch);
        current_len += 1;
        if current_len >= max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[derive(Debug, Clone)]
/// Connection settings for the Discord DM dispatcher.
pub struct DiscordDispatcherConfig {
    pub api_base: String,
    pub bot_token: String,
    pub http_timeout_ms: u64,
}

impl Default for DiscordDispatcherConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_DISCORD_API_BASE.to_string(),
            bot_token: String::new(),
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Receipt for one delivered chunk.
pub struct DeliveryReceipt {
    pub chunk_index: usize,
    pub chunk_count: usize,
    pub provider_message_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Outcome of a successful delivery: every chunk accepted, in order.
pub struct DeliveryResult {
    pub dm_channel_id: String,
    pub receipts: Vec<DeliveryReceipt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Structured delivery failure with a stable reason code.
pub struct DeliveryError {
    pub reason_code: String,
    pub detail: String,
    pub retryable: bool,
    pub http_status: Option<u16>,
    pub chunk_index: usize,
    pub chunk_count: usize,
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "delivery failed ({}) at chunk {}/{}: {}",
            self.reason_code,
            self.chunk_index + 1,
            self.chunk_count.max(1),
            self.detail
        )
    }
}

impl std::error::Error for DeliveryError {}

/// Ordered-chunk delivery capability consumed by the gateway.
#[async_trait]
pub trait ReportDispatcher: Send + Sync {
    /// Delivers `chunks` in order to the recipient's private channel,
    /// stopping at the first failure.
    async fn deliver(
        &self,
        recipient_id: u64,
        chunks: &[String],
    ) -> Result<DeliveryResult, DeliveryError>;
}

/// Delivers report chunks over the Discord REST API: one DM-channel creation
/// call, then one message POST per chunk.
#[derive(Debug)]
pub struct DiscordDmDispatcher {
    config: DiscordDispatcherConfig,
    client: reqwest::Client,
}

impl DiscordDmDispatcher {
    pub fn new(config: DiscordDispatcherConfig) -> Result<Self, DeliveryError> {
        if config.bot_token.trim().is_empty() {
            return Err(delivery_config_error(
                "delivery_missing_bot_token",
                "Discord outbound requires a bot token",
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms.max(1)))
            .build()
            .map_err(|error| {
                delivery_config_error("delivery_client_init_failed", error.to_string())
            })?;
        Ok(Self { config, client })
    }

    async fn create_dm_channel(&self, recipient_id: u64) -> Result<String, DeliveryError> {
        let endpoint = format!(
            "{}/users/@me/channels",
            self.config.api_base.trim_end_matches('/')
        );
        let payload = self
            .post_json(
                endpoint.as_str(),
                &json!({ "recipient_id": recipient_id.to_string() }),
                0,
                0,
            )
            .await?;
        payload
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DeliveryError {
                reason_code: "delivery_malformed_dm_channel".to_string(),
                detail: "DM channel response did not carry a channel id".to_string(),
                retryable: false,
                http_status: None,
                chunk_index: 0,
                chunk_count: 0,
            })
    }

    async fn post_json(
        &self,
        endpoint: &str,
        body: &Value,
        chunk_index: usize,
        chunk_count: usize,
    ) -> Result<Value, DeliveryError> {
        let response = self
            .client
            .post(endpoint)
            .header(
                "Authorization",
                format!("Bot {}", self.config.bot_token.trim()),
            )
            .json(body)
            .send()
            .await
            .map_err(|error| DeliveryError {
                reason_code: "delivery_transport_error".to_string(),
                detail: error.without_url().to_string(),
                retryable: true,
                http_status: None,
                chunk_index,
                chunk_count,
            })?;
        let status = response.status();
        if !status.is_success() {
            let (reason_code, retryable) = classify_provider_status(status);
            return Err(DeliveryError {
                reason_code: reason_code.to_string(),
                detail: format!("provider returned HTTP {}", status.as_u16()),
                retryable,
                http_status: Some(status.as_u16()),
                chunk_index,
                chunk_count,
            });
        }
        response.json::<Value>().await.map_err(|error| DeliveryError {
            reason_code: "delivery_malformed_response".to_string(),
            detail: error.without_url().to_string(),
            retryable: false,
            http_status: Some(status.as_u16()),
            chunk_index,
            chunk_count,
        })
    }
}

#[async_trait]
impl ReportDispatcher for DiscordDmDispatcher {
    async fn deliver(
        &self,
        recipient_id: u64,
        chunks: &[String],
    ) -> Result<DeliveryResult, DeliveryError> {
        let dm_channel_id = self.create_dm_channel(recipient_id).await?;
        let endpoint = format!(
            "{}/channels/{}/messages",
            self.config.api_base.trim_end_matches('/'),
            dm_channel_id
        );

        let chunk_count = chunks.len();
        let mut receipts = Vec::new();
        for (chunk_index, chunk) in chunks.iter().enumerate() {
            // An empty report still resolves the DM channel but posts nothing.
            if chunk.is_empty() {
                continue;
            }
            let payload = self
                .post_json(
                    endpoint.as_str(),
                    &json!({ "content": chunk }),
                    chunk_index,
                    chunk_count,
                )
                .await?;
            receipts.push(DeliveryReceipt {
                chunk_index,
                chunk_count,
                provider_message_id: payload
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
        debug!(
            recipient_id,
            chunk_count,
            delivered = receipts.len(),
            "delivered report chunks to DM channel"
        );
        Ok(DeliveryResult {
            dm_channel_id,
            receipts,
        })
    }
}

fn classify_provider_status(status: StatusCode) -> (&'static str, bool) {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ("delivery_rate_limited", true);
    }
    if status.is_server_error() {
        return ("delivery_provider_unavailable", true);
    }
    if status.is_client_error() {
        return ("delivery_request_rejected", false);
    }
    ("delivery_unknown_http_failure", true)
}

fn delivery_config_error(reason_code: &str, detail: impl Into<String>) -> DeliveryError {
    DeliveryError {
        reason_code: reason_code.to_string(),
        detail: detail.into(),
        retryable: false,
        http_status: None,
        chunk_index: 0,
        chunk_count: 0,
    }
}
