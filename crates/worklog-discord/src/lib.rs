//! Discord DM delivery for Worklog reports.
//!
//! Splits a rendered report into transport-sized chunks and posts them, in
//! order, to the operator's DM channel. The gateway depends only on the
//! [`ReportDispatcher`] seam, so tests substitute doubles freely.

pub mod discord_outbound;

pub use discord_outbound::{
    chunk_text, DeliveryError, DeliveryReceipt, DeliveryResult, DiscordDispatcherConfig,
    DiscordDmDispatcher, ReportDispatcher, DISCORD_MESSAGE_MAX_CHARS,
};
