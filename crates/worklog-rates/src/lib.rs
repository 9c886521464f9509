//! Persisted per-task rate table and rate resolution for Worklog.
//!
//! The table maps a task name to the seconds credited per completed task and
//! the dollars paid per completed task. Unknown tasks resolve to placeholder
//! values and are appended as new rows pending operator correction.

pub mod rate_resolver;
pub mod rate_table;

pub use rate_resolver::{
    placeholder_entry, resolve_task_rate, ResolvedRate, PLACEHOLDER_DOLLARS_PER_TASK,
    PLACEHOLDER_SECONDS_PER_TASK,
};
pub use rate_table::{RateEntry, RateStoreError, RateTable};
