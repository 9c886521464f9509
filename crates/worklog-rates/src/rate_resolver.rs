use crate::rate_table::{RateEntry, RateTable};

/// Seconds credited per completed task when the stored value is missing.
pub const PLACEHOLDER_SECONDS_PER_TASK: f64 = 25.0;
/// Dollars paid per completed task when the stored value is missing.
pub const PLACEHOLDER_DOLLARS_PER_TASK: f64 = 0.118;

#[derive(Debug, Clone, Copy, PartialEq)]
/// Outcome of resolving one task name against the rate table.
pub struct ResolvedRate {
    pub seconds_per_task: f64,
    pub dollars_per_task: f64,
    /// True when the dollar rate fell back to the placeholder; the caller is
    /// responsible for staging a placeholder row in that case.
    pub is_new: bool,
}

/// Resolves a task name to its time and dollar rates.
///
/// The dollar rate drives `is_new`: an absent row or a blank/unparseable
/// `default_rate` both resolve to the placeholder rate and flag the task as
/// new. The seconds-per-task fallback is independent: a known rate may still
/// carry a placeholder duration, and vice versa.
pub fn resolve_task_rate(table: &RateTable, task_name: &str) -> ResolvedRate {
    let entry = table.rate_for(task_name);
    let stored_dollars = entry.and_then(|row| row.dollars_per_task);
    let seconds_per_task = entry
        .and_then(|row| row.seconds_per_task)
        .unwrap_or(PLACEHOLDER_SECONDS_PER_TASK);
    ResolvedRate {
        seconds_per_task,
        dollars_per_task: stored_dollars.unwrap_or(PLACEHOLDER_DOLLARS_PER_TASK),
        is_new: stored_dollars.is_none(),
    }
}

/// Builds the placeholder row staged for a newly discovered task.
pub fn placeholder_entry(task_name: &str) -> RateEntry {
    RateEntry {
        task_name: task_name.to_string(),
        seconds_per_task: Some(PLACEHOLDER_SECONDS_PER_TASK),
        dollars_per_task: Some(PLACEHOLDER_DOLLARS_PER_TASK),
    }
}
