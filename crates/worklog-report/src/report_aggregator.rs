use std::path::Path;

use chrono::NaiveDate;
use thiserror::Error;

use worklog_core::format_seconds;
use worklog_rates::{
    placeholder_entry, resolve_task_rate, RateStoreError, RateTable,
    PLACEHOLDER_DOLLARS_PER_TASK, PLACEHOLDER_SECONDS_PER_TASK,
};

use crate::task_batch::TaskBatch;

const TASK_DATE_FORMAT: &str = "%Y-%m-%d";
const REPORT_DATE_FORMAT: &str = "%d %b %Y";

/// Error raised while aggregating a task batch.
///
/// Validation failures reject the whole batch before any table mutation;
/// storage failures discard the in-memory aggregation because the new-task
/// invariant cannot be upheld without a successful flush.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid task batch: {0}")]
    Validation(String),
    #[error(transparent)]
    Storage(#[from] RateStoreError),
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Totals derived from one batch; computed fresh per request, never persisted.
pub struct ReportTotals {
    pub total_task_count: i64,
    pub total_time_seconds: i64,
    pub total_payout: f64,
    /// Task counts grouped by dollar rate, in first-encounter rate order.
    pub per_rate_task_counts: Vec<(f64, i64)>,
    /// Task names that resolved to the placeholder rate, in batch order.
    pub new_task_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
/// Rendered report plus the totals and display strings the caller returns.
pub struct AggregatedReport {
    pub totals: ReportTotals,
    pub report_text: String,
    pub total_time_display: String,
    pub total_payout_display: String,
}

struct ValidatedTask<'a> {
    task_name: &'a str,
    dates: Vec<NaiveDate>,
    task_count: i64,
}

/// Loads the rate table, aggregates `batch`, and flushes the table when new
/// tasks were discovered.
///
/// The flush happens before any delivery attempt so newly discovered rates
/// are never lost to a downstream failure.
pub fn process_task_batch(
    table_path: &Path,
    batch: &TaskBatch,
) -> Result<AggregatedReport, ReportError> {
    let mut table = RateTable::load(table_path)?;
    let report = aggregate_task_batch(&mut table, batch)?;
    if !report.totals.new_task_names.is_empty() {
        table.flush(table_path)?;
    }
    Ok(report)
}

/// Aggregates `batch` against an in-memory table.
///
/// Validates the whole batch up front, then walks it in payload order:
/// resolves each task's rate, stages placeholder rows for new tasks,
/// accumulates totals and per-rate groupings, and renders the report text.
pub fn aggregate_task_batch(
    table: &mut RateTable,
    batch: &TaskBatch,
) -> Result<AggregatedReport, ReportError> {
    let validated = validate_task_batch(batch)?;

    let mut totals = ReportTotals::default();
    let mut task_lines = String::new();
    let mut min_date: Option<NaiveDate> = None;
    let mut max_date: Option<NaiveDate> = None;

    for task in &validated {
        for date in &task.dates {
            min_date = Some(min_date.map_or(*date, |current| current.min(*date)));
            max_date = Some(max_date.map_or(*date, |current| current.max(*date)));
        }

        let resolved = resolve_task_rate(table, task.task_name);
        if resolved.is_new {
            totals.new_task_names.push(task.task_name.to_string());
            table.upsert_placeholder(placeholder_entry(task.task_name));
        }

        let task_time = (task.task_count as f64 * resolved.seconds_per_task).floor() as i64;
        let task_payout = task.task_count as f64 * resolved.dollars_per_task;

        totals.total_task_count += task.task_count;
        totals.total_time_seconds += task_time;
        totals.total_payout += task_payout;
        tally_per_rate(
            &mut totals.per_rate_task_counts,
            resolved.dollars_per_task,
            task.task_count,
        );

        let dates_display = task
            .dates
            .iter()
            .map(|date| date.format(REPORT_DATE_FORMAT).to_string())
            .collect::<Vec<_>>()
            .join(", ");
        task_lines.push_str(&format!(
            "🔧 Task: **{}**, Dates: {}, Tasks completed: {}, Fixed RPH: {:.2} seconds, Task rate: ${:.3},\n\
             ⏰ Total time for this task: {},\n\
             💰 Estimated Payout: ${:.2}.\n\n",
            task.task_name,
            dates_display,
            task.task_count,
            resolved.seconds_per_task,
            resolved.dollars_per_task,
            format_seconds(task_time),
            task_payout,
        ));
    }

    let mut report_text = String::new();
    if let (Some(min_date), Some(max_date)) = (min_date, max_date) {
        report_text.push_str(&format!(
            "🗓️ Report Date Range: {} - {}\n\n",
            min_date.format(REPORT_DATE_FORMAT),
            max_date.format(REPORT_DATE_FORMAT),
        ));
    }
    report_text.push_str(&task_lines);

    if !batch.is_empty() {
        for (rate, count) in &totals.per_rate_task_counts {
            report_text.push_str(&format!(
                "📝 Total tasks completed at ${rate:.3}: **{count}**\n"
            ));
        }
        report_text.push_str(&format!(
            "📝 Total tasks completed: **{}**\n",
            totals.total_task_count
        ));
        report_text.push_str(&format!(
            "⏱️ Total time spent: **{}**.\n",
            format_seconds(totals.total_time_seconds)
        ));
        report_text.push_str(&format!(
            "💰 Estimated total payout: **${:.2}**.\n",
            totals.total_payout
        ));
    }

    if !totals.new_task_names.is_empty() {
        let named = totals
            .new_task_names
            .iter()
            .map(|name| format!("**{name}**"))
            .collect::<Vec<_>>()
            .join(", ");
        report_text.push_str(&format!(
            "🆕 New tasks detected. Please update the time per task and task rate in 'tasks.csv': {named}"
        ));
        report_text.push_str(&format!(
            "\n✅ A placeholder time per task of {} seconds and task rate of ${} has been added.\n",
            PLACEHOLDER_SECONDS_PER_TASK as i64, PLACEHOLDER_DOLLARS_PER_TASK,
        ));
    }

    let total_time_display = format_seconds(totals.total_time_seconds);
    let total_payout_display = format!("${:.2}", totals.total_payout);
    Ok(AggregatedReport {
        totals,
        report_text,
        total_time_display,
        total_payout_display,
    })
}

/// Checks every record before anything is resolved or mutated.
fn validate_task_batch(batch: &TaskBatch) -> Result<Vec<ValidatedTask<'_>>, ReportError> {
    let mut validated = Vec::with_capacity(batch.len());
    for entry in batch.entries() {
        let record = &entry.record;
        if record.task_count <= 0 || record.time_seconds <= 0 {
            return Err(ReportError::Validation(format!(
                "task '{}': task count and time must be positive",
                entry.task_name
            )));
        }
        let mut dates = Vec::with_capacity(record.dates.len());
        for tally in &record.dates {
            let date = NaiveDate::parse_from_str(tally.date.as_str(), TASK_DATE_FORMAT).map_err(
                |_| {
                    ReportError::Validation(format!(
                        "task '{}': unparseable date '{}' (expected YYYY-MM-DD)",
                        entry.task_name, tally.date
                    ))
                },
            )?;
            dates.push(date);
        }
        validated.push(ValidatedTask {
            task_name: entry.task_name.as_str(),
            dates,
            task_count: record.task_count,
        });
    }
    Ok(validated)
}

fn tally_per_rate(per_rate: &mut Vec<(f64, i64)>, rate: f64, task_count: i64) {
    for (existing_rate, count) in per_rate.iter_mut() {
        if existing_rate.to_bits() == rate.to_bits() {
            *count += task_count;
            return;
        }
    }
    per_rate.push((rate, task_count));
}
