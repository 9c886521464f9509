//! Task-batch aggregation and report rendering for Worklog.
//!
//! Turns a batch of per-task completion records into time and payout totals,
//! resolves unknown tasks against the persisted rate table (staging
//! placeholder rows), and renders the chunk-safe operator report.

pub mod report_aggregator;
pub mod task_batch;

pub use report_aggregator::{
    aggregate_task_batch, process_task_batch, AggregatedReport, ReportError, ReportTotals,
};
pub use task_batch::{DateTally, TaskBatch, TaskBatchEntry, TaskRecord};
