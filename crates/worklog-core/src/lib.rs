//! Foundational low-level utilities shared across Worklog crates.
//!
//! Provides atomic file-write helpers and the time formatting used by
//! rate-table persistence and report rendering.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{current_unix_timestamp, format_seconds};
