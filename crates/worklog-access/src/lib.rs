//! Operator allowlist for the Worklog gateway.

pub mod allowlist;

pub use allowlist::AccessPolicy;
