//! The core's error taxonomy.
//!
//! Only the fatal half of the taxonomy gets a shared type: a past-due alarm,
//! a failed startup validation, or a version mismatch all terminate the
//! process the same way, after an error log. The reported-and-continue
//! cases (`real_dir` failure, `sub_dirs` open failure, `exec` fork failure)
//! return an explicit absent/zero result at their own call sites instead,
//! since each has a different natural "nothing happened" value and forcing
//! them through one enum would just be a second layer of unwrapping.

use thiserror::Error;

/// An error that terminates the process.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum CoreError
{
    #[error("failed to open log file: {0}")]
    LogFileOpen(#[from] std::io::Error),

    #[error("failed to create event source: {0}")]
    EventSourceCreate(std::io::Error),

    #[error("startup validation failed: {0}")]
    Startup(String),

    #[error("policy alarm is not strictly after now ({now} vs {alarm})")]
    PastDueAlarm
    {
        /// The result of `now()` when the alarm was queried.
        now: i64,
        /// The alarm time the policy returned.
        alarm: i64,
    },

    #[error("policy version {policy:?} does not match core version {core:?}")]
    VersionMismatch
    {
        /// Version string published by the policy layer.
        policy: String,
        /// Version string compiled into the core.
        core: &'static str,
    },

    #[error("unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}
