//! Statement execution with fatal-error classification and bounded retry.

use std::time::Duration;

use tracing::warn;

use crate::error::OutputError;
use crate::output::SqlOutput;

/// Message fragments (matched case-insensitively) that indicate the
/// environment, not the data, is broken.
pub const FATAL_PATTERNS: &[&str] = &[
    "out of memory",
    "cannot allocate memory",
    "memory allocation failed",
    "no space left on device",
    "disk full",
    "too many open files",
    "segmentation fault",
    "bus error",
    "killed",
    "can't connect to mysql server",
    "lost connection to mysql server",
    "mysql server has gone away",
    "permission denied",
    "read-only file system",
    "network is unreachable",
    "connection refused",
    "connection timed out",
];

/// Maximum length of an error message in a log line.
const MAX_LOGGED_MESSAGE: usize = 300;

/// Whether an execution error should be retried and, if it persists, end the process.
pub fn is_fatal(message: &str) -> bool {
    let message = message.to_lowercase();
    FATAL_PATTERNS.iter().any(|pattern| message.contains(pattern))
}

/// Collapse whitespace (including newlines) and truncate for single-line logging.
pub fn summarize(message: &str) -> String {
    let collapsed = message.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate(&collapsed, MAX_LOGGED_MESSAGE)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Backoff schedule for fatal execution errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff_unit * 2^n`.
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        self.backoff_unit.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Why a statement did not execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecFailure {
    /// A data or schema error; the event is dropped.
    Dropped(OutputError),
    /// A fatal error that persisted through every retry.
    Exhausted { retries: u32, error: OutputError },
}

/// Execute `sql`, retrying fatal errors with exponential backoff.
///
/// The backoff sleep stalls the caller.
pub async fn execute_with_retry<O: SqlOutput>(
    output: &O,
    sql: &str,
    policy: &RetryPolicy,
) -> Result<(), ExecFailure> {
    let mut retries = 0;

    loop {
        let error = match output.execute(sql).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if !is_fatal(&error.message) {
            return Err(ExecFailure::Dropped(error));
        }

        if retries >= policy.max_retries {
            return Err(ExecFailure::Exhausted { retries, error });
        }

        retries += 1;
        let delay = policy.delay(retries);
        warn!(
            attempt = retries,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %summarize(&error.message),
            "Retrying due to fatal error"
        );
        tokio::time::sleep(delay).await;
    }
}
