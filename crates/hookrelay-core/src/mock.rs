use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::OutputError;
use crate::output::SqlOutput;
use crate::sql::Escape;

/// An in-memory destination connection for testing.
///
/// Records every successful statement and escapes like MySQL with
/// backslash escapes enabled.
#[derive(Clone, Default)]
pub struct MockOutput {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Statements that executed successfully, in order.
    statements: Vec<String>,
    /// Number of `execute` calls, successful or not.
    attempts: usize,
    /// Errors returned by the next calls, front first.
    queued_failures: VecDeque<String>,
    /// If set, every call fails with this error.
    fail_with: Option<String>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock connection on which every statement fails.
    pub fn failing(error_message: impl Into<String>) -> Self {
        let output = Self::new();
        output.state().fail_with = Some(error_message.into());
        output
    }

    /// Fail the next `times` statements with `error_message`.
    pub fn fail_next(&self, error_message: impl Into<String>, times: usize) {
        let message = error_message.into();
        let mut state = self.state();
        state
            .queued_failures
            .extend(std::iter::repeat(message).take(times));
    }

    pub fn statements(&self) -> Vec<String> {
        self.state().statements.clone()
    }

    pub fn attempts(&self) -> usize {
        self.state().attempts
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Escape for MockOutput {
    fn escape(&self, text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '\\' => escaped.push_str("\\\\"),
                '\'' => escaped.push_str("\\'"),
                '"' => escaped.push_str("\\\""),
                '\n' => escaped.push_str("\\n"),
                '\r' => escaped.push_str("\\r"),
                '\0' => escaped.push_str("\\0"),
                other => escaped.push(other),
            }
        }
        escaped
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }
}

impl SqlOutput for MockOutput {
    fn execute(&self, sql: &str) -> impl Future<Output = Result<(), OutputError>> + Send {
        let state = self.state.clone();
        let sql = sql.to_string();
        async move {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.attempts += 1;

            if let Some(error) = state.queued_failures.pop_front() {
                return Err(OutputError::new(error));
            }
            if let Some(ref error) = state.fail_with {
                return Err(OutputError::new(error.clone()));
            }

            state.statements.push(sql);
            Ok(())
        }
    }
}
