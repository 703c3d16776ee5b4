use std::future::Future;

use tracing::info;

use crate::error::OutputError;
use crate::sql::Escape;

/// The destination connection as seen by the engine.
pub trait SqlOutput: Escape + Send + Sync {
    /// Execute one statement.
    fn execute(&self, sql: &str) -> impl Future<Output = Result<(), OutputError>> + Send;
}

/// Logs statements instead of executing them.
///
/// Escaping still goes through the wrapped connection so the logged SQL is
/// exactly what a live run would send.
pub struct DryRunOutput<E> {
    inner: E,
}

impl<E> DryRunOutput<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E: Escape> Escape for DryRunOutput<E> {
    fn escape(&self, text: &str) -> String {
        self.inner.escape(text)
    }

    fn quote_identifier(&self, name: &str) -> String {
        self.inner.quote_identifier(name)
    }
}

impl<E: Escape + Send + Sync> SqlOutput for DryRunOutput<E> {
    fn execute(&self, sql: &str) -> impl Future<Output = Result<(), OutputError>> + Send {
        info!("DryRun: {}", sql);
        async { Ok(()) }
    }
}
