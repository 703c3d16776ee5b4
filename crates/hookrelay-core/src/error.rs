use std::path::PathBuf;

use thiserror::Error;

use crate::types::Operation;

/// Boxed error returned by hook units.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in hookrelay-core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("hook script not found. path: {}", .0.display())]
    HookScriptNotFound(PathBuf),

    #[error("invalid hook class {unit}: {source}")]
    InvalidHookClass {
        unit: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid hook type: {0}")]
    InvalidHookType(String),

    #[error("primary key '{0}' not found in record")]
    PrimaryKeyMissing(String),

    #[error("{0} event has no payload")]
    MissingPayload(Operation),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(Operation),

    #[error("schema catalog error ({side}): {message}")]
    Catalog { side: &'static str, message: String },

    #[error("statement execution failed: {0}")]
    Execution(#[from] OutputError),

    #[error("fatal error after {attempts} retries: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: OutputError,
    },

    #[error("event source error: {0}")]
    Source(String),
}

/// Failure reported by the output connection for a single statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct OutputError {
    pub message: String,
}

impl OutputError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
