use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading configuration or resolving table rules.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("hook for table '{table}' must declare 'row' or 'column'")]
    MissingHookType { table: String },

    #[error("hook for table '{table}' declares more than one of 'row' and 'column'")]
    AmbiguousHook { table: String },

    #[error("invalid hook type '{scope}' for table '{table}': expected row or column")]
    InvalidHookType { table: String, scope: String },

    #[error("{scope} hook for table '{table}' requires non-empty 'scripts'")]
    MissingScripts { table: String, scope: String },

    #[error("column hook for table '{table}' requires non-empty 'name'")]
    MissingColumnNames { table: String },

    #[error("table rule has an empty 'table' selector")]
    EmptySelector,
}

pub type ConfigResult<T> = Result<T, ConfigError>;
