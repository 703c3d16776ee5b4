use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::catalog::TableInfo;
use crate::error::Error;

/// Primary key column used unless a rule overrides it.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Whether a hook transforms a whole record or a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookScope {
    Row,
    Column,
}

impl HookScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookScope::Row => "row",
            HookScope::Column => "column",
        }
    }
}

impl fmt::Display for HookScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "row" => Ok(HookScope::Row),
            "column" => Ok(HookScope::Column),
            other => Err(Error::InvalidHookType(other.to_string())),
        }
    }
}

/// A single hook declaration bound to one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSpec {
    pub scope: HookScope,
    /// Target column; set iff `scope` is `Column`.
    pub column_name: Option<String>,
    /// Script path relative to the hook root directory.
    pub script: String,
    /// False in dry-run mode.
    pub apply: bool,
}

impl HookSpec {
    pub fn row(script: impl Into<String>, apply: bool) -> Self {
        Self {
            scope: HookScope::Row,
            column_name: None,
            script: script.into(),
            apply,
        }
    }

    pub fn column(column: impl Into<String>, script: impl Into<String>, apply: bool) -> Self {
        Self {
            scope: HookScope::Column,
            column_name: Some(column.into()),
            script: script.into(),
            apply,
        }
    }
}

/// Resolved replication settings for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub table_name: String,
    pub primary_key: String,
    /// Applied in declaration order.
    pub hooks: Vec<HookSpec>,
    pub source_exists: bool,
    pub dest_exists: bool,
    pub source_columns: BTreeSet<String>,
    pub dest_columns: BTreeSet<String>,
}

impl TableConfig {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            hooks: Vec::new(),
            source_exists: false,
            dest_exists: false,
            source_columns: BTreeSet::new(),
            dest_columns: BTreeSet::new(),
        }
    }

    /// Start from a catalog entry, carrying over its existence flags and columns.
    pub fn from_info(info: &TableInfo) -> Self {
        Self {
            table_name: info.name.clone(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            hooks: Vec::new(),
            source_exists: info.source_exists,
            dest_exists: info.dest_exists,
            source_columns: info.source_columns.clone(),
            dest_columns: info.dest_columns.clone(),
        }
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn with_hooks(mut self, hooks: Vec<HookSpec>) -> Self {
        self.hooks = hooks;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_scope_parse() {
        assert_eq!("row".parse::<HookScope>().unwrap(), HookScope::Row);
        assert_eq!("column".parse::<HookScope>().unwrap(), HookScope::Column);

        let err = "cell".parse::<HookScope>().unwrap_err();
        assert!(matches!(err, Error::InvalidHookType(ref s) if s == "cell"));
    }

    #[test]
    fn test_table_config_defaults() {
        let config = TableConfig::new("users");
        assert_eq!(config.primary_key, "id");
        assert!(config.hooks.is_empty());

        let config = config.with_primary_key("user_id");
        assert_eq!(config.primary_key, "user_id");
    }
}
