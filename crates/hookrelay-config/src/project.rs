use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};
use crate::rules::TableRule;

/// Project configuration from hookrelay.toml.
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    /// The database the binlog is read from.
    pub source: DatabaseConfig,
    pub destination: DatabaseConfig,
    #[serde(default)]
    pub hooks: HooksConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    /// The binlog tailer. Without it events are read from stdin.
    #[serde(default)]
    pub source_process: Option<SourceProcessConfig>,
    #[serde(default)]
    pub tables: Vec<TableRule>,
}

impl ProjectConfig {
    /// Parse a project config from a TOML string.
    pub fn parse(toml_str: &str) -> ConfigResult<Self> {
        let config: ProjectConfig = toml::from_str(toml_str)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }
}

/// Connection settings for one MySQL server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
}

fn default_port() -> u16 {
    3306
}

impl DatabaseConfig {
    /// A copy with `${VAR}` references expanded.
    pub fn resolved(&self) -> Self {
        Self {
            host: resolve_env(&self.host),
            port: self.port,
            username: resolve_env(&self.username),
            password: resolve_env(&self.password),
            database: resolve_env(&self.database),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HooksConfig {
    /// Directory hook script paths are relative to.
    #[serde(default = "default_hook_root")]
    pub root: String,
    /// Interpreter used to run hook scripts, e.g. `ruby`.
    #[serde(default)]
    pub command: Option<String>,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            root: default_hook_root(),
            command: None,
        }
    }
}

fn default_hook_root() -> String {
    ".".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_stats_interval")]
    pub interval_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_stats_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_stats_interval() -> u64 {
    3 * 60 * 60
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceProcessConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl SourceProcessConfig {
    pub fn resolved_args(&self) -> Vec<String> {
        self.args.iter().map(|a| resolve_env(a)).collect()
    }
}

/// Resolve environment variables in a string.
/// Supports ${VAR_NAME} syntax; unset variables expand to "".
pub fn resolve_env(s: &str) -> String {
    let mut result = s.to_string();
    let mut search_from = 0;

    while let Some(offset) = result[search_from..].find("${") {
        let start = search_from + offset;
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
        search_from = start + value.len();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const MINIMAL: &str = r#"
[source]
host = "127.0.0.1"
username = "repl"
database = "app"

[destination]
host = "10.0.0.2"
port = 3307
username = "writer"
password = "${HOOKRELAY_TEST_DEST_PASSWORD}"
database = "app_copy"
"#;

    #[test]
    fn test_parse_minimal_uses_defaults() {
        let config = ProjectConfig::parse(MINIMAL).unwrap();

        assert_eq!(config.source.port, 3306);
        assert_eq!(config.source.password, "");
        assert_eq!(config.destination.port, 3307);
        assert_eq!(config.hooks.root, ".");
        assert!(config.hooks.command.is_none());
        assert!(config.stats.enabled);
        assert_eq!(config.stats.interval_secs, 10800);
        assert!(config.source_process.is_none());
        assert!(config.tables.is_empty());
    }

    #[test]
    fn test_parse_full() {
        let toml_str = format!(
            r#"{}
[hooks]
root = "./hooks"
command = "ruby"

[stats]
enabled = false

[source_process]
command = "./maxwell/bin/maxwell"
args = ["--config", "config.properties"]

[[tables]]
table = "*"
table_without = ["audit_log"]

[[tables]]
table = ["users", "orders"]
primary_key = "uuid"

[[tables.hooks]]
row = {{ scripts = ["scrub_row.rb"] }}

[[tables.hooks]]
column = {{ name = ["email", "phone"], scripts = "mask.rb" }}
"#,
            MINIMAL
        );

        let config = ProjectConfig::parse(&toml_str).unwrap();

        assert_eq!(config.hooks.command.as_deref(), Some("ruby"));
        assert!(!config.stats.enabled);
        assert_eq!(config.source_process.unwrap().args.len(), 2);
        assert_eq!(config.tables.len(), 2);
        assert_eq!(config.tables[1].hooks.len(), 2);
        assert_eq!(config.tables[1].primary_key.as_deref(), Some("uuid"));
    }

    #[test]
    fn test_parse_invalid_toml() {
        assert!(matches!(
            ProjectConfig::parse("[source"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ProjectConfig::load(Path::new("/nonexistent/hookrelay.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    #[serial]
    fn test_resolve_env() {
        std::env::set_var("HOOKRELAY_TEST_VAR", "hello");

        assert_eq!(resolve_env("${HOOKRELAY_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env("prefix_${HOOKRELAY_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env("no_vars"), "no_vars");
        assert_eq!(resolve_env("${HOOKRELAY_TEST_UNSET_VAR}x"), "x");

        std::env::remove_var("HOOKRELAY_TEST_VAR");
    }

    #[test]
    #[serial]
    fn test_database_config_resolved() {
        std::env::set_var("HOOKRELAY_TEST_DEST_PASSWORD", "s3cret");

        let config = ProjectConfig::parse(MINIMAL).unwrap();
        let dest = config.destination.resolved();
        assert_eq!(dest.password, "s3cret");
        assert_eq!(dest.host, "10.0.0.2");

        std::env::remove_var("HOOKRELAY_TEST_DEST_PASSWORD");
    }
}
