use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use hookrelay_core::RetryPolicy;
use tracing::{info, warn};

/// Load .env file from current directory or any parent directory
/// Searches from the current working directory up to the filesystem root,
/// loading the first .env file found.
pub fn load_dotenv_from_ancestors() -> Result<Option<PathBuf>> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;

    let mut current = cwd.as_path();
    loop {
        let env_path = current.join(".env");
        if env_path.exists() {
            dotenvy::from_path(&env_path)
                .with_context(|| format!("Failed to load .env from {}", env_path.display()))?;
            info!("Loaded .env from {}", env_path.display());
            return Ok(Some(env_path));
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => return Ok(None),
        }
    }
}

/// Retries after the first failed attempt of a fatal statement error.
pub fn get_fatal_retries() -> u32 {
    env_or("HOOKRELAY_FATAL_RETRIES", 3)
}

/// Base backoff; retry `n` sleeps `unit * 2^n`.
pub fn get_backoff_unit() -> Duration {
    Duration::from_millis(env_or("HOOKRELAY_BACKOFF_UNIT_MS", 1000))
}

/// Log every statement before it is executed.
pub fn statement_logging_enabled() -> bool {
    std::env::var("HOOKRELAY_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

pub fn retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: get_fatal_retries(),
        backoff_unit: get_backoff_unit(),
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(var = name, value = %raw, "Ignoring unparseable environment override");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_load_dotenv_from_parent_directory() {
        let parent_dir = TempDir::new().unwrap();
        let child_dir = parent_dir.path().join("subdir");
        fs::create_dir(&child_dir).unwrap();

        fs::write(parent_dir.path().join(".env"), "HOOKRELAY_TEST_PARENT=world").unwrap();

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&child_dir).unwrap();
        std::env::remove_var("HOOKRELAY_TEST_PARENT");

        let loaded = load_dotenv_from_ancestors().unwrap();
        assert!(loaded.is_some(), "Should find .env in parent directory");
        assert_eq!(std::env::var("HOOKRELAY_TEST_PARENT").unwrap(), "world");

        std::env::set_current_dir(original_dir).unwrap();
        std::env::remove_var("HOOKRELAY_TEST_PARENT");
    }

    #[test]
    #[serial]
    fn test_load_dotenv_prefers_closest_env_file() {
        let parent_dir = TempDir::new().unwrap();
        let child_dir = parent_dir.path().join("subdir");
        fs::create_dir(&child_dir).unwrap();

        fs::write(parent_dir.path().join(".env"), "HOOKRELAY_TEST_CLOSEST=parent").unwrap();
        fs::write(child_dir.join(".env"), "HOOKRELAY_TEST_CLOSEST=child").unwrap();

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&child_dir).unwrap();
        std::env::remove_var("HOOKRELAY_TEST_CLOSEST");

        load_dotenv_from_ancestors().unwrap();
        assert_eq!(std::env::var("HOOKRELAY_TEST_CLOSEST").unwrap(), "child");

        std::env::set_current_dir(original_dir).unwrap();
        std::env::remove_var("HOOKRELAY_TEST_CLOSEST");
    }

    #[test]
    #[serial]
    fn test_retry_policy_defaults() {
        std::env::remove_var("HOOKRELAY_FATAL_RETRIES");
        std::env::remove_var("HOOKRELAY_BACKOFF_UNIT_MS");

        assert_eq!(retry_policy(), RetryPolicy::default());
    }

    #[test]
    #[serial]
    fn test_retry_policy_overrides() {
        std::env::set_var("HOOKRELAY_FATAL_RETRIES", "5");
        std::env::set_var("HOOKRELAY_BACKOFF_UNIT_MS", "10");

        let policy = retry_policy();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.delay(1), Duration::from_millis(20));

        std::env::set_var("HOOKRELAY_FATAL_RETRIES", "many");
        assert_eq!(get_fatal_retries(), 3);

        std::env::remove_var("HOOKRELAY_FATAL_RETRIES");
        std::env::remove_var("HOOKRELAY_BACKOFF_UNIT_MS");
    }

    #[test]
    #[serial]
    fn test_statement_logging_flag() {
        std::env::set_var("HOOKRELAY_DEBUG", "true");
        assert!(statement_logging_enabled());

        std::env::set_var("HOOKRELAY_DEBUG", "0");
        assert!(!statement_logging_enabled());

        std::env::remove_var("HOOKRELAY_DEBUG");
        assert!(!statement_logging_enabled());
    }
}
