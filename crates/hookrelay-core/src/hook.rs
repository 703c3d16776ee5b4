//! Hook units and the per-table hook pipeline.
//!
//! A hook is identified by a script path relative to the hook root. Its unit
//! name is the camel-cased file stem (`mask_email.rb` -> `MaskEmail`). At
//! startup every declared hook is bound either to a native unit registered
//! under that name, or to a [`ScriptHook`] that runs the script as a child
//! process speaking JSON over stdin/stdout.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{BoxError, Error, Result};
use crate::table::{HookScope, HookSpec, TableConfig};
use crate::types::{RowMap, Value};

/// What a hook unit is invoked with.
#[derive(Debug, Clone, PartialEq)]
pub enum HookInput {
    /// The whole record; the unit returns a replacement object.
    Row(RowMap),
    /// One column; the unit returns the replacement value.
    Column { name: String, value: Value },
}

/// A transformation unit.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Run the unit. `apply` is false during dry runs.
    async fn execute(&self, apply: bool, input: HookInput) -> std::result::Result<Value, BoxError>;
}

/// A hook that wraps a function.
pub struct FnHook<F>
where
    F: Fn(bool, HookInput) -> std::result::Result<Value, BoxError> + Send + Sync,
{
    func: F,
}

impl<F> FnHook<F>
where
    F: Fn(bool, HookInput) -> std::result::Result<Value, BoxError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> Hook for FnHook<F>
where
    F: Fn(bool, HookInput) -> std::result::Result<Value, BoxError> + Send + Sync,
{
    async fn execute(&self, apply: bool, input: HookInput) -> std::result::Result<Value, BoxError> {
        (self.func)(apply, input)
    }
}

/// Runs a hook script as a child process.
///
/// The request is written to stdin as one JSON object:
/// `{"unit", "scope", "apply", "record"}` for row hooks or
/// `{"unit", "scope", "apply", "column", "value"}` for column hooks.
/// The script prints the resulting JSON value on stdout. The child is killed
/// if the invocation is dropped before it exits.
pub struct ScriptHook {
    path: PathBuf,
    unit: String,
    interpreter: Option<String>,
}

impl ScriptHook {
    pub fn new(path: impl Into<PathBuf>, unit: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            unit: unit.into(),
            interpreter: None,
        }
    }

    /// Run the script through an interpreter command (e.g. `ruby`, `bundle exec ruby`).
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    fn command(&self) -> Command {
        let mut parts = self
            .interpreter
            .as_deref()
            .map(|i| i.split_whitespace().collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter();

        let mut command = match parts.next() {
            Some(program) => {
                let mut command = Command::new(program);
                command.args(parts).arg(&self.path);
                command
            }
            None => Command::new(&self.path),
        };
        command.arg(&self.unit).kill_on_drop(true);
        command
    }

    fn request(&self, apply: bool, input: HookInput) -> serde_json::Value {
        match input {
            HookInput::Row(record) => serde_json::json!({
                "unit": self.unit,
                "scope": "row",
                "apply": apply,
                "record": serde_json::Value::from(Value::Object(record)),
            }),
            HookInput::Column { name, value } => serde_json::json!({
                "unit": self.unit,
                "scope": "column",
                "apply": apply,
                "column": name,
                "value": serde_json::Value::from(value),
            }),
        }
    }
}

#[async_trait]
impl Hook for ScriptHook {
    async fn execute(&self, apply: bool, input: HookInput) -> std::result::Result<Value, BoxError> {
        let payload = serde_json::to_vec(&self.request(apply, input))?;

        // Stdin is piped to avoid argument length limits on large records
        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to spawn hook script: {}", e))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A script that exits without reading its input reports through its exit status
            if let Err(e) = stdin.write_all(&payload).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(format!("failed to write to hook stdin: {}", e).into());
                }
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| format!("failed to run hook script: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("hook script exited with {}: {}", output.status, stderr.trim()).into());
        }

        let result: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| format!("failed to parse hook result: {}", e))?;
        Ok(Value::from(result))
    }
}

/// Native hook units keyed by unit name.
#[derive(Default, Clone)]
pub struct HookRegistry {
    units: HashMap<String, Arc<dyn Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, unit: impl Into<String>, hook: Arc<dyn Hook>) -> &mut Self {
        self.units.insert(unit.into(), hook);
        self
    }

    pub fn register_fn<F>(&mut self, unit: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(bool, HookInput) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.register(unit, Arc::new(FnHook::new(func)))
    }

    pub fn get(&self, unit: &str) -> Option<Arc<dyn Hook>> {
        self.units.get(unit).cloned()
    }
}

/// Derive the unit name from a script path: file stem, camel-cased on `_`.
pub fn unit_name(script: &Path) -> String {
    let stem = script
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    stem.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

struct BoundHook {
    spec: HookSpec,
    path: PathBuf,
    unit_name: String,
    unit: Arc<dyn Hook>,
}

impl BoundHook {
    async fn run(&self, record: RowMap) -> Result<RowMap> {
        if !self.path.exists() {
            return Err(Error::HookScriptNotFound(self.path.clone()));
        }

        match self.spec.scope {
            HookScope::Row => match self.invoke(HookInput::Row(record)).await? {
                Value::Object(replacement) => Ok(replacement),
                other => Err(Error::InvalidHookClass {
                    unit: self.unit_name.clone(),
                    source: format!("row hook returned {:?} instead of an object", other).into(),
                }),
            },
            HookScope::Column => {
                let Some(column) = self.spec.column_name.as_deref() else {
                    return Err(Error::InvalidHookType(
                        "column hook without a column name".into(),
                    ));
                };
                let mut record = record;
                let value = record.get(column).cloned().unwrap_or(Value::Null);
                let replacement = self
                    .invoke(HookInput::Column {
                        name: column.to_string(),
                        value,
                    })
                    .await?;
                record.insert(column.to_string(), replacement);
                Ok(record)
            }
        }
    }

    async fn invoke(&self, input: HookInput) -> Result<Value> {
        self.unit
            .execute(self.spec.apply, input)
            .await
            .map_err(|source| Error::InvalidHookClass {
                unit: self.unit_name.clone(),
                source,
            })
    }
}

/// Hook chains for every configured table, bound at startup.
#[derive(Default)]
pub struct HookPipeline {
    chains: HashMap<String, Vec<BoundHook>>,
}

impl HookPipeline {
    /// Bind every table's hooks to their units.
    ///
    /// Native units from `registry` take precedence; any other hook runs its
    /// script as a child process, through `interpreter` when given.
    pub fn bind<'a>(
        tables: impl IntoIterator<Item = &'a TableConfig>,
        root: &Path,
        registry: &HookRegistry,
        interpreter: Option<&str>,
    ) -> Self {
        let mut chains = HashMap::new();

        for table in tables {
            let chain: Vec<BoundHook> = table
                .hooks
                .iter()
                .map(|spec| {
                    let path = root.join(&spec.script);
                    let unit_name = unit_name(&path);
                    let unit: Arc<dyn Hook> = match registry.get(&unit_name) {
                        Some(native) => native,
                        None => {
                            let script = ScriptHook::new(&path, &unit_name);
                            match interpreter {
                                Some(i) => Arc::new(script.with_interpreter(i)),
                                None => Arc::new(script),
                            }
                        }
                    };

                    if !path.exists() {
                        warn!(
                            table = %table.table_name,
                            path = %path.display(),
                            "Hook script not found; events for this table will fail until it exists"
                        );
                    }

                    BoundHook {
                        spec: spec.clone(),
                        path,
                        unit_name,
                        unit,
                    }
                })
                .collect();

            debug!(table = %table.table_name, hooks = chain.len(), "Bound hook chain");
            chains.insert(table.table_name.clone(), chain);
        }

        Self { chains }
    }

    /// Run `record` through the table's hooks in declaration order.
    pub async fn apply(&self, table: &str, record: RowMap) -> Result<RowMap> {
        let Some(chain) = self.chains.get(table) else {
            return Ok(record);
        };

        let mut record = record;
        for hook in chain {
            record = hook.run(record).await?;
        }
        Ok(record)
    }

    /// Number of hooks bound for `table`.
    pub fn len(&self, table: &str) -> usize {
        self.chains.get(table).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) {
        fs::write(dir.path().join(name), "").unwrap();
    }

    fn record(pairs: &[(&str, Value)]) -> RowMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_unit_name() {
        assert_eq!(unit_name(Path::new("hooks/mask_email.rb")), "MaskEmail");
        assert_eq!(unit_name(Path::new("scrub.py")), "Scrub");
        assert_eq!(unit_name(Path::new("a/b/add_created__at")), "AddCreatedAt");
    }

    #[tokio::test]
    async fn test_column_hook_replaces_single_column() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "mask_email.rb");

        let mut registry = HookRegistry::new();
        registry.register_fn("MaskEmail", |_, input| match input {
            HookInput::Column { value, .. } => {
                let email = value.as_str().unwrap_or_default();
                let domain = email.split('@').nth(1).unwrap_or_default();
                Ok(Value::String(format!("***@{}", domain)))
            }
            HookInput::Row(_) => Err("expected column input".into()),
        });

        let table = TableConfig::new("users")
            .with_hooks(vec![HookSpec::column("email", "mask_email.rb", true)]);
        let pipeline = HookPipeline::bind([&table], dir.path(), &registry, None);

        let out = pipeline
            .apply(
                "users",
                record(&[
                    ("id", Value::Int(1)),
                    ("email", "alice@example.com".into()),
                ]),
            )
            .await
            .unwrap();

        assert_eq!(out.get("email"), Some(&Value::String("***@example.com".into())));
        assert_eq!(out.get("id"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn test_row_hook_substitutes_record_and_chains_in_order() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "drop_secret.rb");
        touch(&dir, "upcase_name.rb");

        let mut registry = HookRegistry::new();
        registry.register_fn("DropSecret", |_, input| match input {
            HookInput::Row(mut row) => {
                row.shift_remove("secret");
                Ok(Value::Object(row))
            }
            _ => Err("expected row input".into()),
        });
        registry.register_fn("UpcaseName", |_, input| match input {
            HookInput::Column { value, .. } => {
                Ok(Value::String(value.as_str().unwrap_or_default().to_uppercase()))
            }
            _ => Err("expected column input".into()),
        });

        let table = TableConfig::new("users").with_hooks(vec![
            HookSpec::row("drop_secret.rb", true),
            HookSpec::column("name", "upcase_name.rb", true),
        ]);
        let pipeline = HookPipeline::bind([&table], dir.path(), &registry, None);
        assert_eq!(pipeline.len("users"), 2);

        let out = pipeline
            .apply(
                "users",
                record(&[("name", "bob".into()), ("secret", "x".into())]),
            )
            .await
            .unwrap();

        assert!(!out.contains_key("secret"));
        assert_eq!(out.get("name"), Some(&Value::String("BOB".into())));
    }

    #[tokio::test]
    async fn test_apply_flag_is_passed_through() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "spy.rb");

        let seen = Arc::new(AtomicBool::new(true));
        let seen_in_hook = seen.clone();
        let mut registry = HookRegistry::new();
        registry.register_fn("Spy", move |apply, input| {
            seen_in_hook.store(apply, Ordering::SeqCst);
            match input {
                HookInput::Row(row) => Ok(Value::Object(row)),
                HookInput::Column { value, .. } => Ok(value),
            }
        });

        let table = TableConfig::new("t").with_hooks(vec![HookSpec::row("spy.rb", false)]);
        let pipeline = HookPipeline::bind([&table], dir.path(), &registry, None);
        pipeline.apply("t", RowMap::new()).await.unwrap();

        assert!(!seen.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_missing_script_fails_per_invocation() {
        let dir = TempDir::new().unwrap();
        let table = TableConfig::new("t").with_hooks(vec![HookSpec::row("missing.rb", true)]);
        let pipeline = HookPipeline::bind([&table], dir.path(), &HookRegistry::new(), None);

        let err = pipeline.apply("t", RowMap::new()).await.unwrap_err();
        match err {
            Error::HookScriptNotFound(path) => assert!(path.ends_with("missing.rb")),
            other => panic!("expected HookScriptNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_hook_failure_keeps_cause() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "broken.rb");

        let mut registry = HookRegistry::new();
        registry.register_fn("Broken", |_, _| Err("undefined method `foo'".into()));

        let table = TableConfig::new("t").with_hooks(vec![HookSpec::row("broken.rb", true)]);
        let pipeline = HookPipeline::bind([&table], dir.path(), &registry, None);

        let err = pipeline.apply("t", RowMap::new()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidHookClass { ref unit, .. } if unit == "Broken"));
        assert!(err.to_string().contains("undefined method"));
    }

    #[tokio::test]
    async fn test_row_hook_must_return_object() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "nothing.rb");

        let mut registry = HookRegistry::new();
        registry.register_fn("Nothing", |_, _| Ok(Value::Null));

        let table = TableConfig::new("t").with_hooks(vec![HookSpec::row("nothing.rb", true)]);
        let pipeline = HookPipeline::bind([&table], dir.path(), &registry, None);

        assert!(matches!(
            pipeline.apply("t", RowMap::new()).await,
            Err(Error::InvalidHookClass { .. })
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_table_passes_through() {
        let pipeline = HookPipeline::default();
        let row = record(&[("id", Value::Int(7))]);
        assert_eq!(pipeline.apply("other", row.clone()).await.unwrap(), row);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_hook_round_trip() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("redact.sh"),
            "#!/bin/sh\ncat > /dev/null\necho '\"[redacted]\"'\n",
        )
        .unwrap();

        let table = TableConfig::new("t")
            .with_hooks(vec![HookSpec::column("ssn", "redact.sh", true)]);
        let pipeline = HookPipeline::bind([&table], dir.path(), &HookRegistry::new(), Some("sh"));

        let out = pipeline
            .apply("t", record(&[("ssn", "123-45-6789".into())]))
            .await
            .unwrap();
        assert_eq!(out.get("ssn"), Some(&Value::String("[redacted]".into())));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_hook_nonzero_exit_is_invalid_hook_class() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("explode.sh"),
            "#!/bin/sh\ncat > /dev/null\necho 'boom' >&2\nexit 3\n",
        )
        .unwrap();

        let table = TableConfig::new("t").with_hooks(vec![HookSpec::row("explode.sh", true)]);
        let pipeline = HookPipeline::bind([&table], dir.path(), &HookRegistry::new(), Some("sh"));

        let err = pipeline.apply("t", RowMap::new()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidHookClass { ref unit, .. } if unit == "Explode"));
        assert!(err.to_string().contains("boom"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_script_hook_yields_to_the_runtime() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("stall.sh"), "#!/bin/sh
sleep 30
").unwrap();

        let table = TableConfig::new("t").with_hooks(vec![HookSpec::row("stall.sh", true)]);
        let pipeline = HookPipeline::bind([&table], dir.path(), &HookRegistry::new(), Some("sh"));

        let start = std::time::Instant::now();
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            pipeline.apply("t", RowMap::new()),
        )
        .await;

        assert!(result.is_err(), "a running hook must not block the timer");
        assert!(start.elapsed() < std::time::Duration::from_secs(10));
    }
}
