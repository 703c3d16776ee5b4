pub mod catalog;
pub mod engine;
pub mod error;
pub mod executor;
pub mod hook;
pub mod mock;
pub mod output;
pub mod router;
pub mod source;
pub mod sql;
pub mod stats;
pub mod table;
pub mod types;

pub use catalog::{SchemaCatalog, SchemaProbe, TableInfo};
pub use engine::{EngineExit, EngineState, EventOutcome, ReplicationEngine, SkipReason};
pub use error::{BoxError, Error, OutputError, Result};
pub use executor::{execute_with_retry, is_fatal, ExecFailure, RetryPolicy, FATAL_PATTERNS};
pub use hook::{unit_name, FnHook, Hook, HookInput, HookPipeline, HookRegistry, ScriptHook};
pub use mock::MockOutput;
pub use output::{DryRunOutput, SqlOutput};
pub use router::Router;
pub use source::{EventSource, JsonLinesSource, ProcessSource};
pub use sql::{synthesize, Escape};
pub use stats::{spawn_reporter, OpCounts, Statistics, StatsWindow};
pub use table::{HookScope, HookSpec, TableConfig, DEFAULT_PRIMARY_KEY};
pub use types::{ChangeEvent, Operation, RowMap, Value};
