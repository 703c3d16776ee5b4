use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{BufReader, Stdin};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use hookrelay_config::{resolve, ProjectConfig, ResolvedTables};
use hookrelay_core::{
    spawn_reporter, ChangeEvent, DryRunOutput, EngineExit, EventSource, HookPipeline,
    HookRegistry, JsonLinesSource, ProcessSource, ReplicationEngine, Router, SchemaCatalog,
    SqlOutput, Statistics,
};
use hookrelay_mysql::{new_pool, MysqlOutput, MysqlSchemaProbe};

use crate::env::{retry_policy, statement_logging_enabled};

/// How the pipeline treats the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Execute statements; `force` disables foreign key checks while running.
    Live { force: bool },
    /// Log statements and run hooks with `apply = false`.
    DryRun,
}

impl Mode {
    fn applies(self) -> bool {
        matches!(self, Mode::Live { .. })
    }

    fn forced(self) -> bool {
        matches!(self, Mode::Live { force: true })
    }
}

/// Where events come from: the configured binlog tailer, or stdin.
enum EventInput {
    Process(ProcessSource),
    Stdin(JsonLinesSource<BufReader<Stdin>>),
}

impl EventInput {
    fn open(config: &ProjectConfig) -> Result<Self> {
        match &config.source_process {
            Some(process) => {
                let source = ProcessSource::spawn(&process.command, &process.resolved_args())
                    .context("Failed to start the event source process")?;
                Ok(EventInput::Process(source))
            }
            None => {
                info!("No source_process configured; reading events from stdin");
                Ok(EventInput::Stdin(JsonLinesSource::new(BufReader::new(
                    tokio::io::stdin(),
                ))))
            }
        }
    }

    async fn close(self) {
        if let EventInput::Process(process) = self {
            process.shutdown().await;
        }
    }
}

impl EventSource for EventInput {
    async fn next_event(&mut self) -> hookrelay_core::Result<Option<ChangeEvent>> {
        match self {
            EventInput::Process(source) => source.next_event().await,
            EventInput::Stdin(source) => source.next_event().await,
        }
    }
}

/// Probe both databases and resolve the table rules.
pub async fn load_tables(config: &ProjectConfig, apply: bool) -> Result<ResolvedTables> {
    let source = config.source.resolved();
    let destination = config.destination.resolved();

    let source_probe = MysqlSchemaProbe::new(new_pool(&source), &source.database, "source");
    let dest_probe =
        MysqlSchemaProbe::new(new_pool(&destination), &destination.database, "destination");

    let catalog = SchemaCatalog::build(&source_probe, &dest_probe).await;
    source_probe.close().await;
    dest_probe.close().await;
    let catalog = catalog.context("Failed to build schema catalog")?;
    info!(tables = catalog.len(), "Schema catalog built");

    let resolved = resolve(&config.tables, &catalog, apply).context("Invalid table configuration")?;

    for table in &resolved.duplicates {
        warn!(table = %table, "Table configured more than once; the last rule wins");
    }
    for table in resolved.tables.values().filter(|t| !t.dest_exists) {
        warn!(table = %table.table_name, "Table does not exist on the destination");
    }

    Ok(resolved)
}

/// Run replication until the source ends, a fatal error occurs, or Ctrl-C.
pub async fn run_replication(config: &ProjectConfig, mode: Mode) -> Result<ExitCode> {
    let resolved = load_tables(config, mode.applies()).await?;
    if resolved.tables.is_empty() {
        warn!("No tables selected; every event will be ignored");
    }

    let registry = HookRegistry::new();
    let pipeline = HookPipeline::bind(
        resolved.tables.values(),
        Path::new(&config.hooks.root),
        &registry,
        config.hooks.command.as_deref(),
    );

    let source_db = config.source.resolved().database;
    let router = Router::new(source_db, resolved.tables.into_values());

    let destination = config.destination.resolved();
    let output = MysqlOutput::connect(new_pool(&destination))
        .await
        .context("Failed to connect to the destination database")?;

    let stats = Arc::new(Statistics::new());
    let cancel = CancellationToken::new();
    let reporter = config.stats.enabled.then(|| {
        spawn_reporter(
            stats.clone(),
            Duration::from_secs(config.stats.interval_secs),
            cancel.clone(),
        )
    });

    let mut input = EventInput::open(config)?;

    if mode.forced() {
        output
            .set_foreign_key_checks(false)
            .await
            .context("Failed to disable foreign key checks")?;
    }

    info!(
        mode = ?mode,
        tables = router.len(),
        stats_interval_secs = config.stats.interval_secs,
        "Starting replication"
    );

    let (exit, output) = match mode {
        Mode::DryRun => {
            let engine = build_engine(router, pipeline, DryRunOutput::new(output), &stats);
            let (exit, output) = drive(engine, &mut input).await;
            (exit, output.into_inner())
        }
        Mode::Live { .. } => {
            let engine = build_engine(router, pipeline, output, &stats);
            drive(engine, &mut input).await
        }
    };

    shutdown(ShutdownParts {
        cancel,
        reporter,
        stats: stats.as_ref(),
        stats_enabled: config.stats.enabled,
        forced: mode.forced(),
        output,
        input,
    })
    .await;

    match exit {
        Some(EngineExit::Fatal(e)) => {
            error!(error = %e, "Exiting after fatal error");
            Ok(ExitCode::FAILURE)
        }
        Some(EngineExit::SourceClosed) | None => Ok(ExitCode::SUCCESS),
    }
}

fn build_engine<O: SqlOutput>(
    router: Router,
    pipeline: HookPipeline,
    output: O,
    stats: &Arc<Statistics>,
) -> ReplicationEngine<O> {
    ReplicationEngine::new(router, pipeline, output)
        .with_stats(stats.clone())
        .with_retry(retry_policy())
        .with_statement_logging(statement_logging_enabled())
}

/// Run the engine; `None` means interrupted by Ctrl-C.
async fn drive<O: SqlOutput>(
    mut engine: ReplicationEngine<O>,
    input: &mut EventInput,
) -> (Option<EngineExit>, O) {
    let exit = tokio::select! {
        exit = engine.run(input) => Some(exit),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted; shutting down");
            None
        }
    };
    (exit, engine.into_output())
}

struct ShutdownParts<'a> {
    cancel: CancellationToken,
    reporter: Option<JoinHandle<()>>,
    stats: &'a Statistics,
    stats_enabled: bool,
    forced: bool,
    output: MysqlOutput,
    input: EventInput,
}

/// Stop the reporter, flush the final window, release the foreign key
/// override, and close the source and destination.
async fn shutdown(parts: ShutdownParts<'_>) {
    parts.cancel.cancel();
    if let Some(reporter) = parts.reporter {
        if let Err(e) = reporter.await {
            warn!(error = %e, "Stats reporter ended abnormally");
        }
    }
    if parts.stats_enabled {
        parts.stats.flush();
    }

    if parts.forced {
        if let Err(e) = parts.output.set_foreign_key_checks(true).await {
            error!(error = %e, "Failed to re-enable foreign key checks");
        }
    }

    parts.input.close().await;
    parts.output.close().await;
}
