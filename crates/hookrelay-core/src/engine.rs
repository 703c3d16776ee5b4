//! The replication engine: filter, transform, synthesize, execute.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::{Error, Result};
use crate::executor::{execute_with_retry, summarize, ExecFailure, RetryPolicy};
use crate::hook::HookPipeline;
use crate::output::SqlOutput;
use crate::router::Router;
use crate::source::EventSource;
use crate::sql;
use crate::stats::Statistics;
use crate::types::{ChangeEvent, Operation};

/// Lifecycle of a [`ReplicationEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Stopped,
}

/// Why an event was not applied and not counted as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The operation's required payload was absent or empty.
    MissingPayload,
    /// The event type is not insert, update or delete.
    UnsupportedOperation,
}

/// Result of dispatching one event.
#[derive(Debug)]
pub enum EventOutcome {
    /// The statement executed.
    Applied { op: Operation, sql: String },
    /// The event's database or table is out of scope.
    Filtered,
    Skipped(SkipReason),
    /// A per-event error; logged and the event dropped.
    Dropped(Error),
}

/// Why [`ReplicationEngine::run`] returned.
#[derive(Debug)]
pub enum EngineExit {
    /// The source reached end of stream.
    SourceClosed,
    /// A fatal error stopped processing. The process should exit non-zero.
    Fatal(Error),
}

pub struct ReplicationEngine<O> {
    router: Router,
    pipeline: HookPipeline,
    output: O,
    stats: Option<Arc<Statistics>>,
    retry: RetryPolicy,
    log_statements: bool,
    state: EngineState,
}

impl<O: SqlOutput> ReplicationEngine<O> {
    pub fn new(router: Router, pipeline: HookPipeline, output: O) -> Self {
        Self {
            router,
            pipeline,
            output,
            stats: None,
            retry: RetryPolicy::default(),
            log_statements: false,
            state: EngineState::Idle,
        }
    }

    pub fn with_stats(mut self, stats: Arc<Statistics>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Log every statement before executing it.
    pub fn with_statement_logging(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn into_output(self) -> O {
        self.output
    }

    /// Process one event.
    ///
    /// Only a fatal error that survived every retry is returned as `Err`;
    /// every other failure is logged and reported as [`EventOutcome::Dropped`].
    pub async fn dispatch(&mut self, event: &ChangeEvent) -> Result<EventOutcome> {
        let Some(table) = self.router.route(event) else {
            return Ok(EventOutcome::Filtered);
        };

        if event.op == Operation::Other {
            return Ok(EventOutcome::Skipped(SkipReason::UnsupportedOperation));
        }
        let Some(payload) = event.required_payload() else {
            return Ok(EventOutcome::Skipped(SkipReason::MissingPayload));
        };

        let prepared = match event.op {
            Operation::Delete => sql::delete(table, Some(payload), &self.output),
            op => match self.pipeline.apply(&table.table_name, payload.clone()).await {
                Ok(record) => sql::synthesize(
                    op,
                    table,
                    Some(&record),
                    event.old.as_ref(),
                    Some(payload),
                    &self.output,
                ),
                Err(e) => Err(e),
            },
        };

        let statement = match prepared {
            Ok(statement) => statement,
            Err(e) => {
                error!(
                    table = %event.table,
                    operation = %event.op,
                    error = %summarize(&e.to_string()),
                    "Error processing event"
                );
                return Ok(EventOutcome::Dropped(e));
            }
        };

        if self.log_statements {
            info!(table = %event.table, "Executing: {}", statement);
        }

        match execute_with_retry(&self.output, &statement, &self.retry).await {
            Ok(()) => {
                if let Some(stats) = &self.stats {
                    stats.record(&table.table_name, event.op);
                }
                Ok(EventOutcome::Applied {
                    op: event.op,
                    sql: statement,
                })
            }
            Err(ExecFailure::Dropped(e)) => {
                error!(
                    table = %event.table,
                    operation = %event.op,
                    error = %summarize(&e.message),
                    "Query execution failed"
                );
                Ok(EventOutcome::Dropped(Error::Execution(e)))
            }
            Err(ExecFailure::Exhausted { retries, error: e }) => {
                error!(
                    table = %event.table,
                    operation = %event.op,
                    retries,
                    error = %summarize(&e.message),
                    "Unrecoverable error after retries"
                );
                Err(Error::RetriesExhausted {
                    attempts: retries,
                    source: e,
                })
            }
        }
    }

    /// Drain `source` until it ends or a fatal error occurs.
    pub async fn run<S: EventSource>(&mut self, source: &mut S) -> EngineExit {
        self.state = EngineState::Running;
        info!(database = %self.router.database(), tables = self.router.len(), "Replication started");

        let exit = loop {
            let event = match source.next_event().await {
                Ok(Some(event)) => event,
                Ok(None) => break EngineExit::SourceClosed,
                Err(e) => break EngineExit::Fatal(e),
            };

            if let Err(e) = self.dispatch(&event).await {
                break EngineExit::Fatal(e);
            }
        };

        self.state = EngineState::Stopped;
        match &exit {
            EngineExit::SourceClosed => info!("Event source closed"),
            EngineExit::Fatal(e) => error!(error = %e, "Replication stopped"),
        }
        exit
    }
}
