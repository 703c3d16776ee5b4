//! Change event sources.

use std::future::Future;
use std::process::Stdio;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::ChangeEvent;

/// A stream of change events.
pub trait EventSource: Send {
    /// The next event, or `None` once the stream has ended.
    fn next_event(&mut self) -> impl Future<Output = Result<Option<ChangeEvent>>> + Send;
}

/// Reads one JSON event per line.
///
/// Blank lines and lines that do not parse as an event are skipped.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    skipped: u64,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            skipped: 0,
        }
    }

    /// Number of lines skipped as unparseable so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<R: AsyncBufRead + Unpin + Send> EventSource for JsonLinesSource<R> {
    async fn next_event(&mut self) -> Result<Option<ChangeEvent>> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| Error::Source(e.to_string()))?;

            let Some(line) = line else {
                return Ok(None);
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match ChangeEvent::from_json(line) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    self.skipped += 1;
                    debug!(error = %e, "Skipping unparseable event line");
                }
            }
        }
    }
}

/// Spawns the binlog tailer and reads events from its stdout.
pub struct ProcessSource {
    child: Child,
    events: JsonLinesSource<BufReader<ChildStdout>>,
}

impl ProcessSource {
    pub fn spawn(program: &str, args: &[String]) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Source(format!("failed to spawn {}: {}", program, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Source("source process has no stdout".into()))?;

        info!(program = %program, pid = ?child.id(), "Started event source process");

        Ok(Self {
            child,
            events: JsonLinesSource::new(BufReader::new(stdout)),
        })
    }

    /// Stop the source process.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(error = %e, "Failed to stop event source process");
        }
    }
}

impl EventSource for ProcessSource {
    async fn next_event(&mut self) -> Result<Option<ChangeEvent>> {
        self.events.next_event().await
    }
}
