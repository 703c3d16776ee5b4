//! Windowed operation counters.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::types::Operation;

/// Counts per operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OpCounts {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
}

impl OpCounts {
    fn bump(&mut self, op: Operation) {
        match op {
            Operation::Insert => self.inserts += 1,
            Operation::Update => self.updates += 1,
            Operation::Delete => self.deletes += 1,
            Operation::Other => {}
        }
    }

    pub fn total(&self) -> u64 {
        self.inserts + self.updates + self.deletes
    }
}

impl fmt::Display for OpCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[ins:{} | upd:{} | del:{}]",
            self.inserts, self.updates, self.deletes
        )
    }
}

/// Counters accumulated since the last flush.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatsWindow {
    pub total: OpCounts,
    pub by_table: BTreeMap<String, OpCounts>,
}

impl StatsWindow {
    pub fn is_empty(&self) -> bool {
        self.total.total() == 0
    }

    /// Render the window as report lines: the total first, then one line per table.
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.by_table.len() + 1);
        lines.push(format!("STATS | Total{}", self.total));
        for (table, counts) in &self.by_table {
            lines.push(format!("STATS | {}{}", table, counts));
        }
        lines
    }
}

/// Shared statistics for successfully applied statements.
#[derive(Debug, Default)]
pub struct Statistics {
    window: Mutex<StatsWindow>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one applied statement.
    pub fn record(&self, table: &str, op: Operation) {
        let mut window = self.window();
        window.total.bump(op);
        window.by_table.entry(table.to_string()).or_default().bump(op);
    }

    pub fn snapshot(&self) -> StatsWindow {
        self.window().clone()
    }

    /// Take the current window and start a fresh one.
    pub fn snapshot_and_reset(&self) -> StatsWindow {
        std::mem::take(&mut *self.window())
    }

    /// Log the current window and reset it.
    pub fn flush(&self) {
        for line in self.snapshot_and_reset().report_lines() {
            info!("{}", line);
        }
    }

    fn window(&self) -> MutexGuard<'_, StatsWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Flush `stats` every `interval` until `cancel` fires.
pub fn spawn_reporter(
    stats: Arc<Statistics>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => stats.flush(),
            }
        }
    })
}
