//! Per-shard run counters and the final shard report.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::FailureKind;
use crate::types::JobMode;

/// Live counters for one shard run.
///
/// Logs a progress line roughly every 5% of attempted items so long runs
/// stay observable without flooding the log.
#[derive(Debug)]
pub struct RunStats {
    total: usize,
    succeeded: usize,
    failed: usize,
    skipped: usize,
    not_started: usize,
    rows_written: usize,
    failure_breakdown: HashMap<FailureKind, usize>,
    log_interval: usize,
    started: Instant,
}

impl RunStats {
    /// Start counting for a shard of `total` assigned items.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            not_started: 0,
            rows_written: 0,
            failure_breakdown: HashMap::new(),
            log_interval: (total / 20).max(1),
            started: Instant::now(),
        }
    }

    pub fn record_success(&mut self, rows: usize) {
        self.succeeded += 1;
        self.rows_written += rows;
        self.maybe_log_progress();
    }

    pub fn record_failure(&mut self, kind: FailureKind) {
        self.failed += 1;
        *self.failure_breakdown.entry(kind).or_insert(0) += 1;
        self.maybe_log_progress();
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn record_not_started(&mut self) {
        self.not_started += 1;
    }

    fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }

    fn maybe_log_progress(&self) {
        let attempted = self.attempted();
        if attempted % self.log_interval == 0 {
            info!(
                attempted,
                total = self.total,
                succeeded = self.succeeded,
                failed = self.failed,
                rows = self.rows_written,
                "progress"
            );
        }
    }

    /// Close out the counters into a report.
    pub fn finish(self, mode: JobMode, shard_index: usize, shard_count: usize) -> ShardReport {
        ShardReport {
            mode,
            shard_index,
            shard_count,
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
            skipped: self.skipped,
            not_started: self.not_started,
            rows_written: self.rows_written,
            failure_breakdown: self.failure_breakdown,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Final accounting for one shard run.
#[derive(Debug, Clone)]
pub struct ShardReport {
    pub mode: JobMode,
    pub shard_index: usize,
    pub shard_count: usize,

    /// Items assigned to this shard
    pub total: usize,

    /// Items fetched, extracted, and written
    pub succeeded: usize,

    /// Items that terminally failed (recorded in the ledger, no output rows)
    pub failed: usize,

    /// Items already attempted by an earlier run of this shard
    pub skipped: usize,

    /// Items never started because the deadline arrived first
    pub not_started: usize,

    /// Output rows written across all succeeded items
    pub rows_written: usize,

    /// Failure counts by classified cause
    pub failure_breakdown: HashMap<FailureKind, usize>,

    pub elapsed: Duration,
}

impl ShardReport {
    /// Failed share of attempted items, 0.0 when nothing was attempted.
    pub fn failure_rate(&self) -> f64 {
        let attempted = self.succeeded + self.failed;
        if attempted == 0 {
            return 0.0;
        }
        self.failed as f64 / attempted as f64
    }

    /// Whether every assigned item reached a terminal state this run.
    pub fn is_complete(&self) -> bool {
        self.not_started == 0
    }
}
