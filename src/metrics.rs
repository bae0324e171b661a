//! Run metrics for table-export.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters collected during a run.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Tables exported with at least one row
    pub tables_exported: AtomicU64,
    /// Tables with nothing new
    pub tables_skipped: AtomicU64,
    /// Tables that failed
    pub tables_failed: AtomicU64,
    /// Rows written to artifacts
    pub rows_exported: AtomicU64,
    /// Bytes uploaded
    pub bytes_uploaded: AtomicU64,
    /// Database queries issued
    pub db_queries: AtomicU64,
    /// Uploads performed
    pub uploads: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a table that exported `rows` rows and uploaded `bytes` bytes.
    pub fn record_export(&self, rows: u64, bytes: u64) {
        self.tables_exported.fetch_add(1, Ordering::Relaxed);
        self.rows_exported.fetch_add(rows, Ordering::Relaxed);
        self.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a table with no new rows.
    pub fn record_skip(&self) {
        self.tables_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed table.
    pub fn record_failure(&self) {
        self.tables_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a database query.
    pub fn record_query(&self) {
        self.db_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upload attempt.
    pub fn record_upload(&self) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tables_exported: self.tables_exported.load(Ordering::Relaxed),
            tables_skipped: self.tables_skipped.load(Ordering::Relaxed),
            tables_failed: self.tables_failed.load(Ordering::Relaxed),
            rows_exported: self.rows_exported.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
            db_queries: self.db_queries.load(Ordering::Relaxed),
            uploads: self.uploads.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Tables exported with at least one row
    pub tables_exported: u64,
    /// Tables with nothing new
    pub tables_skipped: u64,
    /// Tables that failed
    pub tables_failed: u64,
    /// Rows written to artifacts
    pub rows_exported: u64,
    /// Bytes uploaded
    pub bytes_uploaded: u64,
    /// Database queries issued
    pub db_queries: u64,
    /// Uploads performed
    pub uploads: u64,
}

impl MetricsSnapshot {
    /// Tables processed, whatever the outcome.
    pub fn tables_total(&self) -> u64 {
        self.tables_exported + self.tables_skipped + self.tables_failed
    }

    /// Rows per second given the run duration.
    pub fn rows_per_second(&self, duration_ms: u64) -> f64 {
        if duration_ms == 0 {
            0.0
        } else {
            (self.rows_exported as f64 * 1000.0) / duration_ms as f64
        }
    }
}

/// Timer for measuring operation duration.
pub struct Timer {
    start: Instant,
    label: String,
}

impl Timer {
    /// Start a new timer.
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            label: label.into(),
        }
    }

    /// Get elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Stop timer and log duration.
    pub fn stop(self) -> u64 {
        let elapsed = self.elapsed_ms();
        tracing::debug!("{} completed in {}ms", self.label, elapsed);
        elapsed
    }
}
