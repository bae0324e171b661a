//! Run orchestration for table-export.
//!
//! A run takes the lock, builds the storage client, connects to the
//! database, then exports each configured table in order:
//! load checkpoint, query, serialize, upload, persist checkpoint, clean up.
//! Setup failures abort the run; failures inside a table are logged and
//! the run moves on to the next table.

use crate::artifact::ArtifactWriter;
use crate::checkpoint::{CheckpointStore, RunLock, beginning_of_time, format_timestamp};
use crate::config::{ExportConfig, TableSpec};
use crate::error::Result;
use crate::metrics::{Metrics, MetricsSnapshot, Timer};
use crate::source::{PostgresSource, RowSource};
use crate::storage::{UploadedObject, Uploader};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Outcome of one table in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    /// New rows were exported and uploaded
    Exported,
    /// Nothing newer than the checkpoint
    Skipped,
    /// Disabled in configuration
    Disabled,
    /// Failed; checkpoint unchanged
    Failed,
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableStatus::Exported => write!(f, "exported"),
            TableStatus::Skipped => write!(f, "skipped"),
            TableStatus::Disabled => write!(f, "disabled"),
            TableStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Per-table result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableReport {
    /// Table name
    pub table: String,
    /// Outcome
    pub status: TableStatus,
    /// Rows exported
    pub rows: usize,
    /// Checkpoint before the run, if one was stored
    pub previous_checkpoint: Option<String>,
    /// Checkpoint written by this run
    pub new_checkpoint: Option<String>,
    /// Remote object key
    pub object_key: Option<String>,
    /// Remote object location
    pub location: Option<String>,
    /// Bytes uploaded
    pub bytes: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Error message if failed
    pub error: Option<String>,
}

impl TableReport {
    fn new(table: &str, status: TableStatus) -> Self {
        Self {
            table: table.to_string(),
            status,
            rows: 0,
            previous_checkpoint: None,
            new_checkpoint: None,
            object_key: None,
            location: None,
            bytes: 0,
            duration_ms: 0,
            error: None,
        }
    }
}

/// Result of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// No table failed
    pub success: bool,
    /// Per-table results, in processing order
    pub tables: Vec<TableReport>,
    /// Counters
    pub metrics: MetricsSnapshot,
    /// Total duration in milliseconds
    pub duration_ms: u64,
    /// Timestamp when the run completed
    pub completed_at: String,
    /// Error message if any table failed
    pub error: Option<String>,
}

impl RunReport {
    /// Total rows exported.
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }

    /// Tables that failed.
    pub fn failed_tables(&self) -> impl Iterator<Item = &TableReport> {
        self.tables
            .iter()
            .filter(|t| t.status == TableStatus::Failed)
    }

    /// Report for a table.
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }
}

/// Pending work for one table, as shown by `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTable {
    /// Table name
    pub table: String,
    /// Stored checkpoint
    pub checkpoint: Option<String>,
    /// Rows newer than the checkpoint
    pub pending_rows: Option<i64>,
    /// Error message if the table could not be inspected
    pub error: Option<String>,
}

/// Progress callback.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Progress update.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Current table
    pub table: String,
    /// Current phase
    pub phase: ExportPhase,
}

/// Per-table phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    /// Reading the checkpoint
    LoadingCheckpoint,
    /// Querying the source
    Querying,
    /// Writing the artifact
    Serializing,
    /// Uploading the artifact
    Uploading,
    /// Persisting the new checkpoint
    Checkpointing,
    /// Exported
    Completed,
    /// Nothing to export
    Skipped,
    /// Failed
    Failed,
}

impl std::fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportPhase::LoadingCheckpoint => write!(f, "loading checkpoint"),
            ExportPhase::Querying => write!(f, "querying"),
            ExportPhase::Serializing => write!(f, "serializing"),
            ExportPhase::Uploading => write!(f, "uploading"),
            ExportPhase::Checkpointing => write!(f, "checkpointing"),
            ExportPhase::Completed => write!(f, "completed"),
            ExportPhase::Skipped => write!(f, "skipped"),
            ExportPhase::Failed => write!(f, "failed"),
        }
    }
}

enum TableOutcome {
    Skipped {
        previous: Option<NaiveDateTime>,
    },
    Exported {
        previous: Option<NaiveDateTime>,
        checkpoint: NaiveDateTime,
        rows: usize,
        uploaded: UploadedObject,
    },
}

/// Exports configured tables from a [`RowSource`] into object storage.
pub struct ExportRunner<S: RowSource> {
    source: S,
    uploader: Uploader,
    checkpoints: CheckpointStore,
    artifacts: ArtifactWriter,
    tables: Vec<TableSpec>,
    timestamp_column: String,
    metrics: Metrics,
    clock: fn() -> NaiveDateTime,
    progress_callback: Option<Arc<ProgressCallback>>,
}

impl ExportRunner<PostgresSource> {
    /// Build the storage client, then connect to the database.
    ///
    /// Either failure is fatal: nothing table-specific has happened yet.
    pub async fn connect(config: &ExportConfig) -> Result<Self> {
        let uploader = Uploader::connect(&config.storage)?;
        let source = PostgresSource::connect(config.database.clone()).await?;
        Self::new(config, source, uploader)
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.source.close().await;
    }
}

impl<S: RowSource> ExportRunner<S> {
    /// Create a runner over an already connected source and uploader.
    pub fn new(config: &ExportConfig, source: S, uploader: Uploader) -> Result<Self> {
        Ok(Self {
            source,
            uploader,
            checkpoints: CheckpointStore::open(&config.export.checkpoint_dir)?,
            artifacts: ArtifactWriter::open(&config.export.export_dir)?,
            tables: config.tables.clone(),
            timestamp_column: config.export.timestamp_column.clone(),
            metrics: Metrics::new(),
            clock: local_now,
            progress_callback: None,
        })
    }

    /// Set progress callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ExportProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(Box::new(callback)));
        self
    }

    /// Replace the wall clock used to name artifacts.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Checkpoint store used by this runner.
    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Give back the source.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Test connectivity to the database and the bucket.
    pub async fn test_connectivity(&self) -> Result<()> {
        info!("Testing connectivity...");

        self.source.ping().await?;
        info!("Database: OK");

        self.uploader.ping().await?;
        info!("Object storage: OK");

        Ok(())
    }

    /// Checkpoint and pending row count per enabled table.
    pub async fn pending(&self) -> Vec<PendingTable> {
        let mut pending = Vec::new();

        for table in self.tables.iter().filter(|t| t.enabled) {
            let column = table.timestamp_column(&self.timestamp_column);
            let result = match self.checkpoints.stored(&table.name) {
                Ok(stored) => {
                    let since = stored.unwrap_or_else(beginning_of_time);
                    self.metrics.record_query();
                    self.source
                        .count_since(&table.name, column, since)
                        .await
                        .map(|count| (stored, count))
                }
                Err(e) => Err(e),
            };

            pending.push(match result {
                Ok((stored, count)) => PendingTable {
                    table: table.name.clone(),
                    checkpoint: stored.as_ref().map(format_timestamp),
                    pending_rows: Some(count),
                    error: None,
                },
                Err(e) => PendingTable {
                    table: table.name.clone(),
                    checkpoint: None,
                    pending_rows: None,
                    error: Some(e.to_string()),
                },
            });
        }

        pending
    }

    /// Export every configured table, isolating per-table failures.
    #[instrument(skip(self), fields(tables = self.tables.len()))]
    pub async fn run(&self) -> RunReport {
        let timer = Timer::start("export run");
        info!("Starting export of {} tables", self.tables.len());

        let mut reports = Vec::with_capacity(self.tables.len());
        for table in &self.tables {
            if !table.enabled {
                info!("Skipping disabled table: {}", table.name);
                reports.push(TableReport::new(&table.name, TableStatus::Disabled));
                continue;
            }

            info!("--- Processing table: {} ---", table.name);
            let table_timer = Timer::start(format!("table {}", table.name));

            let mut report = match self.export_table(table).await {
                Ok(TableOutcome::Skipped { previous }) => {
                    self.metrics.record_skip();
                    self.report_progress(&table.name, ExportPhase::Skipped);
                    TableReport {
                        previous_checkpoint: previous.as_ref().map(format_timestamp),
                        new_checkpoint: previous.as_ref().map(format_timestamp),
                        ..TableReport::new(&table.name, TableStatus::Skipped)
                    }
                }
                Ok(TableOutcome::Exported {
                    previous,
                    checkpoint,
                    rows,
                    uploaded,
                }) => {
                    self.metrics.record_export(rows as u64, uploaded.bytes);
                    self.report_progress(&table.name, ExportPhase::Completed);
                    TableReport {
                        rows,
                        previous_checkpoint: previous.as_ref().map(format_timestamp),
                        new_checkpoint: Some(format_timestamp(&checkpoint)),
                        bytes: uploaded.bytes,
                        object_key: Some(uploaded.key),
                        location: Some(uploaded.location),
                        ..TableReport::new(&table.name, TableStatus::Exported)
                    }
                }
                Err(e) => {
                    self.metrics.record_failure();
                    self.report_progress(&table.name, ExportPhase::Failed);
                    error!(
                        table = %table.name,
                        code = e.code(),
                        "Error processing {}: {}",
                        table.name,
                        e
                    );
                    TableReport {
                        error: Some(e.to_string()),
                        ..TableReport::new(&table.name, TableStatus::Failed)
                    }
                }
            };
            report.duration_ms = table_timer.stop();
            reports.push(report);
        }

        let failed: Vec<&str> = reports
            .iter()
            .filter(|t| t.status == TableStatus::Failed)
            .map(|t| t.table.as_str())
            .collect();
        let error = (!failed.is_empty())
            .then(|| format!("{} table(s) failed: {}", failed.len(), failed.join(", ")));
        let failed = failed.len();
        let report = RunReport {
            success: failed == 0,
            tables: reports,
            metrics: self.metrics.snapshot(),
            duration_ms: timer.stop(),
            completed_at: chrono::Utc::now().to_rfc3339(),
            error,
        };

        if report.success {
            info!(
                "All tables processed in {}ms. Rows exported: {}",
                report.duration_ms,
                report.total_rows()
            );
        } else {
            warn!(
                "Export finished with errors in {}ms. Rows exported: {}, failed tables: {}",
                report.duration_ms,
                report.total_rows(),
                failed
            );
        }

        report
    }

    /// Export one table.
    #[instrument(skip(self, table), fields(table = %table.name))]
    async fn export_table(&self, table: &TableSpec) -> Result<TableOutcome> {
        let column = table.timestamp_column(&self.timestamp_column);

        self.report_progress(&table.name, ExportPhase::LoadingCheckpoint);
        let previous = self.checkpoints.stored(&table.name)?;
        let since = previous.unwrap_or_else(beginning_of_time);

        self.report_progress(&table.name, ExportPhase::Querying);
        self.metrics.record_query();
        let batch = self.source.fetch_since(&table.name, column, since).await?;

        let Some(checkpoint) = batch.high_water_mark() else {
            info!("No new data to export.");
            return Ok(TableOutcome::Skipped { previous });
        };
        info!("Fetched {} rows newer than {}", batch.len(), format_timestamp(&since));

        self.report_progress(&table.name, ExportPhase::Serializing);
        let artifact = self.artifacts.write(&batch, &(self.clock)())?;

        self.report_progress(&table.name, ExportPhase::Uploading);
        self.metrics.record_upload();
        // On failure the artifact stays on disk for manual recovery.
        let uploaded = self.uploader.upload(&table.name, &artifact).await?;

        self.report_progress(&table.name, ExportPhase::Checkpointing);
        self.checkpoints.write(&table.name, &checkpoint)?;
        info!("High-water mark for {} is now {}", table.name, format_timestamp(&checkpoint));

        if let Err(e) = artifact.remove() {
            warn!(
                "Exported {} but could not remove {}: {}",
                table.name,
                artifact.path.display(),
                e
            );
        }

        Ok(TableOutcome::Exported {
            previous,
            checkpoint,
            rows: batch.len(),
            uploaded,
        })
    }

    /// Report progress via callback.
    fn report_progress(&self, table: &str, phase: ExportPhase) {
        if let Some(ref callback) = self.progress_callback {
            callback(ExportProgress {
                table: table.to_string(),
                phase,
            });
        }
    }
}

/// Startup steps shared by every run: take the lock, then report and prune
/// leftover artifacts. The returned lock must be held until the run ends.
pub fn prepare_run(config: &ExportConfig) -> Result<Option<RunLock>> {
    let checkpoints = CheckpointStore::open(&config.export.checkpoint_dir)?;
    let lock = if config.export.run_lock {
        Some(checkpoints.lock()?)
    } else {
        None
    };

    let retention = config.export.artifact_retention()?;
    match ArtifactWriter::open(&config.export.export_dir).and_then(|a| a.prune(retention)) {
        Ok(0) => {}
        Ok(removed) => info!("Deleted {} stale artifact(s)", removed),
        Err(e) => warn!("Could not inspect leftover artifacts: {}", e),
    }

    info!("{} of {} tables enabled", config.enabled_tables().count(), config.tables.len());
    Ok(lock)
}

/// Run a complete export: lock, storage, database, tables, close.
pub async fn run_export(
    config: ExportConfig,
    progress: Option<ProgressCallback>,
) -> Result<RunReport> {
    let _lock = prepare_run(&config)?;

    let mut runner = ExportRunner::connect(&config).await?;
    if let Some(callback) = progress {
        runner.progress_callback = Some(Arc::new(callback));
    }

    let report = runner.run().await;
    runner.close().await;

    Ok(report)
}

/// Local wall-clock time, which names artifacts.
fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(ExportPhase::LoadingCheckpoint.to_string(), "loading checkpoint");
        assert_eq!(ExportPhase::Completed.to_string(), "completed");
    }

    #[test]
    fn test_run_report_totals() {
        let report = RunReport {
            success: false,
            tables: vec![
                TableReport {
                    rows: 3,
                    ..TableReport::new("orders", TableStatus::Exported)
                },
                TableReport::new("users", TableStatus::Failed),
                TableReport::new("payouts", TableStatus::Skipped),
            ],
            metrics: MetricsSnapshot::default(),
            duration_ms: 10,
            completed_at: "2024-01-03T00:00:00Z".to_string(),
            error: Some("1 table(s) failed".to_string()),
        };

        assert_eq!(report.total_rows(), 3);
        assert_eq!(report.failed_tables().count(), 1);
        assert_eq!(report.table("payouts").unwrap().status, TableStatus::Skipped);
    }

    #[test]
    fn test_table_status_serializes_lowercase() {
        let json = serde_json::to_string(&TableStatus::Exported).unwrap();
        assert_eq!(json, "\"exported\"");
    }
}
