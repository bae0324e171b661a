//! # Table Export
//!
//! Incremental export of PostgreSQL tables to CSV files in cloud object storage.
//!
//! ## Features
//!
//! - **High-water marks**: each table's largest exported timestamp is kept in a
//!   checkpoint file and used as the lower bound of the next query
//! - **Failure isolation**: one bad table never stops the others
//! - **At-least-once**: checkpoints move only after a confirmed upload, so a
//!   crash re-exports a window instead of losing it
//! - **Storage backends**: Google Cloud Storage, S3 and a local directory
//! - **Run lock**: overlapping runs are refused
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use table_export::{ExportConfig, run_export};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExportConfig::from_env()?;
//!     let report = run_export(config, None).await?;
//!
//!     println!("Exported {} rows", report.total_rows());
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Tables
//!
//! ```rust,no_run
//! use table_export::{ExportConfig, TableSpec};
//!
//! # fn main() -> table_export::Result<()> {
//! let config = ExportConfig::builder()
//!     .db_host("localhost")
//!     .db_user("exporter")
//!     .db_name("shop")
//!     .bucket("shop-exports")
//!     .table(TableSpec::new("orders"))
//!     .table(TableSpec::new("audit.events").with_timestamp_column("recorded_at"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod artifact;
pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod export;
pub mod metrics;
pub mod source;
pub mod storage;

// Re-exports for convenience
pub use artifact::{Artifact, ArtifactWriter};
pub use batch::{ExportBatch, ExportRecord};
pub use checkpoint::{CheckpointStore, RunLock};
pub use config::{ExportConfig, ExportConfigBuilder, StorageProvider, TableSpec};
pub use error::{Error, Result};
pub use export::{
    ExportPhase, ExportProgress, ExportRunner, RunReport, TableReport, TableStatus, prepare_run,
    run_export,
};
pub use source::{PostgresSource, RowSource};
pub use storage::{UploadedObject, Uploader};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
