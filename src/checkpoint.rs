//! Per-table high-water marks, persisted as one small text file per table.
//!
//! A checkpoint holds the largest timestamp already exported for a table.
//! An absent or empty file means nothing has been exported yet, in which
//! case [`beginning_of_time`] is used as the query lower bound.
//! Unparseable content is an error: silently falling back to the sentinel
//! would re-export the whole table history.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CHECKPOINT_SUFFIX: &str = "_last_run.txt";
const LOCK_FILE: &str = ".table-export.lock";

/// The value used when no export has happened yet: `0001-01-01T00:00:00`.
pub fn beginning_of_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

/// Render a timestamp as ISO-8601; fractional seconds only when non-zero.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

/// Parse an ISO-8601 timestamp (`T` or space separated, optional fraction,
/// optional offset). Offsets are normalised to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    raw.parse::<NaiveDateTime>()
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.naive_utc()))
}

/// Flat-file checkpoint store.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Open the store, creating its directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!("Checkpoint directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Directory holding the checkpoint files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the checkpoint file for `table`.
    pub fn path_for(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}{}", table, CHECKPOINT_SUFFIX))
    }

    /// Read the checkpoint, or the sentinel if none was stored.
    pub fn read(&self, table: &str) -> Result<NaiveDateTime> {
        Ok(self.stored(table)?.unwrap_or_else(beginning_of_time))
    }

    /// Read the checkpoint, `None` if absent or empty.
    pub fn stored(&self, table: &str) -> Result<Option<NaiveDateTime>> {
        let path = self.path_for(table);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        parse_timestamp(trimmed).map(Some).ok_or_else(|| {
            Error::checkpoint(
                table,
                format!(
                    "cannot parse '{}' in {}; fix or delete the file",
                    trimmed,
                    path.display()
                ),
            )
        })
    }

    /// Overwrite the checkpoint.
    ///
    /// The value goes to a sibling temp file first and is renamed into
    /// place, so a crash mid-write never leaves a truncated checkpoint.
    pub fn write(&self, table: &str, ts: &NaiveDateTime) -> Result<()> {
        let path = self.path_for(table);
        let tmp = self.dir.join(format!(".{}{}.tmp", table, CHECKPOINT_SUFFIX));

        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(format_timestamp(ts).as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        debug!("Checkpoint for {} set to {}", table, format_timestamp(ts));
        Ok(())
    }

    /// Forget the checkpoint so the next run exports the whole table.
    ///
    /// Returns whether a checkpoint existed.
    pub fn reset(&self, table: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(table)) {
            Ok(()) => {
                info!("Checkpoint for {} removed", table);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Take the run lock in this directory.
    pub fn lock(&self) -> Result<RunLock> {
        RunLock::acquire(self.dir.join(LOCK_FILE))
    }
}

/// Exclusive hold on the run lock file.
///
/// The hold is an advisory lock on the open file, so the kernel releases it
/// when the process exits for any reason. A lock file left behind by a
/// crashed run does not block the next one.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    // Closing the file releases the lock.
    _file: File,
}

impl RunLock {
    /// Open the lock file and take an exclusive lock without waiting.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            let contended = e.kind() == ErrorKind::WouldBlock
                || e.raw_os_error() == fs4::lock_contended_error().raw_os_error();
            return if contended {
                Err(Error::Locked { path })
            } else {
                Err(e.into())
            };
        }

        file.set_len(0)?;
        writeln!(
            file,
            "pid={} started={}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        )?;
        file.flush()?;
        debug!("Acquired run lock {}", path.display());
        Ok(Self { path, _file: file })
    }

    /// Lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
