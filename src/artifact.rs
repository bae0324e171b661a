//! Local CSV artifacts written before upload.

use crate::batch::ExportBatch;
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// A serialized export file on local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Full path
    pub path: PathBuf,
    /// File name, also the last segment of the object key
    pub file_name: String,
    /// Data rows written (header excluded)
    pub rows: usize,
}

impl Artifact {
    /// Delete the local file.
    pub fn remove(&self) -> Result<()> {
        fs::remove_file(&self.path)?;
        debug!("Removed local artifact {}", self.path.display());
        Ok(())
    }
}

/// `<table>_<YYYY-MM-DD>_<HHMMSS>.csv`
pub fn artifact_file_name(table: &str, created_at: &NaiveDateTime) -> String {
    format!("{}_{}.csv", table, created_at.format("%Y-%m-%d_%H%M%S"))
}

/// Write header and rows of `batch` as CSV to any writer.
pub fn write_csv<W: Write>(batch: &ExportBatch, writer: W) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(writer);

    csv.write_record(&batch.columns)
        .map_err(|e| Error::serialization("Failed to write CSV header", e))?;

    for row in &batch.rows {
        csv.write_record(row.values.iter().map(|v| v.as_deref().unwrap_or("")))
            .map_err(|e| Error::serialization("Failed to write CSV row", e))?;
    }

    csv.flush()?;
    Ok(())
}

/// Writes artifacts into one directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    /// Open the export directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Export directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serialize `batch` to `<dir>/<table>_<date>_<time>.csv`.
    pub fn write(&self, batch: &ExportBatch, created_at: &NaiveDateTime) -> Result<Artifact> {
        let file_name = artifact_file_name(&batch.table, created_at);
        let path = self.dir.join(&file_name);

        let file = fs::File::create(&path)?;
        if let Err(e) = write_csv(batch, std::io::BufWriter::new(file)) {
            // Drop the partial file.
            let _ = fs::remove_file(&path);
            return Err(e);
        }

        info!("Exported {} rows to {}", batch.len(), path.display());
        Ok(Artifact {
            path,
            file_name,
            rows: batch.len(),
        })
    }

    /// Leftover `.csv` files, typically from failed uploads.
    pub fn leftovers(&self) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }

    /// Report leftover artifacts and delete those older than `retention`.
    ///
    /// Returns the number of files deleted.
    pub fn prune(&self, retention: Option<Duration>) -> Result<usize> {
        let leftovers = self.leftovers()?;
        if leftovers.is_empty() {
            return Ok(0);
        }

        let Some(retention) = retention else {
            warn!(
                "{} artifact(s) from earlier runs remain in {}",
                leftovers.len(),
                self.dir.display()
            );
            return Ok(0);
        };

        let now = SystemTime::now();
        let mut removed = 0;
        for path in leftovers {
            let age = fs::metadata(&path)?
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            if age >= retention {
                fs::remove_file(&path)?;
                info!("Deleted stale artifact {}", path.display());
                removed += 1;
            } else {
                warn!("Artifact from an earlier run kept: {}", path.display());
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::ExportRecord;
    use chrono::NaiveDate;

    fn ts(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn batch() -> ExportBatch {
        let mut batch = ExportBatch::new(
            "orders",
            vec!["id".into(), "note".into(), "updated_at".into()],
        );
        batch
            .push(ExportRecord::new(
                vec![
                    Some("1".into()),
                    Some("plain".into()),
                    Some("2024-01-01 00:00:00".into()),
                ],
                ts(1, 0, 0, 0),
            ))
            .unwrap();
        batch
            .push(ExportRecord::new(
                vec![
                    Some("2".into()),
                    Some("comma, \"quote\"\nnewline".into()),
                    Some("2024-01-02 00:00:00".into()),
                ],
                ts(2, 0, 0, 0),
            ))
            .unwrap();
        batch
            .push(ExportRecord::new(
                vec![Some("3".into()), None, Some("2024-01-03 00:00:00".into())],
                ts(3, 0, 0, 0),
            ))
            .unwrap();
        batch
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(
            artifact_file_name("orders", &ts(3, 7, 5, 9)),
            "orders_2024-01-03_070509.csv"
        );
    }

    #[test]
    fn test_write_csv_quotes_and_nulls() {
        let mut out = Vec::new();
        write_csv(&batch(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "id,note,updated_at\n\
             1,plain,2024-01-01 00:00:00\n\
             2,\"comma, \"\"quote\"\"\nnewline\",2024-01-02 00:00:00\n\
             3,,2024-01-03 00:00:00\n"
        );
    }

    #[test]
    fn test_written_csv_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::open(dir.path().join("exports")).unwrap();

        let artifact = writer.write(&batch(), &ts(3, 12, 0, 0)).unwrap();
        assert_eq!(artifact.file_name, "orders_2024-01-03_120000.csv");
        assert_eq!(artifact.rows, 3);

        let mut reader = csv::Reader::from_path(&artifact.path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), ["id", "note", "updated_at"]);
        let notes: Vec<String> = reader
            .records()
            .map(|r| r.unwrap()[1].to_string())
            .collect();
        assert_eq!(notes[1], "comma, \"quote\"\nnewline");

        artifact.remove().unwrap();
        assert!(!artifact.path.exists());
    }

    #[test]
    fn test_prune_without_retention_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::open(dir.path()).unwrap();
        writer.write(&batch(), &ts(3, 12, 0, 0)).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(writer.leftovers().unwrap().len(), 1);
        assert_eq!(writer.prune(None).unwrap(), 0);
        assert_eq!(writer.leftovers().unwrap().len(), 1);
    }

    #[test]
    fn test_prune_deletes_only_old_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::open(dir.path()).unwrap();
        writer.write(&batch(), &ts(3, 12, 0, 0)).unwrap();

        assert_eq!(writer.prune(Some(Duration::from_secs(3600))).unwrap(), 0);
        assert_eq!(writer.prune(Some(Duration::ZERO)).unwrap(), 1);
        assert!(writer.leftovers().unwrap().is_empty());
    }
}
