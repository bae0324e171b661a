//! In-memory export batch: the rows fetched for one table in one run.

use crate::error::{Error, Result};
use chrono::NaiveDateTime;

/// A single exported row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRecord {
    /// Column values in table order; `None` is SQL NULL
    pub values: Vec<Option<String>>,
    /// Value of the table's timestamp column
    pub updated_at: NaiveDateTime,
}

impl ExportRecord {
    /// Create a record.
    pub fn new(values: Vec<Option<String>>, updated_at: NaiveDateTime) -> Self {
        Self { values, updated_at }
    }
}

/// Rows fetched for one table, ascending by timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBatch {
    /// Source table
    pub table: String,
    /// Column names, in table order
    pub columns: Vec<String>,
    /// Records
    pub rows: Vec<ExportRecord>,
}

impl ExportBatch {
    /// Create an empty batch with the given header.
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            table: table.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a record; its width must match the header.
    pub fn push(&mut self, record: ExportRecord) -> Result<()> {
        if record.values.len() != self.columns.len() {
            return Err(Error::Serialization {
                message: format!(
                    "row for '{}' has {} values but the table has {} columns",
                    self.table,
                    record.values.len(),
                    self.columns.len()
                ),
                source: None,
            });
        }
        self.rows.push(record);
        Ok(())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the batch has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The new checkpoint: the largest timestamp in the batch.
    pub fn high_water_mark(&self) -> Option<NaiveDateTime> {
        self.rows.iter().map(|r| r.updated_at).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_high_water_mark_is_max() {
        let mut batch = ExportBatch::new("orders", vec!["id".into()]);
        assert_eq!(batch.high_water_mark(), None);

        for day in [1, 3, 2] {
            batch
                .push(ExportRecord::new(vec![Some(day.to_string())], ts(day)))
                .unwrap();
        }
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.high_water_mark(), Some(ts(3)));
    }

    #[test]
    fn test_push_rejects_width_mismatch() {
        let mut batch = ExportBatch::new("orders", vec!["id".into(), "total".into()]);
        let err = batch
            .push(ExportRecord::new(vec![Some("1".into())], ts(1)))
            .unwrap_err();
        assert_eq!(err.code(), "SERIALIZATION_ERROR");
        assert!(batch.is_empty());
    }
}
