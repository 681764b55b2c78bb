//! Columnar view of the cleaned table and Parquet export of snapshots.

pub mod schema;
pub mod writer;

pub use schema::{clean_schema, snapshot_schema};
pub use writer::SnapshotWriter;

use crate::error::Result;
use crate::models::{CleanRow, CleanTable};
use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, TimestampMillisecondArray,
};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use std::sync::Arc;

fn timestamps<F>(rows: &[CleanRow], get: F) -> TimestampMillisecondArray
where
    F: Fn(&CleanRow) -> Option<DateTime<Utc>>,
{
    TimestampMillisecondArray::from(
        rows.iter()
            .map(|r| get(r).map(|t| t.timestamp_millis()))
            .collect::<Vec<_>>(),
    )
    .with_timezone("UTC")
}

/// Build the cleaned-table columns, in `clean_schema()` order
pub(crate) fn clean_columns(rows: &[CleanRow]) -> Vec<ArrayRef> {
    let names: StringArray = rows.iter().map(|r| r.name.as_deref()).collect();
    let full_names: StringArray = rows.iter().map(|r| r.full_name.as_deref()).collect();
    let stars: Int64Array = rows.iter().map(|r| r.stars).collect();
    let forks: Int64Array = rows.iter().map(|r| r.forks).collect();
    let licenses: StringArray = rows.iter().map(|r| Some(r.license.as_str())).collect();
    let languages: StringArray = rows.iter().map(|r| Some(r.language.as_str())).collect();

    let created = timestamps(rows, |r| r.created_at);
    let updated = timestamps(rows, |r| r.updated_at);
    let pushed = timestamps(rows, |r| r.pushed_at);

    let created_invalid: BooleanArray =
        rows.iter().map(|r| Some(r.created_at_is_invalid)).collect();
    let updated_invalid: BooleanArray =
        rows.iter().map(|r| Some(r.updated_at_is_invalid)).collect();
    let pushed_invalid: BooleanArray =
        rows.iter().map(|r| Some(r.pushed_at_is_invalid)).collect();

    let days: Float64Array = rows.iter().map(|r| Some(r.days_since_last_push)).collect();
    let ratios: Float64Array = rows.iter().map(|r| Some(r.star_fork_ratio)).collect();

    vec![
        Arc::new(names),
        Arc::new(full_names),
        Arc::new(stars),
        Arc::new(forks),
        Arc::new(licenses),
        Arc::new(languages),
        Arc::new(created),
        Arc::new(updated),
        Arc::new(pushed),
        Arc::new(created_invalid),
        Arc::new(updated_invalid),
        Arc::new(pushed_invalid),
        Arc::new(days),
        Arc::new(ratios),
    ]
}

/// Build the snapshot columns: the cleaned columns plus a constant date
pub(crate) fn snapshot_columns(rows: &[CleanRow], snapshot_date: &str) -> Vec<ArrayRef> {
    let mut columns = clean_columns(rows);
    let dates: StringArray = rows.iter().map(|_| Some(snapshot_date)).collect();
    columns.push(Arc::new(dates));
    columns
}

impl CleanTable {
    /// Column-oriented copy of the table. An empty table still has every
    /// declared column.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        Ok(RecordBatch::try_new(clean_schema(), clean_columns(self.rows()))?)
    }

    /// Same as [`CleanTable::to_record_batch`] with a `snapshot_date` column
    pub fn to_snapshot_batch(&self, snapshot_date: &str) -> Result<RecordBatch> {
        Ok(RecordBatch::try_new(
            snapshot_schema(),
            snapshot_columns(self.rows(), snapshot_date),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CLEAN_COLUMNS, SNAPSHOT_DATE_COLUMN};
    use arrow::array::Array;
    use chrono::TimeZone;

    fn row(name: &str) -> CleanRow {
        CleanRow {
            name: Some(name.to_string()),
            full_name: Some(format!("org/{}", name)),
            stars: Some(10),
            forks: None,
            license: "MIT".to_string(),
            language: "unknown".to_string(),
            created_at: None,
            updated_at: Some(Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()),
            pushed_at: Some(Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap()),
            created_at_is_invalid: true,
            updated_at_is_invalid: false,
            pushed_at_is_invalid: false,
            days_since_last_push: 12.5,
            star_fork_ratio: 0.0,
        }
    }

    #[test]
    fn test_empty_table_has_declared_columns() {
        let batch = CleanTable::default().to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 0);
        let names: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, CLEAN_COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn test_record_batch_preserves_nulls_and_order() {
        let table = CleanTable::new(vec![row("a"), row("b")]);
        let batch = table.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 2);

        let names = batch
            .column_by_name("name")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(names.value(0), "a");
        assert_eq!(names.value(1), "b");

        let forks = batch.column_by_name("forks").unwrap();
        assert!(forks.is_null(0));

        let created = batch.column_by_name("created_at").unwrap();
        assert!(created.is_null(0));

        let updated = batch
            .column_by_name("updated_at")
            .unwrap()
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .unwrap();
        assert_eq!(
            updated.value(0),
            Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap().timestamp_millis()
        );
    }

    #[test]
    fn test_snapshot_batch_stamps_every_row() {
        let table = CleanTable::new(vec![row("a"), row("b")]);
        let batch = table.to_snapshot_batch("2025-11-01").unwrap();
        let dates = batch
            .column_by_name(SNAPSHOT_DATE_COLUMN)
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(dates.len(), 2);
        assert!(dates.iter().all(|d| d == Some("2025-11-01")));
    }
}
