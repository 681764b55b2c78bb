use crate::models::SNAPSHOT_DATE_COLUMN;
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

fn utc_timestamp() -> DataType {
    DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into()))
}

fn clean_fields() -> Vec<Field> {
    vec![
        Field::new("name", DataType::Utf8, true),
        Field::new("full_name", DataType::Utf8, true),
        Field::new("stars", DataType::Int64, true),
        Field::new("forks", DataType::Int64, true),
        Field::new("license", DataType::Utf8, false),
        Field::new("language", DataType::Utf8, false),
        Field::new("created_at", utc_timestamp(), true),
        Field::new("updated_at", utc_timestamp(), true),
        Field::new("pushed_at", utc_timestamp(), true),
        Field::new("created_at_is_invalid", DataType::Boolean, false),
        Field::new("updated_at_is_invalid", DataType::Boolean, false),
        Field::new("pushed_at_is_invalid", DataType::Boolean, false),
        Field::new("days_since_last_push", DataType::Float64, false),
        Field::new("star_fork_ratio", DataType::Float64, false),
    ]
}

/// Arrow schema of the cleaned table (one row per active repository)
pub fn clean_schema() -> Arc<Schema> {
    Arc::new(Schema::new(clean_fields()))
}

/// Cleaned table plus the run's snapshot date
pub fn snapshot_schema() -> Arc<Schema> {
    let mut fields = clean_fields();
    fields.push(Field::new(SNAPSHOT_DATE_COLUMN, DataType::Utf8, false));
    Arc::new(Schema::new(fields))
}
