use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The nine fields every raw record must carry (null is allowed, absence is not)
pub const RAW_FIELDS: [&str; 9] = [
    "name",
    "full_name",
    "stars",
    "forks",
    "license",
    "language",
    "created_at",
    "updated_at",
    "pushed_at",
];

/// Column names of the cleaned table, in output order
pub const CLEAN_COLUMNS: [&str; 14] = [
    "name",
    "full_name",
    "stars",
    "forks",
    "license",
    "language",
    "created_at",
    "updated_at",
    "pushed_at",
    "created_at_is_invalid",
    "updated_at_is_invalid",
    "pushed_at_is_invalid",
    "days_since_last_push",
    "star_fork_ratio",
];

/// Extra column attached by the pipeline before persisting
pub const SNAPSHOT_DATE_COLUMN: &str = "snapshot_date";

/// A loosely typed repository record, as produced by extraction or read
/// back from a raw JSON dump. Values may be null or of an unexpected type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// One cleaned, enriched repository row
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRow {
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub stars: Option<i64>,
    pub forks: Option<i64>,
    pub license: String,
    pub language: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub created_at_is_invalid: bool,
    pub updated_at_is_invalid: bool,
    pub pushed_at_is_invalid: bool,
    pub days_since_last_push: f64,
    pub star_fork_ratio: f64,
}

/// Ordered collection of cleaned rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanTable {
    rows: Vec<CleanRow>,
}

impl CleanTable {
    pub fn new(rows: Vec<CleanRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[CleanRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<CleanRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CleanRow> {
        self.rows.iter()
    }

    /// Declared column set; the same for empty and non-empty tables
    pub fn column_names(&self) -> Vec<&'static str> {
        CLEAN_COLUMNS.to_vec()
    }
}

impl<'a> IntoIterator for &'a CleanTable {
    type Item = &'a CleanRow;
    type IntoIter = std::slice::Iter<'a, CleanRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Write disposition for the destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Drop and recreate the table with this run's rows
    Replace,
    /// Insert this run's rows after whatever is there
    Append,
    /// Upsert on (full_name, snapshot_date)
    #[default]
    Merge,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Replace => "replace",
            WriteMode::Append => "append",
            WriteMode::Merge => "merge",
        }
    }
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_record_roundtrips_as_plain_object() {
        let record = RawRecord::new()
            .with("name", "repo1")
            .with("stars", 10)
            .with("license", Value::Null);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, json!({"name": "repo1", "stars": 10, "license": null}));

        let back: RawRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_null_is_present_but_absent_is_not() {
        let record = RawRecord::new().with("license", Value::Null);
        assert!(record.contains("license"));
        assert!(!record.contains("language"));
    }

    #[test]
    fn test_write_mode_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: WriteMode,
        }

        let w: Wrapper = toml::from_str(r#"mode = "replace""#).unwrap();
        assert_eq!(w.mode, WriteMode::Replace);
        let w: Wrapper = toml::from_str(r#"mode = "append""#).unwrap();
        assert_eq!(w.mode, WriteMode::Append);
        assert!(toml::from_str::<Wrapper>(r#"mode = "upsert""#).is_err());
        assert_eq!(WriteMode::default(), WriteMode::Merge);
    }
}
