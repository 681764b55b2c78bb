//! Cleaning and enrichment of raw repository records.
//!
//! `transform` is a pure function of its input and the run timestamp: it
//! never reads the clock, never touches the filesystem and never fails on a
//! bad value. Malformed dates become null (tracked by the `*_is_invalid`
//! flags), missing optional values get defaults. The only error is a record
//! that lacks one of the declared fields entirely.

use crate::error::{RepoSnapshotError, Result};
use crate::models::{CleanRow, CleanTable, RawRecord};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

/// Strict timestamp format used by the GitHub API
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const TIMESTAMP_LEN: usize = "YYYY-MM-DDTHH:MM:SSZ".len();

/// Repositories pushed to at least this many days ago are dropped
pub const ACTIVITY_WINDOW_DAYS: f64 = 365.0;

/// Fill value for missing license and language
pub const UNKNOWN: &str = "unknown";

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// The nine declared fields of one raw record
struct Projected<'a> {
    name: &'a Value,
    full_name: &'a Value,
    stars: &'a Value,
    forks: &'a Value,
    license: &'a Value,
    language: &'a Value,
    created_at: &'a Value,
    updated_at: &'a Value,
    pushed_at: &'a Value,
}

#[derive(Default)]
struct InvalidDates {
    created_at: usize,
    updated_at: usize,
    pushed_at: usize,
}

impl InvalidDates {
    fn record(&mut self, row: &CleanRow) {
        self.created_at += row.created_at_is_invalid as usize;
        self.updated_at += row.updated_at_is_invalid as usize;
        self.pushed_at += row.pushed_at_is_invalid as usize;
    }

    fn log(&self) {
        for (column, count) in [
            ("created_at", self.created_at),
            ("updated_at", self.updated_at),
            ("pushed_at", self.pushed_at),
        ] {
            if count > 0 {
                warn!("Found {} invalid dates in {}", count, column);
            }
        }
    }
}

/// Clean, enrich and filter a batch of raw records.
///
/// Output rows keep input order. Every returned row was pushed to less than
/// [`ACTIVITY_WINDOW_DAYS`] days before `now`.
pub fn transform(records: &[RawRecord], now: DateTime<Utc>) -> Result<CleanTable> {
    if records.is_empty() {
        warn!("No raw data to transform");
        return Ok(CleanTable::default());
    }

    // Validate the whole batch before computing anything
    let projected = records
        .iter()
        .enumerate()
        .map(|(index, record)| project(index, record))
        .collect::<Result<Vec<_>>>()?;

    let mut invalid = InvalidDates::default();
    let mut rows = Vec::with_capacity(projected.len());

    for fields in &projected {
        let row = clean_row(fields, now);
        invalid.record(&row);
        rows.push(row);
    }

    invalid.log();

    let original_count = rows.len();
    rows.retain(is_active);
    let filtered_count = original_count - rows.len();
    if filtered_count > 0 {
        info!("Filtered out {} inactive repositories", filtered_count);
    }

    info!("Transformed {} active repositories", rows.len());
    Ok(CleanTable::new(rows))
}

fn project(index: usize, record: &RawRecord) -> Result<Projected<'_>> {
    let field = move |field: &'static str| {
        record
            .get(field)
            .ok_or(RepoSnapshotError::MissingField { index, field })
    };

    Ok(Projected {
        name: field("name")?,
        full_name: field("full_name")?,
        stars: field("stars")?,
        forks: field("forks")?,
        license: field("license")?,
        language: field("language")?,
        created_at: field("created_at")?,
        updated_at: field("updated_at")?,
        pushed_at: field("pushed_at")?,
    })
}

fn clean_row(fields: &Projected<'_>, now: DateTime<Utc>) -> CleanRow {
    let created_at = parse_timestamp(fields.created_at);
    let updated_at = parse_timestamp(fields.updated_at);
    let pushed_at = parse_timestamp(fields.pushed_at);

    let stars = integer(fields.stars);
    let forks = integer(fields.forks);

    let days_since_last_push = pushed_at.map(|pushed| days_between(pushed, now));
    let star_fork_ratio = star_fork_ratio(stars, forks);

    CleanRow {
        name: text(fields.name),
        full_name: text(fields.full_name),
        stars,
        forks,
        license: license_name(fields.license).unwrap_or_else(|| UNKNOWN.to_string()),
        language: text(fields.language).unwrap_or_else(|| UNKNOWN.to_string()),
        created_at_is_invalid: created_at.is_none(),
        updated_at_is_invalid: updated_at.is_none(),
        pushed_at_is_invalid: pushed_at.is_none(),
        created_at,
        updated_at,
        pushed_at,
        days_since_last_push: days_since_last_push.unwrap_or(f64::INFINITY),
        star_fork_ratio: star_fork_ratio.unwrap_or(0.0),
    }
}

fn is_active(row: &CleanRow) -> bool {
    row.days_since_last_push < ACTIVITY_WINDOW_DAYS
}

/// Parse a `YYYY-MM-DDTHH:MM:SSZ` string; anything else is `None`
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    let parsed = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()?;

    // chrono accepts unpadded fields, signs and leading spaces; only the
    // canonical 20-byte rendering is valid
    if s.len() != TIMESTAMP_LEN || parsed.format(TIMESTAMP_FORMAT).to_string() != s {
        return None;
    }

    Some(parsed.and_utc())
}

/// Fractional days from `then` to `now` (negative if `then` is in the future)
pub fn days_between(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - then).num_milliseconds() as f64 / MILLIS_PER_DAY
}

/// `stars / forks` when there is at least one fork, otherwise 0.0
pub fn star_fork_ratio(stars: Option<i64>, forks: Option<i64>) -> Option<f64> {
    match (stars, forks) {
        (Some(stars), Some(forks)) if forks > 0 => Some(stars as f64 / forks as f64),
        (None, Some(forks)) if forks > 0 => None,
        _ => Some(0.0),
    }
}

/// License as either a plain name or a `{ "name": ... }` object
fn license_name(value: &Value) -> Option<String> {
    match value {
        Value::String(name) => Some(name.clone()),
        Value::Object(license) => license.get("name").and_then(text),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn integer(value: &Value) -> Option<i64> {
    value.as_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 1, 12, 0, 0).unwrap()
    }

    fn stamp(at: DateTime<Utc>) -> String {
        at.format(TIMESTAMP_FORMAT).to_string()
    }

    fn record(pushed_days_ago: i64) -> RawRecord {
        let pushed = now() - Duration::days(pushed_days_ago);
        RawRecord::new()
            .with("name", "repo1")
            .with("full_name", "org/repo1")
            .with("stars", 10)
            .with("forks", 2)
            .with("license", json!({"name": "MIT"}))
            .with("language", "Rust")
            .with("created_at", "2024-01-01T00:00:00Z")
            .with("updated_at", "2025-10-01T00:00:00Z")
            .with("pushed_at", stamp(pushed))
    }

    #[test]
    fn test_parse_timestamp_strict() {
        let parsed = parse_timestamp(&json!("2025-10-30T08:15:00Z")).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 10, 30, 8, 15, 0).unwrap());

        assert!(parse_timestamp(&json!("invalid_date")).is_none());
        assert!(parse_timestamp(&json!("2025-10-30")).is_none());
        assert!(parse_timestamp(&json!("2025-10-30T08:15:00+02:00")).is_none());
        assert!(parse_timestamp(&json!("2025-13-01T00:00:00Z")).is_none());
        assert!(parse_timestamp(&json!(1730000000)).is_none());
        assert!(parse_timestamp(&Value::Null).is_none());
    }

    #[test]
    fn test_parse_timestamp_rejects_non_canonical_forms() {
        assert!(parse_timestamp(&json!("2025-1-5T1:2:3Z")).is_none());
        assert!(parse_timestamp(&json!("2025-10-05T08:15:0Z")).is_none());
        assert!(parse_timestamp(&json!(" 2025-10-30T08:15:00Z")).is_none());
        assert!(parse_timestamp(&json!("+2025-10-30T08:15:00Z")).is_none());
        assert!(parse_timestamp(&json!("02025-10-30T08:15:00Z")).is_none());
        assert!(parse_timestamp(&json!("2025-10-30T08:15:00Z ")).is_none());
        assert!(parse_timestamp(&json!("0999-10-30T08:15:00Z")).is_some());
    }

    #[test]
    fn test_star_fork_ratio() {
        assert_eq!(star_fork_ratio(Some(9), Some(3)), Some(3.0));
        assert_eq!(star_fork_ratio(Some(5), Some(0)), Some(0.0));
        assert_eq!(star_fork_ratio(Some(5), None), Some(0.0));
        assert_eq!(star_fork_ratio(Some(5), Some(-1)), Some(0.0));
        assert_eq!(star_fork_ratio(None, Some(4)), None);
    }

    #[test]
    fn test_license_name_accepts_object_or_string() {
        assert_eq!(license_name(&json!({"name": "MIT"})), Some("MIT".to_string()));
        assert_eq!(license_name(&json!("Apache-2.0")), Some("Apache-2.0".to_string()));
        assert_eq!(license_name(&json!({"key": "mit"})), None);
        assert_eq!(license_name(&json!({"name": null})), None);
        assert_eq!(license_name(&Value::Null), None);
    }

    #[test]
    fn test_days_between_is_fractional() {
        let then = now() - Duration::hours(36);
        assert!((days_between(then, now()) - 1.5).abs() < 1e-9);
        assert!(days_between(now() + Duration::days(1), now()) < 0.0);
    }

    #[test]
    fn test_activity_boundary_is_strict() {
        let table = transform(&[record(364), record(365), record(366)], now()).unwrap();
        assert_eq!(table.len(), 1);
        assert!((table.rows()[0].days_since_last_push - 364.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_field_fails_whole_batch() {
        let mut broken = record(1);
        broken.remove("language");

        let err = transform(&[record(1), broken], now()).unwrap_err();
        match err {
            RepoSnapshotError::MissingField { index, field } => {
                assert_eq!(index, 1);
                assert_eq!(field, "language");
            }
            other => panic!("Expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn test_null_fields_are_not_missing() {
        let r = record(1)
            .with("name", Value::Null)
            .with("stars", Value::Null)
            .with("forks", Value::Null)
            .with("license", Value::Null)
            .with("language", Value::Null);

        let table = transform(&[r], now()).unwrap();
        let row = &table.rows()[0];
        assert_eq!(row.name, None);
        assert_eq!(row.stars, None);
        assert_eq!(row.forks, None);
        assert_eq!(row.license, UNKNOWN);
        assert_eq!(row.language, UNKNOWN);
        assert_eq!(row.star_fork_ratio, 0.0);
    }

    #[test]
    fn test_unparsable_push_date_is_filtered() {
        let r = record(1).with("pushed_at", "yesterday");
        assert!(transform(&[r], now()).unwrap().is_empty());

        let r = record(1).with("pushed_at", Value::Null);
        assert!(transform(&[r], now()).unwrap().is_empty());
    }

    #[test]
    fn test_future_push_is_kept() {
        let table = transform(&[record(-2)], now()).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.rows()[0].days_since_last_push < 0.0);
    }

    #[test]
    fn test_non_integer_counts_become_null() {
        let r = record(1).with("stars", "lots").with("forks", 2.5);
        let row = transform(&[r], now()).unwrap().into_rows().remove(0);
        assert_eq!(row.stars, None);
        assert_eq!(row.forks, None);
        assert_eq!(row.star_fork_ratio, 0.0);
    }
}
