//! DuckDB destination for daily snapshots.
//!
//! Every write runs in a single transaction, so a failed run leaves the
//! destination table as it was, including in `replace` mode.

use crate::error::{RepoSnapshotError, Result};
use crate::models::{CleanRow, CleanTable, WriteMode};
use duckdb::{params, Connection, Transaction};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

const SNAPSHOT_COLUMNS: &str = "name, full_name, stars, forks, license, language, \
     created_at, updated_at, pushed_at, \
     created_at_is_invalid, updated_at_is_invalid, pushed_at_is_invalid, \
     days_since_last_push, star_fork_ratio, snapshot_date";

pub struct DuckDbSink {
    conn: Connection,
}

impl DuckDbSink {
    /// Open (or create) a database file, creating parent directories
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Persist `table` into `table_name`, stamping every row with
    /// `snapshot_date`. Returns the number of rows inserted.
    ///
    /// In merge mode a batch holding the same `full_name` more than once
    /// keeps only the last occurrence.
    pub fn write(
        &mut self,
        table_name: &str,
        table: &CleanTable,
        snapshot_date: &str,
        mode: WriteMode,
    ) -> Result<usize> {
        self.write_with(table_name, table, snapshot_date, mode, |_| Ok(()))
    }

    /// `write`, running `before_commit` inside the transaction once the rows
    /// are in. An error from it rolls the whole write back.
    fn write_with<F>(
        &mut self,
        table_name: &str,
        table: &CleanTable,
        snapshot_date: &str,
        mode: WriteMode,
        before_commit: F,
    ) -> Result<usize>
    where
        F: FnOnce(&Transaction<'_>) -> Result<()>,
    {
        validate_table_name(table_name)?;

        if table.is_empty() {
            warn!("No data to load into DuckDB");
            return Ok(0);
        }

        let tx = self.conn.transaction()?;

        let rows: Vec<&CleanRow> = match mode {
            WriteMode::Replace => {
                info!("Overwriting table: {}", table_name);
                tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", table_name))?;
                create_table(&tx, table_name)?;
                table.iter().collect()
            }
            WriteMode::Append => {
                info!("Appending to table: {}", table_name);
                create_table(&tx, table_name)?;
                table.iter().collect()
            }
            WriteMode::Merge => {
                info!("Merging into table: {}", table_name);
                create_table(&tx, table_name)?;
                let rows = last_per_full_name(table);
                if rows.len() < table.len() {
                    warn!(
                        "Dropped {} duplicate full_name rows from the batch",
                        table.len() - rows.len()
                    );
                }
                let removed = delete_existing_keys(&tx, table_name, &rows, snapshot_date)?;
                if removed > 0 {
                    info!("Replaced {} rows from an earlier run of {}", removed, snapshot_date);
                }
                rows
            }
        };

        let inserted = insert_rows(&tx, table_name, &rows, snapshot_date)?;
        before_commit(&tx)?;
        tx.commit()?;

        info!("Loaded {} rows into DuckDB", inserted);
        Ok(inserted)
    }

    /// Number of rows in `table_name` (0 if the table does not exist)
    pub fn row_count(&self, table_name: &str) -> Result<usize> {
        validate_table_name(table_name)?;

        if !self.table_exists(table_name)? {
            return Ok(0);
        }

        let count: i64 = self.conn.query_row(
            &format!("SELECT count(*) FROM {}", table_name),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM information_schema.tables WHERE table_name = ?",
            params![table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Underlying connection, for ad-hoc queries
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(RepoSnapshotError::InvalidTableName(name.to_string()))
    }
}

fn create_table(tx: &Transaction<'_>, table_name: &str) -> Result<()> {
    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            name VARCHAR,
            full_name VARCHAR,
            stars BIGINT,
            forks BIGINT,
            license VARCHAR NOT NULL,
            language VARCHAR NOT NULL,
            created_at TIMESTAMP,
            updated_at TIMESTAMP,
            pushed_at TIMESTAMP,
            created_at_is_invalid BOOLEAN NOT NULL,
            updated_at_is_invalid BOOLEAN NOT NULL,
            pushed_at_is_invalid BOOLEAN NOT NULL,
            days_since_last_push DOUBLE NOT NULL,
            star_fork_ratio DOUBLE NOT NULL,
            snapshot_date VARCHAR NOT NULL
        )",
        table_name
    ))?;
    Ok(())
}

/// One row per `full_name`, the last occurrence winning. Rows keep the
/// position of the key's first appearance.
fn last_per_full_name(table: &CleanTable) -> Vec<&CleanRow> {
    let mut positions: HashMap<Option<&str>, usize> = HashMap::new();
    let mut rows: Vec<&CleanRow> = Vec::with_capacity(table.len());

    for row in table {
        match positions.get(&row.full_name.as_deref()) {
            Some(&pos) => rows[pos] = row,
            None => {
                positions.insert(row.full_name.as_deref(), rows.len());
                rows.push(row);
            }
        }
    }
    rows
}

fn delete_existing_keys(
    tx: &Transaction<'_>,
    table_name: &str,
    rows: &[&CleanRow],
    snapshot_date: &str,
) -> Result<usize> {
    let mut stmt = tx.prepare(&format!(
        "DELETE FROM {} WHERE full_name IS NOT DISTINCT FROM ? AND snapshot_date = ?",
        table_name
    ))?;

    let mut removed = 0;
    for row in rows {
        removed += stmt.execute(params![row.full_name.as_deref(), snapshot_date])?;
    }
    Ok(removed)
}

fn insert_rows(
    tx: &Transaction<'_>,
    table_name: &str,
    rows: &[&CleanRow],
    snapshot_date: &str,
) -> Result<usize> {
    let mut stmt = tx.prepare(&format!(
        "INSERT INTO {} ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        table_name, SNAPSHOT_COLUMNS
    ))?;

    let mut inserted = 0;
    for row in rows {
        inserted += stmt.execute(params![
            row.name.as_deref(),
            row.full_name.as_deref(),
            row.stars,
            row.forks,
            row.license.as_str(),
            row.language.as_str(),
            row.created_at.map(|t| t.naive_utc()),
            row.updated_at.map(|t| t.naive_utc()),
            row.pushed_at.map(|t| t.naive_utc()),
            row.created_at_is_invalid,
            row.updated_at_is_invalid,
            row.pushed_at_is_invalid,
            row.days_since_last_push,
            row.star_fork_ratio,
            snapshot_date,
        ])?;
    }
    Ok(inserted)
}
