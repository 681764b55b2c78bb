use crate::config::PipelineConfig;
use crate::error::Result;
use crate::github::GitHubClient;
use crate::models::RawRecord;
use crate::normalize::simplify_repo;
use crate::sink::DuckDbSink;
use crate::table::SnapshotWriter;
use crate::transform::transform;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Record counts of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub snapshot_date: String,
    pub extracted: usize,
    pub transformed: usize,
    pub loaded: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetch and normalize every repository of every configured org
    pub async fn extract(&self) -> Result<Vec<RawRecord>> {
        if self.config.token.is_none() {
            warn!("No GitHub token found - using unauthenticated requests (lower rate limits)");
        }

        let mut client = GitHubClient::new(self.config.token.clone())?;
        if let Some(api_url) = &self.config.api_url {
            client = client.with_base_url(api_url);
        }

        match client.check_rate_limit().await {
            Ok(rate_limit) => info!(
                "GitHub API rate limit: {}/{}",
                rate_limit.remaining, rate_limit.limit
            ),
            Err(e) => warn!("Could not read rate limit: {}", e),
        }

        let mut all_data = Vec::new();
        for org in &self.config.orgs {
            let repos = client.fetch_org_repos(org).await?;
            info!("{} repos fetched from {}", repos.len(), org);
            all_data.extend(repos.into_iter().map(simplify_repo));
        }

        Ok(all_data)
    }

    /// Full run: extract, optionally dump raw records, transform and load
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        info!("Starting GitHub data extraction...");
        let raw_data = self.extract().await?;

        if let Some(path) = &self.config.raw_output {
            save_raw(path, &raw_data)?;
        }

        self.run_from_raw(&raw_data, now)
    }

    /// Transform and load an already materialized batch
    pub fn run_from_raw(&self, raw_data: &[RawRecord], now: DateTime<Utc>) -> Result<RunSummary> {
        info!(
            "Fetched {} raw repositories. Starting transformation...",
            raw_data.len()
        );
        let table = transform(raw_data, now)?;

        let snapshot_date = snapshot_date(now);
        info!(
            "Transformation complete. Loading {} rows for snapshot {} ({} mode)",
            table.len(),
            snapshot_date,
            self.config.mode
        );

        let mut sink = DuckDbSink::open(&self.config.db_path)?;
        let loaded = sink.write(&self.config.table, &table, &snapshot_date, self.config.mode)?;

        if let Some(path) = &self.config.parquet_path {
            let mut writer = SnapshotWriter::new(path, &snapshot_date)?;
            for row in table.rows() {
                writer.add_row(row.clone())?;
            }
            let written = writer.close()?;
            info!("Wrote {} rows to {}", written, path.display());
        }

        Ok(RunSummary {
            snapshot_date,
            extracted: raw_data.len(),
            transformed: table.len(),
            loaded,
        })
    }
}

/// UTC calendar date of the run, `YYYY-MM-DD`
pub fn snapshot_date(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Write raw records as pretty JSON, creating parent directories
pub fn save_raw(path: &Path, records: &[RawRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json)?;
    info!("Raw data saved to {}", path.display());
    Ok(())
}

/// Read raw records previously written by [`save_raw`]
pub fn read_raw(path: &Path) -> Result<Vec<RawRecord>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
