use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepoSnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("GitHub API error: {status} - {message}")]
    GitHubApi { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Raw record {index} has no `{field}` field")]
    MissingField { index: usize, field: &'static str },

    #[error("Invalid table name: {0:?}")]
    InvalidTableName(String),
}

pub type Result<T> = std::result::Result<T, RepoSnapshotError>;
