use crate::error::{RepoSnapshotError, Result};
use crate::models::WriteMode;
use crate::sink::validate_table_name;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_TABLE_NAME: &str = "github_repos";
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

#[derive(Deserialize)]
struct ConfigFile {
    github: GitHubSection,
    output: OutputSection,
}

#[derive(Deserialize)]
struct GitHubSection {
    orgs: Vec<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    api_url: Option<String>,
}

#[derive(Deserialize)]
struct OutputSection {
    db_path: PathBuf,
    #[serde(default)]
    mode: WriteMode,
    #[serde(default = "default_table")]
    table: String,
    #[serde(default)]
    raw_output: Option<PathBuf>,
    #[serde(default)]
    parquet_path: Option<PathBuf>,
}

fn default_table() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

/// Everything a pipeline run needs, resolved once and passed explicitly
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub orgs: Vec<String>,
    pub token: Option<String>,
    pub api_url: Option<String>,
    pub db_path: PathBuf,
    pub mode: WriteMode,
    pub table: String,
    pub raw_output: Option<PathBuf>,
    pub parquet_path: Option<PathBuf>,
}

/// Load the TOML config file; `GITHUB_TOKEN` overrides the file's token
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, std::env::var(TOKEN_ENV_VAR).ok())
}

/// Parse config content with an explicit environment token
pub fn parse_config(content: &str, env_token: Option<String>) -> Result<PipelineConfig> {
    let config: ConfigFile = toml::from_str(content)?;

    let orgs: Vec<String> = config
        .github
        .orgs
        .into_iter()
        .map(|org| org.trim().to_string())
        .filter(|org| !org.is_empty())
        .collect();

    if orgs.is_empty() {
        return Err(RepoSnapshotError::Config(
            "github.orgs must list at least one organization".to_string(),
        ));
    }

    validate_table_name(&config.output.table)?;

    Ok(PipelineConfig {
        orgs,
        token: resolve_token(env_token, config.github.token),
        api_url: config.github.api_url,
        db_path: config.output.db_path,
        mode: config.output.mode,
        table: config.output.table,
        raw_output: config.output.raw_output,
        parquet_path: config.output.parquet_path,
    })
}

/// A non-empty environment token wins over the file value
pub fn resolve_token(env_token: Option<String>, file_token: Option<String>) -> Option<String> {
    let non_empty = |t: Option<String>| t.filter(|t| !t.trim().is_empty());
    non_empty(env_token).or_else(|| non_empty(file_token))
}
