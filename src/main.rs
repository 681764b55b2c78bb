use chrono::Utc;
use clap::{Parser, Subcommand};
use repo_snapshot::config::{self, PipelineConfig, DEFAULT_CONFIG_PATH};
use repo_snapshot::pipeline::{self, Pipeline, RunSummary};
use repo_snapshot::Result;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "repo-snapshot")]
#[command(about = "Snapshot GitHub organization repositories into DuckDB", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract, transform and load today's snapshot
    Run {
        /// Also dump the raw records to this JSON file
        #[arg(long)]
        raw_output: Option<PathBuf>,
        /// Also export the snapshot to this Parquet file
        #[arg(long)]
        parquet: Option<PathBuf>,
    },
    /// Fetch repositories and dump the raw records as JSON
    Extract {
        #[arg(long, default_value = "data/raw_repos.json")]
        output: PathBuf,
    },
    /// Transform and load a raw JSON dump produced by `extract`
    Load {
        #[arg(long, default_value = "data/raw_repos.json")]
        input: PathBuf,
        /// Also export the snapshot to this Parquet file
        #[arg(long)]
        parquet: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { raw_output, parquet } => run(&cli.config, raw_output, parquet).await,
        Commands::Extract { output } => extract(&cli.config, output).await,
        Commands::Load { input, parquet } => load(&cli.config, input, parquet),
    };

    let code = match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Pipeline failed: {}", e);
            ExitCode::FAILURE
        }
    };

    info!("Pipeline execution finished.");
    code
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    info!("Loading configuration from {}", path.display());
    let config = config::load_config(path)?;
    info!(
        "{} organizations, writing to {} ({} mode)",
        config.orgs.len(),
        config.db_path.display(),
        config.mode
    );
    Ok(config)
}

fn report(summary: &RunSummary) {
    info!(
        "Snapshot {}: {} extracted, {} active, {} loaded",
        summary.snapshot_date, summary.extracted, summary.transformed, summary.loaded
    );
}

async fn run(
    config_path: &Path,
    raw_output: Option<PathBuf>,
    parquet: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if raw_output.is_some() {
        config.raw_output = raw_output;
    }
    if parquet.is_some() {
        config.parquet_path = parquet;
    }

    let summary = Pipeline::new(config).run(Utc::now()).await?;
    report(&summary);
    Ok(())
}

async fn extract(config_path: &Path, output: PathBuf) -> Result<()> {
    let config = load_config(config_path)?;
    let raw_data = Pipeline::new(config).extract().await?;
    info!("Extracted {} records", raw_data.len());
    pipeline::save_raw(&output, &raw_data)
}

fn load(config_path: &Path, input: PathBuf, parquet: Option<PathBuf>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if parquet.is_some() {
        config.parquet_path = parquet;
    }

    let raw_data = pipeline::read_raw(&input)?;
    let summary = Pipeline::new(config).run_from_raw(&raw_data, Utc::now())?;
    report(&summary);
    Ok(())
}
