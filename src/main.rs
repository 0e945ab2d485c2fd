//! dax2uc CLI — convert AAS DAX measures to UC Metric View SparkSQL.
//!
//! Usage:
//!   dax2uc convert metrics.json [--batch-size 5] [--workers 1] [--output-dir uc_converted_metrics]
//!
//! Endpoint credentials come from the environment (or a `.env` file):
//!   DATABRICKS_HOST, DATABRICKS_TOKEN, DATABRICKS_SERVING_ENDPOINT

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use dax2uc::endpoint::ServingEndpointClient;
use dax2uc::{metrics, runner, AppError, EndpointConfig, RunConfig};

#[derive(Parser)]
#[command(name = "dax2uc")]
#[command(about = "Convert DAX measures to Unity Catalog Metric View SparkSQL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a metrics.json export via the configured serving endpoint
    Convert {
        /// Path to the AAS metrics.json export
        file: PathBuf,

        /// Metrics per model call
        #[arg(short, long, default_value_t = 5)]
        batch_size: usize,

        /// Concurrent endpoint calls
        #[arg(short, long, default_value_t = 1)]
        workers: usize,

        /// Directory for per-batch and combined artifacts
        #[arg(short, long, default_value = "uc_converted_metrics")]
        output_dir: PathBuf,
    },

    /// List the measures found in a metrics.json export
    List {
        /// Path to the AAS metrics.json export
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    // Ignore a missing .env; required variables are validated later.
    let _ = dotenvy::dotenv();
    dax2uc::logging::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Convert {
            file,
            batch_size,
            workers,
            output_dir,
        } => cmd_convert(file, batch_size, workers, output_dir),
        Commands::List { file } => cmd_list(file),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_convert(
    file: PathBuf,
    batch_size: usize,
    workers: usize,
    output_dir: PathBuf,
) -> Result<ExitCode, AppError> {
    let config = RunConfig {
        metrics_path: file,
        output_dir,
        batch_size,
        max_workers: workers,
        endpoint: EndpointConfig::from_env()?,
    };
    config.validate()?;

    let loaded = metrics::load_metrics(&config.metrics_path)?;
    tracing::info!(
        metrics = loaded.len(),
        path = %config.metrics_path.display(),
        "Loaded measures"
    );

    let invoker = Arc::new(ServingEndpointClient::new(config.endpoint.clone())?);

    let runtime = tokio::runtime::Runtime::new()?;
    let summary = runtime.block_on(runner::run(&config, loaded, invoker))?;

    // Partial failure is non-fatal; a run with zero successful batches is.
    if summary.succeeded == 0 {
        tracing::error!("All {} batches failed", summary.total_batches);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_list(file: PathBuf) -> Result<ExitCode, AppError> {
    let loaded = metrics::load_metrics(&file)?;
    for metric in &loaded {
        println!("{} = {}", metric.name, metric.expression);
    }
    tracing::info!(metrics = loaded.len(), "Listed measures");
    Ok(ExitCode::SUCCESS)
}
