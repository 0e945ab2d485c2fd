use std::path::PathBuf;

use crate::error::AppError;

const ENV_HOST: &str = "DATABRICKS_HOST";
const ENV_TOKEN: &str = "DATABRICKS_TOKEN";
const ENV_ENDPOINT: &str = "DATABRICKS_SERVING_ENDPOINT";

/// Default serving endpoint when DATABRICKS_SERVING_ENDPOINT is unset.
const DEFAULT_ENDPOINT: &str = "databricks-claude-sonnet-4";

/// Connection settings for the Databricks model serving endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Workspace base URL, e.g. `https://adb-1234.5.azuredatabricks.net`.
    pub host: String,
    /// Personal access token used as a bearer credential.
    pub token: String,
    /// Serving endpoint name.
    pub endpoint: String,
}

impl EndpointConfig {
    /// Load host/token/endpoint from the environment.
    ///
    /// Host and token are required and have no default; the endpoint name
    /// falls back to the workspace's Claude serving endpoint.
    pub fn from_env() -> Result<Self, AppError> {
        let host = require_env(ENV_HOST)?;
        let token = require_env(ENV_TOKEN)?;
        let endpoint = std::env::var(ENV_ENDPOINT)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            token,
            endpoint,
        })
    }
}

fn require_env(key: &str) -> Result<String, AppError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::Config(format!(
            "Missing required environment variable {key}"
        ))),
    }
}

/// Everything one conversion run needs, assembled once at startup and passed
/// into the scheduler explicitly. No process-wide mutable state.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Path to the AAS measures export (`metrics.json`).
    pub metrics_path: PathBuf,
    /// Directory that receives per-batch and combined artifacts.
    pub output_dir: PathBuf,
    /// Metrics per model call.
    pub batch_size: usize,
    /// Concurrent endpoint calls in flight.
    pub max_workers: usize,
    pub endpoint: EndpointConfig,
}

impl RunConfig {
    /// Validate the knobs that would otherwise fail deep inside the run.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.batch_size == 0 {
            return Err(AppError::Config("batch size must be at least 1".into()));
        }
        if self.max_workers == 0 {
            return Err(AppError::Config("worker count must be at least 1".into()));
        }
        Ok(())
    }
}
