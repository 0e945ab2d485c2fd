pub mod batch;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod knowledge;
pub mod logging;
pub mod metrics;
pub mod output;
pub mod prompt;
pub mod runner;

pub use config::{EndpointConfig, RunConfig};
pub use error::AppError;
