//! Batch scheduling and the per-batch conversion pipeline.
//!
//! Each batch runs build → invoke → write as one unit on its own task. A
//! semaphore bounds how many endpoint calls are in flight; batches may
//! complete in any order. A failure in one batch is recorded against that
//! batch and never cancels its siblings.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::batch::{self, MetricBatch};
use crate::config::RunConfig;
use crate::endpoint::Convert;
use crate::error::AppError;
use crate::metrics::Metric;
use crate::output::{count_conversions, OutputWriter};
use crate::prompt::PromptBuilder;

/// What happened to one batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub index: usize,
    pub name_range: String,
    pub metric_count: usize,
    /// Entries counted in the raw result (successful batches only).
    pub conversions: usize,
    pub artifact: Option<PathBuf>,
    pub error: Option<AppError>,
    pub duration: Duration,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate result of one conversion run.
#[derive(Debug)]
pub struct RunSummary {
    pub total_batches: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub metrics_converted: usize,
    pub combined_path: PathBuf,
    pub elapsed: Duration,
    pub outcomes: Vec<BatchOutcome>,
}

/// Run the full pipeline over an already-loaded metric list.
///
/// Configuration problems (zero batch size or workers, empty input, empty
/// grounding text) abort here, before any endpoint call is attempted.
pub async fn run(
    config: &RunConfig,
    metrics: Vec<Metric>,
    invoker: Arc<dyn Convert>,
) -> Result<RunSummary, AppError> {
    config.validate()?;
    let batches = batch::partition(metrics, config.batch_size)?;
    let builder = Arc::new(PromptBuilder::from_defaults()?);
    let writer = Arc::new(OutputWriter::new(&config.output_dir)?);

    let total_batches = batches.len();
    tracing::info!(
        batches = total_batches,
        batch_size = config.batch_size,
        workers = config.max_workers,
        "Dispatching conversion batches"
    );

    let started = Instant::now();
    let semaphore = Arc::new(Semaphore::new(config.max_workers));
    let mut tasks: JoinSet<BatchOutcome> = JoinSet::new();

    for b in batches {
        let builder = Arc::clone(&builder);
        let writer = Arc::clone(&writer);
        let invoker = Arc::clone(&invoker);
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let permit = match semaphore.acquire_owned().await {
                Ok(p) => p,
                Err(e) => {
                    return failed_outcome(&b, AppError::Internal(e.to_string()), Duration::ZERO)
                }
            };
            let outcome = process_batch(&b, &builder, &*invoker, &writer).await;
            drop(permit);
            outcome
        });
    }

    let mut outcomes = Vec::with_capacity(total_batches);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                // A panicked batch task loses its identity; record it so the
                // run summary still accounts for every batch.
                tracing::error!("Batch task panicked: {e}");
                outcomes.push(BatchOutcome {
                    index: 0,
                    name_range: "<unknown>".into(),
                    metric_count: 0,
                    conversions: 0,
                    artifact: None,
                    error: Some(AppError::Internal(e.to_string())),
                    duration: Duration::ZERO,
                });
            }
        }
    }
    outcomes.sort_by_key(|o| o.index);

    let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
    let failed = outcomes.len() - succeeded;
    let metrics_converted: usize = outcomes
        .iter()
        .filter(|o| o.succeeded())
        .map(|o| o.conversions)
        .sum();

    if succeeded > 0 {
        if let Err(e) = writer.write_footer(metrics_converted, succeeded).await {
            tracing::warn!("Failed to write combined summary footer: {e}");
        }
    }

    let summary = RunSummary {
        total_batches,
        succeeded,
        failed,
        metrics_converted,
        combined_path: writer.combined_path().to_path_buf(),
        elapsed: started.elapsed(),
        outcomes,
    };
    log_summary(&summary);
    Ok(summary)
}

/// One batch, start to finish, on the calling task.
async fn process_batch(
    batch: &MetricBatch,
    builder: &PromptBuilder,
    invoker: &dyn Convert,
    writer: &OutputWriter,
) -> BatchOutcome {
    let started = Instant::now();
    tracing::debug!(
        batch = batch.index,
        metrics = batch.len(),
        range = %batch.name_range(),
        "Converting batch"
    );

    let prompt = match builder.build(batch) {
        Ok(p) => p,
        Err(e) => return failed_outcome(batch, e, started.elapsed()),
    };

    let result = match invoker.convert(&prompt).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(
                batch = batch.index,
                range = %batch.name_range(),
                kind = e.kind(),
                "Batch conversion failed: {e}"
            );
            return failed_outcome(batch, e, started.elapsed());
        }
    };

    let conversions = count_conversions(&result);

    let artifact = match writer.write_batch(batch, &result).await {
        Ok(path) => Some(path),
        Err(e) => {
            // The result is already in memory; surface it in the log so a
            // failed write does not lose the conversion entirely.
            tracing::error!(
                batch = batch.index,
                "Failed to write batch artifact: {e}"
            );
            tracing::debug!(batch = batch.index, "Unwritten batch result:\n{result}");
            return failed_outcome(batch, e, started.elapsed());
        }
    };

    if let Err(e) = writer.append_combined(batch, &result).await {
        tracing::error!(
            batch = batch.index,
            "Failed to append to combined artifact: {e}"
        );
        return BatchOutcome {
            index: batch.index,
            name_range: batch.name_range(),
            metric_count: batch.len(),
            conversions,
            artifact,
            error: Some(e),
            duration: started.elapsed(),
        };
    }

    tracing::info!(
        batch = batch.index,
        metrics = batch.len(),
        conversions,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Batch completed"
    );

    BatchOutcome {
        index: batch.index,
        name_range: batch.name_range(),
        metric_count: batch.len(),
        conversions,
        artifact,
        error: None,
        duration: started.elapsed(),
    }
}

fn failed_outcome(batch: &MetricBatch, error: AppError, duration: Duration) -> BatchOutcome {
    BatchOutcome {
        index: batch.index,
        name_range: batch.name_range(),
        metric_count: batch.len(),
        conversions: 0,
        artifact: None,
        error: Some(error),
        duration,
    }
}

fn log_summary(summary: &RunSummary) {
    for outcome in &summary.outcomes {
        match &outcome.error {
            None => tracing::info!(
                batch = outcome.index,
                metrics = outcome.metric_count,
                conversions = outcome.conversions,
                "Batch ok"
            ),
            Some(e) => tracing::warn!(
                batch = outcome.index,
                range = %outcome.name_range,
                kind = e.kind(),
                "Batch failed: {e}"
            ),
        }
    }
    tracing::info!(
        batches = summary.total_batches,
        succeeded = summary.succeeded,
        failed = summary.failed,
        metrics_converted = summary.metrics_converted,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        combined = %summary.combined_path.display(),
        "Conversion run finished"
    );
}
