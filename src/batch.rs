//! Partitioning of the metric list into model-call batches.

use crate::error::AppError;
use crate::metrics::Metric;

/// An ordered slice of the full metric sequence, at most `batch_size` long.
/// Batches are disjoint and cover the input exactly.
#[derive(Debug, Clone)]
pub struct MetricBatch {
    /// 1-based position in submission order.
    pub index: usize,
    pub metrics: Vec<Metric>,
}

impl MetricBatch {
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Metric-name range for log lines, e.g. `"Total Orders".."Net Margin"`.
    pub fn name_range(&self) -> String {
        match (self.metrics.first(), self.metrics.last()) {
            (Some(first), Some(last)) if first.name != last.name => {
                format!("{:?}..{:?}", first.name, last.name)
            }
            (Some(only), _) => format!("{:?}", only.name),
            _ => String::from("<empty>"),
        }
    }
}

/// Split `metrics` into `ceil(N / batch_size)` batches in input order.
///
/// An empty metric list or a zero batch size is a configuration error,
/// raised before anything is dispatched.
pub fn partition(metrics: Vec<Metric>, batch_size: usize) -> Result<Vec<MetricBatch>, AppError> {
    if batch_size == 0 {
        return Err(AppError::Config("batch size must be at least 1".into()));
    }
    if metrics.is_empty() {
        return Err(AppError::Config(
            "no metrics to convert; the measures list is empty".into(),
        ));
    }

    let batches: Vec<MetricBatch> = metrics
        .chunks(batch_size)
        .enumerate()
        .map(|(i, chunk)| MetricBatch {
            index: i + 1,
            metrics: chunk.to_vec(),
        })
        .collect();

    tracing::debug!(
        metrics = metrics.len(),
        batch_size,
        batches = batches.len(),
        "Partitioned metrics"
    );

    Ok(batches)
}
