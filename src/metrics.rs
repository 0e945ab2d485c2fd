//! Loading of AAS measure exports.
//!
//! The source file is the `metrics.json` produced by an Azure Analysis
//! Services model export: an object whose `measures` array holds
//! `{name, expression}` pairs. The `expression` field is either a single
//! string or an array of line fragments, depending on how the export tool
//! wrapped long DAX bodies.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// One named DAX measure. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub expression: String,
}

#[derive(Deserialize)]
struct MetricsFile {
    measures: Vec<RawMeasure>,
}

#[derive(Deserialize)]
struct RawMeasure {
    #[serde(default)]
    name: String,
    #[serde(default)]
    expression: RawExpression,
}

/// Expression field as exported: a plain string or an array of fragments.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawExpression {
    Text(String),
    Lines(Vec<String>),
}

impl Default for RawExpression {
    fn default() -> Self {
        RawExpression::Text(String::new())
    }
}

impl RawExpression {
    /// Collapse to a single trimmed string; array fragments are joined with
    /// single spaces and blank fragments dropped.
    fn normalize(&self) -> String {
        match self {
            RawExpression::Text(s) => s.trim().to_string(),
            RawExpression::Lines(parts) => parts
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Read the measures export and return the ordered metric list.
///
/// Measures with an empty name or expression are skipped. A missing file,
/// malformed JSON, or an object without a `measures` key is a configuration
/// error.
pub fn load_metrics(path: &Path) -> Result<Vec<Metric>, AppError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Cannot read metrics file {}: {e}", path.display()))
    })?;

    let file: MetricsFile = serde_json::from_str(&raw).map_err(|e| {
        AppError::Config(format!("Invalid metrics file {}: {e}", path.display()))
    })?;

    let metrics: Vec<Metric> = file
        .measures
        .iter()
        .filter_map(|m| {
            let name = m.name.trim();
            let expression = m.expression.normalize();
            if name.is_empty() || expression.is_empty() {
                return None;
            }
            Some(Metric {
                name: name.to_string(),
                expression,
            })
        })
        .collect();

    tracing::debug!(
        path = %path.display(),
        count = metrics.len(),
        "Loaded metrics"
    );

    Ok(metrics)
}
