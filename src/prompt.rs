//! Prompt assembly for one conversion batch.
//!
//! The prompt is a fixed instruction template with three spliced-in blocks:
//! the worked-example knowledge base, the required response format, and the
//! batch of DAX measures serialized as a JSON list.

use crate::batch::MetricBatch;
use crate::error::AppError;
use crate::knowledge;

const PLACEHOLDER_EXAMPLES: &str = "{conversion_examples}";
const PLACEHOLDER_FORMAT: &str = "{response_format}";
const PLACEHOLDER_INPUT: &str = "{input_dax_expressions}";

/// Instruction template for the conversion task.
const CONVERSION_TEMPLATE: &str = r#"You are an expert in both DAX (Data Analysis Expressions) and SparkSQL. Your task is to assist in converting DAX expressions into Databricks Unity Catalog Metric View measures, which are defined using SparkSQL syntax.

### Objective:

Convert DAX measures into equivalent SparkSQL expressions that are compatible with Unity Catalog Metric Views. These expressions will be used in Databricks Genie AI/BI (Genie Rooms) as well as in Dashboards, and must strictly follow SparkSQL syntax conventions.

### Context:

Below is a set of reference examples showing DAX expressions alongside their properly converted SparkSQL-based UC Metric View versions. Use these examples to guide your conversions and maintain consistency with established transformation patterns.

{conversion_examples}

### Output Format:

Please format your response using the structure provided below:

{response_format}

This ensures consistent and structured outputs for downstream processing.

### Guidelines:

1. Use the provided examples and your expert knowledge of DAX and SparkSQL for the conversion.
2. If you encounter an expression you cannot confidently convert, do not guess. Instead:
    2.1. Explain clearly what is ambiguous, unsupported, or missing.
    2.2. Optionally suggest what additional context or assumptions would be needed to proceed.
3. You may use SparkSQL idioms such as CASE WHEN, FILTER, AGGREGATE, SUM, MAX, DATE_TRUNC, and others where appropriate.
4. Ensure that the converted expression faithfully reproduces the logic and intent of the original DAX expression.
5. If a referenced base measure is missing, define it as: measure("BASE MEASURE"). For example, DAX: DIVIDE([Current Sales], [Prior Year Sales], BLANK()) - 1  -> SparkSQL: CASE WHEN measure('Prior Year Sales') IS NULL OR measure('Prior Year Sales') = 0 THEN NULL ELSE measure('Current Sales') / measure('Prior Year Sales') - 1 END

### Input:

Below is the list of DAX expressions to be converted:

{input_dax_expressions}
"#;

/// The per-entry response shape. Downstream metric-view tooling depends on
/// the comment line carrying the original DAX, so this block must stay in
/// sync with what those consumers parse.
const RESPONSE_FORMAT: &str = r#"- name: <metric name>
  # <original DAX expression>
  expr: <SparkSQL expression>"#;

/// Assembles one prompt string per batch from fixed instructions, the
/// example knowledge base, and the serialized batch.
pub struct PromptBuilder {
    template: String,
    examples: String,
}

impl PromptBuilder {
    /// Build against the crate's own template and knowledge base.
    pub fn from_defaults() -> Result<Self, AppError> {
        Self::new(CONVERSION_TEMPLATE, knowledge::conversion_examples())
    }

    /// Both blocks are required grounding material; an empty template or
    /// example set would silently degrade conversion quality, so it fails
    /// here instead.
    pub fn new(template: &str, examples: &str) -> Result<Self, AppError> {
        if template.trim().is_empty() {
            return Err(AppError::Config(
                "conversion prompt template is empty".into(),
            ));
        }
        if examples.trim().is_empty() {
            return Err(AppError::Config(
                "conversion example knowledge base is empty".into(),
            ));
        }
        Ok(Self {
            template: template.to_string(),
            examples: examples.to_string(),
        })
    }

    /// Produce the full prompt for one batch. Metrics are serialized as a
    /// JSON list of `{name, expression}` objects in batch order; no
    /// expression is reformatted or truncated.
    pub fn build(&self, batch: &MetricBatch) -> Result<String, AppError> {
        let serialized = serde_json::to_string_pretty(&batch.metrics)?;
        Ok(self
            .template
            .replace(PLACEHOLDER_EXAMPLES, &self.examples)
            .replace(PLACEHOLDER_FORMAT, RESPONSE_FORMAT)
            .replace(PLACEHOLDER_INPUT, &serialized))
    }
}
