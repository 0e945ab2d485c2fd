//! Worked DAX → SparkSQL example pairs used to ground the model.
//!
//! Opaque text from the model's point of view: it is spliced into the prompt
//! verbatim and never parsed structurally.

/// Reference conversions from the AAS migration knowledge base.
const CONVERSION_EXAMPLES: &str = r#"
DAX expressions

[
  {
    "name": "Total Revenue",
    "expression": "SUM('FactSales'[Revenue])"
  },
  {
    "name": "Total Quantity",
    "expression": "SUM('FactSales'[Quantity])"
  },
  {
    "name": "Average Price",
    "expression": "DIVIDE([Total Revenue], [Total Quantity])"
  }
]

Unity Catalog Metric View Expressions (SparkSQL)

- name: Total Revenue
  # SUM('FactSales'[Revenue])
  expr: SUM(Revenue)
- name: Total Quantity
  # SUM('FactSales'[Quantity])
  expr: SUM(Quantity)
- name: Average Price
  # DIVIDE([Total Revenue], [Total Quantity])
  expr: SUM(Revenue) / NULLIF(SUM(Quantity), 0)
"#;

/// The grounding example block for prompt assembly.
pub fn conversion_examples() -> &'static str {
    CONVERSION_EXAMPLES
}
