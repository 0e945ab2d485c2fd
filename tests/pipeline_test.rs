//! End-to-end pipeline tests against a scripted endpoint backend.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use dax2uc::endpoint::Convert;
use dax2uc::error::AppError;
use dax2uc::metrics::Metric;
use dax2uc::runner;
use dax2uc::{EndpointConfig, RunConfig};

/// Scripted stand-in for the serving endpoint. Echoes each metric in the
/// prompt's input block back as a converted entry, and fails any batch whose
/// prompt mentions a poisoned metric name.
struct FakeEndpoint {
    prompts: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl FakeEndpoint {
    fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail_on: None,
        }
    }

    fn failing_on(name: &str) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail_on: Some(name.to_string()),
        }
    }

    fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Pull the serialized batch back out of the prompt's input section.
    fn input_metrics(prompt: &str) -> Vec<Metric> {
        let idx = prompt
            .rfind("to be converted:")
            .expect("prompt has an input section");
        let tail = &prompt[idx..];
        let start = tail.find('[').expect("input block is a JSON list");
        serde_json::from_str(tail[start..].trim()).expect("input block parses")
    }
}

#[async_trait]
impl Convert for FakeEndpoint {
    async fn convert(&self, prompt: &str) -> Result<String, AppError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let metrics = Self::input_metrics(prompt);
        if let Some(poison) = &self.fail_on {
            if metrics.iter().any(|m| &m.name == poison) {
                return Err(AppError::Endpoint("simulated endpoint failure".into()));
            }
        }

        let mut out = String::new();
        for m in &metrics {
            out.push_str(&format!(
                "- name: {}\n  # {}\n  expr: CONVERTED({})\n",
                m.name, m.expression, m.name
            ));
        }
        Ok(out)
    }
}

fn metric(name: &str, expression: &str) -> Metric {
    Metric {
        name: name.to_string(),
        expression: expression.to_string(),
    }
}

fn metrics(n: usize) -> Vec<Metric> {
    (0..n)
        .map(|i| metric(&format!("Metric {i}"), &format!("SUM('Fact'[C{i}])")))
        .collect()
}

fn config(output_dir: &Path, batch_size: usize, workers: usize) -> RunConfig {
    RunConfig {
        metrics_path: "unused.json".into(),
        output_dir: output_dir.to_path_buf(),
        batch_size,
        max_workers: workers,
        endpoint: EndpointConfig {
            host: "https://example.cloud.databricks.com".into(),
            token: "dapi-test".into(),
            endpoint: "test-endpoint".into(),
        },
    }
}

fn batch_artifacts(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("converted_metrics_"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn test_run_produces_one_artifact_per_batch_plus_combined() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeEndpoint::new());
    let cfg = config(dir.path(), 2, 2);

    let summary = runner::run(&cfg, metrics(4), fake.clone()).await.unwrap();

    assert_eq!(summary.total_batches, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.metrics_converted, 4);
    assert_eq!(fake.prompt_count(), 2);
    assert_eq!(batch_artifacts(dir.path()).len(), 2);

    let combined = std::fs::read_to_string(&summary.combined_path).unwrap();
    for i in 0..4 {
        assert!(combined.contains(&format!("name: Metric {i}")));
    }
}

#[tokio::test]
async fn test_endpoint_failure_is_isolated_to_its_batch() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeEndpoint::failing_on("Metric 1"));
    let cfg = config(dir.path(), 1, 1);

    let summary = runner::run(&cfg, metrics(3), fake.clone()).await.unwrap();

    assert_eq!(summary.total_batches, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    // All three batches were attempted despite the middle one failing.
    assert_eq!(fake.prompt_count(), 3);

    let failed: Vec<_> = summary.outcomes.iter().filter(|o| !o.succeeded()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].index, 2);
    assert!(failed[0].artifact.is_none());

    // Only the two successful batches produced artifacts and combined entries.
    assert_eq!(batch_artifacts(dir.path()).len(), 2);
    let combined = std::fs::read_to_string(&summary.combined_path).unwrap();
    assert!(combined.contains("name: Metric 0"));
    assert!(!combined.contains("name: Metric 1"));
    assert!(combined.contains("name: Metric 2"));
}

#[tokio::test]
async fn test_zero_batch_size_fails_before_any_call() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeEndpoint::new());
    let cfg = config(dir.path(), 0, 1);

    let res = runner::run(&cfg, metrics(3), fake.clone()).await;
    assert!(matches!(res, Err(AppError::Config(_))));
    assert_eq!(fake.prompt_count(), 0);
}

#[tokio::test]
async fn test_empty_metric_list_fails_before_any_call() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeEndpoint::new());
    let cfg = config(dir.path(), 5, 1);

    let res = runner::run(&cfg, Vec::new(), fake.clone()).await;
    assert!(matches!(res, Err(AppError::Config(_))));
    assert_eq!(fake.prompt_count(), 0);
}

#[tokio::test]
async fn test_concurrent_batches_do_not_interleave_in_combined() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeEndpoint::new());
    let cfg = config(dir.path(), 1, 4);
    let input = metrics(6);

    let summary = runner::run(&cfg, input.clone(), fake.clone()).await.unwrap();
    assert_eq!(summary.succeeded, 6);

    // Six distinct per-batch artifacts.
    assert_eq!(batch_artifacts(dir.path()).len(), 6);

    // Every entry appears as an intact three-line block, whatever the
    // completion order was.
    let combined = std::fs::read_to_string(&summary.combined_path).unwrap();
    for m in &input {
        let block = format!(
            "- name: {}\n  # {}\n  expr: CONVERTED({})\n",
            m.name, m.expression, m.name
        );
        assert!(combined.contains(&block), "missing intact block for {}", m.name);
    }
    assert_eq!(combined.matches("# BATCH ").count(), 6);
}

/// Smallest interesting run: two measures, batch size one, one worker.
#[tokio::test]
async fn test_two_metric_single_worker_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeEndpoint::new());
    let cfg = config(dir.path(), 1, 1);
    let input = vec![metric("A", "SUM([X])"), metric("B", "SUM([Y])")];

    let summary = runner::run(&cfg, input, fake.clone()).await.unwrap();

    assert_eq!(summary.total_batches, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(batch_artifacts(dir.path()).len(), 2);

    let combined = std::fs::read_to_string(&summary.combined_path).unwrap();
    // Each entry keeps its original DAX as a comment and a non-empty expr.
    assert!(combined.contains("- name: A\n  # SUM([X])\n  expr: CONVERTED(A)"));
    assert!(combined.contains("- name: B\n  # SUM([Y])\n  expr: CONVERTED(B)"));
}
