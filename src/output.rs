//! Artifact persistence for conversion results.
//!
//! Each batch gets its own file, and every completed batch is also appended
//! to one combined file for the run. The per-batch name carries the run
//! timestamp plus the batch index, so two batches finishing in the same
//! second never collide. Files are create-only; a name clash with an earlier
//! run errors instead of overwriting.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::batch::MetricBatch;
use crate::error::AppError;

/// Count result entries by their `name:` lines, same heuristic the combined
/// file footer uses. The result text is otherwise opaque.
pub fn count_conversions(text: &str) -> usize {
    text.lines().filter(|line| line.contains("name:")).count()
}

pub struct OutputWriter {
    output_dir: PathBuf,
    /// Wall-clock stamp shared by every artifact of this run.
    run_stamp: String,
    combined_path: PathBuf,
    /// Serializes appends to the combined artifact across workers.
    combined: Mutex<bool>,
}

impl OutputWriter {
    /// Prepare the output directory and fix this run's artifact names.
    pub fn new(output_dir: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(output_dir)?;
        let run_stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let combined_path = output_dir.join(format!("combined_all_metrics_{run_stamp}.txt"));
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            run_stamp,
            combined_path,
            combined: Mutex::new(false),
        })
    }

    /// Path of the run-wide combined artifact.
    pub fn combined_path(&self) -> &Path {
        &self.combined_path
    }

    fn batch_path(&self, batch: &MetricBatch) -> PathBuf {
        self.output_dir.join(format!(
            "converted_metrics_{}_b{:03}.txt",
            self.run_stamp, batch.index
        ))
    }

    /// Write one batch's raw result to its own artifact.
    pub async fn write_batch(
        &self,
        batch: &MetricBatch,
        result: &str,
    ) -> Result<PathBuf, AppError> {
        let path = self.batch_path(batch);
        let mut contents = String::new();
        contents.push_str("# DAX to SparkSQL UC Metric View Conversion Results\n");
        contents.push_str(&format!(
            "# Generated on: {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        contents.push_str(&format!(
            "# Batch {} ({})\n",
            batch.index,
            batch.name_range()
        ));
        contents.push_str(&format!(
            "# Total conversions: {}\n",
            count_conversions(result)
        ));
        contents.push('\n');
        contents.push_str(&"=".repeat(80));
        contents.push_str("\n\n");
        contents.push_str(result);
        if !result.ends_with('\n') {
            contents.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .await?;
        file.write_all(contents.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(path = %path.display(), batch = batch.index, "Wrote batch artifact");
        Ok(path)
    }

    /// Append one batch's raw result to the combined artifact.
    ///
    /// Appends from concurrent workers are serialized by the internal mutex,
    /// so entries never interleave. The run header is written on first use.
    pub async fn append_combined(
        &self,
        batch: &MetricBatch,
        result: &str,
    ) -> Result<(), AppError> {
        let mut header_written = self.combined.lock().await;

        let mut chunk = String::new();
        if !*header_written {
            chunk.push_str("# COMBINED DAX to SparkSQL UC Metric View Conversion Results\n");
            chunk.push_str(&format!(
                "# Generated on: {}\n",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            ));
            chunk.push('\n');
            chunk.push_str(&"=".repeat(100));
            chunk.push_str("\n\n");
        }
        chunk.push_str(&"#".repeat(60));
        chunk.push('\n');
        chunk.push_str(&format!("# BATCH {} ({})\n", batch.index, batch.name_range()));
        chunk.push_str(&"#".repeat(60));
        chunk.push_str("\n\n");
        chunk.push_str(result);
        if !result.ends_with('\n') {
            chunk.push('\n');
        }
        chunk.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.combined_path)
            .await?;
        file.write_all(chunk.as_bytes()).await?;
        file.flush().await?;

        *header_written = true;
        Ok(())
    }

    /// Append the run summary footer to the combined artifact.
    pub async fn write_footer(
        &self,
        total_conversions: usize,
        batches_combined: usize,
    ) -> Result<(), AppError> {
        let _guard = self.combined.lock().await;

        let mut footer = String::new();
        footer.push_str(&"=".repeat(100));
        footer.push('\n');
        footer.push_str(&format!(
            "# SUMMARY: Total {total_conversions} metrics converted from {batches_combined} batches\n"
        ));
        footer.push_str(&format!(
            "# Combined file generated: {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        footer.push_str(&"=".repeat(100));
        footer.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.combined_path)
            .await?;
        file.write_all(footer.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
