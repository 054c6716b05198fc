//! Batch processing over a directory of documents.
//!
//! Each file is an independent run with its own audit directory; the batch
//! writes one summary artifact at the audit root. Files are processed in
//! name order, one at a time.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Options;
use crate::error::{PipelineError, RunStatus};
use crate::planner::client::client_from_options;
use crate::planner::ModelClient;

use super::run::{run, RunMode};

pub const BATCH_SUMMARY: &str = "batch_summary.json";

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchEntry {
    pub file: PathBuf,
    pub status: RunStatus,
    pub audit_dir: Option<PathBuf>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchSummary {
    pub schema_version: String,
    pub directory: PathBuf,
    pub total: usize,
    pub succeeded: usize,
    pub entries: Vec<BatchEntry>,
}

pub fn run_batch(
    dir: &Path,
    user_intent: &str,
    options: Options,
) -> Result<BatchSummary, PipelineError> {
    let client = client_from_options(&options).map_err(PipelineError::Config)?;
    run_batch_with_client(dir, user_intent, options, client.as_ref())
}

pub fn run_batch_with_client(
    dir: &Path,
    user_intent: &str,
    options: Options,
    client: &dyn ModelClient,
) -> Result<BatchSummary, PipelineError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("read batch directory {}", dir.display()))
        .map_err(PipelineError::Config)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("docx"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    if files.is_empty() {
        return Err(PipelineError::Config(anyhow!(
            "no .docx files in {}",
            dir.display()
        )));
    }

    let mut entries = Vec::new();
    for file in &files {
        info!(file = %file.display(), "batch item");
        match run(
            file,
            user_intent,
            options.clone(),
            client,
            RunMode::Full,
            None,
        ) {
            Ok(outcome) => entries.push(BatchEntry {
                file: file.clone(),
                status: outcome.status,
                audit_dir: Some(outcome.audit_dir),
                error: outcome.errors.first().cloned(),
            }),
            Err(err) => entries.push(BatchEntry {
                file: file.clone(),
                status: err.status(),
                audit_dir: None,
                error: Some(format!("{}: {err}", err.kind())),
            }),
        }
    }

    let summary = BatchSummary {
        schema_version: "batch.summary.v1".to_string(),
        directory: dir.to_path_buf(),
        total: entries.len(),
        succeeded: entries
            .iter()
            .filter(|entry| entry.status == RunStatus::Success)
            .count(),
        entries,
    };
    let summary_path = options.audit_dir.join(BATCH_SUMMARY);
    let bytes = serde_json::to_vec_pretty(&summary)
        .context("serialise batch summary")
        .map_err(PipelineError::Audit)?;
    fs::create_dir_all(&options.audit_dir)
        .and_then(|_| fs::write(&summary_path, bytes))
        .with_context(|| format!("write {}", summary_path.display()))
        .map_err(PipelineError::Audit)?;
    Ok(summary)
}

impl BatchSummary {
    /// Worst per-file status, for the process exit code.
    pub fn aggregate_status(&self) -> RunStatus {
        self.entries
            .iter()
            .map(|entry| entry.status)
            .max_by_key(|status| status.exit_code())
            .unwrap_or(RunStatus::Unknown)
    }
}
