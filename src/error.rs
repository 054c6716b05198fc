//! Typed pipeline errors and terminal run statuses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal status of a pipeline run, as surfaced to callers and mapped to
/// process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Rollback,
    FailedValidation,
    InvalidPlan,
    Error,
    Unknown,
}

impl RunStatus {
    /// Token written to `result.status.txt`. The status file carries only the
    /// four audit tokens; hard errors record ROLLBACK there while the caller
    /// sees the finer-grained status.
    pub fn audit_token(self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::FailedValidation => "FAILED_VALIDATION",
            RunStatus::InvalidPlan => "INVALID_PLAN",
            RunStatus::Rollback | RunStatus::Error | RunStatus::Unknown => "ROLLBACK",
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Error => 1,
            RunStatus::FailedValidation => 2,
            RunStatus::Rollback => 3,
            RunStatus::InvalidPlan => 4,
            RunStatus::Unknown => 5,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::Rollback => "ROLLBACK",
            RunStatus::FailedValidation => "FAILED_VALIDATION",
            RunStatus::InvalidPlan => "INVALID_PLAN",
            RunStatus::Error => "ERROR",
            RunStatus::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// Stage errors. Each variant corresponds to one kind in the error taxonomy;
/// the orchestrator maps the earliest failing stage onto the run status.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("extraction failed: {0:#}")]
    Extraction(anyhow::Error),

    #[error("plan rejected: {}", .issues.join("; "))]
    InvalidPlan { issues: Vec<String> },

    #[error("planner stage failed: {0:#}")]
    Planning(anyhow::Error),

    #[error("execution failed: {0:#}")]
    Execution(anyhow::Error),

    #[error("validation failed: {}", .failures.join("; "))]
    FailedValidation { failures: Vec<String> },

    #[error("invalid configuration: {0:#}")]
    Config(anyhow::Error),

    #[error("audit directory error: {0:#}")]
    Audit(anyhow::Error),

    #[error("run cancelled during {stage}: {reason}")]
    Cancelled { stage: &'static str, reason: String },
}

impl PipelineError {
    /// Taxonomy kind, as recorded in warnings.log and the run outcome.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Extraction(_) => "EXTRACTION_ERROR",
            PipelineError::InvalidPlan { .. } => "INVALID_PLAN",
            PipelineError::Planning(_) => "PLANNING_ERROR",
            PipelineError::Execution(_) => "EXECUTION_ERROR",
            PipelineError::FailedValidation { .. } => "FAILED_VALIDATION",
            PipelineError::Config(_) => "CONFIG_ERROR",
            PipelineError::Audit(_) => "AUDIT_ERROR",
            PipelineError::Cancelled { .. } => "CANCELLED",
        }
    }

    pub fn status(&self) -> RunStatus {
        match self {
            PipelineError::InvalidPlan { .. } => RunStatus::InvalidPlan,
            PipelineError::FailedValidation { .. } => RunStatus::FailedValidation,
            PipelineError::Execution(_) | PipelineError::Cancelled { .. } => RunStatus::Rollback,
            PipelineError::Extraction(_)
            | PipelineError::Planning(_)
            | PipelineError::Config(_)
            | PipelineError::Audit(_) => RunStatus::Error,
        }
    }
}
