//! Run state tracking and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::error::PipelineError;
use crate::warnings::{WarningKind, WarningSink};

/// Externally observable state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Extracting,
    Planning,
    Executing,
    Validating,
    RollingBack,
    Auditing,
    Done,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Idle => "IDLE",
            RunState::Extracting => "EXTRACTING",
            RunState::Planning => "PLANNING",
            RunState::Executing => "EXECUTING",
            RunState::Validating => "VALIDATING",
            RunState::RollingBack => "ROLLING_BACK",
            RunState::Auditing => "AUDITING",
            RunState::Done => "DONE",
        }
    }
}

#[derive(Debug, Default)]
pub struct StateTracker {
    state: Option<RunState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            state: Some(RunState::Idle),
        }
    }

    pub fn enter(&mut self, next: RunState) {
        let from = self.state.unwrap_or(RunState::Idle);
        info!(from = from.as_str(), to = next.as_str(), "run state");
        self.state = Some(next);
    }

    pub fn state(&self) -> RunState {
        self.state.unwrap_or(RunState::Idle)
    }
}

/// Shared flag a caller may set to stop the run at the next stage boundary.
pub type CancelFlag = Arc<AtomicBool>;

/// Check deadline and cancellation. Suspension is cooperative: this runs at
/// stage boundaries only, never mid-operation.
pub fn check_boundary(
    deadline: Instant,
    cancel: Option<&CancelFlag>,
    stage: &'static str,
    sink: &mut WarningSink,
) -> Result<(), PipelineError> {
    if let Some(flag) = cancel {
        if flag.load(Ordering::Relaxed) {
            sink.push(
                WarningKind::Cancellation,
                stage,
                format!("run cancelled before {stage}"),
            );
            return Err(PipelineError::Cancelled {
                stage,
                reason: "cancelled by caller".to_string(),
            });
        }
    }
    if Instant::now() >= deadline {
        sink.push(
            WarningKind::Cancellation,
            stage,
            format!("time limit reached before {stage}"),
        );
        return Err(PipelineError::Cancelled {
            stage,
            reason: "execution time limit exceeded".to_string(),
        });
    }
    Ok(())
}
