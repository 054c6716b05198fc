//! Orchestrator: sequence the stages, own the working copy, guarantee the
//! all-or-nothing outcome.
//!
//! The input file is read once and never written. The working copy lives
//! in a private scratch directory; it is promoted to the output path only
//! after validation passes. Every exit path finalises the audit directory.

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

use crate::audit::{
    AuditRun, AFTER_DOCX, AFTER_STRUCTURE, BEFORE_DOCX, BEFORE_STRUCTURE, DIFF_REPORT, INVENTORY,
    PLAN,
};
use crate::config::{Options, RevisionStrategy};
use crate::docx::package::{DocxPackage, DOCUMENT_PART};
use crate::docx::revision::{accept_revisions, has_revisions, reject_revisions};
use crate::docx::session::Session;
use crate::error::{PipelineError, RunStatus};
use crate::execute::execute;
use crate::extract::extract;
use crate::locale::LocaleTables;
use crate::monitor::{Monitor, Stage};
use crate::planner::{client::client_from_options, plan as plan_gateway, ModelClient, PlanFailure};
use crate::schema::diff;
use crate::schema::structure::StructureV1;
use crate::validate::validate;
use crate::warnings::{WarningKind, WarningSink};

use super::context::{check_boundary, CancelFlag, RunState, StateTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Full,
    /// Extract and plan only; the plan lands in the audit directory and the
    /// document is never touched.
    DryRun,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub output_path: Option<PathBuf>,
    pub audit_dir: PathBuf,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub fn process_document(
    docx_path: &Path,
    user_intent: &str,
    options: Options,
) -> Result<RunOutcome, PipelineError> {
    let client = client_from_options(&options).map_err(PipelineError::Config)?;
    run(
        docx_path,
        user_intent,
        options,
        client.as_ref(),
        RunMode::Full,
        None,
    )
}

pub fn process_document_with_client(
    docx_path: &Path,
    user_intent: &str,
    options: Options,
    client: &dyn ModelClient,
) -> Result<RunOutcome, PipelineError> {
    run(docx_path, user_intent, options, client, RunMode::Full, None)
}

pub fn dry_run(
    docx_path: &Path,
    user_intent: &str,
    options: Options,
) -> Result<RunOutcome, PipelineError> {
    let client = client_from_options(&options).map_err(PipelineError::Config)?;
    run(
        docx_path,
        user_intent,
        options,
        client.as_ref(),
        RunMode::DryRun,
        None,
    )
}

pub fn dry_run_with_client(
    docx_path: &Path,
    user_intent: &str,
    options: Options,
    client: &dyn ModelClient,
) -> Result<RunOutcome, PipelineError> {
    run(docx_path, user_intent, options, client, RunMode::DryRun, None)
}

pub fn run(
    docx_path: &Path,
    user_intent: &str,
    options: Options,
    client: &dyn ModelClient,
    mode: RunMode,
    cancel: Option<CancelFlag>,
) -> Result<RunOutcome, PipelineError> {
    options.check().map_err(PipelineError::Config)?;
    let locale = match &options.localisation.tables_path {
        Some(path) => LocaleTables::load(path).map_err(PipelineError::Config)?,
        None => LocaleTables::default(),
    };

    let audit = AuditRun::create(&options.audit_dir).map_err(PipelineError::Audit)?;
    let mut sink = WarningSink::new();
    let mut monitor = Monitor::new(options.monitoring_level);
    let mut tracker = StateTracker::new();
    let deadline = Instant::now() + Duration::from_secs(options.execution_time_limit_s);

    let result = run_stages(
        docx_path,
        user_intent,
        &options,
        &locale,
        client,
        mode,
        cancel.as_ref(),
        deadline,
        &audit,
        &mut sink,
        &mut monitor,
        &mut tracker,
    );

    let (status, output_path, errors) = match result {
        Ok(output_path) => (RunStatus::Success, output_path, Vec::new()),
        Err(err) => {
            tracker.enter(RunState::RollingBack);
            let errors = vec![format!("{}: {err}", err.kind())];
            (err.status(), None, errors)
        }
    };

    tracker.enter(RunState::Auditing);
    monitor.check_memory(&options, &mut sink);
    audit
        .finalize(status, &sink, &errors)
        .map_err(PipelineError::Audit)?;
    tracker.enter(RunState::Done);
    info!(
        status = %status,
        audit_dir = %audit.dir().display(),
        total_ms = monitor.total().as_millis() as u64,
        "run finished"
    );

    Ok(RunOutcome {
        status,
        output_path,
        audit_dir: audit.dir().to_path_buf(),
        errors,
        warnings: sink.messages(),
    })
}

#[allow(clippy::too_many_arguments)]
fn run_stages(
    docx_path: &Path,
    user_intent: &str,
    options: &Options,
    locale: &LocaleTables,
    client: &dyn ModelClient,
    mode: RunMode,
    cancel: Option<&CancelFlag>,
    deadline: Instant,
    audit: &AuditRun,
    sink: &mut WarningSink,
    monitor: &mut Monitor,
    tracker: &mut StateTracker,
) -> Result<Option<PathBuf>, PipelineError> {
    tracker.enter(RunState::Extracting);
    let input_bytes = fs::read(docx_path)
        .with_context(|| format!("read input {}", docx_path.display()))
        .map_err(PipelineError::Extraction)?;
    audit
        .write_bytes(BEFORE_DOCX, &input_bytes)
        .map_err(PipelineError::Audit)?;

    let scratch = tempfile::Builder::new()
        .prefix("autodocx-")
        .tempdir()
        .context("create scratch directory")
        .map_err(PipelineError::Extraction)?;
    let file_name = docx_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "document.docx".into());
    let working = scratch.path().join(file_name);
    fs::write(&working, &input_bytes)
        .with_context(|| format!("create working copy {}", working.display()))
        .map_err(PipelineError::Extraction)?;

    apply_revision_strategy(&working, options.revision_strategy, sink)
        .map_err(PipelineError::Extraction)?;

    check_boundary(deadline, cancel, "extract", sink)?;
    let session = Session::open(&working).map_err(PipelineError::Extraction)?;
    let (before_structure, inventory) = monitor
        .time(Stage::Extract, || extract(&session, sink))
        .map_err(PipelineError::Extraction)?;
    audit
        .write_json(BEFORE_STRUCTURE, &before_structure)
        .map_err(PipelineError::Audit)?;
    audit
        .write_json(INVENTORY, &inventory)
        .map_err(PipelineError::Audit)?;
    monitor.check_memory(options, sink);

    check_boundary(deadline, cancel, "plan", sink)?;
    tracker.enter(RunState::Planning);
    let plan = match monitor.time(Stage::Plan, || {
        plan_gateway(client, &before_structure, user_intent, options, sink)
    }) {
        Ok(outcome) => {
            audit
                .write_json(PLAN, &outcome.plan)
                .map_err(PipelineError::Audit)?;
            outcome.plan
        }
        Err(PlanFailure::Rejected(rejection)) => {
            // The rejected reply is still evidence; it goes into the audit
            // directory verbatim.
            if let Some(raw) = &rejection.raw_reply {
                audit.write_bytes(PLAN, raw).map_err(PipelineError::Audit)?;
            }
            write_failure_diff(audit, &before_structure, &input_bytes);
            return Err(PipelineError::InvalidPlan {
                issues: rejection.issues,
            });
        }
        Err(PlanFailure::Transport(err)) => {
            write_failure_diff(audit, &before_structure, &input_bytes);
            return Err(PipelineError::Planning(err));
        }
    };

    if mode == RunMode::DryRun {
        write_failure_diff(audit, &before_structure, &input_bytes);
        return Ok(None);
    }

    check_boundary(deadline, cancel, "execute", sink)?;
    tracker.enter(RunState::Executing);
    let mut session = session;
    if let Err(err) = monitor.time(Stage::Execute, || {
        execute(&plan, &mut session, locale, sink)
    }) {
        // The working copy on disk is only written after a fully successful
        // execution, so discarding the session is the rollback.
        restore_working_copy(&working, &input_bytes, sink);
        write_failure_diff(audit, &before_structure, &input_bytes);
        return Err(PipelineError::Execution(err));
    }
    if session.is_dirty() {
        if let Err(err) = session.save_to(&working) {
            restore_working_copy(&working, &input_bytes, sink);
            write_failure_diff(audit, &before_structure, &input_bytes);
            return Err(PipelineError::Execution(err));
        }
    }
    drop(session);

    check_boundary(deadline, cancel, "validate", sink)?;
    tracker.enter(RunState::Validating);
    let post_session = Session::open(&working).map_err(PipelineError::Execution)?;
    let outcome = monitor
        .time(Stage::Validate, || {
            validate(
                &before_structure,
                &post_session,
                &options.validation_rules,
                locale,
                sink,
            )
        })
        .map_err(PipelineError::Execution)?;
    if !outcome.is_valid {
        restore_working_copy(&working, &input_bytes, sink);
        write_failure_diff(audit, &before_structure, &input_bytes);
        return Err(PipelineError::FailedValidation {
            failures: outcome.failures,
        });
    }

    let after_bytes = fs::read(&working)
        .context("read modified working copy")
        .map_err(PipelineError::Execution)?;
    audit
        .write_bytes(AFTER_DOCX, &after_bytes)
        .map_err(PipelineError::Audit)?;
    audit
        .write_json(AFTER_STRUCTURE, &outcome.structure_after)
        .map_err(PipelineError::Audit)?;
    let report = diff::compute(
        &before_structure,
        Some(&outcome.structure_after),
        &input_bytes,
        Some(&after_bytes),
    );
    audit
        .write_json(DIFF_REPORT, &report)
        .map_err(PipelineError::Audit)?;

    let output_path = options
        .output_path
        .clone()
        .unwrap_or_else(|| default_output_path(docx_path));
    fs::copy(&working, &output_path)
        .with_context(|| format!("promote working copy to {}", output_path.display()))
        .map_err(PipelineError::Execution)?;
    Ok(Some(output_path))
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("document");
    input.with_file_name(format!("{stem}_processed.docx"))
}

/// Byte-level restore shared by the execution and validation failure paths.
fn restore_working_copy(working: &Path, input_bytes: &[u8], sink: &mut WarningSink) {
    if let Err(err) = fs::write(working, input_bytes) {
        sink.push(
            WarningKind::General,
            "rollback",
            format!("could not restore working copy: {err}"),
        );
    }
}

/// A failed or dry run still records the structural snapshot it saw.
fn write_failure_diff(audit: &AuditRun, before: &StructureV1, before_bytes: &[u8]) {
    let report = diff::compute(before, None, before_bytes, None);
    if let Err(err) = audit.write_json(DIFF_REPORT, &report) {
        tracing::warn!("could not write diff report: {err:#}");
    }
}

fn apply_revision_strategy(
    working: &Path,
    strategy: RevisionStrategy,
    sink: &mut WarningSink,
) -> anyhow::Result<()> {
    let mut package = DocxPackage::open(working)?;
    let document_xml = package.part_text(DOCUMENT_PART)?;
    match strategy {
        RevisionStrategy::Bypass => {
            if has_revisions(&document_xml) {
                sink.push(
                    WarningKind::Revision,
                    "extract",
                    "document carries tracked changes; extracting as-is (bypass)",
                );
            }
            Ok(())
        }
        RevisionStrategy::Accept | RevisionStrategy::Reject => {
            let (rewritten, changed) = if strategy == RevisionStrategy::Accept {
                accept_revisions(&document_xml)?
            } else {
                reject_revisions(&document_xml)?
            };
            if changed {
                sink.push(
                    WarningKind::Revision,
                    "extract",
                    match strategy {
                        RevisionStrategy::Accept => "accepted all tracked changes",
                        _ => "rejected all tracked changes",
                    },
                );
                package.set_part(DOCUMENT_PART, rewritten.into_bytes());
                package.save_to(working)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_sits_next_to_the_input() {
        let output = default_output_path(Path::new("/tmp/papers/thesis.docx"));
        assert_eq!(output, Path::new("/tmp/papers/thesis_processed.docx"));
    }

    #[test]
    fn missing_input_is_an_extraction_error() {
        let root = tempfile::tempdir().unwrap();
        let options = Options {
            audit_dir: root.path().join("audit"),
            ..Options::default()
        };
        struct NoCall;
        impl ModelClient for NoCall {
            fn complete(&self, _: &str, _: &str) -> anyhow::Result<Vec<u8>> {
                Err(anyhow::anyhow!("must not be called"))
            }
        }
        let outcome = run(
            Path::new("/nonexistent/input.docx"),
            "intent",
            options,
            &NoCall,
            RunMode::Full,
            None,
        )
        .expect("audit dir still finalised");
        assert_eq!(outcome.status, RunStatus::Error);
        assert!(outcome.errors[0].contains("EXTRACTION_ERROR"));
        assert!(outcome.audit_dir.join("result.status.txt").exists());
    }
}
