//! CLI entry point: parse arguments, initialise tracing, dispatch, and map
//! the run status onto the documented exit codes.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use autodocx::cli::{BatchArgs, Command, ConfigAction, ConfigArgs, ProcessArgs, RootArgs, StatusArgs};
use autodocx::config::{MonitoringLevel, Options};
use autodocx::error::RunStatus;
use autodocx::workflow;

fn main() -> ExitCode {
    let args = RootArgs::parse();
    match dispatch(args) {
        Ok(status) => ExitCode::from(status.exit_code() as u8),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(RunStatus::Error.exit_code() as u8)
        }
    }
}

fn dispatch(args: RootArgs) -> Result<RunStatus> {
    match args.command {
        Command::Process(process) => {
            let options = load_options(process.config.as_deref(), &process)?;
            init_tracing(options.monitoring_level);
            let outcome = workflow::process_document(&process.docx, &process.intent, options)?;
            report_outcome(&outcome);
            Ok(outcome.status)
        }
        Command::DryRun(process) => {
            let options = load_options(process.config.as_deref(), &process)?;
            init_tracing(options.monitoring_level);
            let outcome = workflow::dry_run(&process.docx, &process.intent, options)?;
            println!("plan written to {}", outcome.audit_dir.join("plan.v1.json").display());
            report_outcome(&outcome);
            Ok(outcome.status)
        }
        Command::Batch(batch) => {
            let options = batch_options(&batch)?;
            init_tracing(options.monitoring_level);
            let summary = workflow::run_batch(&batch.dir, &batch.intent, options)?;
            println!(
                "batch finished: {}/{} succeeded",
                summary.succeeded, summary.total
            );
            for entry in &summary.entries {
                println!("  {:<18} {}", entry.status.to_string(), entry.file.display());
            }
            Ok(summary.aggregate_status())
        }
        Command::Status(StatusArgs { config, json }) => {
            let options = base_options(config.as_deref())?;
            init_tracing(options.monitoring_level);
            let report = workflow::gather_status(&options);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", workflow::render_status(&report));
            }
            Ok(RunStatus::Success)
        }
        Command::Config(ConfigArgs { action }) => match action {
            ConfigAction::Show { config } => {
                let options = base_options(config.as_deref())?;
                println!("{}", serde_yaml::to_string(&options)?);
                Ok(RunStatus::Success)
            }
            ConfigAction::Create { path } => {
                std::fs::write(&path, Options::template_yaml())
                    .with_context(|| format!("write template {}", path.display()))?;
                println!("wrote configuration template to {}", path.display());
                Ok(RunStatus::Success)
            }
        },
    }
}

fn base_options(config: Option<&Path>) -> Result<Options> {
    match config {
        Some(path) => Options::load(path),
        None => Ok(Options::default()),
    }
}

fn load_options(config: Option<&Path>, args: &ProcessArgs) -> Result<Options> {
    let mut options = base_options(config)?;
    if let Some(output) = &args.output {
        options.output_path = Some(output.clone());
    }
    if let Some(audit_dir) = &args.audit_dir {
        options.audit_dir = audit_dir.clone();
    }
    Ok(options)
}

fn batch_options(args: &BatchArgs) -> Result<Options> {
    let mut options = base_options(args.config.as_deref())?;
    if let Some(audit_dir) = &args.audit_dir {
        options.audit_dir = audit_dir.clone();
    }
    Ok(options)
}

fn init_tracing(level: MonitoringLevel) {
    let default_filter = match level {
        MonitoringLevel::Basic => "autodocx=info",
        MonitoringLevel::Detailed | MonitoringLevel::Performance => "autodocx=debug",
        MonitoringLevel::Debug => "autodocx=trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn report_outcome(outcome: &workflow::RunOutcome) {
    println!("status: {}", outcome.status);
    if let Some(output) = &outcome.output_path {
        println!("output: {}", output.display());
    }
    println!("audit:  {}", outcome.audit_dir.display());
    for warning in &outcome.warnings {
        println!("warning: {warning}");
    }
    for error in &outcome.errors {
        eprintln!("error: {error}");
    }
}
