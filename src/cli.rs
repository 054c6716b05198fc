use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the document transformation pipeline.
#[derive(Parser, Debug)]
#[command(
    name = "autodocx",
    version,
    about = "Intent-driven DOCX transformation with a transactional audit trail",
    after_help = "Exit codes:\n  0 SUCCESS\n  1 ERROR\n  2 FAILED_VALIDATION\n  3 ROLLBACK\n  4 INVALID_PLAN\n  5 UNKNOWN\n\nExamples:\n  autodocx process thesis.docx \"删除摘要和参考文献章节并更新目录\"\n  autodocx batch ./papers \"update the table of contents\"\n  autodocx dry-run thesis.docx \"remove the abstract\"\n  autodocx status\n  autodocx config create autodocx.yaml",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full pipeline on one document
    Process(ProcessArgs),
    /// Process every .docx in a directory and write a batch summary
    Batch(BatchArgs),
    /// Extract and plan only; write the plan into the audit directory
    DryRun(ProcessArgs),
    /// Print environment diagnostics
    Status(StatusArgs),
    /// Show or template the configuration
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct ProcessArgs {
    /// Input document (never modified in place)
    pub docx: PathBuf,

    /// Natural-language intent, passed to the planner verbatim
    pub intent: String,

    /// Configuration file (JSON or YAML)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output path for the modified document
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Audit root directory
    #[arg(long, value_name = "DIR")]
    pub audit_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct BatchArgs {
    /// Directory containing .docx files
    pub dir: PathBuf,

    /// Natural-language intent applied to every document
    pub intent: String,

    /// Configuration file (JSON or YAML)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Audit root directory
    #[arg(long, value_name = "DIR")]
    pub audit_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Configuration file (JSON or YAML)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show {
        /// Configuration file (JSON or YAML)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Write a configuration template
    Create {
        /// Destination path for the template
        path: PathBuf,
    },
}
