//! Intent-driven DOCX transformation.
//!
//! The pipeline is a five-stage closed loop over a working copy of the
//! input: Extract projects the document into a skeleton plus a lossless
//! inventory, the Planner gateway turns a natural-language intent into a
//! whitelisted `plan.v1`, the Executor applies the plan through the
//! document engine, the Validator re-checks invariants, and the Auditor
//! leaves a timestamped directory that makes the run reproducible. A run
//! either succeeds completely or leaves the input byte-identical.

pub mod audit;
pub mod cli;
pub mod config;
pub mod docx;
pub mod error;
pub mod execute;
pub mod extract;
pub mod locale;
pub mod monitor;
pub mod planner;
pub mod schema;
pub mod util;
pub mod validate;
pub mod warnings;
pub mod workflow;

pub use error::{PipelineError, RunStatus};
pub use workflow::{process_document, process_document_with_client, RunOutcome};
