//! Planner gateway: the single boundary to the language model.
//!
//! The model is a text-in/bytes-out callable. Everything it returns passes
//! the validation stack (JSON, schema, whitelist, parameter ranges,
//! structural coherence) before the rest of the pipeline may see it. A
//! reply that fails JSON parsing is retried a bounded number of times with
//! an explicit reminder; schema or whitelist failures are never salvaged.

pub mod client;
pub mod prompt;
pub mod validate;

use anyhow::Context;

use crate::config::Options;
use crate::schema::plan::PlanV1;
use crate::schema::structure::StructureV1;
use crate::warnings::{WarningKind, WarningSink};

pub use client::{CommandModelClient, HttpModelClient, ModelClient};

/// Replies larger than this are a transport fault, not a plan.
const MAX_REPLY_BYTES: usize = 1 << 20;

#[derive(Debug)]
pub struct PlanOutcome {
    pub plan: PlanV1,
    pub raw_reply: Vec<u8>,
    pub attempts: u32,
}

#[derive(Debug)]
pub struct PlanRejection {
    pub issues: Vec<String>,
    pub raw_reply: Option<Vec<u8>>,
}

#[derive(Debug)]
pub enum PlanFailure {
    /// The model answered, but the reply is not a valid plan.
    Rejected(PlanRejection),
    /// The model could not be reached or misbehaved at the transport level.
    Transport(anyhow::Error),
}

pub fn plan(
    client: &dyn ModelClient,
    structure: &StructureV1,
    user_intent: &str,
    options: &Options,
    sink: &mut WarningSink,
) -> Result<PlanOutcome, PlanFailure> {
    let system = prompt::system_prompt();
    let user = match prompt::user_prompt(structure, user_intent) {
        Ok(user) => user,
        Err(err) => return Err(PlanFailure::Transport(err)),
    };

    let total_attempts = options.max_json_retries.saturating_add(1);
    let mut last_parse_error = String::new();
    let mut last_reply: Option<Vec<u8>> = None;

    for attempt in 1..=total_attempts {
        let user_prompt = if attempt == 1 {
            user.clone()
        } else {
            format!("{user}\n\n{}", prompt::JSON_ONLY_REMINDER)
        };
        let reply = client
            .complete(&system, &user_prompt)
            .context("language model call")
            .map_err(PlanFailure::Transport)?;
        if reply.len() > MAX_REPLY_BYTES {
            return Err(PlanFailure::Transport(anyhow::anyhow!(
                "model reply of {} bytes exceeds the {MAX_REPLY_BYTES}-byte ceiling",
                reply.len()
            )));
        }

        match validate::validate_reply(&reply) {
            Ok(plan) => {
                if attempt > 1 {
                    sink.push(
                        WarningKind::General,
                        "plan",
                        format!("model produced valid JSON on attempt {attempt}"),
                    );
                }
                return Ok(PlanOutcome {
                    plan,
                    raw_reply: reply,
                    attempts: attempt,
                });
            }
            Err(validate::Rejection::NotJson(detail)) => {
                sink.push(
                    WarningKind::General,
                    "plan",
                    format!("attempt {attempt}: reply was not JSON ({detail})"),
                );
                last_parse_error = detail;
                last_reply = Some(reply);
            }
            Err(validate::Rejection::Invalid(issues)) => {
                return Err(PlanFailure::Rejected(PlanRejection {
                    issues,
                    raw_reply: Some(reply),
                }));
            }
        }
    }

    Err(PlanFailure::Rejected(PlanRejection {
        issues: vec![format!(
            "reply was not parseable JSON after {total_attempts} attempts: {last_parse_error}"
        )],
        raw_reply: last_reply,
    }))
}
