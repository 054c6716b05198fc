//! Model transports: a configurable subprocess and an OpenAI-compatible
//! HTTP endpoint. The API key is read from the environment at call setup
//! and never written to logs or audit artifacts.

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use std::env;
use std::io::Write;
use std::process::{Command, Stdio};

use crate::config::Options;

pub trait ModelClient {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<Vec<u8>>;
}

const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Spawn a configured argv. A `{prompt}` placeholder receives the combined
/// prompt inline; an argv without one gets the prompt on stdin.
pub struct CommandModelClient {
    argv: Vec<String>,
}

impl CommandModelClient {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.is_empty() {
            return Err(anyhow!("model command is empty"));
        }
        Ok(Self { argv })
    }

    /// Accepts either a JSON array or a shell-style string.
    pub fn from_spec(spec: &str) -> Result<Self> {
        let argv = if spec.trim_start().starts_with('[') {
            serde_json::from_str(spec).context("parse model command JSON")?
        } else {
            shell_words::split(spec).context("parse model command line")?
        };
        Self::new(argv)
    }

    /// Render the argv against a prompt. Substitution consumes the prompt;
    /// when no placeholder is present the prompt must travel on stdin.
    fn render_argv(&self, prompt: &str) -> (Vec<String>, bool) {
        let mut inlined = false;
        let argv = self
            .argv
            .iter()
            .map(|arg| {
                if arg == PROMPT_PLACEHOLDER {
                    inlined = true;
                    prompt.to_string()
                } else {
                    arg.clone()
                }
            })
            .collect();
        (argv, inlined)
    }
}

impl ModelClient for CommandModelClient {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<Vec<u8>> {
        let prompt = format!("{system_prompt}\n\n{user_prompt}");
        let (argv, inlined) = self.render_argv(&prompt);
        let stdin_payload = if inlined { None } else { Some(prompt.as_str()) };
        capture_stdout(&argv, stdin_payload)
    }
}

/// Run one process to completion and return its stdout, feeding the given
/// payload on stdin when present.
fn capture_stdout(argv: &[String], stdin_payload: Option<&str>) -> Result<Vec<u8>> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("model command is empty"))?;
    let mut child = Command::new(program)
        .args(args)
        .stdin(match stdin_payload {
            Some(_) => Stdio::piped(),
            None => Stdio::null(),
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawn model command {program}"))?;
    if let Some(payload) = stdin_payload {
        let mut pipe = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("model command stdin unavailable"))?;
        pipe.write_all(payload.as_bytes())
            .context("feed model prompt")?;
    }
    let captured = child
        .wait_with_output()
        .context("collect model output")?;
    if !captured.status.success() {
        return Err(anyhow!(
            "model command exited with {}: {}",
            captured.status,
            String::from_utf8_lossy(&captured.stderr).trim()
        ));
    }
    Ok(captured.stdout)
}

/// OpenAI-compatible chat completions over HTTP, blocking.
pub struct HttpModelClient {
    base_url: String,
    model_id: String,
    temperature: f32,
    max_tokens: u32,
    api_key: String,
}

impl HttpModelClient {
    pub fn from_options(options: &Options) -> Result<Self> {
        let api_key = env::var(&options.api_key_env)
            .map_err(|_| anyhow!("environment variable {} is not set", options.api_key_env))?;
        Ok(Self {
            base_url: options.api_base_url.trim_end_matches('/').to_string(),
            model_id: options.model_id.clone(),
            temperature: options.temperature,
            max_tokens: options.max_output_tokens,
            api_key,
        })
    }
}

impl ModelClient for HttpModelClient {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<Vec<u8>> {
        let body = json!({
            "model": self.model_id,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
        });
        let client = reqwest::blocking::Client::new();
        let response = client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .context("send model request")?
            .error_for_status()
            .context("model endpoint returned an error status")?;
        let envelope: Value = response.json().context("decode model response")?;
        let content = envelope
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("model response missing choices[0].message.content"))?;
        Ok(content.as_bytes().to_vec())
    }
}

/// Build the transport the options describe: an explicit subprocess wins
/// over the HTTP endpoint.
pub fn client_from_options(options: &Options) -> Result<Box<dyn ModelClient>> {
    if let Some(argv) = &options.model_command {
        return Ok(Box::new(CommandModelClient::new(argv.clone())?));
    }
    Ok(Box::new(HttpModelClient::from_options(options)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_spec_accepts_shell_strings_and_json() {
        let shell = CommandModelClient::from_spec("cat -").unwrap();
        assert_eq!(shell.argv, vec!["cat", "-"]);
        let json = CommandModelClient::from_spec(r#"["model-cli", "--json"]"#).unwrap();
        assert_eq!(json.argv, vec!["model-cli", "--json"]);
        assert!(CommandModelClient::from_spec("").is_err());
    }

    #[test]
    fn render_argv_reports_placeholder_use() {
        let client =
            CommandModelClient::new(vec!["run".to_string(), PROMPT_PLACEHOLDER.to_string()])
                .unwrap();
        let (argv, inlined) = client.render_argv("hello");
        assert!(inlined);
        assert_eq!(argv, vec!["run", "hello"]);

        let bare = CommandModelClient::new(vec!["run".to_string()]).unwrap();
        let (_, inlined) = bare.render_argv("hello");
        assert!(!inlined);
    }

    #[test]
    fn stdin_transport_round_trips_through_cat() {
        let client = CommandModelClient::new(vec!["cat".to_string()]).unwrap();
        let reply = client.complete("system", "user").unwrap();
        let text = String::from_utf8(reply).unwrap();
        assert!(text.contains("system"));
        assert!(text.contains("user"));
    }

    #[test]
    fn placeholder_transport_inlines_the_prompt() {
        let client =
            CommandModelClient::new(vec!["echo".to_string(), PROMPT_PLACEHOLDER.to_string()])
                .unwrap();
        let reply = client.complete("system half", "user half").unwrap();
        let text = String::from_utf8(reply).unwrap();
        assert!(text.contains("system half"));
        assert!(text.contains("user half"));
    }
}
