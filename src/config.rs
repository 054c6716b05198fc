//! Run configuration: options, validation rules, and file loaders.
//!
//! Config files are JSON or YAML, selected by extension. Unknown fields are
//! rejected so a typo never silently falls back to a default.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringLevel {
    Basic,
    Detailed,
    Debug,
    Performance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionStrategy {
    /// Accept all tracked changes before extraction.
    Accept,
    /// Reject all tracked changes before extraction.
    Reject,
    /// Extract as-is and record a warning.
    Bypass,
}

/// Expected properties for one named style, checked by the style assertion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StyleExpectation {
    pub font_east_asian: Option<String>,
    pub font_latin: Option<String>,
    pub font_size_pt: Option<f32>,
    pub font_bold: Option<bool>,
    pub line_spacing_mode: Option<crate::schema::structure::LineSpacingMode>,
    pub line_spacing_value: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ValidationRules {
    /// Level-1 headings that must not survive a run.
    pub forbidden_level1_headings: Vec<String>,
    /// Named styles that must match a declared spec after execution.
    pub style_expectations: BTreeMap<String, StyleExpectation>,
    pub check_toc: bool,
    pub check_pagination: bool,
    pub check_integrity: bool,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            forbidden_level1_headings: vec![
                "摘要".to_string(),
                "参考文献".to_string(),
                "Abstract".to_string(),
                "References".to_string(),
            ],
            style_expectations: BTreeMap::new(),
            check_toc: true,
            check_pagination: true,
            check_integrity: true,
        }
    }
}

/// Reserved surface for the comments-as-instructions extension. Parsed and
/// carried, not yet acted on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CommentOptions {
    pub enabled: bool,
    pub execute_tag_only: bool,
    pub llm_fallback: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LocalisationOptions {
    /// Optional JSON/YAML file overriding the built-in alias and font tables.
    pub tables_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Options {
    pub model_id: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub max_json_retries: u32,
    pub audit_dir: PathBuf,
    pub output_path: Option<PathBuf>,
    pub execution_time_limit_s: u64,
    pub memory_warning_mb: u64,
    pub memory_critical_mb: u64,
    pub monitoring_level: MonitoringLevel,
    pub localisation: LocalisationOptions,
    pub validation_rules: ValidationRules,
    pub revision_strategy: RevisionStrategy,
    pub comments: CommentOptions,
    /// When set, the planner invokes this argv instead of the HTTP endpoint.
    /// `{prompt}` is substituted; without it the prompt is piped on stdin.
    pub model_command: Option<Vec<String>>,
    pub api_key_env: String,
    pub api_base_url: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            model_id: "gpt-4o".to_string(),
            temperature: 0.1,
            max_output_tokens: 4096,
            max_json_retries: 2,
            audit_dir: PathBuf::from("audit_runs"),
            output_path: None,
            execution_time_limit_s: 300,
            memory_warning_mb: 1024,
            memory_critical_mb: 2048,
            monitoring_level: MonitoringLevel::Basic,
            localisation: LocalisationOptions::default(),
            validation_rules: ValidationRules::default(),
            revision_strategy: RevisionStrategy::Accept,
            comments: CommentOptions::default(),
            model_command: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl Options {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        parse_by_extension(&raw, path)
    }

    /// Validate ranges that serde cannot express.
    pub fn check(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow!("temperature {} out of range [0,2]", self.temperature));
        }
        if self.max_output_tokens == 0 {
            return Err(anyhow!("max_output_tokens must be positive"));
        }
        if self.execution_time_limit_s == 0 {
            return Err(anyhow!("execution_time_limit_s must be positive"));
        }
        if self.memory_critical_mb < self.memory_warning_mb {
            return Err(anyhow!(
                "memory_critical_mb {} below memory_warning_mb {}",
                self.memory_critical_mb,
                self.memory_warning_mb
            ));
        }
        if let Some(command) = &self.model_command {
            if command.is_empty() {
                return Err(anyhow!("model_command must not be empty"));
            }
        }
        Ok(())
    }

    /// YAML template written by `config create`.
    pub fn template_yaml() -> String {
        let options = Options::default();
        serde_yaml::to_string(&options).unwrap_or_default()
    }
}

fn parse_by_extension<T: serde::de::DeserializeOwned>(raw: &str, path: &Path) -> Result<T> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match extension.as_str() {
        "json" => serde_json::from_str(raw)
            .with_context(|| format!("parse JSON config {}", path.display())),
        "yaml" | "yml" => serde_yaml::from_str(raw)
            .with_context(|| format!("parse YAML config {}", path.display())),
        other => Err(anyhow!(
            "unsupported config extension {other:?} for {}",
            path.display()
        )),
    }
}

/// Shared loader for auxiliary rule files (localisation tables, validation
/// rules) that follow the same JSON/YAML convention.
pub fn load_rules_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("read rules {}", path.display()))?;
    parse_by_extension(&raw, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_their_own_check() {
        Options::default().check().expect("defaults valid");
    }

    #[test]
    fn yaml_round_trip_keeps_defaults() {
        let template = Options::template_yaml();
        let parsed: Options = serde_yaml::from_str(&template).expect("template parses");
        assert_eq!(parsed, Options::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = r#"{"model_id": "gpt-4o", "no_such_option": true}"#;
        let result: Result<Options> = parse_by_extension(raw, Path::new("config.json"));
        assert!(result.is_err());
    }

    #[test]
    fn forbidden_heading_defaults_cover_both_scripts() {
        let rules = ValidationRules::default();
        assert!(rules.forbidden_level1_headings.contains(&"摘要".to_string()));
        assert!(rules
            .forbidden_level1_headings
            .contains(&"References".to_string()));
    }

    #[test]
    fn inverted_memory_thresholds_fail_check() {
        let options = Options {
            memory_warning_mb: 4096,
            memory_critical_mb: 1024,
            ..Options::default()
        };
        assert!(options.check().is_err());
    }
}
