//! The validation stack between the model and the pipeline.
//!
//! Stages: JSON parse, top-level schema, operation whitelist, per-operation
//! field sets and parameter ranges, structural coherence. Every issue
//! carries the JSON path it was found at.

use regex::Regex;
use serde_json::Value;

use crate::schema::plan::{
    FormattingScope, MatchMode, PlanOp, PlanV1, AUTHORIZATION_TOKEN, SCHEMA_VERSION,
    WHITELISTED_OPERATIONS,
};
use crate::schema::structure::is_hex_color;

const MAX_NAME_LENGTH: usize = 255;
const MAX_PATTERN_LENGTH: usize = 512;

#[derive(Debug)]
pub enum Rejection {
    /// The reply is not JSON at all; the gateway may retry.
    NotJson(String),
    /// The reply is JSON but not a valid plan; never retried.
    Invalid(Vec<String>),
}

pub fn validate_reply(raw: &[u8]) -> Result<PlanV1, Rejection> {
    let text = std::str::from_utf8(raw)
        .map_err(|err| Rejection::NotJson(format!("reply is not UTF-8: {err}")))?;
    let text = text.trim();
    let body = fenced_body(text).unwrap_or(text);
    let value: Value =
        serde_json::from_str(body).map_err(|err| Rejection::NotJson(err.to_string()))?;
    validate_value(&value).map_err(Rejection::Invalid)
}

/// A reply wrapped in a markdown fence still counts as a JSON attempt; the
/// fence and its info string are not part of the plan. Returns `None` when
/// the reply is not fenced.
fn fenced_body(text: &str) -> Option<&str> {
    let after_open = text.strip_prefix("```")?;
    // The opening line carries at most an info string ("json"); the plan
    // starts on the next line.
    let (_, body) = after_open.split_once('\n')?;
    let inner = match body.rfind("\n```") {
        Some(close) => &body[..close],
        None => body.strip_suffix("```").unwrap_or(body),
    };
    Some(inner.trim())
}

pub fn validate_value(value: &Value) -> Result<PlanV1, Vec<String>> {
    let mut issues = Vec::new();

    let Some(object) = value.as_object() else {
        return Err(vec!["$: plan must be a JSON object".to_string()]);
    };

    for key in object.keys() {
        if key != "schema_version" && key != "ops" {
            issues.push(format!("$.{key}: unknown field"));
        }
    }
    match object.get("schema_version") {
        None => issues.push("$.schema_version: missing".to_string()),
        Some(Value::String(version)) if version == SCHEMA_VERSION => {}
        Some(other) => issues.push(format!(
            "$.schema_version: expected {SCHEMA_VERSION:?}, found {other}"
        )),
    }

    let mut ops = Vec::new();
    match object.get("ops") {
        None => issues.push("$.ops: missing".to_string()),
        Some(Value::Array(raw_ops)) => {
            for (index, raw_op) in raw_ops.iter().enumerate() {
                match validate_op(raw_op, index) {
                    Ok(op) => ops.push(op),
                    Err(mut op_issues) => issues.append(&mut op_issues),
                }
            }
        }
        Some(_) => issues.push("$.ops: must be an array".to_string()),
    }

    if issues.is_empty() {
        Ok(PlanV1::new(ops))
    } else {
        Err(issues)
    }
}

fn validate_op(raw: &Value, index: usize) -> Result<PlanOp, Vec<String>> {
    let path = format!("$.ops[{index}]");
    let Some(object) = raw.as_object() else {
        return Err(vec![format!("{path}: operation must be an object")]);
    };

    let Some(operation) = object.get("operation").and_then(Value::as_str) else {
        return Err(vec![format!("{path}.operation: missing or not a string")]);
    };
    if !WHITELISTED_OPERATIONS.contains(&operation) {
        return Err(vec![format!(
            "{path}.operation: {operation:?} is not a whitelisted operation"
        )]);
    }

    let mut issues = Vec::new();
    let allowed = allowed_keys(operation);
    for key in object.keys() {
        if !allowed.contains(&key.as_str()) {
            issues.push(format!("{path}.{key}: unknown field for {operation}"));
        }
    }
    check_for_markup(raw, &path, &mut issues);
    if !issues.is_empty() {
        return Err(issues);
    }

    let op: PlanOp = serde_json::from_value(raw.clone())
        .map_err(|err| vec![format!("{path}: {err}")])?;
    check_ranges(&op, &path, &mut issues);
    if issues.is_empty() {
        Ok(op)
    } else {
        Err(issues)
    }
}

fn allowed_keys(operation: &str) -> &'static [&'static str] {
    match operation {
        "delete_section_by_heading" => &[
            "operation",
            "heading_text",
            "level",
            "match",
            "case_sensitive",
            "occurrence_index",
            "source",
        ],
        "update_toc" => &["operation", "source"],
        "delete_toc" => &["operation", "mode", "source"],
        "set_style_rule" => &[
            "operation",
            "target_style",
            "font_east_asian",
            "font_latin",
            "font_size_pt",
            "font_bold",
            "font_italic",
            "font_color_hex",
            "line_spacing_mode",
            "line_spacing_value",
            "space_before_pt",
            "space_after_pt",
            "alignment",
            "source",
        ],
        "reassign_paragraphs_to_style" => &[
            "operation",
            "selector",
            "target_style",
            "clear_direct_formatting",
            "source",
        ],
        "clear_direct_formatting" => &[
            "operation",
            "scope",
            "range_spec",
            "authorization",
            "source",
        ],
        _ => &[],
    }
}

/// The model must never smuggle OOXML or markup through string parameters.
fn check_for_markup(value: &Value, path: &str, issues: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            if text.contains("<w:") || text.contains("<?xml") || text.contains("</") {
                issues.push(format!("{path}: string parameter contains markup"));
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                check_for_markup(item, &format!("{path}[{index}]"), issues);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                check_for_markup(item, &format!("{path}.{key}"), issues);
            }
        }
        _ => {}
    }
}

fn style_name_ok(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_NAME_LENGTH && !name.chars().any(char::is_control)
}

fn check_ranges(op: &PlanOp, path: &str, issues: &mut Vec<String>) {
    match op {
        PlanOp::DeleteSectionByHeading {
            heading_text,
            level,
            match_mode,
            occurrence_index,
            ..
        } => {
            if heading_text.trim().is_empty() || heading_text.len() > MAX_NAME_LENGTH {
                issues.push(format!("{path}.heading_text: must be 1-{MAX_NAME_LENGTH} bytes"));
            }
            if !(1..=9).contains(level) {
                issues.push(format!("{path}.level: {level} out of [1,9]"));
            }
            if let Some(occurrence) = occurrence_index {
                if *occurrence < 1 {
                    issues.push(format!("{path}.occurrence_index: must be >= 1"));
                }
            }
            if *match_mode == MatchMode::Regex {
                if heading_text.len() > MAX_PATTERN_LENGTH {
                    issues.push(format!(
                        "{path}.heading_text: pattern longer than {MAX_PATTERN_LENGTH} bytes"
                    ));
                } else if let Err(err) = Regex::new(heading_text) {
                    issues.push(format!("{path}.heading_text: invalid pattern: {err}"));
                }
            }
        }
        PlanOp::UpdateToc { .. } | PlanOp::DeleteToc { .. } => {}
        PlanOp::SetStyleRule {
            target_style,
            font_size_pt,
            font_color_hex,
            line_spacing_value,
            space_before_pt,
            space_after_pt,
            ..
        } => {
            if !style_name_ok(target_style) {
                issues.push(format!("{path}.target_style: invalid style name"));
            }
            if let Some(size) = font_size_pt {
                if !(6.0..=72.0).contains(size) {
                    issues.push(format!("{path}.font_size_pt: {size} out of [6,72]"));
                }
            }
            if let Some(color) = font_color_hex {
                if !is_hex_color(color) {
                    issues.push(format!("{path}.font_color_hex: {color:?} is not #RRGGBB"));
                }
            }
            if let Some(value) = line_spacing_value {
                if !(0.5..=10.0).contains(value) {
                    issues.push(format!(
                        "{path}.line_spacing_value: {value} out of [0.5,10.0]"
                    ));
                }
            }
            for (field, value) in [
                ("space_before_pt", space_before_pt),
                ("space_after_pt", space_after_pt),
            ] {
                if let Some(points) = value {
                    if !(0.0..=1000.0).contains(points) {
                        issues.push(format!("{path}.{field}: {points} out of [0,1000]"));
                    }
                }
            }
        }
        PlanOp::ReassignParagraphsToStyle {
            selector,
            target_style,
            ..
        } => {
            if !style_name_ok(target_style) {
                issues.push(format!("{path}.target_style: invalid style name"));
            }
            if selector.is_empty() {
                issues.push(format!("{path}.selector: at least one predicate required"));
            }
            if let Some(style) = &selector.current_style {
                if !style_name_ok(style) {
                    issues.push(format!("{path}.selector.current_style: invalid style name"));
                }
            }
            if let Some(level) = selector.heading_level {
                if !(1..=9).contains(&level) {
                    issues.push(format!(
                        "{path}.selector.heading_level: {level} out of [1,9]"
                    ));
                }
            }
            if selector.position.is_some() && selector.text_contains.is_none() {
                issues.push(format!(
                    "{path}.selector.position: requires text_contains"
                ));
            }
        }
        PlanOp::ClearDirectFormatting {
            scope,
            range_spec,
            authorization,
            ..
        } => {
            if authorization != AUTHORIZATION_TOKEN {
                issues.push(format!(
                    "{path}.authorization: literal {AUTHORIZATION_TOKEN:?} required"
                ));
            }
            match scope {
                FormattingScope::Document => {}
                FormattingScope::Selection => match range_spec {
                    Some(range) if range.start_index.is_some() && range.end_index.is_some() => {
                        let (start, end) = (range.start_index.unwrap(), range.end_index.unwrap());
                        if start > end {
                            issues.push(format!(
                                "{path}.range_spec: start_index {start} beyond end_index {end}"
                            ));
                        }
                    }
                    _ => issues.push(format!(
                        "{path}.range_spec: SELECTION scope requires start_index and end_index"
                    )),
                },
                FormattingScope::Style => {
                    let named = range_spec
                        .as_ref()
                        .and_then(|range| range.style_name.as_deref())
                        .map(style_name_ok)
                        .unwrap_or(false);
                    if !named {
                        issues.push(format!(
                            "{path}.range_spec: STYLE scope requires a valid style_name"
                        ));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(raw: &str) -> Result<PlanV1, Rejection> {
        validate_reply(raw.as_bytes())
    }

    fn invalid_issues(raw: &str) -> Vec<String> {
        match validate(raw) {
            Err(Rejection::Invalid(issues)) => issues,
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn accepts_the_seed_scenario_plan() {
        let plan = validate(
            r#"{"schema_version":"plan.v1","ops":[
                {"operation":"delete_section_by_heading","heading_text":"摘要","level":1,"match":"EXACT","case_sensitive":false},
                {"operation":"delete_section_by_heading","heading_text":"参考文献","level":1,"match":"EXACT","case_sensitive":false},
                {"operation":"update_toc"}
            ]}"#,
        )
        .expect("valid plan");
        assert_eq!(plan.ops.len(), 3);
    }

    #[test]
    fn accepts_fenced_json() {
        let plan = validate("```json\n{\"schema_version\":\"plan.v1\",\"ops\":[]}\n```")
            .expect("fences stripped");
        assert!(plan.ops.is_empty());
    }

    #[test]
    fn accepts_a_fence_left_unclosed() {
        let plan = validate("```json\n{\"schema_version\":\"plan.v1\",\"ops\":[]}")
            .expect("open fence tolerated");
        assert!(plan.ops.is_empty());
    }

    #[test]
    fn rejects_unknown_operation_with_path() {
        let issues = invalid_issues(
            r#"{"schema_version":"plan.v1","ops":[{"operation":"run_macro","name":"evil"}]}"#,
        );
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("$.ops[0].operation"));
        assert!(issues[0].contains("run_macro"));
    }

    #[test]
    fn rejects_extra_top_level_fields() {
        let issues =
            invalid_issues(r#"{"schema_version":"plan.v1","ops":[],"note":"hello"}"#);
        assert!(issues.iter().any(|i| i.contains("$.note")));
    }

    #[test]
    fn rejects_empty_object() {
        let issues = invalid_issues("{}");
        assert!(issues.iter().any(|i| i.contains("schema_version")));
        assert!(issues.iter().any(|i| i.contains("$.ops")));
    }

    #[test]
    fn rejects_unknown_op_fields() {
        let issues = invalid_issues(
            r#"{"schema_version":"plan.v1","ops":[{"operation":"update_toc","force":true}]}"#,
        );
        assert!(issues[0].contains("$.ops[0].force"));
    }

    #[test]
    fn rejects_out_of_range_level_and_size() {
        let issues = invalid_issues(
            r#"{"schema_version":"plan.v1","ops":[
                {"operation":"delete_section_by_heading","heading_text":"x","level":12},
                {"operation":"set_style_rule","target_style":"Normal","font_size_pt":300}
            ]}"#,
        );
        assert!(issues.iter().any(|i| i.contains("$.ops[0].level")));
        assert!(issues.iter().any(|i| i.contains("$.ops[1].font_size_pt")));
    }

    #[test]
    fn rejects_bad_hex_color() {
        let issues = invalid_issues(
            r#"{"schema_version":"plan.v1","ops":[{"operation":"set_style_rule","target_style":"Normal","font_color_hex":"red"}]}"#,
        );
        assert!(issues[0].contains("font_color_hex"));
    }

    #[test]
    fn rejects_missing_authorization_token() {
        let issues = invalid_issues(
            r#"{"schema_version":"plan.v1","ops":[{"operation":"clear_direct_formatting","scope":"DOCUMENT","authorization":"please"}]}"#,
        );
        assert!(issues[0].contains("EXPLICIT_USER_REQUEST"));
    }

    #[test]
    fn rejects_embedded_ooxml() {
        let issues = invalid_issues(
            r#"{"schema_version":"plan.v1","ops":[{"operation":"set_style_rule","target_style":"<w:style/>"}]}"#,
        );
        assert!(issues.iter().any(|i| i.contains("contains markup")));
    }

    #[test]
    fn rejects_invalid_regex_patterns() {
        let issues = invalid_issues(
            r#"{"schema_version":"plan.v1","ops":[{"operation":"delete_section_by_heading","heading_text":"([","level":1,"match":"REGEX"}]}"#,
        );
        assert!(issues[0].contains("invalid pattern"));
    }

    #[test]
    fn rejects_empty_selector() {
        let issues = invalid_issues(
            r#"{"schema_version":"plan.v1","ops":[{"operation":"reassign_paragraphs_to_style","selector":{},"target_style":"Normal"}]}"#,
        );
        assert!(issues[0].contains("selector"));
    }

    #[test]
    fn truncated_json_is_a_parse_failure_not_a_rejection() {
        match validate(r#"{"schema_version":"plan.v1","ops":[{"opera"#) {
            Err(Rejection::NotJson(_)) => {}
            other => panic!("expected NotJson, got {other:?}"),
        }
    }

    #[test]
    fn wrong_schema_version_is_rejected() {
        let issues = invalid_issues(r#"{"schema_version":"plan.v2","ops":[]}"#);
        assert!(issues[0].contains("plan.v2"));
    }

    #[test]
    fn selection_scope_requires_a_range() {
        let issues = invalid_issues(
            r#"{"schema_version":"plan.v1","ops":[{"operation":"clear_direct_formatting","scope":"SELECTION","authorization":"EXPLICIT_USER_REQUEST"}]}"#,
        );
        assert!(issues[0].contains("range_spec"));
    }
}
