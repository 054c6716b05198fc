//! Post-run assertions over the modified document.
//!
//! The validator re-extracts the document and compares against the
//! configured rules. Failures trigger rollback; warnings do not.

use anyhow::Result;

use crate::config::{StyleExpectation, ValidationRules};
use crate::docx::session::Session;
use crate::extract::extract;
use crate::locale::LocaleTables;
use crate::schema::structure::{StructureV1, StyleDefinition};
use crate::util::normalize_heading_text;
use crate::warnings::{WarningKind, WarningSink};

const SIZE_TOLERANCE_PT: f32 = 0.01;

#[derive(Debug)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub failures: Vec<String>,
    pub structure_after: StructureV1,
}

pub fn validate(
    before: &StructureV1,
    session: &Session,
    rules: &ValidationRules,
    locale: &LocaleTables,
    sink: &mut WarningSink,
) -> Result<ValidationOutcome> {
    let (after, _) = extract(session, sink)?;
    let mut failures = Vec::new();

    check_chapters(&after, rules, &mut failures);
    check_styles(&after, rules, locale, sink, &mut failures);
    if rules.check_toc {
        check_toc(&after, &mut failures, sink);
    }
    if rules.check_pagination {
        check_pagination(before, &after, &mut failures);
    }
    if rules.check_integrity {
        failures.extend(after.integrity_failures());
    }

    Ok(ValidationOutcome {
        is_valid: failures.is_empty(),
        failures,
        structure_after: after,
    })
}

fn check_chapters(after: &StructureV1, rules: &ValidationRules, failures: &mut Vec<String>) {
    for heading in after.headings_at_level(1) {
        let text = normalize_heading_text(&heading.text).to_lowercase();
        for forbidden in &rules.forbidden_level1_headings {
            if text.contains(&forbidden.to_lowercase()) {
                failures.push(format!(
                    "chapter assertion: forbidden level-1 heading {:?} remains at paragraph {}",
                    heading.text, heading.paragraph_index
                ));
            }
        }
    }
}

fn find_style<'a>(
    after: &'a StructureV1,
    name: &str,
    locale: &LocaleTables,
    sink: &mut WarningSink,
) -> Option<&'a StyleDefinition> {
    let names = after.style_names();
    let resolved = locale.resolve_style(name, &names, sink)?;
    after.styles.iter().find(|s| s.name == resolved)
}

fn check_styles(
    after: &StructureV1,
    rules: &ValidationRules,
    locale: &LocaleTables,
    sink: &mut WarningSink,
    failures: &mut Vec<String>,
) {
    for (name, expected) in &rules.style_expectations {
        let Some(style) = find_style(after, name, locale, sink) else {
            failures.push(format!("style assertion: style {name:?} not found"));
            continue;
        };
        style_failures(name, style, expected, failures);
    }
}

fn style_failures(
    name: &str,
    style: &StyleDefinition,
    expected: &StyleExpectation,
    failures: &mut Vec<String>,
) {
    if let Some(font) = &expected.font_east_asian {
        if style.font.east_asian.as_deref() != Some(font.as_str()) {
            failures.push(format!(
                "style assertion: {name:?} east asian font is {:?}, expected {font:?}",
                style.font.east_asian
            ));
        }
    }
    if let Some(font) = &expected.font_latin {
        if style.font.latin.as_deref() != Some(font.as_str()) {
            failures.push(format!(
                "style assertion: {name:?} latin font is {:?}, expected {font:?}",
                style.font.latin
            ));
        }
    }
    if let Some(size) = expected.font_size_pt {
        let matches = style
            .font
            .size_pt
            .map(|actual| (actual - size).abs() < SIZE_TOLERANCE_PT)
            .unwrap_or(false);
        if !matches {
            failures.push(format!(
                "style assertion: {name:?} size is {:?}pt, expected {size}pt",
                style.font.size_pt
            ));
        }
    }
    if let Some(bold) = expected.font_bold {
        if style.font.bold != Some(bold) {
            failures.push(format!(
                "style assertion: {name:?} bold is {:?}, expected {bold}",
                style.font.bold
            ));
        }
    }
    if let Some(mode) = expected.line_spacing_mode {
        if style.paragraph.line_spacing_mode != Some(mode) {
            failures.push(format!(
                "style assertion: {name:?} line spacing mode is {:?}, expected {mode:?}",
                style.paragraph.line_spacing_mode
            ));
        }
    }
    if let Some(value) = expected.line_spacing_value {
        let matches = style
            .paragraph
            .line_spacing_value
            .map(|actual| (actual - value).abs() < SIZE_TOLERANCE_PT)
            .unwrap_or(false);
        if !matches {
            failures.push(format!(
                "style assertion: {name:?} line spacing is {:?}, expected {value}",
                style.paragraph.line_spacing_value
            ));
        }
    }
}

/// Every TOC entry must correspond to a live heading with the same text and
/// page number.
fn check_toc(after: &StructureV1, failures: &mut Vec<String>, sink: &mut WarningSink) {
    for field in after.fields.iter().filter(|f| f.field_type == "TOC") {
        let Some(result) = &field.result else {
            continue;
        };
        for line in result.lines().filter(|line| !line.trim().is_empty()) {
            let Some((entry_text, entry_page)) = parse_toc_entry(line) else {
                sink.push(
                    WarningKind::General,
                    "validate",
                    format!("unparseable TOC entry {line:?}"),
                );
                continue;
            };
            let matched = after.headings.iter().any(|heading| {
                normalize_heading_text(&heading.text) == entry_text
                    && heading.page_number == entry_page
            });
            if !matched {
                failures.push(format!(
                    "toc assertion: entry {entry_text:?} (page {entry_page}) matches no heading"
                ));
            }
        }
    }
}

fn parse_toc_entry(line: &str) -> Option<(String, u32)> {
    let (text, page) = line.rsplit_once('\t')?;
    Some((
        normalize_heading_text(text),
        page.trim().parse().ok()?,
    ))
}

fn check_pagination(before: &StructureV1, after: &StructureV1, failures: &mut Vec<String>) {
    for field in &after.fields {
        if field.needs_update {
            failures.push(format!(
                "pagination assertion: {} field at paragraph {} still needs update",
                field.field_type, field.paragraph_index
            ));
        }
    }
    if let (Some(before_time), Some(after_time)) =
        (before.metadata.modified_time, after.metadata.modified_time)
    {
        if after_time < before_time {
            failures.push(format!(
                "pagination assertion: modified_time {after_time} behind the pre-run {before_time}"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::structure::{
        DocumentMetadata, FieldReference, FontSpec, HeadingReference, ParagraphSpec,
        StyleType,
    };

    fn structure_with_heading(text: &str, level: u8, page: u32) -> StructureV1 {
        let mut structure = StructureV1::new(DocumentMetadata::default());
        structure.headings.push(HeadingReference {
            text: text.to_string(),
            level,
            style_name: None,
            paragraph_index: 0,
            page_number: page,
            occurrence: 1,
            in_table: false,
            table_index: None,
        });
        structure
    }

    #[test]
    fn forbidden_heading_fails_the_chapter_assertion() {
        let after = structure_with_heading("摘要", 1, 1);
        let mut failures = Vec::new();
        check_chapters(&after, &ValidationRules::default(), &mut failures);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("摘要"));
    }

    #[test]
    fn level_two_forbidden_text_is_allowed() {
        let after = structure_with_heading("摘要", 2, 1);
        let mut failures = Vec::new();
        check_chapters(&after, &ValidationRules::default(), &mut failures);
        assert!(failures.is_empty());
    }

    #[test]
    fn toc_entry_without_matching_heading_fails() {
        let mut after = structure_with_heading("引言", 1, 2);
        after.fields.push(FieldReference {
            field_type: "TOC".to_string(),
            code: "TOC \\o \"1-3\"".to_string(),
            result: Some("引言\t2\n结论\t9\n".to_string()),
            paragraph_index: 0,
            is_locked: false,
            needs_update: false,
        });
        let mut failures = Vec::new();
        let mut sink = WarningSink::new();
        check_toc(&after, &mut failures, &mut sink);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("结论"));
    }

    #[test]
    fn dirty_fields_fail_pagination() {
        let before = StructureV1::new(DocumentMetadata::default());
        let mut after = StructureV1::new(DocumentMetadata::default());
        after.fields.push(FieldReference {
            field_type: "PAGE".to_string(),
            code: "PAGE".to_string(),
            result: None,
            paragraph_index: 0,
            is_locked: false,
            needs_update: true,
        });
        let mut failures = Vec::new();
        check_pagination(&before, &after, &mut failures);
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn style_expectation_mismatch_is_reported() {
        let style = StyleDefinition {
            name: "Heading 1".to_string(),
            style_type: StyleType::Paragraph,
            font: FontSpec {
                east_asian: Some("宋体".to_string()),
                size_pt: Some(16.0),
                ..Default::default()
            },
            paragraph: ParagraphSpec::default(),
            is_builtin: true,
            is_modified: true,
        };
        let expected = StyleExpectation {
            font_east_asian: Some("STKaiti".to_string()),
            font_size_pt: Some(12.0),
            ..Default::default()
        };
        let mut failures = Vec::new();
        style_failures("Heading 1", &style, &expected, &mut failures);
        assert_eq!(failures.len(), 2);
    }
}
