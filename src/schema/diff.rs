//! Per-run structural delta between the before and after skeletons.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::schema::structure::StructureV1;

pub const SCHEMA_VERSION: &str = "diff.report.v1";

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeadingDelta {
    pub text: String,
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenamedStyle {
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TocDelta {
    pub before_entries: u32,
    pub after_entries: u32,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TimestampDelta {
    pub before_modified: Option<String>,
    pub after_modified: Option<String>,
    pub modified_time_advanced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiffReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub added_styles: Vec<String>,
    pub removed_styles: Vec<String>,
    pub renamed_styles: Vec<RenamedStyle>,
    pub modified_styles: Vec<String>,
    pub added_headings: Vec<HeadingDelta>,
    pub removed_headings: Vec<HeadingDelta>,
    pub toc: TocDelta,
    pub timestamps: TimestampDelta,
    pub before_sha256: String,
    pub after_sha256: Option<String>,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn toc_entries(structure: &StructureV1) -> Vec<String> {
    structure
        .fields
        .iter()
        .filter(|f| f.field_type == "TOC")
        .filter_map(|f| f.result.clone())
        .flat_map(|result| result.lines().map(str::to_string).collect::<Vec<_>>())
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// Build the report for a run. `after` is absent on rollback.
pub fn compute(
    before: &StructureV1,
    after: Option<&StructureV1>,
    before_bytes: &[u8],
    after_bytes: Option<&[u8]>,
) -> DiffReport {
    let mut report = DiffReport {
        schema_version: SCHEMA_VERSION.to_string(),
        added_styles: Vec::new(),
        removed_styles: Vec::new(),
        renamed_styles: Vec::new(),
        modified_styles: Vec::new(),
        added_headings: Vec::new(),
        removed_headings: Vec::new(),
        toc: TocDelta::default(),
        timestamps: TimestampDelta::default(),
        before_sha256: sha256_hex(before_bytes),
        after_sha256: after_bytes.map(sha256_hex),
    };

    report.timestamps.before_modified = before.metadata.modified_time.map(|t| t.to_rfc3339());

    let Some(after) = after else {
        return report;
    };

    report.timestamps.after_modified = after.metadata.modified_time.map(|t| t.to_rfc3339());
    report.timestamps.modified_time_advanced = match (
        before.metadata.modified_time,
        after.metadata.modified_time,
    ) {
        (Some(before_time), Some(after_time)) => after_time > before_time,
        _ => false,
    };

    let before_styles: BTreeMap<&str, &crate::schema::structure::StyleDefinition> =
        before.styles.iter().map(|s| (s.name.as_str(), s)).collect();
    let after_styles: BTreeMap<&str, &crate::schema::structure::StyleDefinition> =
        after.styles.iter().map(|s| (s.name.as_str(), s)).collect();

    let mut removed: Vec<&str> = Vec::new();
    for name in before_styles.keys() {
        match after_styles.get(name) {
            None => removed.push(name),
            Some(after_style) => {
                let before_style = before_styles[name];
                if before_style.font != after_style.font
                    || before_style.paragraph != after_style.paragraph
                {
                    report.modified_styles.push(name.to_string());
                }
            }
        }
    }
    let mut added: Vec<&str> = after_styles
        .keys()
        .filter(|name| !before_styles.contains_key(*name))
        .copied()
        .collect();

    // A removed style whose specs reappear verbatim under a new name reads
    // as a rename rather than a drop-and-add.
    removed.retain(|old_name| {
        let old = before_styles[old_name];
        if let Some(position) = added.iter().position(|new_name| {
            let new = after_styles[new_name];
            old.font == new.font && old.paragraph == new.paragraph
        }) {
            let new_name = added.remove(position);
            report.renamed_styles.push(RenamedStyle {
                before: old_name.to_string(),
                after: new_name.to_string(),
            });
            false
        } else {
            true
        }
    });
    report.added_styles = added.into_iter().map(str::to_string).collect();
    report.removed_styles = removed.into_iter().map(str::to_string).collect();

    let key = |h: &crate::schema::structure::HeadingReference| (h.text.clone(), h.level, h.occurrence);
    let before_headings: Vec<_> = before.headings.iter().map(key).collect();
    let after_headings: Vec<_> = after.headings.iter().map(key).collect();
    for heading in &after.headings {
        if !before_headings.contains(&key(heading)) {
            report.added_headings.push(HeadingDelta {
                text: heading.text.clone(),
                level: heading.level,
            });
        }
    }
    for heading in &before.headings {
        if !after_headings.contains(&key(heading)) {
            report.removed_headings.push(HeadingDelta {
                text: heading.text.clone(),
                level: heading.level,
            });
        }
    }

    let before_toc = toc_entries(before);
    let after_toc = toc_entries(after);
    report.toc.before_entries = before_toc.len() as u32;
    report.toc.after_entries = after_toc.len() as u32;
    report.toc.added = after_toc
        .iter()
        .filter(|entry| !before_toc.contains(entry))
        .cloned()
        .collect();
    report.toc.removed = before_toc
        .iter()
        .filter(|entry| !after_toc.contains(entry))
        .cloned()
        .collect();

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::structure::{
        DocumentMetadata, FontSpec, HeadingReference, ParagraphSpec, StyleDefinition, StyleType,
    };

    fn structure_with_headings(headings: &[(&str, u8)]) -> StructureV1 {
        let mut structure = StructureV1::new(DocumentMetadata::default());
        for (text, level) in headings {
            structure.headings.push(HeadingReference {
                text: text.to_string(),
                level: *level,
                style_name: None,
                paragraph_index: 0,
                page_number: 1,
                occurrence: 1,
                in_table: false,
                table_index: None,
            });
        }
        structure
    }

    #[test]
    fn removed_headings_show_in_the_delta() {
        let before = structure_with_headings(&[("摘要", 1), ("正文", 1)]);
        let after = structure_with_headings(&[("正文", 1)]);
        let report = compute(&before, Some(&after), b"before", Some(b"after"));
        assert_eq!(report.removed_headings.len(), 1);
        assert_eq!(report.removed_headings[0].text, "摘要");
        assert!(report.added_headings.is_empty());
    }

    #[test]
    fn rollback_report_has_no_after_digest() {
        let before = structure_with_headings(&[]);
        let report = compute(&before, None, b"bytes", None);
        assert!(report.after_sha256.is_none());
        assert_eq!(report.before_sha256, sha256_hex(b"bytes"));
    }

    #[test]
    fn same_specs_under_new_name_read_as_rename() {
        let style = |name: &str| StyleDefinition {
            name: name.to_string(),
            style_type: StyleType::Paragraph,
            font: FontSpec {
                east_asian: Some("宋体".to_string()),
                ..Default::default()
            },
            paragraph: ParagraphSpec::default(),
            is_builtin: false,
            is_modified: false,
        };
        let mut before = structure_with_headings(&[]);
        before.styles.push(style("Old Name"));
        let mut after = structure_with_headings(&[]);
        after.styles.push(style("New Name"));
        let report = compute(&before, Some(&after), b"a", Some(b"b"));
        assert_eq!(report.renamed_styles.len(), 1);
        assert!(report.added_styles.is_empty());
        assert!(report.removed_styles.is_empty());
    }
}
