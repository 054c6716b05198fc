//! `structure.v1` — the skeleton projection of a document.
//!
//! The skeleton carries indirect references only: headings, fields, and
//! table cells point at paragraph indices, never at each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const SCHEMA_VERSION: &str = "structure.v1";
pub const PREVIEW_TEXT_CAP: usize = 120;

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LineSpacingMode {
    Single,
    Multiple,
    Exactly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleType {
    Paragraph,
    Character,
    Table,
    Linked,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub created_time: Option<DateTime<Utc>>,
    pub modified_time: Option<DateTime<Utc>>,
    pub application_version: Option<String>,
    pub page_count: Option<u32>,
    pub paragraph_count: Option<u32>,
    pub word_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FontSpec {
    pub east_asian: Option<String>,
    pub latin: Option<String>,
    pub size_pt: Option<f32>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub color_hex: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ParagraphSpec {
    pub line_spacing_mode: Option<LineSpacingMode>,
    pub line_spacing_value: Option<f32>,
    pub space_before_pt: Option<f32>,
    pub space_after_pt: Option<f32>,
    pub alignment: Option<Alignment>,
    pub indent_left_pt: Option<f32>,
    pub indent_right_pt: Option<f32>,
    pub indent_first_line_pt: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StyleDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub style_type: StyleType,
    pub font: FontSpec,
    pub paragraph: ParagraphSpec,
    pub is_builtin: bool,
    pub is_modified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParagraphSkeleton {
    pub index: usize,
    pub style_name: Option<String>,
    pub preview_text: String,
    pub is_heading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_level: Option<u8>,
    pub page_number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeadingReference {
    pub text: String,
    pub level: u8,
    pub style_name: Option<String>,
    pub paragraph_index: usize,
    pub page_number: u32,
    /// 1-based occurrence among headings sharing text and level, in document
    /// order. Disambiguates duplicates for `occurrence_index` targeting.
    pub occurrence: u32,
    pub in_table: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldReference {
    #[serde(rename = "type")]
    pub field_type: String,
    pub code: String,
    pub result: Option<String>,
    pub paragraph_index: usize,
    pub is_locked: bool,
    pub needs_update: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSkeleton {
    pub index: usize,
    pub paragraph_index: usize,
    pub rows: u32,
    pub columns: u32,
    pub has_header: bool,
    pub style_name: Option<String>,
    /// Paragraph indices of every cell, row-major. Merged cells repeat the
    /// covering paragraph index.
    pub cell_references: Vec<usize>,
    pub has_merged_cells: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructureV1 {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub metadata: DocumentMetadata,
    pub styles: Vec<StyleDefinition>,
    pub paragraphs: Vec<ParagraphSkeleton>,
    pub headings: Vec<HeadingReference>,
    pub fields: Vec<FieldReference>,
    pub tables: Vec<TableSkeleton>,
}

impl StructureV1 {
    pub fn new(metadata: DocumentMetadata) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            metadata,
            styles: Vec::new(),
            paragraphs: Vec::new(),
            headings: Vec::new(),
            fields: Vec::new(),
            tables: Vec::new(),
        }
    }

    pub fn style_names(&self) -> Vec<String> {
        self.styles.iter().map(|s| s.name.clone()).collect()
    }

    pub fn headings_at_level(&self, level: u8) -> impl Iterator<Item = &HeadingReference> {
        self.headings.iter().filter(move |h| h.level == level)
    }

    /// Internal-consistency failures. An empty result is the index-coherence
    /// invariant every emitted structure must satisfy.
    pub fn integrity_failures(&self) -> Vec<String> {
        let mut failures = Vec::new();

        if self.schema_version != SCHEMA_VERSION {
            failures.push(format!(
                "schema_version is {:?}, expected {SCHEMA_VERSION:?}",
                self.schema_version
            ));
        }

        for (expected, paragraph) in self.paragraphs.iter().enumerate() {
            if paragraph.index != expected {
                failures.push(format!(
                    "paragraph index {} at position {expected} breaks contiguity",
                    paragraph.index
                ));
                break;
            }
        }

        let paragraph_count = self.paragraphs.len();
        for paragraph in &self.paragraphs {
            if paragraph.preview_text.chars().count() > PREVIEW_TEXT_CAP {
                failures.push(format!(
                    "paragraph {} preview exceeds {PREVIEW_TEXT_CAP} scalars",
                    paragraph.index
                ));
            }
            if let Some(level) = paragraph.heading_level {
                if !(1..=9).contains(&level) {
                    failures.push(format!(
                        "paragraph {} heading level {level} out of [1,9]",
                        paragraph.index
                    ));
                }
            }
        }

        for heading in &self.headings {
            if heading.paragraph_index >= paragraph_count {
                failures.push(format!(
                    "heading {:?} references missing paragraph {}",
                    heading.text, heading.paragraph_index
                ));
            }
            if !(1..=9).contains(&heading.level) {
                failures.push(format!(
                    "heading {:?} level {} out of [1,9]",
                    heading.text, heading.level
                ));
            }
        }

        for field in &self.fields {
            if field.paragraph_index >= paragraph_count {
                failures.push(format!(
                    "field {} references missing paragraph {}",
                    field.field_type, field.paragraph_index
                ));
            }
        }

        for table in &self.tables {
            for cell in &table.cell_references {
                if *cell >= paragraph_count {
                    failures.push(format!(
                        "table {} cell references missing paragraph {cell}",
                        table.index
                    ));
                }
            }
        }

        let defined: BTreeSet<&str> = self.styles.iter().map(|s| s.name.as_str()).collect();
        for paragraph in &self.paragraphs {
            if let Some(style) = &paragraph.style_name {
                if !defined.contains(style.as_str()) {
                    failures.push(format!(
                        "paragraph {} references undefined style {style:?}",
                        paragraph.index
                    ));
                }
            }
        }

        for style in &self.styles {
            if let Some(color) = &style.font.color_hex {
                if !is_hex_color(color) {
                    failures.push(format!(
                        "style {:?} color {color:?} is not #RRGGBB",
                        style.name
                    ));
                }
            }
            if let Some(size) = style.font.size_pt {
                if !(6.0..=72.0).contains(&size) {
                    failures.push(format!("style {:?} size {size}pt out of [6,72]", style.name));
                }
            }
            if let Some(value) = style.paragraph.line_spacing_value {
                if !(0.5..=10.0).contains(&value) {
                    failures.push(format!(
                        "style {:?} line spacing {value} out of [0.5,10.0]",
                        style.name
                    ));
                }
            }
        }

        failures
    }
}

pub fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}
