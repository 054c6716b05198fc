//! `plan.v1` — the only artifact the language model may produce.
//!
//! The whitelist is a closed sum. Unknown operation tags are
//! unrepresentable in `PlanOp`; the gateway additionally rejects unknown
//! fields and out-of-range parameters before a plan is ever constructed.

use serde::{Deserialize, Serialize};

use crate::schema::structure::{Alignment, LineSpacingMode};

pub const SCHEMA_VERSION: &str = "plan.v1";

/// Literal token `clear_direct_formatting` must carry.
pub const AUTHORIZATION_TOKEN: &str = "EXPLICIT_USER_REQUEST";

pub const WHITELISTED_OPERATIONS: &[&str] = &[
    "delete_section_by_heading",
    "update_toc",
    "delete_toc",
    "set_style_rule",
    "reassign_paragraphs_to_style",
    "clear_direct_formatting",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchMode {
    #[default]
    Exact,
    Contains,
    Regex,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TocDeleteMode {
    #[default]
    All,
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FormattingScope {
    Document,
    Selection,
    Style,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPosition {
    StartsWith,
    EndsWith,
    Contains,
}

/// Conjunction of paragraph predicates. At least one member must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ParagraphSelector {
    pub current_style: Option<String>,
    pub text_contains: Option<String>,
    pub heading_level: Option<u8>,
    pub position: Option<TextPosition>,
}

impl ParagraphSelector {
    pub fn is_empty(&self) -> bool {
        self.current_style.is_none() && self.text_contains.is_none() && self.heading_level.is_none()
    }
}

/// Range addressed by `clear_direct_formatting` for the non-document scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RangeSpec {
    pub start_index: Option<usize>,
    pub end_index: Option<usize>,
    pub style_name: Option<String>,
}

/// Provenance of an operation. Reserved for the comments-as-instructions
/// extension; the planner emits `user_intent` or nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpSource {
    UserIntent,
    Anchor,
    Section,
    Global,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum PlanOp {
    DeleteSectionByHeading {
        heading_text: String,
        level: u8,
        #[serde(rename = "match", default)]
        match_mode: MatchMode,
        #[serde(default)]
        case_sensitive: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        occurrence_index: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<OpSource>,
    },
    UpdateToc {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<OpSource>,
    },
    DeleteToc {
        #[serde(default)]
        mode: TocDeleteMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<OpSource>,
    },
    SetStyleRule {
        target_style: String,
        #[serde(default)]
        font_east_asian: Option<String>,
        #[serde(default)]
        font_latin: Option<String>,
        #[serde(default)]
        font_size_pt: Option<f32>,
        #[serde(default)]
        font_bold: Option<bool>,
        #[serde(default)]
        font_italic: Option<bool>,
        #[serde(default)]
        font_color_hex: Option<String>,
        #[serde(default)]
        line_spacing_mode: Option<LineSpacingMode>,
        #[serde(default)]
        line_spacing_value: Option<f32>,
        #[serde(default)]
        space_before_pt: Option<f32>,
        #[serde(default)]
        space_after_pt: Option<f32>,
        #[serde(default)]
        alignment: Option<Alignment>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<OpSource>,
    },
    ReassignParagraphsToStyle {
        selector: ParagraphSelector,
        target_style: String,
        #[serde(default)]
        clear_direct_formatting: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<OpSource>,
    },
    ClearDirectFormatting {
        scope: FormattingScope,
        #[serde(default)]
        range_spec: Option<RangeSpec>,
        authorization: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<OpSource>,
    },
}

impl PlanOp {
    pub fn name(&self) -> &'static str {
        match self {
            PlanOp::DeleteSectionByHeading { .. } => "delete_section_by_heading",
            PlanOp::UpdateToc { .. } => "update_toc",
            PlanOp::DeleteToc { .. } => "delete_toc",
            PlanOp::SetStyleRule { .. } => "set_style_rule",
            PlanOp::ReassignParagraphsToStyle { .. } => "reassign_paragraphs_to_style",
            PlanOp::ClearDirectFormatting { .. } => "clear_direct_formatting",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanV1 {
    pub schema_version: String,
    pub ops: Vec<PlanOp>,
}

impl PlanV1 {
    pub fn new(ops: Vec<PlanOp>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            ops,
        }
    }
}
