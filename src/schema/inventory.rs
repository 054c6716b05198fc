//! `inventory.full.v1` — the loss-closure partner of `structure.v1`.
//!
//! Everything the skeleton cannot faithfully represent is captured here as
//! raw OOXML or an opaque reference, so the pair remains a lossless
//! projection for planning and validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SCHEMA_VERSION: &str = "inventory.full.v1";

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MediaReference {
    pub media_id: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub embedded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentControlReference {
    pub control_id: String,
    pub control_type: String,
    pub tag: Option<String>,
    pub title: Option<String>,
    pub paragraph_index: Option<usize>,
    /// Captured `w:sdt` fragment.
    pub xml: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormulaReference {
    pub formula_id: String,
    pub paragraph_index: Option<usize>,
    pub xml: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Chart,
    SmartArt,
    Ole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChartReference {
    pub chart_id: String,
    pub kind: ChartKind,
    pub part_name: Option<String>,
    pub xml: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryFullV1 {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Stable part key (the package part name) to raw XML text.
    pub ooxml_fragments: BTreeMap<String, String>,
    pub media_indexes: BTreeMap<String, MediaReference>,
    pub content_controls: Vec<ContentControlReference>,
    pub formulas: Vec<FormulaReference>,
    pub charts: Vec<ChartReference>,
}

impl Default for InventoryFullV1 {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            ooxml_fragments: BTreeMap::new(),
            media_indexes: BTreeMap::new(),
            content_controls: Vec::new(),
            formulas: Vec::new(),
            charts: Vec::new(),
        }
    }
}
