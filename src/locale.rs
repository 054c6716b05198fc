//! Style-name aliases and font fallback chains.
//!
//! Lookup order for styles: exact name, canonical-to-localised alias,
//! localised-to-canonical alias, then a case-insensitive scan of the
//! document's own styles. Fonts resolve through per-font fallback chains
//! against a configured host font set; an exhausted chain falls back to the
//! host default for the script rather than failing.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::config::load_rules_file;
use crate::warnings::{WarningKind, WarningSink};

pub const HOST_DEFAULT_LATIN: &str = "Calibri";
pub const HOST_DEFAULT_EAST_ASIAN: &str = "宋体";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontScript {
    EastAsian,
    Latin,
}

/// On-disk shape of a localisation table override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LocaleTablesFile {
    pub style_aliases: BTreeMap<String, String>,
    pub font_fallbacks: BTreeMap<String, Vec<String>>,
    pub available_fonts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LocaleTables {
    /// Canonical name to localised equivalent.
    style_aliases: BTreeMap<String, String>,
    font_fallbacks: BTreeMap<String, Vec<String>>,
    available_fonts: BTreeSet<String>,
}

impl Default for LocaleTables {
    fn default() -> Self {
        let mut style_aliases = BTreeMap::new();
        for level in 1..=9u8 {
            style_aliases.insert(format!("Heading {level}"), format!("标题 {level}"));
        }
        for (canonical, localised) in [
            ("Normal", "正文"),
            ("Title", "标题"),
            ("Subtitle", "副标题"),
            ("Body Text", "正文文本"),
            ("Caption", "题注"),
            ("Header", "页眉"),
            ("Footer", "页脚"),
        ] {
            style_aliases.insert(canonical.to_string(), localised.to_string());
        }

        let mut font_fallbacks = BTreeMap::new();
        for (primary, chain) in [
            ("楷体", vec!["楷体_GB2312", "STKaiti", "KaiTi"]),
            ("宋体", vec!["SimSun", "NSimSun"]),
            ("黑体", vec!["SimHei", "Microsoft YaHei", "微软雅黑"]),
            ("仿宋", vec!["FangSong", "仿宋_GB2312", "FangSong_GB2312"]),
            ("微软雅黑", vec!["Microsoft YaHei", "Microsoft YaHei UI"]),
            ("Times New Roman", vec!["Times", "Liberation Serif"]),
            ("Arial", vec!["Helvetica", "Liberation Sans"]),
            ("Calibri", vec!["Carlito", "Arial"]),
        ] {
            font_fallbacks.insert(
                primary.to_string(),
                chain.into_iter().map(str::to_string).collect(),
            );
        }

        let available_fonts = [
            "Arial",
            "Times New Roman",
            "Calibri",
            "Helvetica",
            "宋体",
            "黑体",
            "仿宋",
            "微软雅黑",
            "SimSun",
            "SimHei",
            "Microsoft YaHei",
            "STKaiti",
            "KaiTi",
            "FangSong",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        Self {
            style_aliases,
            font_fallbacks,
            available_fonts,
        }
    }
}

impl LocaleTables {
    /// Load an override file; omitted sections keep the built-in tables.
    pub fn load(path: &Path) -> Result<Self> {
        let file: LocaleTablesFile = load_rules_file(path)?;
        let mut tables = LocaleTables::default();
        if !file.style_aliases.is_empty() {
            tables.style_aliases = file.style_aliases;
        }
        if !file.font_fallbacks.is_empty() {
            tables.font_fallbacks = file.font_fallbacks;
        }
        if !file.available_fonts.is_empty() {
            tables.available_fonts = file.available_fonts.into_iter().collect();
        }
        Ok(tables)
    }

    /// Resolve a requested style name against the styles defined in the
    /// document. Returns `None` when nothing matches, which callers treat as
    /// a NOOP or a rejection depending on the operation.
    pub fn resolve_style(
        &self,
        requested: &str,
        document_styles: &[String],
        sink: &mut WarningSink,
    ) -> Option<String> {
        let defined: BTreeSet<&str> = document_styles.iter().map(String::as_str).collect();
        if defined.contains(requested) {
            return Some(requested.to_string());
        }

        if let Some(localised) = self.style_aliases.get(requested) {
            if defined.contains(localised.as_str()) {
                sink.push(
                    WarningKind::StyleAlias,
                    "execute",
                    format!("style alias used: {requested} -> {localised}"),
                );
                return Some(localised.clone());
            }
        }

        for (canonical, localised) in &self.style_aliases {
            if localised == requested && defined.contains(canonical.as_str()) {
                sink.push(
                    WarningKind::StyleAlias,
                    "execute",
                    format!("style alias used: {requested} -> {canonical}"),
                );
                return Some(canonical.clone());
            }
        }

        let lowered = requested.to_lowercase();
        for name in document_styles {
            if name.to_lowercase() == lowered {
                sink.push(
                    WarningKind::StyleAlias,
                    "execute",
                    format!("style case mismatch: {requested} -> {name}"),
                );
                return Some(name.clone());
            }
        }

        None
    }

    pub fn font_available(&self, font: &str) -> bool {
        self.available_fonts.contains(font)
    }

    /// Resolve a font through its fallback chain. Deterministic for a frozen
    /// table and host font set.
    pub fn resolve_font(
        &self,
        requested: &str,
        script: FontScript,
        sink: &mut WarningSink,
    ) -> String {
        if self.font_available(requested) {
            return requested.to_string();
        }

        let Some(chain) = self.font_fallbacks.get(requested) else {
            // No chain configured: identity, the document keeps the name it
            // asked for.
            sink.push(
                WarningKind::FontFallback,
                "execute",
                format!("font not available and no fallback chain: {requested} kept as-is"),
            );
            return requested.to_string();
        };
        for candidate in chain {
            if self.font_available(candidate) {
                sink.push(
                    WarningKind::FontFallback,
                    "execute",
                    format!("font fallback: {requested} -> {candidate}"),
                );
                return candidate.clone();
            }
        }

        let host_default = match script {
            FontScript::EastAsian => HOST_DEFAULT_EAST_ASIAN,
            FontScript::Latin => HOST_DEFAULT_LATIN,
        };
        sink.push(
            WarningKind::FontFallback,
            "execute",
            format!("font unavailable, chain exhausted: {requested} -> {host_default}"),
        );
        host_default.to_string()
    }
}
