//! The scoped engine handle a run works through.
//!
//! A `Session` owns the open package and the parsed document and styles.
//! It is not clonable; the orchestrator acquires it and lends it to the
//! Extractor, Executor, and Validator in turn. Nothing is written back to
//! disk unless the session was marked dirty and `save` is called.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};

use super::document::{DocumentXml, ParaAddress, Paragraph};
use super::package::{DocxPackage, DOCUMENT_PART, STYLES_PART};
use super::styles::StyleSheet;

/// A heading as the engine sees it: outline level resolved through direct
/// properties, the style chain, then builtin heading-style names.
#[derive(Debug, Clone)]
pub struct HeadingInfo {
    pub address: ParaAddress,
    /// Dense paragraph ordinal, identical to the skeleton index.
    pub ordinal: usize,
    pub text: String,
    pub level: u8,
    pub style_id: Option<String>,
    pub page: u32,
}

#[derive(Debug)]
pub struct Session {
    package: DocxPackage,
    document: DocumentXml,
    styles: StyleSheet,
    dirty: bool,
}

impl Session {
    pub fn open(path: &Path) -> Result<Self> {
        let package = DocxPackage::open(path)?;
        if package.is_protected() {
            return Err(anyhow!(
                "document {} is protected and cannot be processed",
                path.display()
            ));
        }
        Self::from_package(package)
    }

    pub fn from_package(package: DocxPackage) -> Result<Self> {
        let document_xml = package.part_text(DOCUMENT_PART)?;
        let document = DocumentXml::parse(&document_xml).context("parse word/document.xml")?;
        let styles_xml = package.part_text(STYLES_PART).unwrap_or_else(|_| {
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <w:styles xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             </w:styles>"
                .to_string()
        });
        let styles = StyleSheet::parse(&styles_xml).context("parse word/styles.xml")?;
        Ok(Self {
            package,
            document,
            styles,
            dirty: false,
        })
    }

    pub fn source_path(&self) -> PathBuf {
        self.package.source_path().to_path_buf()
    }

    pub fn package(&self) -> &DocxPackage {
        &self.package
    }

    pub fn document(&self) -> &DocumentXml {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut DocumentXml {
        &mut self.document
    }

    pub fn styles(&self) -> &StyleSheet {
        &self.styles
    }

    pub fn styles_mut(&mut self) -> &mut StyleSheet {
        &mut self.styles
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Resolved 0-based outline level for a paragraph, if any.
    fn outline_of(&self, paragraph: &Paragraph) -> Option<u8> {
        if let Some(level) = paragraph.outline_level() {
            return Some(level);
        }
        let style_id = paragraph.style_id()?;
        if let Some(level) = self.styles.outline_level_for_id(style_id) {
            return Some(level);
        }
        heading_level_from_style_name(self.styles.name_for_id(style_id).unwrap_or(style_id))
            .map(|level| level - 1)
    }

    /// Heading view over the body. Outline levels beyond 8 are invalid; the
    /// affected ordinals are returned separately so the extractor can warn
    /// and keep them as plain paragraphs.
    pub fn headings(&self) -> (Vec<HeadingInfo>, Vec<usize>) {
        let pages = self.document.page_numbers();
        let mut headings = Vec::new();
        let mut invalid = Vec::new();
        for (ordinal, (address, paragraph)) in self.document.paragraph_refs().iter().enumerate() {
            let Some(outline) = self.outline_of(paragraph) else {
                continue;
            };
            if outline > 8 {
                invalid.push(ordinal);
                continue;
            }
            let text = crate::util::normalize_heading_text(paragraph.text());
            if text.is_empty() {
                continue;
            }
            headings.push(HeadingInfo {
                address: *address,
                ordinal,
                text,
                level: outline + 1,
                style_id: paragraph.style_id().map(str::to_string),
                page: pages.get(ordinal).copied().unwrap_or(1),
            });
        }
        (headings, invalid)
    }

    /// Flush the parsed document and styles into the package and write it.
    pub fn save_to(&mut self, path: &Path) -> Result<()> {
        self.package
            .set_part(DOCUMENT_PART, self.document.to_xml().into_bytes());
        self.package
            .set_part(STYLES_PART, self.styles.to_xml().into_bytes());
        self.package
            .set_modified_time(Utc::now())
            .context("advance modified time")?;
        self.package.save_to(path)
    }
}

/// Builtin heading-style names, canonical and localised.
pub fn heading_level_from_style_name(name: &str) -> Option<u8> {
    let rest = name
        .strip_prefix("Heading ")
        .or_else(|| name.strip_prefix("heading "))
        .or_else(|| name.strip_prefix("标题 "))
        .or_else(|| name.strip_prefix("标题"))?;
    let level: u8 = rest.trim().parse().ok()?;
    (1..=9).contains(&level).then_some(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_style_names_parse_in_both_scripts() {
        assert_eq!(heading_level_from_style_name("Heading 1"), Some(1));
        assert_eq!(heading_level_from_style_name("标题 3"), Some(3));
        assert_eq!(heading_level_from_style_name("标题2"), Some(2));
        assert_eq!(heading_level_from_style_name("Heading 10"), None);
        assert_eq!(heading_level_from_style_name("Normal"), None);
        assert_eq!(heading_level_from_style_name("标题"), None);
    }
}
