//! DOCX package access: the OOXML zip container and its document
//! properties parts.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::xmlutil::{escape_text, qname};

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const STYLES_PART: &str = "word/styles.xml";
pub const SETTINGS_PART: &str = "word/settings.xml";
pub const CORE_PROPS_PART: &str = "docProps/core.xml";
pub const APP_PROPS_PART: &str = "docProps/app.xml";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreProperties {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppProperties {
    pub application: Option<String>,
    pub app_version: Option<String>,
    pub pages: Option<u32>,
    pub words: Option<u32>,
    pub paragraphs: Option<u32>,
}

/// The zip container, fully materialised as a deterministic part map.
#[derive(Debug, Clone)]
pub struct DocxPackage {
    path: PathBuf,
    parts: BTreeMap<String, Vec<u8>>,
}

impl DocxPackage {
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            fs::File::open(path).with_context(|| format!("open docx {}", path.display()))?;
        let mut archive = zip::ZipArchive::new(file)
            .with_context(|| format!("read docx container {}", path.display()))?;
        let mut parts = BTreeMap::new();
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .with_context(|| format!("read entry {index}"))?;
            if entry.is_dir() {
                continue;
            }
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut bytes)
                .with_context(|| format!("read part {}", entry.name()))?;
            parts.insert(entry.name().to_string(), bytes);
        }
        if !parts.contains_key(DOCUMENT_PART) {
            return Err(anyhow!(
                "{} is not a WordprocessingML package: missing {DOCUMENT_PART}",
                path.display()
            ));
        }
        Ok(Self {
            path: path.to_path_buf(),
            parts,
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.path
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    pub fn part_text(&self, name: &str) -> Result<String> {
        let bytes = self
            .part(name)
            .ok_or_else(|| anyhow!("missing package part {name}"))?;
        String::from_utf8(bytes.to_vec()).with_context(|| format!("part {name} is not UTF-8"))
    }

    pub fn set_part(&mut self, name: &str, bytes: Vec<u8>) {
        self.parts.insert(name.to_string(), bytes);
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Write the container. The temp-file rename keeps a crash from leaving
    /// a half-written document at the destination.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("package.docx");
        let tmp_path = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!(".{file_name}.tmp"));
        {
            let file = fs::File::create(&tmp_path)
                .with_context(|| format!("create {}", tmp_path.display()))?;
            let mut writer = zip::ZipWriter::new(file);
            for (name, bytes) in &self.parts {
                let options = zip::write::FileOptions::default()
                    .compression_method(zip::CompressionMethod::Deflated);
                writer
                    .start_file(name.as_str(), options)
                    .with_context(|| format!("start zip entry {name}"))?;
                writer
                    .write_all(bytes)
                    .with_context(|| format!("write zip entry {name}"))?;
            }
            writer.finish().context("finish docx container")?;
        }
        fs::rename(&tmp_path, path).with_context(|| format!("publish {}", path.display()))?;
        Ok(())
    }

    /// Content types by extension, from `[Content_Types].xml` defaults.
    pub fn default_content_types(&self) -> Result<BTreeMap<String, String>> {
        let mut map = BTreeMap::new();
        let Some(bytes) = self.part(CONTENT_TYPES_PART) else {
            return Ok(map);
        };
        let text = String::from_utf8_lossy(bytes);
        let mut reader = Reader::from_str(&text);
        loop {
            match reader.read_event().context("parse content types")? {
                Event::Empty(start) | Event::Start(start) => {
                    if qname(start.name().as_ref()) == "Default" {
                        let extension = super::xmlutil::attr(&start, "Extension")?;
                        let content_type = super::xmlutil::attr(&start, "ContentType")?;
                        if let (Some(extension), Some(content_type)) = (extension, content_type) {
                            map.insert(extension.to_ascii_lowercase(), content_type);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(map)
    }

    /// True when `word/settings.xml` enforces document protection. Protected
    /// documents cannot be projected faithfully and abort extraction.
    pub fn is_protected(&self) -> bool {
        let Some(bytes) = self.part(SETTINGS_PART) else {
            return false;
        };
        let text = String::from_utf8_lossy(bytes);
        let mut reader = Reader::from_str(&text);
        loop {
            match reader.read_event() {
                Ok(Event::Empty(start)) | Ok(Event::Start(start)) => {
                    if qname(start.name().as_ref()) == "w:documentProtection" {
                        let enforced = super::xmlutil::attr(&start, "w:enforcement")
                            .ok()
                            .flatten();
                        return super::xmlutil::on_off(enforced, false);
                    }
                }
                Ok(Event::Eof) | Err(_) => return false,
                _ => {}
            }
        }
    }

    pub fn core_properties(&self) -> Result<CoreProperties> {
        let mut props = CoreProperties::default();
        let Some(bytes) = self.part(CORE_PROPS_PART) else {
            return Ok(props);
        };
        let text = String::from_utf8_lossy(bytes);
        let mut reader = Reader::from_str(&text);
        let mut current: Option<String> = None;
        loop {
            match reader.read_event().context("parse core properties")? {
                Event::Start(start) => current = Some(qname(start.name().as_ref())),
                Event::End(_) => current = None,
                Event::Text(value) => {
                    let value = value.unescape().context("unescape core property")?;
                    match current.as_deref() {
                        Some("dc:title") => props.title = Some(value.into_owned()),
                        Some("dc:creator") => props.creator = Some(value.into_owned()),
                        Some("dcterms:created") => props.created = parse_w3cdtf(&value),
                        Some("dcterms:modified") => props.modified = parse_w3cdtf(&value),
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(props)
    }

    pub fn app_properties(&self) -> Result<AppProperties> {
        let mut props = AppProperties::default();
        let Some(bytes) = self.part(APP_PROPS_PART) else {
            return Ok(props);
        };
        let text = String::from_utf8_lossy(bytes);
        let mut reader = Reader::from_str(&text);
        let mut current: Option<String> = None;
        loop {
            match reader.read_event().context("parse app properties")? {
                Event::Start(start) => current = Some(qname(start.name().as_ref())),
                Event::End(_) => current = None,
                Event::Text(value) => {
                    let value = value.unescape().context("unescape app property")?;
                    match current.as_deref() {
                        Some("Application") => props.application = Some(value.into_owned()),
                        Some("AppVersion") => props.app_version = Some(value.into_owned()),
                        Some("Pages") => props.pages = value.parse().ok(),
                        Some("Words") => props.words = value.parse().ok(),
                        Some("Paragraphs") => props.paragraphs = value.parse().ok(),
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(props)
    }

    /// Rewrite `dcterms:modified` in the core properties part.
    pub fn set_modified_time(&mut self, at: DateTime<Utc>) -> Result<()> {
        let stamp = at.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let text = match self.part(CORE_PROPS_PART) {
            Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            None => return Ok(()),
        };
        let rewritten = replace_element_text(&text, "dcterms:modified", &stamp)?;
        self.set_part(CORE_PROPS_PART, rewritten.into_bytes());
        Ok(())
    }
}

fn parse_w3cdtf(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Replace the text content of the first occurrence of `element`. The
/// surrounding markup is untouched.
fn replace_element_text(xml: &str, element: &str, new_text: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::with_capacity(xml.len());
    let mut last = 0usize;
    let mut replaced = false;
    loop {
        match reader.read_event().context("rewrite element text")? {
            Event::Start(start) if !replaced && qname(start.name().as_ref()) == element => {
                let content_start = reader.buffer_position() as usize;
                reader
                    .read_to_end(start.name())
                    .context("skip element content")?;
                let after = reader.buffer_position() as usize;
                let close = xml[content_start..after]
                    .rfind("</")
                    .map(|offset| content_start + offset)
                    .ok_or_else(|| anyhow!("missing close tag for {element}"))?;
                out.push_str(&xml[last..content_start]);
                out.push_str(&escape_text(new_text));
                out.push_str(&xml[close..after]);
                last = after;
                replaced = true;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    out.push_str(&xml[last..]);
    Ok(out)
}
