//! Offset-preserving XML helpers.
//!
//! The engine never round-trips whole parts through a typed model. It
//! slices the original text into elements, rewrites only the slices an
//! operation touches, and re-concatenates. These helpers do the slicing.

use anyhow::{anyhow, Context, Result};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone)]
pub enum Segment {
    Element { name: String, raw: String },
    Other(String),
}

impl Segment {
    pub fn raw(&self) -> &str {
        match self {
            Segment::Element { raw, .. } => raw,
            Segment::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElementParts {
    pub name: String,
    pub open_tag: String,
    pub segments: Vec<Segment>,
    /// Empty for self-closing elements.
    pub close_tag: String,
}

impl ElementParts {
    /// Open/close pair usable even when the source element was self-closing.
    pub fn container_tags(&self) -> (String, String) {
        if !self.close_tag.is_empty() {
            return (self.open_tag.clone(), self.close_tag.clone());
        }
        let trimmed = self
            .open_tag
            .trim_end()
            .trim_end_matches("/>")
            .trim_end()
            .to_string();
        (format!("{trimmed}>"), format!("</{}>", self.name))
    }

    pub fn reassemble(&self) -> String {
        if self.close_tag.is_empty() && self.segments.is_empty() {
            return self.open_tag.clone();
        }
        let (open, close) = self.container_tags();
        let mut out = open;
        for segment in &self.segments {
            out.push_str(segment.raw());
        }
        out.push_str(&close);
        out
    }

    pub fn first_element(&self, name: &str) -> Option<&str> {
        self.segments.iter().find_map(|segment| match segment {
            Segment::Element { name: n, raw } if n == name => Some(raw.as_str()),
            _ => None,
        })
    }
}

pub fn qname(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn attr(start: &BytesStart, name: &str) -> Result<Option<String>> {
    match start
        .try_get_attribute(name)
        .context("read xml attribute")?
    {
        Some(value) => Ok(Some(
            value
                .unescape_value()
                .context("unescape xml attribute")?
                .into_owned(),
        )),
        None => Ok(None),
    }
}

/// OOXML boolean attribute: absent means default, `0`/`false`/`none` off,
/// anything else on.
pub fn on_off(value: Option<String>, default: bool) -> bool {
    match value.as_deref() {
        None => default,
        Some("0") | Some("false") | Some("none") => false,
        Some(_) => true,
    }
}

/// Split a fragment holding exactly one element into open tag, top-level
/// child segments, and close tag, all as verbatim slices of the input.
pub fn split_element(xml: &str) -> Result<ElementParts> {
    let mut reader = Reader::from_str(xml);
    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event().context("parse xml fragment")? {
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => continue,
            Event::Text(text) => {
                if !text.as_ref().iter().all(u8::is_ascii_whitespace) {
                    return Err(anyhow!("unexpected text before root element"));
                }
            }
            Event::Empty(start) => {
                let after = reader.buffer_position() as usize;
                return Ok(ElementParts {
                    name: qname(start.name().as_ref()),
                    open_tag: xml[before..after].to_string(),
                    segments: Vec::new(),
                    close_tag: String::new(),
                });
            }
            Event::Start(start) => {
                let name = qname(start.name().as_ref());
                let open_end = reader.buffer_position() as usize;
                let open_tag = xml[before..open_end].to_string();
                let mut segments = Vec::new();
                loop {
                    let child_start = reader.buffer_position() as usize;
                    match reader.read_event().context("parse xml fragment")? {
                        Event::Start(child) => {
                            let child_name = qname(child.name().as_ref());
                            reader
                                .read_to_end(child.name())
                                .context("skip to element end")?;
                            let child_end = reader.buffer_position() as usize;
                            segments.push(Segment::Element {
                                name: child_name,
                                raw: xml[child_start..child_end].to_string(),
                            });
                        }
                        Event::Empty(child) => {
                            let child_end = reader.buffer_position() as usize;
                            segments.push(Segment::Element {
                                name: qname(child.name().as_ref()),
                                raw: xml[child_start..child_end].to_string(),
                            });
                        }
                        Event::End(_) => {
                            let close_end = reader.buffer_position() as usize;
                            return Ok(ElementParts {
                                name,
                                open_tag,
                                segments,
                                close_tag: xml[child_start..close_end].to_string(),
                            });
                        }
                        Event::Eof => return Err(anyhow!("unterminated element {name}")),
                        _ => {
                            let child_end = reader.buffer_position() as usize;
                            segments.push(Segment::Other(xml[child_start..child_end].to_string()));
                        }
                    }
                }
            }
            Event::Eof => return Err(anyhow!("empty xml fragment")),
            other => return Err(anyhow!("unexpected event before root: {other:?}")),
        }
    }
}

/// Concatenated visible text of a fragment: `w:t` content plus tab and
/// break characters. Deleted-revision text and compatibility fallbacks are
/// not visible.
pub fn visible_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut stack: Vec<String> = Vec::new();
    loop {
        match reader.read_event().context("scan fragment text")? {
            Event::Start(start) => {
                let name = qname(start.name().as_ref());
                if name == "w:del" || name == "mc:Fallback" {
                    reader
                        .read_to_end(start.name())
                        .context("skip hidden subtree")?;
                    continue;
                }
                stack.push(name);
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Empty(start) => {
                let name = qname(start.name().as_ref());
                let in_run = stack.last().map(String::as_str) == Some("w:r");
                if name == "w:tab" && in_run {
                    out.push('\t');
                } else if name == "w:br" && in_run {
                    out.push('\n');
                }
            }
            Event::Text(text) => {
                if stack.last().map(String::as_str) == Some("w:t") {
                    out.push_str(&text.unescape().context("unescape run text")?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// True when the fragment contains the named element anywhere.
pub fn contains_element(xml: &str, element: &str) -> bool {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) | Ok(Event::Empty(start)) => {
                if qname(start.name().as_ref()) == element {
                    return true;
                }
            }
            Ok(Event::Eof) | Err(_) => return false,
            _ => {}
        }
    }
}

/// Raw slices of every occurrence of `element` (outermost matches only).
pub fn extract_elements(xml: &str, element: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event().context("scan for elements")? {
            Event::Start(start) if qname(start.name().as_ref()) == element => {
                reader
                    .read_to_end(start.name())
                    .context("skip to element end")?;
                let after = reader.buffer_position() as usize;
                out.push(xml[before..after].to_string());
            }
            Event::Empty(start) if qname(start.name().as_ref()) == element => {
                let after = reader.buffer_position() as usize;
                out.push(xml[before..after].to_string());
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

pub fn escape_text(raw: &str) -> String {
    escape(raw).into_owned()
}

/// A minimal run holding escaped text, with space preservation when needed.
pub fn text_run(text: &str) -> String {
    let space = if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        " xml:space=\"preserve\""
    } else {
        ""
    };
    format!("<w:r><w:t{space}>{}</w:t></w:r>", escape_text(text))
}
