//! Model for `word/styles.xml`.
//!
//! Each `w:style` is parsed into the properties the pipeline understands;
//! everything else is retained as raw slices and re-emitted verbatim. Only
//! the run and paragraph property blocks of a touched style are
//! regenerated.

use anyhow::{anyhow, Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::xmlutil::{attr, escape_text, on_off, qname, split_element, Segment};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontProps {
    pub east_asian: Option<String>,
    pub latin: Option<String>,
    pub complex_script: Option<String>,
    pub hint: Option<String>,
    pub size_half_points: Option<u32>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    /// Raw `w:u` value; `none` means explicitly off.
    pub underline: Option<String>,
    /// RRGGBB without the leading `#`.
    pub color: Option<String>,
}

impl FontProps {
    pub fn size_pt(&self) -> Option<f32> {
        self.size_half_points.map(|half| half as f32 / 2.0)
    }

    pub fn underline_on(&self) -> Option<bool> {
        self.underline.as_deref().map(|v| v != "none" && v != "0")
    }

    fn is_empty(&self) -> bool {
        *self == FontProps::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParaProps {
    pub line_rule: Option<String>,
    pub line: Option<u32>,
    pub before_twips: Option<u32>,
    pub after_twips: Option<u32>,
    pub justification: Option<String>,
    pub indent_left_twips: Option<i32>,
    pub indent_right_twips: Option<i32>,
    pub indent_first_line_twips: Option<i32>,
    pub indent_hanging_twips: Option<i32>,
    pub outline_level: Option<u8>,
}

impl ParaProps {
    fn is_empty(&self) -> bool {
        *self == ParaProps::default()
    }
}

#[derive(Debug, Clone)]
pub struct StyleEntry {
    source_xml: String,
    open_tag: String,
    pub style_id: String,
    pub style_type: String,
    pub name: String,
    pub based_on: Option<String>,
    pub linked: bool,
    pub custom: bool,
    pub font: FontProps,
    pub para: ParaProps,
    other_children: Vec<String>,
    rpr_extra: Vec<String>,
    ppr_extra: Vec<String>,
    touched: bool,
}

impl StyleEntry {
    fn parse(raw: &str) -> Result<Self> {
        let parts = split_element(raw).context("split style")?;
        let open = read_open_tag(&parts.open_tag)?;
        let style_type = open.get("w:type").cloned().unwrap_or_default();
        let style_id = open.get("w:styleId").cloned().unwrap_or_default();
        let custom = open
            .get("w:customStyle")
            .map(|v| v != "0" && v != "false")
            .unwrap_or(false);

        let mut entry = Self {
            source_xml: raw.to_string(),
            open_tag: parts.container_tags().0,
            style_id,
            style_type,
            name: String::new(),
            based_on: None,
            linked: false,
            custom,
            font: FontProps::default(),
            para: ParaProps::default(),
            other_children: Vec::new(),
            rpr_extra: Vec::new(),
            ppr_extra: Vec::new(),
            touched: false,
        };

        for segment in &parts.segments {
            match segment {
                Segment::Element { name, raw } => match name.as_str() {
                    "w:rPr" => entry.parse_rpr(raw)?,
                    "w:pPr" => entry.parse_ppr(raw)?,
                    "w:name" => {
                        entry.name = single_val(raw)?.unwrap_or_default();
                        entry.other_children.push(raw.clone());
                    }
                    "w:basedOn" => {
                        entry.based_on = single_val(raw)?;
                        entry.other_children.push(raw.clone());
                    }
                    "w:link" => {
                        entry.linked = true;
                        entry.other_children.push(raw.clone());
                    }
                    _ => entry.other_children.push(raw.clone()),
                },
                Segment::Other(raw) => entry.other_children.push(raw.clone()),
            }
        }
        Ok(entry)
    }

    fn parse_rpr(&mut self, raw: &str) -> Result<()> {
        let parts = split_element(raw).context("split style run properties")?;
        for segment in &parts.segments {
            let Segment::Element { name, raw } = segment else {
                continue;
            };
            match name.as_str() {
                "w:rFonts" => {
                    let attrs = read_open_tag(raw)?;
                    self.font.latin = attrs.get("w:ascii").cloned();
                    self.font.east_asian = attrs.get("w:eastAsia").cloned();
                    self.font.complex_script = attrs.get("w:cs").cloned();
                    self.font.hint = attrs.get("w:hint").cloned();
                }
                "w:sz" => self.font.size_half_points = single_val(raw)?.and_then(|v| v.parse().ok()),
                "w:szCs" => {}
                "w:b" => self.font.bold = Some(on_off(single_val(raw)?, true)),
                "w:bCs" => {}
                "w:i" => self.font.italic = Some(on_off(single_val(raw)?, true)),
                "w:iCs" => {}
                "w:u" => self.font.underline = single_val(raw)?,
                "w:color" => self.font.color = single_val(raw)?,
                _ => self.rpr_extra.push(raw.clone()),
            }
        }
        Ok(())
    }

    fn parse_ppr(&mut self, raw: &str) -> Result<()> {
        let parts = split_element(raw).context("split style paragraph properties")?;
        for segment in &parts.segments {
            let Segment::Element { name, raw } = segment else {
                continue;
            };
            match name.as_str() {
                "w:spacing" => {
                    let attrs = read_open_tag(raw)?;
                    self.para.line_rule = attrs.get("w:lineRule").cloned();
                    self.para.line = attrs.get("w:line").and_then(|v| v.parse().ok());
                    self.para.before_twips = attrs.get("w:before").and_then(|v| v.parse().ok());
                    self.para.after_twips = attrs.get("w:after").and_then(|v| v.parse().ok());
                }
                "w:jc" => self.para.justification = single_val(raw)?,
                "w:ind" => {
                    let attrs = read_open_tag(raw)?;
                    let int = |key: &str| attrs.get(key).and_then(|v| v.parse().ok());
                    self.para.indent_left_twips = int("w:left").or_else(|| int("w:start"));
                    self.para.indent_right_twips = int("w:right").or_else(|| int("w:end"));
                    self.para.indent_first_line_twips = int("w:firstLine");
                    self.para.indent_hanging_twips = int("w:hanging");
                }
                "w:outlineLvl" => {
                    self.para.outline_level = single_val(raw)?.and_then(|v| v.parse().ok());
                }
                _ => self.ppr_extra.push(raw.clone()),
            }
        }
        Ok(())
    }

    pub fn is_builtin(&self) -> bool {
        !self.custom
    }

    /// Explicit formatting beyond the inherited definition.
    pub fn is_modified(&self) -> bool {
        self.touched || !self.font.is_empty() || !self.para.is_empty()
    }

    pub fn was_touched(&self) -> bool {
        self.touched
    }

    pub fn mark_touched(&mut self) {
        self.touched = true;
    }

    fn rpr_xml(&self) -> String {
        let font = &self.font;
        if font.is_empty() && self.rpr_extra.is_empty() {
            return String::new();
        }
        let mut out = String::from("<w:rPr>");
        for raw in &self.rpr_extra {
            out.push_str(raw);
        }
        if font.latin.is_some()
            || font.east_asian.is_some()
            || font.complex_script.is_some()
            || font.hint.is_some()
        {
            out.push_str("<w:rFonts");
            if let Some(v) = &font.hint {
                out.push_str(&format!(" w:hint=\"{}\"", escape_text(v)));
            }
            if let Some(v) = &font.latin {
                out.push_str(&format!(
                    " w:ascii=\"{0}\" w:hAnsi=\"{0}\"",
                    escape_text(v)
                ));
            }
            if let Some(v) = &font.east_asian {
                out.push_str(&format!(" w:eastAsia=\"{}\"", escape_text(v)));
            }
            if let Some(v) = &font.complex_script {
                out.push_str(&format!(" w:cs=\"{}\"", escape_text(v)));
            }
            out.push_str("/>");
        }
        match font.bold {
            Some(true) => out.push_str("<w:b/><w:bCs/>"),
            Some(false) => out.push_str("<w:b w:val=\"0\"/><w:bCs w:val=\"0\"/>"),
            None => {}
        }
        match font.italic {
            Some(true) => out.push_str("<w:i/><w:iCs/>"),
            Some(false) => out.push_str("<w:i w:val=\"0\"/><w:iCs w:val=\"0\"/>"),
            None => {}
        }
        if let Some(v) = &font.underline {
            out.push_str(&format!("<w:u w:val=\"{}\"/>", escape_text(v)));
        }
        if let Some(v) = &font.color {
            out.push_str(&format!("<w:color w:val=\"{}\"/>", escape_text(v)));
        }
        if let Some(half) = font.size_half_points {
            out.push_str(&format!("<w:sz w:val=\"{half}\"/><w:szCs w:val=\"{half}\"/>"));
        }
        out.push_str("</w:rPr>");
        out
    }

    fn ppr_xml(&self) -> String {
        let para = &self.para;
        if para.is_empty() && self.ppr_extra.is_empty() {
            return String::new();
        }
        let mut out = String::from("<w:pPr>");
        for raw in &self.ppr_extra {
            out.push_str(raw);
        }
        if para.line.is_some() || para.before_twips.is_some() || para.after_twips.is_some() {
            out.push_str("<w:spacing");
            if let Some(v) = para.before_twips {
                out.push_str(&format!(" w:before=\"{v}\""));
            }
            if let Some(v) = para.after_twips {
                out.push_str(&format!(" w:after=\"{v}\""));
            }
            if let Some(v) = para.line {
                out.push_str(&format!(" w:line=\"{v}\""));
            }
            if let Some(v) = &para.line_rule {
                out.push_str(&format!(" w:lineRule=\"{}\"", escape_text(v)));
            }
            out.push_str("/>");
        }
        if para.indent_left_twips.is_some()
            || para.indent_right_twips.is_some()
            || para.indent_first_line_twips.is_some()
            || para.indent_hanging_twips.is_some()
        {
            out.push_str("<w:ind");
            if let Some(v) = para.indent_left_twips {
                out.push_str(&format!(" w:left=\"{v}\""));
            }
            if let Some(v) = para.indent_right_twips {
                out.push_str(&format!(" w:right=\"{v}\""));
            }
            if let Some(v) = para.indent_first_line_twips {
                out.push_str(&format!(" w:firstLine=\"{v}\""));
            }
            if let Some(v) = para.indent_hanging_twips {
                out.push_str(&format!(" w:hanging=\"{v}\""));
            }
            out.push_str("/>");
        }
        if let Some(v) = &para.justification {
            out.push_str(&format!("<w:jc w:val=\"{}\"/>", escape_text(v)));
        }
        if let Some(v) = para.outline_level {
            out.push_str(&format!("<w:outlineLvl w:val=\"{v}\"/>"));
        }
        out.push_str("</w:pPr>");
        out
    }

    fn to_xml(&self) -> String {
        if !self.touched {
            return self.source_xml.clone();
        }
        let mut out = self.open_tag.clone();
        for child in &self.other_children {
            out.push_str(child);
        }
        out.push_str(&self.ppr_xml());
        out.push_str(&self.rpr_xml());
        out.push_str("</w:style>");
        out
    }
}

fn read_open_tag(raw: &str) -> Result<std::collections::BTreeMap<String, String>> {
    let mut reader = Reader::from_str(raw);
    loop {
        match reader.read_event().context("read open tag")? {
            Event::Start(start) | Event::Empty(start) => {
                let mut map = std::collections::BTreeMap::new();
                for attribute in start.attributes() {
                    let attribute = attribute.context("read attribute")?;
                    map.insert(
                        qname(attribute.key.as_ref()),
                        attribute
                            .unescape_value()
                            .context("unescape attribute")?
                            .into_owned(),
                    );
                }
                return Ok(map);
            }
            Event::Eof => return Err(anyhow!("fragment has no element")),
            _ => {}
        }
    }
}

fn single_val(raw: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(raw);
    loop {
        match reader.read_event().context("read val attribute")? {
            Event::Start(start) | Event::Empty(start) => return attr(&start, "w:val"),
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

#[derive(Debug, Clone)]
enum SheetItem {
    Style(StyleEntry),
    Raw(String),
}

#[derive(Debug, Clone)]
pub struct StyleSheet {
    prefix: String,
    items: Vec<SheetItem>,
    suffix: String,
}

impl StyleSheet {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event().context("parse styles.xml")? {
                Event::Start(start) if qname(start.name().as_ref()) == "w:styles" => {
                    let prefix = xml[..reader.buffer_position() as usize].to_string();
                    let mut items = Vec::new();
                    loop {
                        let child_start = reader.buffer_position() as usize;
                        match reader.read_event().context("parse styles child")? {
                            Event::Start(child) => {
                                let name = qname(child.name().as_ref());
                                reader
                                    .read_to_end(child.name())
                                    .context("skip to style end")?;
                                let raw = &xml[child_start..reader.buffer_position() as usize];
                                if name == "w:style" {
                                    items.push(SheetItem::Style(StyleEntry::parse(raw)?));
                                } else {
                                    items.push(SheetItem::Raw(raw.to_string()));
                                }
                            }
                            Event::Empty(_) => {
                                let raw = &xml[child_start..reader.buffer_position() as usize];
                                items.push(SheetItem::Raw(raw.to_string()));
                            }
                            Event::End(_) => {
                                return Ok(Self {
                                    prefix,
                                    items,
                                    suffix: xml[child_start..].to_string(),
                                });
                            }
                            Event::Eof => return Err(anyhow!("unterminated w:styles")),
                            _ => {
                                let raw = &xml[child_start..reader.buffer_position() as usize];
                                items.push(SheetItem::Raw(raw.to_string()));
                            }
                        }
                    }
                }
                Event::Eof => return Err(anyhow!("styles part has no w:styles root")),
                _ => {}
            }
        }
    }

    pub fn to_xml(&self) -> String {
        let mut out = self.prefix.clone();
        for item in &self.items {
            match item {
                SheetItem::Style(style) => out.push_str(&style.to_xml()),
                SheetItem::Raw(raw) => out.push_str(raw),
            }
        }
        out.push_str(&self.suffix);
        out
    }

    pub fn styles(&self) -> impl Iterator<Item = &StyleEntry> {
        self.items.iter().filter_map(|item| match item {
            SheetItem::Style(style) => Some(style),
            SheetItem::Raw(_) => None,
        })
    }

    pub fn style_names(&self) -> Vec<String> {
        self.styles().map(|s| s.name.clone()).collect()
    }

    pub fn by_name(&self, name: &str) -> Option<&StyleEntry> {
        self.styles().find(|s| s.name == name)
    }

    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut StyleEntry> {
        self.items.iter_mut().find_map(|item| match item {
            SheetItem::Style(style) if style.name == name => Some(style),
            _ => None,
        })
    }

    pub fn by_id(&self, id: &str) -> Option<&StyleEntry> {
        self.styles().find(|s| s.style_id == id)
    }

    pub fn name_for_id(&self, id: &str) -> Option<&str> {
        self.by_id(id).map(|s| s.name.as_str())
    }

    pub fn id_for_name(&self, name: &str) -> Option<&str> {
        self.by_name(name).map(|s| s.style_id.as_str())
    }

    pub fn any_touched(&self) -> bool {
        self.styles().any(StyleEntry::was_touched)
    }

    /// Outline level for a style, following the based-on chain. Bounded to
    /// keep malformed cyclic sheets from looping.
    pub fn outline_level_for_id(&self, id: &str) -> Option<u8> {
        let mut current = self.by_id(id)?;
        for _ in 0..16 {
            if let Some(level) = current.para.outline_level {
                return Some(level);
            }
            let based_on = current.based_on.as_deref()?;
            current = self.by_id(based_on)?;
        }
        None
    }
}
