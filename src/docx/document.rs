//! Body model for `word/document.xml`.
//!
//! The body is split into items (paragraphs, tables, raw fragments) whose
//! original XML is kept verbatim. Mutations rewrite single items; the rest
//! of the document re-serialises byte-identical.

use anyhow::{anyhow, Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::xmlutil::{attr, escape_text, on_off, qname, split_element, visible_text, Segment};

#[derive(Debug, Clone)]
pub struct Paragraph {
    xml: String,
    style_id: Option<String>,
    outline_level: Option<u8>,
    text: String,
    page_break_before: bool,
    explicit_page_break: bool,
    rendered_page_break: bool,
    section_page_break: bool,
}

impl Paragraph {
    pub fn parse(xml: String) -> Result<Self> {
        let text = visible_text(&xml).context("paragraph text")?;
        let mut paragraph = Self {
            xml,
            style_id: None,
            outline_level: None,
            text,
            page_break_before: false,
            explicit_page_break: false,
            rendered_page_break: false,
            section_page_break: false,
        };
        paragraph.scan_properties()?;
        Ok(paragraph)
    }

    fn scan_properties(&mut self) -> Result<()> {
        let mut reader = Reader::from_str(&self.xml);
        let mut stack: Vec<String> = Vec::new();
        let mut style_id = None;
        let mut outline_level = None;
        let mut page_break_before = false;
        let mut explicit_page_break = false;
        let mut rendered_page_break = false;
        let mut section_page_break = false;
        loop {
            let before = reader.buffer_position() as usize;
            match reader.read_event().context("scan paragraph properties")? {
                Event::Start(start) => {
                    let name = qname(start.name().as_ref());
                    let in_ppr = stack.as_slice() == ["w:p", "w:pPr"];
                    if in_ppr && name == "w:sectPr" {
                        reader
                            .read_to_end(start.name())
                            .context("skip section properties")?;
                        let after = reader.buffer_position() as usize;
                        let raw = &self.xml[before..after];
                        section_page_break = !raw.contains("w:val=\"continuous\"");
                        continue;
                    }
                    stack.push(name);
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Empty(start) => {
                    let name = qname(start.name().as_ref());
                    let in_ppr = stack.as_slice() == ["w:p", "w:pPr"];
                    let in_run = stack.last().map(String::as_str) == Some("w:r");
                    match name.as_str() {
                        "w:pStyle" if in_ppr => style_id = attr(&start, "w:val")?,
                        "w:outlineLvl" if in_ppr => {
                            outline_level = attr(&start, "w:val")?.and_then(|v| v.parse().ok());
                        }
                        "w:pageBreakBefore" if in_ppr => {
                            page_break_before = on_off(attr(&start, "w:val")?, true);
                        }
                        "w:br" if in_run => {
                            if attr(&start, "w:type")?.as_deref() == Some("page") {
                                explicit_page_break = true;
                            }
                        }
                        "w:lastRenderedPageBreak" => rendered_page_break = true,
                        "w:sectPr" if in_ppr => section_page_break = true,
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        self.style_id = style_id;
        self.outline_level = outline_level;
        self.page_break_before = page_break_before;
        self.explicit_page_break = explicit_page_break;
        self.rendered_page_break = rendered_page_break;
        self.section_page_break = section_page_break;
        Ok(())
    }

    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn style_id(&self) -> Option<&str> {
        self.style_id.as_deref()
    }

    /// 0-based outline level from direct paragraph properties.
    pub fn outline_level(&self) -> Option<u8> {
        self.outline_level
    }

    pub fn starts_new_page(&self) -> bool {
        self.page_break_before || self.rendered_page_break
    }

    pub fn breaks_page_after(&self) -> bool {
        self.explicit_page_break || self.section_page_break
    }

    pub fn replace_xml(&mut self, xml: String) -> Result<()> {
        *self = Paragraph::parse(xml)?;
        Ok(())
    }

    /// Re-point the paragraph at a style, keeping every other direct
    /// property in place.
    pub fn set_style(&mut self, style_id: &str) -> Result<()> {
        let parts = split_element(&self.xml).context("split paragraph")?;
        let (open, close) = parts.container_tags();
        let pstyle = format!("<w:pStyle w:val=\"{}\"/>", escape_text(style_id));
        let mut ppr = String::new();
        let mut rest = String::new();
        for segment in &parts.segments {
            match segment {
                Segment::Element { name, raw } if name == "w:pPr" && ppr.is_empty() => {
                    let ppr_parts = split_element(raw).context("split paragraph properties")?;
                    let (ppr_open, ppr_close) = ppr_parts.container_tags();
                    ppr.push_str(&ppr_open);
                    ppr.push_str(&pstyle);
                    for child in &ppr_parts.segments {
                        match child {
                            Segment::Element { name, .. } if name == "w:pStyle" => {}
                            other => ppr.push_str(other.raw()),
                        }
                    }
                    ppr.push_str(&ppr_close);
                }
                other => rest.push_str(other.raw()),
            }
        }
        if ppr.is_empty() {
            ppr = format!("<w:pPr>{pstyle}</w:pPr>");
        }
        self.replace_xml(format!("{open}{ppr}{rest}{close}"))
    }

    /// Drop run-level `w:rPr` throughout the paragraph. Style-defined
    /// formatting and the paragraph properties survive.
    pub fn clear_run_formatting(&mut self) -> Result<()> {
        let stripped = strip_run_properties(&self.xml)?;
        self.replace_xml(stripped)
    }

    pub fn has_direct_run_formatting(&self) -> bool {
        super::xmlutil::contains_element(&self.xml, "w:rPr")
    }
}

fn strip_run_properties(xml: &str) -> Result<String> {
    let parts = split_element(xml)?;
    if parts.close_tag.is_empty() && parts.segments.is_empty() {
        return Ok(parts.open_tag);
    }
    let (open, close) = parts.container_tags();
    let mut out = open;
    for segment in &parts.segments {
        match segment {
            Segment::Element { name, raw } if name == "w:r" => {
                let run = split_element(raw)?;
                let (run_open, run_close) = run.container_tags();
                out.push_str(&run_open);
                for child in &run.segments {
                    match child {
                        Segment::Element { name, .. } if name == "w:rPr" => {}
                        other => out.push_str(other.raw()),
                    }
                }
                out.push_str(&run_close);
            }
            Segment::Element { name, raw } if name == "w:pPr" => out.push_str(raw),
            Segment::Element { raw, .. } => out.push_str(&strip_run_properties(raw)?),
            Segment::Other(raw) => out.push_str(raw),
        }
    }
    out.push_str(&close);
    Ok(out)
}

#[derive(Debug, Clone)]
pub enum CellBlock {
    Paragraph(Paragraph),
    Raw(String),
}

#[derive(Debug, Clone)]
pub struct TableCell {
    open_tag: String,
    close_tag: String,
    props_xml: String,
    pub blocks: Vec<CellBlock>,
    vmerge_continue: bool,
    grid_span: u32,
}

impl TableCell {
    fn parse(raw: &str) -> Result<Self> {
        let parts = split_element(raw).context("split table cell")?;
        let (open_tag, close_tag) = parts.container_tags();
        let mut props_xml = String::new();
        let mut blocks = Vec::new();
        let mut vmerge_continue = false;
        let mut grid_span = 1u32;
        for segment in &parts.segments {
            match segment {
                Segment::Element { name, raw } if name == "w:tcPr" && props_xml.is_empty() => {
                    props_xml = raw.clone();
                    let props = split_element(raw).context("split cell properties")?;
                    for child in &props.segments {
                        if let Segment::Element { name, raw } = child {
                            if name == "w:vMerge" && !raw.contains("restart") {
                                vmerge_continue = true;
                            }
                            if name == "w:gridSpan" {
                                if let Some(span) = extract_val(raw) {
                                    grid_span = span;
                                }
                            }
                        }
                    }
                }
                Segment::Element { name, raw } if name == "w:p" => {
                    blocks.push(CellBlock::Paragraph(Paragraph::parse(raw.clone())?));
                }
                other => blocks.push(CellBlock::Raw(other.raw().to_string())),
            }
        }
        Ok(Self {
            open_tag,
            close_tag,
            props_xml,
            blocks,
            vmerge_continue,
            grid_span,
        })
    }

    fn to_xml(&self) -> String {
        let mut out = self.open_tag.clone();
        out.push_str(&self.props_xml);
        for block in &self.blocks {
            match block {
                CellBlock::Paragraph(p) => out.push_str(p.xml()),
                CellBlock::Raw(raw) => out.push_str(raw),
            }
        }
        out.push_str(&self.close_tag);
        out
    }

    pub fn is_merged_continuation(&self) -> bool {
        self.vmerge_continue
    }

    pub fn grid_span(&self) -> u32 {
        self.grid_span.max(1)
    }

    pub fn first_paragraph_text(&self) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            CellBlock::Paragraph(p) => Some(p.text()),
            CellBlock::Raw(_) => None,
        })
    }
}

fn extract_val(raw: &str) -> Option<u32> {
    let mut reader = Reader::from_str(raw);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(start)) | Ok(Event::Start(start)) => {
                return attr(&start, "w:val").ok().flatten()?.parse().ok();
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableRow {
    open_tag: String,
    close_tag: String,
    props_xml: String,
    pub cells: Vec<TableCell>,
    is_header: bool,
}

impl TableRow {
    fn parse(raw: &str) -> Result<Self> {
        let parts = split_element(raw).context("split table row")?;
        let (open_tag, close_tag) = parts.container_tags();
        let mut props_xml = String::new();
        let mut cells = Vec::new();
        let mut is_header = false;
        for segment in &parts.segments {
            match segment {
                Segment::Element { name, raw } if name == "w:trPr" && props_xml.is_empty() => {
                    props_xml = raw.clone();
                    is_header = raw.contains("w:tblHeader");
                }
                Segment::Element { name, raw } if name == "w:tc" => {
                    cells.push(TableCell::parse(raw)?);
                }
                _ => {}
            }
        }
        Ok(Self {
            open_tag,
            close_tag,
            props_xml,
            cells,
            is_header,
        })
    }

    fn to_xml(&self) -> String {
        let mut out = self.open_tag.clone();
        out.push_str(&self.props_xml);
        for cell in &self.cells {
            out.push_str(&cell.to_xml());
        }
        out.push_str(&self.close_tag);
        out
    }

    pub fn is_header(&self) -> bool {
        self.is_header
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    open_tag: String,
    close_tag: String,
    prelude: Vec<String>,
    style_id: Option<String>,
    grid_columns: u32,
    pub rows: Vec<TableRow>,
}

impl Table {
    pub fn parse(raw: &str) -> Result<Self> {
        let parts = split_element(raw).context("split table")?;
        let (open_tag, close_tag) = parts.container_tags();
        let mut prelude = Vec::new();
        let mut rows = Vec::new();
        let mut style_id = None;
        let mut grid_columns = 0u32;
        for segment in &parts.segments {
            match segment {
                Segment::Element { name, raw } if name == "w:tr" => {
                    rows.push(TableRow::parse(raw)?);
                }
                Segment::Element { name, raw } => {
                    if name == "w:tblPr" {
                        if let Ok(props) = split_element(raw) {
                            for child in &props.segments {
                                if let Segment::Element { name, raw } = child {
                                    if name == "w:tblStyle" {
                                        style_id = extract_style_val(raw);
                                    }
                                }
                            }
                        }
                    }
                    if name == "w:tblGrid" {
                        grid_columns = raw.matches("<w:gridCol").count() as u32;
                    }
                    prelude.push(raw.clone());
                }
                Segment::Other(raw) => prelude.push(raw.clone()),
            }
        }
        Ok(Self {
            open_tag,
            close_tag,
            prelude,
            style_id,
            grid_columns,
            rows,
        })
    }

    pub fn to_xml(&self) -> String {
        let mut out = self.open_tag.clone();
        for raw in &self.prelude {
            out.push_str(raw);
        }
        for row in &self.rows {
            out.push_str(&row.to_xml());
        }
        out.push_str(&self.close_tag);
        out
    }

    pub fn style_id(&self) -> Option<&str> {
        self.style_id.as_deref()
    }

    pub fn columns(&self) -> u32 {
        if self.grid_columns > 0 {
            return self.grid_columns;
        }
        self.rows
            .iter()
            .map(|row| row.cells.iter().map(TableCell::grid_span).sum())
            .max()
            .unwrap_or(0)
    }

    pub fn has_merged_cells(&self) -> bool {
        self.rows.iter().any(|row| {
            row.cells
                .iter()
                .any(|cell| cell.is_merged_continuation() || cell.grid_span() > 1)
        })
    }
}

fn extract_style_val(raw: &str) -> Option<String> {
    let mut reader = Reader::from_str(raw);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(start)) | Ok(Event::Start(start)) => {
                return attr(&start, "w:val").ok().flatten();
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

#[derive(Debug, Clone)]
pub enum BodyItem {
    Paragraph(Paragraph),
    Table(Table),
    Raw(String),
}

/// Position of a paragraph within the body, across table boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParaAddress {
    Body {
        item: usize,
    },
    Cell {
        item: usize,
        row: usize,
        cell: usize,
        block: usize,
    },
}

impl ParaAddress {
    pub fn item_index(&self) -> usize {
        match self {
            ParaAddress::Body { item } | ParaAddress::Cell { item, .. } => *item,
        }
    }

    pub fn in_table(&self) -> bool {
        matches!(self, ParaAddress::Cell { .. })
    }
}

#[derive(Debug, Clone)]
pub struct DocumentXml {
    prefix: String,
    pub items: Vec<BodyItem>,
    suffix: String,
}

impl DocumentXml {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event().context("parse document.xml")? {
                Event::Start(start) if qname(start.name().as_ref()) == "w:body" => {
                    let prefix_end = reader.buffer_position() as usize;
                    let prefix = xml[..prefix_end].to_string();
                    let mut items = Vec::new();
                    loop {
                        let child_start = reader.buffer_position() as usize;
                        match reader.read_event().context("parse body item")? {
                            Event::Start(child) => {
                                let name = qname(child.name().as_ref());
                                reader
                                    .read_to_end(child.name())
                                    .context("skip to body item end")?;
                                let child_end = reader.buffer_position() as usize;
                                let raw = &xml[child_start..child_end];
                                items.push(parse_body_item(&name, raw)?);
                            }
                            Event::Empty(child) => {
                                let name = qname(child.name().as_ref());
                                let child_end = reader.buffer_position() as usize;
                                let raw = &xml[child_start..child_end];
                                items.push(parse_body_item(&name, raw)?);
                            }
                            Event::End(_) => {
                                return Ok(Self {
                                    prefix,
                                    items,
                                    suffix: xml[child_start..].to_string(),
                                });
                            }
                            Event::Eof => return Err(anyhow!("unterminated w:body")),
                            _ => {
                                let child_end = reader.buffer_position() as usize;
                                items.push(BodyItem::Raw(xml[child_start..child_end].to_string()));
                            }
                        }
                    }
                }
                Event::Empty(start) if qname(start.name().as_ref()) == "w:body" => {
                    // An empty body still needs open/close tags for later
                    // serialisation.
                    let after = reader.buffer_position() as usize;
                    let body_start = xml[..after]
                        .rfind("<w:body")
                        .ok_or_else(|| anyhow!("malformed empty body"))?;
                    let mut prefix = xml[..body_start].to_string();
                    prefix.push_str("<w:body>");
                    let mut suffix = String::from("</w:body>");
                    suffix.push_str(&xml[after..]);
                    return Ok(Self {
                        prefix,
                        items: Vec::new(),
                        suffix,
                    });
                }
                Event::Eof => return Err(anyhow!("document has no w:body")),
                _ => {}
            }
        }
    }

    pub fn to_xml(&self) -> String {
        let mut out = self.prefix.clone();
        for item in &self.items {
            match item {
                BodyItem::Paragraph(p) => out.push_str(p.xml()),
                BodyItem::Table(t) => out.push_str(&t.to_xml()),
                BodyItem::Raw(raw) => out.push_str(raw),
            }
        }
        out.push_str(&self.suffix);
        out
    }

    /// Paragraphs in document order. Table-cell paragraphs are enumerated
    /// row-major at the table's position, which is also the order the dense
    /// skeleton indices follow.
    pub fn paragraph_refs(&self) -> Vec<(ParaAddress, &Paragraph)> {
        let mut out = Vec::new();
        for (item_index, item) in self.items.iter().enumerate() {
            match item {
                BodyItem::Paragraph(p) => out.push((
                    ParaAddress::Body { item: item_index },
                    p,
                )),
                BodyItem::Table(table) => {
                    for (row_index, row) in table.rows.iter().enumerate() {
                        for (cell_index, cell) in row.cells.iter().enumerate() {
                            for (block_index, block) in cell.blocks.iter().enumerate() {
                                if let CellBlock::Paragraph(p) = block {
                                    out.push((
                                        ParaAddress::Cell {
                                            item: item_index,
                                            row: row_index,
                                            cell: cell_index,
                                            block: block_index,
                                        },
                                        p,
                                    ));
                                }
                            }
                        }
                    }
                }
                BodyItem::Raw(_) => {}
            }
        }
        out
    }

    pub fn paragraph_mut(&mut self, address: ParaAddress) -> Option<&mut Paragraph> {
        match address {
            ParaAddress::Body { item } => match self.items.get_mut(item)? {
                BodyItem::Paragraph(p) => Some(p),
                _ => None,
            },
            ParaAddress::Cell {
                item,
                row,
                cell,
                block,
            } => match self.items.get_mut(item)? {
                BodyItem::Table(table) => {
                    match table.rows.get_mut(row)?.cells.get_mut(cell)?.blocks.get_mut(block)? {
                        CellBlock::Paragraph(p) => Some(p),
                        _ => None,
                    }
                }
                _ => None,
            },
        }
    }

    /// Deterministic page model: page breaks before a paragraph (explicit
    /// page-break-before, rendered break markers) start a new page; explicit
    /// breaks and non-continuous section breaks inside a paragraph move the
    /// following content to a new page.
    pub fn page_numbers(&self) -> Vec<u32> {
        let mut pages = Vec::new();
        let mut page = 1u32;
        for (_, paragraph) in self.paragraph_refs() {
            if paragraph.starts_new_page() && !pages.is_empty() {
                page += 1;
            }
            pages.push(page);
            if paragraph.breaks_page_after() {
                page += 1;
            }
        }
        pages
    }

    pub fn page_count(&self) -> u32 {
        self.page_numbers().last().copied().unwrap_or(1)
    }
}

fn parse_body_item(name: &str, raw: &str) -> Result<BodyItem> {
    match name {
        "w:p" => Ok(BodyItem::Paragraph(Paragraph::parse(raw.to_string())?)),
        "w:tbl" => Ok(BodyItem::Table(Table::parse(raw)?)),
        _ => Ok(BodyItem::Raw(raw.to_string())),
    }
}
