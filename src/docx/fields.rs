//! Field runs: `w:fldSimple` and the begin/separate/end character form.
//!
//! A complex field may span paragraphs (a TOC usually does); fields are
//! therefore assembled over the whole body, carrying the paragraph range
//! they occupy.

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::document::DocumentXml;
use super::xmlutil::{attr, on_off, qname, visible_text};

#[derive(Debug, Clone)]
pub enum FieldToken {
    Simple {
        instr: String,
        dirty: bool,
        locked: bool,
        result: String,
    },
    Begin {
        dirty: bool,
        locked: bool,
    },
    Instr(String),
    Separate,
    End,
    Text(String),
}

/// One assembled field with the paragraph ordinals it covers.
#[derive(Debug, Clone)]
pub struct DocField {
    pub field_type: String,
    pub code: String,
    pub result: String,
    pub start: usize,
    pub end: usize,
    pub dirty: bool,
    pub locked: bool,
    pub simple: bool,
}

impl DocField {
    pub fn is_toc(&self) -> bool {
        self.field_type == "TOC"
    }
}

pub fn field_type_of(code: &str) -> String {
    code.split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_uppercase()
}

/// Tokenise one paragraph's field-relevant content in document order.
pub fn scan_paragraph(xml: &str) -> Result<Vec<FieldToken>> {
    let mut reader = Reader::from_str(xml);
    let mut tokens = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event().context("scan paragraph fields")? {
            Event::Start(start) => {
                let name = qname(start.name().as_ref());
                if name == "w:fldSimple" {
                    let instr = attr(&start, "w:instr")?.unwrap_or_default();
                    let dirty = on_off(attr(&start, "w:dirty")?, false);
                    let locked = on_off(attr(&start, "w:fldLock")?, false);
                    reader
                        .read_to_end(start.name())
                        .context("skip field content")?;
                    let after = reader.buffer_position() as usize;
                    let result = visible_text(&xml[before..after])?;
                    tokens.push(FieldToken::Simple {
                        instr,
                        dirty,
                        locked,
                        result,
                    });
                    continue;
                }
                if name == "w:fldChar" {
                    push_fld_char(&mut tokens, &start)?;
                    reader
                        .read_to_end(start.name())
                        .context("skip field character data")?;
                    continue;
                }
                stack.push(name);
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Empty(start) => {
                let name = qname(start.name().as_ref());
                if name == "w:tab" && stack.last().map(String::as_str) == Some("w:r") {
                    tokens.push(FieldToken::Text("\t".to_string()));
                } else if name == "w:fldChar" {
                    push_fld_char(&mut tokens, &start)?;
                } else if name == "w:fldSimple" {
                    let instr = attr(&start, "w:instr")?.unwrap_or_default();
                    tokens.push(FieldToken::Simple {
                        instr,
                        dirty: on_off(attr(&start, "w:dirty")?, false),
                        locked: on_off(attr(&start, "w:fldLock")?, false),
                        result: String::new(),
                    });
                }
            }
            Event::Text(text) => match stack.last().map(String::as_str) {
                Some("w:instrText") => tokens.push(FieldToken::Instr(
                    text.unescape().context("unescape field code")?.into_owned(),
                )),
                Some("w:t") => tokens.push(FieldToken::Text(
                    text.unescape().context("unescape field text")?.into_owned(),
                )),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(tokens)
}

fn push_fld_char(
    tokens: &mut Vec<FieldToken>,
    start: &quick_xml::events::BytesStart<'_>,
) -> Result<()> {
    match attr(start, "w:fldCharType")?.as_deref() {
        Some("begin") => tokens.push(FieldToken::Begin {
            dirty: on_off(attr(start, "w:dirty")?, false),
            locked: on_off(attr(start, "w:fldLock")?, false),
        }),
        Some("separate") => tokens.push(FieldToken::Separate),
        Some("end") => tokens.push(FieldToken::End),
        _ => {}
    }
    Ok(())
}

#[derive(Debug)]
struct OpenField {
    code: String,
    result: String,
    start: usize,
    dirty: bool,
    locked: bool,
    depth: u32,
    seen_separate: bool,
}

/// Assemble every field in the body, in document order. Nested fields
/// contribute their visible result to the outermost field's result text.
pub fn collect_fields(document: &DocumentXml) -> Result<Vec<DocField>> {
    let mut fields = Vec::new();
    let mut open: Option<OpenField> = None;
    for (ordinal, (_, paragraph)) in document.paragraph_refs().iter().enumerate() {
        for token in scan_paragraph(paragraph.xml())? {
            match token {
                FieldToken::Simple {
                    instr,
                    dirty,
                    locked,
                    result,
                } => {
                    if let Some(field) = open.as_mut() {
                        field.result.push_str(&result);
                    } else {
                        fields.push(DocField {
                            field_type: field_type_of(&instr),
                            code: instr,
                            result,
                            start: ordinal,
                            end: ordinal,
                            dirty,
                            locked,
                            simple: true,
                        });
                    }
                }
                FieldToken::Begin { dirty, locked } => match open.as_mut() {
                    Some(field) => field.depth += 1,
                    None => {
                        open = Some(OpenField {
                            code: String::new(),
                            result: String::new(),
                            start: ordinal,
                            dirty,
                            locked,
                            depth: 1,
                            seen_separate: false,
                        });
                    }
                },
                FieldToken::Instr(text) => {
                    if let Some(field) = open.as_mut() {
                        if field.depth == 1 && !field.seen_separate {
                            field.code.push_str(&text);
                        }
                    }
                }
                FieldToken::Separate => {
                    if let Some(field) = open.as_mut() {
                        if field.depth == 1 {
                            field.seen_separate = true;
                        }
                    }
                }
                FieldToken::Text(text) => {
                    if let Some(field) = open.as_mut() {
                        if field.seen_separate {
                            field.result.push_str(&text);
                        }
                    }
                }
                FieldToken::End => {
                    if let Some(field) = open.as_mut() {
                        field.depth -= 1;
                        if field.depth == 0 {
                            let done = open.take().unwrap();
                            let code = done.code.trim().to_string();
                            fields.push(DocField {
                                field_type: field_type_of(&code),
                                code,
                                result: done.result,
                                start: done.start,
                                end: ordinal,
                                dirty: done.dirty,
                                locked: done.locked,
                                simple: false,
                            });
                        }
                    }
                }
            }
        }
        if let Some(field) = open.as_mut() {
            if field.seen_separate {
                field.result.push('\n');
            }
        }
    }
    Ok(fields)
}
