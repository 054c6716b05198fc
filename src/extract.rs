//! Extractor: project an open session into `structure.v1` plus
//! `inventory.full.v1`.
//!
//! The source is never mutated here. Extraction is deterministic: running
//! it twice over the same bytes yields byte-equal JSON.

use anyhow::{Context, Result};
use std::collections::BTreeMap;

use crate::docx::document::BodyItem;
use crate::docx::fields::collect_fields;
use crate::docx::session::Session;
use crate::docx::styles::StyleEntry;
use crate::docx::xmlutil::extract_elements;
use crate::schema::inventory::{
    ChartKind, ChartReference, ContentControlReference, FormulaReference, InventoryFullV1,
    MediaReference,
};
use crate::schema::structure::{
    Alignment, DocumentMetadata, FieldReference, FontSpec, HeadingReference, LineSpacingMode,
    ParagraphSkeleton, ParagraphSpec, StructureV1, StyleDefinition, StyleType, TableSkeleton,
    PREVIEW_TEXT_CAP,
};
use crate::util::truncate_scalars;
use crate::warnings::{WarningKind, WarningSink};

/// Package parts the skeleton cannot reconstruct; captured raw.
const FRAGMENT_PARTS: &[&str] = &[
    "word/footnotes.xml",
    "word/endnotes.xml",
    "word/numbering.xml",
    "word/settings.xml",
];

pub fn extract(session: &Session, sink: &mut WarningSink) -> Result<(StructureV1, InventoryFullV1)> {
    let structure = extract_structure(session, sink)?;
    let inventory = extract_inventory(session)?;
    Ok((structure, inventory))
}

fn extract_structure(session: &Session, sink: &mut WarningSink) -> Result<StructureV1> {
    let document = session.document();
    let styles = session.styles();
    let refs = document.paragraph_refs();
    let pages = document.page_numbers();
    let (headings, invalid_outlines) = session.headings();

    for ordinal in &invalid_outlines {
        sink.push(
            WarningKind::General,
            "extract",
            format!("paragraph {ordinal} has an outline level beyond 9; treated as body text"),
        );
    }

    let core = session.package().core_properties()?;
    let app = session.package().app_properties()?;
    let mut structure = StructureV1::new(DocumentMetadata {
        title: core.title,
        author: core.creator,
        created_time: core.created,
        modified_time: core.modified,
        application_version: app
            .application
            .map(|name| match app.app_version {
                Some(version) => format!("{name} {version}"),
                None => name,
            }),
        page_count: Some(document.page_count()),
        paragraph_count: Some(refs.len() as u32),
        word_count: Some(word_estimate(refs.iter().map(|(_, p)| p.text()))),
    });

    for entry in styles.styles() {
        if entry.style_type == "numbering" {
            continue;
        }
        structure.styles.push(style_definition(entry));
    }

    let heading_by_ordinal: BTreeMap<usize, u8> =
        headings.iter().map(|h| (h.ordinal, h.level)).collect();

    for (ordinal, (_, paragraph)) in refs.iter().enumerate() {
        let style_name = paragraph
            .style_id()
            .map(|id| styles.name_for_id(id).unwrap_or(id).to_string());
        let heading_level = heading_by_ordinal.get(&ordinal).copied();
        structure.paragraphs.push(ParagraphSkeleton {
            index: ordinal,
            style_name,
            preview_text: truncate_scalars(paragraph.text(), PREVIEW_TEXT_CAP),
            is_heading: heading_level.is_some(),
            heading_level,
            page_number: pages.get(ordinal).copied().unwrap_or(1),
        });
    }

    // Table ordinals keyed by body item index, for in-table headings.
    let mut table_ordinal_by_item = BTreeMap::new();
    for (item_index, item) in document.items.iter().enumerate() {
        if matches!(item, BodyItem::Table(_)) {
            let next = table_ordinal_by_item.len();
            table_ordinal_by_item.insert(item_index, next);
        }
    }

    let mut occurrences: BTreeMap<(String, u8), u32> = BTreeMap::new();
    for heading in &headings {
        let counter = occurrences
            .entry((heading.text.clone(), heading.level))
            .or_insert(0);
        *counter += 1;
        let in_table = heading.address.in_table();
        structure.headings.push(HeadingReference {
            text: heading.text.clone(),
            level: heading.level,
            style_name: heading
                .style_id
                .as_deref()
                .map(|id| styles.name_for_id(id).unwrap_or(id).to_string()),
            paragraph_index: heading.ordinal,
            page_number: heading.page,
            occurrence: *counter,
            in_table,
            table_index: in_table
                .then(|| table_ordinal_by_item.get(&heading.address.item_index()).copied())
                .flatten(),
        });
    }

    for field in collect_fields(document)? {
        structure.fields.push(FieldReference {
            field_type: field.field_type.clone(),
            code: field.code.clone(),
            result: (!field.result.is_empty()).then(|| field.result.clone()),
            paragraph_index: field.start,
            is_locked: field.locked,
            needs_update: field.dirty,
        });
    }

    structure.tables = table_skeletons(session);

    Ok(structure)
}

fn table_skeletons(session: &Session) -> Vec<TableSkeleton> {
    let document = session.document();
    let styles = session.styles();
    let mut skeletons = Vec::new();
    let mut ordinal = 0usize;
    let mut table_index = 0usize;
    for item in &document.items {
        match item {
            BodyItem::Paragraph(_) => ordinal += 1,
            BodyItem::Raw(_) => {}
            BodyItem::Table(table) => {
                let anchor = ordinal;
                let mut cell_references = Vec::new();
                // Ordinal of the covering cell per column, for vertical merges.
                let mut column_anchor: BTreeMap<usize, usize> = BTreeMap::new();
                for row in &table.rows {
                    let mut column = 0usize;
                    for cell in &row.cells {
                        let paragraphs_in_cell = cell
                            .blocks
                            .iter()
                            .filter(|block| {
                                matches!(
                                    block,
                                    crate::docx::document::CellBlock::Paragraph(_)
                                )
                            })
                            .count();
                        let first_paragraph = ordinal;
                        if cell.is_merged_continuation() {
                            let covering = column_anchor
                                .get(&column)
                                .copied()
                                .unwrap_or(first_paragraph);
                            cell_references.push(covering);
                        } else {
                            cell_references.push(first_paragraph);
                            column_anchor.insert(column, first_paragraph);
                        }
                        ordinal += paragraphs_in_cell;
                        column += cell.grid_span() as usize;
                    }
                }
                skeletons.push(TableSkeleton {
                    index: table_index,
                    paragraph_index: anchor,
                    rows: table.rows.len() as u32,
                    columns: table.columns(),
                    has_header: table.rows.first().map(|r| r.is_header()).unwrap_or(false),
                    style_name: table
                        .style_id()
                        .map(|id| styles.name_for_id(id).unwrap_or(id).to_string()),
                    cell_references,
                    has_merged_cells: table.has_merged_cells(),
                });
                table_index += 1;
            }
        }
    }
    skeletons
}

fn extract_inventory(session: &Session) -> Result<InventoryFullV1> {
    let package = session.package();
    let mut inventory = InventoryFullV1::default();

    for name in package.part_names() {
        let keep = FRAGMENT_PARTS.contains(&name)
            || (name.starts_with("word/header") && name.ends_with(".xml"))
            || (name.starts_with("word/footer") && name.ends_with(".xml"))
            || (name.starts_with("customXml/") && name.ends_with(".xml"));
        if keep {
            inventory
                .ooxml_fragments
                .insert(name.to_string(), package.part_text(name)?);
        }
    }

    let content_types = package.default_content_types()?;
    for name in package.part_names() {
        if let Some(filename) = name.strip_prefix("word/media/") {
            let extension = filename
                .rsplit('.')
                .next()
                .unwrap_or("")
                .to_ascii_lowercase();
            let size = package.part(name).map(|bytes| bytes.len() as u64).unwrap_or(0);
            inventory.media_indexes.insert(
                name.to_string(),
                MediaReference {
                    media_id: filename
                        .rsplit_once('.')
                        .map(|(stem, _)| stem.to_string())
                        .unwrap_or_else(|| filename.to_string()),
                    filename: filename.to_string(),
                    content_type: content_types
                        .get(&extension)
                        .cloned()
                        .unwrap_or_else(|| "application/octet-stream".to_string()),
                    size_bytes: size,
                    embedded: true,
                },
            );
        }
        if name.starts_with("word/charts/") && name.ends_with(".xml") {
            inventory.charts.push(ChartReference {
                chart_id: name.to_string(),
                kind: ChartKind::Chart,
                part_name: Some(name.to_string()),
                xml: None,
            });
        }
        if name.starts_with("word/diagrams/") && name.ends_with(".xml") {
            inventory.charts.push(ChartReference {
                chart_id: name.to_string(),
                kind: ChartKind::SmartArt,
                part_name: Some(name.to_string()),
                xml: None,
            });
        }
        if name.starts_with("word/embeddings/") {
            inventory.charts.push(ChartReference {
                chart_id: name.to_string(),
                kind: ChartKind::Ole,
                part_name: Some(name.to_string()),
                xml: None,
            });
        }
    }

    let document = session.document();
    for (ordinal, (_, paragraph)) in document.paragraph_refs().iter().enumerate() {
        for (index, formula) in extract_elements(paragraph.xml(), "m:oMath")?
            .into_iter()
            .enumerate()
        {
            inventory.formulas.push(FormulaReference {
                formula_id: format!("omath-{ordinal}-{index}"),
                paragraph_index: Some(ordinal),
                xml: formula,
            });
        }
        for (index, control) in extract_elements(paragraph.xml(), "w:sdt")?
            .into_iter()
            .enumerate()
        {
            inventory
                .content_controls
                .push(content_control(&control, Some(ordinal), index));
        }
    }
    for item in &document.items {
        if let BodyItem::Raw(raw) = item {
            for (index, control) in extract_elements(raw, "w:sdt")?.into_iter().enumerate() {
                inventory
                    .content_controls
                    .push(content_control(&control, None, index));
            }
        }
    }

    Ok(inventory)
}

fn content_control(
    xml: &str,
    paragraph_index: Option<usize>,
    index: usize,
) -> ContentControlReference {
    let tag = extract_elements(xml, "w:tag")
        .ok()
        .and_then(|tags| tags.first().and_then(|t| single_attr(t)));
    let title = extract_elements(xml, "w:alias")
        .ok()
        .and_then(|aliases| aliases.first().and_then(|t| single_attr(t)));
    ContentControlReference {
        control_id: match paragraph_index {
            Some(ordinal) => format!("sdt-{ordinal}-{index}"),
            None => format!("sdt-body-{index}"),
        },
        control_type: "richText".to_string(),
        tag,
        title,
        paragraph_index,
        xml: xml.to_string(),
    }
}

fn single_attr(raw: &str) -> Option<String> {
    use quick_xml::events::Event;
    use quick_xml::Reader;
    let mut reader = Reader::from_str(raw);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(start)) | Ok(Event::Start(start)) => {
                return crate::docx::xmlutil::attr(&start, "w:val").ok().flatten();
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Rough word count: whitespace-delimited tokens plus CJK scalars, which
/// carry no delimiters.
fn word_estimate<'a>(paragraphs: impl Iterator<Item = &'a str>) -> u32 {
    let mut count = 0u32;
    for text in paragraphs {
        count += text
            .split_whitespace()
            .filter(|token| token.chars().any(|c| !is_cjk(c)))
            .count() as u32;
        count += text.chars().filter(|c| is_cjk(*c)).count() as u32;
    }
    count
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}' | '\u{3400}'..='\u{4dbf}' | '\u{f900}'..='\u{faff}')
}

fn style_definition(entry: &StyleEntry) -> StyleDefinition {
    let style_type = if entry.linked {
        StyleType::Linked
    } else {
        match entry.style_type.as_str() {
            "character" => StyleType::Character,
            "table" => StyleType::Table,
            _ => StyleType::Paragraph,
        }
    };
    let font = FontSpec {
        east_asian: entry.font.east_asian.clone(),
        latin: entry.font.latin.clone(),
        size_pt: entry.font.size_pt(),
        bold: entry.font.bold,
        italic: entry.font.italic,
        underline: entry.font.underline_on(),
        color_hex: entry
            .font
            .color
            .as_deref()
            .filter(|c| c.len() == 6)
            .map(|c| format!("#{}", c.to_ascii_uppercase())),
    };
    let (line_spacing_mode, line_spacing_value) = match (&entry.para.line_rule, entry.para.line) {
        (Some(rule), Some(line)) if rule == "exact" || rule == "atLeast" => {
            (Some(LineSpacingMode::Exactly), Some(line as f32 / 240.0))
        }
        (_, Some(240)) => (Some(LineSpacingMode::Single), Some(1.0)),
        (_, Some(line)) => (Some(LineSpacingMode::Multiple), Some(line as f32 / 240.0)),
        _ => (None, None),
    };
    let paragraph = ParagraphSpec {
        line_spacing_mode,
        line_spacing_value,
        space_before_pt: entry.para.before_twips.map(|t| t as f32 / 20.0),
        space_after_pt: entry.para.after_twips.map(|t| t as f32 / 20.0),
        alignment: entry.para.justification.as_deref().and_then(|jc| match jc {
            "left" | "start" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" | "end" => Some(Alignment::Right),
            "both" | "distribute" => Some(Alignment::Justify),
            _ => None,
        }),
        indent_left_pt: entry.para.indent_left_twips.map(|t| t as f32 / 20.0),
        indent_right_pt: entry.para.indent_right_twips.map(|t| t as f32 / 20.0),
        indent_first_line_pt: match (
            entry.para.indent_first_line_twips,
            entry.para.indent_hanging_twips,
        ) {
            (Some(first), _) => Some(first as f32 / 20.0),
            (None, Some(hanging)) => Some(-(hanging as f32) / 20.0),
            (None, None) => None,
        },
    };
    StyleDefinition {
        name: entry.name.clone(),
        style_type,
        font,
        paragraph,
        is_builtin: entry.is_builtin(),
        is_modified: entry.is_modified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_estimate_counts_cjk_scalars() {
        assert_eq!(word_estimate(["hello world"].into_iter()), 2);
        assert_eq!(word_estimate(["本文研究"].into_iter()), 4);
        assert_eq!(word_estimate(["本文 has four 字"].into_iter()), 5);
        assert_eq!(word_estimate([""].into_iter()), 0);
    }
}
