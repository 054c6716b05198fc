//! TOC field update and removal.
//!
//! A TOC block is regenerated from the live heading view and the engine's
//! page model; entry text is never patched in place.

use anyhow::{Context, Result};
use regex::Regex;

use crate::docx::document::{BodyItem, Paragraph};
use crate::docx::fields::{collect_fields, DocField};
use crate::docx::xmlutil::escape_text;
use crate::schema::plan::TocDeleteMode;
use crate::warnings::WarningKind;

use super::{ExecCtx, OpEffect};

pub(crate) fn update_toc(ctx: &mut ExecCtx<'_>) -> Result<OpEffect> {
    let tocs = toc_fields(ctx)?;
    if tocs.is_empty() {
        return Ok(OpEffect::Noop("no TOC fields in document".to_string()));
    }

    let mut updated = 0usize;
    for toc in tocs.iter().rev() {
        if toc.locked {
            ctx.sink.push(
                WarningKind::General,
                "execute",
                format!("TOC field at paragraph {} is locked; left unchanged", toc.start),
            );
            continue;
        }
        let Some((start_item, end_item)) = body_item_range(ctx, toc) else {
            ctx.sink.push(
                WarningKind::General,
                "execute",
                format!(
                    "TOC field at paragraph {} is not a body-level block; left unchanged",
                    toc.start
                ),
            );
            continue;
        };
        let block = render_toc_block(ctx, &toc.code)?;
        ctx.session
            .document_mut()
            .items
            .splice(start_item..=end_item, block);
        updated += 1;
    }

    if updated == 0 {
        return Ok(OpEffect::Noop("all TOC fields are locked".to_string()));
    }
    Ok(OpEffect::Applied)
}

pub(crate) fn delete_toc(ctx: &mut ExecCtx<'_>, mode: TocDeleteMode) -> Result<OpEffect> {
    let tocs = toc_fields(ctx)?;
    if tocs.is_empty() {
        return Ok(OpEffect::Noop("no TOC fields in document".to_string()));
    }
    let selected: Vec<&DocField> = match mode {
        TocDeleteMode::All => tocs.iter().collect(),
        TocDeleteMode::First => tocs.first().into_iter().collect(),
        TocDeleteMode::Last => tocs.last().into_iter().collect(),
    };

    let mut removed = 0usize;
    for toc in selected.iter().rev() {
        let Some((start_item, end_item)) = body_item_range(ctx, toc) else {
            ctx.sink.push(
                WarningKind::General,
                "execute",
                format!(
                    "TOC field at paragraph {} is not a body-level block; left unchanged",
                    toc.start
                ),
            );
            continue;
        };
        ctx.session.document_mut().items.drain(start_item..=end_item);
        removed += 1;
    }

    if removed == 0 {
        return Ok(OpEffect::Noop("no removable TOC block".to_string()));
    }
    Ok(OpEffect::Applied)
}

fn toc_fields(ctx: &ExecCtx<'_>) -> Result<Vec<DocField>> {
    Ok(collect_fields(ctx.session.document())
        .context("collect fields")?
        .into_iter()
        .filter(DocField::is_toc)
        .collect())
}

/// Map a field's paragraph span onto contiguous body items. TOC blocks
/// inside table cells are not rewritten.
fn body_item_range(ctx: &ExecCtx<'_>, field: &DocField) -> Option<(usize, usize)> {
    let refs = ctx.session.document().paragraph_refs();
    let mut start_item = None;
    let mut end_item = None;
    for ordinal in field.start..=field.end {
        match refs.get(ordinal)?.0 {
            crate::docx::document::ParaAddress::Body { item } => {
                if start_item.is_none() {
                    start_item = Some(item);
                }
                end_item = Some(item);
            }
            crate::docx::document::ParaAddress::Cell { .. } => return None,
        }
    }
    Some((start_item?, end_item?))
}

/// Heading levels a TOC covers, from the `\o "1-3"` switch.
fn toc_depth(code: &str) -> (u8, u8) {
    let pattern = Regex::new(r#"\\o\s+"(\d)-(\d)""#).expect("toc depth pattern");
    if let Some(captures) = pattern.captures(code) {
        let low: u8 = captures[1].parse().unwrap_or(1);
        let high: u8 = captures[2].parse().unwrap_or(3);
        if low >= 1 && high <= 9 && low <= high {
            return (low, high);
        }
    }
    (1, 3)
}

fn render_toc_block(ctx: &ExecCtx<'_>, code: &str) -> Result<Vec<BodyItem>> {
    let (low, high) = toc_depth(code);
    let (headings, _) = ctx.session.headings();
    let mut items = Vec::new();

    let code_text = if code.trim().is_empty() {
        "TOC \\o \"1-3\" \\h \\z \\u".to_string()
    } else {
        code.trim().to_string()
    };
    items.push(parse_paragraph(format!(
        "<w:p><w:r><w:fldChar w:fldCharType=\"begin\"/></w:r>\
         <w:r><w:instrText xml:space=\"preserve\"> {} </w:instrText></w:r>\
         <w:r><w:fldChar w:fldCharType=\"separate\"/></w:r></w:p>",
        escape_text(&code_text)
    ))?);

    for heading in headings.iter().filter(|h| (low..=high).contains(&h.level)) {
        items.push(parse_paragraph(format!(
            "<w:p><w:pPr><w:pStyle w:val=\"TOC{}\"/></w:pPr>\
             <w:r><w:t>{}</w:t></w:r><w:r><w:tab/></w:r><w:r><w:t>{}</w:t></w:r></w:p>",
            heading.level,
            escape_text(&heading.text),
            heading.page
        ))?);
    }

    items.push(parse_paragraph(
        "<w:p><w:r><w:fldChar w:fldCharType=\"end\"/></w:r></w:p>".to_string(),
    )?);
    Ok(items)
}

fn parse_paragraph(xml: String) -> Result<BodyItem> {
    Ok(BodyItem::Paragraph(
        Paragraph::parse(xml).context("build TOC paragraph")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_switch_is_parsed_with_default_fallback() {
        assert_eq!(toc_depth(r#"TOC \o "1-3" \h \z \u"#), (1, 3));
        assert_eq!(toc_depth(r#"TOC \o "2-4""#), (2, 4));
        assert_eq!(toc_depth("TOC"), (1, 3));
        assert_eq!(toc_depth(r#"TOC \o "9-1""#), (1, 3));
    }
}
