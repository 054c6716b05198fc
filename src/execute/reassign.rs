//! Paragraph re-styling by selector conjunction.

use anyhow::{anyhow, Result};
use std::collections::BTreeMap;

use crate::docx::document::ParaAddress;
use crate::schema::plan::{ParagraphSelector, TextPosition};

use super::{ExecCtx, OpEffect};

pub(crate) fn reassign_paragraphs(
    ctx: &mut ExecCtx<'_>,
    selector: &ParagraphSelector,
    target_style: &str,
    clear_direct_formatting: bool,
) -> Result<OpEffect> {
    let style_names = ctx.session.styles().style_names();
    // A missing target style is a plan defect, not an empty match.
    let resolved_target = ctx
        .locale
        .resolve_style(target_style, &style_names, ctx.sink)
        .ok_or_else(|| anyhow!("target style {target_style:?} not defined in document"))?;
    let target_id = ctx
        .session
        .styles()
        .id_for_name(&resolved_target)
        .ok_or_else(|| anyhow!("style {resolved_target:?} has no style id"))?
        .to_string();

    let selector_style = match &selector.current_style {
        Some(requested) => {
            match ctx.locale.resolve_style(requested, &style_names, ctx.sink) {
                Some(resolved) => Some(resolved),
                None => {
                    return Ok(OpEffect::Noop(format!(
                        "selector style {requested:?} not defined in document"
                    )));
                }
            }
        }
        None => None,
    };

    let heading_levels: BTreeMap<usize, u8> = ctx
        .session
        .headings()
        .0
        .into_iter()
        .map(|h| (h.ordinal, h.level))
        .collect();

    let styles = ctx.session.styles();
    let matches: Vec<ParaAddress> = ctx
        .session
        .document()
        .paragraph_refs()
        .iter()
        .enumerate()
        .filter(|(ordinal, (_, paragraph))| {
            if let Some(wanted) = &selector_style {
                let name = paragraph
                    .style_id()
                    .map(|id| styles.name_for_id(id).unwrap_or(id));
                if name != Some(wanted.as_str()) {
                    return false;
                }
            }
            if let Some(needle) = &selector.text_contains {
                let text = paragraph.text().trim();
                let hit = match selector.position.unwrap_or(TextPosition::Contains) {
                    TextPosition::StartsWith => text.starts_with(needle.as_str()),
                    TextPosition::EndsWith => text.ends_with(needle.as_str()),
                    TextPosition::Contains => text.contains(needle.as_str()),
                };
                if !hit {
                    return false;
                }
            }
            if let Some(level) = selector.heading_level {
                if heading_levels.get(ordinal).copied() != Some(level) {
                    return false;
                }
            }
            true
        })
        .map(|(_, (address, _))| *address)
        .collect();

    if matches.is_empty() {
        return Ok(OpEffect::Noop("no paragraph matches the selector".to_string()));
    }

    let document = ctx.session.document_mut();
    for address in matches {
        if let Some(paragraph) = document.paragraph_mut(address) {
            paragraph.set_style(&target_id)?;
            if clear_direct_formatting {
                paragraph.clear_run_formatting()?;
            }
        }
    }
    Ok(OpEffect::Applied)
}
