//! Style-definition updates and direct-formatting removal.

use anyhow::{anyhow, Result};

use crate::docx::document::ParaAddress;
use crate::locale::FontScript;
use crate::schema::plan::{FormattingScope, RangeSpec, AUTHORIZATION_TOKEN};
use crate::schema::structure::{Alignment, LineSpacingMode};

use super::{ExecCtx, OpEffect};

pub(crate) struct StyleRule<'a> {
    pub target_style: &'a str,
    pub font_east_asian: Option<&'a str>,
    pub font_latin: Option<&'a str>,
    pub font_size_pt: Option<f32>,
    pub font_bold: Option<bool>,
    pub font_italic: Option<bool>,
    pub font_color_hex: Option<&'a str>,
    pub line_spacing_mode: Option<LineSpacingMode>,
    pub line_spacing_value: Option<f32>,
    pub space_before_pt: Option<f32>,
    pub space_after_pt: Option<f32>,
    pub alignment: Option<Alignment>,
}

pub(crate) fn set_style_rule(ctx: &mut ExecCtx<'_>, rule: StyleRule<'_>) -> Result<OpEffect> {
    let style_names = ctx.session.styles().style_names();
    let Some(resolved) = ctx
        .locale
        .resolve_style(rule.target_style, &style_names, ctx.sink)
    else {
        return Ok(OpEffect::Noop(format!(
            "style {:?} not defined in document",
            rule.target_style
        )));
    };

    let east_asian = rule
        .font_east_asian
        .map(|font| ctx.locale.resolve_font(font, FontScript::EastAsian, ctx.sink));
    let latin = rule
        .font_latin
        .map(|font| ctx.locale.resolve_font(font, FontScript::Latin, ctx.sink));

    let entry = ctx
        .session
        .styles_mut()
        .by_name_mut(&resolved)
        .ok_or_else(|| anyhow!("style {resolved:?} vanished during execution"))?;

    if let Some(font) = east_asian {
        entry.font.east_asian = Some(font);
    }
    if let Some(font) = latin {
        entry.font.latin = Some(font);
    }
    if let Some(size) = rule.font_size_pt {
        entry.font.size_half_points = Some((size * 2.0).round() as u32);
    }
    if let Some(bold) = rule.font_bold {
        entry.font.bold = Some(bold);
    }
    if let Some(italic) = rule.font_italic {
        entry.font.italic = Some(italic);
    }
    if let Some(color) = rule.font_color_hex {
        entry.font.color = Some(color.trim_start_matches('#').to_ascii_uppercase());
    }
    match (rule.line_spacing_mode, rule.line_spacing_value) {
        (Some(LineSpacingMode::Single), _) => {
            entry.para.line_rule = Some("auto".to_string());
            entry.para.line = Some(240);
        }
        (Some(LineSpacingMode::Multiple), Some(value)) => {
            entry.para.line_rule = Some("auto".to_string());
            entry.para.line = Some((value * 240.0).round() as u32);
        }
        (Some(LineSpacingMode::Exactly), Some(value)) => {
            entry.para.line_rule = Some("exact".to_string());
            entry.para.line = Some((value * 240.0).round() as u32);
        }
        (Some(mode), None) => {
            return Err(anyhow!(
                "line spacing mode {mode:?} requires line_spacing_value"
            ));
        }
        (None, _) => {}
    }
    if let Some(points) = rule.space_before_pt {
        entry.para.before_twips = Some((points * 20.0).round() as u32);
    }
    if let Some(points) = rule.space_after_pt {
        entry.para.after_twips = Some((points * 20.0).round() as u32);
    }
    if let Some(alignment) = rule.alignment {
        entry.para.justification = Some(
            match alignment {
                Alignment::Left => "left",
                Alignment::Center => "center",
                Alignment::Right => "right",
                Alignment::Justify => "both",
            }
            .to_string(),
        );
    }
    entry.mark_touched();
    Ok(OpEffect::Applied)
}

pub(crate) fn clear_direct_formatting(
    ctx: &mut ExecCtx<'_>,
    scope: FormattingScope,
    range_spec: Option<&RangeSpec>,
    authorization: &str,
) -> Result<OpEffect> {
    if authorization != AUTHORIZATION_TOKEN {
        return Err(anyhow!(
            "clear_direct_formatting without the {AUTHORIZATION_TOKEN:?} authorization token"
        ));
    }

    let refs = ctx.session.document().paragraph_refs();
    let total = refs.len();
    let targets: Vec<ParaAddress> = match scope {
        FormattingScope::Document => refs.iter().map(|(address, _)| *address).collect(),
        FormattingScope::Selection => {
            let Some(range) = range_spec else {
                return Err(anyhow!("SELECTION scope without range_spec"));
            };
            let start = range.start_index.unwrap_or(0);
            let end = range.end_index.unwrap_or(total.saturating_sub(1));
            if start >= total {
                return Ok(OpEffect::Noop(format!(
                    "selection start {start} beyond the {total} paragraph(s)"
                )));
            }
            refs.iter()
                .enumerate()
                .filter(|(ordinal, _)| *ordinal >= start && *ordinal <= end)
                .map(|(_, (address, _))| *address)
                .collect()
        }
        FormattingScope::Style => {
            let Some(style_name) = range_spec.and_then(|range| range.style_name.as_deref()) else {
                return Err(anyhow!("STYLE scope without style_name"));
            };
            let style_names = ctx.session.styles().style_names();
            let Some(resolved) = ctx.locale.resolve_style(style_name, &style_names, ctx.sink)
            else {
                return Ok(OpEffect::Noop(format!(
                    "style {style_name:?} not defined in document"
                )));
            };
            let styles = ctx.session.styles();
            refs.iter()
                .filter(|(_, paragraph)| {
                    paragraph
                        .style_id()
                        .map(|id| styles.name_for_id(id).unwrap_or(id) == resolved)
                        .unwrap_or(false)
                })
                .map(|(address, _)| *address)
                .collect()
        }
    };

    let formatted: Vec<ParaAddress> = targets
        .into_iter()
        .filter(|address| {
            refs.iter()
                .find(|(a, _)| a == address)
                .map(|(_, paragraph)| paragraph.has_direct_run_formatting())
                .unwrap_or(false)
        })
        .collect();

    if formatted.is_empty() {
        return Ok(OpEffect::Noop(
            "no direct run formatting in scope".to_string(),
        ));
    }

    let document = ctx.session.document_mut();
    for address in formatted {
        if let Some(paragraph) = document.paragraph_mut(address) {
            paragraph.clear_run_formatting()?;
        }
    }
    Ok(OpEffect::Applied)
}
