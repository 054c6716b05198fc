//! Section deletion anchored on headings.

use anyhow::{Context, Result};
use regex::RegexBuilder;

use crate::docx::document::{BodyItem, ParaAddress};
use crate::docx::session::HeadingInfo;
use crate::schema::plan::MatchMode;
use crate::util::normalize_heading_text;

use super::{ExecCtx, OpEffect};

pub(crate) fn delete_section(
    ctx: &mut ExecCtx<'_>,
    heading_text: &str,
    level: u8,
    match_mode: MatchMode,
    case_sensitive: bool,
    occurrence_index: Option<u32>,
) -> Result<OpEffect> {
    let (headings, _) = ctx.session.headings();
    let matcher = HeadingMatcher::new(heading_text, match_mode, case_sensitive)?;
    let candidates: Vec<&HeadingInfo> = headings
        .iter()
        .filter(|h| h.level == level && matcher.matches(&h.text))
        .collect();

    let wanted = occurrence_index.unwrap_or(1) as usize;
    let Some(target) = candidates.get(wanted.saturating_sub(1)).copied() else {
        let reason = if candidates.is_empty() {
            format!("no level-{level} heading matches {heading_text:?}")
        } else {
            format!(
                "occurrence {wanted} beyond the {} matching heading(s)",
                candidates.len()
            )
        };
        return Ok(OpEffect::Noop(reason));
    };
    let target = target.clone();

    match target.address {
        ParaAddress::Cell { item, row, .. } => {
            // A heading inside a table removes the enclosing row; the table
            // is never split.
            let document = ctx.session.document_mut();
            let Some(BodyItem::Table(table)) = document.items.get_mut(item) else {
                return Ok(OpEffect::Noop("heading cell no longer present".to_string()));
            };
            if row >= table.rows.len() {
                return Ok(OpEffect::Noop("heading row no longer present".to_string()));
            }
            table.rows.remove(row);
            if table.rows.is_empty() {
                document.items.remove(item);
            }
            Ok(OpEffect::Applied)
        }
        ParaAddress::Body { item: start_item } => {
            let end_item = headings
                .iter()
                .find(|h| h.ordinal > target.ordinal && h.level <= level)
                .map(|h| h.address.item_index())
                .unwrap_or_else(|| ctx.session.document().items.len());

            let document = ctx.session.document_mut();
            let items = std::mem::take(&mut document.items);
            document.items = items
                .into_iter()
                .enumerate()
                .filter_map(|(index, item)| {
                    let in_range = index >= start_item && index < end_item;
                    if !in_range {
                        return Some(item);
                    }
                    // Section properties at the tail of the body must
                    // survive even when the section runs to end of document.
                    match item {
                        BodyItem::Raw(raw) if raw.contains("<w:sectPr") => {
                            Some(BodyItem::Raw(raw))
                        }
                        _ => None,
                    }
                })
                .collect();
            Ok(OpEffect::Applied)
        }
    }
}

struct HeadingMatcher {
    mode: MatchMode,
    needle: String,
    case_sensitive: bool,
    pattern: Option<regex::Regex>,
}

impl HeadingMatcher {
    fn new(text: &str, mode: MatchMode, case_sensitive: bool) -> Result<Self> {
        let pattern = match mode {
            MatchMode::Regex => Some(
                RegexBuilder::new(text)
                    .case_insensitive(!case_sensitive)
                    .build()
                    .context("compile heading pattern")?,
            ),
            _ => None,
        };
        Ok(Self {
            mode,
            needle: normalize_heading_text(text),
            case_sensitive,
            pattern,
        })
    }

    fn matches(&self, heading: &str) -> bool {
        let heading = normalize_heading_text(heading);
        match self.mode {
            MatchMode::Exact => {
                if self.case_sensitive {
                    heading == self.needle
                } else {
                    heading.to_lowercase() == self.needle.to_lowercase()
                }
            }
            MatchMode::Contains => {
                if self.case_sensitive {
                    heading.contains(&self.needle)
                } else {
                    heading.to_lowercase().contains(&self.needle.to_lowercase())
                }
            }
            MatchMode::Regex => self
                .pattern
                .as_ref()
                .map(|p| p.is_match(&heading))
                .unwrap_or(false),
        }
    }
}
