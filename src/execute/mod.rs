//! Executor: apply a validated plan to the open session.
//!
//! Operations run in plan order. Each one either commits fully or reports
//! a NOOP with its reason; a NOOP is a warning, never a failure. Any error
//! aborts execution and the orchestrator rolls the run back.

mod reassign;
mod sections;
mod style_ops;
mod toc;

use anyhow::Result;
use tracing::debug;

use crate::docx::session::Session;
use crate::locale::LocaleTables;
use crate::schema::plan::{PlanOp, PlanV1};
use crate::warnings::WarningSink;

/// Outcome of one atomic operation.
pub enum OpEffect {
    Applied,
    Noop(String),
}

pub(crate) struct ExecCtx<'a> {
    pub session: &'a mut Session,
    pub locale: &'a LocaleTables,
    pub sink: &'a mut WarningSink,
}

pub fn execute(
    plan: &PlanV1,
    session: &mut Session,
    locale: &LocaleTables,
    sink: &mut WarningSink,
) -> Result<()> {
    let mut ctx = ExecCtx {
        session,
        locale,
        sink,
    };
    for (index, op) in plan.ops.iter().enumerate() {
        debug!(op = op.name(), index, "applying operation");
        let effect = apply_op(&mut ctx, op)?;
        match effect {
            OpEffect::Applied => ctx.session.mark_dirty(),
            OpEffect::Noop(reason) => ctx.sink.noop(op.name(), reason),
        }
    }
    Ok(())
}

fn apply_op(ctx: &mut ExecCtx<'_>, op: &PlanOp) -> Result<OpEffect> {
    match op {
        PlanOp::DeleteSectionByHeading {
            heading_text,
            level,
            match_mode,
            case_sensitive,
            occurrence_index,
            ..
        } => sections::delete_section(
            ctx,
            heading_text,
            *level,
            *match_mode,
            *case_sensitive,
            *occurrence_index,
        ),
        PlanOp::UpdateToc { .. } => toc::update_toc(ctx),
        PlanOp::DeleteToc { mode, .. } => toc::delete_toc(ctx, *mode),
        PlanOp::SetStyleRule {
            target_style,
            font_east_asian,
            font_latin,
            font_size_pt,
            font_bold,
            font_italic,
            font_color_hex,
            line_spacing_mode,
            line_spacing_value,
            space_before_pt,
            space_after_pt,
            alignment,
            ..
        } => style_ops::set_style_rule(
            ctx,
            style_ops::StyleRule {
                target_style,
                font_east_asian: font_east_asian.as_deref(),
                font_latin: font_latin.as_deref(),
                font_size_pt: *font_size_pt,
                font_bold: *font_bold,
                font_italic: *font_italic,
                font_color_hex: font_color_hex.as_deref(),
                line_spacing_mode: *line_spacing_mode,
                line_spacing_value: *line_spacing_value,
                space_before_pt: *space_before_pt,
                space_after_pt: *space_after_pt,
                alignment: *alignment,
            },
        ),
        PlanOp::ReassignParagraphsToStyle {
            selector,
            target_style,
            clear_direct_formatting,
            ..
        } => reassign::reassign_paragraphs(ctx, selector, target_style, *clear_direct_formatting),
        PlanOp::ClearDirectFormatting {
            scope,
            range_spec,
            authorization,
            ..
        } => style_ops::clear_direct_formatting(ctx, *scope, range_spec.as_ref(), authorization),
    }
}
