//! Prompt assembly for the planner.
//!
//! The model sees the skeleton structure and the user intent, never the
//! inventory or any raw OOXML.

use anyhow::{Context, Result};

use crate::schema::structure::StructureV1;

pub const JSON_ONLY_REMINDER: &str =
    "REMINDER: Respond with a single JSON object only. No prose, no markdown, no code fences.";

pub fn system_prompt() -> String {
    r#"You are a document automation planner. You analyse a Word document structure and a user intent, and produce an execution plan as JSON.

CRITICAL REQUIREMENTS:
1. Return ONLY a single JSON object matching the plan.v1 schema. No prose, no markdown, no code fences.
2. Use ONLY these whitelisted operations:
   - delete_section_by_heading
   - update_toc
   - delete_toc
   - set_style_rule
   - reassign_paragraphs_to_style
   - clear_direct_formatting
3. Never emit document content, OOXML, or text replacements. All edits go through the operations above.
4. Heading levels are 1-9, font sizes 6-72pt, colors #RRGGBB, line spacing 0.5-10.0 lines.
5. clear_direct_formatting requires "authorization": "EXPLICIT_USER_REQUEST".
6. For localised documents, style names may be localised (for example 标题 1, 正文); use the names present in the structure.

RESPONSE SHAPE:
{
  "schema_version": "plan.v1",
  "ops": [
    {
      "operation": "delete_section_by_heading",
      "heading_text": "摘要",
      "level": 1,
      "match": "EXACT",
      "case_sensitive": false
    }
  ]
}

An empty ops array is valid when the intent requires no changes."#
        .to_string()
}

pub fn user_prompt(structure: &StructureV1, user_intent: &str) -> Result<String> {
    let structure_json =
        serde_json::to_string_pretty(structure).context("serialise structure for prompt")?;
    Ok(format!(
        "Document structure (structure.v1):\n{structure_json}\n\n\
         User intent:\n{user_intent}\n\n\
         Produce the plan.v1 JSON object that fulfils the intent using only whitelisted operations."
    ))
}
