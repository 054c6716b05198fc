//! End-to-end pipeline scenarios over real fixture packages.

mod common;

use std::fs;

use autodocx::audit;
use autodocx::error::RunStatus;
use autodocx::schema::structure::StructureV1;
use autodocx::workflow::{
    dry_run_with_client, process_document_with_client, run, run_batch_with_client, RunMode,
};
use common::{normal_paper, test_options, DocBuilder, ScriptedClient};

const DELETE_AND_UPDATE_PLAN: &str = r#"{"schema_version":"plan.v1","ops":[
    {"operation":"delete_section_by_heading","heading_text":"摘要","level":1,"match":"EXACT","case_sensitive":false},
    {"operation":"delete_section_by_heading","heading_text":"参考文献","level":1,"match":"EXACT","case_sensitive":false},
    {"operation":"update_toc"}
]}"#;

fn read_after_structure(audit_dir: &std::path::Path) -> StructureV1 {
    let raw = fs::read_to_string(audit_dir.join(audit::AFTER_STRUCTURE)).expect("after structure");
    serde_json::from_str(&raw).expect("parse after structure")
}

#[test]
fn s1_normal_paper_deletes_sections_and_refreshes_toc() {
    let root = tempfile::tempdir().unwrap();
    let input = normal_paper(root.path());
    let input_bytes = fs::read(&input).unwrap();
    let client = ScriptedClient::new(&[DELETE_AND_UPDATE_PLAN]);

    let outcome = process_document_with_client(
        &input,
        "删除摘要和参考文献章节并更新目录",
        test_options(root.path()),
        &client,
    )
    .expect("pipeline runs");

    assert_eq!(outcome.status, RunStatus::Success);
    let output = outcome.output_path.expect("output written");
    assert!(output.exists());
    assert_eq!(fs::read(&input).unwrap(), input_bytes, "input untouched");

    let audit_dir = &outcome.audit_dir;
    for name in [
        audit::BEFORE_DOCX,
        audit::AFTER_DOCX,
        audit::BEFORE_STRUCTURE,
        audit::AFTER_STRUCTURE,
        audit::INVENTORY,
        audit::PLAN,
        audit::DIFF_REPORT,
        audit::WARNINGS_LOG,
        audit::STATUS_FILE,
    ] {
        assert!(audit_dir.join(name).exists(), "missing {name}");
    }
    assert_eq!(
        fs::read_to_string(audit_dir.join(audit::STATUS_FILE))
            .unwrap()
            .trim(),
        "SUCCESS"
    );

    let after = read_after_structure(audit_dir);
    assert!(after
        .headings_at_level(1)
        .all(|h| h.text != "摘要" && h.text != "参考文献"));
    let toc = after
        .fields
        .iter()
        .find(|f| f.field_type == "TOC")
        .expect("toc survives");
    assert!(!toc.needs_update);
    let result = toc.result.as_deref().unwrap_or("");
    assert!(result.contains("正文\t1"));
    assert!(!result.contains("摘要"));

    let diff: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(audit_dir.join(audit::DIFF_REPORT)).unwrap())
            .unwrap();
    let removed = diff["removed_headings"].as_array().unwrap();
    assert_eq!(removed.len(), 2);
}

#[test]
fn s2_update_toc_without_toc_is_a_single_noop() {
    let root = tempfile::tempdir().unwrap();
    let input = DocBuilder::new()
        .heading(1, "摘要")
        .paragraph("概要内容。")
        .heading(1, "正文")
        .paragraph("正文内容。")
        .heading(1, "参考文献")
        .paragraph("[1] 引用。")
        .write_into(root.path(), "no_toc.docx");
    let client = ScriptedClient::new(&[DELETE_AND_UPDATE_PLAN]);

    let outcome = process_document_with_client(
        &input,
        "删除摘要和参考文献章节并更新目录",
        test_options(root.path()),
        &client,
    )
    .unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    let log = fs::read_to_string(outcome.audit_dir.join(audit::WARNINGS_LOG)).unwrap();
    let noop_lines: Vec<&str> = log.lines().filter(|l| l.contains("NOOP")).collect();
    assert_eq!(noop_lines.len(), 1);
    assert!(noop_lines[0].contains("update_toc"));
}

#[test]
fn s3_occurrence_index_targets_the_second_duplicate() {
    let root = tempfile::tempdir().unwrap();
    let input = DocBuilder::new()
        .heading(1, "引言")
        .paragraph("第一次出现的引言。")
        .heading(1, "引言")
        .paragraph("第二次出现的引言。")
        .heading(1, "结论")
        .paragraph("结束。")
        .write_into(root.path(), "dupes.docx");
    let plan = r#"{"schema_version":"plan.v1","ops":[
        {"operation":"delete_section_by_heading","heading_text":"引言","level":1,"match":"EXACT","case_sensitive":false,"occurrence_index":2}
    ]}"#;
    let client = ScriptedClient::new(&[plan]);

    let outcome = process_document_with_client(
        &input,
        "删除第二个引言",
        test_options(root.path()),
        &client,
    )
    .unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    let after = read_after_structure(&outcome.audit_dir);
    let intro_headings: Vec<_> = after.headings.iter().filter(|h| h.text == "引言").collect();
    assert_eq!(intro_headings.len(), 1);
    let previews: Vec<&str> = after
        .paragraphs
        .iter()
        .map(|p| p.preview_text.as_str())
        .collect();
    assert!(previews.contains(&"第一次出现的引言。"));
    assert!(!previews.contains(&"第二次出现的引言。"));
    assert!(after.headings.iter().any(|h| h.text == "结论"));
}

#[test]
fn s4_missing_font_falls_back_down_the_chain() {
    let root = tempfile::tempdir().unwrap();
    let input = DocBuilder::new()
        .heading(1, "正文")
        .paragraph("需要调整格式的内容。")
        .write_into(root.path(), "styling.docx");
    let plan = r#"{"schema_version":"plan.v1","ops":[
        {"operation":"set_style_rule","target_style":"Heading 1","font_east_asian":"楷体","font_size_pt":12,"font_bold":true}
    ]}"#;
    let client = ScriptedClient::new(&[plan]);

    let outcome = process_document_with_client(
        &input,
        "将一级标题设置为楷体小四加粗",
        test_options(root.path()),
        &client,
    )
    .unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    assert!(outcome
        .warnings
        .iter()
        .any(|w| w.contains("FONT_FALLBACK") && w.contains("STKaiti")));
    let after = read_after_structure(&outcome.audit_dir);
    let heading = after
        .styles
        .iter()
        .find(|s| s.name == "Heading 1")
        .expect("heading style");
    assert_eq!(heading.font.east_asian.as_deref(), Some("STKaiti"));
    assert_eq!(heading.font.size_pt, Some(12.0));
    assert_eq!(heading.font.bold, Some(true));
}

#[test]
fn s5_whitelist_violation_rejects_without_touching_the_input() {
    let root = tempfile::tempdir().unwrap();
    let input = normal_paper(root.path());
    let input_bytes = fs::read(&input).unwrap();
    let reply = r#"{"ops":[{"operation":"run_macro","name":"evil"}]}"#;
    let client = ScriptedClient::new(&[reply]);

    let outcome = process_document_with_client(
        &input,
        "帮我运行一个宏",
        test_options(root.path()),
        &client,
    )
    .unwrap();

    assert_eq!(outcome.status, RunStatus::InvalidPlan);
    assert!(outcome.output_path.is_none());
    assert_eq!(fs::read(&input).unwrap(), input_bytes);
    assert!(!outcome.audit_dir.join(audit::AFTER_DOCX).exists());
    assert_eq!(
        fs::read_to_string(outcome.audit_dir.join(audit::STATUS_FILE))
            .unwrap()
            .trim(),
        "INVALID_PLAN"
    );
    // The rejected reply is preserved as evidence.
    let captured = fs::read_to_string(outcome.audit_dir.join(audit::PLAN)).unwrap();
    assert!(captured.contains("run_macro"));
    assert!(outcome.errors[0].contains("INVALID_PLAN"));
}

#[test]
fn s6_surviving_forbidden_heading_fails_validation_and_rolls_back() {
    let root = tempfile::tempdir().unwrap();
    let input = normal_paper(root.path());
    let input_bytes = fs::read(&input).unwrap();
    let plan = r#"{"schema_version":"plan.v1","ops":[
        {"operation":"delete_section_by_heading","heading_text":"摘要","level":1,"match":"EXACT","case_sensitive":false}
    ]}"#;
    let client = ScriptedClient::new(&[plan]);

    let outcome = process_document_with_client(
        &input,
        "删除摘要和参考文献章节",
        test_options(root.path()),
        &client,
    )
    .unwrap();

    assert_eq!(outcome.status, RunStatus::FailedValidation);
    assert!(outcome.output_path.is_none());
    assert!(!root.path().join("output.docx").exists());
    assert!(!outcome.audit_dir.join(audit::AFTER_DOCX).exists());
    assert_eq!(fs::read(&input).unwrap(), input_bytes);
    assert_eq!(
        fs::read_to_string(outcome.audit_dir.join(audit::STATUS_FILE))
            .unwrap()
            .trim(),
        "FAILED_VALIDATION"
    );
    assert!(outcome.errors[0].contains("参考文献"));
}

#[test]
fn all_noop_plan_leaves_the_output_byte_identical() {
    let root = tempfile::tempdir().unwrap();
    let input = DocBuilder::new()
        .heading(1, "正文")
        .paragraph("内容。")
        .write_into(root.path(), "plain.docx");
    let input_bytes = fs::read(&input).unwrap();
    let plan = r#"{"schema_version":"plan.v1","ops":[
        {"operation":"delete_section_by_heading","heading_text":"不存在的标题","level":1,"match":"EXACT","case_sensitive":false},
        {"operation":"update_toc"},
        {"operation":"delete_toc","mode":"ALL"},
        {"operation":"set_style_rule","target_style":"Ghost Style","font_bold":true},
        {"operation":"reassign_paragraphs_to_style","selector":{"current_style":"Another Ghost"},"target_style":"Normal"}
    ]}"#;
    let client = ScriptedClient::new(&[plan]);

    let outcome = process_document_with_client(
        &input,
        "清理文档",
        test_options(root.path()),
        &client,
    )
    .unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    let output = outcome.output_path.expect("output written");
    assert_eq!(fs::read(&output).unwrap(), input_bytes, "byte identical");
    let log = fs::read_to_string(outcome.audit_dir.join(audit::WARNINGS_LOG)).unwrap();
    assert_eq!(log.lines().filter(|l| l.contains("NOOP")).count(), 5);
}

#[test]
fn empty_plan_on_empty_document_succeeds() {
    let root = tempfile::tempdir().unwrap();
    let input = DocBuilder::new().write_into(root.path(), "empty.docx");
    let client = ScriptedClient::new(&[r#"{"schema_version":"plan.v1","ops":[]}"#]);

    let outcome =
        process_document_with_client(&input, "什么都不做", test_options(root.path()), &client)
            .unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    let before: StructureV1 = serde_json::from_str(
        &fs::read_to_string(outcome.audit_dir.join(audit::BEFORE_STRUCTURE)).unwrap(),
    )
    .unwrap();
    assert!(before.paragraphs.is_empty());
    assert!(before.integrity_failures().is_empty());
}

#[test]
fn malformed_model_chatter_is_retried_then_rejected() {
    let root = tempfile::tempdir().unwrap();
    let input = normal_paper(root.path());
    let client = ScriptedClient::new(&["chatty prose", "more prose", "{not even close"]);

    let outcome = process_document_with_client(
        &input,
        "删除摘要",
        test_options(root.path()),
        &client,
    )
    .unwrap();

    assert_eq!(outcome.status, RunStatus::InvalidPlan);
    assert_eq!(
        fs::read_to_string(outcome.audit_dir.join(audit::STATUS_FILE))
            .unwrap()
            .trim(),
        "INVALID_PLAN"
    );
}

#[test]
fn dry_run_plans_without_executing() {
    let root = tempfile::tempdir().unwrap();
    let input = normal_paper(root.path());
    let input_bytes = fs::read(&input).unwrap();
    let client = ScriptedClient::new(&[DELETE_AND_UPDATE_PLAN]);

    let outcome = dry_run_with_client(
        &input,
        "删除摘要和参考文献章节并更新目录",
        test_options(root.path()),
        &client,
    )
    .unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    assert!(outcome.output_path.is_none());
    assert!(!root.path().join("output.docx").exists());
    assert!(!outcome.audit_dir.join(audit::AFTER_DOCX).exists());
    assert_eq!(fs::read(&input).unwrap(), input_bytes);
    let plan = fs::read_to_string(outcome.audit_dir.join(audit::PLAN)).unwrap();
    assert!(plan.contains("delete_section_by_heading"));
}

#[test]
fn tracked_changes_are_accepted_before_extraction() {
    let root = tempfile::tempdir().unwrap();
    let input = DocBuilder::new()
        .tracked_change_paragraph()
        .write_into(root.path(), "tracked.docx");
    let client = ScriptedClient::new(&[r#"{"schema_version":"plan.v1","ops":[]}"#]);

    let outcome =
        process_document_with_client(&input, "规范化文档", test_options(root.path()), &client)
            .unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    assert!(outcome.warnings.iter().any(|w| w.contains("accepted")));
    let before: StructureV1 = serde_json::from_str(
        &fs::read_to_string(outcome.audit_dir.join(audit::BEFORE_STRUCTURE)).unwrap(),
    )
    .unwrap();
    assert!(before.paragraphs[0].preview_text.contains("added"));
    assert!(!before.paragraphs[0].preview_text.contains("removed"));
}

#[test]
fn heading_inside_table_cell_removes_only_the_row() {
    let root = tempfile::tempdir().unwrap();
    let input = DocBuilder::new()
        .paragraph("before table")
        .table(
            &[
                vec!["附录A", "附录A内容"],
                vec!["附录B", "附录B内容"],
            ],
            &[(0, 0, 2), (1, 0, 2)],
        )
        .paragraph("after table")
        .write_into(root.path(), "table.docx");
    let plan = r#"{"schema_version":"plan.v1","ops":[
        {"operation":"delete_section_by_heading","heading_text":"附录A","level":2,"match":"EXACT","case_sensitive":false}
    ]}"#;
    let client = ScriptedClient::new(&[plan]);

    let outcome = process_document_with_client(
        &input,
        "删除附录A",
        test_options(root.path()),
        &client,
    )
    .unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    let after = read_after_structure(&outcome.audit_dir);
    assert_eq!(after.tables.len(), 1, "table survives");
    assert_eq!(after.tables[0].rows, 1, "one row removed");
    assert!(after.headings.iter().any(|h| h.text == "附录B" && h.in_table));
    assert!(!after.headings.iter().any(|h| h.text == "附录A"));
    let previews: Vec<&str> = after
        .paragraphs
        .iter()
        .map(|p| p.preview_text.as_str())
        .collect();
    assert!(previews.contains(&"before table"));
    assert!(previews.contains(&"after table"));
}

#[test]
fn protected_documents_abort_extraction() {
    let root = tempfile::tempdir().unwrap();
    let settings = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:documentProtection w:edit="readOnly" w:enforcement="1"/></w:settings>"#;
    let input = DocBuilder::new()
        .paragraph("locked")
        .extra_part("word/settings.xml", settings)
        .write_into(root.path(), "protected.docx");
    let client = ScriptedClient::new(&[r#"{"schema_version":"plan.v1","ops":[]}"#]);

    let outcome =
        process_document_with_client(&input, "改格式", test_options(root.path()), &client)
            .unwrap();

    assert_eq!(outcome.status, RunStatus::Error);
    assert!(outcome.errors[0].contains("EXTRACTION_ERROR"));
    assert_eq!(
        fs::read_to_string(outcome.audit_dir.join(audit::STATUS_FILE))
            .unwrap()
            .trim(),
        "ROLLBACK"
    );
}

#[test]
fn cancellation_before_planning_rolls_back() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let root = tempfile::tempdir().unwrap();
    let input = normal_paper(root.path());
    let input_bytes = fs::read(&input).unwrap();
    let client = ScriptedClient::new(&[DELETE_AND_UPDATE_PLAN]);
    let cancel = Arc::new(AtomicBool::new(false));
    cancel.store(true, Ordering::Relaxed);

    let outcome = run(
        &input,
        "删除摘要",
        test_options(root.path()),
        &client,
        RunMode::Full,
        Some(cancel),
    )
    .unwrap();

    assert_eq!(outcome.status, RunStatus::Rollback);
    assert_eq!(fs::read(&input).unwrap(), input_bytes);
    let log = fs::read_to_string(outcome.audit_dir.join(audit::WARNINGS_LOG)).unwrap();
    assert!(log.contains("CANCELLED"));
}

#[test]
fn batch_processes_every_document_and_writes_a_summary() {
    let root = tempfile::tempdir().unwrap();
    let docs = root.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    DocBuilder::new()
        .heading(1, "正文")
        .paragraph("甲")
        .write_into(&docs, "a.docx");
    DocBuilder::new()
        .heading(1, "正文")
        .paragraph("乙")
        .write_into(&docs, "b.docx");
    let client = ScriptedClient::new(&[
        r#"{"schema_version":"plan.v1","ops":[]}"#,
        r#"{"schema_version":"plan.v1","ops":[]}"#,
    ]);

    let mut options = test_options(root.path());
    options.output_path = None;
    let summary = run_batch_with_client(&docs, "整理文档", options, &client).unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.aggregate_status(), RunStatus::Success);
    assert!(root
        .path()
        .join("audit")
        .join(autodocx::workflow::BATCH_SUMMARY)
        .exists());
}
