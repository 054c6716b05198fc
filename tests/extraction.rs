//! Extraction invariants: determinism, index coherence, preview caps,
//! occurrence numbering.

mod common;

use autodocx::docx::Session;
use autodocx::extract::extract;
use autodocx::warnings::WarningSink;
use common::DocBuilder;

#[test]
fn extracting_twice_yields_byte_equal_json() {
    let root = tempfile::tempdir().unwrap();
    let input = common::normal_paper(root.path());

    let mut first_json = Vec::new();
    let mut second_json = Vec::new();
    for target in [&mut first_json, &mut second_json] {
        let session = Session::open(&input).unwrap();
        let mut sink = WarningSink::new();
        let (structure, inventory) = extract(&session, &mut sink).unwrap();
        target.extend(serde_json::to_vec(&structure).unwrap());
        target.extend(serde_json::to_vec(&inventory).unwrap());
    }
    assert_eq!(first_json, second_json);
}

#[test]
fn indices_are_dense_and_references_valid() {
    let root = tempfile::tempdir().unwrap();
    let input = DocBuilder::new()
        .toc(false, &[(1, "第一章", 1)])
        .heading(1, "第一章")
        .paragraph("第一章内容。")
        .table(&[vec!["左", "右"]], &[])
        .heading(2, "小节")
        .paragraph("小节内容。")
        .write_into(root.path(), "mixed.docx");

    let session = Session::open(&input).unwrap();
    let mut sink = WarningSink::new();
    let (structure, _) = extract(&session, &mut sink).unwrap();

    assert!(structure.integrity_failures().is_empty());
    for (expected, paragraph) in structure.paragraphs.iter().enumerate() {
        assert_eq!(paragraph.index, expected);
    }
    assert_eq!(structure.tables.len(), 1);
    assert_eq!(structure.tables[0].columns, 2);
    assert_eq!(structure.tables[0].cell_references.len(), 2);
}

#[test]
fn preview_text_caps_at_120_scalars() {
    let root = tempfile::tempdir().unwrap();
    let long_text = "汉".repeat(300);
    let input = DocBuilder::new()
        .paragraph(&long_text)
        .write_into(root.path(), "long.docx");

    let session = Session::open(&input).unwrap();
    let mut sink = WarningSink::new();
    let (structure, _) = extract(&session, &mut sink).unwrap();

    let preview = &structure.paragraphs[0].preview_text;
    assert_eq!(preview.chars().count(), 120);
    assert!(long_text.starts_with(preview));
}

#[test]
fn duplicate_headings_carry_occurrence_order() {
    let root = tempfile::tempdir().unwrap();
    let input = DocBuilder::new()
        .heading(1, "引言")
        .paragraph("a")
        .heading(1, "引言")
        .paragraph("b")
        .heading(2, "引言")
        .write_into(root.path(), "dupes.docx");

    let session = Session::open(&input).unwrap();
    let mut sink = WarningSink::new();
    let (structure, _) = extract(&session, &mut sink).unwrap();

    let level1: Vec<_> = structure
        .headings
        .iter()
        .filter(|h| h.text == "引言" && h.level == 1)
        .collect();
    assert_eq!(level1.len(), 2);
    assert_eq!(level1[0].occurrence, 1);
    assert_eq!(level1[1].occurrence, 2);
    // The level-2 duplicate counts separately.
    let level2: Vec<_> = structure
        .headings
        .iter()
        .filter(|h| h.text == "引言" && h.level == 2)
        .collect();
    assert_eq!(level2[0].occurrence, 1);
}

#[test]
fn table_headings_record_their_table() {
    let root = tempfile::tempdir().unwrap();
    let input = DocBuilder::new()
        .paragraph("intro")
        .table(&[vec!["附录", "内容"]], &[(0, 0, 1)])
        .write_into(root.path(), "anchored.docx");

    let session = Session::open(&input).unwrap();
    let mut sink = WarningSink::new();
    let (structure, _) = extract(&session, &mut sink).unwrap();

    let heading = structure
        .headings
        .iter()
        .find(|h| h.text == "附录")
        .expect("table heading");
    assert!(heading.in_table);
    assert_eq!(heading.table_index, Some(0));
    assert!(structure.tables[0]
        .cell_references
        .contains(&heading.paragraph_index));
}

#[test]
fn fields_capture_code_verbatim() {
    let root = tempfile::tempdir().unwrap();
    let input = DocBuilder::new()
        .toc(true, &[(1, "第一章", 1)])
        .heading(1, "第一章")
        .write_into(root.path(), "fields.docx");

    let session = Session::open(&input).unwrap();
    let mut sink = WarningSink::new();
    let (structure, _) = extract(&session, &mut sink).unwrap();

    let toc = structure
        .fields
        .iter()
        .find(|f| f.field_type == "TOC")
        .expect("toc field");
    assert_eq!(toc.code, r#"TOC \o "1-3" \h \z \u"#);
    assert!(toc.needs_update, "dirty flag carries through");
    assert!(!toc.is_locked);
}

#[test]
fn inventory_captures_media_and_auxiliary_parts() {
    let root = tempfile::tempdir().unwrap();
    let footer = br#"<?xml version="1.0"?><w:ftr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:p/></w:ftr>"#;
    let input = DocBuilder::new()
        .paragraph("with media")
        .extra_part("word/media/image1.png", &[0x89, 0x50, 0x4e, 0x47])
        .extra_part("word/footer1.xml", footer)
        .write_into(root.path(), "media.docx");

    let session = Session::open(&input).unwrap();
    let mut sink = WarningSink::new();
    let (_, inventory) = extract(&session, &mut sink).unwrap();

    assert!(inventory.ooxml_fragments.contains_key("word/footer1.xml"));
    let media = inventory
        .media_indexes
        .get("word/media/image1.png")
        .expect("media captured");
    assert_eq!(media.content_type, "image/png");
    assert_eq!(media.size_bytes, 4);
    assert!(media.embedded);
}
