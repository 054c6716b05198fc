//! Shared test infrastructure: a DOCX fixture builder and a scripted model
//! client. Fixtures are real OOXML packages written through the zip
//! container, so the tests exercise the same engine path production uses.

// Not every test target uses every helper.
#![allow(dead_code)]

use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};

use autodocx::config::Options;
use autodocx::planner::ModelClient;

pub struct ScriptedClient {
    replies: RefCell<Vec<Vec<u8>>>,
}

impl ScriptedClient {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: RefCell::new(
                replies
                    .iter()
                    .rev()
                    .map(|reply| reply.as_bytes().to_vec())
                    .collect(),
            ),
        }
    }
}

impl ModelClient for ScriptedClient {
    fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<Vec<u8>> {
        self.replies
            .borrow_mut()
            .pop()
            .ok_or_else(|| anyhow::anyhow!("scripted client exhausted"))
    }
}

/// Options pointing all artifacts into a scratch root.
pub fn test_options(root: &Path) -> Options {
    Options {
        audit_dir: root.join("audit"),
        output_path: Some(root.join("output.docx")),
        ..Options::default()
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[derive(Default)]
pub struct DocBuilder {
    items: Vec<String>,
    chinese_style_names: bool,
    title: Option<String>,
    extra_styles: Vec<String>,
    extra_parts: Vec<(String, Vec<u8>)>,
}

impl DocBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn chinese_style_names(mut self) -> Self {
        self.chinese_style_names = true;
        self
    }

    pub fn heading(mut self, level: u8, text: &str) -> Self {
        self.items.push(format!(
            "<w:p><w:pPr><w:pStyle w:val=\"Heading{level}\"/></w:pPr>\
             <w:r><w:t>{}</w:t></w:r></w:p>",
            escape(text)
        ));
        self
    }

    pub fn paragraph(mut self, text: &str) -> Self {
        self.items.push(format!(
            "<w:p><w:pPr><w:pStyle w:val=\"Normal\"/></w:pPr><w:r><w:t>{}</w:t></w:r></w:p>",
            escape(text)
        ));
        self
    }

    pub fn formatted_paragraph(mut self, text: &str) -> Self {
        self.items.push(format!(
            "<w:p><w:pPr><w:pStyle w:val=\"Normal\"/></w:pPr>\
             <w:r><w:rPr><w:b/><w:color w:val=\"FF0000\"/></w:rPr><w:t>{}</w:t></w:r></w:p>",
            escape(text)
        ));
        self
    }

    pub fn page_break(mut self) -> Self {
        self.items
            .push("<w:p><w:r><w:br w:type=\"page\"/></w:r></w:p>".to_string());
        self
    }

    /// A complex TOC field block: begin + code, one styled entry paragraph
    /// per entry, end.
    pub fn toc(mut self, dirty: bool, entries: &[(u8, &str, u32)]) -> Self {
        let dirty_attr = if dirty { " w:dirty=\"true\"" } else { "" };
        self.items.push(format!(
            "<w:p><w:r><w:fldChar w:fldCharType=\"begin\"{dirty_attr}/></w:r>\
             <w:r><w:instrText xml:space=\"preserve\"> TOC \\o &quot;1-3&quot; \\h \\z \\u </w:instrText></w:r>\
             <w:r><w:fldChar w:fldCharType=\"separate\"/></w:r></w:p>"
        ));
        for (level, text, page) in entries {
            self.items.push(format!(
                "<w:p><w:pPr><w:pStyle w:val=\"TOC{level}\"/></w:pPr>\
                 <w:r><w:t>{}</w:t></w:r><w:r><w:tab/></w:r><w:r><w:t>{page}</w:t></w:r></w:p>",
                escape(text)
            ));
        }
        self.items
            .push("<w:p><w:r><w:fldChar w:fldCharType=\"end\"/></w:r></w:p>".to_string());
        self
    }

    /// One-row-per-entry table; each cell holds one paragraph. The first
    /// cell text may be styled as a heading via `heading_cells`.
    pub fn table(mut self, rows: &[Vec<&str>], heading_cells: &[(usize, usize, u8)]) -> Self {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(1);
        let mut xml = String::from("<w:tbl><w:tblPr><w:tblStyle w:val=\"TableGrid\"/></w:tblPr>");
        xml.push_str("<w:tblGrid>");
        for _ in 0..columns {
            xml.push_str("<w:gridCol w:w=\"2000\"/>");
        }
        xml.push_str("</w:tblGrid>");
        for (row_index, row) in rows.iter().enumerate() {
            xml.push_str("<w:tr>");
            for (cell_index, text) in row.iter().enumerate() {
                let heading = heading_cells
                    .iter()
                    .find(|(r, c, _)| *r == row_index && *c == cell_index);
                let ppr = match heading {
                    Some((_, _, level)) => {
                        format!("<w:pPr><w:pStyle w:val=\"Heading{level}\"/></w:pPr>")
                    }
                    None => "<w:pPr><w:pStyle w:val=\"Normal\"/></w:pPr>".to_string(),
                };
                xml.push_str(&format!(
                    "<w:tc><w:tcPr><w:tcW w:w=\"2000\" w:type=\"dxa\"/></w:tcPr>\
                     <w:p>{ppr}<w:r><w:t>{}</w:t></w:r></w:p></w:tc>",
                    escape(text)
                ));
            }
            xml.push_str("</w:tr>");
        }
        xml.push_str("</w:tbl>");
        self.items.push(xml);
        self
    }

    pub fn tracked_change_paragraph(mut self) -> Self {
        self.items.push(
            "<w:p><w:r><w:t>base </w:t></w:r>\
             <w:ins w:id=\"1\" w:author=\"reviewer\"><w:r><w:t>added</w:t></w:r></w:ins>\
             <w:del w:id=\"2\" w:author=\"reviewer\"><w:r><w:delText>removed</w:delText></w:r></w:del>\
             </w:p>"
                .to_string(),
        );
        self
    }

    pub fn raw_body_item(mut self, xml: &str) -> Self {
        self.items.push(xml.to_string());
        self
    }

    pub fn extra_style(mut self, xml: &str) -> Self {
        self.extra_styles.push(xml.to_string());
        self
    }

    pub fn extra_part(mut self, name: &str, bytes: &[u8]) -> Self {
        self.extra_parts.push((name.to_string(), bytes.to_vec()));
        self
    }

    fn style_name(&self, english: &str, chinese: &str) -> String {
        if self.chinese_style_names {
            chinese.to_string()
        } else {
            english.to_string()
        }
    }

    fn styles_xml(&self) -> String {
        let mut styles = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <w:styles xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii=\"Calibri\" w:hAnsi=\"Calibri\" w:eastAsia=\"宋体\"/>\
             <w:sz w:val=\"21\"/></w:rPr></w:rPrDefault></w:docDefaults>",
        );
        styles.push_str(&format!(
            "<w:style w:type=\"paragraph\" w:styleId=\"Normal\" w:default=\"1\">\
             <w:name w:val=\"{}\"/><w:qFormat/></w:style>",
            self.style_name("Normal", "正文")
        ));
        for level in 1..=3u8 {
            styles.push_str(&format!(
                "<w:style w:type=\"paragraph\" w:styleId=\"Heading{level}\">\
                 <w:name w:val=\"{}\"/><w:basedOn w:val=\"Normal\"/>\
                 <w:pPr><w:keepNext/><w:spacing w:before=\"240\" w:after=\"120\"/><w:outlineLvl w:val=\"{}\"/></w:pPr>\
                 <w:rPr><w:rFonts w:ascii=\"Times New Roman\" w:hAnsi=\"Times New Roman\" w:eastAsia=\"黑体\"/><w:b/><w:sz w:val=\"{}\"/></w:rPr>\
                 </w:style>",
                self.style_name(&format!("Heading {level}"), &format!("标题 {level}")),
                level - 1,
                36 - 4 * u32::from(level)
            ));
        }
        for level in 1..=3u8 {
            styles.push_str(&format!(
                "<w:style w:type=\"paragraph\" w:styleId=\"TOC{level}\">\
                 <w:name w:val=\"toc {level}\"/><w:basedOn w:val=\"Normal\"/>\
                 <w:pPr><w:ind w:left=\"{}\"/></w:pPr></w:style>",
                u32::from(level - 1) * 210
            ));
        }
        for extra in &self.extra_styles {
            styles.push_str(extra);
        }
        styles.push_str("</w:styles>");
        styles
    }

    fn document_xml(&self) -> String {
        let mut body = String::new();
        for item in &self.items {
            body.push_str(item);
        }
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:body>{body}<w:sectPr><w:pgSz w:w=\"11906\" w:h=\"16838\"/></w:sectPr></w:body></w:document>"
        )
    }

    fn core_xml(&self) -> String {
        let title = escape(self.title.as_deref().unwrap_or("Fixture Document"));
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <cp:coreProperties xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" \
             xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:dcterms=\"http://purl.org/dc/terms/\" \
             xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\
             <dc:title>{title}</dc:title><dc:creator>fixture</dc:creator>\
             <dcterms:created xsi:type=\"dcterms:W3CDTF\">2024-01-01T00:00:00Z</dcterms:created>\
             <dcterms:modified xsi:type=\"dcterms:W3CDTF\">2024-06-01T00:00:00Z</dcterms:modified>\
             </cp:coreProperties>"
        )
    }

    pub fn write_to(&self, path: &Path) {
        let content_types = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
            <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
            <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
            <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
            <Default Extension=\"png\" ContentType=\"image/png\"/>\
            <Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>\
            <Override PartName=\"/word/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml\"/>\
            <Override PartName=\"/docProps/core.xml\" ContentType=\"application/vnd.openxmlformats-package.core-properties+xml\"/>\
            <Override PartName=\"/docProps/app.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.extended-properties+xml\"/>\
            </Types>";
        let root_rels = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
            <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
            <Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"word/document.xml\"/>\
            <Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties\" Target=\"docProps/core.xml\"/>\
            <Relationship Id=\"rId3\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties\" Target=\"docProps/app.xml\"/>\
            </Relationships>";
        let document_rels = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
            <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
            <Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>\
            </Relationships>";
        let app = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
            <Properties xmlns=\"http://schemas.openxmlformats.org/officeDocument/2006/extended-properties\">\
            <Application>Fixture Writer</Application><AppVersion>16.0000</AppVersion>\
            </Properties>";

        let file = std::fs::File::create(path).expect("create fixture file");
        let mut writer = zip::ZipWriter::new(file);
        let mut write_part = |name: &str, bytes: &[u8]| {
            let options = zip::write::FileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);
            writer.start_file(name, options).expect("start zip entry");
            writer.write_all(bytes).expect("write zip entry");
        };
        write_part("[Content_Types].xml", content_types.as_bytes());
        write_part("_rels/.rels", root_rels.as_bytes());
        write_part("word/_rels/document.xml.rels", document_rels.as_bytes());
        write_part("word/document.xml", self.document_xml().as_bytes());
        write_part("word/styles.xml", self.styles_xml().as_bytes());
        write_part("docProps/core.xml", self.core_xml().as_bytes());
        write_part("docProps/app.xml", app.as_bytes());
        for (name, bytes) in &self.extra_parts {
            write_part(name, bytes);
        }
        writer.finish().expect("finish fixture zip");
    }

    pub fn write_into(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        self.write_to(&path);
        path
    }
}

/// The seed corpus document: 摘要 / 正文 / 参考文献 with a TOC.
pub fn normal_paper(dir: &Path) -> PathBuf {
    DocBuilder::new()
        .title("毕业论文")
        .toc(
            false,
            &[(1, "摘要", 1), (1, "正文", 1), (1, "参考文献", 2)],
        )
        .heading(1, "摘要")
        .paragraph("本文研究了文档自动化处理。")
        .heading(1, "正文")
        .paragraph("正文内容第一段。")
        .page_break()
        .heading(1, "参考文献")
        .paragraph("[1] 某某. 某书. 2020.")
        .write_into(dir, "paper.docx")
}
