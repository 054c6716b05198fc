//! Headless OOXML engine.
//!
//! This is the word-processing collaborator the pipeline drives: it opens
//! and saves DOCX packages and exposes styles, paragraphs, headings,
//! fields, tables, and raw part access. Untouched content is preserved
//! byte-for-byte by keeping the original XML of every element the run does
//! not rewrite.

pub mod document;
pub mod fields;
pub mod package;
pub mod revision;
pub mod session;
pub mod styles;
pub mod xmlutil;

pub use document::{DocumentXml, ParaAddress, Paragraph};
pub use package::DocxPackage;
pub use session::Session;
pub use styles::StyleSheet;
