//! Tracked-change pre-processing.
//!
//! Runs before extraction so the skeleton reflects one consistent reading
//! of the document: `accept` keeps insertions and drops deletions,
//! `reject` the inverse, `bypass` leaves the markup alone.

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::xmlutil::qname;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Accept,
    Reject,
}

pub fn accept_revisions(xml: &str) -> Result<(String, bool)> {
    apply(xml, Mode::Accept)
}

pub fn reject_revisions(xml: &str) -> Result<(String, bool)> {
    apply(xml, Mode::Reject)
}

pub fn has_revisions(xml: &str) -> bool {
    xml.contains("<w:ins ") || xml.contains("<w:ins>") || xml.contains("<w:del ")
        || xml.contains("<w:del>")
}

fn apply(xml: &str, mode: Mode) -> Result<(String, bool)> {
    let (drop_subtree, unwrap_tag) = match mode {
        Mode::Accept => ("w:del", "w:ins"),
        Mode::Reject => ("w:ins", "w:del"),
    };
    let mut reader = Reader::from_str(xml);
    let mut out = String::with_capacity(xml.len());
    let mut last = 0usize;
    let mut changed = false;
    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event().context("scan revisions")? {
            Event::Start(start) => {
                let name = qname(start.name().as_ref());
                if name == drop_subtree {
                    out.push_str(&xml[last..before]);
                    reader
                        .read_to_end(start.name())
                        .context("skip rejected revision")?;
                    last = reader.buffer_position() as usize;
                    changed = true;
                } else if name == unwrap_tag {
                    out.push_str(&xml[last..before]);
                    last = reader.buffer_position() as usize;
                    changed = true;
                }
            }
            Event::End(end) => {
                if qname(end.name().as_ref()) == unwrap_tag {
                    out.push_str(&xml[last..before]);
                    last = reader.buffer_position() as usize;
                    changed = true;
                }
            }
            Event::Empty(start) => {
                let name = qname(start.name().as_ref());
                if name == drop_subtree || name == unwrap_tag {
                    out.push_str(&xml[last..before]);
                    last = reader.buffer_position() as usize;
                    changed = true;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    out.push_str(&xml[last..]);
    if mode == Mode::Reject && changed {
        // Surviving deleted text becomes regular text again.
        out = out.replace("<w:delText>", "<w:t>").replace(
            "<w:delText ",
            "<w:t ",
        );
        out = out.replace("</w:delText>", "</w:t>");
    }
    Ok((out, changed))
}
