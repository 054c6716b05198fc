//! Run-scoped warning collection backing the `warnings.log` artifact.
//!
//! Warnings never change the run status. Every NOOP, font fallback, and
//! alias resolution lands here so the audit trail explains what the run
//! actually did.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    Noop,
    FontFallback,
    StyleAlias,
    Revision,
    Cancellation,
    Monitor,
    General,
}

impl WarningKind {
    pub fn label(self) -> &'static str {
        match self {
            WarningKind::Noop => "NOOP",
            WarningKind::FontFallback => "FONT_FALLBACK",
            WarningKind::StyleAlias => "STYLE_ALIAS",
            WarningKind::Revision => "REVISION",
            WarningKind::Cancellation => "CANCELLED",
            WarningKind::Monitor => "MONITOR",
            WarningKind::General => "WARNING",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Warning {
    pub at: DateTime<Utc>,
    pub kind: WarningKind,
    pub stage: &'static str,
    pub message: String,
}

/// Single-threaded sink owned by the run context and lent to stages.
#[derive(Debug, Default)]
pub struct WarningSink {
    entries: Vec<Warning>,
}

impl WarningSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: WarningKind, stage: &'static str, message: impl Into<String>) {
        self.entries.push(Warning {
            at: Utc::now(),
            kind,
            stage,
            message: message.into(),
        });
    }

    /// Record an operation that found no target. One entry per NOOP is an
    /// audited invariant.
    pub fn noop(&mut self, operation: &str, reason: impl AsRef<str>) {
        self.push(
            WarningKind::Noop,
            "execute",
            format!("{operation}: {}", reason.as_ref()),
        );
    }

    pub fn entries(&self) -> &[Warning] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|w| format!("[{}] {}", w.kind.label(), w.message))
            .collect()
    }

    pub fn count_of(&self, kind: WarningKind) -> usize {
        self.entries.iter().filter(|w| w.kind == kind).count()
    }

    /// Render the warnings.log body. One line per warning, UTF-8, stamped.
    pub fn render_log(&self) -> String {
        let mut out = String::new();
        for warning in &self.entries {
            out.push_str(&format!(
                "{} [{}] {} {}\n",
                warning.at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                warning.stage,
                warning.kind.label(),
                warning.message
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_entries_carry_operation_and_reason() {
        let mut sink = WarningSink::new();
        sink.noop("update_toc", "no TOC fields in document");
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.count_of(WarningKind::Noop), 1);
        let log = sink.render_log();
        assert!(log.contains("NOOP update_toc: no TOC fields in document"));
        assert!(log.contains("[execute]"));
    }

    #[test]
    fn render_is_one_line_per_warning() {
        let mut sink = WarningSink::new();
        sink.push(WarningKind::FontFallback, "execute", "楷体 -> STKaiti");
        sink.push(WarningKind::StyleAlias, "execute", "Heading 1 -> 标题 1");
        assert_eq!(sink.render_log().lines().count(), 2);
    }
}
