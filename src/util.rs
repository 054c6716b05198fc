use chrono::{DateTime, Utc};

/// Truncate to at most `max` Unicode scalar values, never splitting a scalar.
pub fn truncate_scalars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

/// Compact UTC timestamp used in run directory names.
pub fn compact_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// Normalize heading text for matching: numbering tabs and surrounding
/// whitespace do not count.
pub fn normalize_heading_text(text: &str) -> String {
    text.trim().trim_end_matches(['\t', '\u{a0}']).to_string()
}
