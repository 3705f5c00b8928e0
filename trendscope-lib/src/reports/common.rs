//! Formatting helpers shared across report generators.

use crate::facts::{ProjectRecord, SourceKind};

/// Format a count with thousands separators, e.g. `12,345`.
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i).is_multiple_of(3) {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format a signed change as `+N`, `-N`, or `0`.
pub fn format_delta(delta: i128) -> String {
    match delta {
        0 => "0".to_string(),
        d if d > 0 => format!("+{}", format_count(u64::try_from(d).unwrap_or(u64::MAX))),
        d => format!("-{}", format_count(u64::try_from(d.unsigned_abs()).unwrap_or(u64::MAX))),
    }
}

/// Shorten `text` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Make text safe for a Markdown table cell.
pub fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Markdown link to the project's page.
pub fn project_link(record: &ProjectRecord) -> String {
    format!("[{}]({})", record.repo_id, escape_cell(&record.url))
}

/// One marker per source kind the project was seen through.
pub fn source_markers(record: &ProjectRecord) -> String {
    [
        (SourceKind::Watchlist, "⭐"),
        (SourceKind::Trending, "🔥"),
        (SourceKind::Keyword, "🔍"),
    ]
    .into_iter()
    .filter(|(kind, _)| record.has_source_kind(*kind))
    .map(|(_, marker)| marker)
    .collect()
}
