//! On-disk text formats for the cursor and failure files.

use std::collections::BTreeSet;

/// Parses cursor file content.
///
/// Blank content means "no cursor". Anything else must be a single decimal
/// integer, surrounding whitespace allowed.
pub fn parse_cursor(content: &str) -> Result<Option<u64>, String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|e| format!("expected a decimal incident id, found {trimmed:?}: {e}"))
}

/// Formats a cursor value for the cursor file (no trailing newline).
pub fn format_cursor(id: u64) -> String {
    id.to_string()
}

/// Parses failure file content.
///
/// Tokens are comma-separated. Blank and non-numeric tokens are dropped so a
/// single damaged entry never blocks the rest; duplicates collapse.
pub fn parse_failure_list(content: &str) -> BTreeSet<u64> {
    content
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| token.parse::<u64>().ok())
        .collect()
}

/// Formats a failure set as a comma-joined list in ascending order.
pub fn format_failure_list(ids: &BTreeSet<u64>) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
