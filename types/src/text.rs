//! Small pure text helpers.

fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Keep the first `max_content` characters and append `suffix` when cut.
///
/// The suffix is not counted: conversation titles are `first 30 chars + "..."`.
#[must_use]
pub fn truncate_preview(raw: &str, max_content: usize, suffix: &str) -> String {
    let head = take_chars(raw, max_content);
    if head.len() == raw.len() {
        raw.to_string()
    } else {
        format!("{head}{suffix}")
    }
}

/// Truncate so the result, suffix included, is at most `max_total` characters.
#[must_use]
pub fn truncate_to_fit(raw: &str, max_total: usize, suffix: &str) -> String {
    if raw.chars().count() <= max_total {
        return raw.to_string();
    }
    let keep = max_total.saturating_sub(suffix.chars().count());
    format!("{}{suffix}", take_chars(raw, keep))
}
