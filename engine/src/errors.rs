//! Turning stream failures into reply text.

use parley_types::truncate_to_fit;
use serde_json::Value;

const MAX_DETAIL_CHARS: usize = 400;

fn split_api_error(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix("API error ")?;
    let (status, body) = rest.split_once(": ")?;
    Some((status.trim(), body.trim()))
}

/// Pull the human-readable message out of a JSON error body.
///
/// Ollama answers `{"error": "..."}`; some proxies wrap it as
/// `{"error": {"message": "..."}}`.
fn extract_error_message(body: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(body).ok()?;
    payload
        .get("error")
        .and_then(Value::as_str)
        .or_else(|| payload.pointer("/error/message").and_then(Value::as_str))
        .or_else(|| payload.get("message").and_then(Value::as_str))
        .map(str::to_string)
}

/// Condense a raw stream error into one readable line.
#[must_use]
pub fn format_stream_error(raw: &str) -> String {
    let trimmed = raw.trim();
    let detail = match split_api_error(trimmed) {
        Some((status, body)) => {
            let message = extract_error_message(body).unwrap_or_else(|| body.to_string());
            format!("API error {status}: {message}")
        }
        None => extract_error_message(trimmed).unwrap_or_else(|| trimmed.to_string()),
    };
    if detail.is_empty() {
        return "unknown error".to_string();
    }
    truncate_to_fit(&detail, MAX_DETAIL_CHARS, "...")
}

/// Assistant reply shown (and saved) in place of a failed answer.
#[must_use]
pub fn error_reply(raw: &str) -> String {
    format!("**Error:** {}", format_stream_error(raw))
}
