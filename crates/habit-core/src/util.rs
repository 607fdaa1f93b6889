//! Small helpers shared by config, the HTTP gateway, and the store.

/// Trim optional text, mapping blanks to `None`.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Canonical API base URL: trimmed, `http(s)://`, no trailing slash.
///
/// The error is a short reason for the caller to wrap in its own error type.
pub fn canonical_base_url(raw: &str) -> Result<String, &'static str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("must not be empty");
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err("must include http:// or https://");
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Clip a response body for logs and error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current Unix timestamp in milliseconds.
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Modification marker that follows `previous`, even if the clock stalls or steps back.
pub fn next_modified(previous: i64) -> i64 {
    unix_millis_now().max(previous.saturating_add(1))
}
