//! Scrub credentials out of vendor error text before it reaches logs or the host.

use super::ProviderError;

const MAX_ERROR_CHARS: usize = 300;
const REDACTED: &str = "[REDACTED]";

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// Redact anything following `Bearer ` and any occurrence of the active key.
pub fn scrub_credentials(input: &str, api_key: Option<&str>) -> String {
    let mut out = match api_key {
        Some(key) if !key.is_empty() => input.replace(key, REDACTED),
        _ => input.to_string(),
    };

    let mut from = 0;
    while let Some(rel) = out[from..].find("Bearer ") {
        let start = from + rel + "Bearer ".len();
        let end = out[start..]
            .char_indices()
            .find(|(_, c)| !is_token_char(*c))
            .map(|(i, _)| start + i)
            .unwrap_or(out.len());
        if end > start {
            out.replace_range(start..end, REDACTED);
            from = start + REDACTED.len();
        } else {
            from = start;
        }
    }
    out
}

/// Cap error text length at a char boundary.
pub fn truncate(input: &str) -> String {
    if input.chars().count() <= MAX_ERROR_CHARS {
        return input.to_string();
    }
    let end = input
        .char_indices()
        .nth(MAX_ERROR_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    format!("{}...", &input[..end])
}

/// Build the error for a failed HTTP call. The reason phrase leads the body so
/// vendor wording like "Too Many Requests" is part of the message.
pub fn api_error(status: reqwest::StatusCode, body: &str, api_key: Option<&str>) -> ProviderError {
    let body = truncate(&scrub_credentials(body.trim(), api_key));
    let body = match status.canonical_reason() {
        Some(reason) if body.is_empty() => reason.to_string(),
        Some(reason) => format!("{}: {}", reason, body),
        None => body,
    };
    ProviderError::Http {
        status: status.as_u16(),
        body,
    }
}
