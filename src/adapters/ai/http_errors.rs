//! Maps HTTP failures of generative providers onto [`BackendError`].

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

use crate::ports::BackendError;

/// Used when a throttling response carries no usable hint.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// Throttling statuses become `Throttled`, everything else `Unavailable`.
pub fn classify_status(status: StatusCode, headers: &HeaderMap, body: &str) -> BackendError {
    // 529 is Anthropic's "overloaded"
    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 529 {
        let retry_after = retry_after_header(headers)
            .or_else(|| retry_after_in_body(body))
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return BackendError::throttled(retry_after);
    }
    match status.as_u16() {
        401 | 403 => BackendError::unavailable("authentication failed"),
        500..=599 => BackendError::unavailable(format!("server error {}", status)),
        _ => BackendError::unavailable(format!("unexpected status {}: {}", status, truncate(body))),
    }
}

pub fn classify_transport(err: &reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::unavailable("request timed out")
    } else if err.is_connect() {
        BackendError::unavailable(format!("connection failed: {}", err))
    } else {
        BackendError::unavailable(err.to_string())
    }
}

fn retry_after_header(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|secs| secs.ceil().max(1.0) as u64)
}

/// Finds "try again in Ns" in a provider error message.
fn retry_after_in_body(body: &str) -> Option<u64> {
    let idx = body.find("try again in ")?;
    let rest = &body[idx + "try again in ".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok().filter(|secs| *secs > 0)
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
