// Shared HTTP helpers for generation capability adapters.

use std::time::Duration;

use reqwest::header::HeaderMap;
use serde_json::Value;

/// Parse the `Retry-After` header as either numeric seconds or HTTP-date (RFC 7231).
/// Returns `None` if the header is missing, unparseable, or names a past date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?;

    if let Ok(secs) = value.parse::<f64>() {
        // Duration::from_secs_f64 panics on negative, NaN and infinite input.
        if secs >= 0.0 && secs.is_finite() {
            return Some(Duration::from_secs_f64(secs));
        }
        return None;
    }

    let date = httpdate::parse_http_date(value).ok()?;
    date.duration_since(std::time::SystemTime::now()).ok()
}

/// Extract `(message, code)` from an error body such as
/// `{"error": {"message": "...", "code": "..."}}`.
///
/// Falls back to the serialized body when the message is not where expected.
pub fn parse_provider_error_message(body: &Value) -> (String, Option<String>) {
    let error = body.get("error");
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());
    let code = error
        .and_then(|e| e.get("code").or_else(|| e.get("type")))
        .and_then(Value::as_str)
        .map(str::to_string);
    (message, code)
}
