//! Turning HTTP outcomes into [`ClientError`]s.
//!
//! Backends disagree on where they put the human-readable reason for a failure.
//! Everything here reads it in one fixed order so callers never inspect raw bodies.

use crate::error::{ClientError, FieldErrors};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::Value;
use std::time::Duration;

pub const FALLBACK_MESSAGE: &str = "Something went wrong. Please try again.";

/// Body fields that carry a general message, in priority order.
const MESSAGE_FIELDS: [&str; 4] = ["detail", "error", "message", "non_field_errors"];

/// Picks the message for a failed response.
///
/// Order: a server-supplied `detail`/`error`/`message`/`non_field_errors`
/// field, the first per-field validation message, the HTTP status line, then a
/// generic fallback.
#[must_use]
pub fn error_message(status: StatusCode, body: Option<&Value>) -> String {
    body.and_then(server_message)
        .or_else(|| field_errors(body).into_values().flatten().next())
        .or_else(|| status.canonical_reason().map(|reason| format!("{} {reason}", status.as_u16())))
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}

fn server_message(body: &Value) -> Option<String> {
    match body {
        Value::Object(map) => MESSAGE_FIELDS.iter().find_map(|field| map.get(*field).and_then(text_of)),
        other => text_of(other),
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Array(items) => items.iter().find_map(text_of),
        Value::Object(map) => ["message", "detail"].iter().find_map(|key| map.get(*key).and_then(text_of)),
        _ => None,
    }
}

/// Collects `{ "field": ["message", ...] }` entries, skipping the general message fields.
#[must_use]
pub fn field_errors(body: Option<&Value>) -> FieldErrors {
    let Some(Value::Object(map)) = body else {
        return FieldErrors::new();
    };

    map.iter()
        .filter(|(key, _)| !MESSAGE_FIELDS.contains(&key.as_str()))
        .filter_map(|(key, value)| {
            let messages: Vec<String> = match value {
                Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
                Value::Array(items) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
                _ => Vec::new(),
            };
            (!messages.is_empty()).then(|| (key.clone(), messages))
        })
        .collect()
}

/// Seconds from a `Retry-After` header. HTTP-date values are ignored.
#[must_use]
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Maps a non-2xx response onto the error taxonomy.
#[must_use]
pub fn classify(status: StatusCode, body: Option<&Value>, retry_after: Option<Duration>, account_lookup: bool) -> ClientError {
    let message = error_message(status, body);
    let code = status.as_u16();

    match status {
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            ClientError::Validation { status: Some(code), message, fields: field_errors(body) }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Authentication { status: Some(code), message },
        StatusCode::NOT_FOUND if account_lookup => ClientError::Authentication { status: Some(code), message },
        StatusCode::REQUEST_TIMEOUT => ClientError::Timeout(message),
        StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimited { message, retry_after },
        s if s.is_server_error() => ClientError::Server { status: code, message },
        _ => ClientError::Unknown { status: Some(code), message },
    }
}

/// Maps a failure that happened before a complete response arrived.
#[must_use]
pub fn transport_error(e: &reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout("The server took too long to respond".to_string())
    } else if e.is_connect() {
        ClientError::Network("Could not reach the server. Check your connection and try again.".to_string())
    } else if e.is_builder() {
        ClientError::unknown(format!("Invalid request: {e}"))
    } else if e.is_request() || e.is_body() || e.is_decode() {
        ClientError::Network(format!("The connection to the server failed: {e}"))
    } else {
        ClientError::unknown(format!("Request failed: {e}"))
    }
}

/// A 2xx body: parsed JSON, or `None` when empty or not JSON.
#[must_use]
pub fn success_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(bytes).ok()
}
