//! Shared error types and error-body parsing.

use serde::Deserialize;

/// Error envelope returned by the backend for failed `/api/*` requests.
///
/// Most endpoints answer with `{"detail": "..."}`. Request validation failures
/// answer with a list of `{"loc": [...], "msg": "..."}` items instead, so
/// `detail` is kept as a raw JSON value and interpreted by [`ErrorBody::message`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    #[serde(default)]
    pub title: Option<String>,
}

impl ErrorBody {
    /// The most specific human-readable message carried by the body.
    /// Prefers `detail`, falls back to `title`.
    pub fn message(&self) -> Option<String> {
        let from_detail = match &self.detail {
            Some(serde_json::Value::String(detail)) => Some(detail.clone()),
            Some(serde_json::Value::Array(items)) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .collect();
                (!msgs.is_empty()).then(|| msgs.join("; "))
            }
            _ => None,
        };

        from_detail
            .filter(|m| !m.trim().is_empty())
            .or_else(|| self.title.clone().filter(|t| !t.trim().is_empty()))
    }
}

/// Attempt to parse an error body into a user-facing message.
pub fn try_error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body).ok()?.message()
}

/// API error type for client-side use
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

impl ApiError {
    /// HTTP status code, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message suitable for showing to the user: the body's `detail` for
    /// non-2xx answers that carry one, `fallback` for everything else.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Http { body, .. } => {
                try_error_detail(body).unwrap_or_else(|| fallback.to_string())
            }
            _ => fallback.to_string(),
        }
    }
}
