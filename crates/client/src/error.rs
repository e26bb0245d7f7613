//! Errors surfaced by store operations that report failure to their caller.

use fnchat_shared::ApiError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// A backend call failed. `message` is what the UI should show.
    #[error("{message}")]
    Request {
        message: String,
        #[source]
        source: ApiError,
    },
    #[error("Function not found: {0}")]
    FunctionNotFound(String),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("No active session to save message to")]
    NoActiveSession,
}

impl StoreError {
    /// Wrap an API failure, preferring the server's `detail` over `fallback`.
    pub fn request(source: ApiError, fallback: &str) -> Self {
        Self::Request {
            message: source.user_message(fallback),
            source,
        }
    }
}
