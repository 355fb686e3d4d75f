//! Session store error types.

use thiserror::Error;

/// Result type for session store operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur while persisting credentials.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
