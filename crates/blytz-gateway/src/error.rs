//! Gateway error types.

use thiserror::Error;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failures surfaced by the request gateway.
///
/// Non-401 HTTP statuses are not errors at the gateway level: the response
/// is handed back for the caller to inspect. `Backend` is only produced by
/// the typed account helpers.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Request timeout after {budget_ms}ms. Please check your connection.")]
    Timeout { budget_ms: u64 },

    #[error("Network error. Please check your connection and try again.")]
    NetworkFailure(#[source] reqwest::Error),

    #[error("Authentication expired. Please sign in again.")]
    AuthExpired,

    #[error("Authentication expired: the session token could not be refreshed. Please sign in again.")]
    RefreshRaceNull,

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    pub fn invalid_endpoint(msg: impl Into<String>) -> Self {
        Self::InvalidEndpoint(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for terminal authentication failures: the credential cache has
    /// been cleared and the user must sign in again.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, GatewayError::AuthExpired | GatewayError::RefreshRaceNull)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout { .. })
    }

    /// HTTP status carried by the error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            GatewayError::Backend { status, .. } => Some(*status),
            GatewayError::AuthExpired | GatewayError::RefreshRaceNull => Some(401),
            _ => None,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Timeout { .. } => "timeout",
            GatewayError::NetworkFailure(_) => "network",
            GatewayError::AuthExpired => "auth_expired",
            GatewayError::RefreshRaceNull => "refresh_race_null",
            GatewayError::InvalidEndpoint(_) => "invalid_endpoint",
            GatewayError::Config(_) => "config",
            GatewayError::Backend { .. } => "backend",
            GatewayError::Json(_) => "json",
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::NetworkFailure(e)
    }
}
