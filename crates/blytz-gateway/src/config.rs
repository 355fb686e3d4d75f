//! Gateway configuration.

use std::time::Duration;

use url::Url;

use crate::error::{GatewayError, GatewayResult};

/// Default backend API base URL.
pub const DEFAULT_API_URL: &str = "https://api.blytz.work/api";

/// Default per-attempt request budget.
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Backend API base URL, without trailing slash
    pub api_url: String,
    /// Default per-attempt timeout
    pub default_timeout: Duration,
    /// Connect timeout for the HTTP client
    pub connect_timeout: Duration,
    /// Sign-in entry point used for the session-expired redirect
    pub sign_in_path: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            connect_timeout: Duration::from_secs(5),
            sign_in_path: "/auth".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Create config from environment variables.
    pub fn from_env() -> GatewayResult<Self> {
        let api_url = std::env::var("BLYTZ_API_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout_ms: u64 = std::env::var("BLYTZ_API_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        let connect_timeout_secs: u64 = std::env::var("BLYTZ_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let config = Self {
            api_url,
            default_timeout: Duration::from_millis(timeout_ms),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            sign_in_path: std::env::var("BLYTZ_SIGN_IN_PATH").unwrap_or_else(|_| "/auth".to_string()),
        };
        config.validated()
    }

    /// Create config for a base URL with default settings.
    pub fn for_api_url(api_url: impl Into<String>) -> GatewayResult<Self> {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
        .validated()
    }

    /// Override the default budget. A zero budget fails `validated()` and is
    /// rejected by the gateway at request time.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Check the base URL and normalize the trailing slash.
    pub fn validated(mut self) -> GatewayResult<Self> {
        let parsed = Url::parse(&self.api_url)
            .map_err(|e| GatewayError::config(format!("Invalid API URL '{}': {}", self.api_url, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(GatewayError::config(format!(
                "API URL must be http or https: {}",
                self.api_url
            )));
        }

        if self.default_timeout.is_zero() {
            return Err(GatewayError::config("Default request timeout must be positive"));
        }

        while self.api_url.ends_with('/') {
            self.api_url.pop();
        }
        Ok(self)
    }

    /// Redirect target after a terminal authentication failure.
    pub fn expired_redirect(&self) -> String {
        format!("{}?expired=true", self.sign_in_path)
    }
}
