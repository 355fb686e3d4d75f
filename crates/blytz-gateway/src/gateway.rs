//! Authenticated request gateway.
//!
//! Every backend call goes through `RequestGateway::request`, which:
//! - Attaches the session token as a bearer credential
//! - Enforces a per-attempt timeout budget
//! - Refreshes the token once on 401 and retries once
//! - Clears the session and redirects to sign-in on terminal auth failure

use std::sync::Arc;
use std::time::{Duration, Instant};

use blytz_models::SessionToken;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info_span, warn, Instrument};

use crate::config::GatewayConfig;
use crate::coordinator::{RefreshFailure, TokenCoordinator};
use crate::error::{GatewayError, GatewayResult};
use crate::metrics::{record_auth_expired, record_failure, record_request};
use crate::navigation::Navigator;

// =============================================================================
// Request Options
// =============================================================================

/// Method, extra headers and JSON body for one backend call.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestOptions {
    fn with_method(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get() -> Self {
        Self::with_method(Method::GET)
    }

    pub fn post() -> Self {
        Self::with_method(Method::POST)
    }

    pub fn put() -> Self {
        Self::with_method(Method::PUT)
    }

    pub fn patch() -> Self {
        Self::with_method(Method::PATCH)
    }

    pub fn delete() -> Self {
        Self::with_method(Method::DELETE)
    }

    /// Set the JSON body from any serializable value.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> GatewayResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

// =============================================================================
// Gateway
// =============================================================================

/// Single entry point for authenticated backend calls.
#[derive(Clone)]
pub struct RequestGateway {
    http: Client,
    config: Arc<GatewayConfig>,
    coordinator: TokenCoordinator,
    navigator: Arc<dyn Navigator>,
}

impl std::fmt::Debug for RequestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGateway")
            .field("api_url", &self.config.api_url)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

impl RequestGateway {
    pub fn new(
        config: GatewayConfig,
        coordinator: TokenCoordinator,
        navigator: Arc<dyn Navigator>,
    ) -> GatewayResult<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("blytz-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config: Arc::new(config),
            coordinator,
            navigator,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &TokenCoordinator {
        &self.coordinator
    }

    /// Resolve an endpoint path against the base URL.
    fn endpoint_url(&self, endpoint: &str) -> GatewayResult<String> {
        if !endpoint.starts_with('/') || endpoint.starts_with("//") {
            return Err(GatewayError::invalid_endpoint(format!(
                "'{}' must be a path starting with '/'",
                endpoint
            )));
        }
        if endpoint.contains("://") {
            return Err(GatewayError::invalid_endpoint(format!(
                "'{}' must not carry a scheme",
                endpoint
            )));
        }
        let path = endpoint.split(['?', '#']).next().unwrap_or(endpoint);
        if path.split('/').any(|segment| segment == "..") {
            return Err(GatewayError::invalid_endpoint(format!(
                "'{}' must not contain '..' segments",
                endpoint
            )));
        }

        Ok(format!("{}{}", self.config.api_url, endpoint))
    }

    /// Authenticated request with the configured timeout budget.
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> GatewayResult<Response> {
        self.request_with_timeout(endpoint, options, self.config.default_timeout)
            .await
    }

    /// Authenticated request with an explicit per-attempt budget.
    ///
    /// Non-401 responses are returned unmodified. A 401 triggers one
    /// coalesced token refresh and at most one retry. The budget must be
    /// non-zero.
    pub async fn request_with_timeout(
        &self,
        endpoint: &str,
        options: RequestOptions,
        budget: Duration,
    ) -> GatewayResult<Response> {
        if budget.is_zero() {
            return Err(GatewayError::config("Request timeout must be positive"));
        }
        let url = self.endpoint_url(endpoint)?;
        let span = info_span!(
            "gateway_request",
            method = %options.method,
            endpoint = %endpoint,
            budget_ms = budget.as_millis() as u64,
        );

        async {
            let initial = self.coordinator.token().await;
            let response = self
                .send(&url, endpoint, &options, initial.as_ref(), budget, 1)
                .await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            let fresh = match self.coordinator.cached_token() {
                // Another call already replaced the rejected token.
                Some(cached) if initial.as_ref() != Some(&cached) => {
                    debug!("Backend rejected session token, retrying with the cached replacement");
                    cached
                }
                _ => self.refresh_after_rejection(initial.as_ref()).await?,
            };

            if initial.as_ref() == Some(&fresh) {
                warn!("Refresh returned the rejected token");
                return Err(self.terminate(GatewayError::AuthExpired));
            }

            let retry = self
                .send(&url, endpoint, &options, Some(&fresh), budget, 2)
                .await?;

            if retry.status() == StatusCode::UNAUTHORIZED {
                warn!("Backend rejected refreshed token");
                return Err(self.terminate(GatewayError::AuthExpired));
            }

            Ok(retry)
        }
        .instrument(span)
        .await
    }

    /// Coalesced forced refresh after a 401. Failures are terminal.
    async fn refresh_after_rejection(&self, initial: Option<&SessionToken>) -> GatewayResult<SessionToken> {
        warn!(has_token = initial.is_some(), "Backend rejected session token, refreshing");

        match self.coordinator.refresh().await {
            Ok(token) => Ok(token),
            Err(RefreshFailure::NoCurrentUser) if initial.is_some() => {
                Err(self.terminate(GatewayError::RefreshRaceNull))
            }
            Err(failure) => {
                debug!("Refresh after 401 failed: {}", failure);
                Err(self.terminate(GatewayError::AuthExpired))
            }
        }
    }

    /// One HTTP attempt under its own timeout budget.
    async fn send(
        &self,
        url: &str,
        endpoint: &str,
        options: &RequestOptions,
        token: Option<&SessionToken>,
        budget: Duration,
        attempt: u32,
    ) -> GatewayResult<Response> {
        let mut headers = options.headers.clone();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match token {
            Some(token) => {
                let mut value = HeaderValue::from_str(&token.bearer())
                    .map_err(|_| GatewayError::config("Session token is not a valid header value"))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            None => {
                headers.remove(AUTHORIZATION);
            }
        }

        let mut builder = self
            .http
            .request(options.method.clone(), url)
            .headers(headers);
        if let Some(body) = &options.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        let budget_ms = budget.as_millis() as u64;
        let start = Instant::now();
        let result = tokio::time::timeout(budget, builder.send()).await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                debug!(attempt, status, latency_ms, "Backend responded");
                record_request(endpoint, status, latency_ms);
                Ok(response)
            }
            Ok(Err(e)) if e.is_timeout() => {
                warn!(attempt, budget_ms, "Request timed out in transport");
                record_failure(endpoint, "timeout");
                Err(GatewayError::Timeout { budget_ms })
            }
            Ok(Err(e)) => {
                warn!(attempt, "Request failed: {}", e);
                record_failure(endpoint, "network");
                Err(GatewayError::NetworkFailure(e))
            }
            Err(_) => {
                warn!(attempt, budget_ms, "Request timed out");
                record_failure(endpoint, "timeout");
                Err(GatewayError::Timeout { budget_ms })
            }
        }
    }

    /// Terminal authentication failure: clear the session, send the user to
    /// the sign-in page once, and hand the error back.
    fn terminate(&self, error: GatewayError) -> GatewayError {
        self.coordinator.expire_session();
        record_auth_expired(error.kind());
        let target = self.config.expired_redirect();
        warn!(location = %target, "Session expired: {}", error);
        self.navigator.redirect(&target);
        error
    }
}

// =============================================================================
// Response Helpers
// =============================================================================

#[derive(serde::Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Turn a non-2xx response into `GatewayError::Backend`, preferring the
/// body's `error` or `message` field.
pub async fn backend_error(response: Response) -> GatewayError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            }
        });

    GatewayError::Backend {
        status: status.as_u16(),
        message,
    }
}

/// Decode a 2xx JSON response, or map the failure with `backend_error`.
pub async fn json_body<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
    if !response.status().is_success() {
        return Err(backend_error(response).await);
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
