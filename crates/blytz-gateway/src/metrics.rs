//! Gateway metrics collection.
//!
//! Provides standardized metrics for monitoring backend calls:
//! - Request counters by endpoint and status
//! - Latency histograms
//! - Token refresh and terminal auth failure counters

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Total backend requests by endpoint and status.
    pub const REQUESTS_TOTAL: &str = "gateway_requests_total";

    /// Request latency in seconds by endpoint.
    pub const LATENCY_SECONDS: &str = "gateway_latency_seconds";

    /// Failed attempts (timeout, network) by endpoint and kind.
    pub const FAILURES_TOTAL: &str = "gateway_failures_total";

    /// Token refresh operations by outcome.
    pub const REFRESHES_TOTAL: &str = "gateway_token_refreshes_total";

    /// Terminal authentication failures.
    pub const AUTH_EXPIRED_TOTAL: &str = "gateway_auth_expired_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record metrics for a completed backend request attempt.
pub fn record_request(endpoint: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "endpoint" => endpoint.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record an attempt that produced no response.
pub fn record_failure(endpoint: &str, kind: &'static str) {
    counter!(
        names::FAILURES_TOTAL,
        "endpoint" => endpoint.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// Record a completed refresh operation.
pub fn record_refresh(outcome: &'static str) {
    counter!(names::REFRESHES_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a terminal authentication failure.
pub fn record_auth_expired(kind: &'static str) {
    counter!(names::AUTH_EXPIRED_TOTAL, "kind" => kind).increment(1);
}

// =============================================================================
// Tests
// =============================================================================
