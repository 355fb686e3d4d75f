//! Authenticated access to the Blytz backend API.
//!
//! This crate provides:
//! - `RequestGateway`: bearer auth, per-attempt timeouts, one refresh and
//!   one retry on 401, session clear and sign-in redirect on terminal failure
//! - `TokenCoordinator`: session phase and coalesced token refresh
//! - `SessionSync`: mirrors provider session changes into the cache
//! - Account helpers, the dashboard route guard, metrics and tracing setup

pub mod account;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod navigation;
pub mod routes;
pub mod stack;
pub mod sync;
pub mod telemetry;

#[cfg(test)]
mod test_support;

pub use account::{AccountClient, OnboardingStatus};
pub use config::GatewayConfig;
pub use coordinator::{RefreshFailure, RefreshOutcome, SessionPhase, TokenCoordinator};
pub use error::{GatewayError, GatewayResult};
pub use gateway::{backend_error, json_body, RequestGateway, RequestOptions};
pub use navigation::{ChannelNavigator, LoggingNavigator, Navigator};
pub use routes::{dashboard_path, guard, onboarding_path, RouteDecision};
pub use stack::BlytzClient;
pub use sync::SessionSync;
pub use telemetry::{init_tracing, load_dotenv};
