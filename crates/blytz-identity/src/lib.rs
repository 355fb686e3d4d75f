//! Identity provider integration.
//!
//! This crate provides:
//! - The `IdentityProvider` collaborator interface consumed by the gateway
//! - One-shot validation of the Firebase configuration
//! - A Firebase Auth REST provider (sign-in, registration, password reset,
//!   ID token refresh)
//! - A fallback provider used when configuration is invalid

pub mod config;
pub mod error;
pub mod firebase;
pub mod provider;
pub mod unconfigured;


use std::sync::Arc;

use tracing::{error, info};

pub use config::{ConfigIssues, FirebaseConfig};
pub use error::{AuthErrorCode, IdentityError, IdentityResult};
pub use firebase::{FirebaseEndpoints, FirebaseIdentity};
pub use provider::IdentityProvider;
pub use unconfigured::UnconfiguredIdentity;

/// Validate the Firebase configuration once and build the provider.
///
/// Falls back to `UnconfiguredIdentity` when the configuration is invalid,
/// so the rest of the client still starts and reports a clear error on
/// sign-in.
pub fn identity_from_env() -> Arc<dyn IdentityProvider> {
    match FirebaseConfig::from_env() {
        Ok(config) => match FirebaseIdentity::new(config) {
            Ok(provider) => {
                info!("Firebase identity provider initialized");
                Arc::new(provider)
            }
            Err(e) => {
                error!("Firebase identity provider initialization failed: {}", e);
                Arc::new(UnconfiguredIdentity::with_reason(e.to_string()))
            }
        },
        Err(issues) => {
            error!("{}", issues);
            Arc::new(UnconfiguredIdentity::new(issues))
        }
    }
}
