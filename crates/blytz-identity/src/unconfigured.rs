//! Fallback provider used when the Firebase configuration is invalid.
//!
//! Nobody is ever signed in. Account operations fail with the validation
//! report so the operator sees exactly which variables to fix.

use async_trait::async_trait;
use blytz_models::{Credentials, SessionToken, UserSummary};
use tokio::sync::watch;
use tracing::{debug, error};

use crate::config::ConfigIssues;
use crate::error::{IdentityError, IdentityResult};
use crate::provider::IdentityProvider;

pub struct UnconfiguredIdentity {
    reason: String,
    changes: watch::Sender<Option<UserSummary>>,
}

impl UnconfiguredIdentity {
    pub fn new(issues: ConfigIssues) -> Self {
        Self::with_reason(issues.to_string())
    }

    pub fn with_reason(reason: impl Into<String>) -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            reason: reason.into(),
            changes,
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn fail<T>(&self, operation: &str) -> IdentityResult<T> {
        error!(operation, "{}", self.reason);
        Err(IdentityError::not_configured(self.reason.clone()))
    }
}

#[async_trait]
impl IdentityProvider for UnconfiguredIdentity {
    async fn current_session_token(&self, _force_refresh: bool) -> IdentityResult<Option<SessionToken>> {
        Ok(None)
    }

    fn current_user(&self) -> Option<UserSummary> {
        None
    }

    fn subscribe(&self) -> watch::Receiver<Option<UserSummary>> {
        self.changes.subscribe()
    }

    async fn sign_out(&self) -> IdentityResult<()> {
        debug!("Sign out on unconfigured identity provider");
        Ok(())
    }

    async fn sign_in(&self, _credentials: &Credentials) -> IdentityResult<UserSummary> {
        self.fail("sign_in")
    }

    async fn register(
        &self,
        _credentials: &Credentials,
        _display_name: Option<&str>,
    ) -> IdentityResult<UserSummary> {
        self.fail("register")
    }

    async fn send_password_reset(&self, _email: &str) -> IdentityResult<()> {
        self.fail("send_password_reset")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issues() -> ConfigIssues {
        ConfigIssues {
            missing: vec!["FIREBASE_API_KEY".to_string()],
            ..ConfigIssues::default()
        }
    }

    #[tokio::test]
    async fn test_no_session_and_no_token() {
        let provider = UnconfiguredIdentity::new(issues());
        assert!(provider.current_user().is_none());
        assert!(provider.current_session_token(true).await.unwrap().is_none());
        assert!(provider.subscribe().borrow().is_none());
        provider.sign_out().await.unwrap();
    }

    #[tokio::test]
    async fn test_sign_in_reports_configuration_problem() {
        let provider = UnconfiguredIdentity::new(issues());
        let err = provider
            .sign_in(&Credentials::new("a@b.com", "secret1"))
            .await
            .unwrap_err();

        assert!(matches!(err, IdentityError::NotConfigured(_)));
        assert!(err.to_string().contains("FIREBASE_API_KEY"));
    }
}
