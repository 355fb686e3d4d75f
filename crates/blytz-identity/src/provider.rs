//! Identity provider collaborator interface.

use async_trait::async_trait;
use blytz_models::{Credentials, SessionToken, UserSummary};
use tokio::sync::watch;

use crate::error::{IdentityError, IdentityResult};

/// Issuer of opaque bearer tokens for the signed-in user.
///
/// The provider is the source of truth for the session; the credential
/// cache only mirrors it.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Token for the current session, or `None` when nobody is signed in.
    ///
    /// With `force_refresh` the provider must mint a new token instead of
    /// returning one it holds.
    async fn current_session_token(&self, force_refresh: bool) -> IdentityResult<Option<SessionToken>>;

    /// Summary of the signed-in user.
    fn current_user(&self) -> Option<UserSummary>;

    /// Session change notifications. The receiver always holds the latest
    /// state: `Some(user)` while signed in, `None` otherwise.
    fn subscribe(&self) -> watch::Receiver<Option<UserSummary>>;

    /// Terminate the provider session.
    async fn sign_out(&self) -> IdentityResult<()>;

    /// Email/password sign-in.
    async fn sign_in(&self, _credentials: &Credentials) -> IdentityResult<UserSummary> {
        Err(IdentityError::Unsupported("sign_in"))
    }

    /// Create an account and sign it in.
    async fn register(
        &self,
        _credentials: &Credentials,
        _display_name: Option<&str>,
    ) -> IdentityResult<UserSummary> {
        Err(IdentityError::Unsupported("register"))
    }

    /// Email a password reset link.
    async fn send_password_reset(&self, _email: &str) -> IdentityResult<()> {
        Err(IdentityError::Unsupported("send_password_reset"))
    }
}
