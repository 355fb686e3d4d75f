//! Wiring for the whole client session stack.

use std::sync::Arc;

use blytz_identity::{identity_from_env, IdentityError, IdentityProvider, IdentityResult};
use blytz_models::{Credentials, UserSummary};
use blytz_session::{CredentialCache, SessionStore};
use tokio::task::JoinHandle;
use tracing::info;

use crate::account::AccountClient;
use crate::config::GatewayConfig;
use crate::coordinator::TokenCoordinator;
use crate::error::GatewayResult;
use crate::gateway::RequestGateway;
use crate::navigation::Navigator;
use crate::sync::SessionSync;
use crate::telemetry::load_dotenv;

/// One per process: identity provider, credential cache, coordinator and
/// gateway sharing the same session.
#[derive(Debug, Clone)]
pub struct BlytzClient {
    gateway: RequestGateway,
    accounts: AccountClient,
}

impl BlytzClient {
    pub fn new(
        config: GatewayConfig,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> GatewayResult<Self> {
        let coordinator = TokenCoordinator::new(identity, CredentialCache::new(store));
        let gateway = RequestGateway::new(config, coordinator, navigator)?;
        info!(api_url = %gateway.config().api_url, "Client session stack initialized");

        Ok(Self {
            accounts: AccountClient::new(gateway.clone()),
            gateway,
        })
    }

    /// Build from `.env` and the process environment.
    pub fn from_env(store: Arc<dyn SessionStore>, navigator: Arc<dyn Navigator>) -> GatewayResult<Self> {
        load_dotenv();
        let config = GatewayConfig::from_env()?;
        Self::new(config, identity_from_env(), store, navigator)
    }

    pub fn gateway(&self) -> &RequestGateway {
        &self.gateway
    }

    pub fn accounts(&self) -> &AccountClient {
        &self.accounts
    }

    pub fn coordinator(&self) -> &TokenCoordinator {
        self.gateway.coordinator()
    }

    pub fn credentials(&self) -> &CredentialCache {
        self.coordinator().credentials()
    }

    /// Sign in with the provider and cache the resulting session.
    pub async fn sign_in(&self, credentials: &Credentials) -> IdentityResult<UserSummary> {
        let user = self.coordinator().identity().sign_in(credentials).await?;
        self.cache_session(&user).await?;
        Ok(user)
    }

    /// Create a provider account and cache the resulting session.
    pub async fn register(
        &self,
        credentials: &Credentials,
        display_name: Option<&str>,
    ) -> IdentityResult<UserSummary> {
        let user = self
            .coordinator()
            .identity()
            .register(credentials, display_name)
            .await?;
        self.cache_session(&user).await?;
        Ok(user)
    }

    pub async fn send_password_reset(&self, email: &str) -> IdentityResult<()> {
        self.coordinator().identity().send_password_reset(email).await
    }

    pub async fn sign_out(&self) -> IdentityResult<()> {
        self.coordinator().sign_out().await
    }

    /// Mirror provider session changes into the cache in the background.
    pub fn spawn_session_sync(&self) -> JoinHandle<()> {
        SessionSync::new(self.coordinator().clone()).spawn()
    }

    async fn cache_session(&self, user: &UserSummary) -> IdentityResult<()> {
        let token = self
            .coordinator()
            .identity()
            .current_session_token(false)
            .await?
            .ok_or(IdentityError::NoSession)?;
        self.coordinator().establish(&token, user);
        Ok(())
    }
}
