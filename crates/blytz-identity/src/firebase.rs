//! Firebase Auth REST provider.
//!
//! Talks to the Identity Toolkit API for account operations and to the
//! Secure Token API to exchange refresh tokens for fresh ID tokens:
//! - ID tokens are reused until they enter the refresh margin
//! - Forced refreshes always hit the Secure Token API
//! - A revoked refresh token ends the session and notifies subscribers

use std::time::{Duration, Instant};

use async_trait::async_trait;
use blytz_models::{Credentials, SessionToken, UserSummary};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::config::FirebaseConfig;
use crate::error::{IdentityError, IdentityResult};
use crate::provider::IdentityProvider;

// =============================================================================
// Constants
// =============================================================================

/// Refresh ID tokens 60 seconds before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Conservative token TTL when the response carries no usable expiry.
/// Firebase ID tokens are valid for 60 minutes.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

// =============================================================================
// Configuration
// =============================================================================

/// Base URLs of the Firebase Auth REST APIs.
#[derive(Debug, Clone)]
pub struct FirebaseEndpoints {
    pub identity_toolkit: String,
    pub secure_token: String,
}

impl Default for FirebaseEndpoints {
    fn default() -> Self {
        Self {
            identity_toolkit: IDENTITY_TOOLKIT_URL.to_string(),
            secure_token: SECURE_TOKEN_URL.to_string(),
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobCodeRequest<'a> {
    request_type: &'static str,
    email: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

// =============================================================================
// Session
// =============================================================================

/// Signed-in session held by the provider.
struct FirebaseSession {
    user: UserSummary,
    id_token: SessionToken,
    refresh_token: String,
    expires_at: Instant,
}

impl FirebaseSession {
    /// Check if the ID token is still valid with refresh margin.
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

fn expiry_from(expires_in: Option<&str>) -> Instant {
    let ttl = expires_in
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(TOKEN_DEFAULT_TTL);
    Instant::now() + ttl
}

// =============================================================================
// Provider
// =============================================================================

/// Firebase Auth identity provider.
pub struct FirebaseIdentity {
    http: Client,
    config: FirebaseConfig,
    endpoints: FirebaseEndpoints,
    session: Mutex<Option<FirebaseSession>>,
    changes: watch::Sender<Option<UserSummary>>,
}

impl FirebaseIdentity {
    /// Create a provider against the public Firebase endpoints.
    pub fn new(config: FirebaseConfig) -> IdentityResult<Self> {
        Self::with_endpoints(config, FirebaseEndpoints::default())
    }

    /// Create a provider against custom endpoints (emulator, tests).
    pub fn with_endpoints(config: FirebaseConfig, endpoints: FirebaseEndpoints) -> IdentityResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("blytz-identity/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(IdentityError::Network)?;

        debug!(
            project_id = %config.project_id,
            api_key = %config.api_key_preview(),
            "Configured Firebase identity provider"
        );

        let (changes, _) = watch::channel(None);

        Ok(Self {
            http,
            config,
            endpoints,
            session: Mutex::new(None),
            changes,
        })
    }

    pub fn config(&self) -> &FirebaseConfig {
        &self.config
    }

    fn toolkit_url(&self, method: &str) -> String {
        format!("{}/accounts:{}", self.endpoints.identity_toolkit, method)
    }

    /// Decode a successful response or turn the provider error body into an
    /// `IdentityError`.
    async fn decode<T: DeserializeOwned>(response: Response) -> IdentityResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => Err(IdentityError::from_provider_message(envelope.error.message)),
            Err(_) => Err(IdentityError::InvalidResponse(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            ))),
        }
    }

    async fn start_session(&self, account: AccountResponse, fallback_name: Option<&str>) -> UserSummary {
        let user = UserSummary {
            uid: account.local_id,
            email: account.email,
            display_name: account
                .display_name
                .filter(|n| !n.is_empty())
                .or_else(|| fallback_name.map(str::to_string)),
        };

        *self.session.lock().await = Some(FirebaseSession {
            user: user.clone(),
            id_token: SessionToken::new(account.id_token),
            refresh_token: account.refresh_token,
            expires_at: expiry_from(account.expires_in.as_deref()),
        });
        self.changes.send_replace(Some(user.clone()));

        user
    }

    fn end_session(&self, session: &mut Option<FirebaseSession>) {
        if session.take().is_some() {
            self.changes.send_replace(None);
        }
    }

    /// Exchange the refresh token for a new ID token.
    async fn refresh(&self, session: &mut FirebaseSession) -> IdentityResult<SessionToken> {
        let url = format!("{}/token", self.endpoints.secure_token);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", session.refresh_token.as_str()),
            ])
            .send()
            .await?;

        let refreshed: RefreshResponse = Self::decode(response).await?;
        session.id_token = SessionToken::new(refreshed.id_token);
        session.refresh_token = refreshed.refresh_token;
        session.expires_at = expiry_from(refreshed.expires_in.as_deref());

        debug!(uid = %session.user.uid, "Refreshed Firebase ID token");
        Ok(session.id_token.clone())
    }
}

/// Local email and password checks, run before any provider call.
fn check_credentials(credentials: &Credentials) -> IdentityResult<()> {
    credentials
        .validate()
        .map_err(|e| IdentityError::InvalidCredentials(e.to_string()))
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn current_session_token(&self, force_refresh: bool) -> IdentityResult<Option<SessionToken>> {
        let mut guard = self.session.lock().await;

        let Some(session) = guard.as_mut() else {
            debug!("No Firebase user signed in");
            return Ok(None);
        };

        if !force_refresh && session.is_fresh() {
            return Ok(Some(session.id_token.clone()));
        }

        match self.refresh(session).await {
            Ok(token) => Ok(Some(token)),
            Err(e) if e.is_session_revoked() => {
                warn!("Firebase session revoked, signing out: {}", e);
                self.end_session(&mut guard);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn current_user(&self) -> Option<UserSummary> {
        self.changes.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<UserSummary>> {
        self.changes.subscribe()
    }

    async fn sign_out(&self) -> IdentityResult<()> {
        let mut guard = self.session.lock().await;
        self.end_session(&mut guard);
        info!("Signed out of Firebase");
        Ok(())
    }

    async fn sign_in(&self, credentials: &Credentials) -> IdentityResult<UserSummary> {
        check_credentials(credentials)?;

        let response = self
            .http
            .post(self.toolkit_url("signInWithPassword"))
            .query(&[("key", self.config.api_key.as_str())])
            .json(&PasswordRequest {
                email: &credentials.email,
                password: &credentials.password,
                return_secure_token: true,
                display_name: None,
            })
            .send()
            .await?;

        let account: AccountResponse = Self::decode(response).await?;
        let user = self.start_session(account, None).await;
        info!(uid = %user.uid, "Sign in successful");
        Ok(user)
    }

    async fn register(
        &self,
        credentials: &Credentials,
        display_name: Option<&str>,
    ) -> IdentityResult<UserSummary> {
        check_credentials(credentials)?;

        let response = self
            .http
            .post(self.toolkit_url("signUp"))
            .query(&[("key", self.config.api_key.as_str())])
            .json(&PasswordRequest {
                email: &credentials.email,
                password: &credentials.password,
                return_secure_token: true,
                display_name,
            })
            .send()
            .await?;

        let account: AccountResponse = Self::decode(response).await?;
        let user = self.start_session(account, display_name).await;
        info!(uid = %user.uid, "Registration successful");
        Ok(user)
    }

    async fn send_password_reset(&self, email: &str) -> IdentityResult<()> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(IdentityError::InvalidCredentials(
                "Please enter a valid email address".to_string(),
            ));
        }

        let response = self
            .http
            .post(self.toolkit_url("sendOobCode"))
            .query(&[("key", self.config.api_key.as_str())])
            .json(&OobCodeRequest {
                request_type: "PASSWORD_RESET",
                email: &email,
            })
            .send()
            .await?;

        let _: serde_json::Value = Self::decode(response).await?;
        info!("Password reset email requested");
        Ok(())
    }
}
