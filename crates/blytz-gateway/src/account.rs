//! Typed account calls made through the gateway.

use std::time::Duration;

use blytz_models::{BackendRole, UserRole, UserSummary};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::GatewayResult;
use crate::gateway::{backend_error, RequestGateway, RequestOptions};

/// Budget for the `/auth/profile` lookup.
const PROFILE_TIMEOUT: Duration = Duration::from_secs(10);

/// Budget for the role-specific profile probe.
const ONBOARDING_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
    data: ProfileData,
}

#[derive(Debug, Deserialize)]
struct ProfileData {
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateUserRequest<'a> {
    uid: &'a str,
    email: &'a str,
    name: String,
    username: String,
    role: Option<BackendRole>,
}

/// Where the user stands after sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnboardingStatus {
    pub role: Option<UserRole>,
    pub needs_onboarding: bool,
}

/// Account endpoints used by the sign-in and role selection flows.
#[derive(Debug, Clone)]
pub struct AccountClient {
    gateway: RequestGateway,
}

impl AccountClient {
    pub fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }

    /// Tell the backend about a signed-in user.
    pub async fn sync_user(&self, user: &UserSummary) -> GatewayResult<()> {
        let options = RequestOptions::post().with_body(json!({
            "uid": user.uid,
            "email": user.email,
        }));
        let response = self.gateway.request("/auth/sync", options).await?;
        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }
        debug!(uid = %user.uid, "User synced with backend");
        Ok(())
    }

    /// Create the backend record for a newly registered user.
    pub async fn create_user(&self, user: &UserSummary, email: &str) -> GatewayResult<()> {
        let name = user.preferred_name(email);
        let body = CreateUserRequest {
            uid: &user.uid,
            email,
            username: name.clone(),
            name,
            role: None,
        };
        let options = RequestOptions::post().json(&body)?;
        let response = self.gateway.request("/auth/create", options).await?;
        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }
        info!(uid = %user.uid, "User created in backend");
        Ok(())
    }

    /// Role recorded by the backend, cached as `userRole`.
    ///
    /// `Ok(None)` when the backend does not know the user yet.
    pub async fn profile_role(&self) -> GatewayResult<Option<UserRole>> {
        Ok(self.fetch_profile().await?.flatten())
    }

    /// `None` on 404, `Some(role)` otherwise.
    async fn fetch_profile(&self) -> GatewayResult<Option<Option<UserRole>>> {
        let response = self
            .gateway
            .request_with_timeout("/auth/profile", RequestOptions::get(), PROFILE_TIMEOUT)
            .await?;

        match response.status() {
            StatusCode::OK => {
                let bytes = response.bytes().await?;
                let envelope: ProfileEnvelope = serde_json::from_slice(&bytes)?;
                let role = envelope
                    .data
                    .role
                    .as_deref()
                    .and_then(|raw| match raw.parse::<BackendRole>() {
                        Ok(role) => Some(role.to_user_role()),
                        Err(e) => {
                            warn!("Ignoring backend role: {}", e);
                            None
                        }
                    });

                if let Some(role) = role {
                    if let Err(e) = self.gateway.coordinator().credentials().store_role(role) {
                        warn!("Failed to cache role: {}", e);
                    }
                }
                Ok(Some(role))
            }
            StatusCode::NOT_FOUND => {
                debug!("User not found in backend");
                Ok(None)
            }
            _ => Err(backend_error(response).await),
        }
    }

    /// Store the chosen role locally, then on the backend.
    pub async fn select_role(&self, role: UserRole) -> GatewayResult<()> {
        if let Err(e) = self.gateway.coordinator().credentials().store_role(role) {
            warn!("Failed to cache role: {}", e);
        }

        let options = RequestOptions::put().with_body(json!({ "role": role.to_backend() }));
        let response = self.gateway.request("/auth/profile", options).await?;
        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }
        info!(role = role.as_str(), "Role selected");
        Ok(())
    }

    /// Resolve the role and whether its profile still has to be filled in.
    pub async fn onboarding_status(&self) -> GatewayResult<OnboardingStatus> {
        let role = match self.fetch_profile().await? {
            None => {
                return Ok(OnboardingStatus {
                    role: None,
                    needs_onboarding: true,
                })
            }
            Some(None) => {
                return Ok(OnboardingStatus {
                    role: None,
                    needs_onboarding: false,
                })
            }
            Some(Some(role)) => role,
        };

        let endpoint = match role {
            UserRole::Employer => "/company/profile",
            UserRole::Va => "/va/profile",
        };

        let needs_onboarding = match self
            .gateway
            .request_with_timeout(endpoint, RequestOptions::get(), ONBOARDING_PROBE_TIMEOUT)
            .await
        {
            Ok(response) => !response.status().is_success(),
            Err(e) if e.requires_reauth() => return Err(e),
            Err(e) => {
                debug!(endpoint, "Profile probe failed: {}", e);
                true
            }
        };

        Ok(OnboardingStatus {
            role: Some(role),
            needs_onboarding,
        })
    }
}

impl From<RequestGateway> for AccountClient {
    fn from(gateway: RequestGateway) -> Self {
        Self::new(gateway)
    }
}
