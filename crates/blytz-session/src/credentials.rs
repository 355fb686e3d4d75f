//! Typed credential cache.
//!
//! Mirrors the identity provider's session into the session store. The
//! provider stays authoritative; this is a cache.

use std::fmt;
use std::sync::Arc;

use blytz_models::{SessionToken, UserRole, UserSummary};
use tracing::{debug, warn};

use crate::error::SessionResult;
use crate::store::SessionStore;

/// Storage keys.
pub mod keys {
    pub const AUTH_TOKEN: &str = "authToken";
    pub const USER: &str = "user";
    pub const USER_ROLE: &str = "userRole";

    /// Every key owned by the credential cache.
    pub const ALL: [&str; 3] = [AUTH_TOKEN, USER, USER_ROLE];
}

/// Shared handle to the credential entries of a `SessionStore`.
#[derive(Clone)]
pub struct CredentialCache {
    store: Arc<dyn SessionStore>,
}

impl fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCache")
            .field("has_token", &self.token().is_some())
            .field("has_user", &self.store.get(keys::USER).is_some())
            .finish()
    }
}

impl CredentialCache {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Cached bearer token, if any.
    pub fn token(&self) -> Option<SessionToken> {
        self.store
            .get(keys::AUTH_TOKEN)
            .filter(|raw| !raw.is_empty())
            .map(SessionToken::new)
    }

    /// Cached user summary. A corrupt entry reads as absent.
    pub fn user(&self) -> Option<UserSummary> {
        let raw = self.store.get(keys::USER)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Error parsing cached user: {}", e);
                None
            }
        }
    }

    /// Cached dashboard role. An unknown value reads as unset.
    pub fn role(&self) -> Option<UserRole> {
        let raw = self.store.get(keys::USER_ROLE)?;
        match raw.parse() {
            Ok(role) => Some(role),
            Err(e) => {
                warn!("Ignoring cached role: {}", e);
                None
            }
        }
    }

    /// True when both a token and a user summary are cached.
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some() && self.store.get(keys::USER).is_some()
    }

    /// Write the token unless the cached value is already identical.
    ///
    /// Returns whether the store was written.
    pub fn store_token(&self, token: &SessionToken) -> SessionResult<bool> {
        if self.token().as_ref() == Some(token) {
            debug!("Token unchanged, skipping cache write");
            return Ok(false);
        }
        self.store.set(keys::AUTH_TOKEN, token.as_str())?;
        Ok(true)
    }

    /// Write the user summary unless the serialized value is unchanged.
    pub fn store_user(&self, user: &UserSummary) -> SessionResult<bool> {
        let serialized = serde_json::to_string(user)?;
        if self.store.get(keys::USER).as_deref() == Some(serialized.as_str()) {
            return Ok(false);
        }
        self.store.set(keys::USER, &serialized)?;
        Ok(true)
    }

    pub fn store_role(&self, role: UserRole) -> SessionResult<()> {
        self.store.set(keys::USER_ROLE, role.as_str())
    }

    /// Record a confirmed session: token and user summary in one update.
    /// Entries that already hold the same value are not rewritten.
    pub fn establish(&self, token: &SessionToken, user: &UserSummary) -> SessionResult<()> {
        let serialized = serde_json::to_string(user)?;
        let mut changed: Vec<(&str, &str)> = Vec::with_capacity(2);

        if self.token().as_ref() != Some(token) {
            changed.push((keys::AUTH_TOKEN, token.as_str()));
        }
        if self.store.get(keys::USER).as_deref() != Some(serialized.as_str()) {
            changed.push((keys::USER, &serialized));
        }

        if changed.is_empty() {
            return Ok(());
        }
        self.store.set_all(&changed)
    }

    /// Remove token, user and role in one update.
    pub fn clear(&self) -> SessionResult<()> {
        self.store.remove_all(&keys::ALL)
    }
}
