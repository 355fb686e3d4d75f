//! Mirrors provider session changes into the credential cache.

use blytz_models::UserSummary;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::coordinator::TokenCoordinator;

/// Listener that keeps the credential cache in step with the identity
/// provider's session.
#[derive(Debug, Clone)]
pub struct SessionSync {
    coordinator: TokenCoordinator,
}

impl SessionSync {
    pub fn new(coordinator: TokenCoordinator) -> Self {
        Self { coordinator }
    }

    /// Apply the current session state, then every change, until the
    /// provider drops its sender.
    pub async fn run(self) {
        let mut changes = self.coordinator.identity().subscribe();
        loop {
            let state = changes.borrow_and_update().clone();
            self.apply(state).await;

            if changes.changed().await.is_err() {
                debug!("Identity provider closed session notifications");
                break;
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Mirror one session state.
    pub async fn apply(&self, state: Option<UserSummary>) {
        let Some(user) = state else {
            debug!("No provider session, clearing credential cache");
            self.coordinator.clear_session();
            return;
        };

        match self.coordinator.identity().current_session_token(false).await {
            Ok(Some(token)) => {
                info!(uid = %user.uid, "Provider session active");
                self.coordinator.establish(&token, &user);
            }
            Ok(None) => {
                warn!(uid = %user.uid, "Provider reported a user without a token");
                self.coordinator.clear_session();
            }
            Err(e) => {
                warn!(uid = %user.uid, "Failed to read session token: {}", e);
                self.coordinator.clear_session();
            }
        }
    }
}
