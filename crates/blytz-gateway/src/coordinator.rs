//! Token cache and refresh coordinator.
//!
//! Tracks the session phase and funnels forced refreshes through a single
//! in-flight operation:
//! - The first caller creates the refresh and parks a shared future in the
//!   slot; concurrent callers await that same future
//! - A scope guard inside the operation empties the slot on every exit path
//! - A failed refresh clears the credential cache before anyone observes it

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use blytz_identity::{IdentityProvider, IdentityResult};
use blytz_models::{SessionToken, UserSummary};
use blytz_session::CredentialCache;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::metrics::record_refresh;

// =============================================================================
// Types
// =============================================================================

/// Lifecycle of the cached session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    Cached,
    Refreshing,
    /// Transient: a failed refresh passes through here on its way to
    /// `Unauthenticated`.
    Expired,
}

/// Why a forced refresh produced no token. Shared by every caller that
/// joined the operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    #[error("identity provider reported no current user")]
    NoCurrentUser,

    #[error("token refresh failed: {0}")]
    Provider(String),
}

pub type RefreshOutcome = Result<SessionToken, RefreshFailure>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

struct InFlight {
    id: u64,
    future: SharedRefresh,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// State
// =============================================================================

struct CoordinatorState {
    identity: Arc<dyn IdentityProvider>,
    credentials: CredentialCache,
    phase: Mutex<SessionPhase>,
    inflight: Mutex<Option<InFlight>>,
    next_id: AtomicU64,
    /// Bumped on every clear. Only written under the phase lock.
    epoch: AtomicU64,
}

fn set_phase(phase: &mut SessionPhase, next: SessionPhase) {
    if *phase != next {
        debug!(from = ?*phase, to = ?next, "Session phase transition");
        *phase = next;
    }
}

impl CoordinatorState {
    fn transition(&self, next: SessionPhase) {
        set_phase(&mut lock(&self.phase), next);
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Store a refreshed token unless the session was cleared after
    /// `epoch` was read. Identical values are not rewritten.
    fn adopt(&self, token: &SessionToken, epoch: u64) -> bool {
        let mut phase = lock(&self.phase);
        if self.epoch() != epoch {
            debug!("Session cleared during refresh, discarding token");
            return false;
        }

        match self.credentials.store_token(token) {
            Ok(true) => debug!(token = %token, "Cached refreshed token"),
            Ok(false) => debug!("Refreshed token unchanged"),
            Err(e) => warn!("Failed to persist refreshed token: {}", e),
        }
        set_phase(&mut phase, SessionPhase::Cached);
        true
    }

    /// Drop every cached credential and settle in `Unauthenticated`.
    /// Refreshes already in flight can no longer write.
    fn clear(&self) {
        let mut phase = lock(&self.phase);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.credentials.clear() {
            warn!("Failed to clear credential cache: {}", e);
        }
        set_phase(&mut phase, SessionPhase::Unauthenticated);
    }

    fn expire(&self) {
        self.transition(SessionPhase::Expired);
        self.clear();
    }

    /// Empty the in-flight slot if it still holds operation `id`.
    fn release(&self, id: u64) {
        let mut slot = lock(&self.inflight);
        if slot.as_ref().is_some_and(|inflight| inflight.id == id) {
            *slot = None;
        }
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Process-wide owner of the session token.
///
/// Cloning is cheap; clones share the same cache, phase and in-flight slot.
#[derive(Clone)]
pub struct TokenCoordinator {
    inner: Arc<CoordinatorState>,
}

impl fmt::Debug for TokenCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCoordinator")
            .field("phase", &self.phase())
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}

impl TokenCoordinator {
    pub fn new(identity: Arc<dyn IdentityProvider>, credentials: CredentialCache) -> Self {
        let phase = if credentials.token().is_some() {
            SessionPhase::Cached
        } else {
            SessionPhase::Unauthenticated
        };

        Self {
            inner: Arc::new(CoordinatorState {
                identity,
                credentials,
                phase: Mutex::new(phase),
                inflight: Mutex::new(None),
                next_id: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        *lock(&self.inner.phase)
    }

    pub fn is_refreshing(&self) -> bool {
        lock(&self.inner.inflight).is_some()
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.inner.identity
    }

    pub fn credentials(&self) -> &CredentialCache {
        &self.inner.credentials
    }

    /// Cached token without touching the provider.
    pub fn cached_token(&self) -> Option<SessionToken> {
        self.inner.credentials.token()
    }

    /// Token for an outgoing request: the cached one, else a fresh one from
    /// the provider, else `None`.
    pub async fn token(&self) -> Option<SessionToken> {
        if let Some(token) = self.cached_token() {
            return Some(token);
        }

        match self.refresh().await {
            Ok(token) => Some(token),
            Err(failure) => {
                debug!("No session token available: {}", failure);
                None
            }
        }
    }

    /// Force a token refresh, joining the in-flight one if it exists.
    pub async fn refresh(&self) -> RefreshOutcome {
        let future = {
            let mut slot = lock(&self.inner.inflight);
            match slot.as_ref() {
                Some(inflight) => {
                    debug!(refresh_id = inflight.id, "Joining in-flight token refresh");
                    inflight.future.clone()
                }
                None => {
                    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                    let future = Self::run_refresh(Arc::clone(&self.inner), id)
                        .boxed()
                        .shared();
                    *slot = Some(InFlight {
                        id,
                        future: future.clone(),
                    });
                    self.inner.transition(SessionPhase::Refreshing);
                    future
                }
            }
        };

        future.await
    }

    async fn run_refresh(state: Arc<CoordinatorState>, id: u64) -> RefreshOutcome {
        let _slot = scopeguard::guard(Arc::clone(&state), move |state| state.release(id));

        let epoch = state.epoch();
        debug!(refresh_id = id, "Refreshing session token");
        let outcome = match state.identity.current_session_token(true).await {
            Ok(Some(token)) if state.adopt(&token, epoch) => Ok(token),
            Ok(Some(_)) => Err(RefreshFailure::NoCurrentUser),
            Ok(None) => Err(RefreshFailure::NoCurrentUser),
            Err(e) => {
                warn!("Error getting auth token: {}", e);
                Err(RefreshFailure::Provider(e.to_string()))
            }
        };

        match &outcome {
            Ok(_) => {
                info!(refresh_id = id, "Session token refreshed");
                record_refresh("fresh");
            }
            Err(failure) => {
                warn!(refresh_id = id, "Session token refresh failed: {}", failure);
                record_refresh(match failure {
                    RefreshFailure::NoCurrentUser => "no_user",
                    RefreshFailure::Provider(_) => "error",
                });
                if state.epoch() == epoch {
                    state.expire();
                }
            }
        }

        outcome
    }

    /// Record a session the provider just confirmed.
    pub fn establish(&self, token: &SessionToken, user: &UserSummary) {
        if let Err(e) = self.inner.credentials.establish(token, user) {
            warn!("Failed to persist session: {}", e);
        }
        self.inner.transition(SessionPhase::Cached);
    }

    /// Terminal authentication failure: clear the cache.
    pub fn expire_session(&self) {
        self.inner.expire();
    }

    /// Clear the cache without contacting the provider.
    pub fn clear_session(&self) {
        self.inner.clear();
    }

    /// Explicit sign-out: end the provider session and clear the cache.
    /// The cache is cleared even if the provider call fails.
    pub async fn sign_out(&self) -> IdentityResult<()> {
        let result = self.inner.identity.sign_out().await;
        self.inner.clear();
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use blytz_session::{keys, MemorySessionStore, SessionStore};
    use futures_util::future::join_all;

    use super::*;
    use crate::test_support::{Script, ScriptedIdentity};

    fn setup(identity: Arc<ScriptedIdentity>, cached: Option<&str>) -> (TokenCoordinator, CredentialCache) {
        let store = Arc::new(MemorySessionStore::new());
        if let Some(token) = cached {
            store.set(keys::AUTH_TOKEN, token).unwrap();
            store.set(keys::USER, r#"{"uid":"u1","email":null,"displayName":null}"#).unwrap();
            store.set(keys::USER_ROLE, "va").unwrap();
        }
        let credentials = CredentialCache::new(store);
        (TokenCoordinator::new(identity, credentials.clone()), credentials)
    }

    #[tokio::test]
    async fn test_initial_phase_follows_cache() {
        let identity = Arc::new(ScriptedIdentity::new(Script::NoUser));
        let (coordinator, _) = setup(identity.clone(), Some("t1"));
        assert_eq!(coordinator.phase(), SessionPhase::Cached);

        let (coordinator, _) = setup(identity, None);
        assert_eq!(coordinator.phase(), SessionPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn test_cached_token_skips_provider() {
        let identity = Arc::new(ScriptedIdentity::new(Script::token("fresh")));
        let (coordinator, _) = setup(identity.clone(), Some("t1"));

        assert_eq!(coordinator.token().await, Some(SessionToken::new("t1")));
        assert_eq!(identity.forced_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_token_fetches_fresh_one() {
        let identity = Arc::new(ScriptedIdentity::new(Script::token("fresh")));
        let (coordinator, credentials) = setup(identity.clone(), None);

        assert_eq!(coordinator.token().await, Some(SessionToken::new("fresh")));
        assert_eq!(credentials.token(), Some(SessionToken::new("fresh")));
        assert_eq!(coordinator.phase(), SessionPhase::Cached);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_coalesce() {
        let identity = Arc::new(
            ScriptedIdentity::new(Script::token("t2")).with_delay(Duration::from_millis(50)),
        );
        let (coordinator, _) = setup(identity.clone(), Some("t1"));

        let outcomes = join_all((0..8).map(|_| {
            let coordinator = coordinator.clone();
            async move { coordinator.refresh().await }
        }))
        .await;

        assert_eq!(identity.forced_calls(), 1);
        assert!(outcomes.iter().all(|o| o == &Ok(SessionToken::new("t2"))));
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.phase(), SessionPhase::Cached);
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_shared() {
        let identity = Arc::new(
            ScriptedIdentity::new(Script::Fail).with_delay(Duration::from_millis(50)),
        );
        let (coordinator, credentials) = setup(identity.clone(), Some("t1"));

        let outcomes = join_all((0..5).map(|_| coordinator.refresh())).await;

        assert_eq!(identity.forced_calls(), 1);
        let first = outcomes[0].clone();
        assert!(first.is_err());
        assert!(outcomes.iter().all(|o| o == &first));
        assert!(credentials.token().is_none());
        assert!(credentials.role().is_none());
    }

    #[tokio::test]
    async fn test_slot_is_released_between_refreshes() {
        let identity = Arc::new(ScriptedIdentity::with_script(vec![
            Script::token("t2"),
            Script::token("t3"),
        ]));
        let (coordinator, _) = setup(identity.clone(), Some("t1"));

        assert_eq!(coordinator.refresh().await, Ok(SessionToken::new("t2")));
        assert_eq!(coordinator.refresh().await, Ok(SessionToken::new("t3")));
        assert_eq!(identity.forced_calls(), 2);
    }

    #[tokio::test]
    async fn test_slot_is_released_after_failure() {
        let identity = Arc::new(ScriptedIdentity::with_script(vec![
            Script::Fail,
            Script::token("t2"),
        ]));
        let (coordinator, _) = setup(identity.clone(), Some("t1"));

        assert!(coordinator.refresh().await.is_err());
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.refresh().await, Ok(SessionToken::new("t2")));
    }

    #[tokio::test]
    async fn test_refresh_shows_refreshing_phase() {
        let identity = Arc::new(
            ScriptedIdentity::new(Script::token("t2")).with_delay(Duration::from_millis(100)),
        );
        let (coordinator, _) = setup(identity, Some("t1"));

        let background = coordinator.clone();
        let handle = tokio::spawn(async move { background.refresh().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(coordinator.phase(), SessionPhase::Refreshing);
        assert!(coordinator.is_refreshing());

        handle.await.unwrap().unwrap();
        assert_eq!(coordinator.phase(), SessionPhase::Cached);
    }

    #[tokio::test]
    async fn test_no_user_expires_to_unauthenticated() {
        let identity = Arc::new(ScriptedIdentity::new(Script::NoUser));
        let (coordinator, credentials) = setup(identity, Some("t1"));

        assert_eq!(coordinator.refresh().await, Err(RefreshFailure::NoCurrentUser));
        assert_eq!(coordinator.phase(), SessionPhase::Unauthenticated);
        assert!(!credentials.is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_out_clears_cache() {
        let identity = Arc::new(ScriptedIdentity::new(Script::NoUser));
        let (coordinator, credentials) = setup(identity.clone(), Some("t1"));

        coordinator.sign_out().await.unwrap();

        assert_eq!(identity.sign_outs(), 1);
        assert_eq!(coordinator.phase(), SessionPhase::Unauthenticated);
        assert!(credentials.token().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_during_refresh_keeps_cache_empty() {
        let identity = Arc::new(
            ScriptedIdentity::new(Script::token("t2")).with_delay(Duration::from_millis(100)),
        );
        let (coordinator, credentials) = setup(identity, Some("t1"));

        let background = coordinator.clone();
        let handle = tokio::spawn(async move { background.refresh().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        coordinator.sign_out().await.unwrap();
        assert_eq!(handle.await.unwrap(), Err(RefreshFailure::NoCurrentUser));

        assert!(credentials.token().is_none());
        assert!(!credentials.is_authenticated());
        assert_eq!(coordinator.phase(), SessionPhase::Unauthenticated);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_cleared_session_discards_late_refresh() {
        let identity = Arc::new(
            ScriptedIdentity::new(Script::token("t2")).with_delay(Duration::from_millis(100)),
        );
        let (coordinator, credentials) = setup(identity, Some("t1"));

        let background = coordinator.clone();
        let handle = tokio::spawn(async move { background.refresh().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        coordinator.clear_session();
        assert!(handle.await.unwrap().is_err());
        assert!(credentials.token().is_none());

        // A new session after the clear is adopted normally.
        coordinator.establish(&SessionToken::new("t3"), &UserSummary::new("u1"));
        assert_eq!(coordinator.refresh().await, Ok(SessionToken::new("t2")));
        assert_eq!(credentials.token(), Some(SessionToken::new("t2")));
    }

    #[tokio::test]
    async fn test_establish_moves_to_cached() {
        let identity = Arc::new(ScriptedIdentity::new(Script::NoUser));
        let (coordinator, credentials) = setup(identity, None);

        coordinator.establish(&SessionToken::new("t1"), &UserSummary::new("u1"));

        assert_eq!(coordinator.phase(), SessionPhase::Cached);
        assert!(credentials.is_authenticated());
    }
}
