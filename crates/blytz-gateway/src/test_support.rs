//! Scripted identity provider for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use blytz_identity::{IdentityError, IdentityProvider, IdentityResult};
use blytz_models::{SessionToken, UserSummary};
use tokio::sync::watch;

/// Outcome of one forced refresh.
#[derive(Debug, Clone)]
pub enum Script {
    Token(String),
    NoUser,
    Fail,
}

impl Script {
    pub fn token(raw: &str) -> Self {
        Script::Token(raw.to_string())
    }
}

/// Provider whose forced refreshes follow a script. The last entry repeats
/// once the script runs out.
pub struct ScriptedIdentity {
    script: Mutex<VecDeque<Script>>,
    current: Option<SessionToken>,
    delay: Duration,
    forced: AtomicUsize,
    unforced: AtomicUsize,
    sign_outs: AtomicUsize,
    changes: watch::Sender<Option<UserSummary>>,
}

impl ScriptedIdentity {
    pub fn new(script: Script) -> Self {
        Self::with_script(vec![script])
    }

    pub fn with_script(script: Vec<Script>) -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            script: Mutex::new(script.into()),
            current: None,
            delay: Duration::ZERO,
            forced: AtomicUsize::new(0),
            unforced: AtomicUsize::new(0),
            sign_outs: AtomicUsize::new(0),
            changes,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Token returned by unforced reads.
    pub fn with_current_token(mut self, raw: &str) -> Self {
        self.current = Some(SessionToken::new(raw));
        self
    }

    pub fn forced_calls(&self) -> usize {
        self.forced.load(Ordering::SeqCst)
    }

    pub fn unforced_calls(&self) -> usize {
        self.unforced.load(Ordering::SeqCst)
    }

    pub fn sign_outs(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    pub fn notify(&self, state: Option<UserSummary>) {
        self.changes.send_replace(state);
    }

    fn next_step(&self) -> Script {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or(Script::NoUser)
        }
    }
}

#[async_trait]
impl IdentityProvider for ScriptedIdentity {
    async fn current_session_token(&self, force_refresh: bool) -> IdentityResult<Option<SessionToken>> {
        if !force_refresh {
            self.unforced.fetch_add(1, Ordering::SeqCst);
            return Ok(self.current.clone());
        }

        self.forced.fetch_add(1, Ordering::SeqCst);
        let step = self.next_step();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match step {
            Script::Token(raw) => Ok(Some(SessionToken::new(raw))),
            Script::NoUser => Ok(None),
            Script::Fail => Err(IdentityError::InvalidResponse("scripted refresh failure".into())),
        }
    }

    fn current_user(&self) -> Option<UserSummary> {
        self.changes.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<UserSummary>> {
        self.changes.subscribe()
    }

    async fn sign_out(&self) -> IdentityResult<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.changes.send_replace(None);
        Ok(())
    }
}
