//! Client-side session expiry.
//!
//! The watcher only reads the `exp` claim, it cannot check the signature.
//! It exists to drop a credential locally before the server starts
//! rejecting it.

use std::sync::{Arc, Mutex, MutexGuard};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthFailure;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No credential held.
    Idle,
    /// A credential is held and its expiry timer is pending.
    Armed,
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

/// Reads the expiry of a JWT without verifying it.
pub fn decode_expiry(token: &str) -> Result<DateTime<Utc>, AuthFailure> {
    let payload = token.split('.').nth(1).ok_or(AuthFailure::Malformed)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| AuthFailure::Malformed)?;
    let claim: ExpiryClaim = serde_json::from_slice(&bytes).map_err(|_| AuthFailure::Malformed)?;
    DateTime::from_timestamp(claim.exp, 0).ok_or(AuthFailure::Malformed)
}

#[derive(Default)]
struct Inner {
    token: Option<String>,
    timer: Option<CancellationToken>,
    generation: u64,
}

impl Inner {
    fn clear(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.token = None;
    }
}

/// Holds the current credential and exactly one expiry timer for it.
///
/// Arming requires a tokio runtime, since the timer is a spawned task.
#[derive(Clone, Default)]
pub struct SessionWatcher {
    inner: Arc<Mutex<Inner>>,
}

impl SessionWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Inner stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replaces any held credential. A token that is already expired, or
    /// unreadable, logs out immediately without arming a timer.
    pub fn login(&self, token: impl Into<String>) -> SessionState {
        let token = token.into();
        let mut inner = self.lock();
        inner.clear();
        inner.generation += 1;

        let remaining = match decode_expiry(&token) {
            Ok(expires_at) => (expires_at - Utc::now()).to_std().ok().filter(|d| !d.is_zero()),
            Err(failure) => {
                tracing::warn!(?failure, "unreadable session token");
                None
            }
        };
        let Some(remaining) = remaining else {
            tracing::info!("session already expired, logging out");
            return SessionState::Idle;
        };

        let timer = CancellationToken::new();
        let generation = inner.generation;
        inner.token = Some(token);
        inner.timer = Some(timer.clone());
        drop(inner);

        let shared = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(remaining) => {
                    let mut inner = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    if inner.generation == generation {
                        inner.token = None;
                        inner.timer = None;
                        tracing::info!("session expired");
                    }
                }
            }
        });

        SessionState::Armed
    }

    pub fn logout(&self) {
        let mut inner = self.lock();
        inner.clear();
        inner.generation += 1;
    }

    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    pub fn state(&self) -> SessionState {
        if self.lock().token.is_some() {
            SessionState::Armed
        } else {
            SessionState::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{TokenManager, TOKEN_VALIDITY_SECS};
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;
    use uuid::Uuid;

    /// A token whose expiry lies `secs` seconds from now.
    fn token_expiring_in(secs: i64) -> String {
        let issued_at = Utc::now() - ChronoDuration::seconds(TOKEN_VALIDITY_SECS - secs);
        TokenManager::new("secret")
            .issue_at(Uuid::new_v4(), None, issued_at)
            .unwrap()
    }

    #[test]
    fn expiry_is_read_without_the_secret() {
        let issued_at = Utc::now();
        let token = TokenManager::new("secret")
            .issue_at(Uuid::new_v4(), Some("bob"), issued_at)
            .unwrap();

        let expires_at = decode_expiry(&token).unwrap();
        assert_eq!(
            expires_at.timestamp(),
            issued_at.timestamp() + TOKEN_VALIDITY_SECS
        );
        assert_eq!(decode_expiry("garbage"), Err(AuthFailure::Malformed));
        assert_eq!(decode_expiry("a.###.c"), Err(AuthFailure::Malformed));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_at_expiry() {
        let watcher = SessionWatcher::new();
        let token = token_expiring_in(3);

        assert_eq!(watcher.login(token.clone()), SessionState::Armed);
        assert_eq!(watcher.token(), Some(token));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(watcher.state(), SessionState::Armed);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(watcher.state(), SessionState::Idle);
        assert_eq!(watcher.token(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_token_never_arms() {
        let watcher = SessionWatcher::new();
        assert_eq!(watcher.login(token_expiring_in(-10)), SessionState::Idle);
        assert_eq!(watcher.token(), None);

        assert_eq!(watcher.login("not-a-jwt"), SessionState::Idle);
        assert_eq!(watcher.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn new_login_replaces_the_old_timer() {
        let watcher = SessionWatcher::new();
        watcher.login(token_expiring_in(2));
        let fresh = token_expiring_in(600);
        watcher.login(fresh.clone());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(watcher.state(), SessionState::Armed);
        assert_eq!(watcher.token(), Some(fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn logout_disarms() {
        let watcher = SessionWatcher::new();
        watcher.login(token_expiring_in(600));
        watcher.logout();
        assert_eq!(watcher.state(), SessionState::Idle);

        // A stale timer must not clear a later session.
        let next = token_expiring_in(1200);
        watcher.login(next.clone());
        tokio::time::sleep(Duration::from_secs(700)).await;
        assert_eq!(watcher.token(), Some(next));
    }
}
