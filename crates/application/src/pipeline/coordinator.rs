//! Single-flight access token refresh.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use passage_domain::{AuthError, AuthResult, Notice, Route};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::auth::{TokenRefresher, TokenStore};
use crate::ports::{Navigator, Notifier};

type Waiter = oneshot::Sender<AuthResult<String>>;

/// A refresh that failed and ended the session.
struct Failure {
    /// Session epoch right after the store was cleared.
    epoch: u64,
    /// Access token the failed refresh was meant to replace.
    rejected: Option<String>,
    error: AuthError,
}

#[derive(Default)]
struct RefreshState {
    in_progress: bool,
    /// Callers parked on the current refresh, in arrival order.
    waiters: VecDeque<Waiter>,
    last_failure: Option<Failure>,
}

struct Inner {
    refresher: TokenRefresher,
    tokens: Arc<TokenStore>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<RefreshState>,
}

/// Hands out a valid access token to callers whose token was rejected.
///
/// At most one refresh call is outstanding at a time. Callers arriving
/// while it runs are queued and all receive the same outcome, in the
/// order they arrived. The refresh runs on its own task, so a caller
/// dropping its future never leaves the flag set or the queue stranded.
///
/// On failure the session is torn down here: the token store is cleared,
/// the expiry notice is shown and the user is sent to the login view.
/// A late rejection of the same token gets that failure back instead of
/// starting another refresh.
///
/// A refresh outcome only applies to the session it started under. If
/// the session is cleared or replaced while the call is in flight, the
/// store is left alone and waiters get `NotAuthenticated`.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    /// Create a coordinator.
    #[must_use]
    pub fn new(
        refresher: TokenRefresher,
        tokens: Arc<TokenStore>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                refresher,
                tokens,
                navigator,
                notifier,
                state: Mutex::new(RefreshState::default()),
            }),
        }
    }

    /// The refresher used for the upstream call.
    #[must_use]
    pub fn refresher(&self) -> &TokenRefresher {
        &self.inner.refresher
    }

    /// Returns true while a refresh call is outstanding.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner.state.lock().in_progress
    }

    /// Wait for an access token newer than `rejected`.
    ///
    /// If the stored token already differs from the rejected one and no
    /// refresh is running, it is returned straight away. Otherwise the
    /// caller joins the current refresh, starting one if needed.
    ///
    /// # Errors
    ///
    /// `NoRefreshToken` or `RefreshFailed`, identical for every caller
    /// that waited on the same refresh or was rejected with the token it
    /// tried to replace. `NotAuthenticated` if the session ended while
    /// the refresh was in flight.
    pub async fn renewed_token(&self, rejected: Option<&str>) -> AuthResult<String> {
        let receiver = {
            let mut state = self.inner.state.lock();
            if !state.in_progress {
                if let Some(failure) = &state.last_failure
                    && failure.epoch == self.inner.tokens.epoch()
                    && failure.rejected.as_deref() == rejected
                {
                    debug!("session already ended by a failed refresh");
                    return Err(failure.error.clone());
                }
                if let Some(current) = self.inner.tokens.access_token() {
                    if rejected != Some(current.as_str()) {
                        debug!("access token already renewed, replaying");
                        return Ok(current);
                    }
                }
                // Flag is set before the refresh task can run.
                state.in_progress = true;
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move { inner.run_refresh().await });
            }

            let (sender, receiver) = oneshot::channel();
            state.waiters.push_back(sender);
            debug!(queued = state.waiters.len(), "waiting for token refresh");
            receiver
        };

        receiver.await.unwrap_or_else(|_| {
            Err(AuthError::RefreshFailed {
                status: None,
                message: "refresh task ended without an outcome".to_string(),
            })
        })
    }
}

impl Inner {
    async fn run_refresh(&self) {
        let epoch = self.tokens.epoch();
        let rejected = self.tokens.access_token();
        let refresh_token = self.tokens.refresh_token();

        let mut expired = false;
        let outcome = match self.refresher.refresh(refresh_token.as_deref()).await {
            Ok(token) => {
                if self.tokens.set_access_token_if(epoch, token.clone()).await {
                    info!("access token refreshed");
                    Ok(token)
                } else {
                    info!("session ended during refresh, discarding new token");
                    Err(AuthError::NotAuthenticated)
                }
            }
            Err(e) => {
                if self.tokens.clear_if(epoch).await {
                    warn!(error = %e, "token refresh failed, ending session");
                    expired = true;
                    Err(e)
                } else {
                    debug!(error = %e, "token refresh failed after the session ended");
                    Err(AuthError::NotAuthenticated)
                }
            }
        };

        let waiters = {
            let mut state = self.state.lock();
            state.in_progress = false;
            state.last_failure = match &outcome {
                Err(error) if expired => Some(Failure {
                    epoch: self.tokens.epoch(),
                    rejected,
                    error: error.clone(),
                }),
                _ => None,
            };
            std::mem::take(&mut state.waiters)
        };

        if expired {
            self.notifier.notify(Notice::session_expired());
            self.navigator.navigate(Route::login());
        }

        debug!(waiters = waiters.len(), success = outcome.is_ok(), "releasing queued requests");
        for waiter in waiters {
            // A closed receiver means the caller gave up; nothing to deliver.
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RefreshCoordinator")
            .field("in_progress", &state.in_progress)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testing::{FakeApi, FakeTransport, Harness};
    use passage_domain::Endpoints;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_stale_rejection_replays_with_current_token() {
        let harness = Harness::new(FakeApi::default());
        harness.sign_in("T2", "R1").await;

        let token = harness
            .client
            .coordinator()
            .renewed_token(Some("T1"))
            .await
            .unwrap();

        assert_eq!(token, "T2");
        assert_eq!(harness.transport.calls_to(Endpoints::REFRESH).len(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_one_refresh() {
        let harness = Harness::with_transport(FakeTransport::new(FakeApi::default()));
        harness.sign_in("T1", "R1").await;
        let coordinator = harness.client.coordinator().clone();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.renewed_token(Some("T1")).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok("T2".to_string()));
        }

        assert_eq!(harness.transport.calls_to(Endpoints::REFRESH).len(), 1);
        assert!(!coordinator.is_refreshing());
        assert_eq!(harness.tokens.access_token().as_deref(), Some("T2"));
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_strand_refresh() {
        let harness = Harness::with_transport(
            FakeTransport::new(FakeApi::default()).hold_refresh_until(1),
        );
        harness.sign_in("T1", "R1").await;
        let coordinator = harness.client.coordinator().clone();

        // Start a refresh, then abandon it before it can finish.
        let abandoned = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.renewed_token(Some("T1")).await })
        };
        tokio::task::yield_now().await;
        abandoned.abort();

        harness.transport.release_refresh();
        let token = coordinator.renewed_token(Some("T1")).await.unwrap();

        assert_eq!(token, "T2");
        assert_eq!(harness.transport.calls_to(Endpoints::REFRESH).len(), 1);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_ends_session() {
        let harness = Harness::new(FakeApi::default());
        harness.tokens.set("T1".to_string(), None, None).await;

        let result = harness.client.coordinator().renewed_token(Some("T1")).await;

        assert_eq!(result, Err(AuthError::NoRefreshToken));
        assert_eq!(harness.transport.total_calls(), 0);
        assert!(harness.tokens.session().is_empty());
        assert_eq!(harness.navigator.routes(), vec![Route::login()]);
        assert_eq!(harness.notifier.notices(), vec![Notice::session_expired()]);
    }

    #[tokio::test]
    async fn test_late_rejection_after_failed_refresh_fails_alike() {
        let harness = Harness::new(FakeApi::default());
        harness.sign_in("T1", "R-revoked").await;
        let coordinator = harness.client.coordinator();

        let first = coordinator.renewed_token(Some("T1")).await;
        let late = coordinator.renewed_token(Some("T1")).await;

        assert!(matches!(first, Err(AuthError::RefreshFailed { status: Some(401), .. })));
        assert_eq!(late, first);
        assert_eq!(harness.transport.calls_to(Endpoints::REFRESH).len(), 1);
        assert_eq!(harness.navigator.routes(), vec![Route::login()]);
        assert_eq!(harness.notifier.notices(), vec![Notice::session_expired()]);
    }

    #[tokio::test]
    async fn test_failed_refresh_is_forgotten_after_new_login() {
        let harness = Harness::new(FakeApi::default());
        harness.sign_in("T1", "R-revoked").await;
        let coordinator = harness.client.coordinator();
        coordinator.renewed_token(Some("T1")).await.unwrap_err();

        harness.sign_in("T1", "R1").await;
        let token = coordinator.renewed_token(Some("T1")).await.unwrap();

        assert_eq!(token, "T2");
        assert_eq!(harness.transport.calls_to(Endpoints::REFRESH).len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_outcome_dropped_when_session_cleared() {
        let harness = Harness::with_transport(
            FakeTransport::new(FakeApi::default()).hold_refresh_until(1),
        );
        harness.sign_in("T1", "R1").await;
        let coordinator = harness.client.coordinator().clone();

        let waiting = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.renewed_token(Some("T1")).await })
        };
        while !coordinator.is_refreshing() {
            tokio::task::yield_now().await;
        }
        harness.tokens.clear().await;
        harness.transport.release_refresh();

        assert_eq!(waiting.await.unwrap(), Err(AuthError::NotAuthenticated));
        assert!(harness.tokens.session().is_empty());
        assert!(harness.storage.is_empty());
        assert!(harness.navigator.routes().is_empty());
        assert!(harness.notifier.notices().is_empty());
    }
}
