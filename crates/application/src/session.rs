//! Session controller
//!
//! Drives the login, logout and registration flows on top of the
//! gateway and keeps the token store in step with their outcome.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use passage_domain::{AuthError, AuthResult, Credentials, Navigation, Route, SessionState, User, guard};
use tracing::{debug, info, warn};

use crate::auth::{AuthGateway, TokenStore};
use crate::pipeline::ApiClient;
use crate::ports::Navigator;

/// Fallback greeting when the server sends no message.
const LOGGED_IN: &str = "Login successful";

/// Default bound on the best-effort backend logout.
pub const DEFAULT_LOGOUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Orchestrates the session lifecycle.
pub struct SessionController {
    gateway: AuthGateway,
    tokens: Arc<TokenStore>,
    navigator: Arc<dyn Navigator>,
    authenticating: AtomicBool,
    logout_timeout: Duration,
}

/// Clears the authenticating flag when a login attempt ends, however it ends.
struct AuthenticatingGuard<'a>(&'a AtomicBool);

impl Drop for AuthenticatingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SessionController {
    /// Create a controller over the given client.
    #[must_use]
    pub fn new(client: Arc<ApiClient>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            tokens: Arc::clone(client.tokens()),
            gateway: AuthGateway::new(client),
            navigator,
            authenticating: AtomicBool::new(false),
            logout_timeout: DEFAULT_LOGOUT_TIMEOUT,
        }
    }

    /// Bound the backend logout call by `timeout`.
    #[must_use]
    pub const fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    /// Current state of the session.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.authenticating.load(Ordering::Acquire) {
            SessionState::Authenticating
        } else if self.tokens.is_authenticated() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    /// The signed-in user, if known.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.tokens.user()
    }

    /// The token store backing this session.
    #[must_use]
    pub const fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Recover a persisted session without touching the network.
    ///
    /// Returns true if the session is now authenticated.
    pub async fn try_auto_login(&self) -> bool {
        let recovered = self.tokens.load().await;
        if recovered {
            info!(
                user = self.tokens.user().map(|u| u.username).as_deref(),
                "session restored"
            );
        }
        recovered
    }

    /// Log in and persist the issued tokens.
    ///
    /// Returns the server's greeting.
    ///
    /// # Errors
    ///
    /// Whatever the gateway reports; any partial session is cleared first.
    pub async fn login(&self, credentials: &Credentials) -> AuthResult<String> {
        self.authenticating.store(true, Ordering::Release);
        let _authenticating = AuthenticatingGuard(&self.authenticating);

        match self.gateway.login(credentials).await {
            Ok(response) => {
                let user = response
                    .user
                    .unwrap_or_else(|| User::named(credentials.username.clone()));
                info!(user = %user.username, "logged in");
                self.tokens
                    .set(response.access_token, Some(response.refresh_token), Some(user))
                    .await;
                Ok(response.message.unwrap_or_else(|| LOGGED_IN.to_string()))
            }
            Err(e) => {
                warn!(user = %credentials.username, error = %e, "login failed");
                self.tokens.clear().await;
                Err(e)
            }
        }
    }

    /// Create an account. The current session is left untouched.
    ///
    /// # Errors
    ///
    /// Whatever the gateway reports.
    pub async fn register(&self, credentials: &Credentials) -> AuthResult<String> {
        let message = self.gateway.register(credentials).await?;
        info!(user = %credentials.username, "registered");
        Ok(message)
    }

    /// End the session and go to the login view.
    ///
    /// With `call_backend`, the server is asked to revoke the access token
    /// first. That call is bounded by the logout timeout and its outcome
    /// is only logged; the local session is always cleared.
    pub async fn logout(&self, call_backend: bool) {
        if call_backend && self.tokens.is_authenticated() {
            match tokio::time::timeout(self.logout_timeout, self.gateway.logout()).await {
                Ok(Ok(())) => debug!("server session revoked"),
                Ok(Err(e)) => warn!(error = %e, "backend logout failed"),
                Err(_) => warn!(
                    timeout = ?self.logout_timeout,
                    "backend logout timed out"
                ),
            }
        }

        self.tokens.clear().await;
        info!("logged out");
        self.navigator.navigate(Route::login());
    }

    /// Fetch the profile and store it as the current user.
    ///
    /// # Errors
    ///
    /// - `NotAuthenticated` without a network call if there is no session.
    /// - The gateway error otherwise. An authorization failure that
    ///   survived the refresh protocol logs the user out first.
    pub async fn fetch_profile(&self) -> AuthResult<User> {
        if !self.tokens.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }

        match self.gateway.fetch_profile().await {
            Ok(user) => {
                self.tokens.update_user(user.clone()).await;
                Ok(user)
            }
            Err(e) if e.is_unauthorized() => {
                warn!(error = %e, "profile rejected, logging out");
                self.logout(true).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Check whether the current session may visit `target`.
    ///
    /// On a redirect the navigator is sent to the new destination.
    pub fn authorize(&self, target: Route) -> Navigation {
        let decision = guard(target, self.tokens.is_authenticated());
        if let Navigation::Redirect(route) = &decision {
            debug!(to = %route, "route guard redirect");
            self.navigator.navigate(route.clone());
        }
        decision
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state())
            .field("logout_timeout", &self.logout_timeout)
            .finish_non_exhaustive()
    }
}
