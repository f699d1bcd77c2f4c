//! Auth-aware request pipeline.
//!
//! Every request goes out with the stored access token as bearer
//! credential. A 401 on a request that is eligible for refresh is
//! converted into [`AuthError::AuthExpired`] and handed to the
//! [`RefreshCoordinator`]; once a new token is available the request is
//! replayed exactly once. Any other outcome passes through unchanged.

mod coordinator;

pub use coordinator::RefreshCoordinator;

use std::sync::Arc;

use passage_domain::{ApiRequest, ApiResponse, AuthError, AuthResult};
use tracing::{debug, info_span, Instrument};

use crate::auth::{TokenRefresher, TokenStore};
use crate::ports::{HttpTransport, Navigator, Notifier};

/// HTTP client wrapper owning the token lifecycle.
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenStore>,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    /// Create a client.
    ///
    /// The navigator and notifier are used when a failed refresh forces
    /// the user out of the session.
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<TokenStore>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let refresher = TokenRefresher::new(Arc::clone(&transport));
        let coordinator =
            RefreshCoordinator::new(refresher, Arc::clone(&tokens), navigator, notifier);
        Self {
            transport,
            tokens,
            coordinator,
        }
    }

    /// The token store this client reads bearer tokens from.
    #[must_use]
    pub const fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// The refresher backing the coordinator.
    #[must_use]
    pub fn refresher(&self) -> &TokenRefresher {
        self.coordinator.refresher()
    }

    /// The refresh coordinator.
    #[must_use]
    pub const fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Send a request, refreshing the access token once if it expired.
    ///
    /// # Errors
    ///
    /// - `Network` if the transport fails.
    /// - `Server` for any non-2xx response that is not retried, including
    ///   a 401 on a replay.
    /// - `NoRefreshToken` / `RefreshFailed` if the session could not be
    ///   renewed; the session has been ended by then.
    /// - `NotAuthenticated` if the session ended while the refresh ran.
    pub async fn send(&self, request: ApiRequest) -> AuthResult<ApiResponse> {
        let span = info_span!(
            "api_request",
            request_id = %request.id,
            method = %request.method,
            path = %request.path,
        );
        self.send_inner(request).instrument(span).await
    }

    async fn send_inner(&self, mut request: ApiRequest) -> AuthResult<ApiResponse> {
        let sent_with = if request.anonymous {
            None
        } else {
            self.tokens.access_token()
        };

        let response = self.dispatch(&request, sent_with.as_deref()).await?;
        match Self::classify(&request, response) {
            Err(AuthError::AuthExpired) => {
                debug!("access token rejected");
                request.mark_retried();
                let token = self.coordinator.renewed_token(sent_with.as_deref()).await?;
                debug!("replaying with renewed token");
                self.dispatch(&request, Some(&token))
                    .await?
                    .error_for_status()
            }
            other => other,
        }
    }

    async fn dispatch(&self, request: &ApiRequest, bearer: Option<&str>) -> AuthResult<ApiResponse> {
        let outbound = match bearer {
            Some(token) => request.clone().with_bearer(token),
            None => request.clone(),
        };
        let response = self.transport.send(&outbound).await?;
        debug!(status = %response.status, retried = request.retried, "response received");
        Ok(response)
    }

    /// Sort a response into success, expired authorization, or failure.
    fn classify(request: &ApiRequest, response: ApiResponse) -> AuthResult<ApiResponse> {
        if Self::is_auth_expired(request, &response) {
            return Err(AuthError::AuthExpired);
        }
        response.error_for_status()
    }

    /// Returns true if the response should trigger the refresh protocol.
    #[must_use]
    pub fn is_auth_expired(request: &ApiRequest, response: &ApiResponse) -> bool {
        response.status.is_unauthorized()
            && !request.is_refresh_call()
            && !request.retried
            && !request.anonymous
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("tokens", &self.tokens)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}
