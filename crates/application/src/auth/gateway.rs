//! Remote auth operations.
//!
//! Each operation is a single call with no retry logic of its own.
//! Everything except refresh goes through the [`ApiClient`] pipeline;
//! refresh talks to the transport directly so that a failing refresh
//! can never re-enter the refresh protocol.

use std::sync::Arc;

use passage_domain::{
    ApiErrorBody, ApiRequest, AuthError, AuthResult, Credentials, Endpoints, LoginResponse,
    RefreshResponse, RegisterResponse, User,
};
use tracing::debug;

use crate::pipeline::ApiClient;
use crate::ports::HttpTransport;

/// Fallback confirmation when the server sends no message.
const REGISTERED: &str = "Registration successful";

/// Exchanges a refresh token for a new access token.
#[derive(Clone)]
pub struct TokenRefresher {
    transport: Arc<dyn HttpTransport>,
}

impl TokenRefresher {
    /// Create a refresher over the raw transport.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Request a new access token.
    ///
    /// # Errors
    ///
    /// - `NoRefreshToken` if no token is given; no request is sent.
    /// - `RefreshFailed` if the call fails or the server rejects the token.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> AuthResult<String> {
        let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) else {
            return Err(AuthError::NoRefreshToken);
        };

        let request = ApiRequest::post(Endpoints::REFRESH)
            .with_bearer(refresh_token)
            .with_json(serde_json::json!({}));
        debug!(request_id = %request.id, "requesting new access token");

        let response = self
            .transport
            .send(&request)
            .await
            .map_err(|e| AuthError::RefreshFailed {
                status: None,
                message: e.to_string(),
            })?;

        if !response.status.is_success() {
            let body = ApiErrorBody::parse(&response.body);
            return Err(AuthError::RefreshFailed {
                status: Some(response.status.as_u16()),
                message: body
                    .message
                    .unwrap_or_else(|| response.status.to_string()),
            });
        }

        let RefreshResponse { access_token } =
            response.decode().map_err(|e| AuthError::RefreshFailed {
                status: Some(response.status.as_u16()),
                message: e.to_string(),
            })?;
        Ok(access_token)
    }
}

impl std::fmt::Debug for TokenRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRefresher").finish_non_exhaustive()
    }
}

/// Stateless client for the auth API.
#[derive(Debug, Clone)]
pub struct AuthGateway {
    client: Arc<ApiClient>,
}

impl AuthGateway {
    /// Create a gateway that sends through the given pipeline.
    #[must_use]
    pub const fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// Create an account.
    ///
    /// Returns the server's confirmation message.
    ///
    /// # Errors
    ///
    /// `Server` with the server's error body, or `Network`.
    pub async fn register(&self, credentials: &Credentials) -> AuthResult<String> {
        let request = ApiRequest::post(Endpoints::REGISTER)
            .anonymous()
            .with_json(credentials_body(credentials));
        let response = self.client.send(request).await?;
        let body: RegisterResponse = if response.body.is_empty() {
            RegisterResponse::default()
        } else {
            response.decode()?
        };
        Ok(body.message.unwrap_or_else(|| REGISTERED.to_string()))
    }

    /// Exchange credentials for a token pair.
    ///
    /// # Errors
    ///
    /// `Server` with the server's error body, `Network`, or
    /// `InvalidResponse` if the token pair is missing.
    pub async fn login(&self, credentials: &Credentials) -> AuthResult<LoginResponse> {
        let request = ApiRequest::post(Endpoints::LOGIN)
            .anonymous()
            .with_json(credentials_body(credentials));
        self.client.send(request).await?.decode()
    }

    /// Invalidate the current access token on the server.
    ///
    /// Best effort: callers are expected to ignore the error.
    ///
    /// # Errors
    ///
    /// Any pipeline error, including an already expired token.
    pub async fn logout(&self) -> AuthResult<()> {
        self.client
            .send(ApiRequest::delete(Endpoints::LOGOUT))
            .await
            .map(|_| ())
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// `NoRefreshToken` without a network call if none is given,
    /// `RefreshFailed` if the server rejects it.
    pub async fn refresh_access_token(&self, refresh_token: Option<&str>) -> AuthResult<String> {
        self.client.refresher().refresh(refresh_token).await
    }

    /// Fetch the authenticated user's profile.
    ///
    /// # Errors
    ///
    /// Any pipeline error; a 401 that survived the refresh protocol
    /// arrives as `Server { status: 401 }`.
    pub async fn fetch_profile(&self) -> AuthResult<User> {
        self.client
            .send(ApiRequest::get(Endpoints::PROFILE))
            .await?
            .decode()
    }
}

fn credentials_body(credentials: &Credentials) -> serde_json::Value {
    serde_json::json!({
        "username": credentials.username,
        "password": credentials.password,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testing::{FakeApi, Harness};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_refresh_without_token_makes_no_call() {
        let harness = Harness::new(FakeApi::default());
        let result = harness.gateway().refresh_access_token(None).await;

        assert_eq!(result, Err(AuthError::NoRefreshToken));
        assert_eq!(harness.transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_with_empty_token_makes_no_call() {
        let harness = Harness::new(FakeApi::default());
        let result = harness.gateway().refresh_access_token(Some("")).await;

        assert_eq!(result, Err(AuthError::NoRefreshToken));
        assert_eq!(harness.transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_sends_refresh_token_as_bearer() {
        let harness = Harness::new(FakeApi::default());
        let token = harness
            .gateway()
            .refresh_access_token(Some("R1"))
            .await
            .unwrap();

        assert_eq!(token, "T2");
        let calls = harness.transport.calls_to(Endpoints::REFRESH);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].bearer(), Some("R1"));
    }

    #[tokio::test]
    async fn test_refresh_rejected_by_server() {
        let harness = Harness::new(FakeApi::default());
        let result = harness
            .gateway()
            .refresh_access_token(Some("R-expired"))
            .await;

        match result {
            Err(AuthError::RefreshFailed { status, message }) => {
                assert_eq!(status, Some(401));
                assert_eq!(message, "Refresh token is invalid");
            }
            other => panic!("expected RefreshFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_login_returns_token_pair() {
        let harness = Harness::new(FakeApi::default());
        let response = harness
            .gateway()
            .login(&Credentials::new("alice", "pw"))
            .await
            .unwrap();

        assert_eq!(response.access_token, "T1");
        assert_eq!(response.refresh_token, "R1");
        let calls = harness.transport.calls_to(Endpoints::LOGIN);
        assert_eq!(calls[0].body.as_ref().unwrap()["username"], "alice");
    }

    #[tokio::test]
    async fn test_login_failure_surfaces_server_body() {
        let harness = Harness::new(FakeApi::default());
        let err = harness
            .gateway()
            .login(&Credentials::new("alice", "wrong"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(err.user_message(), "Invalid username or password");
        assert_eq!(harness.transport.calls_to(Endpoints::REFRESH).len(), 0);
    }

    #[tokio::test]
    async fn test_register_returns_message() {
        let harness = Harness::new(FakeApi::default());
        let message = harness
            .gateway()
            .register(&Credentials::new("bob", "secret1"))
            .await
            .unwrap();
        assert_eq!(message, "User 'bob' registered, please log in");
    }

    #[tokio::test]
    async fn test_register_conflict() {
        let harness = Harness::new(FakeApi::default());
        let err = harness
            .gateway()
            .register(&Credentials::new("alice", "secret1"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert_eq!(err.user_message(), "Username 'alice' is already taken");
    }
}
