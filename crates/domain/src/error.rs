//! Authentication error taxonomy

use thiserror::Error;

use crate::auth::ApiErrorBody;

/// Errors surfaced by the auth-aware request pipeline.
///
/// Cloneable so that a single refresh outcome can be handed to every
/// request that was waiting on it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// The transport failed before any response arrived.
    #[error("network error: {message}")]
    Network {
        /// Transport-level description.
        message: String,
    },

    /// The server answered with a 4xx/5xx status.
    #[error("server error {status}: {}", .body.message.as_deref().unwrap_or("no details"))]
    Server {
        /// HTTP status code.
        status: u16,
        /// Structured error body.
        body: ApiErrorBody,
    },

    /// The access token was rejected on a request eligible for refresh.
    #[error("access token expired")]
    AuthExpired,

    /// The refresh call itself failed; the session is gone.
    #[error("token refresh failed: {message}")]
    RefreshFailed {
        /// Status returned by the refresh endpoint, if it answered.
        status: Option<u16>,
        /// What went wrong.
        message: String,
    },

    /// A refresh was needed but no refresh token is stored.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// The operation requires an authenticated session.
    #[error("not authenticated")]
    NotAuthenticated,

    /// A 2xx response body could not be decoded.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// Decoder message.
        message: String,
    },
}

impl AuthError {
    /// Creates a server error from a status and a raw body.
    #[must_use]
    pub fn server(status: u16, body: &[u8]) -> Self {
        Self::Server {
            status,
            body: ApiErrorBody::parse(body),
        }
    }

    /// Returns the HTTP status attached to this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::RefreshFailed { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns true if the server rejected the caller's credentials.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::AuthExpired | Self::Server { status: 401, .. })
    }

    /// Returns true if this error ended the session.
    #[must_use]
    pub const fn is_session_terminal(&self) -> bool {
        matches!(self, Self::RefreshFailed { .. } | Self::NoRefreshToken)
    }

    /// Message suitable for showing to the user.
    ///
    /// Prefers the server-provided text over the generic description.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Server {
                body:
                    ApiErrorBody {
                        message: Some(message),
                        ..
                    },
                ..
            } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
