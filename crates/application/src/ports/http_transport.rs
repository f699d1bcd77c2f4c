//! HTTP transport port

use async_trait::async_trait;
use passage_domain::{ApiRequest, ApiResponse, AuthError};

/// Errors raised when no response could be obtained.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete in time.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The target URL could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

impl From<TransportError> for AuthError {
    fn from(error: TransportError) -> Self {
        Self::Network {
            message: error.to_string(),
        }
    }
}

/// Port for sending requests to the auth API.
///
/// Implementations return every response the server produced, whatever
/// its status; only failures to get a response at all are errors.
/// Timeouts are the implementation's concern.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends the request exactly as given.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if no response was received.
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}
