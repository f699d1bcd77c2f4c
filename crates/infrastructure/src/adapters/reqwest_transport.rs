//! HTTP transport implementation using reqwest.
//!
//! This adapter implements the `HttpTransport` port. It resolves
//! endpoint paths against the configured API base URL and returns every
//! response as-is, whatever its status; status handling belongs to the
//! request pipeline.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use passage_application::ports::{HttpTransport, TransportError};
use passage_domain::{ApiRequest, ApiResponse, HttpMethod};
use reqwest::{Client, Method, Url};
use tracing::debug;

use crate::config::ClientConfig;

/// HTTP transport backed by `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Creates a transport from client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let timeout = config.request_timeout();
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self::with_client(client, &config.api_base_url, timeout))
    }

    /// Creates a transport with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Resolves an endpoint path against the base URL.
    ///
    /// The path is appended, so a base URL with a path prefix such as
    /// `/api` keeps it.
    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        let url = if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        };
        Url::parse(&url).map_err(|e| TransportError::InvalidUrl(format!("{e}: {url}")))
    }

    /// Converts domain `HttpMethod` to reqwest `Method`.
    const fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    /// Maps reqwest errors to `TransportError`.
    fn map_error(error: &reqwest::Error, timeout: Duration) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            };
        }
        if error.is_connect() {
            return TransportError::ConnectionFailed(error.to_string());
        }
        TransportError::Other(error.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(&request.path)?;
        debug!(request_id = %request.id, method = %request.method, %url, "sending request");

        let mut builder = self
            .client
            .request(Self::to_reqwest_method(request.method), url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body.as_ref().filter(|_| request.method.has_body()) {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_error(&e, self.timeout))?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("<binary>").to_string()))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Other(format!("Failed to read body: {e}")))?
            .to_vec();

        let mut api_response = ApiResponse::new(status, body);
        api_response.headers = headers;
        Ok(api_response)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn transport(base_url: &str) -> ReqwestTransport {
        ReqwestTransport::with_client(Client::new(), base_url, Duration::from_secs(1))
    }

    #[test]
    fn test_to_reqwest_method() {
        assert_eq!(
            ReqwestTransport::to_reqwest_method(HttpMethod::Get),
            Method::GET
        );
        assert_eq!(
            ReqwestTransport::to_reqwest_method(HttpMethod::Post),
            Method::POST
        );
        assert_eq!(
            ReqwestTransport::to_reqwest_method(HttpMethod::Delete),
            Method::DELETE
        );
    }

    #[test]
    fn test_url_keeps_base_path() {
        let transport = transport("http://127.0.0.1:5000/api/");
        assert_eq!(
            transport.url_for("/auth/login").unwrap().as_str(),
            "http://127.0.0.1:5000/api/auth/login"
        );
        assert_eq!(
            transport.url_for("me").unwrap().as_str(),
            "http://127.0.0.1:5000/api/me"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let transport = transport("not a url");
        assert!(matches!(
            transport.url_for("/me"),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_client_creation() {
        assert!(ReqwestTransport::new(&ClientConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_transport_error() {
        // Port 9 (discard) is not expected to be listening on loopback.
        let transport = transport("http://127.0.0.1:9");
        let result = transport.send(&ApiRequest::get("/me")).await;
        assert!(matches!(
            result,
            Err(
                TransportError::ConnectionFailed(_)
                    | TransportError::Timeout { .. }
                    | TransportError::Other(_)
            )
        ));
    }
}
