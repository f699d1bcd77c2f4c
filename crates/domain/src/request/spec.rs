//! API request specification

use std::collections::BTreeMap;

use crate::id::generate_id_v7;
use crate::request::HttpMethod;

/// Header carrying the bearer credential.
pub const AUTHORIZATION: &str = "Authorization";

/// Paths of the remote auth API, relative to the configured base URL.
#[derive(Debug, Clone, Copy)]
pub struct Endpoints;

impl Endpoints {
    /// `POST {username,password}` -> `{message}`
    pub const REGISTER: &'static str = "/auth/register";
    /// `POST {username,password}` -> `{access_token, refresh_token, message?, user?}`
    pub const LOGIN: &'static str = "/auth/login";
    /// `DELETE`, bearer access token
    pub const LOGOUT: &'static str = "/auth/logout";
    /// `POST`, bearer refresh token -> `{access_token}`
    pub const REFRESH: &'static str = "/auth/refresh";
    /// `GET`, bearer access token -> user record
    pub const PROFILE: &'static str = "/me";
}

/// A request captured by the pipeline.
///
/// The value is kept intact across a refresh so it can be replayed with
/// a new bearer token; `retried` is set once it has been through the
/// refresh protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Correlation id for log output
    pub id: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Path relative to the API base URL
    pub path: String,
    /// Explicit headers
    pub headers: BTreeMap<String, String>,
    /// JSON body
    pub body: Option<serde_json::Value>,
    /// Whether this request already went through a refresh
    pub retried: bool,
    /// Sent without the stored access token (credential exchanges)
    pub anonymous: bool,
}

impl ApiRequest {
    /// Creates a request with no headers or body.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            id: generate_id_v7(),
            method,
            path: path.into(),
            headers: BTreeMap::new(),
            body: None,
            retried: false,
            anonymous: false,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Creates a POST request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Creates a DELETE request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sends the request without the stored access token.
    ///
    /// A 401 on such a request means bad credentials, not an expired
    /// session, so it never triggers a refresh.
    #[must_use]
    pub const fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    /// Sets a header, replacing any previous value.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Attaches a bearer credential.
    #[must_use]
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header(AUTHORIZATION, format!("Bearer {token}"))
    }

    /// Returns the bearer token attached to this request, if any.
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|value| value.strip_prefix("Bearer "))
    }

    /// Returns true if this is a call to the refresh endpoint.
    ///
    /// Such calls are never fed back into the refresh protocol.
    #[must_use]
    pub fn is_refresh_call(&self) -> bool {
        self.path.contains(Endpoints::REFRESH)
    }

    /// Marks the request as having been through a refresh.
    pub const fn mark_retried(&mut self) {
        self.retried = true;
    }
}
