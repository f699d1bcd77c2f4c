//! Session, credential and wire payload types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Username/password pair sent to the register and login endpoints.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name
    pub username: String,
    /// Plain-text password, only ever sent in a request body
    pub password: String,
}

impl Credentials {
    /// Creates a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authenticated user record.
///
/// The login endpoint returns `{id, username, roles}` while the profile
/// endpoint returns `{username, login_time, expiration_time, token_type}`;
/// anything beyond the known fields is kept in `extra` so it survives a
/// persist/load cycle untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Server-side identifier, when the server sends one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Account name
    pub username: String,
    /// Granted roles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Any other fields the server attached to the record
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl User {
    /// Creates a user record that only knows its name.
    #[must_use]
    pub fn named(username: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            roles: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// The client-side session: tokens plus the user they belong to.
///
/// `access_token` present means the session is authenticated; `user` may
/// still be absent until the profile is fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    /// Short-lived credential attached to protected requests
    pub access_token: Option<String>,
    /// Long-lived credential used only to obtain a new access token
    pub refresh_token: Option<String>,
    /// The authenticated user, if known
    pub user: Option<User>,
}

impl Session {
    /// Returns true if an access token is held.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Returns true if no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }
}

/// Lifecycle phase of the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No credentials held.
    #[default]
    Anonymous,
    /// A login call is in flight.
    Authenticating,
    /// An access token is held.
    Authenticated,
}

impl SessionState {
    /// Get a user-friendly label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Anonymous => "not logged in",
            Self::Authenticating => "logging in",
            Self::Authenticated => "logged in",
        }
    }
}

/// Body of a successful `POST /auth/register`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Confirmation message
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of a successful `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Newly issued access token
    pub access_token: String,
    /// Newly issued refresh token
    pub refresh_token: String,
    /// Greeting from the server
    #[serde(default)]
    pub message: Option<String>,
    /// The user record, when the server includes it
    #[serde(default)]
    pub user: Option<User>,
}

/// Body of a successful `POST /auth/refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// Replacement access token
    pub access_token: String,
}

/// Structured error body returned by the API on 4xx/5xx.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Human-readable reason
    #[serde(default)]
    pub message: Option<String>,
    /// Any other fields in the error object
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ApiErrorBody {
    /// Creates a body carrying only a message.
    #[must_use]
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            extra: BTreeMap::new(),
        }
    }

    /// Parses a raw response body.
    ///
    /// JSON objects are decoded field by field; anything else is kept as
    /// the message text so the caller still sees what the server said.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Self {
        if let Ok(body) = serde_json::from_slice::<Self>(bytes) {
            return body;
        }
        let text = String::from_utf8_lossy(bytes).trim().to_string();
        Self {
            message: (!text.is_empty()).then_some(text),
            extra: BTreeMap::new(),
        }
    }
}

/// Get a preview of a token (first 8 chars + ...), safe for log output.
#[must_use]
pub fn token_preview(token: &str) -> String {
    match token.get(..8) {
        Some(head) if token.len() > 12 => format!("{head}..."),
        _ => "***".to_string(),
    }
}
