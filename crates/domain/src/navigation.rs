//! Navigation targets, route protection and user-facing notices
//!
//! The view layer is external; the client only needs to say "go to the
//! login view" or "go to the profile view". The guard mirrors the
//! route meta rules: guest-only views bounce authenticated users to the
//! profile, protected views bounce anonymous users to login while
//! remembering where they were headed.

use std::fmt;

/// A navigable view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Account creation view.
    Register,
    /// Login view.
    Login {
        /// Path to continue to after a successful login.
        redirect: Option<String>,
    },
    /// Profile view (requires authentication).
    Profile,
}

/// Who may visit a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// Only anonymous users.
    GuestOnly,
    /// Only authenticated users.
    RequiresAuth,
}

impl Route {
    /// Login view without a remembered destination.
    #[must_use]
    pub const fn login() -> Self {
        Self::Login { redirect: None }
    }

    /// Returns the path of this route.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Register => "/register",
            Self::Login { .. } => "/login",
            Self::Profile => "/profile",
        }
    }

    /// Returns the access rule of this route.
    #[must_use]
    pub const fn access(&self) -> RouteAccess {
        match self {
            Self::Register | Self::Login { .. } => RouteAccess::GuestOnly,
            Self::Profile => RouteAccess::RequiresAuth,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login {
                redirect: Some(redirect),
            } => write!(f, "/login?redirect={redirect}"),
            other => f.write_str(other.path()),
        }
    }
}

/// Outcome of a route guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Continue to the requested route.
    Proceed(Route),
    /// Go somewhere else instead.
    Redirect(Route),
}

impl Navigation {
    /// The route that will actually be shown.
    #[must_use]
    pub const fn destination(&self) -> &Route {
        match self {
            Self::Proceed(route) | Self::Redirect(route) => route,
        }
    }
}

/// Decides where a navigation to `target` ends up.
#[must_use]
pub fn guard(target: Route, authenticated: bool) -> Navigation {
    match (target.access(), authenticated) {
        (RouteAccess::RequiresAuth, false) => Navigation::Redirect(Route::Login {
            redirect: Some(target.path().to_string()),
        }),
        (RouteAccess::GuestOnly, true) => Navigation::Redirect(Route::Profile),
        _ => Navigation::Proceed(target),
    }
}

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Something failed.
    Error,
}

/// A message meant for the user rather than the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Text to display
    pub message: String,
}

impl Notice {
    /// Creates an error notice.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// Creates an informational notice.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// Shown when the session is forcibly ended after a failed refresh.
    #[must_use]
    pub fn session_expired() -> Self {
        Self::error("Your session has expired, please log in again")
    }
}
