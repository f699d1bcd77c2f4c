//! View-layer ports

use passage_domain::{Notice, Route};

/// Moves the user to another view.
pub trait Navigator: Send + Sync {
    /// Navigates to the given route.
    fn navigate(&self, route: Route);
}

/// Shows a notice to the user.
pub trait Notifier: Send + Sync {
    /// Displays the notice.
    fn notify(&self, notice: Notice);
}
