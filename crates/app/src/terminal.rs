//! Terminal stand-ins for the view layer.

use passage_application::{Navigator, Notifier};
use passage_domain::{Notice, NoticeLevel, Route};

/// Reports navigation on stderr; the next command picks up from there.
#[derive(Debug, Clone, Copy)]
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: Route) {
        eprintln!("-> {route}");
    }
}

/// Prints notices on stderr.
#[derive(Debug, Clone, Copy)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => eprintln!("{}", notice.message),
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
        }
    }
}
