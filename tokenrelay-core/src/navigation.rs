//! Navigation sink for unrecoverable failures.

use std::fmt;

/// Where the user should be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedirectTarget {
    /// The API or its gateway is down.
    ServiceUnavailable,
    /// The session is gone and a new login is required.
    LoggedOut,
}

impl RedirectTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectTarget::ServiceUnavailable => "service-unavailable",
            RedirectTarget::LoggedOut => "logged-out",
        }
    }
}

impl fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fire-and-forget redirect callback.
pub trait NavigationSink: Send + Sync {
    fn redirect(&self, target: RedirectTarget);
}

/// A sink that ignores every redirect.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigation;

impl NavigationSink for NoopNavigation {
    fn redirect(&self, target: RedirectTarget) {
        tracing::debug!("dropping redirect to {}", target);
    }
}
