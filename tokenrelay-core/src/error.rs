//! Error types surfaced to callers.

use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportError;

/// Failure of a call made through the [`Coordinator`](crate::Coordinator).
///
/// Everything except a first-time credential expiry reaches the caller here,
/// with the server's status and body preserved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    /// No response at all; the user has been sent to the service-unavailable view.
    #[error("service unavailable: {message}")]
    Unreachable { message: String },

    /// A gateway reported the service behind it as down.
    #[error("upstream unavailable (status {status})")]
    UpstreamDown { status: u16, body: Value },

    /// Any other non-2xx response, including an unauthorized replay.
    #[error("request failed with status {status}")]
    Status { status: u16, body: Value },

    /// The request was refused before it left the process.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// The server answered but its body could not be read.
    #[error("unreadable response (status {status}): {message}")]
    MalformedResponse { status: u16, message: String },

    /// The credential could not be refreshed; the session is gone.
    #[error("session refresh failed: {message}")]
    RefreshFailed { message: String },

    /// The refresh this call was waiting on was cancelled before it settled.
    /// The stored credential is untouched.
    #[error("session refresh abandoned")]
    RefreshAbandoned,
}

impl RequestError {
    /// The HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::UpstreamDown { status, .. }
            | RequestError::Status { status, .. }
            | RequestError::MalformedResponse { status, .. } => Some(*status),
            RequestError::Unreachable { .. }
            | RequestError::InvalidRequest { .. }
            | RequestError::RefreshFailed { .. }
            | RequestError::RefreshAbandoned => None,
        }
    }

    /// The response body, if the server answered.
    pub fn body(&self) -> Option<&Value> {
        match self {
            RequestError::UpstreamDown { body, .. } | RequestError::Status { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }

    /// Whether the caller has been logged out by this failure.
    pub fn is_logged_out(&self) -> bool {
        matches!(self, RequestError::RefreshFailed { .. })
    }

    /// Convert a transport failure that is handed back unchanged.
    pub(crate) fn passthrough(error: TransportError) -> Self {
        match error {
            TransportError::NoResponse { message } => RequestError::Unreachable { message },
            TransportError::InvalidRequest { message } => RequestError::InvalidRequest { message },
            TransportError::MalformedResponse { status, message } => {
                RequestError::MalformedResponse { status, message }
            }
            TransportError::Status { status, body } => RequestError::Status { status, body },
        }
    }

    /// Convert a transport failure that means the service is down.
    pub(crate) fn unavailable(error: TransportError) -> Self {
        match error {
            TransportError::NoResponse { message } => RequestError::Unreachable { message },
            TransportError::Status { status, body } => RequestError::UpstreamDown { status, body },
            other => Self::passthrough(other),
        }
    }
}

/// Error building the coordinator's collaborators.
#[derive(Debug, Error)]
pub enum TokenrelayError {
    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}
