//! The underlying HTTP transport the coordinator wraps.

use async_trait::async_trait;
use thiserror::Error;

use crate::request::{ApiRequest, ApiResponse};

/// Failure reported by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// No response arrived at all (connection refused, DNS, TLS, timeout).
    #[error("no response: {message}")]
    NoResponse { message: String },

    /// The request was refused before sending, e.g. a path outside the API.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// The server answered but its body could not be read.
    #[error("unreadable response body (status {status}): {message}")]
    MalformedResponse { status: u16, message: String },

    /// The server answered with a non-2xx status.
    #[error("request failed with status {status}")]
    Status {
        status: u16,
        body: serde_json::Value,
    },
}

impl TransportError {
    /// The HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::NoResponse { .. } | TransportError::InvalidRequest { .. } => None,
            TransportError::MalformedResponse { status, .. }
            | TransportError::Status { status, .. } => Some(*status),
        }
    }
}

/// An HTTP-like client: verbs over paths, returning a 2xx response or a
/// [`TransportError`].
///
/// Implementations send the request exactly as given. Credential handling is
/// the coordinator's job.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}
