//! The identity endpoint that trades the session for a new access credential.

use async_trait::async_trait;
use thiserror::Error;

use crate::credential::AccessCredential;

/// Error returned by an [`IdentityEndpoint`].
///
/// The coordinator collapses every variant into a single "refresh failed"
/// outcome; the detail only reaches the logs.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// The endpoint could not be reached.
    #[error("identity endpoint unreachable: {message}")]
    Unreachable { message: String },

    /// The endpoint refused to issue a credential (expired or revoked session).
    #[error("identity endpoint rejected refresh with status {status}")]
    Rejected { status: u16 },

    /// The endpoint answered 2xx but without a usable token.
    #[error("malformed refresh response: {message}")]
    MalformedResponse { message: String },
}

/// Exchanges the long-lived session (carried by the transport, e.g. as a
/// cookie) for a fresh access credential.
///
/// Callers never retry this; one failure ends the refresh episode.
#[async_trait]
pub trait IdentityEndpoint: Send + Sync {
    async fn refresh(&self) -> Result<AccessCredential, IdentityError>;
}
