//! # Tokenrelay Core
//!
//! Authenticated request coordination for API clients.
//!
//! This crate provides:
//! - [`Coordinator`] - Wraps a transport, attaches the access credential to
//!   every call and recovers transparently from credential expiry
//! - A single-flight refresh so concurrent expiries cost one refresh call
//! - Narrow traits for the collaborators: [`Transport`], [`IdentityEndpoint`],
//!   [`CredentialStore`] and [`NavigationSink`]
//! - (with the `http` feature) a `reqwest` transport and identity endpoint
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tokenrelay_core::{Coordinator, RequestError};
//!
//! async fn load_feed(coordinator: &Coordinator) -> Result<serde_json::Value, RequestError> {
//!     let response = coordinator.get("feed").await?;
//!     Ok(response.body)
//! }
//! ```

pub mod classify;
pub mod coordinator;
pub mod credential;
pub mod error;
pub mod identity;
pub mod navigation;
pub mod refresh;
pub mod request;
pub mod transport;

#[cfg(feature = "http")]
pub mod http;

// Re-export commonly used types at crate root
pub use coordinator::{
    Coordinator,
    CoordinatorBuilder,
    SessionStatus,
};

pub use credential::{
    AccessCredential,
    CredentialStore,
    MemoryCredentialStore,
};

pub use error::{
    RequestError,
    TokenrelayError,
};

pub use identity::{
    IdentityEndpoint,
    IdentityError,
};

pub use navigation::{
    NavigationSink,
    NoopNavigation,
    RedirectTarget,
};

pub use request::{
    ApiRequest,
    ApiResponse,
    Method,
    RequestContext,
};

pub use transport::{
    Transport,
    TransportError,
};

#[cfg(feature = "http")]
pub use http::{
    HttpIdentityEndpoint,
    HttpTransport,
    http_stack,
};
