//! The request coordinator.
//!
//! [`Coordinator`] wraps a [`Transport`] and gives every call the same auth
//! behavior:
//!
//! - the stored credential is attached unless the call opts out
//! - a missing response or a gateway failure sends the user to the
//!   service-unavailable view
//! - the first unauthorized response triggers one shared refresh, after
//!   which the call is replayed once with the new credential
//! - a failed refresh clears the credential and logs the user out
//!
//! # Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "http")]
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokenrelay_core::{Coordinator, http::http_stack};
//!
//! let (transport, identity) =
//!     http_stack("https://api.example.com/", "auth/refresh", Duration::from_secs(30))?;
//! let coordinator = Coordinator::builder(Arc::new(transport), Arc::new(identity)).build();
//!
//! coordinator.restore_session().await;
//! let feed = coordinator.get("feed").await?;
//! println!("{}", feed.body);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::classify::{FailureClass, classify};
use crate::credential::{AccessCredential, CredentialStore, MemoryCredentialStore};
use crate::error::RequestError;
use crate::identity::IdentityEndpoint;
use crate::navigation::{NavigationSink, NoopNavigation, RedirectTarget};
use crate::refresh::{LeaderTicket, RefreshCoordinator, RefreshFailure, RefreshOutcome, Role};
use crate::request::{AUTHORIZATION, ApiRequest, ApiResponse, RequestContext};
use crate::transport::Transport;

/// Message every caller sees when the session could not be refreshed.
///
/// The identity endpoint's own error only goes to the log.
const SESSION_LOST: &str = "session expired, log in again";

/// Result of boot-time session recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// A credential is stored and calls will be authenticated.
    Authenticated,
    /// No session could be recovered; calls go out anonymously.
    Anonymous,
}

impl SessionStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated)
    }
}

/// Authenticated request coordinator.
///
/// Construct one at startup and share it (e.g. behind an `Arc`) with
/// everything that issues API calls. Each instance owns its own refresh
/// state, so separate instances never coordinate with each other.
pub struct Coordinator {
    transport: Arc<dyn Transport>,
    identity: Arc<dyn IdentityEndpoint>,
    credentials: Arc<dyn CredentialStore>,
    navigation: Arc<dyn NavigationSink>,
    refresh: RefreshCoordinator,
}

impl Coordinator {
    /// Start building a coordinator around a transport and identity endpoint.
    pub fn builder(
        transport: Arc<dyn Transport>,
        identity: Arc<dyn IdentityEndpoint>,
    ) -> CoordinatorBuilder {
        CoordinatorBuilder::new(transport, identity)
    }

    /// Issue a call with the default context: authenticated, not a retry.
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse, RequestError> {
        self.request_with(request, RequestContext::default()).await
    }

    /// Issue a call with an explicit context.
    pub async fn request_with(
        &self,
        request: ApiRequest,
        ctx: RequestContext,
    ) -> Result<ApiResponse, RequestError> {
        let mut ctx = ctx;
        let mut outbound = self.decorate(&request, &ctx);

        loop {
            let failure = match self.transport.send(&outbound).await {
                Ok(response) => return Ok(response),
                Err(failure) => failure,
            };

            match classify(&failure, &ctx) {
                FailureClass::Unreachable | FailureClass::UpstreamDown => {
                    warn!(
                        method = %request.method,
                        path = %request.path,
                        error = %failure,
                        "service unavailable"
                    );
                    self.navigation.redirect(RedirectTarget::ServiceUnavailable);
                    return Err(RequestError::unavailable(failure));
                }
                FailureClass::CredentialExpired => {
                    debug!(
                        method = %request.method,
                        path = %request.path,
                        "credential rejected, refreshing"
                    );
                    let credential = self.refresh_credential().await?;
                    ctx = ctx.retried();
                    outbound = request
                        .clone()
                        .with_header(AUTHORIZATION, credential.bearer());
                }
                FailureClass::Passthrough => return Err(RequestError::passthrough(failure)),
            }
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, RequestError> {
        self.request(ApiRequest::get(path)).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, RequestError> {
        self.request(ApiRequest::post(path).with_body(body)).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, RequestError> {
        self.request(ApiRequest::put(path).with_body(body)).await
    }

    pub async fn patch(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, RequestError> {
        self.request(ApiRequest::patch(path).with_body(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, RequestError> {
        self.request(ApiRequest::delete(path)).await
    }

    /// Try to recover a session on cold start.
    ///
    /// A stored credential short-circuits with no network call. Otherwise the
    /// identity endpoint is asked once, outside the single-flight machinery.
    /// Failure leaves the caller anonymous and never redirects: not being
    /// logged in at startup is a normal state.
    pub async fn restore_session(&self) -> SessionStatus {
        if self.credentials.is_present() {
            debug!("credential already present, skipping session restore");
            return SessionStatus::Authenticated;
        }

        match self.identity.refresh().await {
            Ok(credential) => {
                self.credentials.set(Some(credential));
                info!("session restored");
                SessionStatus::Authenticated
            }
            Err(e) => {
                self.credentials.set(None);
                info!(error = %e, "no session to restore, continuing anonymously");
                SessionStatus::Anonymous
            }
        }
    }

    /// Store a credential obtained from a login call.
    pub fn login(&self, credential: AccessCredential) {
        self.credentials.set(Some(credential));
        info!("logged in");
    }

    /// Forget the current credential.
    pub fn logout(&self) {
        self.credentials.set(None);
        info!("logged out");
    }

    /// The credential currently attached to calls.
    pub fn credential(&self) -> Option<AccessCredential> {
        self.credentials.get()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh.is_refreshing()
    }

    pub fn pending_waiters(&self) -> usize {
        self.refresh.pending_waiters()
    }

    /// Number of refresh episodes started by this coordinator.
    pub fn refresh_episodes(&self) -> u64 {
        self.refresh.episodes()
    }

    fn decorate(&self, request: &ApiRequest, ctx: &RequestContext) -> ApiRequest {
        if ctx.skip_auth {
            return request.clone();
        }

        match self.credentials.get() {
            Some(credential) => request
                .clone()
                .with_header(AUTHORIZATION, credential.bearer()),
            None => request.clone(),
        }
    }

    /// Join the current refresh episode, leading it if none is in flight.
    async fn refresh_credential(&self) -> Result<AccessCredential, RequestError> {
        let outcome = match self.refresh.join() {
            Role::Leader(ticket) => self.lead_refresh(ticket).await,
            Role::Waiter(waiter) => waiter.wait().await,
        };

        outcome.map_err(|failure| match failure {
            RefreshFailure::Failed { message } => RequestError::RefreshFailed { message },
            RefreshFailure::Abandoned => RequestError::RefreshAbandoned,
        })
    }

    async fn lead_refresh(&self, ticket: LeaderTicket<'_>) -> RefreshOutcome {
        let episode = ticket.episode();

        match self.identity.refresh().await {
            Ok(credential) => {
                self.credentials.set(Some(credential.clone()));
                let released = ticket.settle(Ok(credential.clone()));
                info!(episode, released, "access credential refreshed");
                Ok(credential)
            }
            Err(e) => {
                error!(episode, error = %e, "credential refresh failed, logging out");
                let failure = RefreshFailure::new(SESSION_LOST);
                self.credentials.set(None);
                let released = ticket.settle(Err(failure.clone()));
                debug!(episode, released, "rejected queued callers");
                self.navigation.redirect(RedirectTarget::LoggedOut);
                Err(failure)
            }
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("authenticated", &self.credentials.is_present())
            .field("refresh", &self.refresh)
            .finish()
    }
}

/// Builder for a [`Coordinator`].
///
/// Defaults to an empty [`MemoryCredentialStore`] and a navigation sink that
/// ignores redirects.
pub struct CoordinatorBuilder {
    transport: Arc<dyn Transport>,
    identity: Arc<dyn IdentityEndpoint>,
    credentials: Arc<dyn CredentialStore>,
    navigation: Arc<dyn NavigationSink>,
}

impl CoordinatorBuilder {
    pub fn new(transport: Arc<dyn Transport>, identity: Arc<dyn IdentityEndpoint>) -> Self {
        Self {
            transport,
            identity,
            credentials: Arc::new(MemoryCredentialStore::new()),
            navigation: Arc::new(NoopNavigation),
        }
    }

    /// Use a specific credential store.
    pub fn credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = store;
        self
    }

    /// Use a specific navigation sink.
    pub fn navigation(mut self, sink: Arc<dyn NavigationSink>) -> Self {
        self.navigation = sink;
        self
    }

    pub fn build(self) -> Coordinator {
        Coordinator {
            transport: self.transport,
            identity: self.identity,
            credentials: self.credentials,
            navigation: self.navigation,
            refresh: RefreshCoordinator::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityError;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    /// Records every request and answers 200 with the request's auth header.
    #[derive(Default)]
    struct EchoTransport {
        seen: Mutex<Vec<ApiRequest>>,
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
            self.seen.lock().push(request.clone());
            let auth = request
                .header(AUTHORIZATION)
                .map(|v| Value::String(v.to_string()))
                .unwrap_or(Value::Null);
            Ok(ApiResponse::new(200, json!({ "auth": auth })))
        }
    }

    struct RefusingIdentity;

    #[async_trait]
    impl IdentityEndpoint for RefusingIdentity {
        async fn refresh(&self) -> Result<AccessCredential, IdentityError> {
            Err(IdentityError::Rejected { status: 401 })
        }
    }

    fn coordinator(transport: Arc<EchoTransport>) -> Coordinator {
        Coordinator::builder(transport, Arc::new(RefusingIdentity)).build()
    }

    #[tokio::test]
    async fn test_decorates_with_stored_credential() {
        let transport = Arc::new(EchoTransport::default());
        let coordinator = coordinator(transport.clone());
        coordinator.login(AccessCredential::new("t1"));

        let response = coordinator.get("feed").await.unwrap();
        assert_eq!(response.body, json!({ "auth": "Bearer t1" }));
    }

    #[tokio::test]
    async fn test_anonymous_call_without_credential() {
        let transport = Arc::new(EchoTransport::default());
        let coordinator = coordinator(transport.clone());

        let response = coordinator.get("public/listings").await.unwrap();
        assert_eq!(response.body, json!({ "auth": null }));
    }

    #[tokio::test]
    async fn test_skip_auth_opts_out() {
        let transport = Arc::new(EchoTransport::default());
        let coordinator = coordinator(transport.clone());
        coordinator.login(AccessCredential::new("t1"));

        coordinator
            .request_with(ApiRequest::post("auth/login"), RequestContext::anonymous())
            .await
            .unwrap();

        let seen = transport.seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].header(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_credential() {
        let transport = Arc::new(EchoTransport::default());
        let coordinator = coordinator(transport);
        coordinator.login(AccessCredential::new("t1"));
        assert!(coordinator.credential().is_some());

        coordinator.logout();
        assert!(coordinator.credential().is_none());
    }

    #[tokio::test]
    async fn test_restore_session_failure_is_anonymous() {
        let transport = Arc::new(EchoTransport::default());
        let coordinator = coordinator(transport);

        assert_eq!(coordinator.restore_session().await, SessionStatus::Anonymous);
        assert!(coordinator.credential().is_none());
        assert_eq!(coordinator.refresh_episodes(), 0);
    }

    #[tokio::test]
    async fn test_verbs_carry_body() {
        let transport = Arc::new(EchoTransport::default());
        let coordinator = coordinator(transport.clone());

        coordinator
            .patch("bookings/3", json!({ "status": "confirmed" }))
            .await
            .unwrap();

        let seen = transport.seen.lock();
        assert_eq!(seen[0].method, crate::request::Method::Patch);
        assert_eq!(seen[0].body, Some(json!({ "status": "confirmed" })));
    }
}
