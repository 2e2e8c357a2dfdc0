//! Builds the coordinator the CLI issues its calls through.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokenrelay_core::{
    AccessCredential, Coordinator, MemoryCredentialStore, NavigationSink, RedirectTarget,
    http::http_stack,
};
use tracing::warn;

use crate::config::RelayConfig;

/// Navigation sink for a terminal: there is nowhere to navigate to, so the
/// target is logged and remembered for the exit status.
#[derive(Debug, Default)]
pub struct RedirectLog {
    last: Mutex<Option<RedirectTarget>>,
}

impl RedirectLog {
    /// The most recent redirect, if any.
    pub fn last(&self) -> Option<RedirectTarget> {
        *self.last.lock()
    }
}

impl NavigationSink for RedirectLog {
    fn redirect(&self, target: RedirectTarget) {
        warn!("redirecting to {}", target);
        *self.last.lock() = Some(target);
    }
}

/// Compose the HTTP stack, credential store and navigation sink.
///
/// `token` seeds the credential store, standing in for a credential restored
/// from earlier in the session.
pub fn build_coordinator(
    config: &RelayConfig,
    token: Option<String>,
) -> Result<(Coordinator, Arc<RedirectLog>)> {
    let (transport, identity) =
        http_stack(&config.base_url, &config.refresh_path, config.timeout())?;

    let store = match token {
        Some(token) => MemoryCredentialStore::with_credential(AccessCredential::new(token)),
        None => MemoryCredentialStore::new(),
    };
    let redirects = Arc::new(RedirectLog::default());

    let coordinator = Coordinator::builder(Arc::new(transport), Arc::new(identity))
        .credentials(Arc::new(store))
        .navigation(redirects.clone())
        .build();

    Ok((coordinator, redirects))
}
