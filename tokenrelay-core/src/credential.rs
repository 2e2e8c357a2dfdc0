//! Access credential storage.
//!
//! This module provides:
//! - [`AccessCredential`] - An opaque short-lived token that never shows up in logs
//! - [`CredentialStore`] - Trait for the holder of the current credential
//! - [`MemoryCredentialStore`] - Process-scoped implementation
//!
//! The coordinator only ever asks whether a credential is present and copies
//! it into an `Authorization` header. It never looks inside the token.

use parking_lot::RwLock;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A short-lived access credential.
///
/// The inner value is only accessible via [`expose()`](AccessCredential::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the buffer is wiped when the last copy is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessCredential(String);

impl AccessCredential {
    /// Wrap a raw token string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the token value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessCredential([REDACTED])")
    }
}

impl std::fmt::Display for AccessCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for AccessCredential {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for AccessCredential {}

/// Holder of the current access credential.
///
/// Both methods are synchronous: the coordinator calls them from inside the
/// sections that must not yield, so a backend that needs I/O has to cache.
pub trait CredentialStore: Send + Sync {
    /// The current credential, or `None` when the caller is anonymous.
    fn get(&self) -> Option<AccessCredential>;

    /// Replace the current credential. `None` clears it.
    fn set(&self, credential: Option<AccessCredential>);

    /// Check for a credential without cloning it out.
    fn is_present(&self) -> bool {
        self.get().is_some()
    }
}

/// In-memory credential store.
///
/// Holds at most one credential for the lifetime of the process; nothing is
/// persisted.
pub struct MemoryCredentialStore {
    current: RwLock<Option<AccessCredential>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Create a store that already holds a credential, e.g. one restored
    /// from the environment at startup.
    pub fn with_credential(credential: AccessCredential) -> Self {
        Self {
            current: RwLock::new(Some(credential)),
        }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCredentialStore")
            .field("present", &self.current.read().is_some())
            .finish()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<AccessCredential> {
        self.current.read().clone()
    }

    fn set(&self, credential: Option<AccessCredential>) {
        *self.current.write() = credential;
    }
}
