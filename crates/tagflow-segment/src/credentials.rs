//! Per-owner API credential resolution.
//!
//! Each owner scope authenticates to the remote service with its own token.
//! A missing credential is a configuration problem, not an execution
//! failure: callers skip work for that scope instead of failing jobs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tagflow_core::OwnerId;

/// API credentials for one owner scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Bearer token presented to the remote service.
    pub api_token: String,
}

impl Credentials {
    /// Create credentials from a token.
    #[must_use]
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
        }
    }
}

/// Source of per-owner credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up the credentials for an owner, if any are configured.
    async fn get(&self, owner: &OwnerId) -> Option<Credentials>;
}

/// In-memory credential store backed by a map.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    entries: Mutex<HashMap<OwnerId, Credentials>>,
}

impl InMemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the credentials for an owner.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    pub fn insert(&self, owner: OwnerId, credentials: Credentials) {
        self.entries
            .lock()
            .expect("credential store lock poisoned")
            .insert(owner, credentials);
    }

    /// Remove the credentials for an owner.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    pub fn remove(&self, owner: &OwnerId) {
        self.entries
            .lock()
            .expect("credential store lock poisoned")
            .remove(owner);
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, owner: &OwnerId) -> Option<Credentials> {
        self.entries
            .lock()
            .expect("credential store lock poisoned")
            .get(owner)
            .cloned()
    }
}
