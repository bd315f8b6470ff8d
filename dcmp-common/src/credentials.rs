//! Session-scoped provider credentials
//!
//! Keys live only in memory for the lifetime of the process and are keyed by
//! provider name. Writers replace the whole value (last writer wins); readers
//! take an immutable snapshot that is handed to the completion client with each
//! request, so a key change never affects a request already in flight.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Immutable provider API key
///
/// `Debug` output is redacted so keys never reach logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    /// Build a key, rejecting empty or whitespace-only input
    pub fn new(key: impl AsRef<str>) -> Option<Self> {
        let key = key.as_ref().trim();
        if key.is_empty() {
            None
        } else {
            Some(Self(Arc::from(key)))
        }
    }

    /// Take `key` exactly as given, empty or not
    pub fn from_raw(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(<redacted, {} chars>)", self.0.chars().count())
    }
}

/// In-memory credential store shared by request handlers
#[derive(Clone, Default)]
pub struct CredentialStore {
    keys: Arc<RwLock<HashMap<String, ApiKey>>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` for `provider`, replacing any previous value
    pub async fn set(&self, provider: &str, key: ApiKey) {
        self.keys.write().await.insert(provider.to_string(), key);
        tracing::debug!(provider = %provider, "Session credential updated");
    }

    /// Snapshot of the current key for `provider`
    pub async fn get(&self, provider: &str) -> Option<ApiKey> {
        self.keys.read().await.get(provider).cloned()
    }

    pub async fn contains(&self, provider: &str) -> bool {
        self.keys.read().await.contains_key(provider)
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}
