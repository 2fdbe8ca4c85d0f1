//! In-memory credential storage implementation.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CredentialStore, StoreError, StoredCredential};
use crate::token::TokenBundle;

/// In-memory credential store for testing.
///
/// Holds the raw serialized text rather than a decoded bundle, so tests can
/// seed it with corrupt contents the same way a damaged file would look.
pub struct MemoryCredentialStore {
    raw: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            raw: Mutex::new(None),
        }
    }

    /// Create a store holding `bundle`.
    pub fn with_bundle(bundle: &TokenBundle) -> Result<Self, StoreError> {
        Ok(Self::with_raw(serde_json::to_string(bundle)?))
    }

    /// Create a store holding arbitrary raw text.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    /// Whether anything is currently stored.
    pub fn is_empty(&self) -> bool {
        self.raw.lock().is_none()
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
            .field("populated", &!self.is_empty())
            .finish()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<StoredCredential, StoreError> {
        Ok(match self.raw.lock().as_deref() {
            Some(raw) => StoredCredential::decode(raw),
            None => StoredCredential::Missing,
        })
    }

    async fn save(&self, bundle: &TokenBundle) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(bundle)?;
        *self.raw.lock() = Some(raw);
        Ok(())
    }

    async fn delete(&self) -> Result<(), StoreError> {
        self.raw.lock().take();
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
