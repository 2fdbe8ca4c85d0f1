//! Credential storage.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`CredentialStore`] - Trait for token bundle storage backends
//! - [`StoredCredential`] - The outcome of reading a store
//! - [`FileCredentialStore`] - JSON file on disk, the production backend
//! - [`MemoryCredentialStore`] - In-memory implementation for testing
//!
//! A store holds at most one [`TokenBundle`]. It is either absent, fully
//! decodable, or corrupt; the last case is reported as a value so callers
//! can discard it without treating it as a hard failure.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::token::TokenBundle;

mod file;
mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the backing memory is zeroed when the secret is dropped.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for credential store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading, writing or removing the backing file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bundle could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What a store held when it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredCredential {
    /// Nothing was ever stored, or it was deleted.
    Missing,

    /// A complete, decodable bundle.
    Present(TokenBundle),

    /// Something was stored but it does not decode as a complete bundle.
    Corrupt { reason: String },
}

impl StoredCredential {
    /// Decode raw stored text into a credential outcome.
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str::<TokenBundle>(raw) {
            Ok(bundle) => Self::Present(bundle),
            Err(e) => Self::Corrupt {
                reason: e.to_string(),
            },
        }
    }
}

/// Abstraction over token bundle storage backends.
///
/// Bundles are only ever replaced wholesale; there is no partial update.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the stored bundle.
    ///
    /// Absence and corruption are both `Ok`; only backend failures are `Err`.
    async fn load(&self) -> Result<StoredCredential, StoreError>;

    /// Replace the stored bundle.
    async fn save(&self, bundle: &TokenBundle) -> Result<(), StoreError>;

    /// Remove the stored bundle.
    ///
    /// Returns `Ok(())` even if nothing was stored.
    async fn delete(&self) -> Result<(), StoreError>;

    /// Human-readable location used in diagnostics.
    fn location(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new("super-secret");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_secret_display_redacted() {
        let secret = Secret::new("super-secret");
        let display = format!("{}", secret);
        assert!(!display.contains("super-secret"));
        assert!(display.contains("REDACTED"));
    }

    #[test]
    fn test_secret_serializes_transparently() {
        let json = serde_json::to_string(&Secret::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn test_decode_partial_bundle_is_corrupt() {
        let raw = r#"{"access_token": "a", "token_type": "Bearer"}"#;
        assert!(matches!(
            StoredCredential::decode(raw),
            StoredCredential::Corrupt { .. }
        ));
    }

    #[test]
    fn test_decode_garbage_is_corrupt() {
        assert!(matches!(
            StoredCredential::decode("not json {"),
            StoredCredential::Corrupt { .. }
        ));
    }
}
