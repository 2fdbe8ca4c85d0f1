//! Top-level error types for medpost.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::document::DocumentError;
use crate::gateway::ApiError;
use crate::store::StoreError;
use crate::token::TokenError;

/// Top-level error type encompassing all medpost errors.
#[derive(Debug, Error)]
pub enum MedpostError {
    /// Error from the credential store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error from token exchanges.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// The remote API rejected a request.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Error loading or rendering a document.
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error on a local file outside the credential store.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Caller supplied input the remote API would refuse.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}
