//! The persisted OAuth token bundle.
//!
//! This module provides:
//! - [`TokenBundle`] - Access and refresh tokens as issued by `/v1/tokens`
//! - [`TokenError`] - Failures while obtaining a bundle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::ApiError;
use crate::store::{Secret, StoreError};

/// Error type for token operations.
///
/// A remote rejection of an exchange is not an error here; it is reported
/// as [`ExchangeOutcome::Rejected`](crate::token_manager::ExchangeOutcome)
/// so the caller decides whether to discard the stored bundle.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Storage error while persisting or discarding a bundle.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The token endpoint could not be reached or answered with an unreadable body.
    #[error("token exchange failed: {0}")]
    Gateway(ApiError),

    /// The token endpoint answered 2xx but the payload is not a token bundle.
    #[error("token endpoint returned an incomplete bundle: {message}")]
    MalformedResponse { message: String },

    /// The remote API refused the supplied authorization code.
    #[error("authorization code rejected: {0}")]
    InvalidCredentials(ApiError),

    /// A configured URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// The complete set of tokens issued for the authenticated user.
///
/// Field names match the remote API so the persisted file is exactly what
/// the token endpoint returned. Every field is required when decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    /// Short-lived bearer token.
    pub access_token: Secret,

    /// Long-lived token used to obtain new access tokens.
    pub refresh_token: Secret,

    /// Token type, `Bearer` in practice.
    pub token_type: String,

    /// Expiry of the access token, in milliseconds since the Unix epoch.
    pub expires_at: i64,

    /// Scopes granted to this bundle.
    pub scope: Vec<String>,
}

impl TokenBundle {
    /// Expiry of the access token as a timestamp.
    ///
    /// Returns `None` if the stored value is out of range.
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires_at)
    }
}

/// Body of a token endpoint response.
///
/// A refresh grant may omit the refresh token, in which case the one used
/// for the exchange stays valid.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: Secret,
    #[serde(default)]
    pub refresh_token: Option<Secret>,
    pub token_type: String,
    pub expires_at: i64,
    #[serde(default)]
    pub scope: Vec<String>,
}

impl TokenResponse {
    /// Build a full bundle, falling back to `previous_refresh` when the
    /// response carries no refresh token.
    pub fn into_bundle(self, previous_refresh: Option<&Secret>) -> Option<TokenBundle> {
        let refresh_token = self.refresh_token.or_else(|| previous_refresh.cloned())?;
        Some(TokenBundle {
            access_token: self.access_token,
            refresh_token,
            token_type: self.token_type,
            expires_at: self.expires_at,
            scope: self.scope,
        })
    }
}
