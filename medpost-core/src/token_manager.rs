//! The OAuth2 token lifecycle.
//!
//! [`TokenManager`] drives the startup state machine:
//!
//! ```text
//! NO_TOKEN --(code supplied)--> AUTHORIZED
//! NO_TOKEN --(no code)--------> AWAITING_CODE   (authorization URL surfaced)
//! AUTHORIZED --(every run)----> REFRESHING --> AUTHORIZED
//! REFRESHING --(rejected)-----> NO_TOKEN        (stored bundle deleted)
//! REFRESHING --(unusable 2xx)-> NO_TOKEN        (stored bundle deleted)
//! ```
//!
//! A stored bundle is always refreshed before use instead of trusting the
//! freshness of its access token. A bundle that fails to decode, whose
//! refresh is rejected, or whose refresh answer cannot be decoded, is
//! deleted and never retried. Only transport failures keep it.

use reqwest::Method;
use url::Url;

use crate::config::Config;
use crate::gateway::{ApiError, ApiGateway, RequestBody};
use crate::oauth::{build_authorization_url, AuthorizationRequest, ClientCredentials};
use crate::store::{CredentialStore, Secret, StoredCredential};
use crate::token::{TokenBundle, TokenError, TokenResponse};

/// Token exchange endpoint, shared by both grant types.
pub const TOKEN_PATH: &str = "/v1/tokens";

/// Result of a single token exchange.
#[derive(Debug)]
pub enum ExchangeOutcome {
    /// A new bundle was issued and persisted.
    Issued(TokenBundle),

    /// The remote API refused the grant.
    Rejected(ApiError),
}

/// Why a stored bundle was thrown away.
#[derive(Debug)]
pub enum DiscardReason {
    /// The stored bundle, or the answer to its refresh, did not decode.
    Undecodable { reason: String },

    /// The remote API refused to refresh the stored bundle.
    Rejected(ApiError),
}

impl std::fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undecodable { reason } => write!(f, "token decode failure: {}", reason),
            Self::Rejected(e) => write!(f, "token refresh rejected: {}", e),
        }
    }
}

/// What was in the store before the manager fell back to authorization.
#[derive(Debug)]
pub enum PriorCredential {
    /// First run: nothing was ever stored.
    NeverExisted,

    /// A bundle existed and has been deleted.
    Discarded(DiscardReason),
}

/// Outcome of [`TokenManager::authorize`].
#[derive(Debug)]
pub enum Authorization {
    /// A fresh bundle is persisted and the gateway signs requests with it.
    Authorized(TokenBundle),

    /// The user must visit `url` and re-run with the returned code.
    NeedsAuthorization { url: Url, prior: PriorCredential },
}

/// Owner of the OAuth2 state machine for one process.
pub struct TokenManager<S: CredentialStore> {
    store: S,
    credentials: ClientCredentials,
    scopes: Vec<String>,
    authorize_url: Url,
}

impl<S: CredentialStore> TokenManager<S> {
    /// Create a manager.
    ///
    /// # Arguments
    ///
    /// * `store` - Where the token bundle is persisted
    /// * `credentials` - Registered application credentials
    /// * `scopes` - Scopes to request, in order
    /// * `authorize_url` - User-facing authorization endpoint
    pub fn new(
        store: S,
        credentials: ClientCredentials,
        scopes: Vec<String>,
        authorize_url: Url,
    ) -> Self {
        Self {
            store,
            credentials,
            scopes,
            authorize_url,
        }
    }

    /// Create a manager from loaded configuration.
    pub fn from_config(store: S, config: &Config) -> Result<Self, crate::config::ConfigError> {
        Ok(Self::new(
            store,
            config.client_credentials(),
            config.scopes(),
            config.authorize_url()?,
        ))
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// URL the user visits to authorize this application.
    pub fn authorization_url(&self) -> Url {
        let request = AuthorizationRequest::new(&self.credentials, &self.scopes);
        build_authorization_url(&self.authorize_url, &request)
    }

    /// Exchange an authorization code for a bundle.
    pub async fn exchange_authorization_code(
        &self,
        gateway: &mut ApiGateway,
        code: &str,
    ) -> Result<ExchangeOutcome, TokenError> {
        let form = vec![
            ("code".to_string(), code.to_string()),
            ("client_id".to_string(), self.credentials.client_id.clone()),
            (
                "client_secret".to_string(),
                self.credentials.client_secret.expose().to_string(),
            ),
            ("grant_type".to_string(), "authorization_code".to_string()),
            (
                "redirect_uri".to_string(),
                self.credentials.redirect_url.clone(),
            ),
        ];
        self.exchange(gateway, form, None).await
    }

    /// Exchange a refresh token for a new bundle.
    pub async fn exchange_refresh_token(
        &self,
        gateway: &mut ApiGateway,
        refresh_token: &Secret,
    ) -> Result<ExchangeOutcome, TokenError> {
        let form = vec![
            (
                "refresh_token".to_string(),
                refresh_token.expose().to_string(),
            ),
            ("client_id".to_string(), self.credentials.client_id.clone()),
            (
                "client_secret".to_string(),
                self.credentials.client_secret.expose().to_string(),
            ),
            ("grant_type".to_string(), "refresh_token".to_string()),
        ];
        self.exchange(gateway, form, Some(refresh_token)).await
    }

    async fn exchange(
        &self,
        gateway: &mut ApiGateway,
        form: Vec<(String, String)>,
        previous_refresh: Option<&Secret>,
    ) -> Result<ExchangeOutcome, TokenError> {
        let payload = match gateway
            .request(Method::POST, TOKEN_PATH, RequestBody::Form(form))
            .await
        {
            Ok(payload) => payload,
            Err(e) if e.is_rejection() => return Ok(ExchangeOutcome::Rejected(e)),
            Err(e) => return Err(TokenError::Gateway(e)),
        };

        let response: TokenResponse =
            serde_json::from_value(payload).map_err(|e| TokenError::MalformedResponse {
                message: e.to_string(),
            })?;
        let bundle = response
            .into_bundle(previous_refresh)
            .ok_or_else(|| TokenError::MalformedResponse {
                message: "missing refresh_token".to_string(),
            })?;

        self.store.save(&bundle).await?;
        gateway.set_access_token(bundle.access_token.clone());

        tracing::info!(
            "Obtained access token (expires {})",
            bundle
                .expires_at_utc()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "at an unknown time".to_string())
        );

        Ok(ExchangeOutcome::Issued(bundle))
    }

    /// Run the startup state machine.
    ///
    /// Refreshes a stored bundle, or exchanges `code` when nothing usable is
    /// stored, or returns the authorization URL when neither is possible.
    /// On `Authorized` the gateway is signing with the new access token.
    pub async fn authorize(
        &self,
        gateway: &mut ApiGateway,
        code: Option<&str>,
    ) -> Result<Authorization, TokenError> {
        let prior = match self.store.load().await? {
            StoredCredential::Present(bundle) => {
                tracing::debug!("Refreshing stored token bundle from {}", self.store.location());
                let reason = match self
                    .exchange_refresh_token(gateway, &bundle.refresh_token)
                    .await
                {
                    Ok(ExchangeOutcome::Issued(fresh)) => {
                        return Ok(Authorization::Authorized(fresh));
                    }
                    Ok(ExchangeOutcome::Rejected(e)) => DiscardReason::Rejected(e),
                    Err(TokenError::MalformedResponse { message }) => {
                        DiscardReason::Undecodable { reason: message }
                    }
                    Err(TokenError::Gateway(e)) if e.is_undecodable_success() => {
                        DiscardReason::Undecodable { reason: e.message }
                    }
                    Err(e) => return Err(e),
                };
                tracing::warn!("Token refresh failed, discarding stored bundle: {}", reason);
                self.store.delete().await?;
                PriorCredential::Discarded(reason)
            }
            StoredCredential::Corrupt { reason } => {
                tracing::warn!(
                    "Stored token bundle at {} is unreadable, discarding: {}",
                    self.store.location(),
                    reason
                );
                self.store.delete().await?;
                PriorCredential::Discarded(DiscardReason::Undecodable { reason })
            }
            StoredCredential::Missing => PriorCredential::NeverExisted,
        };

        let Some(code) = code else {
            return Ok(Authorization::NeedsAuthorization {
                url: self.authorization_url(),
                prior,
            });
        };

        match self.exchange_authorization_code(gateway, code).await? {
            ExchangeOutcome::Issued(bundle) => Ok(Authorization::Authorized(bundle)),
            ExchangeOutcome::Rejected(e) => Err(TokenError::InvalidCredentials(e)),
        }
    }
}
