//! # medpost core
//!
//! Core library for posting local documents to Medium.
//!
//! This crate provides:
//! - A persisted OAuth2 token bundle and the stores that hold it
//! - The token manager driving authorization-code and refresh-token exchanges
//! - An authenticated API gateway with uniform response classification
//! - The reStructuredText preprocessing pipeline and document compiler seam
//! - The post composer that builds create-post requests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use medpost_core::{ApiGateway, Authorization, Config, FileCredentialStore, MediumClient, TokenManager};
//!
//! async fn whoami(config: &Config) -> Result<serde_json::Value, medpost_core::MedpostError> {
//!     let mut gateway = ApiGateway::new(config.api_base()?);
//!     let store = FileCredentialStore::new(config.credentials_path()?);
//!     let manager = TokenManager::from_config(store, config)?;
//!
//!     match manager.authorize(&mut gateway, None).await? {
//!         Authorization::Authorized(_) => {}
//!         Authorization::NeedsAuthorization { url, .. } => {
//!             println!("visit {url}");
//!             return Ok(serde_json::Value::Null);
//!         }
//!     }
//!
//!     let client = MediumClient::new(gateway);
//!     Ok(client.current_user().await?.clone())
//! }
//! ```

pub mod client;
pub mod compose;
pub mod config;
pub mod document;
pub mod error;
pub mod gateway;
pub mod oauth;
pub mod preprocess;
pub mod store;
pub mod token;
pub mod token_manager;

pub use client::{image_content_type, MediumClient};

pub use compose::{
    compose_post,
    default_title,
    publish_document,
    ContentFormat,
    License,
    PostOptions,
    PostRequest,
    PostTarget,
    PublishStatus,
    MAX_TAGS,
};

pub use config::{Config, ConfigError, CONFIG_EXAMPLE};

pub use document::{
    Document,
    DocumentError,
    DocumentFormat,
    RenderArtifacts,
    RenderOptions,
    RenderedDocument,
};

pub use error::MedpostError;

pub use gateway::{ApiError, ApiGateway, RequestBody};

pub use oauth::{build_authorization_url, AuthorizationRequest, ClientCredentials};

pub use preprocess::{
    compiler::{DocumentCompiler, DocutilsCompiler, ExternalToolError},
    LinePipeline,
    LineRule,
};

pub use store::{
    CredentialStore,
    FileCredentialStore,
    MemoryCredentialStore,
    Secret,
    StoreError,
    StoredCredential,
};

pub use token::{TokenBundle, TokenError};

pub use token_manager::{
    Authorization,
    DiscardReason,
    ExchangeOutcome,
    PriorCredential,
    TokenManager,
};
