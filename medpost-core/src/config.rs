//! Configuration handling.
//!
//! The configuration is a TOML file with a single `[medium]` table holding
//! the registered application's credentials plus optional overrides.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::gateway::DEFAULT_API_BASE;
use crate::oauth::{ClientCredentials, DEFAULT_AUTHORIZE_URL, DEFAULT_SCOPES};
use crate::store::Secret;

/// Example printed when the configuration is missing or incomplete.
pub const CONFIG_EXAMPLE: &str = r#"
# Config file example
[medium]
client_id = "supplied_when_registering_app"
client_secret = "supplied_when_registering_app"
redirect_url = "http://192.0.2.1/must_match_registered_url"
state = "canBeAnything"
"#;

/// Default document compiler program.
pub const DEFAULT_COMPILER: &str = "rst2s5";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration file at the expected location.
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or lacks a required key.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is present but unusable.
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    /// Platform directories could not be determined.
    #[error("configuration directory not available")]
    DirUnavailable,
}

#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    medium: MediumSection,
}

#[derive(Debug, Clone, Deserialize)]
struct MediumSection {
    client_id: String,
    client_secret: Secret,
    redirect_url: String,
    state: String,
    #[serde(default)]
    scopes: Option<Vec<String>>,
    #[serde(default)]
    api_base: Option<String>,
    #[serde(default)]
    authorize_url: Option<String>,
    #[serde(default)]
    credentials_path: Option<PathBuf>,
    #[serde(default)]
    compiler: Option<String>,
}

/// Loaded configuration. Immutable after load.
#[derive(Debug, Clone)]
pub struct Config {
    medium: MediumSection,

    /// Path the configuration was loaded from.
    pub config_path: PathBuf,
}

impl Config {
    /// Default configuration file location.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = project_dirs().ok_or(ConfigError::DirUnavailable)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(&Self::default_path()?)
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let mut config = Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.config_path = path.to_path_buf();

        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration text.
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(contents)?;
        Ok(Self {
            medium: file.medium,
            config_path: PathBuf::new(),
        })
    }

    /// Application credentials.
    pub fn client_credentials(&self) -> ClientCredentials {
        ClientCredentials {
            client_id: self.medium.client_id.clone(),
            client_secret: self.medium.client_secret.clone(),
            redirect_url: self.medium.redirect_url.clone(),
            state: self.medium.state.clone(),
        }
    }

    /// Scopes requested during authorization, in configured order.
    pub fn scopes(&self) -> Vec<String> {
        match &self.medium.scopes {
            Some(scopes) => scopes.clone(),
            None => DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Root of the REST API.
    pub fn api_base(&self) -> Result<Url, ConfigError> {
        parse_url(
            "api_base",
            self.medium.api_base.as_deref().unwrap_or(DEFAULT_API_BASE),
        )
    }

    /// User-facing authorization endpoint.
    pub fn authorize_url(&self) -> Result<Url, ConfigError> {
        parse_url(
            "authorize_url",
            self.medium
                .authorize_url
                .as_deref()
                .unwrap_or(DEFAULT_AUTHORIZE_URL),
        )
    }

    /// Where the token bundle is persisted.
    pub fn credentials_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.medium.credentials_path {
            return Ok(path.clone());
        }
        let dirs = project_dirs().ok_or(ConfigError::DirUnavailable)?;
        Ok(dirs.data_dir().join("bearer.json"))
    }

    /// Program used to compile reStructuredText to HTML.
    pub fn compiler(&self) -> &str {
        self.medium.compiler.as_deref().unwrap_or(DEFAULT_COMPILER)
    }
}

fn parse_url(key: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::Invalid {
        key,
        message: format!("{}: {}", value, e),
    })
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "medpost", "medpost")
}
