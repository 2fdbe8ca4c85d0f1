//! Authenticated HTTP execution against the Medium API.
//!
//! Every call goes through [`ApiGateway::request`], which signs the request
//! with the current bearer token and classifies the response the same way
//! for every endpoint: 2xx bodies are unwrapped from their `data` envelope,
//! anything else becomes an [`ApiError`]. Nothing is retried.

use reqwest::header::{ACCEPT, ACCEPT_CHARSET};
use reqwest::{multipart, Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::store::Secret;

/// Production API root.
pub const DEFAULT_API_BASE: &str = "https://api.medium.com";

/// Error returned by the remote API, or synthesized when a response cannot be used.
#[derive(Debug, Clone, Error)]
#[error("{message} (code {code})")]
pub struct ApiError {
    /// Remote error code from `errors[0].code`, or [`ApiError::GENERIC_CODE`].
    pub code: i64,

    /// Remote error message, or a local description of the failure.
    pub message: String,

    /// The response body, as JSON when it parsed and as a string otherwise.
    pub raw_response: Value,

    /// HTTP status, absent when no response was received.
    pub status: Option<u16>,
}

impl ApiError {
    /// Code used when the remote API did not supply one.
    pub const GENERIC_CODE: i64 = -1;

    /// Build an error from a non-2xx response body.
    pub fn from_response(status: StatusCode, raw_response: Value) -> Self {
        let first = raw_response.get("errors").and_then(|errors| errors.get(0));

        let code = first
            .and_then(|e| e.get("code"))
            .and_then(Value::as_i64)
            .unwrap_or(Self::GENERIC_CODE);

        let message = first
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("API request failed (HTTP {})", status.as_u16()));

        Self {
            code,
            message,
            raw_response,
            status: Some(status.as_u16()),
        }
    }

    /// Failure that happened on this side of the wire.
    pub(crate) fn local(message: impl Into<String>) -> Self {
        Self {
            code: Self::GENERIC_CODE,
            message: message.into(),
            raw_response: Value::Null,
            status: None,
        }
    }

    fn transport(error: reqwest::Error) -> Self {
        Self::local(format!("request failed: {}", error))
    }

    /// Whether the remote API answered and refused the request.
    pub fn is_rejection(&self) -> bool {
        self.status.is_some_and(|s| !(200..300).contains(&s))
    }

    /// Whether the remote API answered 2xx with a body that did not decode.
    pub fn is_undecodable_success(&self) -> bool {
        self.status.is_some_and(|s| (200..300).contains(&s))
    }
}

/// Payload attached to a request.
pub enum RequestBody {
    /// No body.
    Empty,

    /// JSON body.
    Json(Value),

    /// `application/x-www-form-urlencoded` body.
    Form(Vec<(String, String)>),

    /// `multipart/form-data` body, used for image upload.
    Multipart(multipart::Form),
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Form bodies carry client secrets and tokens.
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Json(_) => write!(f, "Json(..)"),
            Self::Form(fields) => write!(f, "Form({} fields)", fields.len()),
            Self::Multipart(_) => write!(f, "Multipart(..)"),
        }
    }
}

/// Uniform request executor for the Medium API.
#[derive(Debug, Clone)]
pub struct ApiGateway {
    http: reqwest::Client,
    base_url: Url,
    access_token: Option<Secret>,
}

impl ApiGateway {
    /// Create a gateway rooted at `base_url` with no bearer token yet.
    pub fn new(base_url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a gateway using an existing HTTP client.
    ///
    /// A path prefix on `base_url` (a proxy mount point, say) is kept:
    /// request paths are resolved beneath it.
    pub fn with_client(http: reqwest::Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http,
            base_url,
            access_token: None,
        }
    }

    /// Absolute URL for an API path such as `/v1/me`.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::local(format!("invalid request path {}: {}", path, e)))
    }

    /// Sign subsequent requests with `token`.
    pub fn set_access_token(&mut self, token: Secret) {
        self.access_token = Some(token);
    }

    /// Whether requests are currently signed.
    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Execute one request and classify its response.
    ///
    /// `Authorization: Bearer` is attached whenever a token is held; the
    /// token exchange that obtains the first one goes out unsigned.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(path)?;

        tracing::debug!("{} {} body={:?}", method, url, body);

        let mut builder = self
            .http
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header(ACCEPT_CHARSET, "utf-8");

        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token.expose());
        }

        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart(form) => builder.multipart(form),
        };

        let response = builder.send().await.map_err(ApiError::transport)?;
        let status = response.status();
        let text = response.text().await.map_err(ApiError::transport)?;

        tracing::debug!("HTTP {} ({} bytes)", status, text.len());

        classify(status, &text)
    }

    /// `GET path`.
    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::GET, path, RequestBody::Empty).await
    }

    /// `POST path` with a JSON body.
    pub async fn post_json(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.request(Method::POST, path, RequestBody::Json(body)).await
    }
}

/// Turn a status and body into a payload or an error.
pub(crate) fn classify(status: StatusCode, body: &str) -> Result<Value, ApiError> {
    if status.is_success() {
        let mut value: Value = serde_json::from_str(body).map_err(|e| ApiError {
            code: ApiError::GENERIC_CODE,
            message: format!("failed to decode response body: {}", e),
            raw_response: Value::String(body.to_string()),
            status: Some(status.as_u16()),
        })?;

        if let Value::Object(map) = &mut value {
            if let Some(data) = map.remove("data") {
                return Ok(data);
            }
        }
        return Ok(value);
    }

    let raw = serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()));
    Err(ApiError::from_response(status, raw))
}
