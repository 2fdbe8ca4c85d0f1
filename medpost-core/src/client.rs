//! Typed access to the Medium endpoints used by medpost.

use std::path::Path;

use reqwest::{multipart, Method};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::compose::{PostRequest, PostTarget};
use crate::error::MedpostError;
use crate::gateway::{ApiError, ApiGateway, RequestBody};

/// Per-process context over an authorized [`ApiGateway`].
///
/// The authenticated user is fetched at most once and cached, since the
/// identity behind a token cannot change during a run.
#[derive(Debug)]
pub struct MediumClient {
    gateway: ApiGateway,
    user: OnceCell<Value>,
}

impl MediumClient {
    /// Wrap an authorized gateway.
    pub fn new(gateway: ApiGateway) -> Self {
        Self {
            gateway,
            user: OnceCell::new(),
        }
    }

    /// The authenticated user (`GET /v1/me`). Requires `basicProfile`.
    pub async fn current_user(&self) -> Result<&Value, ApiError> {
        self.user
            .get_or_try_init(|| async {
                tracing::debug!("Fetching current user");
                self.gateway.get("/v1/me").await
            })
            .await
    }

    /// ID of the authenticated user.
    pub async fn user_id(&self) -> Result<String, ApiError> {
        let user = self.current_user().await?;
        user.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::local("current user response has no id"))
    }

    /// Publications the user belongs to. Requires `listPublications`.
    pub async fn publications(&self) -> Result<Value, ApiError> {
        let user_id = self.user_id().await?;
        self.gateway
            .get(&format!("/v1/users/{}/publications", user_id))
            .await
    }

    /// Contributors of a publication. Requires `listPublications`.
    pub async fn contributors(&self, publication_id: &str) -> Result<Value, ApiError> {
        self.gateway
            .get(&format!("/v1/publications/{}/contributors", publication_id))
            .await
    }

    /// Create a post on the user's feed or under a publication.
    /// Requires `publishPost`.
    pub async fn create_post(&self, post: &PostRequest) -> Result<Value, ApiError> {
        let path = match &post.target {
            PostTarget::User => {
                tracing::info!("Posting to user");
                format!("/v1/users/{}/posts", self.user_id().await?)
            }
            PostTarget::Publication(id) => {
                tracing::info!("Posting to publication {}", id);
                format!("/v1/publications/{}/posts", id)
            }
        };

        let body = serde_json::to_value(post)
            .map_err(|e| ApiError::local(format!("failed to encode post: {}", e)))?;
        self.gateway.post_json(&path, body).await
    }

    /// Upload a local image for use in a post. Requires `uploadImage`.
    pub async fn upload_image(&self, path: &Path) -> Result<Value, MedpostError> {
        let content_type = image_content_type(path)?;
        let bytes = tokio::fs::read(path).await.map_err(|source| MedpostError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(content_type)
            .map_err(|e| MedpostError::InvalidInput {
                message: format!("invalid content type {}: {}", content_type, e),
            })?;
        let form = multipart::Form::new().part("image", part);

        Ok(self
            .gateway
            .request(Method::POST, "/v1/images", RequestBody::Multipart(form))
            .await?)
    }
}

/// Content type Medium accepts for an image file, from its extension.
pub fn image_content_type(path: &Path) -> Result<&'static str, MedpostError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "gif" => Ok("image/gif"),
        "tif" | "tiff" => Ok("image/tiff"),
        _ => Err(MedpostError::InvalidInput {
            message: format!(
                "unsupported image type for {} (expected jpeg, png, gif or tiff)",
                path.display()
            ),
        }),
    }
}
