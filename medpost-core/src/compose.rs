//! Create-post request assembly.
//!
//! Posts are always created as drafts so they can be reviewed before going
//! live. Optional fields are left out of the request body entirely when not
//! supplied; the remote API treats an omitted field differently from `null`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;

use crate::client::MediumClient;
use crate::document::{Document, RenderOptions, RenderedDocument};
use crate::error::MedpostError;
use crate::preprocess::compiler::DocumentCompiler;
use crate::preprocess::LinePipeline;

/// Most tags the remote API accepts on one post.
pub const MAX_TAGS: usize = 3;

/// Format of the post body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    Html,
    Markdown,
}

/// Publication state of a new post. Only drafts are ever created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Draft,
}

/// License a post is published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum License {
    #[serde(rename = "all-rights-reserved")]
    AllRightsReserved,
    #[serde(rename = "cc-40-by")]
    Cc40By,
    #[serde(rename = "cc-40-by-sa")]
    Cc40BySa,
    #[serde(rename = "cc-40-by-nd")]
    Cc40ByNd,
    #[serde(rename = "cc-40-by-nc")]
    Cc40ByNc,
    #[serde(rename = "cc-40-by-nc-nd")]
    Cc40ByNcNd,
    #[serde(rename = "cc-40-by-nc-sa")]
    Cc40ByNcSa,
    #[serde(rename = "cc-40-zero")]
    Cc40Zero,
    #[serde(rename = "public-domain")]
    PublicDomain,
}

impl License {
    /// Every license, in the order the remote API documents them.
    pub const ALL: [License; 9] = [
        License::AllRightsReserved,
        License::Cc40By,
        License::Cc40BySa,
        License::Cc40ByNd,
        License::Cc40ByNc,
        License::Cc40ByNcNd,
        License::Cc40ByNcSa,
        License::Cc40Zero,
        License::PublicDomain,
    ];

    /// Wire name of the license.
    pub fn as_str(self) -> &'static str {
        match self {
            License::AllRightsReserved => "all-rights-reserved",
            License::Cc40By => "cc-40-by",
            License::Cc40BySa => "cc-40-by-sa",
            License::Cc40ByNd => "cc-40-by-nd",
            License::Cc40ByNc => "cc-40-by-nc",
            License::Cc40ByNcNd => "cc-40-by-nc-nd",
            License::Cc40ByNcSa => "cc-40-by-nc-sa",
            License::Cc40Zero => "cc-40-zero",
            License::PublicDomain => "public-domain",
        }
    }
}

impl std::fmt::Display for License {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for License {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        License::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = License::ALL.iter().map(|l| l.as_str()).collect();
                format!("unknown license '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// Where a post is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostTarget {
    /// The authenticated user's own feed.
    User,

    /// A publication, by ID.
    Publication(String),
}

/// Body of a create-post call, plus where to send it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRequest {
    pub title: String,
    pub content: String,
    pub content_format: ContentFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    pub publish_status: PublishStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
    #[serde(skip)]
    pub target: PostTarget,
}

/// Everything the caller chooses about a post.
#[derive(Debug, Clone)]
pub struct PostOptions {
    pub path: PathBuf,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub canonical_url: Option<String>,
    pub license: Option<License>,
    pub target: PostTarget,
    pub render: RenderOptions,
}

impl PostOptions {
    /// Options for posting `path` to the user's feed with defaults.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            title: None,
            tags: Vec::new(),
            canonical_url: None,
            license: None,
            target: PostTarget::User,
            render: RenderOptions::default(),
        }
    }
}

/// Title used when none is given: the file stem with underscores turned
/// into spaces, then the local time.
pub fn default_title(path: &Path, now: DateTime<Local>) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().replace('_', " "))
        .unwrap_or_default();
    format!("{} {}", stem, now.format("%Y%m%d-%X%Z"))
}

/// Build the create-post request for a rendered document.
pub fn compose_post(
    rendered: RenderedDocument,
    tags: Vec<String>,
    canonical_url: Option<String>,
    license: Option<License>,
    target: PostTarget,
) -> Result<PostRequest, MedpostError> {
    if tags.len() > MAX_TAGS {
        return Err(MedpostError::InvalidInput {
            message: format!("at most {} tags are allowed, got {}", MAX_TAGS, tags.len()),
        });
    }

    Ok(PostRequest {
        title: rendered.title,
        content: rendered.content_text,
        content_format: rendered.content_format,
        tags: if tags.is_empty() { None } else { Some(tags) },
        canonical_url,
        publish_status: PublishStatus::Draft,
        license,
        target,
    })
}

/// Load, render and post a document as a draft.
///
/// Returns the remote API's description of the created post.
pub async fn publish_document(
    client: &MediumClient,
    compiler: &dyn DocumentCompiler,
    options: PostOptions,
) -> Result<Value, MedpostError> {
    let document = Document::load(&options.path).await?;
    let title = options
        .title
        .unwrap_or_else(|| default_title(&options.path, Local::now()));

    tracing::info!("Rendering {} ({:?})", document.path.display(), document.format);
    let rendered = document
        .render(compiler, &LinePipeline::standard(), title, &options.render)
        .await?;

    let post = compose_post(
        rendered,
        options.tags,
        options.canonical_url,
        options.license,
        options.target,
    )?;

    Ok(client.create_post(&post).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn rendered(format: ContentFormat) -> RenderedDocument {
        RenderedDocument {
            content_format: format,
            content_text: "<p>hi</p>".to_string(),
            title: "Title".to_string(),
        }
    }

    #[test]
    fn test_default_title() {
        let now = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let title = default_title(Path::new("/docs/my_first_post.md"), now);

        assert!(title.starts_with("my first post 20240305-14:07:09"));
    }

    #[test]
    fn test_minimal_request_omits_optional_fields() {
        let post = compose_post(rendered(ContentFormat::Html), vec![], None, None, PostTarget::User).unwrap();

        assert_eq!(
            serde_json::to_value(&post).unwrap(),
            json!({
                "title": "Title",
                "content": "<p>hi</p>",
                "contentFormat": "html",
                "publishStatus": "draft"
            })
        );
    }

    #[test]
    fn test_full_request() {
        let post = compose_post(
            rendered(ContentFormat::Markdown),
            vec!["rust".to_string(), "cli".to_string()],
            Some("https://example.com/orig".to_string()),
            Some(License::Cc40BySa),
            PostTarget::Publication("pub1".to_string()),
        )
        .unwrap();

        let body = serde_json::to_value(&post).unwrap();
        assert_eq!(body["contentFormat"], "markdown");
        assert_eq!(body["tags"], json!(["rust", "cli"]));
        assert_eq!(body["canonicalUrl"], "https://example.com/orig");
        assert_eq!(body["license"], "cc-40-by-sa");
        assert_eq!(body["publishStatus"], "draft");
        assert!(body.get("target").is_none());
    }

    #[test]
    fn test_too_many_tags() {
        let tags = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        let result = compose_post(rendered(ContentFormat::Html), tags, None, None, PostTarget::User);
        assert!(matches!(result, Err(MedpostError::InvalidInput { .. })));
    }

    #[test]
    fn test_license_parse() {
        assert_eq!("public-domain".parse::<License>().unwrap(), License::PublicDomain);
        for license in License::ALL {
            assert_eq!(license.as_str().parse::<License>().unwrap(), license);
            assert_eq!(serde_json::to_value(license).unwrap(), json!(license.as_str()));
        }
        assert!("cc-by".parse::<License>().is_err());
    }
}
