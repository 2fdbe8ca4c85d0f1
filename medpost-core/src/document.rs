//! Source documents and their rendering.
//!
//! HTML and Markdown documents are posted as they are. reStructuredText is
//! normalized by the [`LinePipeline`](crate::preprocess::LinePipeline),
//! written to a temporary file, compiled to HTML by a
//! [`DocumentCompiler`](crate::preprocess::compiler::DocumentCompiler) and
//! read back.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;

use crate::compose::ContentFormat;
use crate::preprocess::compiler::{DocumentCompiler, ExternalToolError};
use crate::preprocess::LinePipeline;

/// Error type for loading and rendering documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The source path does not name a regular file.
    #[error("cannot find file for posting: {}", path.display())]
    NotFound { path: PathBuf },

    /// Reading or writing a document file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external compiler failed.
    #[error(transparent)]
    Compiler(#[from] ExternalToolError),
}

impl DocumentError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Markup language of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Html,
    Markdown,
    Rst,
}

impl DocumentFormat {
    /// Detect the format from the file name suffix, case-insensitively.
    ///
    /// A name that is only the suffix (`.md`) counts. Anything that ends in
    /// neither `.md` nor `.rst` is treated as HTML.
    pub fn detect(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        if name.ends_with(".md") {
            Self::Markdown
        } else if name.ends_with(".rst") {
            Self::Rst
        } else {
            Self::Html
        }
    }

    /// Format the remote API is told the content is in.
    ///
    /// reStructuredText is always rendered to HTML first.
    pub fn content_format(self) -> ContentFormat {
        match self {
            Self::Markdown => ContentFormat::Markdown,
            Self::Html | Self::Rst => ContentFormat::Html,
        }
    }
}

/// A source document, read once from disk.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub format: DocumentFormat,
    pub raw_text: String,
}

/// Content ready to be placed in a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub content_format: ContentFormat,
    pub content_text: String,
    pub title: String,
}

/// Where rendering artifacts go and whether they outlive the render.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub artifact_dir: PathBuf,
    pub keep_artifacts: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            artifact_dir: std::env::temp_dir(),
            keep_artifacts: false,
        }
    }
}

/// The normalized source and compiled output of one render.
///
/// Both files live in a fresh `medpost-*` directory under the artifact dir,
/// so they never collide with existing files. The directory is removed when
/// this value is dropped unless retention was requested.
#[derive(Debug)]
pub struct RenderArtifacts {
    pub normalized_path: PathBuf,
    pub html_path: PathBuf,
    dir: Option<TempDir>,
    keep: bool,
}

impl RenderArtifacts {
    /// Create the artifact directory for a source with file stem `stem`.
    pub fn create(stem: &str, options: &RenderOptions) -> Result<Self, DocumentError> {
        let dir = tempfile::Builder::new()
            .prefix("medpost-")
            .tempdir_in(&options.artifact_dir)
            .map_err(|e| DocumentError::io(&options.artifact_dir, e))?;

        Ok(Self {
            normalized_path: dir.path().join(format!("{}.normalized.rst", stem)),
            html_path: dir.path().join(format!("{}.html", stem)),
            dir: Some(dir),
            keep: options.keep_artifacts,
        })
    }

    /// Directory holding both artifacts.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }
}

impl Drop for RenderArtifacts {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        if self.keep {
            tracing::info!("Keeping render artifacts in {}", dir.keep().display());
            return;
        }

        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => tracing::debug!("Removed {}", path.display()),
            Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}

impl Document {
    /// Read a document from disk.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let path = path.into();
        if !path.is_file() {
            return Err(DocumentError::NotFound { path });
        }

        let raw_text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| DocumentError::io(&path, e))?;

        Ok(Self {
            format: DocumentFormat::detect(&path),
            path,
            raw_text,
        })
    }

    /// File name without extension.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Produce postable content.
    ///
    /// Compiler failure is returned as-is; artifacts are cleaned up either way.
    pub async fn render(
        self,
        compiler: &dyn DocumentCompiler,
        pipeline: &LinePipeline,
        title: String,
        options: &RenderOptions,
    ) -> Result<RenderedDocument, DocumentError> {
        let content_format = self.format.content_format();

        let content_text = match self.format {
            DocumentFormat::Html | DocumentFormat::Markdown => self.raw_text,
            DocumentFormat::Rst => {
                let artifacts = RenderArtifacts::create(&self.stem(), options)?;
                let normalized = pipeline.normalize(&self.raw_text);

                tokio::fs::write(&artifacts.normalized_path, normalized)
                    .await
                    .map_err(|e| DocumentError::io(&artifacts.normalized_path, e))?;

                compiler
                    .render(&artifacts.normalized_path, &artifacts.html_path)
                    .await?;

                tokio::fs::read_to_string(&artifacts.html_path)
                    .await
                    .map_err(|e| DocumentError::io(&artifacts.html_path, e))?
            }
        };

        Ok(RenderedDocument {
            content_format,
            content_text,
            title,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Copies the normalized source into the output, wrapped in a marker.
    struct EchoCompiler;

    #[async_trait]
    impl DocumentCompiler for EchoCompiler {
        async fn render(&self, input: &Path, output: &Path) -> Result<(), ExternalToolError> {
            let text = std::fs::read_to_string(input).unwrap();
            std::fs::write(output, format!("<pre>{}</pre>", text)).unwrap();
            Ok(())
        }
    }

    struct FailingCompiler;

    #[async_trait]
    impl DocumentCompiler for FailingCompiler {
        async fn render(&self, _input: &Path, output: &Path) -> Result<(), ExternalToolError> {
            std::fs::write(output, "partial").unwrap();
            Err(ExternalToolError::Launch {
                program: "rst2s5".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
            })
        }
    }

    fn options(dir: &TempDir, keep: bool) -> RenderOptions {
        RenderOptions {
            artifact_dir: dir.path().to_path_buf(),
            keep_artifacts: keep,
        }
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(DocumentFormat::detect(Path::new("a.md")), DocumentFormat::Markdown);
        assert_eq!(DocumentFormat::detect(Path::new("A.MD")), DocumentFormat::Markdown);
        assert_eq!(DocumentFormat::detect(Path::new("a.Rst")), DocumentFormat::Rst);
        assert_eq!(DocumentFormat::detect(Path::new("a.html")), DocumentFormat::Html);
        assert_eq!(DocumentFormat::detect(Path::new("a.txt")), DocumentFormat::Html);
        assert_eq!(DocumentFormat::detect(Path::new("README")), DocumentFormat::Html);
        assert_eq!(DocumentFormat::detect(Path::new("drafts/.md")), DocumentFormat::Markdown);
        assert_eq!(DocumentFormat::detect(Path::new(".RST")), DocumentFormat::Rst);
        assert_eq!(DocumentFormat::detect(Path::new("notes.md.bak")), DocumentFormat::Html);
    }

    #[test]
    fn test_content_format() {
        assert_eq!(DocumentFormat::Markdown.content_format(), ContentFormat::Markdown);
        assert_eq!(DocumentFormat::Rst.content_format(), ContentFormat::Html);
        assert_eq!(DocumentFormat::Html.content_format(), ContentFormat::Html);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = Document::load(temp.path().join("nope.md")).await.unwrap_err();
        assert!(matches!(err, DocumentError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_markdown_passes_through() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("post.md");
        std::fs::write(&path, "# Hi\n\n1. one\n").unwrap();

        let document = Document::load(&path).await.unwrap();
        let rendered = document
            .render(&FailingCompiler, &LinePipeline::standard(), "t".into(), &options(&temp, false))
            .await
            .unwrap();

        assert_eq!(rendered.content_format, ContentFormat::Markdown);
        assert_eq!(rendered.content_text, "# Hi\n\n1. one\n");
    }

    #[tokio::test]
    async fn test_rst_is_normalized_compiled_and_cleaned_up() {
        let source_dir = TempDir::new().unwrap();
        let artifact_dir = TempDir::new().unwrap();
        let path = source_dir.path().join("notes.rst");
        std::fs::write(&path, ".. code-block:: python\n\n1. step\n").unwrap();

        let document = Document::load(&path).await.unwrap();
        let rendered = document
            .render(&EchoCompiler, &LinePipeline::standard(), "Notes".into(), &options(&artifact_dir, false))
            .await
            .unwrap();

        assert_eq!(rendered.content_format, ContentFormat::Html);
        assert_eq!(rendered.title, "Notes");
        assert!(rendered.content_text.starts_with("<pre>.. role:: index(raw)\n"));
        assert!(rendered.content_text.contains(".. code-block::\n\n   step\n"));
        assert_eq!(std::fs::read_dir(artifact_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_rst_artifacts_kept_on_request() {
        let source_dir = TempDir::new().unwrap();
        let artifact_dir = TempDir::new().unwrap();
        let path = source_dir.path().join("notes.rst");
        std::fs::write(&path, "Hello\n").unwrap();

        Document::load(&path)
            .await
            .unwrap()
            .render(&EchoCompiler, &LinePipeline::standard(), "t".into(), &options(&artifact_dir, true))
            .await
            .unwrap();

        let kept: Vec<_> = std::fs::read_dir(artifact_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(kept.len(), 1);
        assert!(kept[0].file_name().unwrap().to_string_lossy().starts_with("medpost-"));
        assert!(kept[0].join("notes.normalized.rst").is_file());
        assert!(kept[0].join("notes.html").is_file());
    }

    #[tokio::test]
    async fn test_render_leaves_same_named_files_alone() {
        let source_dir = TempDir::new().unwrap();
        let artifact_dir = TempDir::new().unwrap();
        let path = source_dir.path().join("notes.rst");
        std::fs::write(&path, "Hello\n").unwrap();
        std::fs::write(artifact_dir.path().join("notes.html"), "USER DATA").unwrap();
        std::fs::write(artifact_dir.path().join("notes.normalized.rst"), "USER DATA").unwrap();

        let rendered = Document::load(&path)
            .await
            .unwrap()
            .render(&EchoCompiler, &LinePipeline::standard(), "t".into(), &options(&artifact_dir, false))
            .await
            .unwrap();

        assert!(rendered.content_text.contains("Hello"));
        for name in ["notes.html", "notes.normalized.rst"] {
            let kept = std::fs::read_to_string(artifact_dir.path().join(name)).unwrap();
            assert_eq!(kept, "USER DATA");
        }
        assert_eq!(std::fs::read_dir(artifact_dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_artifact_paths_share_private_dir() {
        let artifact_dir = TempDir::new().unwrap();
        let artifacts = RenderArtifacts::create("notes", &options(&artifact_dir, false)).unwrap();
        let dir = artifacts.dir().unwrap().to_path_buf();

        assert_eq!(artifacts.normalized_path, dir.join("notes.normalized.rst"));
        assert_eq!(artifacts.html_path, dir.join("notes.html"));
        assert!(dir.is_dir());

        drop(artifacts);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_compiler_failure_propagates_and_cleans_up() {
        let source_dir = TempDir::new().unwrap();
        let artifact_dir = TempDir::new().unwrap();
        let path = source_dir.path().join("broken.rst");
        std::fs::write(&path, "Hello\n").unwrap();

        let err = Document::load(&path)
            .await
            .unwrap()
            .render(&FailingCompiler, &LinePipeline::standard(), "t".into(), &options(&artifact_dir, false))
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentError::Compiler(ExternalToolError::Launch { .. })));
        assert_eq!(std::fs::read_dir(artifact_dir.path()).unwrap().count(), 0);
    }
}
