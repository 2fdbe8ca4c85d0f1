//! medpost CLI
//!
//! Posts HTML, Markdown or reStructuredText files to Medium as drafts, and
//! shows account information.
//!
//! # Usage
//!
//! ```bash
//! # First run prints an authorization URL; pass the code from the redirect
//! medpost --user
//! medpost --code 1a2b3c --user
//!
//! # Post a file as a draft, optionally to a publication
//! medpost notes.rst
//! medpost --pub b45573563f5a --title "Release notes" notes.md
//!
//! # List publications, or the contributors of one
//! medpost --list-publications
//! medpost --authors b45573563f5a
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{ArgGroup, CommandFactory, Parser};
use medpost_core::{
    image_content_type, publish_document, ApiGateway, Authorization, Config, DocutilsCompiler,
    FileCredentialStore, License, MediumClient, PostOptions, PostTarget, PriorCredential,
    RenderOptions, TokenManager, CONFIG_EXAMPLE, MAX_TAGS,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "medpost")]
#[command(about = "Post html, markdown, or rst files to Medium")]
#[command(version)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .multiple(false)
        .args(["file", "user", "list_publications", "authors", "upload_image"]),
))]
struct Cli {
    /// File to post (.html, .md or .rst)
    #[arg(value_parser = existing_file)]
    file: Option<PathBuf>,

    /// Print the authenticated user
    #[arg(short, long)]
    user: bool,

    /// List the user's publications
    #[arg(short = 'l', long = "list-publications")]
    list_publications: bool,

    /// Show contributor info for a publication
    #[arg(short, long, value_name = "PUBLICATION_ID")]
    authors: Option<String>,

    /// Upload an image (jpeg, png, gif or tiff)
    #[arg(long, value_name = "PATH", value_parser = existing_image)]
    upload_image: Option<PathBuf>,

    /// Code from the redirect URL after approval
    #[arg(short, long)]
    code: Option<String>,

    /// Article title
    #[arg(short, long)]
    title: Option<String>,

    /// Post to a publication instead of the user's feed
    #[arg(short = 'p', long = "pub", value_name = "PUBLICATION_ID")]
    publication: Option<String>,

    /// canonicalUrl, if originally posted elsewhere
    #[arg(short = 'r', long = "ref-url", value_name = "URL")]
    ref_url: Option<String>,

    /// Tag for the post (repeatable, at most 3)
    #[arg(long = "tag", value_name = "TAG")]
    tags: Vec<String>,

    /// License to publish under (e.g. cc-40-by, public-domain)
    #[arg(long)]
    license: Option<License>,

    /// Keep the normalized .rst and generated .html files when posting rst
    #[arg(short, long)]
    keep_tmpfiles: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// The single primary action selected on the command line.
enum Action {
    Post(PathBuf),
    User,
    ListPublications,
    Contributors(String),
    UploadImage(PathBuf),
}

impl Action {
    fn from_cli(cli: &Cli) -> Option<Self> {
        if let Some(file) = &cli.file {
            Some(Self::Post(file.clone()))
        } else if cli.user {
            Some(Self::User)
        } else if cli.list_publications {
            Some(Self::ListPublications)
        } else if let Some(id) = &cli.authors {
            Some(Self::Contributors(id.clone()))
        } else {
            cli.upload_image.clone().map(Self::UploadImage)
        }
    }
}

fn existing_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("cannot find file {}", value))
    }
}

fn existing_image(value: &str) -> Result<PathBuf, String> {
    let path = existing_file(value)?;
    image_content_type(&path).map_err(|e| e.to_string())?;
    Ok(path)
}

impl Cli {
    /// Checks that span several arguments, run before any configuration or network access.
    fn validate(&self) -> Result<(), clap::Error> {
        if self.tags.len() > MAX_TAGS {
            return Err(Cli::command().error(
                ErrorKind::TooManyValues,
                format!("at most {} --tag values are allowed, got {}", MAX_TAGS, self.tags.len()),
            ));
        }
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = cli.validate() {
        e.exit();
    }
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let loaded = match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    loaded.with_context(|| format!("configuration error{}", CONFIG_EXAMPLE))
}

async fn run(cli: Cli) -> Result<()> {
    let action = Action::from_cli(&cli).context("no action selected")?;
    let config = load_config(cli.config.as_deref())?;
    info!("Loaded configuration from {}", config.config_path.display());

    let mut gateway = ApiGateway::new(config.api_base()?);
    let store = FileCredentialStore::new(config.credentials_path()?);
    let manager = TokenManager::from_config(store, &config)?;

    match manager.authorize(&mut gateway, cli.code.as_deref()).await? {
        Authorization::Authorized(_) => {
            info!("Authorized; token stored at {}", manager.store().path().display());
        }
        Authorization::NeedsAuthorization { url, prior } => {
            if let PriorCredential::Discarded(reason) = prior {
                eprintln!("Stored token discarded ({}). You must authorize again.", reason);
            }
            println!(
                "Authorize the app by following the url, and passing the code= value in \
                 the redirect url to --code to generate a new bearer token\n\n{}",
                url
            );
            return Ok(());
        }
    }

    let client = MediumClient::new(gateway);

    let response = match action {
        Action::User => client.current_user().await?.clone(),
        Action::ListPublications => client.publications().await?,
        Action::Contributors(id) => client.contributors(&id).await?,
        Action::UploadImage(path) => client.upload_image(&path).await?,
        Action::Post(path) => {
            let compiler = DocutilsCompiler::new(config.compiler());
            let options = PostOptions {
                path,
                title: cli.title,
                tags: cli.tags,
                canonical_url: cli.ref_url,
                license: cli.license,
                target: match cli.publication {
                    Some(id) => PostTarget::Publication(id),
                    None => PostTarget::User,
                },
                render: RenderOptions {
                    keep_artifacts: cli.keep_tmpfiles,
                    ..RenderOptions::default()
                },
            };
            publish_document(&client, &compiler, options).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_single_action() {
        let cli = Cli::try_parse_from(["medpost", "--user"]).unwrap();
        assert!(matches!(Action::from_cli(&cli), Some(Action::User)));

        let cli = Cli::try_parse_from(["medpost", "-a", "pub1", "-v"]).unwrap();
        assert!(matches!(Action::from_cli(&cli), Some(Action::Contributors(id)) if id == "pub1"));
    }

    #[test]
    fn test_no_action_is_usage_error() {
        assert!(Cli::try_parse_from(["medpost"]).is_err());
        assert!(Cli::try_parse_from(["medpost", "--title", "x"]).is_err());
    }

    #[test]
    fn test_two_actions_is_usage_error() {
        assert!(Cli::try_parse_from(["medpost", "--user", "--list-publications"]).is_err());
        assert!(Cli::try_parse_from(["medpost", "-l", "-a", "pub1"]).is_err());
    }

    #[test]
    fn test_missing_file_is_usage_error() {
        assert!(Cli::try_parse_from(["medpost", "/definitely/not/here.md"]).is_err());
    }

    #[test]
    fn test_license_flag() {
        let cli = Cli::try_parse_from(["medpost", "-u", "--license", "cc-40-zero"]).unwrap();
        assert_eq!(cli.license, Some(License::Cc40Zero));
        assert!(Cli::try_parse_from(["medpost", "-u", "--license", "mit"]).is_err());
    }

    #[test]
    fn test_post_modifiers() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let cli = Cli::try_parse_from([
            "medpost", "-p", "pub1", "-t", "Title", "-r", "https://x", "--tag", "a", "--tag", "b",
            "-k", path,
        ])
        .unwrap();

        assert!(matches!(Action::from_cli(&cli), Some(Action::Post(_))));
        assert_eq!(cli.publication.as_deref(), Some("pub1"));
        assert_eq!(cli.tags, vec!["a", "b"]);
        assert!(cli.keep_tmpfiles);
    }

    #[test]
    fn test_too_many_tags_is_usage_error() {
        let cli = Cli::try_parse_from([
            "medpost", "-u", "--tag", "a", "--tag", "b", "--tag", "c", "--tag", "d",
        ])
        .unwrap();
        let err = cli.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooManyValues);
        assert_eq!(err.exit_code(), 2);

        let cli = Cli::try_parse_from(["medpost", "-u", "--tag", "a", "--tag", "b", "--tag", "c"])
            .unwrap();
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_upload_image_type_checked_at_parse() {
        let temp = tempfile::TempDir::new().unwrap();
        let text = temp.path().join("notes.txt");
        let image = temp.path().join("cover.PNG");
        std::fs::write(&text, "x").unwrap();
        std::fs::write(&image, "x").unwrap();

        assert!(Cli::try_parse_from(["medpost", "--upload-image", text.to_str().unwrap()]).is_err());
        let cli = Cli::try_parse_from(["medpost", "--upload-image", image.to_str().unwrap()]).unwrap();
        assert!(matches!(Action::from_cli(&cli), Some(Action::UploadImage(_))));
    }
}
