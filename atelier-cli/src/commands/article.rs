//! Article commands
//!
//! Offline tools work on a persisted `content` value from a file or stdin:
//!
//! ```bash
//! atelier article decode body.json | jq '.blocks[].type'
//! atelier article render body.json > preview.html
//! atelier article lint body.json     # exits non-zero on stale [k] markers
//! ```
//!
//! Publishing commands talk to the site API.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use atelier_core::article::{ArticleApi, ArticlePayload, ArticleStatus, ImageUpload};
use atelier_core::content::{render_article, ArticleDraft, BlockBody, DecodedContent};
use atelier_core::ids::ArticleId;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

#[derive(Parser, Debug)]
pub struct ArticleArgs {
    #[command(subcommand)]
    pub command: ArticleCommands,
}

#[derive(Subcommand, Debug)]
pub enum ArticleCommands {
    /// Decode a content value into blocks and sources (JSON)
    Decode(InputArgs),
    /// Render a content value to HTML
    Render(InputArgs),
    /// Report blank blocks and citation markers without a source
    Lint(InputArgs),
    /// Fetch an article and render its body
    Show(ShowArgs),
    /// Validate a draft file and create or update the article
    Push(PushArgs),
    /// Upload images and print the URL to use in image blocks
    Upload(UploadArgs),
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Content file (reads stdin when omitted or "-")
    pub input: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Article ID
    pub id: String,

    /// Print the stored content value instead of rendered HTML
    #[arg(long)]
    pub raw: bool,
}

#[derive(Parser, Debug)]
pub struct PushArgs {
    /// Draft file: {"title", "excerpt", "category", "featured_image", "status", "blocks", "sources"}
    #[arg(long, value_name = "FILE")]
    pub draft: PathBuf,

    /// Update this article instead of creating a new one
    #[arg(long)]
    pub id: Option<String>,

    /// Publish instead of saving as draft (overrides the file's status)
    #[arg(long)]
    pub publish: bool,
}

#[derive(Parser, Debug)]
pub struct UploadArgs {
    /// Image files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Article as written on disk for `push`
#[derive(Deserialize, Debug)]
struct DraftFile {
    title: String,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    featured_image: Option<String>,
    #[serde(default)]
    status: ArticleStatus,
    #[serde(default)]
    blocks: Vec<Value>,
    #[serde(default)]
    sources: Vec<Value>,
}

#[derive(Serialize)]
#[serde(tag = "format", rename_all = "lowercase")]
enum DecodeOutput<'a> {
    Legacy {
        body: &'a str,
    },
    Blocks {
        blocks: &'a [atelier_core::content::ContentBlock],
        sources: &'a [atelier_core::content::SourceCitation],
    },
}

pub async fn run_article(args: ArticleArgs) -> Result<()> {
    match args.command {
        ArticleCommands::Decode(args) => run_decode(args),
        ArticleCommands::Render(args) => run_render(args),
        ArticleCommands::Lint(args) => run_lint(args),
        ArticleCommands::Show(args) => run_show(args).await,
        ArticleCommands::Push(args) => run_push(args).await,
        ArticleCommands::Upload(args) => run_upload(args).await,
    }
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// Stored content has no trailing newline; files and pipes usually do
fn read_content(input: Option<&Path>) -> Result<String> {
    let mut content = read_input(input)?;
    let trimmed = content.trim_end_matches(['\n', '\r']).len();
    content.truncate(trimmed);
    Ok(content)
}

fn run_decode(args: InputArgs) -> Result<()> {
    let content = read_content(args.input.as_deref())?;
    let decoded = DecodedContent::decode(&content);
    let output = match &decoded {
        DecodedContent::Legacy(body) => DecodeOutput::Legacy { body },
        DecodedContent::Blocks { blocks, sources } => DecodeOutput::Blocks { blocks, sources },
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("Failed to serialize decoded content")?
    );
    Ok(())
}

fn run_render(args: InputArgs) -> Result<()> {
    let content = read_content(args.input.as_deref())?;
    print!("{}", render_article(&content));
    Ok(())
}

/// Problems worth fixing before publishing
pub(crate) fn lint_content(content: &str) -> Vec<String> {
    let decoded = DecodedContent::decode(content);
    if decoded.is_legacy() {
        return Vec::new();
    }

    let draft = ArticleDraft::from_content(content);
    let mut issues = Vec::new();
    for (idx, block) in draft.blocks().iter().enumerate() {
        match &block.body {
            BlockBody::Text { .. } if block.is_blank() => {
                issues.push(format!("block {}: empty text block", idx + 1));
            }
            BlockBody::Image { .. } if block.is_blank() => {
                issues.push(format!("block {}: image without URL", idx + 1));
            }
            BlockBody::Image { alt, .. } if alt.trim().is_empty() => {
                issues.push(format!("block {}: image without alt text", idx + 1));
            }
            _ => {}
        }
    }
    for num in draft.stale_markers() {
        issues.push(format!(
            "stale citation marker [{num}]: only {} source(s)",
            draft.sources().len()
        ));
    }
    issues
}

fn run_lint(args: InputArgs) -> Result<()> {
    let content = read_content(args.input.as_deref())?;
    if DecodedContent::decode(&content).is_legacy() {
        println!("legacy content: nothing to check");
        return Ok(());
    }

    let issues = lint_content(&content);
    if issues.is_empty() {
        println!("ok");
        return Ok(());
    }
    for issue in &issues {
        println!("{issue}");
    }
    bail!("{} issue(s) found", issues.len())
}

async fn run_show(args: ShowArgs) -> Result<()> {
    let (_, client) = super::connect()?;
    let id = ArticleId::new(args.id);
    let article = client
        .get_article(&id)
        .await
        .with_context(|| format!("Failed to fetch article {id}"))?;

    if args.raw {
        println!("{}", article.content);
        return Ok(());
    }

    eprintln!("{} ({:?})", article.title, article.status);
    print!("{}", render_article(&article.content));
    Ok(())
}

fn load_draft(path: &Path) -> Result<(DraftFile, ArticleDraft)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read draft {}", path.display()))?;
    let file: DraftFile = serde_json::from_str(&text)
        .with_context(|| format!("Invalid draft file {}", path.display()))?;
    // Through the codec so block normalization and source numbering match the editor
    let envelope = json!({ "blocks": file.blocks, "sources": file.sources }).to_string();
    let draft = ArticleDraft::from_content(&envelope);
    Ok((file, draft))
}

async fn run_push(args: PushArgs) -> Result<()> {
    let (file, draft) = load_draft(&args.draft)?;

    let stale = draft.stale_markers();
    if !stale.is_empty() {
        eprintln!("⚠ citation markers without a source: {stale:?}");
    }

    let mut payload = ArticlePayload::from_draft(file.title, &draft);
    payload.excerpt = file.excerpt;
    payload.category = file.category;
    payload.featured_image = file.featured_image;
    payload.status = if args.publish {
        ArticleStatus::Published
    } else {
        file.status
    };
    payload.validate().map_err(|err| anyhow!("Draft rejected: {err}"))?;

    let (_, client) = super::connect()?;
    let article = match args.id {
        Some(id) => {
            let id = ArticleId::new(id);
            client
                .update_article(&id, &payload)
                .await
                .with_context(|| format!("Failed to update article {id}"))?
        }
        None => client
            .create_article(&payload)
            .await
            .context("Failed to create article")?,
    };

    info!(id = %article.id, status = ?article.status, "article saved");
    println!("✅ Saved article {} ({:?})", article.id, article.status);
    Ok(())
}

fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        _ => return None,
    })
}

async fn run_upload(args: UploadArgs) -> Result<()> {
    let mut uploads = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image")
            .to_string();
        uploads.push(ImageUpload {
            file_name,
            mime: guess_mime(path).map(str::to_string),
            bytes,
        });
    }

    let (_, client) = super::connect()?;
    let uploaded = client
        .upload_images(uploads)
        .await
        .context("Failed to upload images")?;

    for (path, image) in args.files.iter().zip(&uploaded) {
        match image.urls.preferred() {
            Some(url) => println!("{}\t{url}", path.display()),
            None => eprintln!("⚠ {}: no URL returned", path.display()),
        }
    }
    if uploaded.len() != args.files.len() {
        eprintln!(
            "⚠ uploaded {} file(s), server returned {} result(s)",
            args.files.len(),
            uploaded.len()
        );
    }
    Ok(())
}
