//! CLI binary for blog-assets.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExternalizeConfig` / `RepositoryConfig` and prints results.

use anyhow::{Context, Result};
use blog_assets::{
    attach_image_file, externalize, externalize_file, extract_images, CommitMessage,
    ExternalizeConfig, ExternalizeProgressCallback, GitHubRepository, ProgressCallback,
    RepositoryConfig,
};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the whole run plus a log line per
/// upload. Uploads finish in any order; each line names its file.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} images  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Uploading");

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl ExternalizeProgressCallback for CliProgressCallback {
    fn on_externalize_start(&self, distinct_payloads: usize) {
        self.bar.set_length(distinct_payloads as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_upload_complete(&self, filename: &str, url: &str) {
        self.bar
            .println(format!("  {} {:<20} {}", green("✓"), filename, dim(url)));
        self.bar.inc(1);
    }

    fn on_upload_error(&self, filename: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {:<20} {}", red("✗"), filename, red(&msg)));
        self.bar.inc(1);
    }

    fn on_externalize_complete(&self, distinct_payloads: usize, success_count: usize) {
        self.bar.finish_and_clear();
        if success_count == distinct_payloads {
            eprintln!(
                "{} {} images uploaded",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} images uploaded  ({} failed)",
                red("✘"),
                bold(&success_count.to_string()),
                distinct_payloads,
                red(&self.errors.load(Ordering::SeqCst).to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Externalize images in a draft, print the result
  blogimg externalize draft.md --owner my-club --repo Img_save

  # Write to a file, using the editing flow's commit message
  blogimg externalize draft.md -o article.md --update

  # Upload one picture and print its Markdown reference
  blogimg attach photo.jpg --alt "Club meeting"

  # Count embedded images without uploading anything
  blogimg scan draft.md

ENVIRONMENT VARIABLES:
  GITHUB_TOKEN        Access token for the artifact repository
  BLOGIMG_OWNER       Repository owner
  BLOGIMG_REPO        Repository name
  BLOGIMG_BRANCH      Branch (default: main)
  BLOGIMG_DIRECTORY   Directory inside the repository (default: static/images)
"#;

/// Move inline base64 images out of Markdown and into a Git repository.
#[derive(Parser, Debug)]
#[command(
    name = "blogimg",
    version,
    about = "Move inline base64 images out of Markdown and into a Git repository",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "BLOGIMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "BLOGIMG_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload every embedded image and rewrite the document.
    Externalize {
        /// Markdown file to process.
        input: PathBuf,

        /// Write Markdown to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use the "Update image" commit message (editing an existing article).
        #[arg(long)]
        update: bool,

        /// Print structured JSON (ExternalizeOutput) instead of Markdown.
        #[arg(long, conflicts_with = "output")]
        json: bool,

        #[command(flatten)]
        upload: UploadArgs,
    },

    /// Upload a single image file and print its Markdown reference.
    Attach {
        /// Image file to upload.
        image: PathBuf,

        /// Alt text for the reference.
        #[arg(long, default_value = "")]
        alt: String,

        #[command(flatten)]
        upload: UploadArgs,
    },

    /// List embedded images; no network access.
    Scan {
        /// Markdown file to inspect.
        input: PathBuf,
    },
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// Repository owner (user or organisation).
    #[arg(long, env = "BLOGIMG_OWNER")]
    owner: String,

    /// Repository name.
    #[arg(long, env = "BLOGIMG_REPO")]
    repo: String,

    /// Branch to commit to.
    #[arg(long, env = "BLOGIMG_BRANCH", default_value = "main")]
    branch: String,

    /// Directory inside the repository.
    #[arg(long, env = "BLOGIMG_DIRECTORY", default_value = "static/images")]
    directory: String,

    /// REST API root.
    #[arg(long, env = "BLOGIMG_API_BASE", default_value = "https://api.github.com")]
    api_base: String,

    /// Root for public raw links.
    #[arg(long, env = "BLOGIMG_RAW_BASE", default_value = "https://github.com")]
    raw_base: String,

    /// Access token.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Maximum simultaneous uploads (default: all).
    #[arg(short, long, env = "BLOGIMG_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "BLOGIMG_TIMEOUT", default_value_t = 60)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Scan { ref input } => scan(input).await,

        Command::Attach {
            ref image,
            ref alt,
            ref upload,
        } => {
            let repo = build_repository(upload)?;
            let config = build_config(upload, false, None)?;
            let reference = attach_image_file(image, alt, &repo, &config)
                .await
                .context("Upload failed")?;
            println!("{reference}");
            Ok(())
        }

        Command::Externalize {
            ref input,
            ref output,
            update,
            json,
            ref upload,
        } => {
            let progress: Option<ProgressCallback> = if cli.quiet || json {
                None
            } else {
                Some(CliProgressCallback::new() as Arc<dyn ExternalizeProgressCallback>)
            };
            let repo = build_repository(upload)?;
            let config = build_config(upload, update, progress)?;

            if let Some(path) = output {
                let stats = externalize_file(input, path, &repo, &config)
                    .await
                    .context("Submission failed; the document was not written")?;
                if !cli.quiet {
                    eprintln!(
                        "{}  {} embeddings, {} uploads  {}ms  →  {}",
                        green("✔"),
                        stats.embeddings,
                        stats.uploads_succeeded,
                        stats.duration_ms,
                        bold(&path.display().to_string()),
                    );
                }
                return Ok(());
            }

            let text = tokio::fs::read_to_string(input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;

            let result = externalize(&text, &repo, &config)
                .await
                .context("Submission failed; the document was not written")?;

            if json {
                let out =
                    serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
                println!("{out}");
            } else {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(result.markdown.as_bytes())
                    .context("Failed to write to stdout")?;
                if !result.markdown.ends_with('\n') {
                    handle.write_all(b"\n").ok();
                }
            }
            Ok(())
        }
    }
}

/// Print every embedding and the number of uploads a run would make.
async fn scan(input: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let mut distinct = HashSet::new();
    let mut count = 0usize;
    for image in extract_images(&text) {
        count += 1;
        let first = distinct.insert(image.payload);
        println!(
            "{:>8}  image/{:<5} {:>9} b64 bytes  {}{}",
            image.start,
            image.subtype,
            image.payload.len(),
            if image.alt.is_empty() { "(no alt)" } else { image.alt },
            if first { "" } else { "  (duplicate)" },
        );
    }
    println!("{count} embedded images, {} distinct", distinct.len());
    Ok(())
}

/// Map CLI args to a GitHub-backed repository.
fn build_repository(args: &UploadArgs) -> Result<GitHubRepository> {
    let mut config = RepositoryConfig::new(&args.owner, &args.repo)
        .with_branch(&args.branch)
        .with_directory(&args.directory)
        .with_api_base(&args.api_base)
        .with_raw_base(&args.raw_base)
        .with_request_timeout_secs(args.timeout);
    if let Some(ref token) = args.token {
        config = config.with_token(token);
    }
    GitHubRepository::new(config).context("Invalid repository configuration")
}

/// Map CLI args to `ExternalizeConfig`.
fn build_config(
    args: &UploadArgs,
    update: bool,
    progress: Option<ProgressCallback>,
) -> Result<ExternalizeConfig> {
    let mut builder = ExternalizeConfig::builder().commit_message(if update {
        CommitMessage::Update
    } else {
        CommitMessage::Add
    });
    if let Some(n) = args.concurrency {
        builder = builder.max_concurrent_uploads(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}
