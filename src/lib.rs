//! # blog-assets
//!
//! Move inline base64 images out of Markdown articles and into a Git-hosted
//! artifact repository.
//!
//! Rich-text editors happily paste screenshots into Markdown as
//! `![alt](data:image/png;base64,…)`. Stored that way a single article can
//! weigh megabytes, and every read pays for it. This crate uploads each
//! distinct image once, then rewrites the article to reference the uploaded
//! object instead.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Extract  find data-URI images, left to right
//!  ├─ 2. Dedup    one upload per distinct payload
//!  ├─ 3. Upload   concurrent create-object requests, all awaited
//!  ├─ 4. Decide   any failure aborts the whole run
//!  └─ 5. Rewrite  substitute links, everything else byte-identical
//! ```
//!
//! Uploads that succeeded before a sibling failed are not rolled back; the
//! document is simply not written, and the next submission uploads again.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blog_assets::{externalize, ExternalizeConfig, GitHubRepository, RepositoryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = GitHubRepository::new(
//!         RepositoryConfig::new("my-club", "Img_save")
//!             .with_token(std::env::var("GITHUB_TOKEN")?),
//!     )?;
//!     let draft = std::fs::read_to_string("draft.md")?;
//!     let output = externalize(&draft, &repo, &ExternalizeConfig::default()).await?;
//!     println!("{}", output.markdown);
//!     eprintln!("{} images uploaded", output.stats.uploads_succeeded);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `blogimg` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod article;
pub mod config;
pub mod error;
pub mod externalize;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod repository;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use article::{
    submit_article_edit, submit_new_article, ArticleDraft, ArticleRecord, DocumentStore,
    InMemoryDocumentStore, Submission,
};
pub use config::{CommitMessage, ExternalizeConfig, ExternalizeConfigBuilder, RepositoryConfig};
pub use error::{ExternalizeError, UploadError};
pub use externalize::{
    attach_image, attach_image_file, externalize, externalize_file, externalize_sync,
};
pub use output::{ExternalizeOutput, ExternalizeStats, UploadRecord};
pub use pipeline::extract::{extract_images, EmbeddedImage};
pub use pipeline::fanout::ResolutionMap;
pub use pipeline::rewrite::rewrite;
pub use progress::{ExternalizeProgressCallback, NoopProgressCallback, ProgressCallback};
pub use repository::{ArtifactRepository, CreateObject, GitHubRepository, InMemoryRepository, StoredObject};
