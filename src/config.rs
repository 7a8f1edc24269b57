//! Configuration types for Markdown image externalization.
//!
//! Two structs, two concerns:
//!
//! * [`ExternalizeConfig`] — how the pipeline behaves (object naming, commit
//!   message, fan-out width, progress events). Built via
//!   [`ExternalizeConfigBuilder`].
//! * [`RepositoryConfig`] — where objects go: the Git-hosted artifact
//!   repository, its branch and directory, and the access token. Consumed by
//!   [`crate::repository::GitHubRepository`].
//!
//! The pipeline never looks at [`RepositoryConfig`]; it talks to whatever
//! [`crate::repository::ArtifactRepository`] it is handed.

use crate::error::ExternalizeError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default subtype used when a filename extension cannot be derived.
pub const DEFAULT_SUBTYPE: &str = "png";

/// Length of generated object identifiers.
pub const DEFAULT_ID_LENGTH: usize = 10;

/// Shortest identifier the pipeline will generate.
pub const MIN_ID_LENGTH: usize = 6;

/// Longest identifier the pipeline will generate.
pub const MAX_ID_LENGTH: usize = 32;

/// Configuration for one externalization run.
///
/// # Example
/// ```rust
/// use blog_assets::{CommitMessage, ExternalizeConfig};
///
/// let config = ExternalizeConfig::builder()
///     .commit_message(CommitMessage::Update)
///     .max_concurrent_uploads(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExternalizeConfig {
    /// Commit message written with every created object. Default: [`CommitMessage::Add`].
    pub commit_message: CommitMessage,

    /// Length of the random object identifier. Range: 6–32. Default: 10.
    ///
    /// Ten characters from a 64-symbol alphabet give 60 bits of entropy,
    /// plenty for a per-club image directory.
    pub id_length: usize,

    /// Extension used when an object has no usable subtype. Default: `png`.
    pub default_subtype: String,

    /// Upper bound on in-flight uploads. Default: `None` (all at once).
    ///
    /// Only scheduling changes: every upload is still awaited before the
    /// outcome is decided.
    pub max_concurrent_uploads: Option<usize>,

    /// Receives per-upload events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExternalizeConfig {
    fn default() -> Self {
        Self {
            commit_message: CommitMessage::default(),
            id_length: DEFAULT_ID_LENGTH,
            default_subtype: DEFAULT_SUBTYPE.to_string(),
            max_concurrent_uploads: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExternalizeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalizeConfig")
            .field("commit_message", &self.commit_message)
            .field("id_length", &self.id_length)
            .field("default_subtype", &self.default_subtype)
            .field("max_concurrent_uploads", &self.max_concurrent_uploads)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ExternalizeProgressCallback>"),
            )
            .finish()
    }
}

impl ExternalizeConfig {
    /// Create a new builder for `ExternalizeConfig`.
    pub fn builder() -> ExternalizeConfigBuilder {
        ExternalizeConfigBuilder {
            config: Self::default(),
        }
    }

    /// `id_length` forced into range; the field is public and may bypass the builder.
    pub(crate) fn effective_id_length(&self) -> usize {
        self.id_length.clamp(MIN_ID_LENGTH, MAX_ID_LENGTH)
    }

    /// Fan-out width for `task_count` uploads.
    pub(crate) fn fan_out_width(&self, task_count: usize) -> usize {
        self.max_concurrent_uploads
            .unwrap_or(task_count)
            .max(1)
    }
}

/// Builder for [`ExternalizeConfig`].
#[derive(Debug)]
pub struct ExternalizeConfigBuilder {
    config: ExternalizeConfig,
}

impl ExternalizeConfigBuilder {
    pub fn commit_message(mut self, message: CommitMessage) -> Self {
        self.config.commit_message = message;
        self
    }

    pub fn id_length(mut self, len: usize) -> Self {
        self.config.id_length = len.clamp(MIN_ID_LENGTH, MAX_ID_LENGTH);
        self
    }

    pub fn default_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.config.default_subtype = subtype.into();
        self
    }

    pub fn max_concurrent_uploads(mut self, n: usize) -> Self {
        self.config.max_concurrent_uploads = Some(n.max(1));
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExternalizeConfig, ExternalizeError> {
        let c = &self.config;
        if c.default_subtype.is_empty()
            || !c.default_subtype.chars().all(|ch| ch.is_ascii_alphanumeric())
        {
            return Err(ExternalizeError::InvalidConfig(format!(
                "Default subtype must be a non-empty alphanumeric extension, got {:?}",
                c.default_subtype
            )));
        }
        if c.max_concurrent_uploads == Some(0) {
            return Err(ExternalizeError::InvalidConfig(
                "Upload concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Commit message ───────────────────────────────────────────────────────

/// Commit message attached to each created object.
///
/// The article-creation flow says "Add", the editing flow says "Update".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommitMessage {
    /// `Add image: <file>` (default)
    #[default]
    Add,
    /// `Update image: <file>`
    Update,
    /// Custom template; `{file}` is replaced by the object filename.
    Custom(String),
}

impl CommitMessage {
    /// Render the message for the given object filename.
    pub fn render(&self, filename: &str) -> String {
        match self {
            CommitMessage::Add => format!("Add image: {filename}"),
            CommitMessage::Update => format!("Update image: {filename}"),
            CommitMessage::Custom(template) => template.replace("{file}", filename),
        }
    }
}

// ── Repository ───────────────────────────────────────────────────────────

/// Location of, and credentials for, the Git-hosted artifact repository.
#[derive(Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// REST API root. Default: `https://api.github.com`.
    pub api_base: String,
    /// Account or organisation owning the repository.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Branch objects are committed to. Default: `main`.
    pub branch: String,
    /// Directory inside the repository. Default: `static/images`.
    pub directory: String,
    /// Root for public raw links. Default: `https://github.com`.
    pub raw_base: String,
    /// Personal access token sent as `Authorization: token <..>`.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Per-request timeout in seconds. Default: 60.
    pub request_timeout_secs: u64,
}

impl fmt::Debug for RepositoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryConfig")
            .field("api_base", &self.api_base)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("directory", &self.directory)
            .field("raw_base", &self.raw_base)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl RepositoryConfig {
    /// Repository `owner/repo` with default branch, directory and endpoints.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            owner: owner.into(),
            repo: repo.into(),
            branch: "main".to_string(),
            directory: "static/images".to_string(),
            raw_base: "https://github.com".to_string(),
            token: None,
            request_timeout_secs: 60,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_raw_base(mut self, raw_base: impl Into<String>) -> Self {
        self.raw_base = raw_base.into();
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs.max(1);
        self
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<(), ExternalizeError> {
        for (name, value) in [("owner", &self.owner), ("repo", &self.repo)] {
            if value.is_empty() || value.contains('/') {
                return Err(ExternalizeError::InvalidConfig(format!(
                    "Repository {name} must be non-empty and contain no '/', got {value:?}"
                )));
            }
        }
        if self.branch.is_empty() {
            return Err(ExternalizeError::InvalidConfig(
                "Repository branch must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Path of `filename` inside the repository, e.g. `static/images/abc.png`.
    pub fn object_path(&self, filename: &str) -> String {
        let dir = self.directory.trim_matches('/');
        if dir.is_empty() {
            filename.to_string()
        } else {
            format!("{dir}/{filename}")
        }
    }

    /// Create-object endpoint for `filename`.
    pub fn contents_url(&self, filename: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base.trim_end_matches('/'),
            self.owner,
            self.repo,
            self.object_path(filename)
        )
    }

    /// Public address of `filename` once it has been created.
    pub fn public_url(&self, filename: &str) -> String {
        format!(
            "{}/{}/{}/raw/{}/{}",
            self.raw_base.trim_end_matches('/'),
            self.owner,
            self.repo,
            self.branch,
            self.object_path(filename)
        )
    }
}
