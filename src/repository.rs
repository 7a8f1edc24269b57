//! Remote artifact repository: the one network collaborator of the pipeline.
//!
//! The pipeline only ever asks for one thing: "create object `F` with base64
//! content `C` and commit message `M`". It receives the object's public
//! address in return. [`ArtifactRepository`] captures that capability so the
//! pipeline can be handed either the real [`GitHubRepository`] or the
//! [`InMemoryRepository`] fake, which records writes and simulates failures
//! deterministically.

use crate::config::RepositoryConfig;
use crate::error::{ExternalizeError, UploadError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// A single create-object request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateObject {
    /// Object filename, `<id>.<extension>`.
    pub filename: String,
    /// Base64 content, sent as-is.
    pub content: String,
    /// Commit message recorded with the object.
    pub message: String,
}

/// A successfully created object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub filename: String,
    /// Public address the document should reference.
    pub url: String,
    /// Repository revision identifier, when the repository reports one.
    pub sha: Option<String>,
}

/// Capability to write objects to a remote artifact repository.
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Create one object. Success means the object now durably exists.
    async fn create_object(&self, request: &CreateObject) -> Result<StoredObject, UploadError>;

    /// Public address `filename` has (or will have) once created.
    fn public_url(&self, filename: &str) -> String;
}

// ── GitHub contents API ──────────────────────────────────────────────────

#[derive(Serialize)]
struct CreateContentsBody<'a> {
    message: &'a str,
    content: &'a str,
    branch: &'a str,
}

#[derive(Deserialize)]
struct CreateContentsResponse {
    content: Option<ContentsEntry>,
}

#[derive(Deserialize)]
struct ContentsEntry {
    sha: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// [`ArtifactRepository`] backed by the GitHub repository contents API.
#[derive(Clone)]
pub struct GitHubRepository {
    config: RepositoryConfig,
    token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GitHubRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubRepository")
            .field("config", &self.config)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl GitHubRepository {
    /// Validate `config` and build an HTTP client for it.
    ///
    /// # Errors
    /// [`ExternalizeError::MissingToken`] when no token is configured,
    /// [`ExternalizeError::InvalidConfig`] for malformed settings.
    pub fn new(config: RepositoryConfig) -> Result<Self, ExternalizeError> {
        config.validate()?;
        let token = match config.token.as_deref() {
            Some(t) if !t.trim().is_empty() => t.trim().to_string(),
            _ => {
                return Err(ExternalizeError::MissingToken {
                    owner: config.owner.clone(),
                    repo: config.repo.clone(),
                })
            }
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("blog-assets/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExternalizeError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            config,
            token,
            client,
        })
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }
}

#[async_trait]
impl ArtifactRepository for GitHubRepository {
    async fn create_object(&self, request: &CreateObject) -> Result<StoredObject, UploadError> {
        let url = self.config.contents_url(&request.filename);
        debug!("PUT {}", url);

        let body = CreateContentsBody {
            message: &request.message,
            content: &request.content,
            branch: &self.config.branch,
        };

        let response = self
            .client
            .put(&url)
            .header(reqwest::header::AUTHORIZATION, format!("token {}", self.token))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .map_err(|e| UploadError::Transport {
                filename: request.filename.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.message,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
            };
            warn!("{}: HTTP {}: {}", request.filename, status.as_u16(), message);
            return Err(UploadError::Rejected {
                filename: request.filename.clone(),
                status: status.as_u16(),
                message,
            });
        }

        let created: CreateContentsResponse =
            response
                .json()
                .await
                .map_err(|e| UploadError::InvalidResponse {
                    filename: request.filename.clone(),
                    message: e.to_string(),
                })?;

        Ok(StoredObject {
            filename: request.filename.clone(),
            url: self.public_url(&request.filename),
            sha: created.content.and_then(|c| c.sha),
        })
    }

    fn public_url(&self, filename: &str) -> String {
        self.config.public_url(filename)
    }
}

// ── In-memory fake ───────────────────────────────────────────────────────

/// An object written to an [`InMemoryRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedObject {
    pub filename: String,
    pub content: String,
    pub message: String,
    pub url: String,
}

/// Repository fake that keeps objects in memory.
///
/// Failures and delays are keyed by payload so tests can shape outcomes
/// without knowing the generated filenames in advance.
#[derive(Debug)]
pub struct InMemoryRepository {
    base_url: String,
    calls: AtomicUsize,
    objects: Mutex<Vec<RecordedObject>>,
    completions: Mutex<Vec<String>>,
    failures: HashMap<String, String>,
    delays: HashMap<String, Duration>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new("https://artifacts.test/images")
    }
}

impl InMemoryRepository {
    /// Empty repository whose objects live under `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            calls: AtomicUsize::new(0),
            objects: Mutex::new(Vec::new()),
            completions: Mutex::new(Vec::new()),
            failures: HashMap::new(),
            delays: HashMap::new(),
        }
    }

    /// Reject every upload of `payload` with `message`.
    pub fn with_failure(mut self, payload: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(payload.into(), message.into());
        self
    }

    /// Hold every upload of `payload` for `delay` before answering.
    pub fn with_delay(mut self, payload: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(payload.into(), delay);
        self
    }

    /// Number of create-object calls received, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Objects created so far, in completion order.
    pub fn objects(&self) -> Vec<RecordedObject> {
        self.objects.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// Content stored at `url`, if an object exists there.
    pub fn content_at(&self, url: &str) -> Option<String> {
        self.objects()
            .into_iter()
            .find(|o| o.url == url)
            .map(|o| o.content)
    }

    /// Filenames of finished calls (successful or not), in completion order.
    pub fn completion_order(&self) -> Vec<String> {
        self.completions.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record_completion(&self, filename: &str) {
        if let Ok(mut c) = self.completions.lock() {
            c.push(filename.to_string());
        }
    }
}

#[async_trait]
impl ArtifactRepository for InMemoryRepository {
    async fn create_object(&self, request: &CreateObject) -> Result<StoredObject, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&request.content) {
            tokio::time::sleep(*delay).await;
        }

        if let Some(message) = self.failures.get(&request.content) {
            self.record_completion(&request.filename);
            return Err(UploadError::Rejected {
                filename: request.filename.clone(),
                status: 422,
                message: message.clone(),
            });
        }

        let url = self.public_url(&request.filename);
        let mut objects = self
            .objects
            .lock()
            .map_err(|e| UploadError::Transport {
                filename: request.filename.clone(),
                message: e.to_string(),
            })?;
        if objects.iter().any(|o| o.filename == request.filename) {
            drop(objects);
            self.record_completion(&request.filename);
            return Err(UploadError::Rejected {
                filename: request.filename.clone(),
                status: 422,
                message: "Invalid request.\n\n\"sha\" wasn't supplied.".to_string(),
            });
        }
        objects.push(RecordedObject {
            filename: request.filename.clone(),
            content: request.content.clone(),
            message: request.message.clone(),
            url: url.clone(),
        });
        drop(objects);
        self.record_completion(&request.filename);

        Ok(StoredObject {
            filename: request.filename.clone(),
            url,
            sha: None,
        })
    }

    fn public_url(&self, filename: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(filename: &str, content: &str) -> CreateObject {
        CreateObject {
            filename: filename.into(),
            content: content.into(),
            message: format!("Add image: {filename}"),
        }
    }

    #[tokio::test]
    async fn in_memory_records_objects() {
        let repo = InMemoryRepository::default();
        let stored = repo.create_object(&request("a.png", "AAAA")).await.unwrap();
        assert_eq!(stored.url, "https://artifacts.test/images/a.png");
        assert_eq!(repo.calls(), 1);
        assert_eq!(repo.content_at(&stored.url).as_deref(), Some("AAAA"));
        assert_eq!(repo.objects()[0].message, "Add image: a.png");
    }

    #[tokio::test]
    async fn in_memory_simulates_failure() {
        let repo = InMemoryRepository::default().with_failure("BAD", "Bad credentials");
        let err = repo.create_object(&request("b.png", "BAD")).await.unwrap_err();
        assert_eq!(err.message(), "Bad credentials");
        assert_eq!(repo.calls(), 1);
        assert!(repo.objects().is_empty());
        assert_eq!(repo.completion_order(), vec!["b.png".to_string()]);
    }

    #[tokio::test]
    async fn in_memory_refuses_to_overwrite() {
        let repo = InMemoryRepository::default();
        repo.create_object(&request("a.png", "AAAA")).await.unwrap();
        let err = repo.create_object(&request("a.png", "BBBB")).await.unwrap_err();
        assert!(matches!(err, UploadError::Rejected { status: 422, .. }));
        assert_eq!(repo.objects().len(), 1);
    }

    #[test]
    fn github_requires_token() {
        let err = GitHubRepository::new(RepositoryConfig::new("club", "img")).unwrap_err();
        assert!(matches!(err, ExternalizeError::MissingToken { .. }));

        let err = GitHubRepository::new(RepositoryConfig::new("club", "img").with_token("  "))
            .unwrap_err();
        assert!(matches!(err, ExternalizeError::MissingToken { .. }));
    }

    #[test]
    fn github_public_url_follows_config() {
        let repo = GitHubRepository::new(
            RepositoryConfig::new("club", "Img_save")
                .with_token("t")
                .with_branch("assets"),
        )
        .unwrap();
        assert_eq!(
            repo.public_url("k3Jd9a.png"),
            "https://github.com/club/Img_save/raw/assets/static/images/k3Jd9a.png"
        );
        assert!(!format!("{repo:?}").contains("\"t\""));
    }

    #[test]
    fn github_request_body_shape() {
        let body = CreateContentsBody {
            message: "Add image: a.png",
            content: "AAAA",
            branch: "main",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["message"], "Add image: a.png");
        assert_eq!(json["content"], "AAAA");
        assert_eq!(json["branch"], "main");
    }

    #[test]
    fn github_transport_error_surfaces_as_upload_error() {
        // Nothing listens on port 9 of the loopback interface.
        let repo = GitHubRepository::new(
            RepositoryConfig::new("club", "img")
                .with_token("t")
                .with_api_base("http://127.0.0.1:9")
                .with_request_timeout_secs(2),
        )
        .unwrap();
        let err = tokio_test::block_on(repo.create_object(&request("a.png", "AAAA"))).unwrap_err();
        assert!(matches!(err, UploadError::Transport { .. }), "got {err:?}");
        assert_eq!(err.filename(), "a.png");
    }
}
