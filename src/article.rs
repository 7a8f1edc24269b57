//! Article submission: externalize images, then write the article.
//!
//! The document store only ever sees finished Markdown. If any image upload
//! fails the store is not touched, and the caller surfaces the error so the
//! author can resubmit. A resubmission uploads every image again; nothing is
//! remembered between attempts.

use crate::config::{CommitMessage, ExternalizeConfig};
use crate::error::ExternalizeError;
use crate::externalize::externalize;
use crate::output::ExternalizeStats;
use crate::pipeline::dedup::generate_id;
use crate::repository::ArtifactRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::info;

/// Length of generated article identifiers.
const ARTICLE_ID_LENGTH: usize = 10;

/// What the author submits from the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDraft {
    pub title: String,
    /// Markdown, possibly carrying inline base64 images.
    pub content: String,
    pub author_id: String,
    pub author_avatar_url: Option<String>,
    /// User ids allowed to edit the article.
    pub editors: Vec<String>,
}

/// An article as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub author_avatar_url: Option<String>,
    pub editors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The outcome of a successful submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub article: ArticleRecord,
    pub stats: ExternalizeStats,
}

/// Persistence for articles.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn put_article(&self, record: &ArticleRecord) -> Result<(), ExternalizeError>;

    async fn get_article(&self, id: &str) -> Result<Option<ArticleRecord>, ExternalizeError>;
}

/// Store fake keeping articles in a map and counting writes.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    articles: Mutex<HashMap<String, ArticleRecord>>,
    writes: AtomicUsize,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put_article` calls received.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.articles.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn put_article(&self, record: &ArticleRecord) -> Result<(), ExternalizeError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.articles
            .lock()
            .map_err(|e| ExternalizeError::Store(e.to_string()))?
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_article(&self, id: &str) -> Result<Option<ArticleRecord>, ExternalizeError> {
        Ok(self
            .articles
            .lock()
            .map_err(|e| ExternalizeError::Store(e.to_string()))?
            .get(id)
            .cloned())
    }
}

/// Publish a new article.
///
/// The author is always listed among the editors.
pub async fn submit_new_article(
    draft: &ArticleDraft,
    repo: &dyn ArtifactRepository,
    store: &dyn DocumentStore,
    config: &ExternalizeConfig,
) -> Result<Submission, ExternalizeError> {
    let output = externalize(&draft.content, repo, config).await?;

    let mut editors = vec![draft.author_id.clone()];
    merge_editors(&mut editors, &draft.editors);

    let record = ArticleRecord {
        id: generate_id(ARTICLE_ID_LENGTH),
        title: draft.title.clone(),
        content: output.markdown,
        author_id: draft.author_id.clone(),
        author_avatar_url: draft.author_avatar_url.clone(),
        editors,
        created_at: Utc::now(),
        updated_at: None,
    };
    store.put_article(&record).await?;
    info!("Article {} created", record.id);

    Ok(Submission {
        article: record,
        stats: output.stats,
    })
}

/// Save edits to an existing article.
///
/// Title, content and editors come from `draft`; author and creation time
/// are preserved. Uploads use the "Update image" commit message unless the
/// config asks for a custom one.
pub async fn submit_article_edit(
    id: &str,
    draft: &ArticleDraft,
    repo: &dyn ArtifactRepository,
    store: &dyn DocumentStore,
    config: &ExternalizeConfig,
) -> Result<Submission, ExternalizeError> {
    let existing = store
        .get_article(id)
        .await?
        .ok_or_else(|| ExternalizeError::Store(format!("Article not found: {id}")))?;

    let mut edit_config = config.clone();
    if edit_config.commit_message == CommitMessage::Add {
        edit_config.commit_message = CommitMessage::Update;
    }
    let output = externalize(&draft.content, repo, &edit_config).await?;

    let mut editors = vec![existing.author_id.clone()];
    merge_editors(&mut editors, &draft.editors);

    let record = ArticleRecord {
        title: draft.title.clone(),
        content: output.markdown,
        editors,
        updated_at: Some(Utc::now()),
        ..existing
    };
    store.put_article(&record).await?;
    info!("Article {} updated", record.id);

    Ok(Submission {
        article: record,
        stats: output.stats,
    })
}

fn merge_editors(editors: &mut Vec<String>, extra: &[String]) {
    for e in extra {
        if !e.is_empty() && !editors.contains(e) {
            editors.push(e.clone());
        }
    }
}
