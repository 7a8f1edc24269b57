//! Upload: turn one [`UploadTask`] into one create-object request.
//!
//! This is the pipeline's only suspension point. No retry happens here; a
//! failure is reported once and the coordinator decides what it means for
//! the document.

use crate::config::ExternalizeConfig;
use crate::error::UploadError;
use crate::pipeline::dedup::UploadTask;
use crate::repository::{ArtifactRepository, CreateObject, StoredObject};
use std::time::Instant;
use tracing::{debug, warn};

/// Upload a single distinct payload and return the created object.
pub async fn upload_task(
    repo: &dyn ArtifactRepository,
    task: &UploadTask<'_>,
    config: &ExternalizeConfig,
) -> Result<StoredObject, UploadError> {
    let start = Instant::now();
    if let Some(ref cb) = config.progress_callback {
        cb.on_upload_start(&task.filename);
    }

    let request = CreateObject {
        filename: task.filename.clone(),
        content: task.payload.to_string(),
        message: config.commit_message.render(&task.filename),
    };

    let result = repo.create_object(&request).await;

    match &result {
        Ok(stored) => {
            debug!(
                "{}: {} base64 bytes uploaded in {:?} → {}",
                task.filename,
                task.payload.len(),
                start.elapsed(),
                stored.url
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_upload_complete(&task.filename, &stored.url);
            }
        }
        Err(e) => {
            warn!("{}: upload failed: {}", task.filename, e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_upload_error(&task.filename, e.message());
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommitMessage;
    use crate::repository::InMemoryRepository;

    fn task(payload: &str) -> UploadTask<'_> {
        UploadTask {
            payload,
            id: "abcdefghij".into(),
            filename: "abcdefghij.png".into(),
            occurrences: 1,
        }
    }

    #[tokio::test]
    async fn uploads_payload_with_commit_message() {
        let repo = InMemoryRepository::default();
        let config = ExternalizeConfig::builder()
            .commit_message(CommitMessage::Update)
            .build()
            .unwrap();

        let stored = upload_task(&repo, &task("AAAA"), &config).await.unwrap();
        assert_eq!(stored.filename, "abcdefghij.png");

        let objects = repo.objects();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].content, "AAAA");
        assert_eq!(objects[0].message, "Update image: abcdefghij.png");
    }

    #[tokio::test]
    async fn failure_carries_repository_message() {
        let repo = InMemoryRepository::default().with_failure("AAAA", "Bad credentials");
        let err = upload_task(&repo, &task("AAAA"), &ExternalizeConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Bad credentials");
        assert_eq!(err.filename(), "abcdefghij.png");
    }
}
