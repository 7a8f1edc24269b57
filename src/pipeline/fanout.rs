//! Fan-out: run every planned upload, join them all, then decide.
//!
//! Uploads are multiplexed on the calling task with `buffer_unordered`; no
//! task is spawned, and nothing is cancelled. Once the stream is drained
//! every outcome is known, and only then is the result aggregated:
//!
//! * all succeeded → a complete [`ResolutionMap`]
//! * any failed    → [`ExternalizeError::UploadFailed`] carrying the first
//!   failure in task order; objects created by sibling uploads stay in the
//!   repository.
//!
//! The map is assembled after the join, so a partially filled map is never
//! observable.

use crate::config::ExternalizeConfig;
use crate::error::{ExternalizeError, UploadError};
use crate::output::UploadRecord;
use crate::pipeline::dedup::UploadPlan;
use crate::pipeline::upload::upload_task;
use crate::repository::{ArtifactRepository, StoredObject};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::{info, warn};

/// Payload → public address, complete for every distinct payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionMap<'a> {
    urls: HashMap<&'a str, String>,
}

impl<'a> ResolutionMap<'a> {
    pub fn get(&self, payload: &str) -> Option<&str> {
        self.urls.get(payload).map(String::as_str)
    }

    pub fn contains(&self, payload: &str) -> bool {
        self.urls.contains_key(payload)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, String)> for ResolutionMap<'a> {
    fn from_iter<T: IntoIterator<Item = (&'a str, String)>>(iter: T) -> Self {
        Self {
            urls: iter.into_iter().collect(),
        }
    }
}

/// Result of a successful fan-out.
#[derive(Debug, Clone)]
pub struct Resolved<'a> {
    pub map: ResolutionMap<'a>,
    /// One record per distinct payload, in task order.
    pub uploads: Vec<UploadRecord>,
}

/// Upload every task in `plan` and join on all of them.
pub async fn upload_all<'a>(
    repo: &dyn ArtifactRepository,
    plan: &UploadPlan<'a>,
    config: &ExternalizeConfig,
) -> Result<Resolved<'a>, ExternalizeError> {
    let total = plan.tasks.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_externalize_start(total);
    }

    let mut outcomes: Vec<(usize, Result<StoredObject, UploadError>)> =
        stream::iter(plan.tasks.iter().enumerate().map(|(i, task)| async move {
            (i, upload_task(repo, task, config).await)
        }))
        .buffer_unordered(config.fan_out_width(total))
        .collect()
        .await;

    // Completion order is arbitrary; aggregate in task order.
    outcomes.sort_by_key(|(i, _)| *i);

    let succeeded = outcomes.iter().filter(|(_, r)| r.is_ok()).count();
    if let Some(ref cb) = config.progress_callback {
        cb.on_externalize_complete(total, succeeded);
    }

    let mut map = HashMap::with_capacity(total);
    let mut uploads = Vec::with_capacity(total);
    let mut first_failure: Option<UploadError> = None;

    for (i, outcome) in outcomes {
        let task = &plan.tasks[i];
        match outcome {
            Ok(stored) => {
                map.insert(task.payload, stored.url.clone());
                uploads.push(UploadRecord {
                    filename: stored.filename,
                    url: stored.url,
                    occurrences: task.occurrences,
                });
            }
            Err(e) => {
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }
    }

    if let Some(source) = first_failure {
        let failed = total - succeeded;
        warn!(
            "{}/{} uploads failed; {} created objects are left in the repository",
            failed, total, succeeded
        );
        return Err(ExternalizeError::UploadFailed {
            total,
            failed,
            source,
        });
    }

    info!("Uploaded {} distinct images", total);
    Ok(Resolved {
        map: ResolutionMap { urls: map },
        uploads,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dedup::plan_uploads;
    use crate::pipeline::extract::extract_images;
    use crate::repository::InMemoryRepository;
    use std::time::Duration;

    const DOC: &str = "![a](data:image/png;base64,AAAA) ![b](data:image/png;base64,BBBB) \
                       ![c](data:image/png;base64,CCCC) ![a](data:image/png;base64,AAAA)";

    #[tokio::test]
    async fn resolves_every_distinct_payload() {
        let repo = InMemoryRepository::default();
        let config = ExternalizeConfig::default();
        let plan = plan_uploads(extract_images(DOC), &config);

        let resolved = upload_all(&repo, &plan, &config).await.unwrap();
        assert_eq!(repo.calls(), 3);
        assert_eq!(resolved.map.len(), 3);
        for task in &plan.tasks {
            assert!(resolved.map.contains(task.payload));
        }
        assert_eq!(resolved.uploads[0].occurrences, 2);
        assert_eq!(resolved.uploads[0].filename, plan.tasks[0].filename);
    }

    #[tokio::test]
    async fn failure_waits_for_slow_siblings() {
        let repo = InMemoryRepository::default()
            .with_failure("AAAA", "Bad credentials")
            .with_delay("CCCC", Duration::from_millis(50));
        let config = ExternalizeConfig::default();
        let plan = plan_uploads(extract_images(DOC), &config);

        let err = upload_all(&repo, &plan, &config).await.unwrap_err();
        match err {
            ExternalizeError::UploadFailed {
                total,
                failed,
                source,
            } => {
                assert_eq!(total, 3);
                assert_eq!(failed, 1);
                assert_eq!(source.message(), "Bad credentials");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The slow sibling still ran to completion and left its object behind.
        assert_eq!(repo.completion_order().len(), 3);
        assert_eq!(repo.objects().len(), 2);
    }

    #[tokio::test]
    async fn first_failure_is_in_document_order() {
        // AAAA fails last in time but first in the document.
        let repo = InMemoryRepository::default()
            .with_failure("AAAA", "first")
            .with_delay("AAAA", Duration::from_millis(50))
            .with_failure("CCCC", "second");
        let config = ExternalizeConfig::default();
        let plan = plan_uploads(extract_images(DOC), &config);

        let err = upload_all(&repo, &plan, &config).await.unwrap_err();
        match err {
            ExternalizeError::UploadFailed { failed, source, .. } => {
                assert_eq!(failed, 2);
                assert_eq!(source.message(), "first");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn bounded_width_still_uploads_everything() {
        let repo = InMemoryRepository::default();
        let config = ExternalizeConfig::builder()
            .max_concurrent_uploads(1)
            .build()
            .unwrap();
        let plan = plan_uploads(extract_images(DOC), &config);

        let resolved = upload_all(&repo, &plan, &config).await.unwrap();
        assert_eq!(resolved.map.len(), 3);
        let order: Vec<String> = plan.tasks.iter().map(|t| t.filename.clone()).collect();
        assert_eq!(repo.completion_order(), order);
    }

    #[tokio::test]
    async fn empty_plan_makes_no_calls() {
        let repo = InMemoryRepository::default();
        let config = ExternalizeConfig::default();
        let plan = plan_uploads(extract_images("plain"), &config);
        let resolved = upload_all(&repo, &plan, &config).await.unwrap();
        assert!(resolved.map.is_empty());
        assert_eq!(repo.calls(), 0);
    }
}
