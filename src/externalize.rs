//! Externalization entry points.
//!
//! [`externalize`] runs the whole pipeline on one document and returns the
//! rewritten text only if every distinct image was uploaded. On failure the
//! caller gets the first upload error and no text at all, so there is nothing
//! partial to persist by mistake.

use crate::config::ExternalizeConfig;
use crate::error::ExternalizeError;
use crate::output::{ExternalizeOutput, ExternalizeStats};
use crate::pipeline::{dedup, encode, extract, fanout, rewrite, upload};
use crate::repository::ArtifactRepository;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Upload every inline base64 image in `text` and rewrite it to link to them.
///
/// # Returns
/// `Ok(ExternalizeOutput)` when all distinct images were uploaded (or there
/// were none). The output text differs from the input only at embeddings.
///
/// # Errors
/// [`ExternalizeError::UploadFailed`] when any upload failed. Every upload is
/// still awaited first; objects already created are not deleted.
///
/// # Example
/// ```rust
/// use blog_assets::{externalize, ExternalizeConfig, InMemoryRepository};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let repo = InMemoryRepository::new("https://img.test");
/// let doc = "Hi ![x](data:image/png;base64,AAAA)";
/// let out = externalize(doc, &repo, &ExternalizeConfig::default()).await?;
/// assert!(out.markdown.starts_with("Hi ![x](https://img.test/"));
/// assert!(out.markdown.ends_with(".png)"));
/// # Ok(())
/// # }
/// ```
pub async fn externalize(
    text: &str,
    repo: &dyn ArtifactRepository,
    config: &ExternalizeConfig,
) -> Result<ExternalizeOutput, ExternalizeError> {
    let start = Instant::now();

    if !extract::has_embedded_images(text) {
        debug!("No embedded images; document unchanged");
        return Ok(ExternalizeOutput {
            markdown: text.to_string(),
            uploads: Vec::new(),
            stats: ExternalizeStats {
                duration_ms: start.elapsed().as_millis() as u64,
                ..Default::default()
            },
        });
    }

    // ── Step 1+2: Extract and deduplicate ────────────────────────────────
    let plan = dedup::plan_uploads(extract::extract_images(text), config);
    info!(
        "Externalizing {} embedded images ({} distinct)",
        plan.embeddings,
        plan.tasks.len()
    );

    // ── Step 3: Upload all, join, fail fast ──────────────────────────────
    let resolved = fanout::upload_all(repo, &plan, config).await?;

    // ── Step 4: Rewrite ──────────────────────────────────────────────────
    let markdown = rewrite::rewrite(text, &resolved.map);

    let stats = ExternalizeStats {
        embeddings: plan.embeddings,
        distinct_payloads: plan.tasks.len(),
        uploads_succeeded: resolved.uploads.len(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Externalization complete: {} uploads, {}ms",
        stats.uploads_succeeded, stats.duration_ms
    );

    Ok(ExternalizeOutput {
        markdown,
        uploads: resolved.uploads,
        stats,
    })
}

/// Synchronous wrapper around [`externalize`].
///
/// Creates a temporary tokio runtime internally.
pub fn externalize_sync(
    text: &str,
    repo: &dyn ArtifactRepository,
    config: &ExternalizeConfig,
) -> Result<ExternalizeOutput, ExternalizeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExternalizeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(externalize(text, repo, config))
}

/// Externalize a Markdown file and write the result to `output_path`.
///
/// The output is written atomically (temp file in the target directory, then
/// rename). Nothing is written when the pipeline fails.
pub async fn externalize_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    repo: &dyn ArtifactRepository,
    config: &ExternalizeConfig,
) -> Result<ExternalizeStats, ExternalizeError> {
    let text = read_to_string(input_path.as_ref()).await?;
    let output = externalize(&text, repo, config).await?;
    write_atomic(output_path.as_ref(), &output.markdown).await?;
    Ok(output.stats)
}

/// Upload raw image bytes as one object and return its Markdown reference.
///
/// Mirrors attaching a picture to a draft: the returned `![alt](url)` is
/// ready to append to the article body.
pub async fn attach_image(
    bytes: &[u8],
    subtype: &str,
    alt: &str,
    repo: &dyn ArtifactRepository,
    config: &ExternalizeConfig,
) -> Result<String, ExternalizeError> {
    let payload = encode::encode_image(bytes);
    let id = dedup::generate_id(config.effective_id_length());
    let task = dedup::UploadTask {
        payload: &payload,
        filename: format!(
            "{id}.{}",
            dedup::extension_for(subtype, &config.default_subtype)
        ),
        id,
        occurrences: 1,
    };

    let stored = upload::upload_task(repo, &task, config)
        .await
        .map_err(|source| ExternalizeError::UploadFailed {
            total: 1,
            failed: 1,
            source,
        })?;
    info!("Attached {} → {}", stored.filename, stored.url);
    Ok(format!("![{alt}]({})", stored.url))
}

/// [`attach_image`] for a file on disk; the subtype comes from its extension.
pub async fn attach_image_file(
    path: impl AsRef<Path>,
    alt: &str,
    repo: &dyn ArtifactRepository,
    config: &ExternalizeConfig,
) -> Result<String, ExternalizeError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| read_error(path, e))?;
    let subtype = encode::subtype_from_path(path, &config.default_subtype);
    attach_image(&bytes, &subtype, alt, repo, config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn read_to_string(path: &Path) -> Result<String, ExternalizeError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| read_error(path, e))
}

fn read_error(path: &Path, e: std::io::Error) -> ExternalizeError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ExternalizeError::FileNotFound {
            path: path.to_path_buf(),
        }
    } else {
        ExternalizeError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        }
    }
}

async fn write_atomic(path: &Path, contents: &str) -> Result<(), ExternalizeError> {
    let write_err = |source: std::io::Error| ExternalizeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&parent).await.map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(contents.as_bytes()).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;

    #[tokio::test]
    async fn no_embeddings_is_a_no_op() {
        let repo = InMemoryRepository::default();
        let text = "# Title\n\n![remote](https://a.test/x.png)\n";
        let out = externalize(text, &repo, &ExternalizeConfig::default())
            .await
            .unwrap();
        assert_eq!(out.markdown, text);
        assert!(out.uploads.is_empty());
        assert_eq!(out.stats.embeddings, 0);
        assert_eq!(repo.calls(), 0);
    }

    #[tokio::test]
    async fn attach_returns_markdown_reference() {
        let repo = InMemoryRepository::new("https://img.test");
        let md = attach_image(b"\x89PNG", "png", "logo", &repo, &ExternalizeConfig::default())
            .await
            .unwrap();
        assert!(md.starts_with("![logo](https://img.test/"), "got {md}");
        assert!(md.ends_with(".png)"));

        let objects = repo.objects();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].content, "iVBORw==");
        assert_eq!(objects[0].message, format!("Add image: {}", objects[0].filename));
    }

    #[tokio::test]
    async fn attach_failure_is_fatal() {
        let repo = InMemoryRepository::default().with_failure("iVBORw==", "Bad credentials");
        let err = attach_image(b"\x89PNG", "png", "", &repo, &ExternalizeConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExternalizeError::UploadFailed { total: 1, .. }));
    }

    #[tokio::test]
    async fn missing_input_file() {
        let repo = InMemoryRepository::default();
        let err = externalize_file(
            "/definitely/not/here.md",
            "/tmp/out.md",
            &repo,
            &ExternalizeConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ExternalizeError::FileNotFound { .. }));
    }

    #[test]
    fn sync_wrapper_runs_pipeline() {
        let repo = InMemoryRepository::default();
        let out = externalize_sync(
            "![a](data:image/png;base64,AAAA)",
            &repo,
            &ExternalizeConfig::default(),
        )
        .unwrap();
        assert_eq!(out.stats.uploads_succeeded, 1);
        assert_eq!(repo.calls(), 1);
    }
}
