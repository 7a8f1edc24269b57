//! Result types returned by the externalize entry points.

use serde::{Deserialize, Serialize};

/// A finished externalization: the rewritten document plus what was uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalizeOutput {
    /// Document text with every embedding replaced by a link.
    pub markdown: String,
    /// One record per distinct payload, in order of first appearance.
    pub uploads: Vec<UploadRecord>,
    pub stats: ExternalizeStats,
}

/// One object created in the artifact repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub filename: String,
    pub url: String,
    /// Embeddings in the document that now point at `url`.
    pub occurrences: usize,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalizeStats {
    /// Embeddings found, duplicates included.
    pub embeddings: usize,
    /// Distinct payloads, i.e. uploads attempted.
    pub distinct_payloads: usize,
    pub uploads_succeeded: usize,
    pub duration_ms: u64,
}
