//! Error types for the blog-assets library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`UploadError`] — **Per payload**: one distinct image could not be
//!   written to the artifact repository. On its own it says nothing about
//!   the document; the fan-out coordinator collects one outcome per payload.
//!
//! * [`ExternalizeError`] — **Fatal**: the externalization as a whole is
//!   aborted. Any [`UploadError`] escalates to
//!   [`ExternalizeError::UploadFailed`], and the caller must not persist the
//!   document in that case.
//!
//! Objects already written by sibling uploads are never rolled back.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the blog-assets library.
#[derive(Debug, Error)]
pub enum ExternalizeError {
    // ── Pipeline errors ───────────────────────────────────────────────────
    /// At least one distinct payload failed to upload; the document must
    /// not be written. `source` is the first failure in document order.
    #[error("Image upload failed ({failed} of {total} uploads failed): {source}")]
    UploadFailed {
        total: usize,
        failed: usize,
        #[source]
        source: UploadError,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The repository needs an access token and none was configured.
    #[error("No access token configured for '{owner}/{repo}'.\nSet GITHUB_TOKEN or pass --token.")]
    MissingToken { owner: String, repo: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Input Markdown or image file does not exist.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Input file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Document store errors ─────────────────────────────────────────────
    /// The document store rejected a read or write.
    #[error("Document store error: {0}")]
    Store(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure to create one object in the artifact repository.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum UploadError {
    /// The repository answered with a non-2xx status.
    /// `message` is the repository's own `message` field when present.
    #[error("{filename}: repository rejected upload (HTTP {status}): {message}")]
    Rejected {
        filename: String,
        status: u16,
        message: String,
    },

    /// The request never produced a response (DNS, TLS, timeout, …).
    #[error("{filename}: transport error: {message}")]
    Transport { filename: String, message: String },

    /// A 2xx response arrived but its body was unusable.
    #[error("{filename}: invalid repository response: {message}")]
    InvalidResponse { filename: String, message: String },
}

impl UploadError {
    /// Name of the object the failed upload was meant to create.
    pub fn filename(&self) -> &str {
        match self {
            UploadError::Rejected { filename, .. }
            | UploadError::Transport { filename, .. }
            | UploadError::InvalidResponse { filename, .. } => filename,
        }
    }

    /// The human-readable reason reported by the repository or transport.
    pub fn message(&self) -> &str {
        match self {
            UploadError::Rejected { message, .. }
            | UploadError::Transport { message, .. }
            | UploadError::InvalidResponse { message, .. } => message,
        }
    }
}
