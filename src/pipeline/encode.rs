//! Encoding: raw image bytes → base64 payload for a single attachment.
//!
//! Embedded images already arrive base64-encoded and are uploaded verbatim.
//! This stage serves the attach flow, where the caller has a file on disk
//! and wants a ready-to-paste Markdown reference.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// Base64-encode image bytes for the repository's `content` field.
pub fn encode_image(bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} bytes → {} bytes base64", bytes.len(), b64.len());
    b64
}

/// Subtype for an image file, from its extension.
///
/// `jpg` maps to `jpeg` so attachments and embedded `image/jpeg` data agree.
/// Unknown or missing extensions give `default`.
pub fn subtype_from_path(path: &Path, default: &str) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "jpeg".to_string(),
        Some(e @ ("png" | "gif" | "webp" | "bmp" | "avif" | "tiff")) => e.to_string(),
        Some("tif") => "tiff".to_string(),
        _ => default.to_string(),
    }
}
