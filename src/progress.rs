//! Progress-callback trait for per-upload externalization events.
//!
//! Inject an [`Arc<dyn ExternalizeProgressCallback>`] via
//! [`crate::config::ExternalizeConfigBuilder::progress_callback`] to receive
//! events as each distinct image is uploaded.
//!
//! # Example
//!
//! ```rust
//! use blog_assets::{ExternalizeProgressCallback, ExternalizeConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     uploaded: Arc<AtomicUsize>,
//! }
//!
//! impl ExternalizeProgressCallback for CountingCallback {
//!     fn on_upload_complete(&self, filename: &str, url: &str) {
//!         self.uploaded.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{filename} -> {url}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     uploaded: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ExternalizeConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExternalizeProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it uploads each distinct payload.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// Uploads are multiplexed on one task, but a callback may be shared with
/// other runs on other threads, so implementations must be `Send + Sync`
/// and protect shared mutable state accordingly.
pub trait ExternalizeProgressCallback: Send + Sync {
    /// Called once before any upload is issued.
    ///
    /// # Arguments
    /// * `distinct_payloads` — number of uploads that will be attempted
    fn on_externalize_start(&self, distinct_payloads: usize) {
        let _ = distinct_payloads;
    }

    /// Called just before the create-object request is sent.
    fn on_upload_start(&self, filename: &str) {
        let _ = filename;
    }

    /// Called when an object was created.
    fn on_upload_complete(&self, filename: &str, url: &str) {
        let _ = (filename, url);
    }

    /// Called when an upload failed.
    fn on_upload_error(&self, filename: &str, error: &str) {
        let _ = (filename, error);
    }

    /// Called once after every upload has finished, successful or not.
    ///
    /// # Arguments
    /// * `distinct_payloads` — uploads attempted
    /// * `success_count`     — uploads that created an object
    fn on_externalize_complete(&self, distinct_payloads: usize, success_count: usize) {
        let _ = (distinct_payloads, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExternalizeProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExternalizeConfig`].
pub type ProgressCallback = Arc<dyn ExternalizeProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        succeeded: AtomicUsize,
    }

    impl ExternalizeProgressCallback for TrackingCallback {
        fn on_upload_start(&self, _filename: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_upload_complete(&self, _filename: &str, _url: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_upload_error(&self, _filename: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_externalize_complete(&self, _distinct: usize, success_count: usize) {
            self.succeeded.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_externalize_start(2);
        cb.on_upload_start("a.png");
        cb.on_upload_complete("a.png", "https://example.org/a.png");
        cb.on_upload_error("b.png", "Bad credentials");
        cb.on_externalize_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_upload_start("a.png");
        tracker.on_upload_complete("a.png", "u");
        tracker.on_upload_start("b.png");
        tracker.on_upload_error("b.png", "boom");
        tracker.on_externalize_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.succeeded.load(Ordering::SeqCst), 1);
    }
}
