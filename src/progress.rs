//! Progress-callback trait for per-file conversion events.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::config::JobConfigBuilder::progress_callback`] to receive
//! real-time events as the job renders and merges each file.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a channel, a WebSocket, or a terminal progress bar
//! without the library knowing how the host application communicates. The
//! trait is `Send + Sync` because files render concurrently.

use std::sync::Arc;

/// Called by the orchestrator as the job progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `on_file_start`, `on_file_complete`, and
/// `on_file_error` may be called concurrently from different worker
/// threads; implementations must synchronise any shared mutable state.
pub trait JobProgressCallback: Send + Sync {
    /// Called once before any file is rendered.
    fn on_job_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a file's render is dispatched.
    ///
    /// `index` is the file's 0-based slot in the requested order.
    fn on_file_start(&self, index: usize, total_files: usize, name: &str) {
        let _ = (index, total_files, name);
    }

    /// Called when a file rendered successfully.
    fn on_file_complete(&self, index: usize, total_files: usize, page_count: usize) {
        let _ = (index, total_files, page_count);
    }

    /// Called when a file failed to render.
    fn on_file_error(&self, index: usize, total_files: usize, error: &str) {
        let _ = (index, total_files, error);
    }

    /// Called once all renders are in, just before page concatenation.
    fn on_merge_start(&self, document_count: usize) {
        let _ = document_count;
    }

    /// Called once after the merged document is assembled (or the job
    /// failed entirely).
    fn on_job_complete(&self, total_files: usize, succeeded: usize) {
        let _ = (total_files, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::JobConfig`].
pub type ProgressCallback = Arc<dyn JobProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        merged_docs: AtomicUsize,
    }

    impl JobProgressCallback for TrackingCallback {
        fn on_file_start(&self, _index: usize, _total: usize, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_complete(&self, _index: usize, _total: usize, _pages: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_merge_start(&self, document_count: usize) {
            self.merged_docs.store(document_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_job_start(3);
        cb.on_file_start(0, 3, "a.png");
        cb.on_file_complete(0, 3, 1);
        cb.on_file_error(1, 3, "corrupt");
        cb.on_merge_start(2);
        cb.on_job_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            merged_docs: AtomicUsize::new(0),
        };

        tracker.on_file_start(0, 2, "a.png");
        tracker.on_file_complete(0, 2, 3);
        tracker.on_file_start(1, 2, "b.bin");
        tracker.on_file_error(1, 2, "unsupported");
        tracker.on_merge_start(1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.merged_docs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn JobProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_job_start(10);
        cb.on_file_complete(0, 10, 2);
    }
}
