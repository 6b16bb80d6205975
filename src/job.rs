//! Job orchestration: parallel per-file rendering, then an ordered merge.
//!
//! ## Failure isolation
//!
//! Each file renders independently on a blocking worker; a bad upload
//! produces a [`ConversionResult`] carrying its [`RenderError`] while the
//! rest of the batch proceeds. Only two things are fatal: every file
//! failing ([`DocfuseError::AllConversionsFailed`]) and the merge itself
//! breaking. Callers inspect `results` for the per-file breakdown either
//! way.
//!
//! ## Ordering
//!
//! Renders complete in whatever order the worker pool finishes them;
//! results are re-sorted to the requested order before merging, so output
//! page order always matches the caller's file order.

use crate::config::JobConfig;
use crate::error::{DocfuseError, RenderError};
use crate::pipeline;
use crate::session::UploadedFile;
use futures::stream::{self, StreamExt};
use lopdf::Document;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::classify::FileCategory;

/// Cooperative cancellation handle shared between a job and its caller.
///
/// Cancelling stops not-yet-dispatched renders; in-flight renders run to
/// completion (or timeout) and their output is discarded. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of one file's conversion attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    /// Id the caller requested (echoed even when the id was unknown).
    pub file_id: String,
    /// Original upload name, or the id itself when the file was not found.
    pub original_name: String,
    pub category: FileCategory,
    /// Pages this file contributed to the merged output. 0 on failure.
    pub page_count: usize,
    /// Wall-clock render time for this file.
    pub duration_ms: u64,
    /// `None` on success.
    pub error: Option<RenderError>,
}

impl ConversionResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate statistics for one job.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStats {
    pub requested_files: usize,
    pub converted_files: usize,
    pub failed_files: usize,
    /// Pages in the merged output.
    pub total_pages: usize,
    pub render_duration_ms: u64,
    pub merge_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// A finished job: the merged PDF plus the per-file breakdown.
#[derive(Debug)]
pub struct JobOutput {
    pub pdf_bytes: Vec<u8>,
    pub results: Vec<ConversionResult>,
    pub stats: JobStats,
}

/// Run one conversion job over a session snapshot.
///
/// `slots` pairs each requested file id with the snapshotted upload
/// (`None` when the id was unknown at snapshot time). Slot order is the
/// caller's requested order and determines output page order.
///
/// Returns `Ok` even when some files failed; check
/// `output.stats.failed_files`. Fatal errors only: empty request, every
/// file failing, cancellation, or a broken merge.
pub async fn run_job(
    slots: Vec<(String, Option<UploadedFile>)>,
    config: &JobConfig,
) -> Result<JobOutput, DocfuseError> {
    let total_start = Instant::now();
    let total = slots.len();
    if total == 0 {
        return Err(DocfuseError::EmptyInput);
    }
    info!(files = total, concurrency = config.concurrency, "starting conversion job");

    if let Some(ref cb) = config.progress_callback {
        cb.on_job_start(total);
    }

    // ── Render phase ─────────────────────────────────────────────────────
    let render_start = Instant::now();
    let mut rendered: Vec<(usize, ConversionResult, Option<Document>)> =
        stream::iter(slots.into_iter().enumerate().map(|(index, (file_id, file))| {
            let config = config.clone();
            async move {
                let (result, doc) = render_slot(index, total, file_id, file, &config).await;
                (index, result, doc)
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    // Completion order is arbitrary; restore request order.
    rendered.sort_by_key(|(index, _, _)| *index);

    if config.cancel.is_cancelled() {
        warn!("job cancelled");
        return Err(DocfuseError::Cancelled);
    }

    let mut results = Vec::with_capacity(total);
    let mut documents = Vec::new();
    for (_, result, doc) in rendered {
        if let Some(doc) = doc {
            documents.push(doc);
        }
        results.push(result);
    }

    let converted = results.iter().filter(|r| r.succeeded()).count();
    let failed = total - converted;
    if converted == 0 {
        let first_error = results
            .iter()
            .find_map(|r| r.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(DocfuseError::AllConversionsFailed { total, first_error });
    }

    // ── Merge phase ──────────────────────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_merge_start(documents.len());
    }
    let merge_start = Instant::now();
    let mut merged = pipeline::merge(documents)?;
    let total_pages = merged.get_pages().len();
    let mut pdf_bytes = Vec::new();
    merged
        .save_to(&mut pdf_bytes)
        .map_err(|e| DocfuseError::MergeFailed {
            detail: format!("could not serialise merged document: {e}"),
        })?;
    let merge_duration_ms = merge_start.elapsed().as_millis() as u64;

    let stats = JobStats {
        requested_files: total,
        converted_files: converted,
        failed_files: failed,
        total_pages,
        render_duration_ms,
        merge_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        converted,
        failed, total_pages, total_ms = stats.total_duration_ms, "job complete"
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_job_complete(total, converted);
    }

    Ok(JobOutput {
        pdf_bytes,
        results,
        stats,
    })
}

/// Render one slot: resolve, dispatch to a blocking worker, enforce the
/// per-file timeout, and fold the outcome into a [`ConversionResult`].
async fn render_slot(
    index: usize,
    total: usize,
    file_id: String,
    file: Option<UploadedFile>,
    config: &JobConfig,
) -> (ConversionResult, Option<Document>) {
    fn failure(
        file_id: String,
        name: String,
        category: FileCategory,
        error: RenderError,
        ms: u64,
    ) -> ConversionResult {
        ConversionResult {
            file_id,
            original_name: name,
            category,
            page_count: 0,
            duration_ms: ms,
            error: Some(error),
        }
    }

    if config.cancel.is_cancelled() {
        let name = file_id.clone();
        return (
            failure(
                file_id,
                name,
                FileCategory::Unsupported,
                RenderError::Cancelled,
                0,
            ),
            None,
        );
    }

    let Some(file) = file else {
        let error = RenderError::NotFound {
            file_id: file_id.clone(),
        };
        if let Some(ref cb) = config.progress_callback {
            cb.on_file_error(index, total, &error.to_string());
        }
        let name = file_id.clone();
        return (
            failure(file_id, name, FileCategory::Unsupported, error, 0),
            None,
        );
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_file_start(index, total, &file.original_name);
    }

    let start = Instant::now();
    let name = file.original_name.clone();
    let category = file.category;

    let worker_config = config.clone();
    let worker_file = file.clone();
    let handle =
        tokio::task::spawn_blocking(move || pipeline::render(&worker_file, &worker_config));

    let outcome = match tokio::time::timeout(
        Duration::from_secs(config.render_timeout_secs),
        handle,
    )
    .await
    {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(RenderError::corrupt(format!(
            "render worker failed: {join_err}"
        ))),
        Err(_) => Err(RenderError::Timeout {
            secs: config.render_timeout_secs,
        }),
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(doc) => {
            let page_count = doc.get_pages().len();
            debug!(name = %name, page_count, duration_ms, "file rendered");
            if let Some(ref cb) = config.progress_callback {
                cb.on_file_complete(index, total, page_count);
            }
            (
                ConversionResult {
                    file_id,
                    original_name: name,
                    category,
                    page_count,
                    duration_ms,
                    error: None,
                },
                Some(doc),
            )
        }
        Err(error) => {
            warn!(name = %name, %error, "file failed to render");
            if let Some(ref cb) = config.progress_callback {
                cb.on_file_error(index, total, &error.to_string());
            }
            (failure(file_id, name, category, error, duration_ms), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::error::RenderErrorKind;
    use crate::progress::JobProgressCallback;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::AtomicUsize;

    fn upload(name: &str, bytes: Vec<u8>, position: usize) -> (String, Option<UploadedFile>) {
        let id = format!("f{position}");
        let file = UploadedFile {
            id: id.clone(),
            original_name: name.into(),
            category: classify(name, &bytes),
            size_bytes: bytes.len() as u64,
            content: Arc::from(bytes),
            position,
        };
        (id, Some(file))
    }

    fn png_bytes() -> Vec<u8> {
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([9, 99, 199])))
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[tokio::test]
    async fn one_bad_file_does_not_sink_the_job() {
        let slots = vec![
            upload("a.png", png_bytes(), 0),
            upload("broken.png", b"garbage".to_vec(), 1),
            upload("b.png", png_bytes(), 2),
        ];
        let output = run_job(slots, &JobConfig::default()).await.unwrap();

        assert_eq!(output.stats.requested_files, 3);
        assert_eq!(output.stats.converted_files, 2);
        assert_eq!(output.stats.failed_files, 1);
        assert_eq!(output.stats.total_pages, 2);
        assert!(!output.pdf_bytes.is_empty());

        // Results come back in request order regardless of completion order.
        let ids: Vec<&str> = output.results.iter().map(|r| r.file_id.as_str()).collect();
        assert_eq!(ids, vec!["f0", "f1", "f2"]);
        assert!(output.results[0].succeeded());
        assert_eq!(
            output.results[1].error.as_ref().unwrap().kind(),
            RenderErrorKind::CorruptInput
        );
        assert!(output.results[2].succeeded());
    }

    #[tokio::test]
    async fn all_failures_are_fatal() {
        let slots = vec![
            upload("x.png", b"nope".to_vec(), 0),
            upload("y.png", vec![], 1),
        ];
        let err = run_job(slots, &JobConfig::default()).await.unwrap_err();
        match err {
            DocfuseError::AllConversionsFailed { total, first_error } => {
                assert_eq!(total, 2);
                assert!(!first_error.is_empty());
            }
            other => panic!("expected AllConversionsFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_request_is_rejected() {
        let err = run_job(vec![], &JobConfig::default()).await.unwrap_err();
        assert!(matches!(err, DocfuseError::EmptyInput));
    }

    #[tokio::test]
    async fn unknown_id_fails_its_slot_only() {
        let slots = vec![
            upload("a.png", png_bytes(), 0),
            ("missing-id".to_string(), None),
        ];
        let output = run_job(slots, &JobConfig::default()).await.unwrap();
        assert_eq!(output.stats.converted_files, 1);
        assert_eq!(
            output.results[1].error.as_ref().unwrap().kind(),
            RenderErrorKind::NotFound
        );
        assert_eq!(output.results[1].file_id, "missing-id");
    }

    #[tokio::test]
    async fn pre_cancelled_job_fails_cancelled() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let config = JobConfig::builder().cancel(cancel).build().unwrap();
        let err = run_job(vec![upload("a.png", png_bytes(), 0)], &config)
            .await
            .unwrap_err();
        assert!(matches!(err, DocfuseError::Cancelled));
    }

    #[derive(Default)]
    struct CountingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        merges: AtomicUsize,
    }

    impl JobProgressCallback for CountingCallback {
        fn on_file_start(&self, _index: usize, _total: usize, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_file_complete(&self, _index: usize, _total: usize, _page_count: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_file_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_merge_start(&self, _document_count: usize) {
            self.merges.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn progress_callbacks_fire_per_file() {
        let cb = Arc::new(CountingCallback::default());
        let config = JobConfig::builder()
            .progress_callback(cb.clone())
            .build()
            .unwrap();
        let slots = vec![
            upload("a.png", png_bytes(), 0),
            upload("bad.png", b"junk".to_vec(), 1),
        ];
        run_job(slots, &config).await.unwrap();

        assert_eq!(cb.starts.load(Ordering::SeqCst), 2);
        assert_eq!(cb.completes.load(Ordering::SeqCst), 1);
        assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
        assert_eq!(cb.merges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_flag_round_trips() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
