//! # docfuse
//!
//! Convert mixed uploads — images, Office documents, spreadsheets, slide
//! decks, and existing PDFs — into one merged PDF.
//!
//! ## Why this crate?
//!
//! "Send me everything as one PDF" is a boring problem with sharp edges:
//! every input format fails differently, users care about page order, and
//! one corrupt upload must never destroy the other nineteen. This crate
//! keeps the whole pipeline in memory, renders each file independently,
//! and reports per-file outcomes alongside the merged result.
//!
//! ## Pipeline Overview
//!
//! ```text
//! uploads (session-scoped, ordered)
//!  │
//!  ├─ 1. Classify  extension first, magic bytes as fallback
//!  ├─ 2. Render    per-format → lopdf Document (parallel, spawn_blocking)
//!  │                 image / xlsx / docx / pptx / pdf-passthrough
//!  ├─ 3. Collect   failures isolated per file, order restored
//!  └─ 4. Merge     pages concatenated in request order → final PDF bytes
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docfuse::{JobConfig, SessionStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SessionStore::new();
//!     let session = store.create_session().await;
//!
//!     let photo = store
//!         .upload(&session, "photo.jpg", std::fs::read("photo.jpg")?)
//!         .await?;
//!     let report = store
//!         .upload(&session, "report.docx", std::fs::read("report.docx")?)
//!         .await?;
//!
//!     let config = JobConfig::default();
//!     let output =
//!         docfuse::convert_session(&store, &session, &[photo.id, report.id], &config).await?;
//!     std::fs::write("merged.pdf", &output.pdf_bytes)?;
//!     eprintln!(
//!         "{}/{} files, {} pages",
//!         output.stats.converted_files, output.stats.requested_files, output.stats.total_pages
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docfuse` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docfuse = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod classify;
pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use classify::{classify, FileCategory};
pub use config::{JobConfig, JobConfigBuilder, PageSize};
pub use error::{DocfuseError, RenderError, RenderErrorKind};
pub use job::{run_job, CancelFlag, ConversionResult, JobOutput, JobStats};
pub use progress::{JobProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{FileInfo, SessionStore, UploadedFile};

use std::path::Path;
use tracing::info;

/// Convert a session's files (in the given id order) into one merged PDF.
///
/// Takes a stable snapshot of the session first, so concurrent uploads or
/// removals during the job cannot change what this job converts. Unknown
/// ids fail their own slot with [`RenderError::NotFound`] while the rest
/// proceed.
///
/// # Errors
/// Fatal only: unknown session, empty id list, every file failing,
/// cancellation, or a merge failure. Per-file problems land in
/// `output.results`.
pub async fn convert_session(
    store: &SessionStore,
    session_id: &str,
    ordered_file_ids: &[String],
    config: &JobConfig,
) -> Result<JobOutput, DocfuseError> {
    let slots = store.snapshot(session_id, ordered_file_ids).await?;
    job::run_job(slots, config).await
}

/// Convert local files, in argument order, into one merged PDF.
///
/// Convenience wrapper for the CLI: builds a throwaway session, uploads
/// each path's bytes under its file name, and runs the job.
pub async fn convert_files(
    paths: &[impl AsRef<Path>],
    config: &JobConfig,
) -> Result<JobOutput, DocfuseError> {
    let store = SessionStore::new();
    let session_id = store.create_session().await;
    let mut ids = Vec::with_capacity(paths.len());

    for path in paths {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DocfuseError::Internal(format!("cannot read '{}': {e}", path.display())))?;
        let info = store.upload(&session_id, &name, bytes).await?;
        ids.push(info.id);
    }

    convert_session(&store, &session_id, &ids, config).await
}

/// Write PDF bytes to `path` atomically (temp file + rename).
///
/// Creates missing parent directories. A crash mid-write leaves at worst
/// a `.pdf.tmp` file, never a truncated output.
pub async fn write_output(path: impl AsRef<Path>, pdf_bytes: &[u8]) -> Result<(), DocfuseError> {
    let path = path.as_ref();
    let write_err = |e: std::io::Error| DocfuseError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, pdf_bytes)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    info!(path = %path.display(), bytes = pdf_bytes.len(), "output written");
    Ok(())
}
