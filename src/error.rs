//! Error types for the docfuse library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DocfuseError`] — **Fatal**: the job cannot produce any output at all
//!   (unknown session, every input failed, a non-permutation reorder).
//!   Returned as `Err(DocfuseError)` from the top-level entry points.
//!
//! * [`RenderError`] — **Non-fatal**: a single file failed (unsupported
//!   format, corrupt bytes, render timeout) but other files are fine.
//!   Stored inside [`crate::job::ConversionResult`] so callers can inspect
//!   partial success rather than losing the whole batch to one bad upload.
//!
//! The separation lets callers decide their own tolerance: abort on the
//! first file failure, log and continue, or report every skipped input.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docfuse library.
///
/// File-level failures use [`RenderError`] and are stored in
/// [`crate::job::ConversionResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DocfuseError {
    // ── Session errors ────────────────────────────────────────────────────
    /// No session exists under the given identifier.
    #[error("Unknown session: '{session_id}'")]
    SessionNotFound { session_id: String },

    /// A store operation named a file id the session does not contain.
    #[error("Unknown file id: '{file_id}'")]
    FileNotFound { file_id: String },

    /// A reorder request was not a permutation of the session's file ids.
    #[error("Invalid file order: {detail}")]
    InvalidOrder { detail: String },

    // ── Job errors ────────────────────────────────────────────────────────
    /// Every requested file failed to render; no output can be produced.
    #[error("All {total} conversions failed.\nFirst error: {first_error}")]
    AllConversionsFailed { total: usize, first_error: String },

    /// The merge engine was handed zero documents.
    #[error("Nothing to merge: the input document list is empty")]
    EmptyInput,

    /// The caller cancelled the job before it completed.
    #[error("Job cancelled before completion")]
    Cancelled,

    /// Page concatenation failed while assembling the output document.
    #[error("Merge failed: {detail}")]
    MergeFailed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single file in a job.
///
/// Stored in [`crate::job::ConversionResult`] when a file fails. The job
/// continues unless ALL files fail.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum RenderError {
    /// The file's format has no renderer (unknown extension, or a legacy
    /// binary Office format with no OOXML content).
    #[error("Unsupported format: {detail}")]
    UnsupportedFormat { detail: String },

    /// The file is empty, truncated, or could not be decoded.
    #[error("Corrupt input: {detail}")]
    CorruptInput { detail: String },

    /// Rendering exceeded the configured per-file timeout.
    #[error("Render timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The requested file id does not exist in the session.
    #[error("File not found: '{file_id}'")]
    NotFound { file_id: String },

    /// The job was cancelled before this file's render was dispatched.
    #[error("Render cancelled")]
    Cancelled,
}

/// Discriminant-only view of [`RenderError`] for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderErrorKind {
    UnsupportedFormat,
    CorruptInput,
    Timeout,
    NotFound,
    Cancelled,
}

impl RenderError {
    /// The error's kind, without its detail payload.
    pub fn kind(&self) -> RenderErrorKind {
        match self {
            RenderError::UnsupportedFormat { .. } => RenderErrorKind::UnsupportedFormat,
            RenderError::CorruptInput { .. } => RenderErrorKind::CorruptInput,
            RenderError::Timeout { .. } => RenderErrorKind::Timeout,
            RenderError::NotFound { .. } => RenderErrorKind::NotFound,
            RenderError::Cancelled => RenderErrorKind::Cancelled,
        }
    }

    /// Shorthand for an [`RenderError::UnsupportedFormat`] with a detail string.
    pub fn unsupported(detail: impl Into<String>) -> Self {
        RenderError::UnsupportedFormat {
            detail: detail.into(),
        }
    }

    /// Shorthand for a [`RenderError::CorruptInput`] with a detail string.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        RenderError::CorruptInput {
            detail: detail.into(),
        }
    }
}
