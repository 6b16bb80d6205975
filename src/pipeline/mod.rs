//! Per-format rendering and the merge engine.
//!
//! Each renderer takes one uploaded file and produces a standalone
//! `lopdf::Document`; [`merge`] then concatenates those documents in
//! request order. Renderers are pure CPU work with no shared state, which
//! is what lets the job layer fan them out across blocking threads and
//! fail them independently.

pub(crate) mod compose;
pub mod document;
pub mod image;
pub mod merge;
pub(crate) mod ooxml;
pub mod passthrough;
pub mod presentation;
pub mod spreadsheet;

use crate::classify::FileCategory;
use crate::config::JobConfig;
use crate::error::RenderError;
use crate::session::UploadedFile;
use lopdf::Document;

pub use merge::merge;

/// Render one uploaded file to a standalone PDF document.
///
/// Dispatches on the category assigned at upload time. Files classified
/// [`FileCategory::Unsupported`] fail immediately without touching their
/// bytes.
pub fn render(file: &UploadedFile, config: &JobConfig) -> Result<Document, RenderError> {
    match file.category {
        FileCategory::Pdf => passthrough::load(file),
        FileCategory::Image => image::render(file, config),
        FileCategory::Spreadsheet => spreadsheet::render(file, config),
        FileCategory::Document => document::render(file, config),
        FileCategory::Presentation => presentation::render(file, config),
        FileCategory::Unsupported => Err(RenderError::unsupported(format!(
            "no renderer for '{}'",
            file.original_name
        ))),
    }
}
