//! PDF passthrough.
//!
//! Uploads that are already PDFs skip rendering entirely: the bytes are
//! parsed once so corrupt files are caught here (and reported against the
//! right file) instead of surfacing later as a merge failure, and the
//! parsed document flows into the merge untouched. No re-encoding, no
//! page-size normalisation; existing pages keep their boxes and rotation.

use crate::error::RenderError;
use crate::session::UploadedFile;
use lopdf::Document;
use tracing::debug;

pub fn load(file: &UploadedFile) -> Result<Document, RenderError> {
    if file.content.is_empty() {
        return Err(RenderError::corrupt("zero-byte file"));
    }

    let doc = Document::load_mem(&file.content)
        .map_err(|e| RenderError::corrupt(format!("unparseable PDF: {e}")))?;
    if doc.get_pages().is_empty() {
        return Err(RenderError::corrupt("PDF contains no pages"));
    }
    debug!(name = %file.original_name, pages = doc.get_pages().len(), "PDF passed through");
    Ok(doc)
}
