//! Format classification: assign every upload one of a closed set of
//! categories that drives renderer dispatch.
//!
//! The extension is the primary signal (case-insensitive). When it is absent
//! or not in the canonical table, classification falls back to magic-byte
//! sniffing. An input that matches neither is [`FileCategory::Unsupported`] —
//! classification never fails, so the orchestrator can report a uniform
//! "unsupported format" error at render time instead.
//!
//! `classify` is pure: the same `(name, content)` pair always yields the
//! same category, independent of call order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;

/// The closed set of format classes a file can be assigned.
///
/// One renderer exists per category; see [`crate::pipeline::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    /// Raster image: jpg, jpeg, png, bmp, gif, tiff, tif, webp.
    Image,
    /// Workbook: xlsx, xls.
    Spreadsheet,
    /// Word-processor document: docx, doc.
    Document,
    /// Slide deck: pptx, ppt.
    Presentation,
    /// Existing PDF, merged without re-encoding.
    Pdf,
    /// Everything else; fails at render time with a uniform error.
    Unsupported,
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileCategory::Image => "image",
            FileCategory::Spreadsheet => "spreadsheet",
            FileCategory::Document => "document",
            FileCategory::Presentation => "presentation",
            FileCategory::Pdf => "pdf",
            FileCategory::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// Classify a file by name and content.
///
/// Only a few leading bytes are inspected, except for zip containers where
/// the archive directory is consulted to tell docx/xlsx/pptx apart, so it
/// is fine (and intended) to pass the whole uploaded buffer.
pub fn classify(original_name: &str, content: &[u8]) -> FileCategory {
    match by_extension(original_name) {
        Some(category) => category,
        None => by_magic(content),
    }
}

/// Canonical extension table. Returns `None` for absent or unknown
/// extensions so the caller can fall through to sniffing.
fn by_extension(name: &str) -> Option<FileCategory> {
    let ext = name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase())?;
    let category = match ext.as_str() {
        "jpg" | "jpeg" | "png" | "bmp" | "gif" | "tiff" | "tif" | "webp" => FileCategory::Image,
        "xlsx" | "xls" => FileCategory::Spreadsheet,
        "docx" | "doc" => FileCategory::Document,
        "pptx" | "ppt" => FileCategory::Presentation,
        "pdf" => FileCategory::Pdf,
        _ => return None,
    };
    Some(category)
}

/// Magic-byte fallback for files with no (or an unrecognised) extension.
fn by_magic(content: &[u8]) -> FileCategory {
    if content.len() < 4 {
        return FileCategory::Unsupported;
    }

    match &content[..4] {
        b"%PDF" => return FileCategory::Pdf,
        [0x89, b'P', b'N', b'G'] | b"GIF8" => return FileCategory::Image,
        [b'I', b'I', 0x2A, 0x00] | [b'M', b'M', 0x00, 0x2A] => return FileCategory::Image,
        _ => {}
    }
    if content.starts_with(&[0xFF, 0xD8, 0xFF]) || content.starts_with(b"BM") {
        return FileCategory::Image;
    }
    if content.len() >= 12 && &content[..4] == b"RIFF" && &content[8..12] == b"WEBP" {
        return FileCategory::Image;
    }
    // OLE compound file: legacy binary Office. docx/xls/ppt cannot be told
    // apart without parsing the directory; `document` is the closest guess
    // and the renderer reports the precise limitation.
    if content.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
        return FileCategory::Document;
    }
    if content.starts_with(b"PK\x03\x04") {
        return sniff_zip_container(content);
    }

    FileCategory::Unsupported
}

/// Disambiguate an OOXML container by its well-known part prefixes.
fn sniff_zip_container(content: &[u8]) -> FileCategory {
    let Ok(archive) = zip::ZipArchive::new(Cursor::new(content)) else {
        return FileCategory::Unsupported;
    };
    let mut category = FileCategory::Unsupported;
    for name in archive.file_names() {
        if name.starts_with("word/") {
            category = FileCategory::Document;
            break;
        }
        if name.starts_with("xl/") {
            category = FileCategory::Spreadsheet;
            break;
        }
        if name.starts_with("ppt/") {
            category = FileCategory::Presentation;
            break;
        }
    }
    category
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(classify("photo.JPG", b""), FileCategory::Image);
        assert_eq!(classify("Sheet.XLSX", b""), FileCategory::Spreadsheet);
        assert_eq!(classify("deck.PpTx", b""), FileCategory::Presentation);
        assert_eq!(classify("Report.Doc", b""), FileCategory::Document);
        assert_eq!(classify("scan.PDF", b""), FileCategory::Pdf);
    }

    #[test]
    fn canonical_image_extensions() {
        for name in [
            "a.jpg", "a.jpeg", "a.png", "a.bmp", "a.gif", "a.tiff", "a.tif", "a.webp",
        ] {
            assert_eq!(classify(name, b""), FileCategory::Image, "{name}");
        }
    }

    #[test]
    fn extension_wins_over_content() {
        // A PNG payload with a .pdf name is still treated as a PDF; the
        // mismatch surfaces as a render failure, not a reclassification.
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(classify("fake.pdf", &png), FileCategory::Pdf);
    }

    #[test]
    fn missing_extension_falls_back_to_magic() {
        assert_eq!(classify("upload-1", b"%PDF-1.7 rest"), FileCategory::Pdf);
        assert_eq!(
            classify("upload-2", &[0xFF, 0xD8, 0xFF, 0xE0, 0x00]),
            FileCategory::Image
        );
        assert_eq!(
            classify("upload-3", &[b'M', b'M', 0x00, 0x2A, 0x00]),
            FileCategory::Image
        );
    }

    #[test]
    fn unknown_extension_with_unknown_content_is_unsupported() {
        assert_eq!(classify("notes.txt", b"hello world"), FileCategory::Unsupported);
        assert_eq!(classify("archive.rar", b"Rar!\x1a\x07"), FileCategory::Unsupported);
    }

    #[test]
    fn empty_and_tiny_content_is_unsupported() {
        assert_eq!(classify("x", b""), FileCategory::Unsupported);
        assert_eq!(classify("x", b"PK"), FileCategory::Unsupported);
    }

    #[test]
    fn ole_magic_maps_to_document() {
        let ole = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0x00];
        assert_eq!(classify("mystery", &ole), FileCategory::Document);
    }

    #[test]
    fn classify_is_deterministic() {
        let name = "upload";
        let content = b"%PDF-1.4";
        let first = classify(name, content);
        for _ in 0..10 {
            assert_eq!(classify(name, content), first);
        }
    }

    #[test]
    fn category_serialises_lowercase() {
        assert_eq!(
            serde_json::to_string(&FileCategory::Spreadsheet).unwrap(),
            "\"spreadsheet\""
        );
    }
}
