//! Shared helpers for the OOXML (docx/pptx) renderers.
//!
//! Both formats are ZIP containers of XML parts plus media entries; the
//! renderers differ only in which parts they read and how they lay the
//! text out. Legacy binary Office files (.doc, .ppt) are OLE compound
//! documents, not ZIPs, and are rejected up front with a conversion hint.

use crate::error::RenderError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// OLE compound-document magic, the container of legacy .doc/.ppt/.xls.
const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

pub(crate) fn is_ole(bytes: &[u8]) -> bool {
    bytes.starts_with(&OLE_MAGIC)
}

/// Open the upload as a ZIP archive, or fail as corrupt input.
pub(crate) fn open_archive(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, RenderError> {
    ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| RenderError::corrupt(format!("not a readable archive: {e}")))
}

/// Read one named entry fully into memory.
pub(crate) fn read_entry(
    zip: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, RenderError> {
    let mut entry = zip
        .by_name(name)
        .map_err(|_| RenderError::corrupt(format!("missing archive entry '{name}'")))?;
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| RenderError::corrupt(format!("unreadable archive entry '{name}': {e}")))?;
    Ok(bytes)
}

/// Parse an OPC relationships part into `(id, target)` pairs.
///
/// Targets stay relative to the part's base directory, the way the
/// `.rels` file records them (`media/image1.png`, not `word/media/…`).
pub(crate) fn parse_relationships(xml: &[u8]) -> Result<Vec<(String, String)>, RenderError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = Some(attr_text(&attr.value)),
                        b"Target" => target = Some(attr_text(&attr.value)),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    rels.push((id, target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(RenderError::corrupt(format!("invalid relationships: {e}"))),
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

pub(crate) fn attr_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ole_magic_is_detected() {
        let mut doc = OLE_MAGIC.to_vec();
        doc.extend_from_slice(&[0u8; 64]);
        assert!(is_ole(&doc));
        assert!(!is_ole(b"PK\x03\x04"));
        assert!(!is_ole(b""));
    }

    #[test]
    fn relationships_parse_to_pairs() {
        let xml = br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="t" Target="media/image1.png"/>
<Relationship Id="rId2" Type="t" Target="styles.xml"/>
</Relationships>"#;
        let rels = parse_relationships(xml).unwrap();
        assert_eq!(
            rels,
            vec![
                ("rId1".to_string(), "media/image1.png".to_string()),
                ("rId2".to_string(), "styles.xml".to_string()),
            ]
        );
    }

    #[test]
    fn garbage_archive_is_corrupt() {
        assert!(open_archive(b"not a zip").is_err());
    }
}
