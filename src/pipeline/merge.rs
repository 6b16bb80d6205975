//! Order-preserving PDF concatenation.
//!
//! Every source document is renumbered into a disjoint object-id range,
//! its non-structural objects copied across verbatim, and its pages
//! re-parented under one new `Pages` node in input order. Page attributes
//! (`MediaBox`, `Rotate`, resources) travel with each page — including
//! ones inherited from an ancestor `Pages` node, which are resolved onto
//! the page before its source tree is dropped — so a merged output can
//! freely mix A4 portrait renders with landscape sheets and arbitrary
//! passthrough geometry.
//!
//! Source-level structure that cannot survive concatenation (catalogs,
//! page trees, outlines) is dropped; everything a page references is kept.

use crate::error::DocfuseError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use tracing::debug;

/// Concatenate `documents` into one PDF, pages in input order.
pub fn merge(documents: Vec<Document>) -> Result<Document, DocfuseError> {
    if documents.is_empty() {
        return Err(DocfuseError::EmptyInput);
    }

    let mut merged = Document::with_version("1.5");
    let mut max_id: u32 = 1;
    let mut page_order: Vec<ObjectId> = Vec::new();
    let mut page_dicts: BTreeMap<ObjectId, Dictionary> = BTreeMap::new();

    for (doc_idx, mut doc) in documents.into_iter().enumerate() {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(DocfuseError::MergeFailed {
                detail: format!("source document {doc_idx} has no pages"),
            });
        }
        for (_, page_id) in pages {
            let mut dict = doc
                .get_object(page_id)
                .and_then(Object::as_dict)
                .map_err(|e| DocfuseError::MergeFailed {
                    detail: format!("source document {doc_idx}: unreadable page object: {e}"),
                })?
                .clone();
            // MediaBox, Rotate, and Resources may live on an ancestor Pages
            // node instead of the page itself. The source tree is about to
            // be dropped, so pull them down onto the page dict now.
            for key in [&b"MediaBox"[..], b"Rotate", b"Resources"] {
                if !dict.has(key) {
                    if let Some(value) = inherited_attribute(&doc, &dict, key) {
                        dict.set(key, value);
                    }
                }
            }
            page_order.push(page_id);
            page_dicts.insert(page_id, dict);
        }

        for (object_id, object) in doc.objects {
            match object.type_name().unwrap_or(b"") {
                // Rebuilt below; keeping them would leave dangling structure.
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    merged.objects.insert(object_id, object);
                }
            }
        }
    }

    let pages_id = merged.new_object_id();
    for (&page_id, dict) in &page_dicts {
        let mut dict = dict.clone();
        dict.set("Parent", Object::Reference(pages_id));
        merged.objects.insert(page_id, Object::Dictionary(dict));
    }

    let kids: Vec<Object> = page_order.iter().map(|&id| Object::Reference(id)).collect();
    let count = kids.len() as i64;
    merged.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(count)),
        ])),
    );

    let catalog_id = merged.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    merged.trailer.set("Root", Object::Reference(catalog_id));

    merged.max_id = merged.objects.len() as u32;
    merged.renumber_objects();
    merged.compress();

    debug!(pages = count, "documents merged");
    Ok(merged)
}

/// Look `key` up the `Parent` chain of a page dict. Depth-capped so a
/// malformed tree with a Parent cycle cannot spin forever.
fn inherited_attribute(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").ok().cloned();
    for _ in 0..32 {
        let id = parent?.as_reference().ok()?;
        let dict = doc.get_object(id).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        parent = dict.get(b"Parent").ok().cloned();
    }
    None
}
