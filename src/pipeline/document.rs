//! Word document → PDF rendering.
//!
//! Reads `word/document.xml` out of the docx container and lays the body
//! out as a top-down text flow: paragraphs word-wrapped at the body size,
//! `Heading*`/`Title` styles as bold headings, tables as grids, and inline
//! pictures resolved through the document relationships into `word/media`
//! and re-embedded as JPEG. This is text extraction, not a layout engine;
//! fidelity is "readable rendition", not pixel parity with Word.
//!
//! Legacy binary `.doc` (OLE) is rejected as unsupported with a
//! conversion hint rather than misparsed.

use crate::config::JobConfig;
use crate::error::RenderError;
use crate::pipeline::compose::{Composer, TextFlow};
use crate::pipeline::image::{encode_jpeg, flatten_to_rgb};
use crate::pipeline::ooxml::{self, attr_text};
use crate::session::UploadedFile;
use image::ImageReader;
use lopdf::Document;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::Cursor;
use tracing::{debug, warn};

/// One body-level unit of the document, in source order.
enum Block {
    Heading(String),
    Paragraph(String),
    Table(Vec<Vec<String>>),
    /// Relationship id of an inline picture.
    Image(String),
}

pub fn render(file: &UploadedFile, config: &JobConfig) -> Result<Document, RenderError> {
    if file.content.is_empty() {
        return Err(RenderError::corrupt("zero-byte file"));
    }
    if ooxml::is_ole(&file.content) {
        return Err(RenderError::unsupported(
            "legacy binary .doc is not supported; save as .docx",
        ));
    }

    let mut zip = ooxml::open_archive(&file.content)?;
    let body_xml = ooxml::read_entry(&mut zip, "word/document.xml")?;
    let blocks = parse_body(&body_xml)?;
    debug!(name = %file.original_name, blocks = blocks.len(), "docx body parsed");

    let rels: HashMap<String, String> = match ooxml::read_entry(&mut zip, "word/_rels/document.xml.rels") {
        Ok(xml) => ooxml::parse_relationships(&xml)?.into_iter().collect(),
        Err(_) => HashMap::new(),
    };

    let (page_w, page_h) = config.page_size.portrait_pt();
    let mut composer = Composer::new();
    let mut flow = TextFlow::new(&mut composer, page_w, page_h, config.margin_pt, config.font_size_pt);

    for block in blocks {
        match block {
            Block::Heading(text) => flow.heading(&text),
            Block::Paragraph(text) => flow.paragraph(&text),
            Block::Table(rows) => flow.table(&rows, false),
            Block::Image(rid) => match load_media(&mut zip, &rels, &rid, config.jpeg_quality) {
                Ok((jpeg, w, h)) => flow.image_block(jpeg, w, h),
                // A broken picture should not sink the whole document.
                Err(e) => warn!(rel = %rid, error = %e, "skipping undecodable inline picture"),
            },
        }
    }

    // A valid but contentless document still yields one (blank) page.
    if flow.is_empty() {
        flow.paragraph("");
    }
    flow.finish();
    Ok(composer.finish())
}

/// Pull-parse `word/document.xml` into an ordered block list.
///
/// Table cells collect their paragraph text flattened to one string;
/// everything below table level (runs, properties) is transparent.
fn parse_body(xml: &[u8]) -> Result<Vec<Block>, RenderError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut blocks = Vec::new();

    let mut para = String::new();
    let mut heading = false;
    let mut in_text = false;
    let mut images: Vec<String> = Vec::new();

    let mut table: Option<Vec<Vec<String>>> = None;
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:tbl" => table = Some(Vec::new()),
                b"w:tr" => row.clear(),
                b"w:tc" => cell.clear(),
                b"w:p" if table.is_none() => {
                    para.clear();
                    heading = false;
                    images.clear();
                }
                b"w:t" => in_text = true,
                b"w:pStyle" => heading = heading || style_is_heading(&e),
                b"a:blip" => {
                    if let Some(rid) = embed_rid(&e) {
                        images.push(rid);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:pStyle" => heading = heading || style_is_heading(&e),
                b"a:blip" => {
                    if let Some(rid) = embed_rid(&e) {
                        images.push(rid);
                    }
                }
                b"w:tab" | b"w:br" => {
                    let target = if table.is_some() { &mut cell } else { &mut para };
                    target.push(' ');
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| RenderError::corrupt(format!("invalid document text: {e}")))?;
                if table.is_some() {
                    cell.push_str(&text);
                } else {
                    para.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" if table.is_none() => {
                    let text = para.trim();
                    if !text.is_empty() {
                        blocks.push(if heading {
                            Block::Heading(text.to_string())
                        } else {
                            Block::Paragraph(text.to_string())
                        });
                    }
                    blocks.extend(images.drain(..).map(Block::Image));
                }
                b"w:tc" => row.push(std::mem::take(&mut cell).trim().to_string()),
                b"w:tr" => {
                    if let Some(rows) = table.as_mut() {
                        rows.push(std::mem::take(&mut row));
                    }
                }
                b"w:tbl" => {
                    if let Some(rows) = table.take() {
                        if !rows.is_empty() {
                            blocks.push(Block::Table(rows));
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(RenderError::corrupt(format!("invalid document XML: {e}"))),
            _ => {}
        }
        buf.clear();
    }
    Ok(blocks)
}

fn style_is_heading(e: &quick_xml::events::BytesStart<'_>) -> bool {
    e.try_get_attribute("w:val")
        .ok()
        .flatten()
        .map(|attr| {
            let val = attr_text(&attr.value);
            val.starts_with("Heading") || val == "Title"
        })
        .unwrap_or(false)
}

fn embed_rid(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    e.try_get_attribute("r:embed")
        .ok()
        .flatten()
        .map(|attr| attr_text(&attr.value))
}

/// Resolve a picture relationship, decode it, and re-encode as JPEG.
fn load_media(
    zip: &mut zip::ZipArchive<Cursor<&[u8]>>,
    rels: &HashMap<String, String>,
    rid: &str,
    jpeg_quality: u8,
) -> Result<(Vec<u8>, u32, u32), RenderError> {
    let target = rels
        .get(rid)
        .ok_or_else(|| RenderError::corrupt(format!("unresolved picture relationship '{rid}'")))?;
    let path = format!("word/{target}");
    let bytes = ooxml::read_entry(zip, &path)?;

    let img = ImageReader::new(Cursor::new(bytes.as_slice()))
        .with_guessed_format()
        .map_err(|e| RenderError::corrupt(format!("unreadable picture: {e}")))?
        .decode()
        .map_err(|e| RenderError::corrupt(format!("undecodable picture: {e}")))?;
    let rgb = flatten_to_rgb(&img);
    let (w, h) = (rgb.width(), rgb.height());
    let jpeg = encode_jpeg(&rgb, jpeg_quality)?;
    Ok((jpeg, w, h))
}
