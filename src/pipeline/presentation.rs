//! Slide deck → PDF rendering.
//!
//! Each `ppt/slides/slideN.xml` becomes exactly one PDF page, in slide
//! number order. The page keeps the deck's own geometry: `p:sldSz` is
//! recorded in EMU and converts at 12700 EMU per point; decks without a
//! recorded size fall back to the configured page size in landscape.
//!
//! Layout is deliberately simple: the first shape with text becomes the
//! slide title, remaining paragraphs stack below it, and anything past the
//! bottom margin is dropped so a slide can never spill onto a second page.

use crate::config::JobConfig;
use crate::error::RenderError;
use crate::pipeline::compose::{text_ops, wrap_text, Composer, Font};
use crate::pipeline::ooxml;
use crate::session::UploadedFile;
use lopdf::content::Operation;
use lopdf::Document;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

const EMU_PER_PT: f32 = 12_700.0;

pub fn render(file: &UploadedFile, config: &JobConfig) -> Result<Document, RenderError> {
    if file.content.is_empty() {
        return Err(RenderError::corrupt("zero-byte file"));
    }
    if ooxml::is_ole(&file.content) {
        return Err(RenderError::unsupported(
            "legacy binary .ppt is not supported; save as .pptx",
        ));
    }

    let mut zip = ooxml::open_archive(&file.content)?;
    let slide_paths = slide_paths(&mut zip);
    if slide_paths.is_empty() {
        return Err(RenderError::corrupt("presentation has no slides"));
    }

    let (page_w, page_h) = match ooxml::read_entry(&mut zip, "ppt/presentation.xml")
        .ok()
        .and_then(|xml| slide_size_pt(&xml))
    {
        Some(size) => size,
        None => config.page_size.landscape_pt(),
    };
    debug!(name = %file.original_name, slides = slide_paths.len(), page_w, page_h, "deck opened");

    let mut composer = Composer::new();
    for path in &slide_paths {
        let xml = ooxml::read_entry(&mut zip, path)?;
        let shapes = parse_slide_text(&xml)?;
        let ops = layout_slide(&shapes, page_w, page_h, config);
        composer.push_page(page_w, page_h, ops, None);
    }
    Ok(composer.finish())
}

/// Slide part names, ordered by slide number.
fn slide_paths(zip: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>) -> Vec<String> {
    let mut numbered: Vec<(u32, String)> = zip
        .file_names()
        .filter_map(|name| {
            let digits = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?;
            Some((digits.parse().ok()?, name.to_string()))
        })
        .collect();
    numbered.sort();
    numbered.into_iter().map(|(_, name)| name).collect()
}

/// Extract `p:sldSz` as `(width_pt, height_pt)`.
fn slide_size_pt(presentation_xml: &[u8]) -> Option<(f32, f32)> {
    let mut reader = Reader::from_reader(presentation_xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"p:sldSz" => {
                let mut cx = None;
                let mut cy = None;
                for attr in e.attributes().flatten() {
                    let value: f32 = ooxml::attr_text(&attr.value).parse().ok()?;
                    match attr.key.as_ref() {
                        b"cx" => cx = Some(value),
                        b"cy" => cy = Some(value),
                        _ => {}
                    }
                }
                let (cx, cy) = (cx?, cy?);
                if cx <= 0.0 || cy <= 0.0 {
                    return None;
                }
                return Some((cx / EMU_PER_PT, cy / EMU_PER_PT));
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

/// Text of one slide: each shape is a list of paragraphs.
///
/// Runs (`a:t`) within an `a:p` concatenate; empty shapes are dropped.
fn parse_slide_text(xml: &[u8]) -> Result<Vec<Vec<String>>, RenderError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut shapes: Vec<Vec<String>> = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut para = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"p:sp" => paragraphs.clear(),
                b"a:p" => para.clear(),
                b"a:t" => in_text = true,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| RenderError::corrupt(format!("invalid slide text: {e}")))?;
                para.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"a:t" => in_text = false,
                b"a:p" => {
                    let text = para.trim();
                    if !text.is_empty() {
                        paragraphs.push(text.to_string());
                    }
                }
                b"p:sp" => {
                    if !paragraphs.is_empty() {
                        shapes.push(std::mem::take(&mut paragraphs));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(RenderError::corrupt(format!("invalid slide XML: {e}"))),
            _ => {}
        }
        buf.clear();
    }
    Ok(shapes)
}

/// Lay one slide's shapes onto a single page's worth of operations.
///
/// The first shape renders as the title (bold, 1.6× body). Content that
/// would cross the bottom margin is clipped, never carried over.
fn layout_slide(shapes: &[Vec<String>], page_w: f32, page_h: f32, config: &JobConfig) -> Vec<Operation> {
    let margin = config.margin_pt;
    let avail_w = page_w - 2.0 * margin;
    let body = config.font_size_pt;
    let title = body * 1.6;

    let mut ops = Vec::new();
    let mut y = page_h - margin;

    let emit = |ops: &mut Vec<Operation>, y: &mut f32, text: &str, size: f32, font: Font| {
        for line in wrap_text(text, avail_w, size) {
            if *y - size * 1.4 < margin {
                return false;
            }
            *y -= size * 1.4;
            ops.extend(text_ops(&line, margin, *y, size, font));
        }
        true
    };

    for (shape_idx, paragraphs) in shapes.iter().enumerate() {
        for (para_idx, text) in paragraphs.iter().enumerate() {
            let is_title = shape_idx == 0 && para_idx == 0;
            let (size, font) = if is_title {
                (title, Font::Bold)
            } else {
                (body, Font::Regular)
            };
            if !emit(&mut ops, &mut y, text, size, font) {
                return ops;
            }
            if is_title {
                y -= title * 0.5;
            }
        }
        y -= body * 0.6;
    }
    ops
}
