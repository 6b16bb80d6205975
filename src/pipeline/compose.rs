//! Minimal PDF page writer over lopdf.
//!
//! Every generated renderer (image, spreadsheet, document, presentation)
//! produces its pages through [`Composer`], so they all share one way of
//! building page trees, resources, and content streams — and the merge
//! engine only ever sees plain `lopdf::Document`s regardless of source.
//!
//! Text uses the built-in Helvetica / Helvetica-Bold Type1 fonts with
//! WinAnsi encoding: no font files to embed, viewable everywhere, and
//! "best effort same appearance" is all the pipeline promises for
//! generated text. Width measurement is an average-glyph approximation;
//! good enough for wrapping and table fitting, not for typography.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

/// Average Helvetica glyph width as a fraction of the font size.
/// Used for line wrapping and cell truncation.
const AVG_CHAR_WIDTH: f32 = 0.5;

/// Line spacing as a multiple of the font size.
const LINE_SPACING: f32 = 1.4;

/// How many characters fit into `width_pt` at `font_size`.
pub fn chars_that_fit(width_pt: f32, font_size: f32) -> usize {
    (width_pt / (font_size * AVG_CHAR_WIDTH)).max(1.0) as usize
}

/// Map a UTF-8 string to WinAnsi (CP-1252) bytes for the builtin fonts.
///
/// Characters outside the code page degrade to `?`; the common Unicode
/// punctuation found in Office text gets its CP-1252 slot explicitly.
fn to_winansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80, // euro
            '\u{2026}' => 0x85, // ellipsis
            '\u{2018}' => 0x91, // left single quote
            '\u{2019}' => 0x92, // right single quote
            '\u{201C}' => 0x93, // left double quote
            '\u{201D}' => 0x94, // right double quote
            '\u{2022}' => 0x95, // bullet
            '\u{2013}' => 0x96, // en-dash
            '\u{2014}' => 0x97, // em-dash
            '\u{00A0}' => 0x20, // non-breaking space
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect()
}

/// Greedy word-wrap of `text` into lines no wider than `width_pt`.
///
/// A single word longer than the line is hard-split rather than overflowing.
pub fn wrap_text(text: &str, width_pt: f32, font_size: f32) -> Vec<String> {
    let budget = chars_that_fit(width_pt, font_size);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed <= budget {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        // Hard-split oversized words.
        let mut rest: Vec<char> = word.chars().collect();
        while rest.len() > budget {
            lines.push(rest.drain(..budget).collect());
        }
        current = rest.into_iter().collect();
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Truncate `text` to fit `width_pt`, appending an ellipsis when cut.
pub fn truncate_to_width(text: &str, width_pt: f32, font_size: f32) -> String {
    let budget = chars_that_fit(width_pt, font_size);
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let mut out: String = text.chars().take(budget.saturating_sub(1)).collect();
    out.push('\u{2026}');
    out
}

/// Content operations for one text run at an absolute position.
pub(crate) fn text_ops(text: &str, x: f32, y: f32, size: f32, font: Font) -> Vec<Operation> {
    let font_name = match font {
        Font::Regular => "F1",
        Font::Bold => "F2",
    };
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font_name.into(), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new(
            "Tj",
            vec![Object::String(to_winansi(text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
    ]
}

/// Incrementally builds a single-catalog PDF document page by page.
pub struct Composer {
    doc: Document,
    pages_id: ObjectId,
    font_regular: ObjectId,
    font_bold: ObjectId,
    page_ids: Vec<ObjectId>,
}

/// Font selector for text operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Composer {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let font_bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        Self {
            doc,
            pages_id,
            font_regular,
            font_bold,
            page_ids: Vec::new(),
        }
    }

    /// Number of pages added so far.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Register a JPEG image as an XObject and return its id.
    ///
    /// The bytes go into the document verbatim under `DCTDecode` — the
    /// PDF viewer decodes the JPEG, we never re-rasterise.
    pub fn add_jpeg(&mut self, jpeg: Vec<u8>, px_width: u32, px_height: u32) -> ObjectId {
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => px_width as i64,
                "Height" => px_height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        );
        self.doc.add_object(stream)
    }

    /// Add a page of `width × height` pt whose sole content is `image`,
    /// aspect-fit inside the margins and centred both ways.
    pub fn image_page(
        &mut self,
        width: f32,
        height: f32,
        margin: f32,
        image: ObjectId,
        px_width: u32,
        px_height: u32,
    ) {
        let avail_w = width - 2.0 * margin;
        let avail_h = height - 2.0 * margin;
        let scale = (avail_w / px_width as f32).min(avail_h / px_height as f32);
        let draw_w = px_width as f32 * scale;
        let draw_h = px_height as f32 * scale;
        let x = (width - draw_w) / 2.0;
        let y = (height - draw_h) / 2.0;

        let ops = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    draw_w.into(),
                    0.into(),
                    0.into(),
                    draw_h.into(),
                    x.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ];

        let mut xobjects = Dictionary::new();
        xobjects.set("Im0", Object::Reference(image));
        self.push_page(width, height, ops, Some(xobjects));
    }

    /// Add a finished page from raw content operations.
    pub fn push_page(
        &mut self,
        width: f32,
        height: f32,
        ops: Vec<Operation>,
        xobjects: Option<Dictionary>,
    ) {
        let content = Content { operations: ops };
        let encoded = content.encode().unwrap_or_default();
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));

        let mut resources = dictionary! {
            "Font" => dictionary! {
                "F1" => Object::Reference(self.font_regular),
                "F2" => Object::Reference(self.font_bold),
            },
        };
        if let Some(xobjects) = xobjects {
            resources.set("XObject", Object::Dictionary(xobjects));
        }

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => Object::Reference(content_id),
            "Resources" => Object::Dictionary(resources),
        });
        self.page_ids.push(page_id);
    }

    /// Assemble the page tree and catalog and return the finished document.
    pub fn finish(mut self) -> Document {
        let kids: Vec<Object> = self
            .page_ids
            .iter()
            .map(|&id| Object::Reference(id))
            .collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(self.pages_id),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc
    }
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

/// Top-down text flow across as many pages as the content needs.
///
/// Used by the spreadsheet, document, and presentation renderers for
/// paragraphs, headings, and table grids. Coordinates are PDF-style
/// (origin bottom-left); the cursor tracks the baseline of the next line.
pub struct TextFlow<'a> {
    composer: &'a mut Composer,
    width: f32,
    height: f32,
    margin: f32,
    body_size: f32,
    ops: Vec<Operation>,
    cursor_y: f32,
    started: bool,
    xobjects: Dictionary,
    image_seq: usize,
}

impl<'a> TextFlow<'a> {
    pub fn new(
        composer: &'a mut Composer,
        width: f32,
        height: f32,
        margin: f32,
        body_size: f32,
    ) -> Self {
        Self {
            composer,
            width,
            height,
            margin,
            body_size,
            ops: Vec::new(),
            cursor_y: height - margin,
            started: false,
            xobjects: Dictionary::new(),
            image_seq: 0,
        }
    }

    fn avail_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    /// True if nothing has been written yet (no line on any page).
    pub fn is_empty(&self) -> bool {
        !self.started && self.ops.is_empty() && self.composer.page_count() == 0
    }

    /// Emit one text line at the current cursor, advancing it.
    fn line(&mut self, text: &str, size: f32, font: Font, indent: f32) {
        self.ensure_room(size * LINE_SPACING);
        self.cursor_y -= size * LINE_SPACING;
        self.text_at(text, self.margin + indent, self.cursor_y, size, font);
        self.started = true;
    }

    /// Place text at an absolute position without moving the cursor.
    fn text_at(&mut self, text: &str, x: f32, y: f32, size: f32, font: Font) {
        self.ops.extend(text_ops(text, x, y, size, font));
    }

    /// Bold heading at 1.45× the body size with surrounding space.
    pub fn heading(&mut self, text: &str) {
        let size = self.body_size * 1.45;
        self.spacer(size * 0.6);
        for line in wrap_text(text, self.avail_width(), size) {
            self.line(&line, size, Font::Bold, 0.0);
        }
        self.spacer(size * 0.3);
    }

    /// Body paragraph, word-wrapped, with a small trailing gap.
    pub fn paragraph(&mut self, text: &str) {
        self.styled_paragraph(text, self.body_size, Font::Regular);
    }

    /// Paragraph with explicit size and font.
    pub fn styled_paragraph(&mut self, text: &str, size: f32, font: Font) {
        for line in wrap_text(text, self.avail_width(), size) {
            self.line(&line, size, font, 0.0);
        }
        self.spacer(size * 0.4);
    }

    /// Vertical whitespace; clamped at page breaks.
    pub fn spacer(&mut self, pt: f32) {
        self.cursor_y = (self.cursor_y - pt).max(self.margin);
    }

    /// Render `rows` as a full-width grid with equal column widths.
    ///
    /// Cell text is truncated with an ellipsis rather than wrapped; the
    /// first row is bold when `header` is set. Rows break across pages.
    pub fn table(&mut self, rows: &[Vec<String>], header: bool) {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }
        let cell_size = (self.body_size - 2.0).max(6.0);
        let col_width = self.avail_width() / columns as f32;
        let row_height = cell_size * 1.8;
        let pad = 3.0;

        for (row_idx, row) in rows.iter().enumerate() {
            self.ensure_room(row_height);
            let top = self.cursor_y;
            let bottom = top - row_height;
            let font = if header && row_idx == 0 {
                Font::Bold
            } else {
                Font::Regular
            };

            // Grid border for every cell in the row, then the clipped text.
            self.ops.push(Operation::new("q", vec![]));
            self.ops.push(Operation::new("w", vec![0.5f32.into()]));
            for col in 0..columns {
                let x = self.margin + col as f32 * col_width;
                self.ops.push(Operation::new(
                    "re",
                    vec![x.into(), bottom.into(), col_width.into(), row_height.into()],
                ));
            }
            self.ops.push(Operation::new("S", vec![]));
            self.ops.push(Operation::new("Q", vec![]));

            for (col, cell) in row.iter().enumerate().take(columns) {
                if cell.is_empty() {
                    continue;
                }
                let x = self.margin + col as f32 * col_width + pad;
                let text = truncate_to_width(cell, col_width - 2.0 * pad, cell_size);
                let baseline = bottom + (row_height - cell_size) / 2.0;
                self.text_at(&text, x, baseline, cell_size, font);
            }

            self.cursor_y = bottom;
            self.started = true;
        }
        self.spacer(row_height_gap(cell_size));
    }

    /// Place a JPEG inline in the flow, scaled down to the available width
    /// if needed and never taller than the printable height.
    pub fn image_block(&mut self, jpeg: Vec<u8>, px_width: u32, px_height: u32) {
        if px_width == 0 || px_height == 0 {
            return;
        }
        // 72 dpi nominal sizing, shrink-to-fit only.
        let max_h = self.height - 2.0 * self.margin;
        let scale = (self.avail_width() / px_width as f32)
            .min(max_h / px_height as f32)
            .min(1.0);
        let draw_w = px_width as f32 * scale;
        let draw_h = px_height as f32 * scale;

        self.ensure_room(draw_h);
        let image = self.composer.add_jpeg(jpeg, px_width, px_height);
        let name = format!("Im{}", self.image_seq);
        self.image_seq += 1;
        self.xobjects.set(name.as_bytes(), Object::Reference(image));

        let y = self.cursor_y - draw_h;
        self.ops.push(Operation::new("q", vec![]));
        self.ops.push(Operation::new(
            "cm",
            vec![
                draw_w.into(),
                0.into(),
                0.into(),
                draw_h.into(),
                self.margin.into(),
                y.into(),
            ],
        ));
        self.ops.push(Operation::new("Do", vec![name.into()]));
        self.ops.push(Operation::new("Q", vec![]));

        self.cursor_y = y;
        self.started = true;
        self.spacer(self.body_size * 0.4);
    }

    /// Break to a fresh page unconditionally.
    pub fn page_break(&mut self) {
        self.flush_page();
    }

    /// Break to a fresh page if fewer than `needed` points remain.
    fn ensure_room(&mut self, needed: f32) {
        if self.cursor_y - needed < self.margin && self.started_current_page() {
            self.flush_page();
        }
    }

    fn started_current_page(&self) -> bool {
        !self.ops.is_empty()
    }

    fn flush_page(&mut self) {
        if self.ops.is_empty() {
            return;
        }
        let ops = std::mem::take(&mut self.ops);
        let xobjects = std::mem::take(&mut self.xobjects);
        let xobjects = if xobjects.is_empty() {
            None
        } else {
            Some(xobjects)
        };
        self.composer.push_page(self.width, self.height, ops, xobjects);
        self.cursor_y = self.height - self.margin;
    }

    /// Flush the last partial page. Call exactly once when done.
    pub fn finish(mut self) {
        self.flush_page();
    }
}

fn row_height_gap(cell_size: f32) -> f32 {
    cell_size * 1.2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_respects_width_budget() {
        let lines = wrap_text("alpha beta gamma delta epsilon", 60.0, 10.0);
        // 60pt at 10pt font ≈ 12 chars per line
        assert!(lines.len() >= 2);
        for line in &lines {
            assert!(line.chars().count() <= 12, "too wide: {line:?}");
        }
    }

    #[test]
    fn wrap_hard_splits_oversized_words() {
        let lines = wrap_text("abcdefghijklmnopqrstuvwxyz", 30.0, 10.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.chars().count() <= 6));
    }

    #[test]
    fn wrap_of_empty_text_yields_one_blank_line() {
        assert_eq!(wrap_text("", 100.0, 10.0), vec![String::new()]);
    }

    #[test]
    fn truncate_appends_ellipsis() {
        let t = truncate_to_width("a very long cell value", 25.0, 10.0);
        assert!(t.ends_with('\u{2026}'));
        assert!(t.chars().count() <= 5);
        assert_eq!(truncate_to_width("ok", 100.0, 10.0), "ok");
    }

    #[test]
    fn winansi_maps_smart_punctuation() {
        let bytes = to_winansi("\u{2019}\u{2014}\u{20AC}");
        assert_eq!(bytes, vec![0x92, 0x97, 0x80]);
        assert_eq!(to_winansi("漢"), vec![b'?']);
    }

    #[test]
    fn composer_produces_loadable_single_page_document() {
        let mut composer = Composer::new();
        let mut flow = TextFlow::new(&mut composer, 595.0, 842.0, 36.0, 11.0);
        flow.heading("Title");
        flow.paragraph("Body text");
        flow.finish();

        let doc = composer.finish();
        assert_eq!(doc.get_pages().len(), 1);

        // Round-trip through serialisation to prove structural validity.
        let mut bytes = Vec::new();
        let mut doc = doc;
        doc.save_to(&mut bytes).unwrap();
        let reloaded = Document::load_mem(&bytes).unwrap();
        assert_eq!(reloaded.get_pages().len(), 1);
    }

    #[test]
    fn text_flow_breaks_onto_new_pages() {
        let mut composer = Composer::new();
        // Page with room for only a handful of lines.
        let mut flow = TextFlow::new(&mut composer, 200.0, 120.0, 20.0, 11.0);
        for i in 0..30 {
            flow.paragraph(&format!("line {i}"));
        }
        flow.finish();
        let doc = composer.finish();
        assert!(doc.get_pages().len() > 1);
    }

    #[test]
    fn image_page_is_centred_and_fit() {
        let mut composer = Composer::new();
        let img = composer.add_jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9], 400, 200);
        composer.image_page(595.0, 842.0, 36.0, img, 400, 200);
        let doc = composer.finish();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn inline_image_lands_in_page_resources() {
        let mut composer = Composer::new();
        let mut flow = TextFlow::new(&mut composer, 595.0, 842.0, 36.0, 11.0);
        flow.paragraph("before");
        flow.image_block(vec![0xFF, 0xD8, 0xFF, 0xD9], 100, 80);
        flow.finish();

        let doc = composer.finish();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let (&_, &page_id) = pages.iter().next().unwrap();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        assert!(xobjects.get(b"Im0").is_ok());
    }

    #[test]
    fn table_emits_rows_and_survives_reload() {
        let mut composer = Composer::new();
        let mut flow = TextFlow::new(&mut composer, 842.0, 595.0, 36.0, 11.0);
        let rows = vec![
            vec!["Name".to_string(), "Qty".to_string()],
            vec!["Widget".to_string(), "3".to_string()],
        ];
        flow.table(&rows, true);
        flow.finish();

        let mut doc = composer.finish();
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        assert_eq!(Document::load_mem(&bytes).unwrap().get_pages().len(), 1);
    }
}
