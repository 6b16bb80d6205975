//! Spreadsheet → PDF rendering via calamine.
//!
//! Each worksheet with at least one populated cell becomes a sheet-name
//! heading plus a grid table on landscape pages, columns divided evenly
//! across the printable width, header row bold. Sheets with zero populated
//! cells are skipped entirely; a workbook where every sheet is empty fails
//! as corrupt input so the job report names the file.
//!
//! calamine auto-detects the container, so legacy `.xls` (BIFF) works
//! through the same path as `.xlsx`.

use crate::config::JobConfig;
use crate::error::RenderError;
use crate::pipeline::compose::{Composer, TextFlow};
use crate::session::UploadedFile;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use lopdf::Document;
use std::io::Cursor;
use tracing::debug;

pub fn render(file: &UploadedFile, config: &JobConfig) -> Result<Document, RenderError> {
    if file.content.is_empty() {
        return Err(RenderError::corrupt("zero-byte file"));
    }

    let cursor = Cursor::new(file.content.as_ref());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| RenderError::corrupt(format!("unreadable workbook: {e}")))?;
    let sheet_names = workbook.sheet_names().to_owned();

    let (page_w, page_h) = config.page_size.landscape_pt();
    let mut composer = Composer::new();
    let mut flow = TextFlow::new(&mut composer, page_w, page_h, config.margin_pt, config.font_size_pt);
    let mut rendered_sheets = 0usize;

    for name in sheet_names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| RenderError::corrupt(format!("sheet '{name}': {e}")))?;

        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
            .filter(|row: &Vec<String>| row.iter().any(|cell| !cell.is_empty()))
            .collect();

        if rows.is_empty() {
            debug!(sheet = %name, "skipping empty worksheet");
            continue;
        }

        if rendered_sheets > 0 {
            flow.page_break();
        }
        flow.heading(&format!("Sheet: {name}"));
        flow.table(&rows, true);
        rendered_sheets += 1;
    }

    flow.finish();

    if rendered_sheets == 0 {
        return Err(RenderError::corrupt("workbook has no populated cells"));
    }
    debug!(name = %file.original_name, sheets = rendered_sheets, "workbook rendered");
    Ok(composer.finish())
}

/// Cell value as display text; empty cells render as empty strings.
fn cell_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}
