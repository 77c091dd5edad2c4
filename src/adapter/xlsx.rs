//! XLSX adapter.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, SheetVisible, Xlsx};

use super::ooxml::{read_core_properties, Package};
use super::ExtractContext;
use crate::detect::DocumentFormat;
use crate::error::{ConversionWarning, Result};
use crate::model::{Block, Document};

/// Extracts one table per visible worksheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XlsxAdapter;

impl XlsxAdapter {
    /// Extract a document from XLSX bytes.
    pub fn extract(
        &self,
        data: &[u8],
        filename: &Path,
        ctx: &mut ExtractContext<'_>,
    ) -> Result<Document> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(data))?;
        let mut document = Document::new(filename, DocumentFormat::Xlsx);
        if let Ok(mut package) = Package::open(data) {
            read_core_properties(&mut package, &mut document.metadata);
        }

        let sheets: Vec<(String, SheetVisible)> = workbook
            .sheets_metadata()
            .iter()
            .map(|s| (s.name.clone(), s.visible))
            .collect();
        document.metadata.set("sheet_count", sheets.len());

        let (max_rows, max_columns) = (ctx.options.max_rows, ctx.options.max_columns);
        for (name, visible) in sheets {
            if visible != SheetVisible::Visible {
                log::debug!("Skipping hidden sheet '{}'", name);
                continue;
            }
            let range = workbook.worksheet_range(&name)?;
            let rows: Vec<Vec<String>> = range
                .rows()
                .map(|row| row.iter().map(cell_text).collect())
                .collect();

            let rows = trim_empty(rows);
            if rows.is_empty() {
                log::debug!("Skipping empty sheet '{}'", name);
                continue;
            }

            let (total_rows, total_columns) = (rows.len(), rows[0].len());
            let (rows, truncated) = bound(rows, max_rows, max_columns);
            document.push(Block::heading(2, name.as_str()));
            document.push(Block::table(rows));

            if truncated {
                let note = format!(
                    "Sheet '{}' truncated from {} x {} to at most {} x {} cells.",
                    name, total_rows, total_columns, max_rows, max_columns
                );
                document.push(Block::paragraph(format!("_Note: {}_", note)));
                ctx.warn(ConversionWarning::degraded(false, note));
            }
        }

        Ok(document)
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Error(e) => format!("#{:?}", e),
        other => other.to_string(),
    }
}

/// Drop empty trailing rows and columns; leading ones are kept so that
/// header positions stay stable.
fn trim_empty(mut rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    while rows
        .last()
        .is_some_and(|row| row.iter().all(|c| c.is_empty()))
    {
        rows.pop();
    }
    let width = rows
        .iter()
        .filter_map(|row| row.iter().rposition(|c| !c.is_empty()))
        .max()
        .map(|last| last + 1)
        .unwrap_or(0);
    if width == 0 {
        return Vec::new();
    }
    for row in &mut rows {
        row.resize(width, String::new());
    }
    rows
}

/// Clip to `max_rows` x `max_columns`, reporting whether anything was cut.
fn bound(mut rows: Vec<Vec<String>>, max_rows: usize, max_columns: usize) -> (Vec<Vec<String>>, bool) {
    let mut truncated = false;
    if rows.len() > max_rows {
        rows.truncate(max_rows);
        truncated = true;
    }
    for row in &mut rows {
        if row.len() > max_columns {
            row.truncate(max_columns);
            truncated = true;
        }
    }
    (rows, truncated)
}
