//! Heuristic strategy: tables from delimiter runs.
//!
//! Lines are rebuilt from spans with a tab at every large horizontal gap.
//! Consecutive lines that split into enough tab- or pipe-separated fields
//! form a table.

use std::collections::HashMap;

use super::{TableCandidate, TableMethod, TableStrategy};
use crate::pdf::content::PageContent;
use crate::pdf::layout::group_lines;

/// Fewest fields for a line to count as delimited.
const MIN_FIELDS: usize = 3;

/// A delimited run found in a list of lines.
#[derive(Debug, Clone, PartialEq)]
pub struct DelimitedTable {
    /// First line of the run
    pub start: usize,
    /// Last line of the run (inclusive)
    pub end: usize,
    /// Cells, padded or truncated to the modal width
    pub rows: Vec<Vec<String>>,
    /// Share of rows whose field count equals the mode
    pub confidence: f32,
}

/// Split a line into fields, or `None` if it has no delimiter.
fn split_fields(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if trimmed.contains('\t') {
        return Some(trimmed.split('\t').map(|f| f.trim().to_string()).collect());
    }
    if trimmed.contains('|') {
        let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
        let inner = inner.strip_suffix('|').unwrap_or(inner);
        return Some(inner.split('|').map(|f| f.trim().to_string()).collect());
    }
    None
}

/// A Markdown-style `|---|:---:|` separator row.
fn is_separator_row(fields: &[String]) -> bool {
    !fields.is_empty()
        && fields.iter().all(|f| {
            !f.is_empty() && f.chars().all(|c| matches!(c, '-' | ':' | '=' | '+'))
        })
}

/// Find delimited runs in `lines`.
///
/// A run needs at least `min_rows` rows of at least `max(3, min_columns)`
/// fields. The column count is the mode of the field counts, ties going to
/// the wider layout.
pub fn detect_delimited(lines: &[&str], min_rows: usize, min_columns: usize) -> Vec<DelimitedTable> {
    let min_fields = MIN_FIELDS.max(min_columns);
    let mut tables = Vec::new();
    let mut run: Vec<Vec<String>> = Vec::new();
    let mut run_start = 0;
    let mut run_end = 0;

    for (i, line) in lines.iter().enumerate() {
        match split_fields(line) {
            Some(fields) if is_separator_row(&fields) && !run.is_empty() => {
                run_end = i;
            }
            Some(fields) if fields.len() >= min_fields => {
                if run.is_empty() {
                    run_start = i;
                }
                run.push(fields);
                run_end = i;
            }
            _ => {
                if let Some(table) = finish_run(std::mem::take(&mut run), run_start, run_end, min_rows) {
                    tables.push(table);
                }
            }
        }
    }
    if let Some(table) = finish_run(run, run_start, run_end, min_rows) {
        tables.push(table);
    }
    tables
}

fn finish_run(
    run: Vec<Vec<String>>,
    start: usize,
    end: usize,
    min_rows: usize,
) -> Option<DelimitedTable> {
    if run.is_empty() || run.len() < min_rows {
        return None;
    }

    let mut counts: HashMap<usize, usize> = HashMap::new();
    for row in &run {
        *counts.entry(row.len()).or_insert(0) += 1;
    }
    let (width, matching) = counts
        .into_iter()
        .max_by(|(wa, ca), (wb, cb)| ca.cmp(cb).then_with(|| wa.cmp(wb)))?;

    let confidence = matching as f32 / run.len() as f32;
    let rows = run
        .into_iter()
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect();

    Some(DelimitedTable {
        start,
        end,
        rows,
        confidence,
    })
}

/// Detects tables from tab and pipe delimiter runs.
#[derive(Debug, Clone)]
pub struct HeuristicStrategy {
    min_rows: usize,
    min_columns: usize,
}

impl HeuristicStrategy {
    /// Create a strategy with the minimum table shape.
    pub fn new(min_rows: usize, min_columns: usize) -> Self {
        Self {
            min_rows,
            min_columns,
        }
    }
}

impl Default for HeuristicStrategy {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

impl TableStrategy for HeuristicStrategy {
    fn method(&self) -> TableMethod {
        TableMethod::Heuristic
    }

    fn detect(&self, page: &PageContent) -> Vec<TableCandidate> {
        let lines = group_lines(page.spans.clone());
        let texts: Vec<String> = lines.iter().map(|l| l.text_with_tabs()).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

        detect_delimited(&refs, self.min_rows, self.min_columns)
            .into_iter()
            .filter_map(|table| {
                let bbox = lines[table.start..=table.end]
                    .iter()
                    .map(|l| l.bbox)
                    .reduce(|a, b| a.union(&b))?;
                log::debug!(
                    "Heuristic: page {} lines {}..={} -> {} rows",
                    page.page,
                    table.start,
                    table.end,
                    table.rows.len()
                );
                Some(TableCandidate {
                    page: page.page,
                    bbox,
                    rows: table.rows,
                    confidence: table.confidence,
                    method: TableMethod::Heuristic,
                })
            })
            .collect()
    }
}
