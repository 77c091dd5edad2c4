//! Stream strategy: tables from text alignment.
//!
//! Inspired by Camelot's Stream mode, this strategy detects tables by
//! analyzing text alignment patterns without relying on graphical lines.

use std::collections::{HashMap, HashSet};

use super::{TableCandidate, TableMethod, TableStrategy};
use crate::pdf::content::{FontSpan, PageContent};
use crate::pdf::layout::{is_bullet_marker, is_number_marker};

/// X positions within this many points share an edge bucket.
const EDGE_BUCKET: f32 = 5.0;

/// Tolerance for a span to align with a column edge.
const ALIGN_TOLERANCE: f32 = 5.0;

/// Cells averaging more words than this are running prose.
const MAX_WORDS_PER_CELL: f32 = 6.0;

/// A row of text spans in a table region, sorted by X.
#[derive(Debug, Clone)]
struct RowData {
    spans: Vec<FontSpan>,
}

/// Stream strategy configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Minimum number of rows to consider as table
    pub min_rows: usize,
    /// Minimum number of columns to consider as table
    pub min_columns: usize,
    /// Maximum number of columns (above this, likely word-level splitting)
    pub max_columns: usize,
    /// Y tolerance for grouping spans into rows (fraction of font size)
    pub y_tolerance_factor: f32,
    /// Minimum column alignment ratio (0.0-1.0)
    pub min_alignment_ratio: f32,
    /// Minimum gap between columns (points)
    pub min_column_gap: f32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 6,
            y_tolerance_factor: 0.4,
            min_alignment_ratio: 0.3,
            min_column_gap: 15.0,
        }
    }
}

/// Detects tables from whitespace-aligned columns.
#[derive(Debug, Clone, Default)]
pub struct StreamStrategy {
    config: StreamConfig,
}

impl StreamStrategy {
    /// Create a strategy with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a strategy with custom configuration.
    pub fn with_config(config: StreamConfig) -> Self {
        Self { config }
    }

    /// Detect tables in the given spans.
    pub fn detect_spans(&self, page: u32, spans: &[FontSpan]) -> Vec<TableCandidate> {
        if spans.len() < self.config.min_rows * self.config.min_columns {
            log::debug!(
                "Stream: not enough spans ({} < {})",
                spans.len(),
                self.config.min_rows * self.config.min_columns
            );
            return Vec::new();
        }

        let rows = self.group_into_rows(spans);
        if rows.len() < self.config.min_rows {
            return Vec::new();
        }

        let columns = self.detect_columns(&rows);
        log::debug!(
            "Stream: {} rows, {} columns at {:?}",
            rows.len(),
            columns.len(),
            columns
        );
        if columns.len() < self.config.min_columns {
            return Vec::new();
        }

        let regions = self.find_table_regions(&rows, &columns);
        log::debug!("Stream: found {} table regions", regions.len());

        let mut tables = Vec::new();
        for (start_row, end_row) in regions {
            let table_rows = &rows[start_row..=end_row];

            // Re-detect columns for this specific table region
            let table_columns = self.detect_columns(table_rows);
            if table_columns.len() < self.config.min_columns {
                continue;
            }
            if table_columns.len() > self.config.max_columns {
                log::debug!(
                    "Stream: skipping region, too many columns ({} > {})",
                    table_columns.len(),
                    self.config.max_columns
                );
                continue;
            }
            if self.is_list_pattern(table_rows, &table_columns) {
                log::debug!("Stream: skipping region, detected as list pattern");
                continue;
            }

            let Some(bbox) = table_rows
                .iter()
                .flat_map(|r| r.spans.iter())
                .map(|s| s.bbox)
                .reduce(|a, b| a.union(&b))
            else {
                continue;
            };

            let cells = self.build_cells(table_rows, &table_columns, bbox.x1);
            if is_prose(&cells) {
                log::debug!("Stream: skipping region, cells read as prose");
                continue;
            }

            let confidence = table_rows
                .iter()
                .map(|r| self.calculate_alignment_score(r, &table_columns))
                .sum::<f32>()
                / table_rows.len() as f32;

            tables.push(TableCandidate {
                page,
                bbox,
                rows: cells,
                confidence,
                method: TableMethod::Stream,
            });
        }
        tables
    }

    /// Group spans into rows by baseline, top to bottom.
    fn group_into_rows(&self, spans: &[FontSpan]) -> Vec<RowData> {
        let mut sorted_spans = spans.to_vec();
        sorted_spans.sort_by(|a, b| {
            a.baseline
                .total_cmp(&b.baseline)
                .then_with(|| a.x().total_cmp(&b.x()))
        });

        let mut rows: Vec<RowData> = Vec::new();
        let mut current_row_spans: Vec<FontSpan> = Vec::new();
        let mut current_y: Option<f32> = None;

        for span in sorted_spans {
            let y_tolerance = span.size * self.config.y_tolerance_factor;

            match current_y {
                Some(y) if (span.baseline - y).abs() <= y_tolerance => {
                    current_row_spans.push(span);
                }
                _ => {
                    if !current_row_spans.is_empty() {
                        rows.push(make_row(std::mem::take(&mut current_row_spans)));
                    }
                    current_y = Some(span.baseline);
                    current_row_spans.push(span);
                }
            }
        }

        if !current_row_spans.is_empty() {
            rows.push(make_row(current_row_spans));
        }
        rows
    }

    /// Detect column boundaries from text edges.
    ///
    /// Rows with several spans vote for their left edges; an edge seen in
    /// enough rows becomes a column.
    fn detect_columns(&self, rows: &[RowData]) -> Vec<f32> {
        if rows.is_empty() {
            return Vec::new();
        }

        let multi_span_rows: Vec<&RowData> = rows.iter().filter(|r| r.spans.len() >= 2).collect();
        if multi_span_rows.len() < self.config.min_rows {
            // Not enough multi-span rows, fall back to simpler detection
            return self.detect_columns_simple(rows);
        }

        let mut edge_counts: HashMap<i32, usize> = HashMap::new();
        for row in &multi_span_rows {
            // Count each bucket once per row
            let row_buckets: HashSet<i32> = row
                .spans
                .iter()
                .map(|s| (s.x() / EDGE_BUCKET).round() as i32)
                .collect();
            for bucket in row_buckets {
                *edge_counts.entry(bucket).or_insert(0) += 1;
            }
        }

        let min_occurrences =
            ((multi_span_rows.len() as f32 * self.config.min_alignment_ratio) as usize).max(2);
        self.merge_edges(&edge_counts, min_occurrences)
    }

    /// Simpler column detection for when few rows have multiple spans.
    fn detect_columns_simple(&self, rows: &[RowData]) -> Vec<f32> {
        let mut edge_counts: HashMap<i32, usize> = HashMap::new();
        for row in rows {
            for span in &row.spans {
                let bucket = (span.x() / EDGE_BUCKET).round() as i32;
                *edge_counts.entry(bucket).or_insert(0) += 1;
            }
        }

        let min_occurrences =
            ((rows.len() as f32 * self.config.min_alignment_ratio) as usize).max(2);
        self.merge_edges(&edge_counts, min_occurrences)
    }

    fn merge_edges(&self, edge_counts: &HashMap<i32, usize>, min_occurrences: usize) -> Vec<f32> {
        let mut column_edges: Vec<f32> = edge_counts
            .iter()
            .filter(|(_, count)| **count >= min_occurrences)
            .map(|(bucket, _)| *bucket as f32 * EDGE_BUCKET)
            .collect();
        column_edges.sort_by(f32::total_cmp);

        let mut merged: Vec<f32> = Vec::new();
        for edge in column_edges {
            match merged.last() {
                Some(last) if edge - last < self.config.min_column_gap => {}
                _ => merged.push(edge),
            }
        }
        merged
    }

    /// Find contiguous row regions that form tables.
    fn find_table_regions(&self, rows: &[RowData], columns: &[f32]) -> Vec<(usize, usize)> {
        let mut regions = Vec::new();
        let mut current_start: Option<usize> = None;

        for (i, row) in rows.iter().enumerate() {
            let aligned = row.spans.len() >= 2
                && self.calculate_alignment_score(row, columns) >= self.config.min_alignment_ratio;

            if aligned {
                current_start.get_or_insert(i);
            } else if let Some(start) = current_start.take() {
                if i - start >= self.config.min_rows {
                    regions.push((start, i - 1));
                }
            }
        }

        if let Some(start) = current_start {
            if rows.len() - start >= self.config.min_rows {
                regions.push((start, rows.len() - 1));
            }
        }
        regions
    }

    /// Calculate how well a row aligns with the detected columns.
    fn calculate_alignment_score(&self, row: &RowData, columns: &[f32]) -> f32 {
        if row.spans.is_empty() || columns.is_empty() {
            return 0.0;
        }

        let aligned_spans = row
            .spans
            .iter()
            .filter(|span| columns.iter().any(|col| (span.x() - col).abs() <= ALIGN_TOLERANCE))
            .count();

        aligned_spans as f32 / row.spans.len() as f32
    }

    /// Assign every span to a column and join cell text.
    fn build_cells(&self, rows: &[RowData], columns: &[f32], right_x: f32) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| {
                let mut cell_contents: Vec<Vec<&str>> = vec![Vec::new(); columns.len()];
                for span in &row.spans {
                    let col_idx = find_column_for_span(span.x(), columns, right_x);
                    if let Some(cell) = cell_contents.get_mut(col_idx) {
                        cell.push(span.text.trim());
                    }
                }
                cell_contents
                    .into_iter()
                    .map(|contents| contents.join(" "))
                    .collect()
            })
            .collect()
    }

    /// Check if detected table rows actually represent a numbered or
    /// bulleted list.
    ///
    /// When a PDF has a numbered list like "1. Item", the number and text
    /// often become separate spans at different X positions, which looks
    /// like a multi-column table.
    fn is_list_pattern(&self, rows: &[RowData], columns: &[f32]) -> bool {
        if columns.len() < 2 || rows.is_empty() {
            return false;
        }

        let mut bullet_count = 0;
        let mut number_count = 0;
        for row in rows {
            if let Some(span) = row.spans.iter().min_by(|a, b| a.x().total_cmp(&b.x())) {
                let text = span.text.trim();
                if is_bullet_marker(text) {
                    bullet_count += 1;
                } else if is_number_marker(text) {
                    number_count += 1;
                }
            }
        }

        let bullet_ratio = bullet_count as f32 / rows.len() as f32;
        let total_ratio = (bullet_count + number_count) as f32 / rows.len() as f32;
        log::debug!(
            "Stream: list markers: bullets={}, numbers={}, rows={}",
            bullet_count,
            number_count,
            rows.len()
        );

        // Bullet markers are almost never real table data
        if bullet_ratio >= 0.5 {
            return true;
        }

        // Numbered markers only reject 2-column tables, so real tables with
        // a numbered first column survive
        columns.len() == 2 && total_ratio >= 0.5
    }
}

impl TableStrategy for StreamStrategy {
    fn method(&self) -> TableMethod {
        TableMethod::Stream
    }

    fn detect(&self, page: &PageContent) -> Vec<TableCandidate> {
        self.detect_spans(page.page, &page.spans)
    }
}

fn make_row(mut spans: Vec<FontSpan>) -> RowData {
    spans.sort_by(|a, b| a.x().total_cmp(&b.x()));
    RowData { spans }
}

/// Find which column a span belongs to based on its X position.
fn find_column_for_span(span_x: f32, columns: &[f32], right_x: f32) -> usize {
    // Allow 10pt for spans slightly before their column start
    for (i, &col_start) in columns.iter().enumerate() {
        let col_end = columns.get(i + 1).copied().unwrap_or(right_x + 100.0);
        if span_x >= col_start - 10.0 && span_x < col_end - 10.0 {
            return i;
        }
    }

    columns
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (span_x - **a).abs().total_cmp(&(span_x - **b).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Whether the grid reads as running text rather than tabular data.
fn is_prose(cells: &[Vec<String>]) -> bool {
    let filled: Vec<&String> = cells.iter().flatten().filter(|c| !c.is_empty()).collect();
    if filled.is_empty() {
        return true;
    }
    let words: usize = filled.iter().map(|c| c.split_whitespace().count()).sum();
    words as f32 / filled.len() as f32 > MAX_WORDS_PER_CELL
}
