//! Table detection.
//!
//! Three strategies look for tables on a page: ruled grids (lattice),
//! whitespace-aligned columns (stream) and delimiter runs (heuristic). The
//! detector runs them in chain order and keeps the first acceptable
//! candidate for each region of the page.

mod heuristic;
mod lattice;
mod stream;

pub use heuristic::{detect_delimited, DelimitedTable, HeuristicStrategy};
pub use lattice::LatticeStrategy;
pub use stream::{StreamConfig, StreamStrategy};

use serde::{Deserialize, Serialize};

use super::content::{FontSpan, PageContent};
use crate::error::ConversionWarning;
use crate::model::{BBox, Block, Element, Position};
use crate::options::{ConversionOptions, TableDetectionMethod};

/// Tolerance when testing whether a span lies inside a table box.
const CONSUME_TOLERANCE: f32 = 1.0;

/// Strategy that produced a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableMethod {
    /// Ruling-line grid
    Lattice,
    /// Whitespace alignment
    Stream,
    /// Delimiter runs
    Heuristic,
}

impl std::fmt::Display for TableMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TableMethod::Lattice => "lattice",
            TableMethod::Stream => "stream",
            TableMethod::Heuristic => "heuristic",
        };
        write!(f, "{}", name)
    }
}

/// A table found by one strategy, before acceptance.
#[derive(Debug, Clone, PartialEq)]
pub struct TableCandidate {
    /// Page number (1-indexed)
    pub page: u32,
    /// Area covered by the table
    pub bbox: BBox,
    /// Cell text by row; row 0 is the header
    pub rows: Vec<Vec<String>>,
    /// Strategy confidence in 0.0..=1.0
    pub confidence: f32,
    /// Strategy that found the table
    pub method: TableMethod,
}

impl TableCandidate {
    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns (widest row).
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Convert into a positioned table element.
    pub fn into_element(self) -> Element {
        Element::at(Block::table(self.rows), Position::new(self.page, self.bbox))
    }
}

/// A table detection strategy.
pub trait TableStrategy: Send + Sync {
    /// Which method this strategy implements.
    fn method(&self) -> TableMethod;

    /// Find table candidates on a page.
    fn detect(&self, page: &PageContent) -> Vec<TableCandidate>;
}

/// Table boxes already taken on the current page.
#[derive(Debug, Clone)]
pub struct ClaimedRegions {
    boxes: Vec<BBox>,
    center_distance: f32,
}

impl ClaimedRegions {
    /// Create an empty set. Boxes closer than `center_distance` count as
    /// the same region.
    pub fn new(center_distance: f32) -> Self {
        Self {
            boxes: Vec::new(),
            center_distance,
        }
    }

    /// Whether `bbox` overlaps or sits next to a claimed box.
    pub fn is_claimed(&self, bbox: &BBox) -> bool {
        self.boxes
            .iter()
            .any(|b| b.overlaps(bbox) || b.center_distance(bbox) < self.center_distance)
    }

    /// Claim a box.
    pub fn claim(&mut self, bbox: BBox) {
        self.boxes.push(bbox);
    }

    /// Number of claimed boxes.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Whether nothing is claimed.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

/// Tables accepted on one page.
#[derive(Debug, Default)]
pub struct PageTables {
    /// Accepted candidates in chain order
    pub tables: Vec<TableCandidate>,
    /// Low-confidence rejections
    pub warnings: Vec<ConversionWarning>,
}

/// Runs the strategy chain and resolves duplicates.
pub struct TableDetector {
    strategies: Vec<Box<dyn TableStrategy>>,
    confidence_threshold: f32,
    min_rows: usize,
    min_columns: usize,
    center_distance: f32,
}

impl std::fmt::Debug for TableDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableDetector")
            .field("methods", &self.methods())
            .field("confidence_threshold", &self.confidence_threshold)
            .field("min_rows", &self.min_rows)
            .field("min_columns", &self.min_columns)
            .finish()
    }
}

impl TableDetector {
    /// Build the chain selected by `table_detection_method`.
    pub fn from_options(options: &ConversionOptions) -> Self {
        let lattice = || Box::new(LatticeStrategy::new()) as Box<dyn TableStrategy>;
        let stream = || {
            Box::new(StreamStrategy::with_config(StreamConfig {
                min_rows: options.min_table_rows,
                min_columns: options.min_table_columns,
                ..StreamConfig::default()
            })) as Box<dyn TableStrategy>
        };
        let heuristic = || {
            Box::new(HeuristicStrategy::new(
                options.min_table_rows,
                options.min_table_columns,
            )) as Box<dyn TableStrategy>
        };

        let strategies = match options.table_detection_method {
            TableDetectionMethod::Lattice => vec![lattice()],
            TableDetectionMethod::Stream => vec![stream()],
            TableDetectionMethod::Heuristic => vec![heuristic()],
            TableDetectionMethod::Hybrid => vec![lattice(), stream(), heuristic()],
        };
        Self::with_strategies(strategies, options)
    }

    /// Build a detector around an explicit chain.
    pub fn with_strategies(
        strategies: Vec<Box<dyn TableStrategy>>,
        options: &ConversionOptions,
    ) -> Self {
        Self {
            strategies,
            confidence_threshold: options.pdf.table_confidence_threshold,
            min_rows: options.min_table_rows,
            min_columns: options.min_table_columns,
            center_distance: options.pdf.duplicate_center_distance,
        }
    }

    /// Methods in chain order.
    pub fn methods(&self) -> Vec<TableMethod> {
        self.strategies.iter().map(|s| s.method()).collect()
    }

    /// Detect tables on one page.
    ///
    /// Candidates are considered in chain order. A candidate is skipped
    /// when its region is already claimed, when its confidence is below
    /// the threshold (recorded as a warning) or when it is too small.
    pub fn detect_page(&self, page: &PageContent) -> PageTables {
        let mut result = PageTables::default();
        let mut claimed = ClaimedRegions::new(self.center_distance);

        for strategy in &self.strategies {
            let candidates = strategy.detect(page);
            log::debug!(
                "Page {}: {} produced {} table candidates",
                page.page,
                strategy.method(),
                candidates.len()
            );

            for candidate in candidates {
                if claimed.is_claimed(&candidate.bbox) {
                    log::debug!(
                        "Page {}: {} candidate overlaps an accepted table",
                        page.page,
                        candidate.method
                    );
                    continue;
                }
                if candidate.confidence < self.confidence_threshold {
                    result.warnings.push(ConversionWarning::low_confidence(format!(
                        "page {}: {} table candidate skipped (confidence {:.2} < {:.2})",
                        page.page, candidate.method, candidate.confidence, self.confidence_threshold
                    )));
                    continue;
                }
                if candidate.row_count() < self.min_rows
                    || candidate.column_count() < self.min_columns
                {
                    log::debug!(
                        "Page {}: {} candidate too small ({}x{})",
                        page.page,
                        candidate.method,
                        candidate.row_count(),
                        candidate.column_count()
                    );
                    continue;
                }

                claimed.claim(candidate.bbox);
                result.tables.push(candidate);
            }
        }
        result
    }
}

/// Remove spans whose centre lies inside an accepted table.
pub fn consume_spans(spans: Vec<FontSpan>, tables: &[TableCandidate]) -> Vec<FontSpan> {
    if tables.is_empty() {
        return spans;
    }
    spans
        .into_iter()
        .filter(|span| {
            let (x, y) = (span.bbox.x_mid(), span.bbox.y_mid());
            !tables
                .iter()
                .any(|t| t.bbox.contains_point(x, y, CONSUME_TOLERANCE))
        })
        .collect()
}
