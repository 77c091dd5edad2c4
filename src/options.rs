//! Conversion options.
//!
//! [`ConversionOptions`] is the settings object supplied by the admin
//! surface. It deserializes from camelCase JSON, every key has a default,
//! and it is treated as immutable once a job starts.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Table detection strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableDetectionMethod {
    /// Ruling-line grids only
    Lattice,
    /// Whitespace alignment only
    Stream,
    /// Delimiter runs only
    Heuristic,
    /// Lattice, then stream, then heuristic
    #[default]
    Hybrid,
}

/// Heading capitalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapitalizationMode {
    /// Capitalize each significant word
    Title,
    /// Capitalize only the first word
    Sentence,
    /// Leave headings untouched
    #[default]
    None,
}

/// Bullet marker used for unordered lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ListMarker {
    /// `-`
    #[default]
    #[serde(rename = "-")]
    Dash,
    /// `*`
    #[serde(rename = "*")]
    Asterisk,
    /// `+`
    #[serde(rename = "+")]
    Plus,
}

impl ListMarker {
    /// The marker character.
    pub fn as_char(self) -> char {
        match self {
            ListMarker::Dash => '-',
            ListMarker::Asterisk => '*',
            ListMarker::Plus => '+',
        }
    }
}

impl std::fmt::Display for ListMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Tunable constants of the PDF structural inference.
///
/// The heading ratios and the column gap ratio are empirical and should be
/// calibrated against real corpora.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfOptions {
    /// Maximum number of pages sampled for font statistics
    pub sample_pages: usize,
    /// Size ratio to body text for level 1 headings
    pub h1_ratio: f32,
    /// Size ratio to body text for level 2 headings
    pub h2_ratio: f32,
    /// Size ratio to body text for level 3 headings
    pub h3_ratio: f32,
    /// Tolerance in points when matching a span against a heading candidate
    pub size_tolerance: f32,
    /// Number of histogram buckets across the page width
    pub column_buckets: usize,
    /// Minimum gap width, as a fraction of page width, separating columns
    pub column_gap_ratio: f32,
    /// Minimum detector confidence required to accept a table
    pub table_confidence_threshold: f32,
    /// Center distance (points) under which two table boxes are duplicates
    pub duplicate_center_distance: f32,
    /// Lines longer than this are never treated as headings
    pub max_heading_chars: usize,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            sample_pages: 10,
            h1_ratio: 1.8,
            h2_ratio: 1.5,
            h3_ratio: 1.2,
            size_tolerance: 0.1,
            column_buckets: 20,
            column_gap_ratio: 0.10,
            table_confidence_threshold: 0.5,
            duplicate_center_distance: 100.0,
            max_heading_chars: 200,
        }
    }
}

/// Options controlling a conversion job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversionOptions {
    /// Extract embedded images into `assets/`
    pub extract_images: bool,
    /// Longest allowed image side in pixels; larger images are downscaled
    pub max_image_size: u32,
    /// Run table detection on PDF pages
    pub detect_tables: bool,
    /// Which table detection strategies to run
    pub table_detection_method: TableDetectionMethod,
    /// Minimum rows for a detected table (header included)
    pub min_table_rows: usize,
    /// Minimum columns for a detected table
    pub min_table_columns: usize,
    /// Largest accepted source file in megabytes
    #[serde(rename = "maxFileSizeMB", alias = "maxFileSizeMb")]
    pub max_file_size_mb: u64,
    /// Worker pool size
    pub concurrency: usize,
    /// Extensions accepted for conversion (without the dot)
    pub allowed_extensions: Vec<String>,
    /// Level that the shallowest heading is normalized to
    pub top_level_heading: u8,
    /// Deepest heading level allowed in output
    pub max_heading_level: u8,
    /// Number of levels a heading may skip below its predecessor
    pub allowed_skips: u8,
    /// Heading capitalization mode
    pub auto_capitalize: CapitalizationMode,
    /// Insert placeholder sections for missing required sections
    pub create_missing_sections: bool,
    /// Section titles that must exist
    pub required_sections: Vec<String>,
    /// Canonical order of sections, used to place synthesized ones
    pub section_order: Vec<String>,
    /// Bullet marker for unordered lists
    pub list_marker: ListMarker,
    /// Put each sentence of a paragraph on its own line
    pub sentence_per_line: bool,
    /// Paragraphs longer than this many characters are split
    pub max_paragraph_length: usize,
    /// Preferred frontmatter key order
    pub frontmatter_order: Vec<String>,
    /// Body text inserted under synthesized sections
    pub section_placeholder: String,
    /// Row bound for spreadsheet tables
    pub max_rows: usize,
    /// Column bound for spreadsheet tables
    pub max_columns: usize,
    /// PDF inference constants
    pub pdf: PdfOptions,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            extract_images: true,
            max_image_size: 1024,
            detect_tables: true,
            table_detection_method: TableDetectionMethod::Hybrid,
            min_table_rows: 2,
            min_table_columns: 2,
            max_file_size_mb: 100,
            concurrency: 4,
            allowed_extensions: ["pdf", "docx", "pptx", "xlsx", "html", "htm"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            top_level_heading: 1,
            max_heading_level: 6,
            allowed_skips: 0,
            auto_capitalize: CapitalizationMode::None,
            create_missing_sections: false,
            required_sections: Vec::new(),
            section_order: Vec::new(),
            list_marker: ListMarker::Dash,
            sentence_per_line: false,
            max_paragraph_length: 1000,
            frontmatter_order: [
                "title",
                "author",
                "created",
                "modified",
                "original_format",
                "source_file",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            section_placeholder: "_Content to be added._".to_string(),
            max_rows: 1000,
            max_columns: 50,
            pdf: PdfOptions::default(),
        }
    }
}

impl ConversionOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a JSON string and validate them.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a JSON file and validate them.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check value ranges and cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if !(1..=6).contains(&self.top_level_heading) {
            return Err(Error::InvalidOptions(format!(
                "topLevelHeading must be between 1 and 6, got {}",
                self.top_level_heading
            )));
        }
        if !(1..=6).contains(&self.max_heading_level) {
            return Err(Error::InvalidOptions(format!(
                "maxHeadingLevel must be between 1 and 6, got {}",
                self.max_heading_level
            )));
        }
        if self.max_heading_level < self.top_level_heading {
            return Err(Error::InvalidOptions(format!(
                "maxHeadingLevel ({}) is below topLevelHeading ({})",
                self.max_heading_level, self.top_level_heading
            )));
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidOptions(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_image_size == 0 {
            return Err(Error::InvalidOptions(
                "maxImageSize must be at least 1".to_string(),
            ));
        }
        if self.pdf.column_buckets < 3 {
            return Err(Error::InvalidOptions(
                "pdf.columnBuckets must be at least 3".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a file extension is accepted (case-insensitive, dot optional).
    pub fn allows_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    /// Maximum source size in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// Enable or disable image extraction.
    pub fn with_images(mut self, extract: bool) -> Self {
        self.extract_images = extract;
        self
    }

    /// Set the longest allowed image side.
    pub fn with_max_image_size(mut self, size: u32) -> Self {
        self.max_image_size = size;
        self
    }

    /// Enable or disable table detection.
    pub fn with_tables(mut self, detect: bool) -> Self {
        self.detect_tables = detect;
        self
    }

    /// Set the table detection strategy.
    pub fn with_table_method(mut self, method: TableDetectionMethod) -> Self {
        self.table_detection_method = method;
        self
    }

    /// Set the worker pool size.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the heading level bounds.
    pub fn with_heading_levels(mut self, top: u8, max: u8) -> Self {
        self.top_level_heading = top;
        self.max_heading_level = max;
        self
    }

    /// Set heading capitalization.
    pub fn with_capitalization(mut self, mode: CapitalizationMode) -> Self {
        self.auto_capitalize = mode;
        self
    }

    /// Set the unordered list marker.
    pub fn with_list_marker(mut self, marker: ListMarker) -> Self {
        self.list_marker = marker;
        self
    }

    /// Set the sections a document is expected to contain.
    pub fn with_required_sections<I, S>(mut self, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_sections = sections.into_iter().map(Into::into).collect();
        self
    }

    /// Insert placeholder sections for required sections that are absent.
    pub fn with_missing_sections(mut self, create: bool) -> Self {
        self.create_missing_sections = create;
        self
    }

    /// Set the canonical section order.
    pub fn with_section_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.section_order = order.into_iter().map(Into::into).collect();
        self
    }

    /// Put each sentence on its own line.
    pub fn with_sentence_per_line(mut self, enabled: bool) -> Self {
        self.sentence_per_line = enabled;
        self
    }
}
