//! # undoc
//!
//! Structural document conversion for Rust.
//!
//! This library reads PDF, DOCX, PPTX, XLSX and HTML documents, recovers
//! their structure (headings, paragraphs, lists, tables, images) and writes
//! normalized Markdown with YAML frontmatter.
//!
//! ## Quick Start
//!
//! ```no_run
//! use undoc::{convert, ConversionOptions};
//!
//! let options = ConversionOptions::default();
//! let result = convert("report.pdf", "out", &options);
//! assert!(result.success);
//! println!("{}", std::fs::read_to_string(result.target_path.unwrap()).unwrap());
//! ```
//!
//! ## Pipeline
//!
//! - **Adapters**: one per format, producing a [`Document`] of ordered blocks
//! - **PDF inference**: font statistics for headings, column detection and
//!   lattice/stream/heuristic table detection
//! - **Rendering**: deterministic Markdown from the document model
//! - **Structure fixing**: heading hierarchy, capitalization, paragraphs,
//!   lists, required sections and frontmatter
//! - **Batches**: a bounded [`WorkerPool`] converting jobs in parallel

pub mod adapter;
pub mod assets;
pub mod convert;
pub mod detect;
pub mod error;
pub mod fixer;
pub mod model;
pub mod options;
pub mod pdf;
pub mod render;

// Re-export commonly used types
pub use adapter::{DocumentAdapter, ExtractContext};
pub use convert::{
    convert, convert_bytes, ConversionJob, ConversionResult, JobOutcome, WorkerPool,
};
pub use detect::{detect_format, sniff_format, DocumentFormat};
pub use error::{ConversionWarning, Error, ErrorKind, Result, WarningKind};
pub use fixer::{fix, FixContext, FixOutcome, PassChanges, StructureFixer};
pub use model::{Block, Document, Element, Frontmatter, MetaValue, Metadata, Scalar, TextRun};
pub use options::{
    CapitalizationMode, ConversionOptions, ListMarker, PdfOptions, TableDetectionMethod,
};
pub use render::{ExtractionStats, MarkdownDocument, MarkdownRenderer};

use std::fs;
use std::path::Path;

/// Extract the document model from bytes without writing any files.
///
/// Images are not extracted. The file name selects the adapter.
///
/// # Example
///
/// ```no_run
/// use undoc::{parse_bytes, ConversionOptions};
///
/// let data = std::fs::read("slides.pptx").unwrap();
/// let doc = parse_bytes(&data, "slides.pptx", &ConversionOptions::default()).unwrap();
/// println!("{} blocks", doc.elements.len());
/// ```
pub fn parse_bytes(
    data: &[u8],
    filename: impl AsRef<Path>,
    options: &ConversionOptions,
) -> Result<Document> {
    let filename = filename.as_ref();
    options.validate()?;
    let format = detect_format(filename, data, options)?;
    let mut ctx = ExtractContext::without_assets(options);
    DocumentAdapter::for_format(format).extract(data, filename, &mut ctx)
}

/// Extract the document model from a file without writing any files.
pub fn parse_file(path: impl AsRef<Path>, options: &ConversionOptions) -> Result<Document> {
    let path = path.as_ref();
    let data = fs::read(path)
        .map_err(|e| Error::SourceUnreadable(format!("{}: {}", path.display(), e)))?;
    parse_bytes(&data, path, options)
}

/// Convert a file to fixed Markdown text in memory.
///
/// Equivalent to [`convert`] without writing output or assets.
///
/// # Example
///
/// ```no_run
/// use undoc::{to_markdown, ConversionOptions};
///
/// let markdown = to_markdown("handbook.docx", &ConversionOptions::default()).unwrap();
/// std::fs::write("handbook.md", markdown).unwrap();
/// ```
pub fn to_markdown(path: impl AsRef<Path>, options: &ConversionOptions) -> Result<String> {
    let path = path.as_ref();
    let doc = parse_file(path, options)?;
    let rendered = render::to_markdown(&doc, options);
    let ctx = FixContext::new(options).with_source(path).with_format(doc.format);
    Ok(fix(rendered, &ctx).document.to_string())
}
