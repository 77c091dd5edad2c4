//! Conversion entry points.
//!
//! A conversion job reads one source document, extracts it with the adapter
//! for its format, renders Markdown, runs the structure fixer and writes
//! `<stem>.md` (plus `assets/`) into the target directory.
//!
//! # Example
//!
//! ```no_run
//! use undoc::{convert, ConversionOptions};
//!
//! let options = ConversionOptions::default();
//! let result = convert("report.docx", "out", &options);
//! if result.success {
//!     println!("wrote {:?}", result.target_path);
//! } else {
//!     eprintln!("failed: {:?}", result.error);
//! }
//! ```

mod pool;

pub use pool::{ConversionJob, JobOutcome, WorkerPool};

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::adapter::{DocumentAdapter, ExtractContext};
use crate::assets::AssetPipeline;
use crate::detect::detect_format;
use crate::error::{panic_message, ConversionWarning, Error, ErrorKind, Result};
use crate::fixer::{fix, FixContext};
use crate::model::Frontmatter;
use crate::options::ConversionOptions;
use crate::render::{to_markdown, ExtractionStats, MarkdownDocument};

/// Outcome of one conversion job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    /// Whether a Markdown file was written
    pub success: bool,

    /// Path of the written Markdown file
    pub target_path: Option<PathBuf>,

    /// Final frontmatter
    pub metadata: Frontmatter,

    /// Non-fatal warnings
    pub warnings: Vec<ConversionWarning>,

    /// Structure fixer changes as `pass: description`
    pub changes: Vec<String>,

    /// Failure description
    pub error: Option<String>,

    /// Failure category
    pub error_kind: Option<ErrorKind>,

    /// Counts over the final Markdown body
    pub stats: ExtractionStats,
}

impl ConversionResult {
    /// A failed result for `error`.
    pub fn failed(error: &Error) -> Self {
        Self {
            success: false,
            target_path: None,
            metadata: Frontmatter::new(),
            warnings: Vec::new(),
            changes: Vec::new(),
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            stats: ExtractionStats::default(),
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A finished conversion before it is turned into a result.
struct Converted {
    target_path: PathBuf,
    document: MarkdownDocument,
    warnings: Vec<ConversionWarning>,
    changes: Vec<String>,
}

/// Where the input comes from.
#[derive(Clone, Copy)]
enum Input<'a> {
    File(&'a Path),
    Bytes { data: &'a [u8], filename: &'a Path },
}

impl Input<'_> {
    fn name(&self) -> &Path {
        match self {
            Input::File(path) => path,
            Input::Bytes { filename, .. } => filename,
        }
    }
}

/// Convert a file on disk into `target_dir/<stem>.md`.
///
/// Never panics; every failure is reported on the returned result.
pub fn convert(
    source_path: impl AsRef<Path>,
    target_dir: impl AsRef<Path>,
    options: &ConversionOptions,
) -> ConversionResult {
    run_job(Input::File(source_path.as_ref()), target_dir.as_ref(), options)
}

/// Convert in-memory content named `filename` into `target_dir`.
pub fn convert_bytes(
    data: &[u8],
    filename: impl AsRef<Path>,
    target_dir: impl AsRef<Path>,
    options: &ConversionOptions,
) -> ConversionResult {
    let input = Input::Bytes {
        data,
        filename: filename.as_ref(),
    };
    run_job(input, target_dir.as_ref(), options)
}

fn run_job(input: Input<'_>, target_dir: &Path, options: &ConversionOptions) -> ConversionResult {
    let start = Instant::now();
    let name = input.name().display().to_string();
    log::info!("Converting {} into {}", name, target_dir.display());

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        options.validate()?;
        match input {
            Input::File(path) => {
                let data = read_source(path, options)?;
                run_pipeline(&data, path, true, target_dir, options)
            }
            Input::Bytes { data, filename } => {
                check_size(data.len() as u64, options)?;
                run_pipeline(data, filename, false, target_dir, options)
            }
        }
    }));

    match outcome {
        Ok(Ok(converted)) => {
            let stats = ExtractionStats::from_markdown(&converted.document.body);
            log::info!(
                "Converted {} in {:.1?}: {} headings, {} tables, {} warnings",
                name,
                start.elapsed(),
                stats.heading_count,
                stats.table_count,
                converted.warnings.len()
            );
            ConversionResult {
                success: true,
                target_path: Some(converted.target_path),
                metadata: converted.document.frontmatter,
                warnings: converted.warnings,
                changes: converted.changes,
                error: None,
                error_kind: None,
                stats,
            }
        }
        Ok(Err(e)) => {
            log::error!("Conversion of {} failed: {}", name, e);
            ConversionResult::failed(&e)
        }
        Err(payload) => {
            let e = Error::SourceUnreadable(format!(
                "conversion aborted: {}",
                panic_message(payload.as_ref())
            ));
            log::error!("Conversion of {} failed: {}", name, e);
            ConversionResult::failed(&e)
        }
    }
}

fn check_size(len: u64, options: &ConversionOptions) -> Result<()> {
    let limit = options.max_file_size_bytes();
    if len > limit {
        return Err(Error::SourceUnreadable(format!(
            "file is {} bytes, limit is {} MB",
            len, options.max_file_size_mb
        )));
    }
    Ok(())
}

fn read_source(path: &Path, options: &ConversionOptions) -> Result<Vec<u8>> {
    let unreadable = |e: std::io::Error| Error::SourceUnreadable(format!("{}: {}", path.display(), e));
    let metadata = fs::metadata(path).map_err(unreadable)?;
    if !metadata.is_file() {
        return Err(Error::SourceUnreadable(format!(
            "{} is not a file",
            path.display()
        )));
    }
    check_size(metadata.len(), options)?;
    fs::read(path).map_err(unreadable)
}

fn file_stem(filename: &Path) -> String {
    filename
        .file_stem()
        .map(|s| s.to_string_lossy().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

fn run_pipeline(
    data: &[u8],
    filename: &Path,
    on_disk: bool,
    target_dir: &Path,
    options: &ConversionOptions,
) -> Result<Converted> {
    let format = detect_format(filename, data, options)?;
    let stem = file_stem(filename);

    fs::create_dir_all(target_dir)?;
    let assets = AssetPipeline::new(target_dir, &stem, options);
    let mut ctx = ExtractContext::new(options, assets);
    let document = DocumentAdapter::for_format(format).extract(data, filename, &mut ctx)?;
    let (assets, mut warnings) = ctx.into_parts();
    log::debug!(
        "Extracted {} elements and {} assets from {}",
        document.elements.len(),
        assets.stored().len(),
        filename.display()
    );
    if document.is_empty() {
        let warning = ConversionWarning::degraded(
            format == crate::detect::DocumentFormat::Pdf,
            "no content could be extracted",
        );
        log::warn!("{}", warning);
        warnings.push(warning);
    }

    let rendered = to_markdown(&document, options);
    let fix_ctx = FixContext::new(options).with_format(format);
    let fix_ctx = if on_disk {
        fix_ctx.with_source(filename)
    } else {
        fix_ctx.with_source_name(filename)
    };
    let outcome = fix(rendered, &fix_ctx);
    let changes = outcome.descriptions();
    warnings.extend(outcome.warnings);

    let target_path = target_dir.join(format!("{}.md", stem));
    fs::write(&target_path, outcome.document.to_string())?;

    Ok(Converted {
        target_path,
        document: outcome.document,
        warnings,
        changes,
    })
}
