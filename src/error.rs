//! Error and warning types for undoc.
//!
//! Fatal problems are reported as [`Error`] and abort a single conversion
//! job. Everything recoverable is recorded as a [`ConversionWarning`] on an
//! otherwise successful result.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for undoc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while converting a document.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The source is missing, truncated or corrupt.
    #[error("Source unreadable: {0}")]
    SourceUnreadable(String),

    /// The source extension or content is not a supported format.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The document is encrypted and cannot be read.
    #[error("Document is encrypted")]
    Encrypted,

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// Error reading an OOXML package.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Malformed XML inside an OOXML package.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Error reading a spreadsheet.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    /// Error decoding or encoding an image.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Error parsing conversion options.
    #[error("Options parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error parsing YAML frontmatter.
    #[error("Frontmatter error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Conversion options failed validation.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// A structure fixer pass could not complete.
    #[error("Fix pass '{pass}' failed: {message}")]
    FixPass {
        /// Name of the failing pass
        pass: &'static str,
        /// Failure description
        message: String,
    },

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Classify this error into one of the two fatal kinds a job can report.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            _ => ErrorKind::SourceUnreadable,
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

/// Fatal error kinds that set `success = false` on a conversion result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// File missing, corrupt, too large or otherwise unreadable
    SourceUnreadable,
    /// Extension or content not handled by any adapter
    UnsupportedFormat,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::SourceUnreadable => write!(f, "SourceUnreadable"),
            ErrorKind::UnsupportedFormat => write!(f, "UnsupportedFormat"),
        }
    }
}

/// Non-fatal warning kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    /// Extraction produced less than expected (e.g. a scanned PDF)
    ExtractionDegraded {
        /// Whether the source likely needs OCR
        ocr_required: bool,
    },
    /// A table region was found but rejected for low confidence
    TableDetectionLowConfidence,
    /// An embedded asset could not be written; a placeholder was used
    AssetWriteFailure,
    /// A structure fixer pass failed and was skipped
    StructureFixPassFailure,
}

/// A warning recorded during a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionWarning {
    /// Warning category
    #[serde(flatten)]
    pub kind: WarningKind,
    /// Human-readable description
    pub message: String,
}

impl ConversionWarning {
    /// Create a new warning.
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Extraction degraded, optionally hinting that OCR is required.
    pub fn degraded(ocr_required: bool, message: impl Into<String>) -> Self {
        Self::new(WarningKind::ExtractionDegraded { ocr_required }, message)
    }

    /// A table candidate fell below the confidence threshold.
    pub fn low_confidence(message: impl Into<String>) -> Self {
        Self::new(WarningKind::TableDetectionLowConfidence, message)
    }

    /// An asset failed to write.
    pub fn asset_failure(message: impl Into<String>) -> Self {
        Self::new(WarningKind::AssetWriteFailure, message)
    }

    /// A fixer pass failed.
    pub fn fix_pass_failure(message: impl Into<String>) -> Self {
        Self::new(WarningKind::StructureFixPassFailure, message)
    }
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match &self.kind {
            WarningKind::ExtractionDegraded { ocr_required: true } => {
                "ExtractionDegraded (ocr_required)"
            }
            WarningKind::ExtractionDegraded { .. } => "ExtractionDegraded",
            WarningKind::TableDetectionLowConfidence => "TableDetectionLowConfidence",
            WarningKind::AssetWriteFailure => "AssetWriteFailure",
            WarningKind::StructureFixPassFailure => "StructureFixPassFailure",
        };
        write!(f, "{}: {}", label, self.message)
    }
}

/// Describe a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
