//! Format detection and validation.
//!
//! The extension selects the adapter; magic bytes confirm that the content
//! matches it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::options::ConversionOptions;

/// Source formats handled by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Portable Document Format
    Pdf,
    /// Word document (OOXML)
    Docx,
    /// PowerPoint presentation (OOXML)
    Pptx,
    /// Excel workbook (OOXML)
    Xlsx,
    /// HTML page
    Html,
}

impl DocumentFormat {
    /// Map a file extension (case-insensitive, dot optional) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "pptx" => Some(DocumentFormat::Pptx),
            "xlsx" => Some(DocumentFormat::Xlsx),
            "html" | "htm" | "xhtml" => Some(DocumentFormat::Html),
            _ => None,
        }
    }

    /// Short lowercase name, used as `original_format`.
    pub fn name(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::Html => "html",
        }
    }

    /// Whether the format is an OOXML (ZIP) package.
    pub fn is_ooxml(&self) -> bool {
        matches!(
            self,
            DocumentFormat::Docx | DocumentFormat::Pptx | DocumentFormat::Xlsx
        )
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const VERSION_LEN: usize = 3; // e.g., "1.7"
/// Readers tolerate leading garbage before the PDF header.
const PDF_HEADER_SEARCH: usize = 1024;
/// ZIP local file header.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Resolve the format of a source from its file name and content.
///
/// * Unknown or disallowed extensions are `UnsupportedFormat`.
/// * Content that contradicts the extension is `SourceUnreadable`.
pub fn detect_format(
    filename: &Path,
    data: &[u8],
    options: &ConversionOptions,
) -> Result<DocumentFormat> {
    let ext = filename
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .ok_or_else(|| {
            Error::UnsupportedFormat(format!("{} has no extension", filename.display()))
        })?;

    if !options.allows_extension(&ext) {
        return Err(Error::UnsupportedFormat(format!(
            "extension '{}' is not allowed",
            ext
        )));
    }

    let format = DocumentFormat::from_extension(&ext)
        .ok_or_else(|| Error::UnsupportedFormat(format!("no adapter for '{}'", ext)))?;

    verify_signature(format, data)?;
    Ok(format)
}

/// Check that the content matches the expected format.
pub fn verify_signature(format: DocumentFormat, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Err(Error::SourceUnreadable("file is empty".to_string()));
    }
    match format {
        DocumentFormat::Pdf => {
            if pdf_version(data).is_none() {
                return Err(Error::SourceUnreadable(
                    "missing or invalid %PDF- header".to_string(),
                ));
            }
        }
        DocumentFormat::Docx | DocumentFormat::Pptx | DocumentFormat::Xlsx => {
            if !data.starts_with(ZIP_MAGIC) {
                return Err(Error::SourceUnreadable(format!(
                    "{} is not a ZIP package",
                    format
                )));
            }
        }
        DocumentFormat::Html => {}
    }
    Ok(())
}

/// Guess a format from content alone.
pub fn sniff_format(data: &[u8]) -> Option<DocumentFormat> {
    if pdf_version(data).is_some() {
        return Some(DocumentFormat::Pdf);
    }
    if data.starts_with(ZIP_MAGIC) {
        let window = &data[..data.len().min(4096)];
        let has = |needle: &[u8]| window.windows(needle.len()).any(|w| w == needle);
        if has(b"word/") {
            return Some(DocumentFormat::Docx);
        }
        if has(b"ppt/") {
            return Some(DocumentFormat::Pptx);
        }
        if has(b"xl/") {
            return Some(DocumentFormat::Xlsx);
        }
        return None;
    }
    let head = String::from_utf8_lossy(&data[..data.len().min(512)]).to_ascii_lowercase();
    let head = head.trim_start_matches('\u{feff}').trim_start();
    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        return Some(DocumentFormat::Html);
    }
    None
}

/// Extract the PDF version from the header (e.g. "1.7").
pub fn pdf_version(data: &[u8]) -> Option<String> {
    let window = &data[..data.len().min(PDF_HEADER_SEARCH)];
    let start = window
        .windows(PDF_MAGIC.len())
        .position(|w| w == PDF_MAGIC)?;
    let version_start = start + PDF_MAGIC.len();
    let version_bytes = data.get(version_start..version_start + VERSION_LEN)?;
    let version = String::from_utf8_lossy(version_bytes).to_string();
    is_valid_version(&version).then_some(version)
}

/// Check if a version string is valid.
fn is_valid_version(version: &str) -> bool {
    if version.len() != 3 {
        return false;
    }

    let chars: Vec<char> = version.chars().collect();
    chars[0].is_ascii_digit() && chars[1] == '.' && chars[2].is_ascii_digit()
}
