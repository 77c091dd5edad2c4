//! Format adapters.
//!
//! Each adapter turns source bytes into a [`Document`]. Adapters degrade
//! rather than fail: missing styles or broken parts produce plainer output
//! and warnings, and only unreadable input is an error.

mod docx;
mod html;
mod ooxml;
mod pptx;
mod xlsx;

use std::path::Path;

use image::{DynamicImage, ImageFormat};

pub use docx::DocxAdapter;
pub use html::HtmlAdapter;
pub use pptx::PptxAdapter;
pub use xlsx::XlsxAdapter;

use crate::assets::AssetPipeline;
use crate::detect::DocumentFormat;
use crate::error::{ConversionWarning, Result};
use crate::model::{Block, Document};
use crate::options::ConversionOptions;
use crate::pdf::PdfAdapter;

/// Per-job state handed to an adapter.
#[derive(Debug)]
pub struct ExtractContext<'a> {
    /// Job options
    pub options: &'a ConversionOptions,
    assets: AssetPipeline,
    warnings: Vec<ConversionWarning>,
}

impl<'a> ExtractContext<'a> {
    /// Create a context around the job's asset pipeline.
    pub fn new(options: &'a ConversionOptions, assets: AssetPipeline) -> Self {
        Self {
            options,
            assets,
            warnings: Vec::new(),
        }
    }

    /// A context that never writes assets.
    pub fn without_assets(options: &'a ConversionOptions) -> Self {
        Self::new(options, AssetPipeline::disabled())
    }

    /// Record a warning.
    pub fn warn(&mut self, warning: ConversionWarning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// Warnings recorded so far.
    pub fn warnings(&self) -> &[ConversionWarning] {
        &self.warnings
    }

    /// Whether image blocks should be produced.
    pub fn images_enabled(&self) -> bool {
        self.assets.is_enabled()
    }

    /// The asset pipeline.
    pub fn assets(&self) -> &AssetPipeline {
        &self.assets
    }

    /// Store encoded image bytes and return the block referencing them.
    ///
    /// Returns `None` when images are disabled, and a placeholder paragraph
    /// when the write fails.
    pub fn store_image(&mut self, bytes: &[u8], ext_hint: Option<&str>, alt: &str) -> Option<Block> {
        if !self.images_enabled() {
            return None;
        }
        match self.assets.store_encoded(bytes, ext_hint) {
            Ok(asset) => Some(Block::image(asset.path, alt, asset.width, asset.height)),
            Err(e) => self.image_placeholder(alt, &e.to_string()),
        }
    }

    /// Store a decoded image and return the block referencing it.
    pub fn store_decoded(&mut self, img: DynamicImage, alt: &str) -> Option<Block> {
        if !self.images_enabled() {
            return None;
        }
        match self.assets.store_image(img, ImageFormat::Png) {
            Ok(asset) => Some(Block::image(asset.path, alt, asset.width, asset.height)),
            Err(e) => self.image_placeholder(alt, &e.to_string()),
        }
    }

    /// Record an asset failure and return a placeholder paragraph.
    pub fn image_placeholder(&mut self, alt: &str, reason: &str) -> Option<Block> {
        if !self.images_enabled() {
            return None;
        }
        self.warn(ConversionWarning::asset_failure(format!(
            "image '{}': {}",
            alt, reason
        )));
        Some(Block::paragraph(format!("[Image unavailable: {}]", alt)))
    }

    /// Consume the context, returning the pipeline and warnings.
    pub fn into_parts(self) -> (AssetPipeline, Vec<ConversionWarning>) {
        (self.assets, self.warnings)
    }
}

/// The closed set of format adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentAdapter {
    /// PDF
    Pdf(PdfAdapter),
    /// Word
    Docx(DocxAdapter),
    /// PowerPoint
    Pptx(PptxAdapter),
    /// Excel
    Xlsx(XlsxAdapter),
    /// HTML
    Html(HtmlAdapter),
}

impl DocumentAdapter {
    /// Adapter for a format.
    pub fn for_format(format: DocumentFormat) -> Self {
        match format {
            DocumentFormat::Pdf => DocumentAdapter::Pdf(PdfAdapter),
            DocumentFormat::Docx => DocumentAdapter::Docx(DocxAdapter),
            DocumentFormat::Pptx => DocumentAdapter::Pptx(PptxAdapter),
            DocumentFormat::Xlsx => DocumentAdapter::Xlsx(XlsxAdapter),
            DocumentFormat::Html => DocumentAdapter::Html(HtmlAdapter),
        }
    }

    /// Format handled by this adapter.
    pub fn format(&self) -> DocumentFormat {
        match self {
            DocumentAdapter::Pdf(_) => DocumentFormat::Pdf,
            DocumentAdapter::Docx(_) => DocumentFormat::Docx,
            DocumentAdapter::Pptx(_) => DocumentFormat::Pptx,
            DocumentAdapter::Xlsx(_) => DocumentFormat::Xlsx,
            DocumentAdapter::Html(_) => DocumentFormat::Html,
        }
    }

    /// Extract a document.
    pub fn extract(
        &self,
        data: &[u8],
        filename: &Path,
        ctx: &mut ExtractContext<'_>,
    ) -> Result<Document> {
        log::debug!("Extracting {} as {}", filename.display(), self.format());
        match self {
            DocumentAdapter::Pdf(adapter) => adapter.extract(data, filename, ctx),
            DocumentAdapter::Docx(adapter) => adapter.extract(data, filename, ctx),
            DocumentAdapter::Pptx(adapter) => adapter.extract(data, filename, ctx),
            DocumentAdapter::Xlsx(adapter) => adapter.extract(data, filename, ctx),
            DocumentAdapter::Html(adapter) => adapter.extract(data, filename, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WarningKind;

    #[test]
    fn test_for_format_round_trip() {
        for format in [
            DocumentFormat::Pdf,
            DocumentFormat::Docx,
            DocumentFormat::Pptx,
            DocumentFormat::Xlsx,
            DocumentFormat::Html,
        ] {
            assert_eq!(DocumentAdapter::for_format(format).format(), format);
        }
    }

    #[test]
    fn test_disabled_images_omit_blocks() {
        let options = ConversionOptions::default();
        let mut ctx = ExtractContext::without_assets(&options);
        assert_eq!(ctx.store_image(b"\x89PNG", Some("png"), "logo"), None);
        assert_eq!(ctx.image_placeholder("logo", "broken"), None);
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn test_write_failure_yields_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the assets directory should be
        std::fs::write(dir.path().join("assets"), b"").unwrap();

        let options = ConversionOptions::default();
        let pipeline = AssetPipeline::new(dir.path(), "doc", &options);
        let mut ctx = ExtractContext::new(&options, pipeline);

        let block = ctx.store_image(b"raw bytes", Some("bin"), "chart");
        assert_eq!(block, Some(Block::paragraph("[Image unavailable: chart]")));
        assert_eq!(ctx.warnings().len(), 1);
        assert_eq!(ctx.warnings()[0].kind, WarningKind::AssetWriteFailure);
    }
}
