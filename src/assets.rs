//! Asset pipeline: writes embedded images under `assets/`.
//!
//! One pipeline belongs to one job and owns that job's asset directory, so
//! file names only need to be unique per job.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::error::Result;
use crate::options::ConversionOptions;

/// Directory name for extracted assets, relative to the Markdown file.
pub const ASSETS_DIR: &str = "assets";

/// An asset written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    /// Path relative to the Markdown file, e.g. `assets/report-1.png`
    pub path: String,
    /// Width after resizing, when the image could be decoded
    pub width: Option<u32>,
    /// Height after resizing, when the image could be decoded
    pub height: Option<u32>,
}

/// Writes and resizes images for a single conversion job.
#[derive(Debug)]
pub struct AssetPipeline {
    assets_dir: PathBuf,
    stem: String,
    max_image_size: u32,
    enabled: bool,
    counter: usize,
    stored: Vec<StoredAsset>,
}

impl AssetPipeline {
    /// Create a pipeline writing to `target_dir/assets/`.
    pub fn new(target_dir: &Path, stem: &str, options: &ConversionOptions) -> Self {
        Self {
            assets_dir: target_dir.join(ASSETS_DIR),
            stem: sanitize_stem(stem),
            max_image_size: options.max_image_size,
            enabled: options.extract_images,
            counter: 0,
            stored: Vec::new(),
        }
    }

    /// A pipeline that never writes anything.
    pub fn disabled() -> Self {
        Self {
            assets_dir: PathBuf::new(),
            stem: String::new(),
            max_image_size: 0,
            enabled: false,
            counter: 0,
            stored: Vec::new(),
        }
    }

    /// Whether images should be extracted at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Assets written so far.
    pub fn stored(&self) -> &[StoredAsset] {
        &self.stored
    }

    /// Store encoded image bytes (PNG, JPEG, ...).
    ///
    /// Decodable images are downscaled when needed and re-encoded; anything
    /// else is written unchanged using `ext_hint` as extension.
    pub fn store_encoded(&mut self, bytes: &[u8], ext_hint: Option<&str>) -> Result<StoredAsset> {
        match image::load_from_memory(bytes) {
            Ok(img) => {
                let format = image::guess_format(bytes).unwrap_or(ImageFormat::Png);
                self.store_image(img, format)
            }
            Err(e) => {
                log::debug!("Storing undecodable image as-is: {}", e);
                let ext = ext_hint
                    .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "bin".to_string());
                let (abs, rel) = self.next_path(&ext)?;
                fs::write(&abs, bytes)?;
                Ok(self.record(StoredAsset {
                    path: rel,
                    width: None,
                    height: None,
                }))
            }
        }
    }

    /// Store a decoded image, downscaling it to `max_image_size`.
    pub fn store_image(&mut self, img: DynamicImage, format: ImageFormat) -> Result<StoredAsset> {
        let (width, height) = img.dimensions();
        let (target_w, target_h) = fit_within(width, height, self.max_image_size);
        let img = if (target_w, target_h) != (width, height) {
            log::debug!(
                "Resizing image {}x{} -> {}x{}",
                width,
                height,
                target_w,
                target_h
            );
            img.resize_exact(target_w, target_h, FilterType::Lanczos3)
        } else {
            img
        };

        let (format, ext) = match format {
            ImageFormat::Jpeg => (ImageFormat::Jpeg, "jpg"),
            _ => (ImageFormat::Png, "png"),
        };
        let (abs, rel) = self.next_path(ext)?;
        if format == ImageFormat::Jpeg {
            DynamicImage::ImageRgb8(img.to_rgb8()).save_with_format(&abs, format)?;
        } else {
            img.save_with_format(&abs, format)?;
        }

        Ok(self.record(StoredAsset {
            path: rel,
            width: Some(target_w),
            height: Some(target_h),
        }))
    }

    fn next_path(&mut self, ext: &str) -> Result<(PathBuf, String)> {
        fs::create_dir_all(&self.assets_dir)?;
        self.counter += 1;
        let name = format!("{}-{}.{}", self.stem, self.counter, ext);
        Ok((
            self.assets_dir.join(&name),
            format!("{}/{}", ASSETS_DIR, name),
        ))
    }

    fn record(&mut self, asset: StoredAsset) -> StoredAsset {
        self.stored.push(asset.clone());
        asset
    }
}

/// Scale `(width, height)` so that neither side exceeds `max`, keeping the
/// aspect ratio. Sizes already within bounds are returned unchanged.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if max == 0 || (width <= max && height <= max) {
        return (width, height);
    }
    let scale = max as f64 / width.max(height) as f64;
    let w = ((width as f64 * scale).round() as u32).clamp(1, max);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max);
    (w, h)
}

fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 10, 10]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_fit_within() {
        assert_eq!(fit_within(800, 600, 1024), (800, 600));
        assert_eq!(fit_within(2048, 1024, 1024), (1024, 512));
        assert_eq!(fit_within(1000, 3000, 300), (100, 300));
        assert_eq!(fit_within(5000, 1, 100), (100, 1));
    }

    #[test]
    fn test_store_encoded_resizes() {
        let dir = tempfile::tempdir().unwrap();
        let options = ConversionOptions::default().with_max_image_size(32);
        let mut pipeline = AssetPipeline::new(dir.path(), "report", &options);

        let asset = pipeline.store_encoded(&png_bytes(64, 16), None).unwrap();
        assert_eq!(asset.path, "assets/report-1.png");
        assert_eq!(asset.width, Some(32));
        assert_eq!(asset.height, Some(8));

        let written = image::open(dir.path().join("assets/report-1.png")).unwrap();
        assert_eq!(written.dimensions(), (32, 8));
    }

    #[test]
    fn test_store_undecodable_raw() {
        let dir = tempfile::tempdir().unwrap();
        let options = ConversionOptions::default();
        let mut pipeline = AssetPipeline::new(dir.path(), "deck v2", &options);

        let asset = pipeline.store_encoded(b"not an image", Some("emf")).unwrap();
        assert_eq!(asset.path, "assets/deck_v2-1.emf");
        assert_eq!(asset.width, None);
        assert!(dir.path().join("assets/deck_v2-1.emf").exists());
        assert_eq!(pipeline.stored().len(), 1);
    }

    #[test]
    fn test_sequential_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = AssetPipeline::new(dir.path(), "a", &ConversionOptions::default());
        let first = pipeline.store_encoded(&png_bytes(4, 4), None).unwrap();
        let second = pipeline.store_encoded(&png_bytes(4, 4), None).unwrap();
        assert_eq!(first.path, "assets/a-1.png");
        assert_eq!(second.path, "assets/a-2.png");
    }

    #[test]
    fn test_disabled_pipeline() {
        let pipeline = AssetPipeline::disabled();
        assert!(!pipeline.is_enabled());
        assert!(pipeline.stored().is_empty());
    }
}
