//! PDF adapter.
//!
//! The page content streams are walked into spans, rules and image
//! placements; font statistics, table detection and layout analysis then
//! recover headings, columns, lists and tables.

pub mod content;
pub mod font_profile;
pub mod layout;
pub mod table;

use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

use self::content::{extract_page, media_box, page_xobject, resolve, resolve_dict, PageContent};
use self::font_profile::FontProfiler;
use self::layout::LayoutAnalyzer;
use self::table::{consume_spans, TableCandidate, TableDetector};
use crate::adapter::ExtractContext;
use crate::detect::{pdf_version, DocumentFormat};
use crate::error::{ConversionWarning, Error, Result};
use crate::model::{Document, Element, Metadata, Position};

/// Extracts structure from PDF documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PdfAdapter;

impl PdfAdapter {
    /// Extract a document from PDF bytes.
    pub fn extract(
        &self,
        data: &[u8],
        filename: &Path,
        ctx: &mut ExtractContext<'_>,
    ) -> Result<Document> {
        let doc = LopdfDocument::load_mem(data)?;
        if doc.is_encrypted() {
            return Err(Error::Encrypted);
        }

        let options = ctx.options;
        let mut document = Document::new(filename, DocumentFormat::Pdf);
        extract_metadata(&doc, &mut document.metadata);
        if let Some(version) = pdf_version(data) {
            document.metadata.set("pdf_version", version);
        }

        let pages = doc.get_pages();
        document.metadata.set("page_count", pages.len());
        log::debug!("PDF {}: {} pages", filename.display(), pages.len());

        let mut contents: Vec<PageContent> = Vec::with_capacity(pages.len());
        let mut page_ids: Vec<ObjectId> = Vec::with_capacity(pages.len());
        for (&num, &id) in &pages {
            let page = match extract_page(&doc, num, id) {
                Ok(page) => page,
                Err(e) => {
                    ctx.warn(ConversionWarning::degraded(
                        false,
                        format!("page {} could not be decoded: {}", num, e),
                    ));
                    let [x0, y0, x1, y1] = media_box(&doc, id);
                    PageContent::new(num, x1 - x0, y1 - y0)
                }
            };
            contents.push(page);
            page_ids.push(id);
        }

        let has_text = contents.iter().any(PageContent::has_text);
        let profile = FontProfiler::new(&options.pdf).profile(&contents);
        let detector = options
            .detect_tables
            .then(|| TableDetector::from_options(options));
        let analyzer = LayoutAnalyzer::new(&profile, &options.pdf);

        for (page, page_id) in contents.into_iter().zip(page_ids) {
            let mut placed: Vec<Element> = Vec::new();
            let mut spans = page.spans.clone();

            if let Some(detector) = &detector {
                let found = detector.detect_page(&page);
                for warning in found.warnings {
                    ctx.warn(warning);
                }
                if !found.tables.is_empty() {
                    log::debug!("Page {}: {} tables accepted", page.page, found.tables.len());
                }
                spans = consume_spans(spans, &found.tables);
                placed.extend(found.tables.into_iter().map(TableCandidate::into_element));
            }

            if ctx.images_enabled() {
                placed.extend(extract_images(&doc, page_id, &page, ctx));
            }

            let elements = analyzer.layout_page(page.page, page.width, spans, placed);
            document.extend(elements);
        }

        if !pages.is_empty() && !has_text {
            ctx.warn(ConversionWarning::degraded(
                true,
                format!("{} has no extractable text", filename.display()),
            ));
            document.metadata.set("ocr_required", true);
        }

        Ok(document)
    }
}

/// Read the Info dictionary.
fn extract_metadata(doc: &LopdfDocument, metadata: &mut Metadata) {
    let Some(info) = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|info| resolve_dict(doc, info))
    else {
        return;
    };

    metadata.set_text("title", get_string_from_dict(info, b"Title"));
    metadata.set_text("author", get_string_from_dict(info, b"Author"));
    metadata.set_text("subject", get_string_from_dict(info, b"Subject"));
    metadata.set_text("keywords", get_string_from_dict(info, b"Keywords"));
    metadata.set_text("creator", get_string_from_dict(info, b"Creator"));
    metadata.set_text("producer", get_string_from_dict(info, b"Producer"));

    if let Some(date) = get_string_from_dict(info, b"CreationDate").and_then(|s| parse_pdf_date(&s)) {
        metadata.set("created", date);
    }
    if let Some(date) = get_string_from_dict(info, b"ModDate").and_then(|s| parse_pdf_date(&s)) {
        metadata.set("modified", date);
    }
}

/// Helper to get a string from a PDF dictionary.
fn get_string_from_dict(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => {
            // UTF-16BE with BOM is the PDF standard for Unicode
            if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
                let utf16: Vec<u16> = bytes[2..]
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&utf16).ok()
            } else {
                // UTF-8, else Latin-1
                String::from_utf8(bytes.clone())
                    .ok()
                    .or_else(|| Some(bytes.iter().map(|&b| b as char).collect()))
            }
        }
        Object::Name(bytes) => String::from_utf8(bytes.clone()).ok(),
        _ => None,
    }
}

/// Parse a PDF date string (D:YYYYMMDDHHmmSSOHH'mm').
fn parse_pdf_date(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let s = s.strip_prefix("D:").unwrap_or(s);

    // At minimum we need YYYY
    let year: i32 = s.get(0..4)?.parse().ok()?;
    let month: u32 = s.get(4..6).and_then(|m| m.parse().ok()).unwrap_or(1);
    let day: u32 = s.get(6..8).and_then(|d| d.parse().ok()).unwrap_or(1);
    let hour: u32 = s.get(8..10).and_then(|h| h.parse().ok()).unwrap_or(0);
    let minute: u32 = s.get(10..12).and_then(|m| m.parse().ok()).unwrap_or(0);
    let second: u32 = s.get(12..14).and_then(|s| s.parse().ok()).unwrap_or(0);

    chrono::NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .map(|dt| chrono::DateTime::from_naive_utc_and_offset(dt, chrono::Utc))
}

/// Write the page's image XObjects and return positioned image blocks.
fn extract_images(
    doc: &LopdfDocument,
    page_id: ObjectId,
    page: &PageContent,
    ctx: &mut ExtractContext<'_>,
) -> Vec<Element> {
    let mut elements = Vec::new();
    for (index, placement) in page.images.iter().enumerate() {
        let Some(stream) = page_xobject(doc, page_id, &placement.name) else {
            continue;
        };
        let is_image = stream
            .dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .map(|name| name == b"Image")
            .unwrap_or(false);
        if !is_image {
            continue;
        }

        let alt = format!("Page {} image {}", page.page, index + 1);
        let block = match decode_image(doc, stream) {
            Ok(PdfImage::Encoded(bytes)) => ctx.store_image(&bytes, Some("jpg"), &alt),
            Ok(PdfImage::Pixels(img)) => ctx.store_decoded(img, &alt),
            Err(reason) => ctx.image_placeholder(&alt, &reason),
        };
        if let Some(block) = block {
            elements.push(Element::at(block, Position::new(page.page, placement.bbox)));
        }
    }
    elements
}

enum PdfImage {
    Encoded(Vec<u8>),
    Pixels(DynamicImage),
}

/// Decode an image XObject into something the asset pipeline can store.
fn decode_image(doc: &LopdfDocument, stream: &Stream) -> std::result::Result<PdfImage, String> {
    let dict = &stream.dict;
    let filters: Vec<Vec<u8>> = match dict.get(b"Filter").map(|f| resolve(doc, f)) {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    };

    let raw = match filters.iter().map(Vec::as_slice).collect::<Vec<_>>().as_slice() {
        [b"DCTDecode"] => return Ok(PdfImage::Encoded(stream.content.clone())),
        [b"FlateDecode"] => {
            let mut out = Vec::new();
            ZlibDecoder::new(stream.content.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| format!("FlateDecode failed: {}", e))?;
            out
        }
        [] => stream.content.clone(),
        other => {
            let names: Vec<String> = other
                .iter()
                .map(|n| String::from_utf8_lossy(n).to_string())
                .collect();
            return Err(format!("unsupported filter {}", names.join("+")));
        }
    };

    let int = |key: &[u8]| {
        dict.get(key)
            .ok()
            .and_then(|o| o.as_i64().ok())
            .and_then(|v| u32::try_from(v).ok())
    };
    let (Some(width), Some(height)) = (int(b"Width"), int(b"Height")) else {
        return Err("missing image dimensions".to_string());
    };
    if int(b"BitsPerComponent") != Some(8) {
        return Err("only 8-bit components are supported".to_string());
    }
    let color_space = match dict.get(b"ColorSpace").map(|c| resolve(doc, c)) {
        Ok(Object::Name(name)) => String::from_utf8_lossy(name).to_string(),
        _ => return Err("unsupported color space".to_string()),
    };

    let sample_len = |channels: usize| {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(channels))
            .ok_or_else(|| "image dimensions overflow".to_string())
    };
    let img = match color_space.as_str() {
        "DeviceRGB" => RgbImage::from_raw(width, height, samples(&raw, sample_len(3)?)?.to_vec())
            .map(DynamicImage::ImageRgb8),
        "DeviceGray" => GrayImage::from_raw(width, height, samples(&raw, sample_len(1)?)?.to_vec())
            .map(DynamicImage::ImageLuma8),
        "DeviceCMYK" => {
            let rgb: Vec<u8> = samples(&raw, sample_len(4)?)?
                .chunks_exact(4)
                .flat_map(|p| {
                    let k = 255 - u16::from(p[3]);
                    [0, 1, 2].map(|i| ((255 - u16::from(p[i])) * k / 255) as u8)
                })
                .collect();
            RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
        other => return Err(format!("unsupported color space {}", other)),
    };
    img.map(PdfImage::Pixels)
        .ok_or_else(|| "image buffer size mismatch".to_string())
}

fn samples(raw: &[u8], len: usize) -> std::result::Result<&[u8], String> {
    raw.get(..len)
        .ok_or_else(|| format!("image data too short ({} of {} bytes)", raw.len(), len))
}
