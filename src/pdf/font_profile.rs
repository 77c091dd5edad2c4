//! Font statistics for heading detection.
//!
//! The profile is a character histogram over `(font, size)` pairs. The most
//! used pair is body text; pairs that are sufficiently larger (or bold at
//! body size) become heading candidates.

use std::collections::HashMap;

use super::content::{size_key, style_from_font_name, FontSpan, PageContent};
use crate::options::PdfOptions;

/// Body size assumed for documents without text.
const DEFAULT_BODY_SIZE: f32 = 12.0;

/// Absorbs f32 rounding in size comparisons.
const SIZE_SLACK: f32 = 1e-3;

/// A `(font, size)` pair classified as a heading level.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadingCandidate {
    /// Font name
    pub font: String,
    /// Font size (0.1pt precision)
    pub size: f32,
    /// Whether the font is bold
    pub bold: bool,
    /// Heading level 1-4
    pub level: u8,
}

/// Font usage statistics for one document.
#[derive(Debug, Clone)]
pub struct FontProfile {
    histogram: HashMap<(String, i32), usize>,
    body_font: String,
    body_size: f32,
    candidates: Vec<HeadingCandidate>,
    ratios: [f32; 3],
    tolerance: f32,
}

impl FontProfile {
    /// Build a profile from spans.
    pub fn from_spans<'a>(spans: impl IntoIterator<Item = &'a FontSpan>, options: &PdfOptions) -> Self {
        let mut histogram: HashMap<(String, i32), usize> = HashMap::new();
        for span in spans {
            let chars = span.char_count();
            if chars > 0 {
                *histogram
                    .entry((span.font.clone(), span.size_key()))
                    .or_insert(0) += chars;
            }
        }

        // Ties resolve to the smaller size, then the font name
        let body = histogram
            .iter()
            .max_by(|(ka, ca), (kb, cb)| {
                ca.cmp(cb)
                    .then_with(|| kb.1.cmp(&ka.1))
                    .then_with(|| kb.0.cmp(&ka.0))
            })
            .map(|(key, _)| key.clone());

        let (body_font, body_size) = match body {
            Some((font, key)) => (font, key as f32 / 10.0),
            None => (String::new(), DEFAULT_BODY_SIZE),
        };

        let mut profile = Self {
            histogram,
            body_font,
            body_size,
            candidates: Vec::new(),
            ratios: [options.h1_ratio, options.h2_ratio, options.h3_ratio],
            tolerance: options.size_tolerance,
        };
        profile.rank_candidates();

        log::debug!(
            "Font profile: body={} {:.1}pt, {} heading candidates",
            profile.body_font,
            profile.body_size,
            profile.candidates.len()
        );
        profile
    }

    fn rank_candidates(&mut self) {
        let mut candidates: Vec<HeadingCandidate> = self
            .histogram
            .keys()
            .filter(|(font, key)| !(*font == self.body_font && *key == size_key(self.body_size)))
            .filter_map(|(font, key)| {
                let size = *key as f32 / 10.0;
                let (bold, _) = style_from_font_name(font);
                self.classify(size, bold).map(|level| HeadingCandidate {
                    font: font.clone(),
                    size,
                    bold,
                    level,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.level
                .cmp(&b.level)
                .then_with(|| b.size.total_cmp(&a.size))
                .then_with(|| a.font.cmp(&b.font))
        });
        self.candidates = candidates;
    }

    /// Level for a size relative to the body, ignoring the histogram.
    fn classify(&self, size: f32, bold: bool) -> Option<u8> {
        let body = self.body_size;
        let eps = self.tolerance / 2.0;
        if size + eps >= body * self.ratios[0] {
            Some(1)
        } else if size + eps >= body * self.ratios[1] {
            Some(2)
        } else if size + eps >= body * self.ratios[2] {
            Some(3)
        } else if bold && size + eps >= body {
            Some(4)
        } else {
            None
        }
    }

    /// Heading level for a line whose dominant span uses `(font, size)`.
    ///
    /// Pairs seen during profiling must match a candidate within the size
    /// tolerance. Pairs from pages outside the sample are classified by
    /// their size ratio directly.
    pub fn heading_level(&self, font: &str, size: f32, bold: bool) -> Option<u8> {
        if let Some(candidate) = self
            .candidates
            .iter()
            .find(|c| c.font == font && (c.size - size).abs() <= self.tolerance + SIZE_SLACK)
        {
            return Some(candidate.level);
        }
        let seen = self.histogram.contains_key(&(font.to_string(), size_key(size)));
        if seen || self.histogram.is_empty() {
            return None;
        }
        self.classify(size, bold)
    }

    /// Most used font.
    pub fn body_font(&self) -> &str {
        &self.body_font
    }

    /// Most used font size.
    pub fn body_size(&self) -> f32 {
        self.body_size
    }

    /// Heading candidates ordered by level, largest size first.
    pub fn candidates(&self) -> &[HeadingCandidate] {
        &self.candidates
    }

    /// Characters counted for a `(font, size)` pair.
    pub fn char_count(&self, font: &str, size: f32) -> usize {
        self.histogram
            .get(&(font.to_string(), size_key(size)))
            .copied()
            .unwrap_or(0)
    }
}

/// Builds a [`FontProfile`] from a bounded sample of pages.
#[derive(Debug, Clone)]
pub struct FontProfiler<'a> {
    options: &'a PdfOptions,
}

impl<'a> FontProfiler<'a> {
    /// Create a profiler.
    pub fn new(options: &'a PdfOptions) -> Self {
        Self { options }
    }

    /// Profile the sampled pages.
    pub fn profile(&self, pages: &[PageContent]) -> FontProfile {
        let sample = sample_indices(pages.len(), self.options.sample_pages);
        log::debug!("Profiling fonts on {} of {} pages", sample.len(), pages.len());
        let spans = sample.iter().flat_map(|&i| pages[i].spans.iter());
        FontProfile::from_spans(spans, self.options)
    }
}

/// Evenly spaced indices covering `total` items, at most `max` of them.
pub fn sample_indices(total: usize, max: usize) -> Vec<usize> {
    if total == 0 || max == 0 {
        return Vec::new();
    }
    if total <= max {
        return (0..total).collect();
    }
    if max == 1 {
        return vec![0];
    }
    let mut indices: Vec<usize> = (0..max)
        .map(|i| (i as f64 * (total - 1) as f64 / (max - 1) as f64).round() as usize)
        .collect();
    indices.dedup();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, font: &str, size: f32) -> FontSpan {
        FontSpan::new(text, font, size, 72.0, 100.0, 100.0, 1)
    }

    fn body_spans() -> Vec<FontSpan> {
        (0..20)
            .map(|_| span("Body text of the document.", "Times-Roman", 10.0))
            .collect()
    }

    #[test]
    fn test_body_is_most_frequent() {
        let mut spans = body_spans();
        spans.push(span("Title", "Times-Bold", 20.0));
        let profile = FontProfile::from_spans(&spans, &PdfOptions::default());

        assert_eq!(profile.body_font(), "Times-Roman");
        assert!((profile.body_size() - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_characters_outweigh_span_count() {
        let mut spans: Vec<FontSpan> = (0..10).map(|_| span("a", "Small", 8.0)).collect();
        spans.push(span(&"x".repeat(50), "Body", 11.0));
        let profile = FontProfile::from_spans(&spans, &PdfOptions::default());
        assert_eq!(profile.body_font(), "Body");
    }

    #[test]
    fn test_heading_thresholds() {
        let mut spans = body_spans();
        spans.push(span("H1", "Times-Roman", 18.0));
        spans.push(span("H2", "Times-Roman", 15.0));
        spans.push(span("H3", "Times-Roman", 12.0));
        spans.push(span("H4", "Times-Bold", 10.0));
        spans.push(span("Small", "Times-Roman", 11.0));
        let profile = FontProfile::from_spans(&spans, &PdfOptions::default());

        assert_eq!(profile.heading_level("Times-Roman", 18.0, false), Some(1));
        assert_eq!(profile.heading_level("Times-Roman", 15.0, false), Some(2));
        assert_eq!(profile.heading_level("Times-Roman", 12.0, false), Some(3));
        assert_eq!(profile.heading_level("Times-Bold", 10.0, true), Some(4));
        assert_eq!(profile.heading_level("Times-Roman", 11.0, false), None);
        assert_eq!(profile.heading_level("Times-Roman", 10.0, false), None);

        let levels: Vec<u8> = profile.candidates().iter().map(|c| c.level).collect();
        assert_eq!(levels, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_size_tolerance() {
        let mut spans = body_spans();
        spans.push(span("Title", "Times-Roman", 18.0));
        let profile = FontProfile::from_spans(&spans, &PdfOptions::default());
        assert_eq!(profile.heading_level("Times-Roman", 18.04, false), Some(1));
        assert_eq!(profile.heading_level("Times-Roman", 18.1, false), Some(1));
    }

    #[test]
    fn test_unsampled_pair_classified_by_ratio() {
        let profile = FontProfile::from_spans(&body_spans(), &PdfOptions::default());
        assert_eq!(profile.heading_level("Helvetica-Bold", 20.0, true), Some(1));
        assert_eq!(profile.heading_level("Helvetica", 10.5, false), None);
    }

    #[test]
    fn test_custom_ratios() {
        let options = PdfOptions {
            h1_ratio: 2.5,
            ..PdfOptions::default()
        };
        let mut spans = body_spans();
        spans.push(span("Title", "Times-Roman", 20.0));
        let profile = FontProfile::from_spans(&spans, &options);
        assert_eq!(profile.heading_level("Times-Roman", 20.0, false), Some(2));
    }

    #[test]
    fn test_empty_profile() {
        let profile = FontProfile::from_spans(&[], &PdfOptions::default());
        assert_eq!(profile.body_size(), DEFAULT_BODY_SIZE);
        assert_eq!(profile.heading_level("Any", 30.0, false), None);
    }

    #[test]
    fn test_sample_indices() {
        assert_eq!(sample_indices(3, 10), vec![0, 1, 2]);
        assert_eq!(sample_indices(100, 5), vec![0, 25, 50, 74, 99]);
        assert_eq!(sample_indices(5, 1), vec![0]);
        assert!(sample_indices(0, 10).is_empty());
        assert_eq!(sample_indices(20, 10).len(), 10);
    }

    #[test]
    fn test_profiler_samples_pages() {
        let pages: Vec<PageContent> = (1..=30)
            .map(|n| {
                let mut page = PageContent::new(n, 612.0, 792.0);
                page.spans.push(span("Body line", "Body", 10.0));
                page
            })
            .collect();
        let options = PdfOptions {
            sample_pages: 4,
            ..PdfOptions::default()
        };
        let profile = FontProfiler::new(&options).profile(&pages);
        assert_eq!(profile.char_count("Body", 10.0), 4 * 8);
    }
}
