//! Frontmatter enrichment.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};

use super::blocks::Body;
use super::{FixContext, FixPass};
use crate::error::Result;
use crate::render::MarkdownDocument;

/// Fills in `title`, `original_format`, `source_file` and the timestamps,
/// then orders keys by the configured frontmatter order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrontmatterEnrichment;

fn format_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Heading text with Markdown escapes removed.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next.is_ascii_punctuation() {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn first_h1(body: &str) -> Option<String> {
    Body::parse(body)
        .headings()
        .find(|(_, level, _)| *level == 1)
        .map(|(_, _, text)| unescape(text))
        .filter(|t| !t.trim().is_empty())
}

fn derive_title(body: &str, source: Option<&Path>) -> String {
    first_h1(body)
        .or_else(|| {
            source
                .and_then(|p| p.file_stem())
                .map(|s| s.to_string_lossy().into_owned())
                .filter(|s| !s.trim().is_empty())
        })
        .unwrap_or_else(|| "Untitled".to_string())
}

impl FixPass for FrontmatterEnrichment {
    fn name(&self) -> &'static str {
        "frontmatter"
    }

    fn apply(&self, doc: &mut MarkdownDocument, ctx: &FixContext<'_>) -> Result<Vec<String>> {
        let mut changes = Vec::new();
        let source = ctx.source_path;
        let fm = &mut doc.frontmatter;

        if !fm.has_value("title") {
            let title = derive_title(&doc.body, source);
            changes.push(format!("Set title to '{}'", title));
            fm.set("title", title);
        }

        if !fm.has_value("original_format") {
            let format = ctx.format.map(|f| f.name().to_string()).or_else(|| {
                source
                    .and_then(|p| p.extension())
                    .map(|e| e.to_string_lossy().to_lowercase())
            });
            if let Some(format) = format {
                changes.push(format!("Set original_format to '{}'", format));
                fm.set("original_format", format);
            }
        }

        if !fm.has_value("source_file") {
            if let Some(name) = source.and_then(|p| p.file_name()) {
                let name = name.to_string_lossy().into_owned();
                changes.push(format!("Set source_file to '{}'", name));
                fm.set("source_file", name);
            }
        }

        // Filesystem timestamps stand in for missing embedded dates; the
        // author is never synthesised.
        let needs_created = !fm.has_value("created");
        let needs_modified = !fm.has_value("modified");
        if ctx.file_timestamps && (needs_created || needs_modified) {
            if let Some(meta) = source.and_then(|p| fs::metadata(p).ok()) {
                if needs_created {
                    if let Ok(created) = meta.created() {
                        let created = format_time(created);
                        changes.push(format!("Set created to {} from file timestamp", created));
                        fm.set("created", created);
                    }
                }
                if needs_modified {
                    if let Ok(modified) = meta.modified() {
                        let modified = format_time(modified);
                        changes.push(format!("Set modified to {} from file timestamp", modified));
                        fm.set("modified", modified);
                    }
                }
            }
        }

        let before: Vec<String> = fm.keys().map(str::to_string).collect();
        fm.reorder(&ctx.options.frontmatter_order);
        if fm.keys().zip(before.iter()).any(|(a, b)| a != b.as_str()) {
            changes.push("Reordered frontmatter keys".to_string());
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DocumentFormat;
    use crate::model::Frontmatter;
    use crate::options::ConversionOptions;

    #[test]
    fn test_title_from_first_h1() {
        let options = ConversionOptions::default();
        let ctx = FixContext::new(&options).with_format(DocumentFormat::Docx);
        let mut doc = MarkdownDocument::new(Frontmatter::new(), "## Sub\n\n# Main \\*Title\\*\n");
        let changes = FrontmatterEnrichment.apply(&mut doc, &ctx).unwrap();

        assert_eq!(doc.frontmatter.get_str("title"), Some("Main *Title*"));
        assert_eq!(doc.frontmatter.get_str("original_format"), Some("docx"));
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_title_fallbacks() {
        assert_eq!(derive_title("No heading\n", Some(Path::new("dir/q3-report.pdf"))), "q3-report");
        assert_eq!(derive_title("", None), "Untitled");
    }

    #[test]
    fn test_existing_values_kept_and_reordered() {
        let options = ConversionOptions::default();
        let ctx = FixContext::new(&options).with_source(Path::new("missing/report.pdf"));
        let mut fm = Frontmatter::new();
        fm.set("pages", 3i64);
        fm.set("original_format", "pdf");
        fm.set("author", "Jane");
        fm.set("title", "Given");
        let mut doc = MarkdownDocument::new(fm, "# Other\n");
        FrontmatterEnrichment.apply(&mut doc, &ctx).unwrap();

        assert_eq!(doc.frontmatter.get_str("title"), Some("Given"));
        let keys: Vec<&str> = doc.frontmatter.keys().collect();
        assert_eq!(keys, vec!["title", "author", "original_format", "source_file", "pages"]);
    }

    #[test]
    fn test_filesystem_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.html");
        std::fs::write(&path, "<p>hi</p>").unwrap();

        let options = ConversionOptions::default();
        let ctx = FixContext::new(&options).with_source(&path);
        let mut doc = MarkdownDocument::new(Frontmatter::new(), "Text\n");
        FrontmatterEnrichment.apply(&mut doc, &ctx).unwrap();

        assert_eq!(doc.frontmatter.get_str("title"), Some("notes"));
        assert_eq!(doc.frontmatter.get_str("original_format"), Some("html"));
        assert!(doc.frontmatter.has_value("modified"));
        assert!(!doc.frontmatter.has_value("author"));

        let changes = FrontmatterEnrichment.apply(&mut doc, &ctx).unwrap();
        assert!(changes.is_empty());
    }
}
