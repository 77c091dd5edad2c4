//! HTML adapter.
//!
//! The main content region is located first so that navigation, headers
//! and sidebars of a typical page do not leak into the output. Within it,
//! block tags map onto blocks and inline emphasis onto text runs.

use std::path::Path;

use scraper::{ElementRef, Html, Selector};

use super::ExtractContext;
use crate::detect::DocumentFormat;
use crate::error::Result;
use crate::model::{Block, Document, TextRun};

/// Selectors tried in order to find the main content.
const MAIN_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=main]",
    "#content",
    "#main",
    ".content",
    ".post-content",
    ".entry-content",
];

/// Elements whose content never reaches the output.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "aside", "noscript", "form", "head", "template",
];

/// Extracts structure from HTML pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HtmlAdapter;

impl HtmlAdapter {
    /// Extract a document from HTML bytes.
    pub fn extract(
        &self,
        data: &[u8],
        filename: &Path,
        ctx: &mut ExtractContext<'_>,
    ) -> Result<Document> {
        let source = String::from_utf8_lossy(data);
        let html = Html::parse_document(&source);

        let mut document = Document::new(filename, DocumentFormat::Html);
        extract_metadata(&html, &mut document);

        let root = main_content(&html);
        log::debug!(
            "HTML {}: content root <{}>",
            filename.display(),
            root.value().name()
        );

        let mut walker = Walker {
            ctx,
            base_dir: filename.parent(),
            blocks: Vec::new(),
            pending: Runs::default(),
            image_count: 0,
        };
        walker.walk_children(root);
        walker.flush();
        for block in walker.blocks {
            document.push(block);
        }
        Ok(document)
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn extract_metadata(html: &Html, document: &mut Document) {
    if let Some(sel) = selector("title") {
        let title = html
            .select(&sel)
            .next()
            .map(|t| collapse_whitespace(&t.text().collect::<String>()).trim().to_string())
            .filter(|t| !t.is_empty());
        document.metadata.set_text("title", title);
    }
    for name in ["author", "description", "keywords"] {
        let Some(sel) = selector(&format!("meta[name='{}']", name)) else {
            continue;
        };
        let content = html
            .select(&sel)
            .next()
            .and_then(|m| m.value().attr("content"))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        document.metadata.set_text(name, content);
    }
    if let Some(lang) = selector("html")
        .and_then(|sel| html.select(&sel).next())
        .and_then(|e| e.value().attr("lang"))
    {
        document.metadata.set("language", lang);
    }
}

/// First match of the prioritized selectors, else the container with the
/// most text, else `<body>`.
fn main_content(html: &Html) -> ElementRef<'_> {
    for css in MAIN_SELECTORS {
        if let Some(found) = selector(css).and_then(|sel| html.select(&sel).next()) {
            return found;
        }
    }

    let largest = selector("div, article, section").and_then(|sel| {
        html.select(&sel)
            .map(|e| (visible_text_len(e), e))
            .filter(|(len, _)| *len > 0)
            .max_by_key(|(len, _)| *len)
            .map(|(_, e)| e)
    });
    if let Some(element) = largest {
        return element;
    }

    selector("body")
        .and_then(|sel| html.select(&sel).next())
        .unwrap_or_else(|| html.root_element())
}

fn visible_text_len(element: ElementRef<'_>) -> usize {
    element
        .children()
        .map(|child| {
            if let Some(text) = child.value().as_text() {
                let text: &str = text;
                text.trim().chars().count()
            } else if let Some(el) = ElementRef::wrap(child) {
                if SKIPPED_TAGS.contains(&el.value().name()) {
                    0
                } else {
                    visible_text_len(el)
                }
            } else {
                0
            }
        })
        .sum()
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Inline runs being collected for one paragraph.
#[derive(Debug, Default)]
struct Runs {
    runs: Vec<TextRun>,
}

impl Runs {
    fn push(&mut self, text: &str, bold: bool, italic: bool) {
        let mut text = collapse_whitespace(text);
        let ends_with_space = self
            .runs
            .last()
            .map_or(true, |r| r.text.ends_with(' '));
        if ends_with_space && text.starts_with(' ') {
            text.remove(0);
        }
        if text.is_empty() {
            return;
        }
        match self.runs.last_mut() {
            Some(last) if last.bold == bold && last.italic == italic => last.text.push_str(&text),
            _ => self.runs.push(TextRun::new(text, bold, italic)),
        }
    }

    /// Finish into trimmed runs, `None` if there is no text.
    fn take(&mut self) -> Option<Vec<TextRun>> {
        let mut runs = std::mem::take(&mut self.runs);
        if let Some(first) = runs.first_mut() {
            first.text = first.text.trim_start().to_string();
        }
        if let Some(last) = runs.last_mut() {
            last.text = last.text.trim_end().to_string();
        }
        runs.retain(|r| !r.text.is_empty());
        if runs.is_empty() {
            None
        } else {
            Some(runs)
        }
    }
}

fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Whether `tag` starts a new block when met inside a container.
fn is_block_tag(tag: &str) -> bool {
    heading_level(tag).is_some()
        || matches!(
            tag,
            "p" | "blockquote"
                | "pre"
                | "ul"
                | "ol"
                | "table"
                | "img"
                | "div"
                | "section"
                | "article"
                | "main"
                | "header"
                | "figure"
                | "hr"
        )
}

struct Walker<'c, 'a, 'p> {
    ctx: &'c mut ExtractContext<'a>,
    base_dir: Option<&'p Path>,
    blocks: Vec<Block>,
    pending: Runs,
    image_count: usize,
}

impl Walker<'_, '_, '_> {
    fn flush(&mut self) {
        if let Some(runs) = self.pending.take() {
            self.blocks.push(Block::paragraph_runs(runs));
        }
    }

    /// Walk a container: block children become blocks, loose inline
    /// content is gathered into paragraphs.
    fn walk_children(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                let text: &str = text;
                self.pending.push(text, false, false);
            } else if let Some(el) = ElementRef::wrap(child) {
                let tag = el.value().name();
                if SKIPPED_TAGS.contains(&tag) {
                    continue;
                }
                if is_block_tag(tag) {
                    self.flush();
                    self.block(el);
                } else {
                    let mut pending = std::mem::take(&mut self.pending);
                    collect_inline(el, false, false, &mut pending);
                    self.pending = pending;
                }
            }
        }
    }

    fn block(&mut self, el: ElementRef<'_>) {
        let tag = el.value().name();
        if let Some(level) = heading_level(tag) {
            let text = collapse_whitespace(&el.text().collect::<String>());
            let text = text.trim();
            if !text.is_empty() {
                self.blocks.push(Block::heading(level, text));
            }
            return;
        }
        match tag {
            "p" | "blockquote" | "pre" => {
                let mut runs = Runs::default();
                collect_inline(el, false, false, &mut runs);
                if let Some(runs) = runs.take() {
                    self.blocks.push(Block::paragraph_runs(runs));
                }
                // Images inside paragraphs still count
                self.images_within(el);
            }
            "ul" | "ol" => {
                if let Some(list) = list_block(el) {
                    self.blocks.push(list);
                }
            }
            "table" => {
                let rows = table_rows(el);
                if !rows.is_empty() {
                    self.blocks.push(Block::table(rows));
                }
            }
            "img" => self.image(el),
            "hr" => {}
            _ => {
                self.walk_children(el);
                self.flush();
            }
        }
    }

    fn images_within(&mut self, el: ElementRef<'_>) {
        let Some(sel) = selector("img") else { return };
        for img in el.select(&sel) {
            self.image(img);
        }
    }

    fn image(&mut self, el: ElementRef<'_>) {
        if !self.ctx.images_enabled() {
            return;
        }
        let Some(src) = el.value().attr("src").map(str::trim).filter(|s| !s.is_empty()) else {
            return;
        };
        self.image_count += 1;
        let alt = el
            .value()
            .attr("alt")
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Image {}", self.image_count));

        if src.starts_with("data:") {
            log::debug!("Skipping inline data image '{}'", alt);
            return;
        }
        let is_remote = src.contains("://") || src.starts_with("//");
        let local = self
            .base_dir
            .filter(|_| !is_remote)
            .map(|dir| dir.join(src))
            .filter(|path| path.is_file());

        let block = match local {
            Some(path) => match std::fs::read(&path) {
                Ok(bytes) => {
                    let ext = path.extension().and_then(|e| e.to_str());
                    self.ctx.store_image(&bytes, ext, &alt)
                }
                Err(e) => self.ctx.image_placeholder(&alt, &e.to_string()),
            },
            // Remote and unresolvable sources stay as references
            None => Some(Block::image(src, alt.as_str(), None, None)),
        };
        if let Some(block) = block {
            self.blocks.push(block);
        }
    }
}

/// Gather inline text under `el` with emphasis from `strong|b|em|i`.
fn collect_inline(el: ElementRef<'_>, bold: bool, italic: bool, runs: &mut Runs) {
    let tag = el.value().name();
    if SKIPPED_TAGS.contains(&tag) {
        return;
    }
    if tag == "br" {
        runs.push(" ", bold, italic);
        return;
    }
    let bold = bold || matches!(tag, "strong" | "b");
    let italic = italic || matches!(tag, "em" | "i");
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            let text: &str = text;
            runs.push(text, bold, italic);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            // Block children of inline content are separated by a space
            if is_block_tag(child_el.value().name()) {
                runs.push(" ", bold, italic);
            }
            collect_inline(child_el, bold, italic, runs);
        }
    }
}

fn list_block(el: ElementRef<'_>) -> Option<Block> {
    let ordered = el.value().name() == "ol";
    let mut items = Vec::new();
    for li in el.children().filter_map(ElementRef::wrap) {
        if li.value().name() != "li" {
            continue;
        }
        let mut runs = Runs::default();
        let mut nested = Vec::new();
        for child in li.children() {
            if let Some(text) = child.value().as_text() {
                let text: &str = text;
                runs.push(text, false, false);
            } else if let Some(child_el) = ElementRef::wrap(child) {
                match child_el.value().name() {
                    "ul" | "ol" => nested.extend(list_block(child_el)),
                    _ => collect_inline(child_el, false, false, &mut runs),
                }
            }
        }
        if let Some(runs) = runs.take() {
            items.push(Block::paragraph_runs(runs));
        }
        items.extend(nested);
    }
    if items.is_empty() {
        None
    } else {
        Some(Block::list(ordered, items))
    }
}

fn table_rows(table: ElementRef<'_>) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.extend(table_row(child)),
            "thead" | "tbody" | "tfoot" => {
                for tr in child.children().filter_map(ElementRef::wrap) {
                    if tr.value().name() == "tr" {
                        rows.extend(table_row(tr));
                    }
                }
            }
            _ => {}
        }
    }
    rows
}

fn table_row(tr: ElementRef<'_>) -> Option<Vec<String>> {
    let mut cells = Vec::new();
    for cell in tr.children().filter_map(ElementRef::wrap) {
        if !matches!(cell.value().name(), "td" | "th") {
            continue;
        }
        let text = collapse_whitespace(&cell.text().collect::<String>());
        cells.push(text.trim().to_string());
        let span: usize = cell
            .value()
            .attr("colspan")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);
        for _ in 1..span.min(64) {
            cells.push(String::new());
        }
    }
    if cells.is_empty() {
        None
    } else {
        Some(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ConversionOptions;

    fn extract(html: &str) -> Document {
        let options = ConversionOptions::default();
        let mut ctx = ExtractContext::without_assets(&options);
        HtmlAdapter
            .extract(html.as_bytes(), Path::new("page.html"), &mut ctx)
            .unwrap()
    }

    fn blocks(doc: &Document) -> Vec<Block> {
        doc.blocks().cloned().collect()
    }

    #[test]
    fn test_main_content_and_skipped_tags() {
        let doc = extract(
            r#"<html><head><title>My Page</title><meta name="author" content="Ann Lee"></head>
<body><nav><a href="/">Home</a></nav>
<main><h1>Welcome</h1><p>First <strong>bold</strong> and <em>soft</em> words.</p>
<script>var x = 1;</script></main>
<footer>Copyright</footer></body></html>"#,
        );
        assert_eq!(
            blocks(&doc),
            vec![
                Block::heading(1, "Welcome"),
                Block::paragraph_runs(vec![
                    TextRun::plain("First "),
                    TextRun::bold("bold"),
                    TextRun::plain(" and "),
                    TextRun::italic("soft"),
                    TextRun::plain(" words."),
                ]),
            ]
        );
        assert_eq!(doc.metadata.get_str("title"), Some("My Page"));
        assert_eq!(doc.metadata.get_str("author"), Some("Ann Lee"));
    }

    #[test]
    fn test_selector_priority() {
        let doc = extract(
            r#"<body><div class="content"><p>class content</p></div><article><p>article content</p></article></body>"#,
        );
        assert_eq!(blocks(&doc), vec![Block::paragraph("article content")]);
    }

    #[test]
    fn test_largest_text_fallback() {
        let doc = extract(
            r#"<body><div id="menu">Menu</div><section><h2>Story</h2><p>A much longer body of text lives here.</p></section></body>"#,
        );
        assert_eq!(
            blocks(&doc),
            vec![
                Block::heading(2, "Story"),
                Block::paragraph("A much longer body of text lives here."),
            ]
        );
    }

    #[test]
    fn test_nested_lists() {
        let doc = extract(
            "<main><ol><li>One<ul><li>One a</li></ul></li><li>Two</li></ol></main>",
        );
        assert_eq!(
            blocks(&doc),
            vec![Block::list(
                true,
                vec![
                    Block::paragraph("One"),
                    Block::list(false, vec![Block::paragraph("One a")]),
                    Block::paragraph("Two"),
                ]
            )]
        );
    }

    #[test]
    fn test_table_with_sections_and_colspan() {
        let doc = extract(
            "<main><table><thead><tr><th>City</th><th>Pop</th><th>Area</th></tr></thead>\
             <tbody><tr><td colspan=\"2\">Unknown</td><td>12</td></tr></tbody></table></main>",
        );
        assert_eq!(
            blocks(&doc),
            vec![Block::table(vec![
                vec!["City".into(), "Pop".into(), "Area".into()],
                vec!["Unknown".into(), String::new(), "12".into()],
            ])]
        );
    }

    #[test]
    fn test_loose_text_and_divs() {
        let doc = extract("<main>Intro text<div><p>Inner</p></div>tail</main>");
        assert_eq!(
            blocks(&doc),
            vec![
                Block::paragraph("Intro text"),
                Block::paragraph("Inner"),
                Block::paragraph("tail"),
            ]
        );
    }

    #[test]
    fn test_remote_image_reference() {
        let options = ConversionOptions::default();
        let dir = tempfile::tempdir().unwrap();
        let pipeline = crate::assets::AssetPipeline::new(dir.path(), "page", &options);
        let mut ctx = ExtractContext::new(&options, pipeline);
        let doc = HtmlAdapter
            .extract(
                br#"<main><img src="https://example.com/a.png" alt="Logo"></main>"#,
                Path::new("page.html"),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(
            blocks(&doc),
            vec![Block::image("https://example.com/a.png", "Logo", None, None)]
        );
    }

    #[test]
    fn test_local_image_copied_to_assets() {
        let src_dir = tempfile::tempdir().unwrap();
        let mut png = Vec::new();
        image::DynamicImage::new_rgb8(3, 3)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        std::fs::write(src_dir.path().join("pic.png"), &png).unwrap();

        let out = tempfile::tempdir().unwrap();
        let options = ConversionOptions::default();
        let pipeline = crate::assets::AssetPipeline::new(out.path(), "page", &options);
        let mut ctx = ExtractContext::new(&options, pipeline);
        let doc = HtmlAdapter
            .extract(
                br#"<main><p>See <img src="pic.png" alt="Diagram"></p></main>"#,
                &src_dir.path().join("page.html"),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(
            blocks(&doc),
            vec![
                Block::paragraph("See"),
                Block::image("assets/page-1.png", "Diagram", Some(3), Some(3)),
            ]
        );
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("a \n\t b"), "a b");
    }
}
