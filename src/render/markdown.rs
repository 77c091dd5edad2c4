//! Markdown rendering of the intermediate representation.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::Result;
use crate::model::{split_frontmatter, Block, Document, Frontmatter, TextRun};
use crate::options::ConversionOptions;

/// Markdown text split into frontmatter and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkdownDocument {
    /// Scalar metadata rendered as YAML
    pub frontmatter: Frontmatter,
    /// Markdown body, without frontmatter
    pub body: String,
}

impl MarkdownDocument {
    /// Create a document from parts.
    pub fn new(frontmatter: Frontmatter, body: impl Into<String>) -> Self {
        Self {
            frontmatter,
            body: body.into(),
        }
    }

    /// Parse Markdown text with optional `---` frontmatter.
    pub fn parse(text: &str) -> Result<Self> {
        let (yaml, body) = split_frontmatter(text);
        let frontmatter = match yaml {
            Some(yaml) => Frontmatter::parse(yaml)?,
            None => Frontmatter::new(),
        };
        Ok(Self::new(frontmatter, body.trim_start_matches('\n')))
    }
}

impl fmt::Display for MarkdownDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.frontmatter.is_empty() {
            writeln!(f, "{}", self.frontmatter.render())?;
        }
        write!(f, "{}", self.body)
    }
}

/// Render a document with the list marker from `options`.
pub fn to_markdown(doc: &Document, options: &ConversionOptions) -> MarkdownDocument {
    MarkdownRenderer::from_options(options).render(doc)
}

/// Markdown renderer.
///
/// Rendering is deterministic and has no side effects; positions carried by
/// elements are ignored.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    list_marker: char,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self { list_marker: '-' }
    }
}

impl MarkdownRenderer {
    /// Create a renderer using `list_marker` for unordered items.
    pub fn new(list_marker: char) -> Self {
        Self { list_marker }
    }

    /// Create a renderer from conversion options.
    pub fn from_options(options: &ConversionOptions) -> Self {
        Self::new(options.list_marker.as_char())
    }

    /// Render a document.
    pub fn render(&self, doc: &Document) -> MarkdownDocument {
        let blocks: Vec<String> = doc
            .blocks()
            .filter_map(|block| self.render_block(block))
            .filter(|s| !s.trim().is_empty())
            .collect();

        let mut body = blocks.join("\n\n");
        if !body.is_empty() {
            body.push('\n');
        }
        MarkdownDocument::new(Frontmatter::from_metadata(&doc.metadata), body)
    }

    /// Render one block, `None` when it produces no output.
    pub fn render_block(&self, block: &Block) -> Option<String> {
        match block {
            Block::Heading { level, text } => {
                let text = escape_markdown(text.trim());
                if text.is_empty() {
                    return None;
                }
                Some(format!("{} {}", "#".repeat(usize::from(*level)), text))
            }
            Block::Paragraph { runs } => {
                let text = render_runs(runs);
                if text.is_empty() {
                    None
                } else {
                    Some(escape_line_start(&text))
                }
            }
            Block::List { ordered, items } => {
                let mut lines = Vec::new();
                self.render_list(*ordered, items, 0, &mut lines);
                if lines.is_empty() {
                    None
                } else {
                    Some(lines.join("\n"))
                }
            }
            Block::Table { rows } => render_table(rows),
            Block::Image { path, alt, .. } => Some(format!(
                "![{}]({})",
                escape_markdown(alt),
                path.replace(' ', "%20")
            )),
            Block::Comment { text } => Some(format!("<!-- {} -->", text.replace("--", "- -"))),
        }
    }

    fn render_list(&self, ordered: bool, items: &[Block], depth: usize, lines: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        let mut number = 0;
        for item in items {
            match item {
                Block::List {
                    ordered: nested_ordered,
                    items: nested,
                } => self.render_list(*nested_ordered, nested, depth + 1, lines),
                Block::Paragraph { runs } => {
                    let text = render_runs(runs);
                    if text.is_empty() {
                        continue;
                    }
                    number += 1;
                    lines.push(format!("{}{} {}", indent, self.marker(ordered, number), text));
                }
                other => {
                    let text = escape_markdown(other.plain_text().trim());
                    if text.is_empty() {
                        continue;
                    }
                    number += 1;
                    let text = text.replace('\n', " ");
                    lines.push(format!("{}{} {}", indent, self.marker(ordered, number), text));
                }
            }
        }
    }

    fn marker(&self, ordered: bool, number: usize) -> String {
        if ordered {
            format!("{}.", number)
        } else {
            self.list_marker.to_string()
        }
    }
}

fn asterisk_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*{4,}").expect("valid asterisk regex"))
}

/// Render runs with emphasis, merging adjacent runs of the same style.
fn render_runs(runs: &[TextRun]) -> String {
    let mut merged: Vec<TextRun> = Vec::with_capacity(runs.len());
    for run in runs {
        match merged.last_mut() {
            Some(last) if last.same_style(run) => last.text.push_str(&run.text),
            _ => merged.push(run.clone()),
        }
    }

    let mut out = String::new();
    for run in &merged {
        let text = run.text.replace(['\n', '\r'], " ");
        let core = text.trim();
        if core.is_empty() {
            out.push_str(&text);
            continue;
        }
        // Whitespace stays outside the emphasis markers
        let leading = &text[..text.len() - text.trim_start().len()];
        let trailing = &text[text.trim_end().len()..];
        let marker = match (run.bold, run.italic) {
            (true, true) => "***",
            (true, false) => "**",
            (false, true) => "*",
            (false, false) => "",
        };
        out.push_str(leading);
        out.push_str(marker);
        out.push_str(&escape_markdown(core));
        out.push_str(marker);
        out.push_str(trailing);
    }

    asterisk_run_regex()
        .replace_all(out.trim(), "**")
        .into_owned()
}

fn render_table(rows: &[Vec<String>]) -> Option<String> {
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if width == 0 {
        return None;
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (i, row) in rows.iter().enumerate() {
        let cells: Vec<String> = (0..width)
            .map(|c| row.get(c).map(|cell| escape_cell(cell)).unwrap_or_default())
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
        if i == 0 {
            lines.push(format!("|{}", " --- |".repeat(width)));
        }
    }
    Some(lines.join("\n"))
}

fn escape_cell(cell: &str) -> String {
    cell.replace(['\n', '\r'], " ")
        .trim()
        .replace('|', "\\|")
}

/// Escape characters that could be read as Markdown syntax.
///
/// Only characters special anywhere in a line are escaped; line-start
/// syntax is handled by [`escape_line_start`].
pub(crate) fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '`' | '*' | '_' | '[' | ']' | '|' => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }
    result
}

fn ordered_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)([.)])(\s)").expect("valid ordered marker regex"))
}

/// Keep paragraph text from being read as a heading, quote or list.
fn escape_line_start(text: &str) -> String {
    if text.starts_with('#') || text.starts_with('>') {
        return format!("\\{}", text);
    }
    if text.starts_with("- ") || text.starts_with("+ ") {
        return format!("\\{}", text);
    }
    ordered_marker_regex()
        .replace(text, "$1\\$2$3")
        .into_owned()
}
