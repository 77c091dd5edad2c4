//! Line-level segmentation of a Markdown body into blocks.
//!
//! Segmentation is lossless: blank lines are kept as their own blocks, so
//! `Body::parse(text).to_string() == text` for LF-terminated input.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Kind of a Markdown block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockKind {
    Blank,
    Heading,
    Paragraph,
    List,
    Table,
    Image,
    Comment,
    Code,
    Other,
}

/// A run of lines forming one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MdBlock {
    pub kind: BlockKind,
    pub lines: Vec<String>,
}

impl MdBlock {
    pub fn new(kind: BlockKind, lines: Vec<String>) -> Self {
        Self { kind, lines }
    }

    pub fn blank() -> Self {
        Self::new(BlockKind::Blank, vec![String::new()])
    }

    pub fn line(kind: BlockKind, line: impl Into<String>) -> Self {
        Self::new(kind, vec![line.into()])
    }

    pub fn is_blank(&self) -> bool {
        self.kind == BlockKind::Blank
    }
}

/// A Markdown body as a sequence of blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Body {
    pub blocks: Vec<MdBlock>,
    pub trailing_newline: bool,
}

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})[ \t]+(\S.*?)[ \t]*$").expect("valid heading regex"))
}

fn list_item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([ \t]*)([-*+•◦▪●○■‣]|\d{1,9}[.)])([ \t]+)(\S.*)$")
            .expect("valid list item regex")
    })
}

fn image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*!\[[^\]]*\]\([^)]*\)\s*$").expect("valid image regex"))
}

/// Parse an ATX heading line into `(level, text)`.
pub(crate) fn parse_heading(line: &str) -> Option<(u8, &str)> {
    let caps = heading_regex().captures(line)?;
    let level = caps.get(1)?.as_str().len() as u8;
    Some((level, caps.get(2)?.as_str()))
}

/// Render a heading line.
pub(crate) fn heading_line(level: u8, text: &str) -> String {
    format!("{} {}", "#".repeat(level as usize), text)
}

/// A parsed list item line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListItem<'a> {
    pub indent: &'a str,
    pub marker: &'a str,
    pub content: &'a str,
}

impl ListItem<'_> {
    /// Whether the marker is numeric (`1.` or `1)`).
    pub fn is_ordered(&self) -> bool {
        self.marker.starts_with(|c: char| c.is_ascii_digit())
    }

    /// Indentation width, counting a tab as four spaces.
    pub fn indent_width(&self) -> usize {
        self.indent
            .chars()
            .map(|c| if c == '\t' { 4 } else { 1 })
            .sum()
    }
}

/// Parse a list item line.
pub(crate) fn parse_list_item(line: &str) -> Option<ListItem<'_>> {
    if is_thematic_break(line) {
        return None;
    }
    let caps = list_item_regex().captures(line)?;
    Some(ListItem {
        indent: caps.get(1)?.as_str(),
        marker: caps.get(2)?.as_str(),
        content: caps.get(4)?.as_str(),
    })
}

/// `- - -`, `* * *` and friends.
fn is_thematic_break(line: &str) -> bool {
    let marks: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    marks.len() >= 3
        && matches!(marks[0], '-' | '*' | '_')
        && marks.iter().all(|&c| c == marks[0])
}

fn fence_marker(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

fn is_indented(line: &str) -> bool {
    line.starts_with("  ") || line.starts_with('\t')
}

impl Body {
    /// Segment a Markdown body.
    pub fn parse(text: &str) -> Self {
        let mut blocks: Vec<MdBlock> = Vec::new();
        let mut lines = text.lines().peekable();

        while let Some(line) = lines.next() {
            if let Some(fence) = fence_marker(line) {
                let mut code = vec![line.to_string()];
                for next in lines.by_ref() {
                    code.push(next.to_string());
                    if next.trim_start().starts_with(fence) {
                        break;
                    }
                }
                blocks.push(MdBlock::new(BlockKind::Code, code));
                continue;
            }
            if line.trim().is_empty() {
                blocks.push(MdBlock::blank());
                continue;
            }
            if parse_heading(line).is_some() {
                blocks.push(MdBlock::line(BlockKind::Heading, line));
                continue;
            }
            if line.trim_start().starts_with("<!--") {
                let mut comment = vec![line.to_string()];
                if !line.contains("-->") {
                    for next in lines.by_ref() {
                        comment.push(next.to_string());
                        if next.contains("-->") {
                            break;
                        }
                    }
                }
                blocks.push(MdBlock::new(BlockKind::Comment, comment));
                continue;
            }
            if image_regex().is_match(line) {
                blocks.push(MdBlock::line(BlockKind::Image, line));
                continue;
            }

            let kind = if line.trim_start().starts_with('|') {
                BlockKind::Table
            } else if parse_list_item(line).is_some() {
                BlockKind::List
            } else if line.trim_start().starts_with('>') {
                BlockKind::Other
            } else {
                BlockKind::Paragraph
            };

            let extends_last = match blocks.last() {
                Some(last) if last.kind == kind => true,
                // Continuation lines of a list item
                Some(last) if last.kind == BlockKind::List => {
                    kind == BlockKind::Paragraph || is_indented(line)
                }
                _ => false,
            };
            match blocks.last_mut() {
                Some(last) if extends_last => last.lines.push(line.to_string()),
                _ => blocks.push(MdBlock::line(kind, line)),
            };
        }

        Self {
            blocks,
            trailing_newline: text.ends_with('\n'),
        }
    }

    /// Build a body from blocks, with a trailing newline.
    pub fn from_blocks(blocks: Vec<MdBlock>) -> Self {
        Self {
            blocks,
            trailing_newline: true,
        }
    }

    /// Collapse runs of blank blocks to one and drop leading and trailing
    /// blanks. Returns whether anything was removed.
    pub fn collapse_blanks(&mut self) -> bool {
        let before = self.blocks.len();
        let mut collapsed: Vec<MdBlock> = Vec::with_capacity(before);
        for block in self.blocks.drain(..) {
            let redundant = block.is_blank()
                && collapsed.last().map_or(true, |last| last.is_blank());
            if !redundant {
                collapsed.push(block);
            }
        }
        while collapsed.last().is_some_and(MdBlock::is_blank) {
            collapsed.pop();
        }
        self.blocks = collapsed;
        self.blocks.len() != before
    }

    /// Iterate heading blocks as `(block index, level, text)`.
    pub fn headings(&self) -> impl Iterator<Item = (usize, u8, &str)> {
        self.blocks.iter().enumerate().filter_map(|(i, block)| {
            if block.kind != BlockKind::Heading {
                return None;
            }
            let (level, text) = parse_heading(block.lines.first()?)?;
            Some((i, level, text))
        })
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for line in self.blocks.iter().flat_map(|b| b.lines.iter()) {
            if !first {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
            first = false;
        }
        if self.trailing_newline && !first {
            f.write_str("\n")?;
        }
        Ok(())
    }
}
