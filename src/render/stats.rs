//! Statistics over rendered Markdown.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Counts of structural elements in a Markdown body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Number of headings
    pub heading_count: u32,

    /// Number of paragraphs
    pub paragraph_count: u32,

    /// Number of lists (a nested list counts with its parent)
    pub list_count: u32,

    /// Number of list items, nested ones included
    pub list_item_count: u32,

    /// Number of tables
    pub table_count: u32,

    /// Number of images
    pub image_count: u32,

    /// Approximate word count (whitespace-separated tokens with a letter or digit)
    pub word_count: u32,

    /// Character count (excluding whitespace)
    pub char_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Heading,
    ListItem,
    Table,
    Image,
    Comment,
    Fence,
    Text,
}

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#{1,6}\s").expect("valid heading regex"))
}

fn list_item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([-*+]|\d+[.)])\s+\S").expect("valid list item regex"))
}

fn classify(line: &str) -> LineKind {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        LineKind::Blank
    } else if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
        LineKind::Fence
    } else if heading_regex().is_match(line) {
        LineKind::Heading
    } else if trimmed.starts_with('|') {
        LineKind::Table
    } else if trimmed.starts_with("![") {
        LineKind::Image
    } else if trimmed.starts_with("<!--") {
        LineKind::Comment
    } else if list_item_regex().is_match(line) {
        LineKind::ListItem
    } else {
        LineKind::Text
    }
}

impl ExtractionStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the elements of a Markdown body (frontmatter excluded).
    pub fn from_markdown(body: &str) -> Self {
        let mut stats = Self::new();
        let mut previous = LineKind::Blank;
        let mut in_fence = false;

        for line in body.lines() {
            let kind = classify(line);
            if in_fence {
                if kind == LineKind::Fence {
                    in_fence = false;
                }
                stats.count_text(line);
                previous = LineKind::Text;
                continue;
            }
            match kind {
                LineKind::Fence => {
                    in_fence = true;
                    if previous != LineKind::Text {
                        stats.paragraph_count += 1;
                    }
                }
                LineKind::Heading => stats.heading_count += 1,
                LineKind::Image => stats.image_count += 1,
                LineKind::Table if previous != LineKind::Table => stats.table_count += 1,
                LineKind::ListItem => {
                    stats.list_item_count += 1;
                    if previous != LineKind::ListItem {
                        stats.list_count += 1;
                    }
                }
                LineKind::Text if previous != LineKind::Text && previous != LineKind::ListItem => {
                    stats.paragraph_count += 1;
                }
                _ => {}
            }
            if !matches!(kind, LineKind::Comment) && !is_table_separator(line) {
                stats.count_text(line);
            }
            // Continuation lines of an item stay part of the list
            previous = if kind == LineKind::Text && previous == LineKind::ListItem {
                LineKind::ListItem
            } else {
                kind
            };
        }
        stats
    }

    /// Add word and character counts from text.
    pub fn count_text(&mut self, text: &str) {
        self.word_count += text
            .split_whitespace()
            .filter(|w| w.chars().any(char::is_alphanumeric))
            .count() as u32;
        self.char_count += text.chars().filter(|c| !c.is_whitespace()).count() as u32;
    }

    /// Merge another stats instance into this one.
    pub fn merge(&mut self, other: &ExtractionStats) {
        self.heading_count += other.heading_count;
        self.paragraph_count += other.paragraph_count;
        self.list_count += other.list_count;
        self.list_item_count += other.list_item_count;
        self.table_count += other.table_count;
        self.image_count += other.image_count;
        self.word_count += other.word_count;
        self.char_count += other.char_count;
    }
}

fn is_table_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|')
        && trimmed
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' '))
}
