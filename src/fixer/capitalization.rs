//! Heading capitalization.

use super::blocks::{heading_line, Body};
use super::{FixContext, FixPass};
use crate::error::Result;
use crate::options::CapitalizationMode;
use crate::render::MarkdownDocument;

/// Words kept lowercase in title case unless first or last.
const SMALL_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "but", "by", "en", "for", "from", "if", "in", "into", "nor",
    "of", "on", "onto", "or", "over", "per", "so", "the", "to", "up", "via", "vs", "with", "yet",
];

/// Acronyms forced to their canonical spelling.
const ACRONYMS: &[&str] = &[
    "AI", "API", "CEO", "CFO", "CPU", "CSV", "CTO", "DOCX", "EU", "FAQ", "GDPR", "GPU", "HR",
    "HTML", "HTTP", "HTTPS", "ID", "IoT", "IP", "ISO", "JSON", "KPI", "ML", "OCR", "PDF",
    "PPTX", "Q1", "Q2", "Q3", "Q4", "QA", "RAG", "REST", "ROI", "SaaS", "SDK", "SLA", "SQL", "UI",
    "UK", "URL", "USA", "UX", "XLSX", "XML", "YAML",
];

/// Applies the configured capitalization mode to heading text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capitalization;

fn acronym(word: &str) -> Option<&'static str> {
    ACRONYMS
        .iter()
        .copied()
        .find(|a| a.eq_ignore_ascii_case(word))
}

/// The pronoun "I", all-caps words with two or more letters, and words with
/// an uppercase letter after the first.
fn keeps_case(word: &str) -> bool {
    if word == "I" {
        return true;
    }
    let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() >= 2 && letters.iter().all(|c| !c.is_lowercase()) {
        return true;
    }
    letters.iter().skip(1).any(|c| c.is_uppercase()) && letters.iter().any(|c| c.is_lowercase())
}

/// Split a token into leading punctuation, core and trailing punctuation.
fn split_core(token: &str) -> (&str, &str, &str) {
    let start = token
        .find(|c: char| c.is_alphanumeric())
        .unwrap_or(token.len());
    let end = token
        .rfind(|c: char| c.is_alphanumeric())
        .map(|i| i + token[i..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(start);
    (&token[..start], &token[start..end.max(start)], &token[end.max(start)..])
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn recase_word(core: &str, position: usize, last: usize, mode: CapitalizationMode) -> String {
    if core.is_empty() {
        return String::new();
    }
    if let Some(canonical) = acronym(core) {
        return canonical.to_string();
    }
    if keeps_case(core) {
        return core.to_string();
    }
    match mode {
        CapitalizationMode::Title => {
            let lower = core.to_lowercase();
            if position != 0 && position != last && SMALL_WORDS.contains(&lower.as_str()) {
                lower
            } else {
                capitalize_first(core)
            }
        }
        CapitalizationMode::Sentence => {
            if position == 0 {
                capitalize_first(core)
            } else {
                core.to_lowercase()
            }
        }
        CapitalizationMode::None => core.to_string(),
    }
}

impl Capitalization {
    /// Apply a capitalization mode to heading text.
    pub fn apply_mode(text: &str, mode: CapitalizationMode) -> String {
        if mode == CapitalizationMode::None {
            return text.to_string();
        }
        let tokens: Vec<&str> = text.split(' ').collect();
        let words: Vec<usize> = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.chars().any(char::is_alphanumeric))
            .map(|(i, _)| i)
            .collect();
        let last = words.len().saturating_sub(1);

        let mut out: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        for (position, &index) in words.iter().enumerate() {
            let (lead, core, trail) = split_core(tokens[index]);
            out[index] = format!("{}{}{}", lead, recase_word(core, position, last, mode), trail);
        }
        out.join(" ")
    }
}

impl FixPass for Capitalization {
    fn name(&self) -> &'static str {
        "capitalization"
    }

    fn apply(&self, doc: &mut MarkdownDocument, ctx: &FixContext<'_>) -> Result<Vec<String>> {
        let mode = ctx.options.auto_capitalize;
        if mode == CapitalizationMode::None {
            return Ok(Vec::new());
        }

        let mut body = Body::parse(&doc.body);
        let headings: Vec<(usize, u8, String)> = body
            .headings()
            .map(|(i, level, text)| (i, level, text.to_string()))
            .collect();

        let mut changes = Vec::new();
        for (index, level, text) in headings {
            let recased = Self::apply_mode(&text, mode);
            if recased != text {
                body.blocks[index].lines[0] = heading_line(level, &recased);
                changes.push(format!("Heading '{}' -> '{}'", text, recased));
            }
        }
        if !changes.is_empty() {
            doc.body = body.to_string();
        }
        Ok(changes)
    }
}
