//! Paragraph restructuring and blank-line normalization.

use super::blocks::{BlockKind, Body, MdBlock};
use super::{FixContext, FixPass};
use crate::error::Result;
use crate::render::MarkdownDocument;

/// Tokens ending in a period that do not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "a.m.", "al.", "approx.", "apr.", "aug.", "cf.", "co.", "corp.", "dec.", "dept.", "dr.",
    "e.g.", "est.", "etc.", "feb.", "fig.", "figs.", "i.e.", "inc.", "jan.", "jr.", "jul.", "jun.",
    "ltd.", "mar.", "mr.", "mrs.", "ms.", "no.", "nos.", "nov.", "oct.", "p.", "p.m.", "pp.",
    "prof.", "sep.", "sept.", "sr.", "st.", "u.k.", "u.s.", "vol.", "vs.",
];

const CLOSERS: &[char] = &['"', '\'', ')', ']', '”', '’', '*', '_'];

/// Merges wrapped paragraph lines, splits long paragraphs at sentence
/// boundaries and separates blocks with exactly one blank line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParagraphRestructure;

fn is_abbreviation(token: &str) -> bool {
    let word = token
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    if ABBREVIATIONS.contains(&word.as_str()) {
        return true;
    }
    // Initials such as "J."
    let mut chars = word.chars();
    matches!((chars.next(), chars.next(), chars.next()), (Some(c), Some('.'), None) if c.is_alphabetic())
}

/// A bare numeral such as "2." opening a sentence.
fn is_enumerator(token: &str) -> bool {
    token
        .strip_suffix('.')
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

fn ends_sentence(token: &str, next: &str) -> bool {
    let stripped = token.trim_end_matches(CLOSERS);
    if stripped.ends_with(['。', '！', '？']) {
        return true;
    }
    if !stripped.ends_with(['.', '!', '?']) {
        return false;
    }
    if stripped.ends_with('.') && is_abbreviation(stripped) {
        return false;
    }
    next.chars()
        .next()
        .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit() || "\"'“‘([*_".contains(c))
}

/// Split text into sentences on whitespace boundaries.
pub fn split_sentences(text: &str) -> Vec<String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut sentences = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        current.push(token);
        let enumerator = current.len() == 1 && is_enumerator(token);
        let boundary = !enumerator
            && tokens
                .get(i + 1)
                .is_some_and(|next| ends_sentence(token, next));
        if boundary {
            sentences.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        sentences.push(current.join(" "));
    }
    sentences
}

/// Pack sentences greedily into chunks of at most `max_len` characters.
/// A single sentence longer than `max_len` forms its own chunk.
fn pack(sentences: Vec<String>, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for sentence in sentences {
        if current.is_empty() {
            current = sentence;
        } else if current.chars().count() + 1 + sentence.chars().count() <= max_len {
            current.push(' ');
            current.push_str(&sentence);
        } else {
            chunks.push(std::mem::replace(&mut current, sentence));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

impl ParagraphRestructure {
    /// Restructure one paragraph into one or more paragraphs of lines.
    fn restructure(lines: &[String], ctx: &FixContext<'_>) -> Vec<Vec<String>> {
        let merged = lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if ctx.options.sentence_per_line {
            return vec![split_sentences(&merged)];
        }
        let max_len = ctx.options.max_paragraph_length;
        if max_len > 0 && merged.chars().count() > max_len {
            return pack(split_sentences(&merged), max_len)
                .into_iter()
                .map(|chunk| vec![chunk])
                .collect();
        }
        vec![vec![merged]]
    }
}

impl FixPass for ParagraphRestructure {
    fn name(&self) -> &'static str {
        "paragraphs"
    }

    fn apply(&self, doc: &mut MarkdownDocument, ctx: &FixContext<'_>) -> Result<Vec<String>> {
        let body = Body::parse(&doc.body);
        let mut changes = Vec::new();
        let mut blocks: Vec<MdBlock> = Vec::new();

        for block in body.blocks {
            match block.kind {
                BlockKind::Blank => continue,
                BlockKind::Paragraph => {
                    let paragraphs = Self::restructure(&block.lines, ctx);
                    if paragraphs.len() > 1 {
                        changes.push(format!(
                            "Split paragraph of {} characters into {} paragraphs",
                            block.lines.iter().map(|l| l.chars().count()).sum::<usize>(),
                            paragraphs.len()
                        ));
                    } else if paragraphs[0] != block.lines {
                        changes.push(format!(
                            "Reflowed paragraph of {} lines into {} lines",
                            block.lines.len(),
                            paragraphs[0].len()
                        ));
                    }
                    for lines in paragraphs {
                        push_separated(&mut blocks, MdBlock::new(BlockKind::Paragraph, lines));
                    }
                }
                _ => push_separated(&mut blocks, block),
            }
        }

        let rebuilt = Body::from_blocks(blocks).to_string();
        if rebuilt != doc.body {
            if changes.is_empty() {
                changes.push("Normalized blank lines between blocks".to_string());
            }
            doc.body = rebuilt;
        }
        Ok(changes)
    }
}

fn push_separated(blocks: &mut Vec<MdBlock>, block: MdBlock) {
    if !blocks.is_empty() {
        blocks.push(MdBlock::blank());
    }
    blocks.push(block);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ConversionOptions;

    fn run(body: &str, options: &ConversionOptions) -> (String, Vec<String>) {
        let ctx = FixContext::new(options);
        let mut doc = MarkdownDocument::new(Default::default(), body);
        let changes = ParagraphRestructure.apply(&mut doc, &ctx).unwrap();
        (doc.body, changes)
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("First one. Second one! Third? yes"),
            vec!["First one.", "Second one!", "Third? yes"]
        );
    }

    #[test]
    fn test_abbreviations_do_not_split() {
        assert_eq!(
            split_sentences("Ask Dr. Smith about e.g. the plan. Then leave."),
            vec!["Ask Dr. Smith about e.g. the plan.", "Then leave."]
        );
        assert_eq!(split_sentences("Written by J. R. Tolkien."), vec!["Written by J. R. Tolkien."]);
        assert_eq!(
            split_sentences("Sales rose this year. 2. Costs fell."),
            vec!["Sales rose this year.", "2. Costs fell."]
        );
        assert_eq!(
            split_sentences("Revenue grew in 2023. Costs fell."),
            vec!["Revenue grew in 2023.", "Costs fell."]
        );
    }

    #[test]
    fn test_merge_wrapped_lines() {
        let options = ConversionOptions::default();
        let (body, changes) = run("# Title\nThe quick brown\nfox jumps.\n\n\n\nNext.\n", &options);
        assert_eq!(body, "# Title\n\nThe quick brown fox jumps.\n\nNext.\n");
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn test_sentence_per_line() {
        let options = ConversionOptions::default().with_sentence_per_line(true);
        let (body, _) = run("One sentence here. Another\none follows.\n", &options);
        assert_eq!(body, "One sentence here.\nAnother one follows.\n");

        let (again, changes) = run(&body, &options);
        assert_eq!(again, body);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_long_paragraph_split() {
        let mut options = ConversionOptions::default();
        options.max_paragraph_length = 40;
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu.\n";
        let (body, changes) = run(text, &options);
        assert_eq!(
            body,
            "Alpha beta gamma delta.\n\nEpsilon zeta eta theta.\n\nIota kappa lambda mu.\n"
        );
        assert_eq!(changes.len(), 1);

        let (_, changes) = run(&body, &options);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_blocks_separated_by_one_blank_line() {
        let options = ConversionOptions::default();
        let (body, changes) = run("Intro\n- a\n- b\n| x |\n| --- |\n![i](p.png)\n", &options);
        assert_eq!(body, "Intro\n\n- a\n- b\n\n| x |\n| --- |\n\n![i](p.png)\n");
        assert_eq!(changes, vec!["Normalized blank lines between blocks".to_string()]);
    }

    #[test]
    fn test_code_untouched() {
        let options = ConversionOptions::default();
        let text = "```\nline one\nline two\n\n\n```\n";
        let (body, changes) = run(text, &options);
        assert_eq!(body, text);
        assert!(changes.is_empty());
    }
}
