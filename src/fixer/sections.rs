//! Missing-section synthesis.

use super::blocks::{heading_line, BlockKind, Body, MdBlock};
use super::capitalization::Capitalization;
use super::{FixContext, FixPass};
use crate::error::Result;
use crate::render::MarkdownDocument;

/// Inserts a placeholder section for every required section that is absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingSections;

fn same_title(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn find_section(body: &Body, title: &str) -> Option<(usize, u8)> {
    body.headings()
        .find(|(_, _, text)| same_title(text, title))
        .map(|(index, level, _)| (index, level))
}

/// Block index just past the section opened by the heading at `index`.
fn section_end(body: &Body, index: usize, level: u8) -> usize {
    body.headings()
        .find(|&(i, l, _)| i > index && l <= level)
        .map(|(i, _, _)| i)
        .unwrap_or(body.blocks.len())
}

/// Where to insert `title` and at which heading level.
fn placement(body: &Body, title: &str, order: &[String], default_level: u8) -> (usize, u8) {
    if let Some(k) = order.iter().position(|s| same_title(s, title)) {
        let predecessor = order[..k]
            .iter()
            .rev()
            .find_map(|s| find_section(body, s));
        if let Some((index, level)) = predecessor {
            return (section_end(body, index, level), level);
        }
        let successor = order[k + 1..].iter().find_map(|s| find_section(body, s));
        if let Some((index, level)) = successor {
            return (index, level);
        }
    }
    (body.blocks.len(), default_level)
}

impl FixPass for MissingSections {
    fn name(&self) -> &'static str {
        "sections"
    }

    fn apply(&self, doc: &mut MarkdownDocument, ctx: &FixContext<'_>) -> Result<Vec<String>> {
        let options = ctx.options;
        if !options.create_missing_sections || options.required_sections.is_empty() {
            return Ok(Vec::new());
        }

        let mut body = Body::parse(&doc.body);
        let top = options.top_level_heading;
        let mut changes = Vec::new();

        for title in &options.required_sections {
            let title = title.trim();
            if title.is_empty() || find_section(&body, title).is_some() {
                continue;
            }
            let default_level = if body.headings().next().is_some() {
                (top + 1).min(options.max_heading_level).max(top)
            } else {
                top
            };
            let (index, level) = placement(&body, title, &options.section_order, default_level);
            let title = Capitalization::apply_mode(title, options.auto_capitalize);
            let section = [
                MdBlock::blank(),
                MdBlock::line(BlockKind::Heading, heading_line(level, &title)),
                MdBlock::blank(),
                MdBlock::line(BlockKind::Paragraph, options.section_placeholder.as_str()),
                MdBlock::blank(),
            ];
            body.blocks.splice(index..index, section);
            log::debug!("Inserted missing section '{}' at block {}", title, index);
            changes.push(format!("Added missing section '{}'", title));
        }

        if !changes.is_empty() {
            body.collapse_blanks();
            body.trailing_newline = true;
            doc.body = body.to_string();
        }
        Ok(changes)
    }
}
