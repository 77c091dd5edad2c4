//! List formatting.

use std::collections::BTreeSet;

use super::blocks::{parse_list_item, BlockKind, Body, MdBlock};
use super::{FixContext, FixPass};
use crate::error::Result;
use crate::render::MarkdownDocument;

/// Bullet markers rewritten to the configured marker.
const BULLET_MARKERS: &[&str] = &["-", "*", "+", "•", "◦", "▪", "●", "○", "■", "‣"];

/// Indentation width per nesting level.
const INDENT_STEP: usize = 2;

/// Normalizes bullet markers and indentation, and keeps lists bounded by
/// blank lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFormatting;

/// Rewrite the items of one list block. Returns the number of lines changed.
fn format_list(block: &mut MdBlock, marker: char) -> usize {
    let indents: BTreeSet<usize> = block
        .lines
        .iter()
        .filter_map(|line| parse_list_item(line))
        .map(|item| item.indent_width())
        .collect();
    let indents: Vec<usize> = indents.into_iter().collect();
    let base = indents.first().copied().unwrap_or(0);
    let reindent = indents
        .windows(2)
        .map(|w| w[1] - w[0])
        .min()
        .is_some_and(|step| step < INDENT_STEP);

    let mut changed = 0;
    for line in block.lines.iter_mut() {
        let Some(item) = parse_list_item(line.as_str()) else {
            continue;
        };
        let indent = if reindent {
            let level = indents
                .iter()
                .position(|&w| w == item.indent_width())
                .unwrap_or(0);
            " ".repeat(base + level * INDENT_STEP)
        } else {
            item.indent.to_string()
        };
        let bullet = if !item.is_ordered() && BULLET_MARKERS.contains(&item.marker) {
            marker.to_string()
        } else {
            item.marker.to_string()
        };
        let rewritten = format!("{}{} {}", indent, bullet, item.content);
        if rewritten != *line {
            *line = rewritten;
            changed += 1;
        }
    }
    changed
}

impl FixPass for ListFormatting {
    fn name(&self) -> &'static str {
        "lists"
    }

    fn apply(&self, doc: &mut MarkdownDocument, ctx: &FixContext<'_>) -> Result<Vec<String>> {
        let body = Body::parse(&doc.body);
        let marker = ctx.options.list_marker.as_char();
        let mut changes = Vec::new();
        let mut blocks: Vec<MdBlock> = Vec::with_capacity(body.blocks.len());
        let mut inserted = 0;

        for mut block in body.blocks {
            let previous = blocks.last().map(|b| b.kind);
            let is_list = block.kind == BlockKind::List;
            if is_list {
                let changed = format_list(&mut block, marker);
                if changed > 0 {
                    changes.push(format!("Reformatted {} list items", changed));
                }
            }
            let needs_gap = match previous {
                Some(BlockKind::Blank) | None => false,
                Some(BlockKind::List) => !block.is_blank(),
                Some(_) => is_list,
            };
            if needs_gap {
                blocks.push(MdBlock::blank());
                inserted += 1;
            }
            blocks.push(block);
        }
        if inserted > 0 {
            changes.push(format!("Inserted {} blank lines around lists", inserted));
        }

        if !changes.is_empty() {
            doc.body = Body {
                blocks,
                trailing_newline: body.trailing_newline,
            }
            .to_string();
        }
        Ok(changes)
    }
}
