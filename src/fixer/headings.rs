//! Heading hierarchy normalization.

use super::blocks::{heading_line, Body};
use super::{FixContext, FixPass};
use crate::error::Result;
use crate::render::MarkdownDocument;

/// Shifts heading levels so the shallowest sits at the configured top level,
/// clamps to the maximum level and removes skipped levels.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadingHierarchy;

impl HeadingHierarchy {
    /// Compute normalized levels for a sequence of heading levels.
    pub fn normalize(levels: &[u8], top: u8, max: u8, allowed_skips: u8) -> Vec<u8> {
        let Some(&min) = levels.iter().min() else {
            return Vec::new();
        };
        let top = top.clamp(1, 6);
        let max = max.clamp(top, 6);
        let shift = i16::from(top) - i16::from(min);

        let mut previous = top - 1;
        levels
            .iter()
            .map(|&level| {
                let shifted = (i16::from(level) + shift).clamp(i16::from(top), i16::from(max)) as u8;
                let ceiling = previous.saturating_add(1).saturating_add(allowed_skips);
                let level = shifted.min(ceiling).min(max);
                previous = level;
                level
            })
            .collect()
    }
}

impl FixPass for HeadingHierarchy {
    fn name(&self) -> &'static str {
        "headings"
    }

    fn apply(&self, doc: &mut MarkdownDocument, ctx: &FixContext<'_>) -> Result<Vec<String>> {
        let mut body = Body::parse(&doc.body);
        let headings: Vec<(usize, u8, String)> = body
            .headings()
            .map(|(i, level, text)| (i, level, text.to_string()))
            .collect();
        let levels: Vec<u8> = headings.iter().map(|(_, level, _)| *level).collect();
        let normalized = Self::normalize(
            &levels,
            ctx.options.top_level_heading,
            ctx.options.max_heading_level,
            ctx.options.allowed_skips,
        );

        let mut changes = Vec::new();
        for ((index, old, text), new) in headings.into_iter().zip(normalized) {
            if old != new {
                body.blocks[index].lines[0] = heading_line(new, &text);
                changes.push(format!("Heading '{}' level {} -> {}", text, old, new));
            }
        }
        if !changes.is_empty() {
            doc.body = body.to_string();
        }
        Ok(changes)
    }
}
