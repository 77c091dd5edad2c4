//! Rendering of the document model to Markdown text.

mod markdown;
mod stats;

pub use markdown::{to_markdown, MarkdownDocument, MarkdownRenderer};
pub use stats::ExtractionStats;
