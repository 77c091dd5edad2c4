//! Document-level types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Block, Element, Metadata, Position};
use crate::detect::DocumentFormat;

/// A document in intermediate representation: metadata plus ordered blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Path or file name of the source
    pub source_path: PathBuf,

    /// Detected source format
    pub format: DocumentFormat,

    /// Document metadata (title, author, dates, ...)
    pub metadata: Metadata,

    /// Blocks in reading order
    pub elements: Vec<Element>,
}

impl Document {
    /// Create an empty document.
    pub fn new(source_path: impl AsRef<Path>, format: DocumentFormat) -> Self {
        Self {
            source_path: source_path.as_ref().to_path_buf(),
            format,
            metadata: Metadata::new(),
            elements: Vec::new(),
        }
    }

    /// Append a block without position.
    pub fn push(&mut self, block: Block) {
        if !block.is_empty() {
            self.elements.push(Element::new(block));
        }
    }

    /// Append a block with its source position.
    pub fn push_at(&mut self, block: Block, position: Position) {
        if !block.is_empty() {
            self.elements.push(Element::at(block, position));
        }
    }

    /// Append already-built elements.
    pub fn extend(&mut self, elements: impl IntoIterator<Item = Element>) {
        self.elements
            .extend(elements.into_iter().filter(|e| !e.block.is_empty()));
    }

    /// Iterate blocks in order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.elements.iter().map(|e| &e.block)
    }

    /// Whether the document has no blocks.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Source file stem, used for titles and asset names.
    pub fn file_stem(&self) -> Option<String> {
        self.source_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Plain text content of the whole document.
    pub fn plain_text(&self) -> String {
        self.blocks()
            .map(Block::plain_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
