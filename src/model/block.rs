//! Intermediate representation blocks.

use serde::{Deserialize, Serialize};

/// Bounding box in page space, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    /// Left edge
    pub x0: f32,
    /// Top edge
    pub y0: f32,
    /// Right edge
    pub x1: f32,
    /// Bottom edge
    pub y1: f32,
}

impl BBox {
    /// Create a bounding box, normalizing the corner order.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Width of the box.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Height of the box.
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Horizontal midpoint.
    pub fn x_mid(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    /// Vertical midpoint.
    pub fn y_mid(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// Distance between the centers of two boxes.
    pub fn center_distance(&self, other: &BBox) -> f32 {
        let dx = self.x_mid() - other.x_mid();
        let dy = self.y_mid() - other.y_mid();
        (dx * dx + dy * dy).sqrt()
    }

    /// Whether the two boxes share any area.
    pub fn overlaps(&self, other: &BBox) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    /// Whether a point lies inside the box, expanded by `tolerance`.
    pub fn contains_point(&self, x: f32, y: f32, tolerance: f32) -> bool {
        x >= self.x0 - tolerance
            && x <= self.x1 + tolerance
            && y >= self.y0 - tolerance
            && y <= self.y1 + tolerance
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Where a block came from on the page. Only used while assembling PDF output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Page number (1-indexed)
    pub page: u32,
    /// Bounding box on the page
    pub bbox: BBox,
    /// Column index for multi-column pages
    pub column: Option<usize>,
}

impl Position {
    /// Create a position without column information.
    pub fn new(page: u32, bbox: BBox) -> Self {
        Self {
            page,
            bbox,
            column: None,
        }
    }

    /// Attach a column index.
    pub fn in_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }
}

/// A run of text with uniform emphasis.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextRun {
    /// Text content
    pub text: String,
    /// Bold emphasis
    pub bold: bool,
    /// Italic emphasis
    pub italic: bool,
}

impl TextRun {
    /// Create a run with explicit emphasis.
    pub fn new(text: impl Into<String>, bold: bool, italic: bool) -> Self {
        Self {
            text: text.into(),
            bold,
            italic,
        }
    }

    /// Create a plain run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, false, false)
    }

    /// Create a bold run.
    pub fn bold(text: impl Into<String>) -> Self {
        Self::new(text, true, false)
    }

    /// Create an italic run.
    pub fn italic(text: impl Into<String>) -> Self {
        Self::new(text, false, true)
    }

    /// Whether two runs carry the same emphasis.
    pub fn same_style(&self, other: &TextRun) -> bool {
        self.bold == other.bold && self.italic == other.italic
    }
}

/// A structural block of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Section heading
    Heading {
        /// Level 1-6
        level: u8,
        /// Heading text
        text: String,
    },

    /// Paragraph of styled runs
    Paragraph {
        /// Text runs
        runs: Vec<TextRun>,
    },

    /// Ordered or unordered list; nested lists appear as `List` items
    List {
        /// Numbered list
        ordered: bool,
        /// Items
        items: Vec<Block>,
    },

    /// Table; the first row is the header
    Table {
        /// Cell text by row
        rows: Vec<Vec<String>>,
    },

    /// Image reference
    Image {
        /// Relative path to the asset
        path: String,
        /// Alternative text
        alt: String,
        /// Width in pixels, if known
        width: Option<u32>,
        /// Height in pixels, if known
        height: Option<u32>,
    },

    /// Markdown comment (column markers and similar annotations)
    Comment {
        /// Comment text
        text: String,
    },
}

impl Block {
    /// Create a heading, clamping the level to 1-6.
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Block::Heading {
            level: level.clamp(1, 6),
            text: text.into(),
        }
    }

    /// Create a single-run plain paragraph.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph {
            runs: vec![TextRun::plain(text)],
        }
    }

    /// Create a paragraph from runs.
    pub fn paragraph_runs(runs: Vec<TextRun>) -> Self {
        Block::Paragraph { runs }
    }

    /// Create a list.
    pub fn list(ordered: bool, items: Vec<Block>) -> Self {
        Block::List { ordered, items }
    }

    /// Create a table.
    pub fn table(rows: Vec<Vec<String>>) -> Self {
        Block::Table { rows }
    }

    /// Create an image reference.
    pub fn image(
        path: impl Into<String>,
        alt: impl Into<String>,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Self {
        Block::Image {
            path: path.into(),
            alt: alt.into(),
            width,
            height,
        }
    }

    /// Create a comment.
    pub fn comment(text: impl Into<String>) -> Self {
        Block::Comment { text: text.into() }
    }

    /// Plain text content, ignoring emphasis.
    pub fn plain_text(&self) -> String {
        match self {
            Block::Heading { text, .. } => text.clone(),
            Block::Paragraph { runs } => runs.iter().map(|r| r.text.as_str()).collect(),
            Block::List { items, .. } => items
                .iter()
                .map(|item| item.plain_text())
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Table { rows } => rows
                .iter()
                .map(|row| row.join("\t"))
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Image { alt, .. } => alt.clone(),
            Block::Comment { .. } => String::new(),
        }
    }

    /// Whether the block carries no content.
    pub fn is_empty(&self) -> bool {
        match self {
            Block::Heading { text, .. } => text.trim().is_empty(),
            Block::Paragraph { runs } => runs.iter().all(|r| r.text.trim().is_empty()),
            Block::List { items, .. } => items.iter().all(Block::is_empty),
            Block::Table { rows } => rows.is_empty() || rows.iter().all(|r| r.is_empty()),
            Block::Image { path, .. } => path.is_empty(),
            Block::Comment { text } => text.is_empty(),
        }
    }
}

/// A block plus its optional source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// The block
    pub block: Block,
    /// Source position, when the adapter knows it
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub position: Option<Position>,
}

impl Element {
    /// Wrap a block without position.
    pub fn new(block: Block) -> Self {
        Self {
            block,
            position: None,
        }
    }

    /// Wrap a block at a position.
    pub fn at(block: Block, position: Position) -> Self {
        Self {
            block,
            position: Some(position),
        }
    }

    /// Top edge used for reading order; unpositioned elements sort last.
    pub fn top(&self) -> f32 {
        self.position.map(|p| p.bbox.y0).unwrap_or(f32::MAX)
    }
}

impl From<Block> for Element {
    fn from(block: Block) -> Self {
        Element::new(block)
    }
}
