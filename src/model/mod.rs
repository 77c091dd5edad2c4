//! Intermediate representation shared by all adapters.

mod block;
mod document;
mod frontmatter;
mod metadata;

pub use block::{BBox, Block, Element, Position, TextRun};
pub use document::Document;
pub use frontmatter::{split_frontmatter, Frontmatter, Scalar};
pub use metadata::{MetaValue, Metadata};
