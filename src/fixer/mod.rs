//! Structure fixer: post-processing passes over rendered Markdown.
//!
//! Passes run in a fixed order and are idempotent. Fenced code blocks are
//! opaque to every pass. A pass that fails or panics is skipped and leaves
//! the document as it found it.

mod blocks;
mod capitalization;
mod frontmatter;
mod headings;
mod lists;
mod paragraphs;
mod sections;

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use capitalization::Capitalization;
pub use frontmatter::FrontmatterEnrichment;
pub use headings::HeadingHierarchy;
pub use lists::ListFormatting;
pub use paragraphs::{split_sentences, ParagraphRestructure};
pub use sections::MissingSections;

use crate::detect::DocumentFormat;
use crate::error::{panic_message, ConversionWarning, Result};
use crate::options::ConversionOptions;
use crate::render::MarkdownDocument;

/// Inputs shared by all passes.
#[derive(Debug, Clone, Copy)]
pub struct FixContext<'a> {
    /// Conversion options
    pub options: &'a ConversionOptions,
    /// Source file, used for title and timestamp fallbacks
    pub source_path: Option<&'a Path>,
    /// Detected source format
    pub format: Option<DocumentFormat>,
    /// Whether `source_path` exists on disk and its timestamps may be read
    pub file_timestamps: bool,
}

impl<'a> FixContext<'a> {
    /// Context with options only.
    pub fn new(options: &'a ConversionOptions) -> Self {
        Self {
            options,
            source_path: None,
            format: None,
            file_timestamps: false,
        }
    }

    /// Set the source file on disk.
    pub fn with_source(mut self, path: &'a Path) -> Self {
        self.source_path = Some(path);
        self.file_timestamps = true;
        self
    }

    /// Set the source file name for in-memory input.
    pub fn with_source_name(mut self, name: &'a Path) -> Self {
        self.source_path = Some(name);
        self.file_timestamps = false;
        self
    }

    /// Set the source format.
    pub fn with_format(mut self, format: DocumentFormat) -> Self {
        self.format = Some(format);
        self
    }
}

/// Changes made by one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassChanges {
    /// Pass name
    pub pass: String,
    /// Human-readable change descriptions
    pub changes: Vec<String>,
}

/// Result of running the fixer.
#[derive(Debug, Clone)]
pub struct FixOutcome {
    /// The fixed document
    pub document: MarkdownDocument,
    /// Changes per pass, in pass order
    pub changes: Vec<PassChanges>,
    /// Warnings for skipped passes
    pub warnings: Vec<ConversionWarning>,
}

impl FixOutcome {
    /// Whether no pass changed anything.
    pub fn is_unchanged(&self) -> bool {
        self.changes.iter().all(|p| p.changes.is_empty())
    }

    /// All changes flattened as `pass: description`.
    pub fn descriptions(&self) -> Vec<String> {
        self.changes
            .iter()
            .flat_map(|p| p.changes.iter().map(move |c| format!("{}: {}", p.pass, c)))
            .collect()
    }
}

/// A single fixer pass.
pub(crate) trait FixPass: Send + Sync {
    /// Pass name used in change lists and warnings.
    fn name(&self) -> &'static str;

    /// Apply the pass in place, returning change descriptions.
    fn apply(&self, doc: &mut MarkdownDocument, ctx: &FixContext<'_>) -> Result<Vec<String>>;
}

/// Runs the fixer passes in order.
pub struct StructureFixer {
    passes: Vec<Box<dyn FixPass>>,
}

impl Default for StructureFixer {
    fn default() -> Self {
        Self::new()
    }
}

impl StructureFixer {
    /// Fixer with the six standard passes.
    pub fn new() -> Self {
        Self {
            passes: vec![
                Box::new(HeadingHierarchy),
                Box::new(Capitalization),
                Box::new(ParagraphRestructure),
                Box::new(ListFormatting),
                Box::new(MissingSections),
                Box::new(FrontmatterEnrichment),
            ],
        }
    }

    #[cfg(test)]
    fn with_passes(passes: Vec<Box<dyn FixPass>>) -> Self {
        Self { passes }
    }

    /// Names of the passes in run order.
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run every pass over `document`.
    pub fn fix(&self, document: MarkdownDocument, ctx: &FixContext<'_>) -> FixOutcome {
        let mut document = document;
        let mut changes = Vec::with_capacity(self.passes.len());
        let mut warnings = Vec::new();

        for pass in &self.passes {
            let mut working = document.clone();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| pass.apply(&mut working, ctx)));
            let failure = match outcome {
                Ok(Ok(pass_changes)) => {
                    document = working;
                    changes.push(PassChanges {
                        pass: pass.name().to_string(),
                        changes: pass_changes,
                    });
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };
            log::warn!("Fix pass '{}' skipped: {}", pass.name(), failure);
            warnings.push(ConversionWarning::fix_pass_failure(format!(
                "pass '{}' skipped: {}",
                pass.name(),
                failure
            )));
            changes.push(PassChanges {
                pass: pass.name().to_string(),
                changes: Vec::new(),
            });
        }

        FixOutcome {
            document,
            changes,
            warnings,
        }
    }
}

/// Run the standard passes.
pub fn fix(document: MarkdownDocument, ctx: &FixContext<'_>) -> FixOutcome {
    StructureFixer::new().fix(document, ctx)
}
