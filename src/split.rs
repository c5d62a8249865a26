//! The page-by-page split state machine.
//!
//! Pages accumulate into an output document until a separator page shows up.
//! The separator closes the current document under the name of the marker
//! seen *before* it and primes its own marker for the next document, so
//! naming always runs one separator behind detection.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::marker::Classification;

/// Name of everything before the first separator
pub const DEFAULT_LABEL: &str = "unnamed";

pub const OUTPUT_EXTENSION: &str = "pdf";

/// A readable source of pages that can also write subsets of itself.
///
/// Handles are single-use across writes: after [`write_pages`] the engine
/// calls [`reopen`] before reading any further page.
///
/// [`write_pages`]: SourceDocument::write_pages
/// [`reopen`]: SourceDocument::reopen
pub trait SourceDocument {
    fn page_count(&self) -> u32;

    /// Write the given 1-indexed pages, in order, to `output`
    fn write_pages(&self, pages: &[u32], output: &Path) -> Result<()>;

    fn reopen(&mut self) -> Result<()>;
}

/// Decides whether a page of `S` is a separator
pub trait Classify<S: ?Sized> {
    fn classify(&self, source: &S, page: u32) -> Result<Classification>;
}

/// Marker fields waiting to name the document currently being accumulated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    label: String,
    secondary_id: Option<String>,
}

impl RunState {
    pub fn initial() -> Self {
        RunState {
            label: DEFAULT_LABEL.to_string(),
            secondary_id: None,
        }
    }

    /// The state a separator page hands on, or `None` for ordinary pages
    pub fn from_marker(classification: &Classification) -> Option<Self> {
        let label = classification.label.clone()?;
        Some(RunState {
            label,
            secondary_id: classification.secondary_id.clone(),
        })
    }

    /// `label.pdf` or `label-secondary.pdf`, with path separators neutralized
    pub fn output_name(&self) -> String {
        match &self.secondary_id {
            Some(id) => format!(
                "{}-{}.{}",
                file_safe(&self.label),
                file_safe(id),
                OUTPUT_EXTENSION
            ),
            None => format!("{}.{}", file_safe(&self.label), OUTPUT_EXTENSION),
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        RunState::initial()
    }
}

fn file_safe(part: &str) -> String {
    part.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}

/// Pages collected for the next output file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputDocument {
    pages: Vec<u32>,
}

impl OutputDocument {
    pub fn push(&mut self, page: u32) {
        self.pages.push(page);
    }

    pub fn pages(&self) -> &[u32] {
        &self.pages
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// Keep the separator page at the end of the document it closes
    pub keep_page: bool,
    /// Keep the separator page at the start of the document it opens
    pub keep_page_next: bool,
    pub output_dir: PathBuf,
}

impl Default for SplitOptions {
    fn default() -> Self {
        SplitOptions {
            keep_page: false,
            keep_page_next: false,
            output_dir: PathBuf::from("."),
        }
    }
}

pub struct SplitEngine<'a, C> {
    classifier: &'a C,
    options: &'a SplitOptions,
}

impl<'a, C> SplitEngine<'a, C> {
    pub fn new(classifier: &'a C, options: &'a SplitOptions) -> Self {
        SplitEngine {
            classifier,
            options,
        }
    }

    /// Split `source` into output files, returning how many were written
    pub fn run<S>(&self, source: &mut S) -> Result<usize>
    where
        S: SourceDocument,
        C: Classify<S>,
    {
        let mut pending = RunState::initial();
        let mut current = OutputDocument::default();
        let mut written = 0;

        for page in 1..=source.page_count() {
            info!("  Analyzing page {}", page);

            let classification = self.classifier.classify(source, page)?;
            let next = match RunState::from_marker(&classification) {
                Some(next) => next,
                None => {
                    current.push(page);
                    continue;
                }
            };

            if self.options.keep_page {
                current.push(page);
            }

            if self.flush(source, &pending, &current, "Found separator")? {
                written += 1;
                source.reopen()?;
            }

            current = OutputDocument::default();
            pending = next;

            if self.options.keep_page_next {
                current.push(page);
            }
        }

        if self.flush(source, &pending, &current, "End of input")? {
            written += 1;
        }

        Ok(written)
    }

    fn flush<S: SourceDocument>(
        &self,
        source: &S,
        state: &RunState,
        document: &OutputDocument,
        reason: &str,
    ) -> Result<bool> {
        if document.is_empty() {
            return Ok(false);
        }

        let output = self.options.output_dir.join(state.output_name());
        info!(
            "    {} - writing {} pages to {}",
            reason,
            document.pages().len(),
            output.display()
        );
        source.write_pages(document.pages(), &output)?;
        Ok(true)
    }
}
