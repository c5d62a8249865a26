use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::classify::PageClassifier;
use crate::cli::SplitArgs;
use crate::marker::MarkerDecoder;
use crate::pdf::PdfDocument;
use crate::split::{SplitEngine, SplitOptions};

const RESERVED_PREFIX: &str = "split";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub inputs: usize,
    pub outputs: usize,
    pub failed: usize,
}

/// Expand a filename or glob into the files it names
pub fn resolve_inputs(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries =
        glob::glob(pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable path: {}", e),
        }
    }

    if files.is_empty() {
        anyhow::bail!(
            "No file found matching '{}', check the documentation for more info",
            pattern
        );
    }

    Ok(files)
}

/// Split a single PDF, returning the number of files written
pub fn split_file<D: MarkerDecoder>(
    path: &Path,
    classifier: &PageClassifier<D>,
    options: &SplitOptions,
) -> Result<usize> {
    let mut doc = PdfDocument::open(path)?;
    info!(
        "Processing file {} containing {} pages",
        path.display(),
        doc.page_count()
    );

    SplitEngine::new(classifier, options).run(&mut doc)
}

/// Split every file matched by the arguments' pattern.
///
/// A file that fails is reported and counted; the rest of the batch still runs.
pub fn run(args: &SplitArgs) -> Result<BatchSummary> {
    let pattern = args
        .pattern
        .as_deref()
        .context("An input file or glob is required")?;
    let inputs = resolve_inputs(pattern)?;

    if args.prefix != RESERVED_PREFIX {
        warn!(
            "--prefix {} has no effect; output files are named after their separator label",
            args.prefix
        );
    }

    std::fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "Failed to create directory: {}",
            args.output_dir.display()
        )
    })?;

    let classifier = PageClassifier::qr(args.marker.classifier_config());
    let options = SplitOptions {
        keep_page: args.keep_page,
        keep_page_next: args.keep_page_next,
        output_dir: args.output_dir.clone(),
    };

    let mut summary = BatchSummary::default();
    for input in &inputs {
        match split_file(input, &classifier, &options) {
            Ok(written) => {
                summary.inputs += 1;
                summary.outputs += written;
            }
            Err(e) => {
                error!("Failed to split {}: {:#}", input.display(), e);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
