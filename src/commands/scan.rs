use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::classify::{ClassifierConfig, PageClassifier};
use crate::marker::MarkerDecoder;
use crate::pdf::PdfDocument;
use crate::split::Classify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeparatorPage {
    pub page: u32,
    pub label: String,
    pub secondary_id: Option<String>,
}

/// Classify every page of a PDF without writing anything
pub fn scan_markers<D: MarkerDecoder>(
    path: &Path,
    classifier: &PageClassifier<D>,
) -> Result<Vec<SeparatorPage>> {
    let doc = PdfDocument::open(path)?;
    let total = doc.page_count();
    info!("Scanning file {} containing {} pages", path.display(), total);

    let mut separators = Vec::new();
    for page in 1..=total {
        info!("  Analyzing page {}", page);
        let classification = classifier.classify(&doc, page)?;
        if let Some(label) = classification.label {
            separators.push(SeparatorPage {
                page,
                label,
                secondary_id: classification.secondary_id,
            });
        }
    }

    Ok(separators)
}

pub fn run<P: AsRef<Path>>(path: P, config: ClassifierConfig) -> Result<()> {
    let classifier = PageClassifier::qr(config);
    let separators = scan_markers(path.as_ref(), &classifier)?;

    if separators.is_empty() {
        println!("No separator pages found.");
        return Ok(());
    }

    for sep in &separators {
        match &sep.secondary_id {
            Some(id) => println!("p{}: {} (RC {})", sep.page, sep.label, id),
            None => println!("p{}: {}", sep.page, sep.label),
        }
    }

    println!("\n{} separator page(s) found.", separators.len());

    Ok(())
}
