use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::marker::{parse_payloads, Classification, MarkerDecoder, QrDecoder, DEFAULT_SEPARATOR};
use crate::pdf::images::EmbeddedImage;
use crate::pdf::PdfDocument;
use crate::preprocess::{preprocess, Brightness, PreprocessError};
use crate::split::Classify;

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub brightness: Brightness,
    /// Payload prefix that turns a page into a separator
    pub separator: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            brightness: Brightness::DEFAULT,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

/// Finds separator markers on pages by binarizing and decoding their images
pub struct PageClassifier<D = QrDecoder> {
    config: ClassifierConfig,
    decoder: D,
}

impl PageClassifier<QrDecoder> {
    pub fn qr(config: ClassifierConfig) -> Self {
        PageClassifier::new(config, QrDecoder)
    }
}

impl<D: MarkerDecoder> PageClassifier<D> {
    pub fn new(config: ClassifierConfig, decoder: D) -> Self {
        PageClassifier { config, decoder }
    }

    /// Classify a page from its images.
    ///
    /// Each call gets its own scratch directory, removed before returning.
    pub fn classify_images(&self, images: &[EmbeddedImage]) -> Result<Classification> {
        if images.is_empty() {
            return Ok(Classification::default());
        }

        let scratch = tempfile::Builder::new()
            .prefix("qrsplit-")
            .tempdir()
            .context("Failed to create scratch directory")?;
        debug!(
            "    Writing page images to temporary directory {}",
            scratch.path().display()
        );

        let mut payloads = Vec::new();
        for image in images {
            let path = match preprocess(image, self.config.brightness, scratch.path()) {
                Ok(path) => path,
                Err(PreprocessError::UnsupportedFilter(filter)) => {
                    debug!("      Unknown filter type {}", filter);
                    continue;
                }
                Err(e @ PreprocessError::Scratch { .. }) => return Err(e.into()),
                Err(e) => {
                    warn!("Skipping image {}: {}", image.name, e);
                    continue;
                }
            };

            debug!(
                "      Wrote image {}; Checking for separator barcode",
                path.display()
            );
            match self.decoder.decode(&path) {
                Ok(decoded) => payloads.extend(decoded),
                Err(e) => warn!("Failed to decode markers in image {}: {:#}", image.name, e),
            }
        }

        let classification = parse_payloads(&payloads, &self.config.separator);
        if classification.is_separator() {
            debug!("        Found separator barcode");
            debug!(
                "        Label: {}",
                classification.label.as_deref().unwrap_or_default()
            );
            debug!(
                "        Secondary id: {}",
                classification.secondary_id.as_deref().unwrap_or_default()
            );
        }

        Ok(classification)
    }
}

impl<D: MarkerDecoder> Classify<PdfDocument> for PageClassifier<D> {
    fn classify(&self, source: &PdfDocument, page: u32) -> Result<Classification> {
        let images = source.page_images(page)?;
        self.classify_images(&images)
    }
}
