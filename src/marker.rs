use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Default payload prefix marking a separator page
pub const DEFAULT_SEPARATOR: &str = "RPSEQ:";

const SECONDARY_ID_TAG: &str = "RC:";
const SECONDARY_ID_PREFIX: &str = "RC: ";

/// Marker fields found on one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub label: Option<String>,
    pub secondary_id: Option<String>,
}

impl Classification {
    pub fn is_separator(&self) -> bool {
        self.label.is_some()
    }

    fn absorb(&mut self, payload: &str, separator: &str) {
        if let Some(label) = after_first(payload, separator) {
            self.label = Some(label.to_string());
        }
        if payload.contains(SECONDARY_ID_TAG) {
            if let Some(id) = after_first(payload, SECONDARY_ID_PREFIX) {
                self.secondary_id = Some(id.to_string());
            }
        }
    }
}

/// Fold decoded payloads into a page classification.
///
/// Later payloads override earlier ones field by field, so the outcome for a
/// page carrying several markers depends on the order its images are listed in.
pub fn parse_payloads<I, S>(payloads: I, separator: &str) -> Classification
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut classification = Classification::default();
    for payload in payloads {
        classification.absorb(payload.as_ref(), separator);
    }
    classification
}

/// Substring after the first occurrence of `prefix`; empty remainders count as absent
fn after_first<'a>(payload: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    payload
        .find(prefix)
        .map(|pos| &payload[pos + prefix.len()..])
        .filter(|rest| !rest.is_empty())
}

/// Decodes machine-readable markers from a binarized image on disk
pub trait MarkerDecoder {
    fn decode(&self, image_path: &Path) -> Result<Vec<String>>;
}

/// QR code decoder backed by rqrr
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

impl MarkerDecoder for QrDecoder {
    fn decode(&self, image_path: &Path) -> Result<Vec<String>> {
        let gray = image::open(image_path)
            .with_context(|| format!("Failed to read image: {}", image_path.display()))?
            .to_luma8();

        let mut prepared = rqrr::PreparedImage::prepare(gray);
        let mut payloads = Vec::new();
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_, content)) => payloads.push(content),
                Err(e) => debug!("Ignoring undecodable QR symbol: {:?}", e),
            }
        }

        Ok(payloads)
    }
}
