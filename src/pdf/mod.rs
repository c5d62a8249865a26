pub mod document;
pub mod images;

#[cfg(test)]
pub(crate) mod fixtures;

pub use document::PdfDocument;
