use anyhow::{Context, Result};
use lopdf::{Document, ObjectId};
use std::path::{Path, PathBuf};

use super::images::{page_images, EmbeddedImage};
use crate::split::SourceDocument;

pub struct PdfDocument {
    pub doc: Document,
    pub path: PathBuf,
}

impl PdfDocument {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let doc = Document::load(&path)
            .with_context(|| format!("Failed to open PDF: {}", path.display()))?;
        Ok(PdfDocument { doc, path })
    }

    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Get 1-indexed page object IDs
    pub fn page_ids(&self) -> Vec<(u32, ObjectId)> {
        let mut pages: Vec<_> = self.doc.get_pages().into_iter().collect();
        pages.sort_by_key(|(num, _)| *num);
        pages
    }

    fn page_id(&self, page: u32) -> Result<ObjectId> {
        self.doc.get_pages().get(&page).copied().with_context(|| {
            format!(
                "Page {} is out of range (1-{}) in {}",
                page,
                self.page_count(),
                self.path.display()
            )
        })
    }

    /// Images drawn directly by a 1-indexed page, in resource dictionary order
    pub fn page_images(&self, page: u32) -> Result<Vec<EmbeddedImage>> {
        let page_id = self.page_id(page)?;
        Ok(page_images(&self.doc, page_id))
    }

    /// Extract specific pages to a new document
    pub fn extract_pages(&self, pages: &[u32]) -> Result<Document> {
        let mut new_doc = self.doc.clone();
        let all_pages = self.page_ids();
        let total = all_pages.len() as u32;

        for &page in pages {
            if page == 0 || page > total {
                anyhow::bail!("Page {} is out of range (1-{})", page, total);
            }
        }

        let pages_to_delete: Vec<u32> = all_pages
            .iter()
            .filter(|(num, _)| !pages.contains(num))
            .map(|(num, _)| *num)
            .collect();

        if !pages_to_delete.is_empty() {
            new_doc.delete_pages(&pages_to_delete);
            // drop the streams and images only the deleted pages referenced
            new_doc.prune_objects();
        }

        Ok(new_doc)
    }

    /// Save to a file
    pub fn save<P: AsRef<Path>>(doc: &mut Document, path: P) -> Result<()> {
        doc.save(&path)
            .with_context(|| format!("Failed to save PDF: {}", path.as_ref().display()))?;
        Ok(())
    }
}

impl SourceDocument for PdfDocument {
    fn page_count(&self) -> u32 {
        PdfDocument::page_count(self)
    }

    fn write_pages(&self, pages: &[u32], output: &Path) -> Result<()> {
        let mut new_doc = self.extract_pages(pages)?;
        PdfDocument::save(&mut new_doc, output)
    }

    fn reopen(&mut self) -> Result<()> {
        *self = PdfDocument::open(&self.path)?;
        Ok(())
    }
}
