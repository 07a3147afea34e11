//! In-memory document backend
//!
//! Pages are plain values with a page box and a synthetic render capability,
//! so every engine operation can run without a PDF library. Structural
//! operations behave exactly like the PDFium backend's: inserts copy, removals
//! shift later pages down, out-of-range positions are errors.

use super::document::{
    Document, DocumentFactory, EncodedImage, ImageFormat, Page, PageSize, PixelSize,
};
use crate::error::{Error, Result};
use image::{DynamicImage, Rgb, RgbImage};
use serde::Serialize;

/// What a memory page draws when rendered
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageContent {
    /// Vector content, rendered as a solid fill
    Vector { fill: [u8; 3] },
    /// A page built from an encoded image
    Raster {
        pixels: PixelSize,
        format: ImageFormat,
        quality: f32,
        encoded_len: usize,
    },
    /// Content the renderer cannot draw
    Unrenderable,
}

/// One page of a [`MemoryDocument`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryPage {
    label: String,
    size: PageSize,
    content: PageContent,
}

impl MemoryPage {
    pub fn new(label: impl Into<String>, size: PageSize) -> Self {
        Self {
            label: label.into(),
            size,
            content: PageContent::Vector {
                fill: [0xff, 0xff, 0xff],
            },
        }
    }

    pub fn with_fill(mut self, fill: [u8; 3]) -> Self {
        self.content = PageContent::Vector { fill };
        self
    }

    /// A page whose render always fails
    pub fn unrenderable(label: impl Into<String>, size: PageSize) -> Self {
        Self {
            label: label.into(),
            size,
            content: PageContent::Unrenderable,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn content(&self) -> &PageContent {
        &self.content
    }
}

impl Page for MemoryPage {
    fn size(&self) -> PageSize {
        self.size
    }

    fn render(&self, target: PixelSize) -> Result<DynamicImage> {
        let fill = match self.content {
            PageContent::Vector { fill } => fill,
            PageContent::Raster { .. } => [0x80, 0x80, 0x80],
            PageContent::Unrenderable => {
                return Err(Error::Render {
                    reason: format!("page '{}' has no drawable content", self.label),
                })
            }
        };
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            target.width,
            target.height,
            Rgb(fill),
        )))
    }
}

/// Vector of pages with PDF-like structural operations
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryDocument {
    pages: Vec<MemoryPage>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Letter-sized pages labelled `p1`, `p2`, ...
    pub fn with_pages(count: usize) -> Self {
        Self::from_pages(
            (1..=count).map(|n| MemoryPage::new(format!("p{}", n), PageSize::letter())),
        )
    }

    pub fn from_pages(pages: impl IntoIterator<Item = MemoryPage>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
        }
    }

    pub fn pages(&self) -> &[MemoryPage] {
        &self.pages
    }

    pub fn labels(&self) -> Vec<&str> {
        self.pages.iter().map(MemoryPage::label).collect()
    }
}

impl Document for MemoryDocument {
    type Page = MemoryPage;

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, index: usize) -> Option<MemoryPage> {
        self.pages.get(index).cloned()
    }

    fn insert_page_from(&mut self, source: &Self, source_index: usize, at: usize) -> Result<()> {
        let page = source.page(source_index).ok_or(Error::PageOutOfBounds {
            index: source_index,
            total: source.page_count(),
        })?;
        if at > self.pages.len() {
            return Err(Error::PageOutOfBounds {
                index: at,
                total: self.pages.len(),
            });
        }
        self.pages.insert(at, page);
        Ok(())
    }

    fn remove_page(&mut self, index: usize) -> Result<()> {
        if index >= self.pages.len() {
            return Err(Error::PageOutOfBounds {
                index,
                total: self.pages.len(),
            });
        }
        self.pages.remove(index);
        Ok(())
    }

    fn append_image_page(&mut self, image: &EncodedImage, size: PageSize) -> Result<()> {
        let label = format!("raster{}", self.pages.len() + 1);
        self.pages.push(MemoryPage {
            label,
            size,
            content: PageContent::Raster {
                pixels: image.size,
                format: image.format,
                quality: image.quality,
                encoded_len: image.bytes.len(),
            },
        });
        Ok(())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Factory for empty [`MemoryDocument`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryFactory;

impl DocumentFactory for MemoryFactory {
    type Document = MemoryDocument;

    fn create(&self) -> Result<MemoryDocument> {
        Ok(MemoryDocument::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_copies_page() {
        let source = MemoryDocument::with_pages(3);
        let mut dest = MemoryDocument::new();

        dest.insert_page_from(&source, 2, 0).unwrap();
        dest.insert_page_from(&source, 0, 0).unwrap();

        assert_eq!(dest.labels(), vec!["p1", "p3"]);
        assert_eq!(source.page_count(), 3);
    }

    #[test]
    fn test_insert_past_end_fails() {
        let source = MemoryDocument::with_pages(1);
        let mut dest = MemoryDocument::new();
        let result = dest.insert_page_from(&source, 0, 1);
        assert!(matches!(result, Err(Error::PageOutOfBounds { index: 1, total: 0 })));
    }

    #[test]
    fn test_remove_shifts_pages() {
        let mut doc = MemoryDocument::with_pages(3);
        doc.remove_page(0).unwrap();
        assert_eq!(doc.labels(), vec!["p2", "p3"]);
        assert!(doc.remove_page(2).is_err());
    }

    #[test]
    fn test_render_fills_target() {
        let page = MemoryPage::new("a", PageSize::letter()).with_fill([10, 20, 30]);
        let image = page.render(PixelSize::new(4, 3)).unwrap();
        assert_eq!((image.width(), image.height()), (4, 3));
        assert_eq!(image.to_rgb8().get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_unrenderable_page() {
        let page = MemoryPage::unrenderable("broken", PageSize::letter());
        assert!(matches!(
            page.render(PixelSize::new(1, 1)),
            Err(Error::Render { .. })
        ));
    }

    #[test]
    fn test_to_bytes_is_json() {
        let doc = MemoryDocument::with_pages(2);
        let bytes = doc.to_bytes().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["pages"][1]["label"], "p2");
        assert_eq!(value["pages"][0]["content"]["kind"], "vector");
    }
}
