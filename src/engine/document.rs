//! Collaborator traits the engine is written against
//!
//! The engine never parses, renders or encodes anything itself. It drives a
//! [`Document`] backend (PDFium in production, [`super::memory`] in tests),
//! asks pages to render themselves, and hands pixels to an [`ImageEncoder`].

use crate::error::Result;
use image::DynamicImage;
use serde::Serialize;
use std::path::Path;

/// Points per inch in PDF user space
pub const POINTS_PER_INCH: f32 = 72.0;

/// Page geometry in points (1 point = 1/72 inch)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// US Letter, the default page box for synthetic documents
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }
}

/// Raster dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel size of a page rendered at `dpi`.
    ///
    /// Both axes use the same `dpi / 72` factor, so the aspect ratio of the
    /// page box carries over. Each axis is at least one pixel.
    pub fn for_page(size: PageSize, dpi: f32) -> Self {
        let scale = dpi / POINTS_PER_INCH;
        Self {
            width: scaled_axis(size.width, scale),
            height: scaled_axis(size.height, scale),
        }
    }

    /// Total pixel area
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

fn scaled_axis(points: f32, scale: f32) -> u32 {
    let px = (points * scale).round();
    if px.is_finite() && px >= 1.0 {
        px as u32
    } else {
        1
    }
}

/// Lossy image format produced by an [`ImageEncoder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Compressed raster ready to become a page
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub size: PixelSize,
    /// Quality actually used, after clamping
    pub quality: f32,
    pub format: ImageFormat,
}

/// One page of a [`Document`]
pub trait Page {
    /// Page box in points
    fn size(&self) -> PageSize;

    /// Draw the page into a buffer of exactly `target` pixels on a white
    /// background.
    fn render(&self, target: PixelSize) -> Result<DynamicImage>;
}

/// Ordered, mutable sequence of pages
pub trait Document: Sized {
    type Page: Page;

    fn page_count(&self) -> usize;

    /// Page at `index`, or `None` when out of range
    fn page(&self, index: usize) -> Option<Self::Page>;

    /// Copy page `source_index` of `source` so it lands at position `at`.
    fn insert_page_from(&mut self, source: &Self, source_index: usize, at: usize) -> Result<()>;

    /// Remove the page at `index`; later pages shift down by one.
    fn remove_page(&mut self, index: usize) -> Result<()>;

    /// Append a page consisting of a single image covering a `size` page box.
    fn append_image_page(&mut self, image: &EncodedImage, size: PageSize) -> Result<()>;

    /// Serialize the document.
    fn to_bytes(&self) -> Result<Vec<u8>>;

    /// Serialize to `path`, creating parent directories as needed.
    fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

/// Creates empty documents of one backend
pub trait DocumentFactory {
    type Document: Document;

    fn create(&self) -> Result<Self::Document>;
}

/// Compresses a raster buffer into a lossy format
pub trait ImageEncoder: Send + Sync {
    /// `quality` is already clamped to the engine's range when this is called.
    fn encode(&self, image: &DynamicImage, quality: f32) -> Result<EncodedImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_size_at_72_dpi_matches_points() {
        let px = PixelSize::for_page(PageSize::letter(), 72.0);
        assert_eq!(px, PixelSize::new(612, 792));
    }

    #[test]
    fn test_pixel_size_scales_uniformly() {
        let px = PixelSize::for_page(PageSize::new(612.0, 792.0), 144.0);
        assert_eq!(px, PixelSize::new(1224, 1584));

        let px = PixelSize::for_page(PageSize::new(595.0, 842.0), 110.0);
        // 595 * 110 / 72 = 909.03, 842 * 110 / 72 = 1286.39
        assert_eq!(px, PixelSize::new(909, 1286));
    }

    #[test]
    fn test_pixel_size_never_zero() {
        let px = PixelSize::for_page(PageSize::new(0.1, 0.0), 10.0);
        assert_eq!(px, PixelSize::new(1, 1));
    }
}
