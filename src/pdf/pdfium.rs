//! PDFium-backed documents
//!
//! Implements the engine's [`Document`] and [`Page`] traits over
//! `pdfium-render`. A [`PdfiumBackend`] owns the library binding; every
//! document it opens or creates borrows it, so keep the backend alive for as
//! long as its documents.

use crate::engine::{
    Document, DocumentFactory, EncodedImage, ImageFormat, Page, PageSize, PixelSize,
};
use crate::error::{Error, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::Path;

/// Reject data that does not start with a PDF header
pub fn ensure_pdf_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

/// Bind to PDFium (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    // Try to bind to a bundled library first, then the system one
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

fn map_pdfium_error(err: PdfiumError) -> Error {
    Error::Pdfium {
        reason: format!("{}", err),
    }
}

fn map_load_error(err: PdfiumError, password_given: bool) -> Error {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            if password_given {
                Error::IncorrectPassword
            } else {
                Error::PasswordRequired
            }
        }
        _ => map_pdfium_error(err),
    }
}

fn to_page_index(index: usize, total: usize) -> Result<PdfPageIndex> {
    PdfPageIndex::try_from(index).map_err(|_| Error::PageOutOfBounds { index, total })
}

/// Owns a PDFium binding and hands out documents borrowing it
pub struct PdfiumBackend {
    pdfium: Pdfium,
}

impl PdfiumBackend {
    /// Bind to the PDFium shared library
    pub fn new() -> Result<Self> {
        Ok(Self {
            pdfium: create_pdfium()?,
        })
    }

    /// Open a PDF from a file path
    pub fn open<'a, P: AsRef<Path>>(
        &'a self,
        path: P,
        password: Option<&'a str>,
    ) -> Result<PdfiumDocument<'a>> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(Error::PdfNotFound {
                path: path.display().to_string(),
            });
        }

        let data = std::fs::read(path)?;
        self.open_bytes(data, password)
    }

    /// Open a PDF from bytes
    pub fn open_bytes<'a>(
        &'a self,
        data: Vec<u8>,
        password: Option<&'a str>,
    ) -> Result<PdfiumDocument<'a>> {
        ensure_pdf_header(&data)?;

        let inner = self
            .pdfium
            .load_pdf_from_byte_vec(data, password)
            .map_err(|e| map_load_error(e, password.is_some()))?;

        Ok(PdfiumDocument { inner })
    }

    /// Create an empty PDF
    pub fn create(&self) -> Result<PdfiumDocument<'_>> {
        let inner = self.pdfium.create_new_pdf().map_err(map_pdfium_error)?;
        Ok(PdfiumDocument { inner })
    }
}

impl<'a> DocumentFactory for &'a PdfiumBackend {
    type Document = PdfiumDocument<'a>;

    fn create(&self) -> Result<PdfiumDocument<'a>> {
        let backend: &'a PdfiumBackend = *self;
        PdfiumBackend::create(backend)
    }
}

/// A PDF loaded into PDFium
pub struct PdfiumDocument<'a> {
    inner: PdfDocument<'a>,
}

impl<'a> Document for PdfiumDocument<'a> {
    type Page = PdfiumPage<'a>;

    fn page_count(&self) -> usize {
        self.inner.pages().len() as usize
    }

    fn page(&self, index: usize) -> Option<PdfiumPage<'a>> {
        let index = PdfPageIndex::try_from(index).ok()?;
        self.inner
            .pages()
            .get(index)
            .ok()
            .map(|inner| PdfiumPage { inner })
    }

    fn insert_page_from(&mut self, source: &Self, source_index: usize, at: usize) -> Result<()> {
        let source_index = to_page_index(source_index, source.page_count())?;
        let at = to_page_index(at, self.page_count())?;

        self.inner
            .pages_mut()
            .copy_page_from_document(&source.inner, source_index, at)
            .map_err(map_pdfium_error)
    }

    fn remove_page(&mut self, index: usize) -> Result<()> {
        let total = self.page_count();
        let page_index = to_page_index(index, total)?;

        let page = self
            .inner
            .pages()
            .get(page_index)
            .map_err(|_| Error::PageOutOfBounds { index, total })?;
        page.delete().map_err(map_pdfium_error)
    }

    fn append_image_page(&mut self, image: &EncodedImage, size: PageSize) -> Result<()> {
        // Loaded inline so the encoded stream is stored as-is under DCTDecode
        let mut object = match image.format {
            ImageFormat::Jpeg => PdfPageImageObject::new_from_jpeg_reader(
                &self.inner,
                Cursor::new(image.bytes.as_slice()),
            ),
        }
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to embed JPEG: {}", e),
        })?;

        // Image objects start out 1x1 point; stretch over the whole page box
        object
            .scale(size.width, size.height)
            .map_err(map_pdfium_error)?;

        let mut page = self
            .inner
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::from_points(
                PdfPoints::new(size.width),
                PdfPoints::new(size.height),
            ))
            .map_err(map_pdfium_error)?;

        page.objects_mut()
            .add_image_object(object)
            .map_err(map_pdfium_error)?;

        Ok(())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        self.inner.save_to_bytes().map_err(|e| Error::Pdfium {
            reason: format!("Failed to save PDF: {}", e),
        })
    }
}

/// A page of a [`PdfiumDocument`]
pub struct PdfiumPage<'a> {
    inner: PdfPage<'a>,
}

impl Page for PdfiumPage<'_> {
    fn size(&self) -> PageSize {
        PageSize::new(self.inner.width().value, self.inner.height().value)
    }

    fn render(&self, target: PixelSize) -> Result<DynamicImage> {
        let config = PdfRenderConfig::new()
            .set_target_size(target.width as i32, target.height as i32)
            .set_clear_color(PdfColor::WHITE)
            .set_image_smoothing(true)
            .render_form_data(true)
            .render_annotations(true);

        let bitmap = self
            .inner
            .render_with_config(&config)
            .map_err(|e| Error::Render {
                reason: format!("{}", e),
            })?;

        let rendered = bitmap.as_image();

        // PDFium fits the page inside the target, which can come out a pixel short
        if rendered.width() != target.width || rendered.height() != target.height {
            return Ok(rendered.resize_exact(target.width, target.height, FilterType::Lanczos3));
        }

        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pdf_detection() {
        let result = ensure_pdf_header(b"not a pdf");
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));

        let result = ensure_pdf_header(b"%PD");
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));

        assert!(ensure_pdf_header(b"%PDF-1.7\n").is_ok());
    }

    #[test]
    fn test_password_error_mapping() {
        let err = || PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError);
        assert!(matches!(map_load_error(err(), false), Error::PasswordRequired));
        assert!(matches!(map_load_error(err(), true), Error::IncorrectPassword));
    }
}
