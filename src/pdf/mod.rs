//! PDF backends
//!
//! PDFium implements the engine's document traits; qpdf handles the final
//! optimisation pass over serialized output.

mod pdfium;
mod qpdf;

pub use pdfium::{ensure_pdf_header, PdfiumBackend, PdfiumDocument, PdfiumPage};
pub use qpdf::QpdfWrapper;
