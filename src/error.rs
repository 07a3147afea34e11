//! Error types for PDF Slicer

use thiserror::Error;

/// Result type alias for PDF Slicer
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for PDF Slicer
#[derive(Error, Debug)]
pub enum Error {
    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is password protected and no password was provided
    #[error("PDF is password protected")]
    PasswordRequired,

    /// Incorrect password provided
    #[error("Incorrect password")]
    IncorrectPassword,

    /// Page range selected no pages
    #[error("Invalid page range: {range}")]
    InvalidPageRange { range: String },

    /// Page index out of bounds for a structural edit
    #[error("Page index {index} out of bounds (total: {total})")]
    PageOutOfBounds { index: usize, total: usize },

    /// Caller-supplied argument rejected before reaching the engine
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Page could not be rendered
    #[error("Failed to render page: {reason}")]
    Render { reason: String },

    /// Image codec error
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    /// Another rasterization is already running on this engine
    #[error("Rasterizer is busy")]
    Busy,

    /// Cache key not found
    #[error("Cache key not found: {key}")]
    CacheKeyNotFound { key: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// qpdf error
    #[error("qpdf error: {reason}")]
    QpdfError { reason: String },

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// Image dimension exceeded
    #[error("Image dimension exceeded: {detail}")]
    ImageDimensionExceeded { detail: String },
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::PdfNotFound { .. } => "PDF not found".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::PasswordRequired => "PDF is password protected".to_string(),
            Error::IncorrectPassword => "Incorrect password".to_string(),
            Error::InvalidPageRange { range } => format!("Invalid page range: {}", range),
            Error::PageOutOfBounds { index, total } => {
                format!("Page index {} out of bounds (total: {})", index, total)
            }
            Error::InvalidArgument { reason } => format!("Invalid argument: {}", reason),
            Error::Render { .. } => "Failed to render page".to_string(),
            Error::Image(_) => "Image encoding error".to_string(),
            Error::Busy => "Rasterizer is busy, retry later".to_string(),
            Error::CacheKeyNotFound { .. } => "Cache key not found".to_string(),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
            Error::QpdfError { .. } => "PDF processing error".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::ImageDimensionExceeded { detail } => {
                format!("Image dimension exceeded: {}", detail)
            }
        }
    }
}
