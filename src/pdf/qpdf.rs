//! Post-save optimisation via qpdf
//!
//! Rasterized output is written by PDFium without object streams; a qpdf
//! rewrite packs objects, recompresses streams and drops anything no longer
//! referenced from the page tree.

use crate::error::{Error, Result};
use qpdf::{ObjectStreamMode, QPdf};

/// Stateless entry point for qpdf operations
pub struct QpdfWrapper;

fn open_qpdf(data: &[u8], password: Option<&str>) -> Result<QPdf> {
    match password {
        Some(pwd) => QPdf::read_from_memory_encrypted(data, pwd).map_err(map_qpdf_error),
        None => QPdf::read_from_memory(data).map_err(map_qpdf_error),
    }
}

fn map_qpdf_error(e: qpdf::QPdfError) -> Error {
    match e.error_code() {
        qpdf::QPdfErrorCode::InvalidPassword => Error::IncorrectPassword,
        _ => Error::QpdfError {
            reason: e.to_string(),
        },
    }
}

impl QpdfWrapper {
    /// Rewrite a PDF with object streams and compressed content.
    ///
    /// Encryption is not carried over to the output.
    pub fn optimize(input_data: &[u8], password: Option<&str>) -> Result<Vec<u8>> {
        let qpdf = open_qpdf(input_data, password)?;

        let mut writer = qpdf.writer();
        writer
            .object_stream_mode(ObjectStreamMode::Generate)
            .compress_streams(true)
            .normalize_content(true)
            .preserve_unreferenced_objects(false)
            .preserve_encryption(false);
        let output = writer.write_to_memory().map_err(map_qpdf_error)?;

        tracing::debug!(
            before = input_data.len(),
            after = output.len(),
            "qpdf optimisation pass"
        );

        Ok(output)
    }

    /// Number of pages, without going through PDFium
    pub fn get_page_count(input_data: &[u8], password: Option<&str>) -> Result<u32> {
        let qpdf = open_qpdf(input_data, password)?;
        qpdf.get_num_pages().map_err(map_qpdf_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimize_rejects_garbage() {
        let result = QpdfWrapper::optimize(b"definitely not a pdf", None);
        assert!(matches!(result, Err(Error::QpdfError { .. })));
    }

    #[test]
    fn test_page_count_rejects_empty_input() {
        assert!(QpdfWrapper::get_page_count(&[], None).is_err());
    }
}
