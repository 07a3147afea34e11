//! Source resolution for PDF data

use crate::error::{Error, Result};
use crate::pdf::ensure_pdf_header;
use crate::source::DocumentCache;
use base64::Engine;
use std::path::Path;

/// Stem used when a source carries no file name
pub const DEFAULT_STEM: &str = "document";

/// Resolved PDF data
#[derive(Debug, Clone)]
pub struct ResolvedPdf {
    pub data: Vec<u8>,
    /// Display name for results and logs
    pub source_name: String,
    /// File stem that output names are derived from
    pub stem: String,
}

/// File stem of `name`, or [`DEFAULT_STEM`] when it has none
pub fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STEM)
        .to_string()
}

/// Resolve a file path to PDF data
pub fn resolve_path<P: AsRef<Path>>(path: P) -> Result<ResolvedPdf> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::PdfNotFound {
            path: path.display().to_string(),
        });
    }

    let data = std::fs::read(path)?;
    ensure_pdf_header(&data)?;

    let source_name = path.display().to_string();
    Ok(ResolvedPdf {
        data,
        stem: file_stem(&source_name),
        source_name,
    })
}

/// Resolve base64 encoded data to PDF data
pub fn resolve_base64(base64_data: &str) -> Result<ResolvedPdf> {
    let engine = base64::engine::general_purpose::STANDARD;
    let data = engine.decode(base64_data.trim())?;
    ensure_pdf_header(&data)?;

    Ok(ResolvedPdf {
        data,
        source_name: "<base64>".to_string(),
        stem: DEFAULT_STEM.to_string(),
    })
}

/// Resolve a cache key to PDF data
pub fn resolve_cache(cache_key: &str, cache: &DocumentCache) -> Result<ResolvedPdf> {
    let cached = cache
        .get(cache_key)
        .ok_or_else(|| Error::CacheKeyNotFound {
            key: cache_key.to_string(),
        })?;

    Ok(ResolvedPdf {
        stem: file_stem(&cached.name),
        data: cached.data,
        source_name: format!("<cache:{}>", cache_key),
    })
}
