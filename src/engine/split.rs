//! Fixed-size document splitting

use super::document::{Document, DocumentFactory};
use crate::error::Result;

/// Smallest chunk size [`split_every`] acts on
pub const MIN_SPLIT_SIZE: usize = 2;

/// Cut `document` into consecutive chunks of `n` pages.
///
/// Chunk boundaries are `[0, n), [n, 2n), ...`; the last chunk holds the
/// remainder. `n < 2` is a no-op and returns no chunks, so callers validate
/// the size before calling. An empty document also yields no chunks.
pub fn split_every<F: DocumentFactory>(
    factory: &F,
    document: &F::Document,
    n: usize,
) -> Result<Vec<F::Document>> {
    if n < MIN_SPLIT_SIZE {
        tracing::debug!(n, "split size below minimum, nothing to do");
        return Ok(Vec::new());
    }

    let page_count = document.page_count();
    let mut parts = Vec::with_capacity(page_count.div_ceil(n));
    let mut start = 0;

    while start < page_count {
        let end = (start + n).min(page_count);
        let mut part = factory.create()?;
        for (cursor, index) in (start..end).enumerate() {
            part.insert_page_from(document, index, cursor)?;
        }
        parts.push(part);
        start = end;
    }

    tracing::debug!(pages = page_count, parts = parts.len(), n, "split document");

    Ok(parts)
}
