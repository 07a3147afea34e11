//! Multi-document merge

use super::document::{Document, DocumentFactory};
use crate::error::Result;

/// Concatenate `documents` into one new document.
///
/// Output order is the iteration order, and within each document ascending
/// page order. No documents gives an empty document; a single document gives
/// a page-for-page copy.
pub fn merge_all<'a, F, I>(factory: &F, documents: I) -> Result<F::Document>
where
    F: DocumentFactory,
    F::Document: 'a,
    I: IntoIterator<Item = &'a F::Document>,
{
    let mut merged = factory.create()?;
    let mut cursor = 0;
    let mut count = 0;

    for document in documents {
        for index in 0..document.page_count() {
            merged.insert_page_from(document, index, cursor)?;
            cursor += 1;
        }
        count += 1;
    }

    tracing::debug!(documents = count, pages = cursor, "merged documents");

    Ok(merged)
}
