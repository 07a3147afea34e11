//! Page deletion and extraction

use super::document::{Document, DocumentFactory};
use crate::error::Result;

/// Outcome of [`delete_pages`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Pages actually removed
    pub removed: usize,
    /// Indices that no longer resolved to a page
    pub skipped: usize,
}

/// Outcome of [`extract_pages`]
#[derive(Debug)]
pub struct ExtractOutcome<D> {
    pub document: D,
    /// Indices that did not resolve to a page of the source
    pub skipped: usize,
}

/// Remove the pages at `indices` from `document`.
///
/// Removal runs from the highest index down so pending indices never shift.
/// Duplicates collapse; indices past the end at the time of removal are
/// skipped. Any selection built against the old page count is stale after
/// this returns.
pub fn delete_pages<D, I>(document: &mut D, indices: I) -> Result<DeleteOutcome>
where
    D: Document,
    I: IntoIterator<Item = usize>,
{
    let mut sorted: Vec<usize> = indices.into_iter().collect();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted.dedup();

    let mut outcome = DeleteOutcome::default();
    for index in sorted {
        if index < document.page_count() {
            document.remove_page(index)?;
            outcome.removed += 1;
        } else {
            outcome.skipped += 1;
        }
    }

    tracing::debug!(
        removed = outcome.removed,
        skipped = outcome.skipped,
        remaining = document.page_count(),
        "deleted pages"
    );

    Ok(outcome)
}

/// Copy the pages at `indices` into a new document.
///
/// Pages land in ascending source order whatever order `indices` arrives in,
/// so the extract reads like the source. `document` is left untouched.
pub fn extract_pages<F, I>(
    factory: &F,
    document: &F::Document,
    indices: I,
) -> Result<ExtractOutcome<F::Document>>
where
    F: DocumentFactory,
    I: IntoIterator<Item = usize>,
{
    let mut sorted: Vec<usize> = indices.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut output = factory.create()?;
    let mut cursor = 0;
    let mut skipped = 0;

    for index in sorted {
        if index < document.page_count() {
            output.insert_page_from(document, index, cursor)?;
            cursor += 1;
        } else {
            skipped += 1;
        }
    }

    tracing::debug!(extracted = cursor, skipped, "extracted pages");

    Ok(ExtractOutcome {
        document: output,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::{MemoryDocument, MemoryFactory};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_delete_preserves_order_of_remaining() {
        let mut doc = MemoryDocument::with_pages(6);
        let outcome = delete_pages(&mut doc, [1, 4, 2]).unwrap();

        assert_eq!(outcome, DeleteOutcome { removed: 3, skipped: 0 });
        assert_eq!(doc.labels(), vec!["p1", "p4", "p6"]);
    }

    #[test]
    fn test_delete_ascending_input_still_safe() {
        let mut doc = MemoryDocument::with_pages(4);
        delete_pages(&mut doc, vec![0, 1, 2]).unwrap();
        assert_eq!(doc.labels(), vec!["p4"]);
    }

    #[test]
    fn test_delete_skips_out_of_range_and_duplicates() {
        let mut doc = MemoryDocument::with_pages(3);
        let outcome = delete_pages(&mut doc, [0, 0, 7]).unwrap();

        assert_eq!(outcome, DeleteOutcome { removed: 1, skipped: 1 });
        assert_eq!(doc.labels(), vec!["p2", "p3"]);
    }

    #[test]
    fn test_delete_everything() {
        let mut doc = MemoryDocument::with_pages(3);
        delete_pages(&mut doc, 0..3).unwrap();
        assert_eq!(doc.page_count(), 0);
    }

    #[test]
    fn test_extract_sorts_ascending() {
        let doc = MemoryDocument::with_pages(5);
        let outcome = extract_pages(&MemoryFactory, &doc, [4, 0, 2]).unwrap();

        assert_eq!(outcome.document.labels(), vec!["p1", "p3", "p5"]);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(doc.page_count(), 5);
    }

    #[test]
    fn test_extract_empty_selection() {
        let doc = MemoryDocument::with_pages(5);
        let outcome = extract_pages(&MemoryFactory, &doc, std::iter::empty()).unwrap();
        assert_eq!(outcome.document.page_count(), 0);
    }

    #[test]
    fn test_extract_skips_out_of_range() {
        let doc = MemoryDocument::with_pages(2);
        let outcome = extract_pages(&MemoryFactory, &doc, [1, 5, 1]).unwrap();
        assert_eq!(outcome.document.labels(), vec!["p2"]);
        assert_eq!(outcome.skipped, 1);
    }
}
