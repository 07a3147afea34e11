//! Page selection set algebra

use super::range::parse_range;
use std::collections::BTreeSet;

/// Zero-based page indices selected in one document.
///
/// The set is only meaningful against the page count it was built with;
/// structural edits to the document invalidate it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    pages: BTreeSet<usize>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection with every page.
    pub fn select_all(&mut self, page_count: usize) {
        self.pages = (0..page_count).collect();
    }

    pub fn select_none(&mut self) {
        self.pages.clear();
    }

    /// Complement within `0..page_count`.
    pub fn invert(&mut self, page_count: usize) {
        self.pages = (0..page_count)
            .filter(|index| !self.pages.contains(index))
            .collect();
    }

    /// Union the pages named by a range specifier into the selection.
    ///
    /// Returns how many tokens of `spec` were dropped.
    pub fn union_range(&mut self, spec: &str, page_count: usize) -> usize {
        let parsed = parse_range(spec, page_count);
        self.pages.extend(parsed.indices);
        parsed.dropped
    }

    /// Flip one page in or out of the selection. Out-of-range indices are ignored.
    pub fn toggle(&mut self, index: usize, page_count: usize) {
        if index >= page_count {
            return;
        }
        if !self.pages.remove(&index) {
            self.pages.insert(index);
        }
    }

    /// Make `index` the only selected page.
    pub fn select_only(&mut self, index: usize, page_count: usize) {
        self.pages.clear();
        if index < page_count {
            self.pages.insert(index);
        }
    }

    pub fn exclude(&mut self, index: usize) {
        self.pages.remove(&index);
    }

    pub fn contains(&self, index: usize) -> bool {
        self.pages.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.pages.iter().copied()
    }

    /// Selected pages as sorted 1-based page numbers
    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.iter().map(|&index| index as u32 + 1).collect()
    }
}

impl FromIterator<usize> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            pages: iter.into_iter().collect(),
        }
    }
}

impl Extend<usize> for SelectionSet {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        self.pages.extend(iter);
    }
}
