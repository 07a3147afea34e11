//! Document workspace
//!
//! An ordered list of open documents with one active entry, a page selection
//! on the active document, an activity log and an optional export folder.
//! Batch actions produce [`NamedOutput`]s carrying the file name they should
//! be saved under; [`Workspace::save`] writes them out.

use crate::engine::{
    delete_pages, extract_pages, merge_all, split_every, DeleteOutcome, Document,
    DocumentFactory, RasterParams, Rasterizer, SelectionSet, MIN_SPLIT_SIZE,
};
use crate::error::{Error, Result};
use crate::source::file_stem;
use std::path::{Path, PathBuf};

/// First line of every workspace log
pub const READY_LINE: &str = "Ready.";

/// File name used for [`Workspace::merge_all`] output
pub const MERGED_NAME: &str = "Merged.pdf";

pub fn extract_name(stem: &str) -> String {
    format!("{}_extract.pdf", stem)
}

/// `part` is 1-based and zero-padded to two digits
pub fn part_name(stem: &str, part: usize) -> String {
    format!("{}_part_{:02}.pdf", stem, part)
}

pub fn compressed_name(stem: &str) -> String {
    format!("{}_compressed.pdf", stem)
}

/// An open document and the file name it was opened from
#[derive(Debug)]
pub struct WorkspaceItem<D> {
    pub name: String,
    pub document: D,
}

impl<D> WorkspaceItem<D> {
    /// File name without its extension
    pub fn stem(&self) -> String {
        file_stem(&self.name)
    }
}

/// A produced document waiting to be saved
#[derive(Debug)]
pub struct NamedOutput<D> {
    /// Suggested file name
    pub name: String,
    pub document: D,
    /// Source pages that did not make it into `document`
    pub skipped: usize,
}

impl<D> NamedOutput<D> {
    fn new(name: String, document: D) -> Self {
        Self {
            name,
            document,
            skipped: 0,
        }
    }
}

pub struct Workspace<D> {
    items: Vec<WorkspaceItem<D>>,
    active: Option<usize>,
    selection: SelectionSet,
    log: Vec<String>,
    export_dir: Option<PathBuf>,
}

impl<D: Document> Default for Workspace<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Document> Workspace<D> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            active: None,
            selection: SelectionSet::new(),
            log: vec![READY_LINE.to_string()],
            export_dir: None,
        }
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }

    pub fn set_export_dir(&mut self, dir: Option<PathBuf>) {
        self.export_dir = dir;
    }

    pub fn export_dir(&self) -> Option<&Path> {
        self.export_dir.as_deref()
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    fn append_log(&mut self, line: String) {
        tracing::info!("{}", line);
        self.log.push(line);
    }

    pub fn items(&self) -> &[WorkspaceItem<D>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a document; the first one added becomes active.
    pub fn add(&mut self, name: impl Into<String>, document: D) {
        let name = name.into();
        let line = format!("Added {}", name);
        self.items.push(WorkspaceItem { name, document });
        if self.active.is_none() {
            self.active = Some(0);
        }
        self.append_log(line);
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_item(&self) -> Option<&WorkspaceItem<D>> {
        self.active.and_then(|idx| self.items.get(idx))
    }

    pub fn active_document(&self) -> Option<&D> {
        self.active_item().map(|item| &item.document)
    }

    /// Page count of the active document, zero when nothing is active
    pub fn active_page_count(&self) -> usize {
        self.active_document().map_or(0, Document::page_count)
    }

    /// Make `index` active; the selection always starts empty.
    pub fn set_active(&mut self, index: usize) -> Result<()> {
        if index >= self.items.len() {
            return Err(Error::InvalidArgument {
                reason: format!(
                    "workspace entry {} does not exist ({} open)",
                    index,
                    self.items.len()
                ),
            });
        }
        self.active = Some(index);
        self.selection.select_none();
        Ok(())
    }

    /// Close the active document. The first remaining one becomes active.
    pub fn remove_active(&mut self) -> Option<WorkspaceItem<D>> {
        let idx = self.active?;
        let removed = self.items.remove(idx);
        self.active = if self.items.is_empty() { None } else { Some(0) };
        self.selection.select_none();
        self.append_log(format!("Removed {} from list", removed.name));
        Some(removed)
    }

    /// Swap the active document with its neighbour. Returns `false` at either end.
    pub fn move_active(&mut self, up: bool) -> bool {
        let Some(idx) = self.active else {
            return false;
        };
        let target = if up {
            idx.saturating_sub(1)
        } else {
            (idx + 1).min(self.items.len() - 1)
        };
        if target == idx {
            return false;
        }
        self.items.swap(idx, target);
        self.active = Some(target);
        true
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionSet {
        &mut self.selection
    }

    /// Add a typed range to the selection. Returns the dropped token count.
    pub fn select_range(&mut self, spec: &str) -> usize {
        let page_count = self.active_page_count();
        let dropped = self.selection.union_range(spec, page_count);
        if dropped > 0 {
            tracing::debug!(spec, dropped, "ignored range tokens");
        }
        dropped
    }

    /// Delete the selected pages from the active document.
    ///
    /// `None` when nothing is active or selected. The selection is cleared.
    pub fn delete_selected(&mut self) -> Result<Option<DeleteOutcome>> {
        let Some(idx) = self.active else {
            return Ok(None);
        };
        if self.selection.is_empty() {
            return Ok(None);
        }

        let indices: Vec<usize> = self.selection.iter().collect();
        self.selection.select_none();
        let item = &mut self.items[idx];
        let outcome = delete_pages(&mut item.document, indices)?;

        let line = format!("Deleted {} page(s) from {}", outcome.removed, item.name);
        self.append_log(line);
        Ok(Some(outcome))
    }

    /// Copy the selected pages of the active document into `<stem>_extract.pdf`.
    pub fn extract_selected<F>(&self, factory: &F) -> Result<Option<NamedOutput<D>>>
    where
        F: DocumentFactory<Document = D>,
    {
        let Some(item) = self.active_item() else {
            return Ok(None);
        };
        if self.selection.is_empty() {
            return Ok(None);
        }

        let outcome = extract_pages(factory, &item.document, self.selection.iter())?;
        Ok(Some(NamedOutput {
            name: extract_name(&item.stem()),
            document: outcome.document,
            skipped: outcome.skipped,
        }))
    }

    /// Concatenate every open document, in list order, into `Merged.pdf`.
    pub fn merge_all<F>(&self, factory: &F) -> Result<Option<NamedOutput<D>>>
    where
        F: DocumentFactory<Document = D>,
    {
        if self.items.is_empty() {
            return Ok(None);
        }

        let merged = merge_all(factory, self.items.iter().map(|item| &item.document))?;
        Ok(Some(NamedOutput::new(MERGED_NAME.to_string(), merged)))
    }

    /// Split every open document into `<stem>_part_NN.pdf` chunks of `n` pages.
    pub fn split_all<F>(&self, factory: &F, n: usize) -> Result<Vec<NamedOutput<D>>>
    where
        F: DocumentFactory<Document = D>,
    {
        if n < MIN_SPLIT_SIZE {
            return Ok(Vec::new());
        }

        let mut outputs = Vec::new();
        for item in &self.items {
            let stem = item.stem();
            let parts = split_every(factory, &item.document, n)?;
            outputs.extend(
                parts
                    .into_iter()
                    .enumerate()
                    .map(|(i, part)| NamedOutput::new(part_name(&stem, i + 1), part)),
            );
        }
        Ok(outputs)
    }

    /// Rasterize every open document into `<stem>_compressed.pdf`.
    pub fn compress_all<F>(
        &mut self,
        rasterizer: &Rasterizer,
        factory: &F,
        params: RasterParams,
    ) -> Result<Vec<NamedOutput<D>>>
    where
        F: DocumentFactory<Document = D>,
    {
        let mut outputs = Vec::with_capacity(self.items.len());
        let mut notes = Vec::new();

        for item in &self.items {
            let outcome = rasterizer.rasterize(factory, &item.document, params)?;
            if !outcome.skipped.is_empty() {
                notes.push(format!(
                    "Skipped {} unrenderable page(s) in {}",
                    outcome.skipped.len(),
                    item.name
                ));
            }
            outputs.push(NamedOutput {
                name: compressed_name(&item.stem()),
                document: outcome.document,
                skipped: outcome.skipped.len(),
            });
        }

        for note in notes {
            self.append_log(note);
        }
        Ok(outputs)
    }

    /// Write `output` into the export folder, or into `fallback_dir` when
    /// no export folder is set.
    ///
    /// The outcome is logged either way and not retried.
    pub fn save(&mut self, output: &NamedOutput<D>, fallback_dir: Option<&Path>) -> Result<PathBuf> {
        let dir = self
            .export_dir
            .clone()
            .or_else(|| fallback_dir.map(Path::to_path_buf))
            .ok_or_else(|| Error::InvalidArgument {
                reason: "no export folder set".to_string(),
            })?;
        let path = dir.join(&output.name);

        match output.document.save(&path) {
            Ok(()) => {
                self.append_log(format!("Saved {}", output.name));
                Ok(path)
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "save failed");
                self.append_log(format!("Save failed for {}", output.name));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::{MemoryDocument, MemoryFactory};
    use pretty_assertions::assert_eq;

    fn workspace(counts: &[usize]) -> Workspace<MemoryDocument> {
        let mut ws = Workspace::new();
        for (i, &count) in counts.iter().enumerate() {
            ws.add(format!("doc{}.pdf", i + 1), MemoryDocument::with_pages(count));
        }
        ws
    }

    fn names<D>(outputs: &[NamedOutput<D>]) -> Vec<&str> {
        outputs.iter().map(|o| o.name.as_str()).collect()
    }

    #[test]
    fn test_output_names() {
        assert_eq!(extract_name("scan"), "scan_extract.pdf");
        assert_eq!(part_name("scan", 3), "scan_part_03.pdf");
        assert_eq!(part_name("scan", 120), "scan_part_120.pdf");
        assert_eq!(compressed_name("scan"), "scan_compressed.pdf");
    }

    #[test]
    fn test_log_starts_ready() {
        let ws = Workspace::<MemoryDocument>::new();
        assert_eq!(ws.log(), [READY_LINE.to_string()]);
        assert!(ws.active_document().is_none());
    }

    #[test]
    fn test_first_added_becomes_active() {
        let ws = workspace(&[3, 5]);
        assert_eq!(ws.active_index(), Some(0));
        assert_eq!(ws.active_page_count(), 3);
        assert_eq!(ws.log().len(), 3);
    }

    #[test]
    fn test_set_active_clears_selection() {
        let mut ws = workspace(&[3, 5]);
        ws.select_range("1-2");
        ws.set_active(1).unwrap();
        assert!(ws.selection().is_empty());
        assert_eq!(ws.active_page_count(), 5);
        assert!(ws.set_active(2).is_err());
    }

    #[test]
    fn test_move_active() {
        let mut ws = workspace(&[1, 2, 3]);
        assert!(!ws.move_active(true));
        assert!(ws.move_active(false));
        assert_eq!(ws.active_index(), Some(1));
        assert_eq!(ws.items()[1].name, "doc1.pdf");
        assert!(ws.move_active(false));
        assert!(!ws.move_active(false));
        assert_eq!(ws.active_index(), Some(2));
    }

    #[test]
    fn test_remove_active() {
        let mut ws = workspace(&[1, 2]);
        ws.set_active(1).unwrap();
        let removed = ws.remove_active().unwrap();
        assert_eq!(removed.name, "doc2.pdf");
        assert_eq!(ws.active_index(), Some(0));
        ws.remove_active();
        assert!(ws.is_empty());
        assert_eq!(ws.active_index(), None);
        assert!(ws.remove_active().is_none());
        assert_eq!(ws.log().last().map(String::as_str), Some("Removed doc1.pdf from list"));
    }

    #[test]
    fn test_select_range_counts_dropped() {
        let mut ws = workspace(&[10]);
        assert_eq!(ws.select_range("1-3,abc,99"), 2);
        assert_eq!(ws.selection().page_numbers(), vec![1, 2, 3]);
    }

    #[test]
    fn test_delete_selected_clears_selection() {
        let mut ws = workspace(&[5]);
        ws.select_range("2,4");
        let outcome = ws.delete_selected().unwrap().unwrap();

        assert_eq!(outcome.removed, 2);
        assert!(ws.selection().is_empty());
        assert_eq!(
            ws.active_document().unwrap().labels(),
            vec!["p1", "p3", "p5"]
        );
        assert_eq!(
            ws.log().last().map(String::as_str),
            Some("Deleted 2 page(s) from doc1.pdf")
        );
        assert!(ws.delete_selected().unwrap().is_none());
    }

    #[test]
    fn test_extract_selected() {
        let mut ws = workspace(&[6]);
        assert!(ws.extract_selected(&MemoryFactory).unwrap().is_none());

        ws.select_range("5,2");
        let output = ws.extract_selected(&MemoryFactory).unwrap().unwrap();
        assert_eq!(output.name, "doc1_extract.pdf");
        assert_eq!(output.document.labels(), vec!["p2", "p5"]);
        assert_eq!(ws.active_page_count(), 6);
    }

    #[test]
    fn test_merge_all() {
        let empty = Workspace::<MemoryDocument>::new();
        assert!(empty.merge_all(&MemoryFactory).unwrap().is_none());

        let ws = workspace(&[2, 3]);
        let merged = ws.merge_all(&MemoryFactory).unwrap().unwrap();
        assert_eq!(merged.name, MERGED_NAME);
        assert_eq!(merged.document.page_count(), 5);
    }

    #[test]
    fn test_split_all_names_parts() {
        let ws = workspace(&[5, 2]);
        let outputs = ws.split_all(&MemoryFactory, 2).unwrap();
        assert_eq!(
            names(&outputs),
            vec![
                "doc1_part_01.pdf",
                "doc1_part_02.pdf",
                "doc1_part_03.pdf",
                "doc2_part_01.pdf"
            ]
        );
        assert!(ws.split_all(&MemoryFactory, 1).unwrap().is_empty());
    }

    #[test]
    fn test_compress_all() {
        let mut ws = workspace(&[2]);
        let outputs = ws
            .compress_all(&Rasterizer::new(), &MemoryFactory, RasterParams::new(18.0, 0.5))
            .unwrap();
        assert_eq!(names(&outputs), vec!["doc1_compressed.pdf"]);
        assert_eq!(outputs[0].document.page_count(), 2);
        assert_eq!(outputs[0].skipped, 0);
    }

    #[test]
    fn test_save_requires_folder() {
        let mut ws = workspace(&[2]);
        let merged = ws.merge_all(&MemoryFactory).unwrap().unwrap();
        assert!(matches!(
            ws.save(&merged, None),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_save_into_export_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = workspace(&[2]).with_export_dir(dir.path());
        let merged = ws.merge_all(&MemoryFactory).unwrap().unwrap();

        let path = ws.save(&merged, None).unwrap();
        assert_eq!(path, dir.path().join("Merged.pdf"));
        assert!(path.exists());
        assert_eq!(ws.log().last().map(String::as_str), Some("Saved Merged.pdf"));
    }

    #[test]
    fn test_save_failure_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();

        let mut ws = workspace(&[1]);
        let merged = ws.merge_all(&MemoryFactory).unwrap().unwrap();
        assert!(ws.save(&merged, Some(&blocker)).is_err());
        assert_eq!(
            ws.log().last().map(String::as_str),
            Some("Save failed for Merged.pdf")
        );
    }
}
