//! PDF Slicer
//!
//! Page-level PDF manipulation: range parsing and selection, deletion and
//! extraction, merging, fixed-size splitting, and rasterize-and-recompress.
//!
//! The [`engine`] works against the [`engine::Document`] traits; [`pdf`]
//! implements them over PDFium. The binary exposes the operations as MCP
//! tools:
//! - `select_pages`: Apply selection changes to a page set
//! - `delete_pages` / `extract_pages`: Remove or copy out pages
//! - `merge_pdfs` / `split_pdf`: Combine documents or cut them into parts
//! - `rasterize_pdf`: Re-render every page as JPEG to shrink a PDF
//! - `optimize_pdf`: Lossless qpdf rewrite
//!
//! Applications embedding the engine directly use [`Workspace`]: it keeps
//! the open documents, the active selection and an activity log, and names
//! batch outputs the same way the tools do.
//!
//! ```
//! use pdf_slicer::engine::memory::{MemoryDocument, MemoryFactory};
//! use pdf_slicer::Workspace;
//!
//! let mut workspace = Workspace::new();
//! workspace.add("report.pdf", MemoryDocument::with_pages(12));
//!
//! assert_eq!(workspace.select_range("1-3,5"), 0);
//! let extract = workspace.extract_selected(&MemoryFactory)?.unwrap();
//! assert_eq!(extract.name, "report_extract.pdf");
//!
//! let parts = workspace.split_all(&MemoryFactory, 5)?;
//! assert_eq!(parts.len(), 3);
//! # Ok::<(), pdf_slicer::Error>(())
//! ```

pub mod engine;
pub mod error;
pub mod pdf;
pub mod server;
pub mod source;
pub mod workspace;

pub use error::{Error, Result};
pub use server::{run_server, run_server_with_config, PdfServer, PdfSource, ServerConfig};
pub use workspace::{NamedOutput, Workspace, WorkspaceItem};
