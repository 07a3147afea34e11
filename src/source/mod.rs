//! Source resolution and caching

pub mod cache;
pub mod resolver;

pub use cache::{CachedDocument, DocumentCache};
pub use resolver::{file_stem, resolve_base64, resolve_cache, resolve_path, ResolvedPdf};
