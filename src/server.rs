//! MCP Server implementation using rmcp

use crate::engine::{
    delete_pages, extract_pages, merge_all, parse_range, split_every, Document, Page, PixelSize,
    RasterParams, Rasterizer, SelectionSet, DEFAULT_DPI, DEFAULT_QUALITY, MIN_SPLIT_SIZE,
};
use crate::error::Error;
use crate::pdf::{PdfiumBackend, QpdfWrapper};
use crate::source::{
    resolve_base64, resolve_cache, resolve_path, CachedDocument, DocumentCache, ResolvedPdf,
};
use crate::workspace::{compressed_name, extract_name, part_name, MERGED_NAME};
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Largest chunk size accepted by `split_pdf`
pub const MAX_SPLIT_SIZE: u32 = 200;

const ENV_RESOURCE_DIRS: &str = "PDF_SLICER_RESOURCE_DIRS";
const ENV_EXPORT_DIR: &str = "PDF_SLICER_EXPORT_DIR";
const ENV_MAX_DPI: &str = "PDF_SLICER_MAX_DPI";
const ENV_MAX_PAGES: &str = "PDF_SLICER_MAX_PAGES";

/// PDF source specification
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PdfSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the PDF file
        path: String,
    },
    /// Base64 encoded PDF data
    Base64 {
        /// Base64 encoded PDF content
        base64: String,
    },
    /// Reference to a PDF produced by an earlier call
    CacheRef {
        /// Cache key from previous operation
        cache_key: String,
    },
}

impl<'de> serde::Deserialize<'de> for PdfSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        let Some(obj) = value.as_object() else {
            return Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\", \"base64\", or \"cache_key\", but got {}",
                match &value {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    serde_json::Value::Null => "null",
                    _ => "unknown type",
                }
            )));
        };

        let string_field = |key: &str| -> std::result::Result<Option<String>, D::Error> {
            match obj.get(key) {
                None => Ok(None),
                Some(v) => v.as_str().map(|s| Some(s.to_string())).ok_or_else(|| {
                    serde::de::Error::custom(format!("\"{}\" must be a string", key))
                }),
            }
        };

        if let Some(path) = string_field("path")? {
            return Ok(PdfSource::Path { path });
        }
        if let Some(base64) = string_field("base64")? {
            return Ok(PdfSource::Base64 { base64 });
        }
        if let Some(cache_key) = string_field("cache_key")? {
            return Ok(PdfSource::CacheRef { cache_key });
        }

        let keys: Vec<&String> = obj.keys().collect();
        Err(serde::de::Error::custom(format!(
            "Invalid source: expected an object with one of \"path\", \"base64\", or \"cache_key\", but got keys: {:?}",
            keys
        )))
    }
}

/// Security and resource configuration for the PDF Slicer server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories that path sources and output paths must stay within.
    /// Empty means unrestricted.
    pub resource_dirs: Vec<String>,
    /// Folder every produced PDF is written to when no output path is given
    pub export_dir: Option<String>,
    /// Maximum total bytes in cache (default: 512MB)
    pub cache_max_bytes: usize,
    /// Maximum number of cache entries (default: 100)
    pub cache_max_entries: usize,
    /// Upper bound for `rasterize_pdf` dpi (default: 600)
    pub max_dpi: f32,
    /// Maximum pixel area of a single rasterized page (default: 100_000_000)
    pub max_image_pixels: u64,
    /// Largest page count `select_pages` works on (default: 100_000)
    pub max_pages: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            export_dir: None,
            cache_max_bytes: 512 * 1024 * 1024, // 512MB
            cache_max_entries: 100,
            max_dpi: 600.0,
            max_image_pixels: 100_000_000,
            max_pages: 100_000,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `PDF_SLICER_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<std::ffi::OsString>,
    {
        let mut config = Self::default();

        if let Some(dirs) = lookup(ENV_RESOURCE_DIRS) {
            config.resource_dirs = std::env::split_paths(&dirs)
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.display().to_string())
                .collect();
        }

        if let Some(dir) = lookup(ENV_EXPORT_DIR).filter(|d| !d.is_empty()) {
            config.export_dir = Some(PathBuf::from(dir).display().to_string());
        }

        if let Some(raw) = lookup(ENV_MAX_DPI) {
            match raw.to_string_lossy().trim().parse::<f32>() {
                Ok(dpi) if dpi.is_finite() && dpi > 0.0 => config.max_dpi = dpi,
                _ => tracing::warn!(
                    value = %raw.to_string_lossy(),
                    "ignoring invalid {}",
                    ENV_MAX_DPI
                ),
            }
        }

        if let Some(raw) = lookup(ENV_MAX_PAGES) {
            match raw.to_string_lossy().trim().parse::<u32>() {
                Ok(pages) if pages > 0 => config.max_pages = pages,
                _ => tracing::warn!(
                    value = %raw.to_string_lossy(),
                    "ignoring invalid {}",
                    ENV_MAX_PAGES
                ),
            }
        }

        config
    }
}

/// PDF Slicer MCP Server
#[derive(Clone)]
pub struct PdfServer {
    cache: Arc<DocumentCache>,
    tool_router: ToolRouter<Self>,
    /// Server configuration
    config: Arc<ServerConfig>,
}

fn default_true() -> bool {
    true
}

fn default_split_every() -> u32 {
    10
}

fn default_dpi() -> f32 {
    DEFAULT_DPI
}

fn default_quality() -> f32 {
    DEFAULT_QUALITY
}

// ============================================================================
// Request/Response types for select_pages
// ============================================================================

/// Selection change applied by `select_pages`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SelectAction {
    /// Select every page
    All,
    /// Clear the selection
    None,
    /// Select exactly the pages that are not selected
    Invert,
    /// Add the pages named by `range`
    Range,
    /// Flip `page`
    Toggle,
    /// Select `page` alone
    Only,
    /// Deselect `page`
    Exclude,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SelectPagesParams {
    /// Page count of the document. Takes precedence over `source`.
    #[serde(default)]
    pub page_count: Option<u32>,
    /// PDF to count pages from when `page_count` is absent
    #[serde(default)]
    pub source: Option<PdfSource>,
    /// Current selection as 1-based page numbers
    #[serde(default)]
    pub selection: Vec<u32>,
    /// Change to apply
    pub action: SelectAction,
    /// Page range for `range`, e.g. "1-3,5,10-12". Reversed spans ("5-2") are
    /// accepted; tokens that select nothing are dropped and counted.
    #[serde(default)]
    pub range: Option<String>,
    /// 1-based page for `toggle`, `only` and `exclude`
    #[serde(default)]
    pub page: Option<u32>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SelectPagesResult {
    pub page_count: u32,
    /// Resulting selection, 1-based and ascending
    pub selection: Vec<u32>,
    /// Range tokens that selected nothing
    pub dropped_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for delete_pages / extract_pages
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeletePagesParams {
    /// Source PDF
    pub source: PdfSource,
    /// Pages to delete, e.g. "2,4-6"
    pub pages: String,
    /// Output file path (optional). If provided, saves PDF to this path.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct DeletePagesResult {
    /// Source identifier
    pub source: String,
    /// Cache key for the output PDF
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cache_key: Option<String>,
    pub output_page_count: u32,
    /// Pages removed
    pub removed: usize,
    /// Selected pages that did not exist
    pub skipped: usize,
    /// Range tokens that selected nothing
    pub dropped_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractPagesParams {
    /// Source PDF
    pub source: PdfSource,
    /// Pages to copy, e.g. "1-3,7". Output keeps source order.
    pub pages: String,
    /// Output file path (optional). If provided, saves PDF to this path.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ExtractPagesResult {
    /// Source identifier
    pub source: String,
    /// Suggested file name (`<stem>_extract.pdf`)
    pub name: String,
    /// Cache key for the output PDF
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cache_key: Option<String>,
    pub output_page_count: u32,
    /// Selected pages that did not exist
    pub skipped: usize,
    /// Range tokens that selected nothing
    pub dropped_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for merge_pdfs / split_pdf
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MergePdfsParams {
    /// PDFs to merge, in order
    pub sources: Vec<PdfSource>,
    /// Output file path (optional). If provided, saves PDF to this path.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Password tried on every encrypted source
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct MergePdfsResult {
    pub source_count: u32,
    /// Suggested file name
    pub name: String,
    /// Cache key for the output PDF
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cache_key: Option<String>,
    pub output_page_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SplitPdfParams {
    /// Source PDF to split
    pub source: PdfSource,
    /// Pages per part, between 2 and 200 (default: 10)
    #[serde(default = "default_split_every")]
    pub every: u32,
    /// Directory to write the parts to (optional)
    #[serde(default)]
    pub output_dir: Option<String>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SplitPart {
    /// Suggested file name (`<stem>_part_NN.pdf`)
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    pub page_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SplitPdfResult {
    /// Source identifier
    pub source: String,
    pub parts: Vec<SplitPart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for rasterize_pdf / optimize_pdf
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RasterizePdfParams {
    /// Source PDF
    pub source: PdfSource,
    /// Render resolution in dots per inch (default: 110)
    #[serde(default = "default_dpi")]
    pub dpi: f32,
    /// JPEG quality from 0 to 1, clamped to 0.2..=0.95 (default: 0.6)
    #[serde(default = "default_quality")]
    pub quality: f32,
    /// Run a qpdf optimisation pass on the result (default: true)
    #[serde(default = "default_true")]
    pub optimize: bool,
    /// Output file path (optional). If provided, saves PDF to this path.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct RasterizePdfResult {
    /// Source identifier
    pub source: String,
    /// Suggested file name (`<stem>_compressed.pdf`)
    pub name: String,
    /// Cache key for the output PDF
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cache_key: Option<String>,
    pub original_size: usize,
    pub output_size: usize,
    pub output_page_count: u32,
    /// Quality actually handed to the encoder
    pub quality: f32,
    /// 1-based pages that could not be rendered and were left out
    pub skipped_pages: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OptimizePdfParams {
    /// Source PDF
    pub source: PdfSource,
    /// Output file path (optional). If provided, saves PDF to this path.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct OptimizePdfResult {
    /// Source identifier
    pub source: String,
    /// Cache key for the output PDF
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cache_key: Option<String>,
    pub original_size: usize,
    pub optimized_size: usize,
    pub output_page_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run PDF work on the blocking pool; PDFium is bound per call.
async fn run_blocking<T, F>(work: F) -> crate::error::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Pdfium {
            reason: format!("Task join error: {}", e),
        })?
}

fn page_count_u32(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

fn render_response<T: Serialize>(results: &[T]) -> String {
    let response = serde_json::json!({ "results": results });
    serde_json::to_string_pretty(&response).unwrap_or_default()
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl PdfServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new PdfServer with full configuration
    pub fn with_config(config: ServerConfig) -> Self {
        let cache = DocumentCache::new(config.cache_max_entries, config.cache_max_bytes);
        Self {
            cache: Arc::new(cache),
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    /// Apply a selection change
    #[tool(
        description = "Compute a page selection. Pass the current selection (1-based page numbers) and an action: all, none, invert, range (adds the pages in `range`, e.g. \"1-3,5,10-12\"), toggle, only or exclude (use `page`). Either give `page_count` or a `source` to count pages from. Tokens that select nothing are dropped and counted, never fatal.

Source format: {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn select_pages(&self, Parameters(params): Parameters<SelectPagesParams>) -> String {
        let result = self.process_select_pages(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "select_pages failed");
            SelectPagesResult {
                page_count: params.page_count.unwrap_or(0),
                selection: params.selection.clone(),
                dropped_tokens: 0,
                error: Some(e.client_message()),
            }
        });

        render_response(&[result])
    }

    /// Delete pages from a PDF
    #[tool(
        description = "Delete pages from a PDF. `pages` is a range like \"2,4-6\"; pages past the end are skipped and counted. The output is always cached (output_cache_key) for chaining with other tools.

Source format: {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn delete_pages(&self, Parameters(params): Parameters<DeletePagesParams>) -> String {
        let result = self.process_delete_pages(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "delete_pages failed");
            DeletePagesResult {
                source: Self::source_name(&params.source),
                output_cache_key: None,
                output_page_count: 0,
                removed: 0,
                skipped: 0,
                dropped_tokens: 0,
                output_path: None,
                error: Some(e.client_message()),
            }
        });

        render_response(&[result])
    }

    /// Extract pages into a new PDF
    #[tool(
        description = "Copy pages of a PDF into a new PDF named <stem>_extract.pdf. Pages keep their source order whatever order the range lists them in. The output is always cached (output_cache_key) for chaining with other tools.

Source format: {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn extract_pages(&self, Parameters(params): Parameters<ExtractPagesParams>) -> String {
        let result = self.process_extract_pages(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "extract_pages failed");
            ExtractPagesResult {
                source: Self::source_name(&params.source),
                name: String::new(),
                output_cache_key: None,
                output_page_count: 0,
                skipped: 0,
                dropped_tokens: 0,
                output_path: None,
                error: Some(e.client_message()),
            }
        });

        render_response(&[result])
    }

    /// Merge multiple PDFs into one
    #[tool(
        description = "Merge PDFs into a single Merged.pdf, in the order given. The output is always cached (output_cache_key) for chaining with other tools.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn merge_pdfs(&self, Parameters(params): Parameters<MergePdfsParams>) -> String {
        let result = self.process_merge_pdfs(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "merge_pdfs failed");
            MergePdfsResult {
                source_count: params.sources.len() as u32,
                name: MERGED_NAME.to_string(),
                output_cache_key: None,
                output_page_count: 0,
                output_path: None,
                error: Some(e.client_message()),
            }
        });

        render_response(&[result])
    }

    /// Split a PDF into fixed-size parts
    #[tool(
        description = "Split a PDF into parts of `every` pages (2 to 200, default 10); the last part holds the remainder. Parts are named <stem>_part_01.pdf, <stem>_part_02.pdf, ... and each is cached.

Source format: {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn split_pdf(&self, Parameters(params): Parameters<SplitPdfParams>) -> String {
        let result = self.process_split_pdf(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "split_pdf failed");
            SplitPdfResult {
                source: Self::source_name(&params.source),
                parts: vec![],
                error: Some(e.client_message()),
            }
        });

        render_response(&[result])
    }

    /// Rasterize and recompress a PDF
    #[tool(
        description = "Shrink a PDF by rendering every page to a JPEG at `dpi` (default 110) and `quality` (0-1, clamped to 0.2-0.95, default 0.6), then rebuilding it as image-only pages with the original page sizes. Text stops being selectable. Pages that fail to render are skipped and reported. Only one rasterization runs at a time; a concurrent call fails with a busy error.

Source format: {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn rasterize_pdf(&self, Parameters(params): Parameters<RasterizePdfParams>) -> String {
        let result = self.process_rasterize_pdf(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "rasterize_pdf failed");
            RasterizePdfResult {
                source: Self::source_name(&params.source),
                name: String::new(),
                output_cache_key: None,
                original_size: 0,
                output_size: 0,
                output_page_count: 0,
                quality: RasterParams::new(params.dpi, params.quality).effective_quality(),
                skipped_pages: vec![],
                output_path: None,
                error: Some(e.client_message()),
            }
        });

        render_response(&[result])
    }

    /// Lossless optimisation pass
    #[tool(
        description = "Rewrite a PDF with object streams and compressed content streams, dropping unreferenced objects. Lossless; page content is unchanged.

Source format: {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn optimize_pdf(&self, Parameters(params): Parameters<OptimizePdfParams>) -> String {
        let result = self.process_optimize_pdf(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "optimize_pdf failed");
            OptimizePdfResult {
                source: Self::source_name(&params.source),
                output_cache_key: None,
                original_size: 0,
                optimized_size: 0,
                output_page_count: 0,
                output_path: None,
                error: Some(e.client_message()),
            }
        });

        render_response(&[result])
    }
}

impl PdfServer {
    fn source_name(source: &PdfSource) -> String {
        match source {
            PdfSource::Path { path } => path.clone(),
            PdfSource::Base64 { .. } => "<base64>".to_string(),
            PdfSource::CacheRef { cache_key } => format!("<cache:{}>", cache_key),
        }
    }

    fn resolve_source(&self, source: &PdfSource) -> crate::error::Result<ResolvedPdf> {
        match source {
            PdfSource::Path { path } => {
                let path = self.validate_path_access(path)?;
                resolve_path(path)
            }
            PdfSource::Base64 { base64 } => resolve_base64(base64),
            PdfSource::CacheRef { cache_key } => resolve_cache(cache_key, &self.cache),
        }
    }

    /// Validate that a path is within allowed resource directories.
    /// If no resource_dirs are configured, all paths are allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let canonical = std::fs::canonicalize(path).map_err(|_| Error::PathAccessDenied {
            path: path.to_string(),
        })?;

        self.ensure_within_resource_dirs(canonical, path)
    }

    /// Validate that an output path is within allowed resource directories.
    /// Canonicalizes the parent directory since the output file may not exist yet.
    fn validate_output_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let path_obj = Path::new(path);
        let parent = match path_obj.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let file_name = path_obj.file_name().ok_or_else(|| Error::PathAccessDenied {
            path: path.to_string(),
        })?;

        let canonical_parent =
            std::fs::canonicalize(parent).map_err(|_| Error::PathAccessDenied {
                path: path.to_string(),
            })?;

        self.ensure_within_resource_dirs(canonical_parent.join(file_name), path)
    }

    fn ensure_within_resource_dirs(
        &self,
        canonical: PathBuf,
        requested: &str,
    ) -> crate::error::Result<PathBuf> {
        let allowed = self.config.resource_dirs.iter().any(|dir| {
            std::fs::canonicalize(dir)
                .map(|cd| canonical.starts_with(&cd))
                .unwrap_or(false)
        });

        if allowed {
            Ok(canonical)
        } else {
            Err(Error::PathAccessDenied {
                path: requested.to_string(),
            })
        }
    }

    /// Write output to `output_path` when given, else into the configured
    /// export folder under `name`. Returns the written path.
    fn write_output(
        &self,
        output_path: Option<&str>,
        name: &str,
        data: &[u8],
    ) -> crate::error::Result<Option<String>> {
        let path = match (output_path, &self.config.export_dir) {
            (Some(requested), _) => self.validate_output_path_access(requested)?,
            (None, Some(dir)) => Path::new(dir).join(name),
            (None, None) => return Ok(None),
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(&path, data)?;
        tracing::info!(path = %path.display(), bytes = data.len(), "saved output");
        Ok(Some(path.display().to_string()))
    }

    /// Cache the output for chaining; `None` when it exceeds the cache budget
    fn cache_output(&self, data: &[u8], name: &str) -> Option<String> {
        let key = self.cache.insert(CachedDocument::new(data.to_vec(), name));
        if key.is_none() {
            tracing::warn!(name, bytes = data.len(), "output too large to cache");
        }
        key
    }

    async fn process_select_pages(
        &self,
        params: &SelectPagesParams,
    ) -> crate::error::Result<SelectPagesResult> {
        let page_count = match (params.page_count, &params.source) {
            (Some(count), _) => count,
            (None, Some(source)) => {
                let resolved = self.resolve_source(source)?;
                let password = params.password.clone();
                run_blocking(move || {
                    QpdfWrapper::get_page_count(&resolved.data, password.as_deref())
                })
                .await?
            }
            (None, None) => {
                return Err(Error::InvalidArgument {
                    reason: "either page_count or source is required".to_string(),
                })
            }
        };

        if page_count > self.config.max_pages {
            return Err(Error::InvalidArgument {
                reason: format!(
                    "page_count must be at most {}, got {}",
                    self.config.max_pages, page_count
                ),
            });
        }

        let params = params.clone();
        let (selection, dropped_tokens) =
            run_blocking(move || apply_selection(&params, page_count as usize)).await?;

        Ok(SelectPagesResult {
            page_count,
            selection: selection.page_numbers(),
            dropped_tokens,
            error: None,
        })
    }

    async fn process_delete_pages(
        &self,
        params: &DeletePagesParams,
    ) -> crate::error::Result<DeletePagesResult> {
        let resolved = self.resolve_source(&params.source)?;
        let source_name = resolved.source_name.clone();
        let name = format!("{}.pdf", resolved.stem);

        let data = resolved.data;
        let pages = params.pages.clone();
        let password = params.password.clone();

        let (output_data, output_page_count, outcome, dropped_tokens) =
            run_blocking(move || {
                let backend = PdfiumBackend::new()?;
                let mut document = backend.open_bytes(data, password.as_deref())?;

                let range = parse_range(&pages, document.page_count());
                if range.indices.is_empty() {
                    return Err(Error::InvalidPageRange { range: pages });
                }

                let outcome = delete_pages(&mut document, range.indices)?;
                let output_data = document.to_bytes()?;
                Ok((
                    output_data,
                    page_count_u32(document.page_count()),
                    outcome,
                    range.dropped,
                ))
            })
            .await?;

        let output_cache_key = self.cache_output(&output_data, &name);
        let output_path = self.write_output(params.output_path.as_deref(), &name, &output_data)?;

        Ok(DeletePagesResult {
            source: source_name,
            output_cache_key,
            output_page_count,
            removed: outcome.removed,
            skipped: outcome.skipped,
            dropped_tokens,
            output_path,
            error: None,
        })
    }

    async fn process_extract_pages(
        &self,
        params: &ExtractPagesParams,
    ) -> crate::error::Result<ExtractPagesResult> {
        let resolved = self.resolve_source(&params.source)?;
        let source_name = resolved.source_name.clone();
        let name = extract_name(&resolved.stem);

        let data = resolved.data;
        let pages = params.pages.clone();
        let password = params.password.clone();

        let (output_data, output_page_count, skipped, dropped_tokens) = run_blocking(move || {
            let backend = PdfiumBackend::new()?;
            let document = backend.open_bytes(data, password.as_deref())?;

            let range = parse_range(&pages, document.page_count());
            if range.indices.is_empty() {
                return Err(Error::InvalidPageRange { range: pages });
            }

            let outcome = extract_pages(&&backend, &document, range.indices)?;
            let output_data = outcome.document.to_bytes()?;
            Ok((
                output_data,
                page_count_u32(outcome.document.page_count()),
                outcome.skipped,
                range.dropped,
            ))
        })
        .await?;

        let output_cache_key = self.cache_output(&output_data, &name);
        let output_path = self.write_output(params.output_path.as_deref(), &name, &output_data)?;

        Ok(ExtractPagesResult {
            source: source_name,
            name,
            output_cache_key,
            output_page_count,
            skipped,
            dropped_tokens,
            output_path,
            error: None,
        })
    }

    async fn process_merge_pdfs(
        &self,
        params: &MergePdfsParams,
    ) -> crate::error::Result<MergePdfsResult> {
        if params.sources.is_empty() {
            return Err(Error::InvalidArgument {
                reason: "No PDF sources provided".to_string(),
            });
        }

        let inputs = params
            .sources
            .iter()
            .map(|source| self.resolve_source(source).map(|resolved| resolved.data))
            .collect::<crate::error::Result<Vec<_>>>()?;

        let password = params.password.clone();

        let (output_data, output_page_count) = run_blocking(move || {
            let backend = PdfiumBackend::new()?;
            let documents = inputs
                .into_iter()
                .map(|data| backend.open_bytes(data, password.as_deref()))
                .collect::<crate::error::Result<Vec<_>>>()?;

            let merged = merge_all(&&backend, &documents)?;
            Ok((merged.to_bytes()?, page_count_u32(merged.page_count())))
        })
        .await?;

        let output_cache_key = self.cache_output(&output_data, MERGED_NAME);
        let output_path =
            self.write_output(params.output_path.as_deref(), MERGED_NAME, &output_data)?;

        Ok(MergePdfsResult {
            source_count: params.sources.len() as u32,
            name: MERGED_NAME.to_string(),
            output_cache_key,
            output_page_count,
            output_path,
            error: None,
        })
    }

    async fn process_split_pdf(
        &self,
        params: &SplitPdfParams,
    ) -> crate::error::Result<SplitPdfResult> {
        if !(MIN_SPLIT_SIZE as u32..=MAX_SPLIT_SIZE).contains(&params.every) {
            return Err(Error::InvalidArgument {
                reason: format!(
                    "every must be between {} and {}, got {}",
                    MIN_SPLIT_SIZE, MAX_SPLIT_SIZE, params.every
                ),
            });
        }

        let resolved = self.resolve_source(&params.source)?;
        let source_name = resolved.source_name.clone();
        let stem = resolved.stem.clone();

        let data = resolved.data;
        let every = params.every as usize;
        let password = params.password.clone();

        let chunks = run_blocking(move || {
            let backend = PdfiumBackend::new()?;
            let document = backend.open_bytes(data, password.as_deref())?;

            let parts = split_every(&&backend, &document, every)?;
            let chunks = parts
                .iter()
                .map(|part| Ok((part.to_bytes()?, page_count_u32(part.page_count()))))
                .collect::<crate::error::Result<Vec<_>>>()?;
            Ok(chunks)
        })
        .await?;

        let mut parts = Vec::with_capacity(chunks.len());
        for (i, (part_data, page_count)) in chunks.into_iter().enumerate() {
            let name = part_name(&stem, i + 1);
            let requested = params
                .output_dir
                .as_deref()
                .map(|dir| Path::new(dir).join(&name).display().to_string());

            parts.push(SplitPart {
                cache_key: self.cache_output(&part_data, &name),
                output_path: self.write_output(requested.as_deref(), &name, &part_data)?,
                name,
                page_count,
            });
        }

        Ok(SplitPdfResult {
            source: source_name,
            parts,
            error: None,
        })
    }

    async fn process_rasterize_pdf(
        &self,
        params: &RasterizePdfParams,
    ) -> crate::error::Result<RasterizePdfResult> {
        if !(params.dpi > 0.0 && params.dpi <= self.config.max_dpi) {
            return Err(Error::InvalidArgument {
                reason: format!(
                    "dpi must be between 0 (exclusive) and {} (inclusive), got {}",
                    self.config.max_dpi, params.dpi
                ),
            });
        }

        let resolved = self.resolve_source(&params.source)?;
        let source_name = resolved.source_name.clone();
        let name = compressed_name(&resolved.stem);
        let original_size = resolved.data.len();

        let data = resolved.data;
        let raster_params = RasterParams::new(params.dpi, params.quality);
        let password = params.password.clone();
        let optimize = params.optimize;
        let max_pixels = self.config.max_image_pixels;
        let (output_data, output_page_count, skipped) = run_blocking(move || {
            let backend = PdfiumBackend::new()?;
            let document = backend.open_bytes(data, password.as_deref())?;

            check_pixel_budget(&document, raster_params.dpi, max_pixels)?;

            // Busy state is scoped to this request's document
            let outcome = Rasterizer::new().rasterize(&&backend, &document, raster_params)?;
            let mut output_data = outcome.document.to_bytes()?;

            if optimize {
                match QpdfWrapper::optimize(&output_data, None) {
                    Ok(optimized) if optimized.len() < output_data.len() => {
                        output_data = optimized
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "keeping unoptimized output"),
                }
            }

            Ok((
                output_data,
                page_count_u32(outcome.document.page_count()),
                outcome.skipped,
            ))
        })
        .await?;

        let output_cache_key = self.cache_output(&output_data, &name);
        let output_path = self.write_output(params.output_path.as_deref(), &name, &output_data)?;

        Ok(RasterizePdfResult {
            source: source_name,
            name,
            output_cache_key,
            original_size,
            output_size: output_data.len(),
            output_page_count,
            quality: raster_params.effective_quality(),
            skipped_pages: skipped.into_iter().map(|i| page_count_u32(i + 1)).collect(),
            output_path,
            error: None,
        })
    }

    async fn process_optimize_pdf(
        &self,
        params: &OptimizePdfParams,
    ) -> crate::error::Result<OptimizePdfResult> {
        let resolved = self.resolve_source(&params.source)?;
        let source_name = resolved.source_name.clone();
        let name = format!("{}.pdf", resolved.stem);
        let original_size = resolved.data.len();

        let data = resolved.data;
        let password = params.password.clone();

        let (output_data, output_page_count) = run_blocking(move || {
            let output_data = QpdfWrapper::optimize(&data, password.as_deref())?;
            let output_page_count = QpdfWrapper::get_page_count(&output_data, None)?;
            Ok((output_data, output_page_count))
        })
        .await?;

        let output_cache_key = self.cache_output(&output_data, &name);
        let output_path = self.write_output(params.output_path.as_deref(), &name, &output_data)?;

        Ok(OptimizePdfResult {
            source: source_name,
            output_cache_key,
            original_size,
            optimized_size: output_data.len(),
            output_page_count,
            output_path,
            error: None,
        })
    }
}

/// Apply `params.action` to the seeded selection. Returns the new selection
/// and the dropped range token count.
fn apply_selection(
    params: &SelectPagesParams,
    page_count: usize,
) -> crate::error::Result<(SelectionSet, usize)> {
    let mut selection: SelectionSet = params
        .selection
        .iter()
        .filter_map(|&page| (page as usize).checked_sub(1))
        .filter(|&index| index < page_count)
        .collect();

    let page_index = || -> crate::error::Result<usize> {
        params
            .page
            .and_then(|page| (page as usize).checked_sub(1))
            .filter(|&index| index < page_count)
            .ok_or_else(|| Error::InvalidArgument {
                reason: format!("page must be between 1 and {}", page_count),
            })
    };

    let mut dropped = 0;
    match params.action {
        SelectAction::All => selection.select_all(page_count),
        SelectAction::None => selection.select_none(),
        SelectAction::Invert => selection.invert(page_count),
        SelectAction::Range => {
            let range = params.range.as_deref().ok_or_else(|| Error::InvalidArgument {
                reason: "range is required for the range action".to_string(),
            })?;
            dropped = selection.union_range(range, page_count);
        }
        SelectAction::Toggle => selection.toggle(page_index()?, page_count),
        SelectAction::Only => selection.select_only(page_index()?, page_count),
        SelectAction::Exclude => selection.exclude(page_index()?),
    }

    Ok((selection, dropped))
}

/// Reject a dpi that would render any page past `max_pixels`
fn check_pixel_budget<D: Document>(
    document: &D,
    dpi: f32,
    max_pixels: u64,
) -> crate::error::Result<()> {
    for index in 0..document.page_count() {
        let Some(page) = document.page(index) else {
            continue;
        };
        let target = PixelSize::for_page(page.size(), dpi);
        if target.area() > max_pixels {
            return Err(Error::ImageDimensionExceeded {
                detail: format!(
                    "page {} at {} dpi is {}x{} = {} pixels, maximum is {}",
                    index + 1,
                    dpi,
                    target.width,
                    target.height,
                    target.area(),
                    max_pixels
                ),
            });
        }
    }
    Ok(())
}

impl Default for PdfServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for PdfServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "PDF Slicer selects, deletes, extracts, merges, splits and rasterizes PDF pages. \
                 Every produced PDF is cached; pass {\"cache_key\": ...} to chain tools."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with the default configuration
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    if let Some(dir) = &config.export_dir {
        tracing::info!(export_dir = %dir, "writing outputs to export folder");
    }

    let server = PdfServer::with_config(config);

    tracing::info!("PDF Slicer ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
