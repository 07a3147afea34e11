//! Page manipulation engine
//!
//! Backend-independent operations over [`Document`]s:
//! - range parsing and selection algebra
//! - deletion and extraction
//! - merging and fixed-size splitting
//! - rasterize-and-recompress
//!
//! Every operation runs synchronously on the calling thread.

mod combine;
mod document;
mod editor;
pub mod memory;
mod observer;
mod range;
mod raster;
mod selection;
mod split;

pub use combine::merge_all;
pub use document::{
    Document, DocumentFactory, EncodedImage, ImageEncoder, ImageFormat, Page, PageSize,
    PixelSize, POINTS_PER_INCH,
};
pub use editor::{delete_pages, extract_pages, DeleteOutcome, ExtractOutcome};
pub use observer::{BusyGuard, BusyState, EngineObserver, EngineState, TracingObserver};
pub use range::{parse_range, RangeSelection};
pub use raster::{
    JpegEncoder, RasterOutcome, RasterParams, Rasterizer, DEFAULT_DPI, DEFAULT_QUALITY,
    MAX_QUALITY, MIN_QUALITY,
};
pub use selection::SelectionSet;
pub use split::{split_every, MIN_SPLIT_SIZE};
