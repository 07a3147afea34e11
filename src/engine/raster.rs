//! Rasterize-and-recompress pipeline
//!
//! Every page is rendered at `dpi / 72` pixels per point, re-encoded lossily
//! and appended to a fresh document as a single-image page with the source
//! page's box. Pages that cannot be rendered are skipped, not fatal.

use super::document::{
    Document, DocumentFactory, EncodedImage, ImageEncoder, ImageFormat, Page, PixelSize,
};
use super::observer::{BusyState, EngineObserver, EngineState, TracingObserver};
use crate::error::{Error, Result};
use image::codecs::jpeg::JpegEncoder as JpegCodec;
use image::DynamicImage;
use std::sync::Arc;

/// Lowest quality handed to the encoder
pub const MIN_QUALITY: f32 = 0.2;
/// Highest quality handed to the encoder
pub const MAX_QUALITY: f32 = 0.95;
pub const DEFAULT_DPI: f32 = 110.0;
pub const DEFAULT_QUALITY: f32 = 0.6;

/// Resolution and lossy quality for [`Rasterizer::rasterize`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterParams {
    /// Dots per inch; not bounded here
    pub dpi: f32,
    /// Encoder quality in `[0, 1]`, clamped before use
    pub quality: f32,
}

impl Default for RasterParams {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl RasterParams {
    pub fn new(dpi: f32, quality: f32) -> Self {
        Self { dpi, quality }
    }

    /// Quality clamped to `[MIN_QUALITY, MAX_QUALITY]`; NaN maps to the minimum.
    pub fn effective_quality(&self) -> f32 {
        if self.quality.is_nan() {
            MIN_QUALITY
        } else {
            self.quality.clamp(MIN_QUALITY, MAX_QUALITY)
        }
    }
}

/// Baseline JPEG encoder backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegEncoder;

impl JpegEncoder {
    /// Map a `[0, 1]` quality onto libjpeg's 1-100 scale.
    pub fn scale_quality(quality: f32) -> u8 {
        (quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl ImageEncoder for JpegEncoder {
    fn encode(&self, image: &DynamicImage, quality: f32) -> Result<EncodedImage> {
        // JPEG has no alpha channel
        let rgb = image.to_rgb8();
        let mut bytes = Vec::new();
        {
            let mut codec = JpegCodec::new_with_quality(&mut bytes, Self::scale_quality(quality));
            codec.encode_image(&rgb)?;
        }

        Ok(EncodedImage {
            bytes,
            size: PixelSize::new(rgb.width(), rgb.height()),
            quality,
            format: ImageFormat::Jpeg,
        })
    }
}

/// Result of a rasterization run
#[derive(Debug)]
pub struct RasterOutcome<D> {
    pub document: D,
    /// Zero-based indices of source pages left out of `document`
    pub skipped: Vec<usize>,
    /// Sum of the encoded image sizes
    pub encoded_bytes: usize,
}

/// Converts documents into image-only documents.
///
/// One run at a time per rasterizer: a second call while a run is in progress
/// fails with [`Error::Busy`]. Clones share the same busy state, so give each
/// document owner its own `Rasterizer` when unrelated documents are processed
/// concurrently.
#[derive(Clone)]
pub struct Rasterizer {
    busy: BusyState,
    observer: Arc<dyn EngineObserver>,
    encoder: Arc<dyn ImageEncoder>,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Rasterizer {
    /// JPEG output, notifications routed to `tracing`
    pub fn new() -> Self {
        Self::with_observer(Arc::new(TracingObserver))
    }

    pub fn with_observer(observer: Arc<dyn EngineObserver>) -> Self {
        Self {
            busy: BusyState::new(observer.clone()),
            observer,
            encoder: Arc::new(JpegEncoder),
        }
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn ImageEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn state(&self) -> EngineState {
        self.busy.current()
    }

    /// Rasterize every page of `document` into a new document.
    pub fn rasterize<F: DocumentFactory>(
        &self,
        factory: &F,
        document: &F::Document,
        params: RasterParams,
    ) -> Result<RasterOutcome<F::Document>> {
        let _busy = self.busy.enter()?;

        let quality = params.effective_quality();
        let mut output = factory.create()?;
        let mut skipped = Vec::new();
        let mut encoded_bytes = 0;

        for index in 0..document.page_count() {
            match self.rasterize_page(document, index, params.dpi, quality, &mut output) {
                Ok(len) => encoded_bytes += len,
                Err(e) => {
                    tracing::warn!(page = index + 1, error = %e, "skipping page that could not be rasterized");
                    skipped.push(index);
                }
            }
        }

        self.observer.on_event(&format!(
            "Rasterized {} of {} page(s) at {} dpi, quality {:.2}",
            output.page_count(),
            document.page_count(),
            params.dpi,
            quality
        ));

        Ok(RasterOutcome {
            document: output,
            skipped,
            encoded_bytes,
        })
    }

    fn rasterize_page<D: Document>(
        &self,
        document: &D,
        index: usize,
        dpi: f32,
        quality: f32,
        output: &mut D,
    ) -> Result<usize> {
        let page = document.page(index).ok_or(Error::PageOutOfBounds {
            index,
            total: document.page_count(),
        })?;

        let size = page.size();
        let target = PixelSize::for_page(size, dpi);
        let pixels = page.render(target)?;
        let encoded = self.encoder.encode(&pixels, quality)?;
        output.append_image_page(&encoded, size)?;

        Ok(encoded.bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::{MemoryDocument, MemoryFactory, MemoryPage, PageContent};
    use crate::engine::PageSize;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    /// Records the quality each encode call receives
    #[derive(Default)]
    struct RecordingEncoder {
        qualities: Mutex<Vec<f32>>,
    }

    impl ImageEncoder for RecordingEncoder {
        fn encode(&self, image: &DynamicImage, quality: f32) -> Result<EncodedImage> {
            self.qualities.lock().push(quality);
            JpegEncoder.encode(image, quality)
        }
    }

    fn small_doc() -> MemoryDocument {
        MemoryDocument::from_pages([
            MemoryPage::new("a", PageSize::new(72.0, 144.0)),
            MemoryPage::new("b", PageSize::new(36.0, 36.0)).with_fill([200, 0, 0]),
        ])
    }

    fn raster_pixels(doc: &MemoryDocument) -> Vec<PixelSize> {
        doc.pages()
            .iter()
            .map(|page| match page.content() {
                PageContent::Raster { pixels, .. } => *pixels,
                other => panic!("expected raster page, got {:?}", other),
            })
            .collect()
    }

    #[rstest]
    #[case(-1.0, MIN_QUALITY)]
    #[case(5.0, MAX_QUALITY)]
    #[case(0.6, 0.6)]
    #[case(f32::NAN, MIN_QUALITY)]
    fn test_effective_quality(#[case] quality: f32, #[case] expected: f32) {
        assert_eq!(RasterParams::new(72.0, quality).effective_quality(), expected);
    }

    #[test]
    fn test_scale_quality() {
        assert_eq!(JpegEncoder::scale_quality(0.2), 20);
        assert_eq!(JpegEncoder::scale_quality(0.95), 95);
        assert_eq!(JpegEncoder::scale_quality(0.0), 1);
    }

    #[test]
    fn test_jpeg_encoder_output_decodes() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            8,
            6,
            image::Rgb([1, 2, 3]),
        ));
        let encoded = JpegEncoder.encode(&image, 0.6).unwrap();

        assert_eq!(&encoded.bytes[..2], &[0xff, 0xd8]);
        assert_eq!(encoded.size, PixelSize::new(8, 6));
        let decoded = image::load_from_memory(&encoded.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }

    #[test]
    fn test_rasterize_pixel_sizes_follow_dpi() {
        let rasterizer = Rasterizer::new();
        let outcome = rasterizer
            .rasterize(&MemoryFactory, &small_doc(), RasterParams::new(144.0, 0.6))
            .unwrap();

        assert!(outcome.skipped.is_empty());
        assert_eq!(
            raster_pixels(&outcome.document),
            vec![PixelSize::new(144, 288), PixelSize::new(72, 72)]
        );
        // Page boxes are carried over unchanged
        assert_eq!(outcome.document.pages()[0].size(), PageSize::new(72.0, 144.0));
        assert!(outcome.encoded_bytes > 0);
    }

    #[test]
    fn test_rasterize_clamps_quality_for_encoder() {
        for (requested, expected) in [(-1.0, 0.2), (5.0, 0.95)] {
            let encoder = Arc::new(RecordingEncoder::default());
            let rasterizer = Rasterizer::new().with_encoder(encoder.clone());
            rasterizer
                .rasterize(&MemoryFactory, &small_doc(), RasterParams::new(36.0, requested))
                .unwrap();
            assert_eq!(*encoder.qualities.lock(), vec![expected, expected]);
        }
    }

    #[test]
    fn test_rasterize_skips_unrenderable_pages() {
        let doc = MemoryDocument::from_pages([
            MemoryPage::new("a", PageSize::new(72.0, 72.0)),
            MemoryPage::unrenderable("broken", PageSize::new(72.0, 72.0)),
            MemoryPage::new("c", PageSize::new(72.0, 72.0)),
        ]);
        let outcome = Rasterizer::new()
            .rasterize(&MemoryFactory, &doc, RasterParams::new(72.0, 0.5))
            .unwrap();

        assert_eq!(outcome.document.page_count(), 2);
        assert_eq!(outcome.skipped, vec![1]);
        assert_eq!(doc.page_count(), 3);
    }

    #[test]
    fn test_rasterize_empty_document() {
        let rasterizer = Rasterizer::new();
        let outcome = rasterizer
            .rasterize(&MemoryFactory, &MemoryDocument::new(), RasterParams::default())
            .unwrap();
        assert_eq!(outcome.document.page_count(), 0);
        assert_eq!(rasterizer.state(), EngineState::Idle);
    }

    #[test]
    fn test_rasterize_rejected_while_busy() {
        let rasterizer = Rasterizer::new();
        let _guard = rasterizer.busy.enter().unwrap();

        let result = rasterizer.rasterize(&MemoryFactory, &small_doc(), RasterParams::default());
        assert!(matches!(result, Err(Error::Busy)));
    }

    #[test]
    fn test_independent_rasterizers_run_concurrently() {
        /// Holds every encode call long enough for the runs to overlap
        struct SlowEncoder;

        impl ImageEncoder for SlowEncoder {
            fn encode(&self, image: &DynamicImage, quality: f32) -> Result<EncodedImage> {
                std::thread::sleep(std::time::Duration::from_millis(100));
                JpegEncoder.encode(image, quality)
            }
        }

        let barrier = std::sync::Barrier::new(2);
        let run = || {
            let rasterizer = Rasterizer::new().with_encoder(Arc::new(SlowEncoder));
            barrier.wait();
            rasterizer
                .rasterize(&MemoryFactory, &small_doc(), RasterParams::new(36.0, 0.6))
                .map(|outcome| outcome.document.page_count())
        };

        let (first, second) = std::thread::scope(|scope| {
            let first = scope.spawn(run);
            let second = scope.spawn(run);
            (first.join().unwrap(), second.join().unwrap())
        });

        assert_eq!(first.unwrap(), 2);
        assert_eq!(second.unwrap(), 2);
    }

    #[test]
    fn test_rasterize_reports_busy_transitions() {
        #[derive(Default)]
        struct Recorder {
            busy: Mutex<Vec<bool>>,
            events: Mutex<Vec<String>>,
        }

        impl EngineObserver for Recorder {
            fn on_busy_changed(&self, busy: bool) {
                self.busy.lock().push(busy);
            }

            fn on_event(&self, message: &str) {
                self.events.lock().push(message.to_string());
            }
        }

        let recorder = Arc::new(Recorder::default());
        let rasterizer = Rasterizer::with_observer(recorder.clone());
        rasterizer
            .rasterize(&MemoryFactory, &small_doc(), RasterParams::new(72.0, 0.6))
            .unwrap();

        assert_eq!(*recorder.busy.lock(), vec![true, false]);
        assert_eq!(
            *recorder.events.lock(),
            vec!["Rasterized 2 of 2 page(s) at 72 dpi, quality 0.60".to_string()]
        );
    }
}
