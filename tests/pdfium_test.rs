//! Integration tests against the PDFium backend
//!
//! Documents are built on the fly from JPEG pages of distinct widths, so the
//! page order of every result can be read back from the page boxes. Each test
//! returns early when the PDFium library cannot be bound.

use pdf_slicer::engine::{
    delete_pages, extract_pages, merge_all, split_every, Document, ImageEncoder, JpegEncoder,
    Page, PageSize, PixelSize, RasterParams, Rasterizer,
};
use pdf_slicer::pdf::{PdfiumBackend, PdfiumDocument};
use pretty_assertions::assert_eq;

const PAGE_HEIGHT: f32 = 200.0;

fn backend() -> Option<PdfiumBackend> {
    match PdfiumBackend::new() {
        Ok(backend) => Some(backend),
        Err(e) => {
            eprintln!("PDFium not available, skipping: {}", e);
            None
        }
    }
}

/// Deterministic high-entropy pixels so JPEG quality shows up in the size
fn noisy_image(width: u32, height: u32) -> image::DynamicImage {
    image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
        let n = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)).wrapping_mul(2_654_435_761);
        image::Rgb([(n >> 24) as u8, (n >> 16) as u8, (n >> 8) as u8])
    }))
}

/// Page `i` is `100 + 10 * i` points wide
fn build_document(backend: &PdfiumBackend, pages: usize) -> PdfiumDocument<'_> {
    let mut document = backend.create().unwrap();
    for i in 0..pages {
        let width = 100.0 + 10.0 * i as f32;
        let encoded = JpegEncoder
            .encode(&noisy_image(width as u32, PAGE_HEIGHT as u32), 0.9)
            .unwrap();
        document
            .append_image_page(&encoded, PageSize::new(width, PAGE_HEIGHT))
            .unwrap();
    }
    document
}

fn widths<D: Document>(document: &D) -> Vec<u32> {
    (0..document.page_count())
        .map(|i| document.page(i).unwrap().size().width.round() as u32)
        .collect()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[test]
fn test_saved_document_reopens() {
    let Some(backend) = backend() else { return };
    let document = build_document(&backend, 3);

    let bytes = document.to_bytes().unwrap();
    assert!(bytes.starts_with(b"%PDF"));

    let reopened = backend.open_bytes(bytes, None).unwrap();
    assert_eq!(widths(&reopened), vec![100, 110, 120]);
}

#[test]
fn test_delete_pages() {
    let Some(backend) = backend() else { return };
    let mut document = build_document(&backend, 5);

    let outcome = delete_pages(&mut document, [3, 1, 9]).unwrap();

    assert_eq!(outcome.removed, 2);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(widths(&document), vec![100, 120, 140]);
}

#[test]
fn test_extract_pages() {
    let Some(backend) = backend() else { return };
    let document = build_document(&backend, 5);

    let outcome = extract_pages(&&backend, &document, [4, 0, 2, 2]).unwrap();

    assert_eq!(widths(&outcome.document), vec![100, 120, 140]);
    assert_eq!(document.page_count(), 5);
}

#[test]
fn test_merge_all() {
    let Some(backend) = backend() else { return };
    let first = build_document(&backend, 3);
    let second = build_document(&backend, 2);

    let merged = merge_all(&&backend, [&first, &second]).unwrap();

    assert_eq!(widths(&merged), vec![100, 110, 120, 100, 110]);
}

#[test]
fn test_split_every() {
    let Some(backend) = backend() else { return };
    let document = build_document(&backend, 5);

    let parts = split_every(&&backend, &document, 2).unwrap();

    let layout: Vec<Vec<u32>> = parts.iter().map(widths).collect();
    assert_eq!(layout, vec![vec![100, 110], vec![120, 130], vec![140]]);
}

#[test]
fn test_render_hits_target_size() {
    let Some(backend) = backend() else { return };
    let document = build_document(&backend, 1);

    let page = document.page(0).unwrap();
    let target = PixelSize::for_page(page.size(), 144.0);
    let image = page.render(target).unwrap();

    assert_eq!((image.width(), image.height()), (200, 400));
}

#[test]
fn test_rasterize_keeps_page_boxes_and_embeds_jpeg() {
    let Some(backend) = backend() else { return };
    let document = build_document(&backend, 3);

    let outcome = Rasterizer::new()
        .rasterize(&&backend, &document, RasterParams::new(72.0, 0.6))
        .unwrap();

    assert!(outcome.skipped.is_empty());
    assert_eq!(widths(&outcome.document), vec![100, 110, 120]);
    let heights: Vec<u32> = (0..3)
        .map(|i| outcome.document.page(i).unwrap().size().height.round() as u32)
        .collect();
    assert_eq!(heights, vec![200, 200, 200]);

    let bytes = outcome.document.to_bytes().unwrap();
    assert!(contains(&bytes, b"/DCTDecode"));
}

#[test]
fn test_lower_quality_gives_smaller_output() {
    let Some(backend) = backend() else { return };
    let document = build_document(&backend, 2);

    let size_at = |quality: f32| {
        Rasterizer::new()
            .rasterize(&&backend, &document, RasterParams::new(144.0, quality))
            .unwrap()
            .document
            .to_bytes()
            .unwrap()
            .len()
    };

    let low = size_at(0.2);
    let high = size_at(0.95);
    assert!(low < high, "quality 0.2 gave {} bytes, 0.95 gave {}", low, high);
}
