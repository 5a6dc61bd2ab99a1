//! End-to-end integration tests for pdf2img.
//!
//! Most tests drive the full conversion loop through [`FakeEngine`], an
//! in-process `PdfEngine` that needs no native library. Tests that need a
//! real pdfium build are gated behind the `E2E_ENABLED` environment variable
//! so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/libpdfium cargo test --test e2e -- --nocapture

use image::{Rgba, RgbaImage};
use pdf2img::{
    ConversionOptions, ConversionProgressCallback, JpegSettings, NoopProgressCallback,
    OutputFormat, PageSelector, Pdf2Img, Pdf2ImgError, PdfDocumentHandle, PdfEngine,
    PdfPageHandle, PngSettings, RasterSurface, Viewport, ViewportScale,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// In-memory engine with letter-sized pages.
///
/// Accepts any byte stream starting with `%PDF`. Records every page fetch
/// and, when `watch_dir` is set, whether the previous page's file was
/// already on disk at the time of the fetch.
struct FakeEngine {
    page_count: usize,
    fail_on: Option<usize>,
    watch_dir: Option<PathBuf>,
    fetched: Mutex<Vec<usize>>,
    previous_file_ready: Mutex<Vec<bool>>,
}

impl FakeEngine {
    fn new(page_count: usize) -> Self {
        Self {
            page_count,
            fail_on: None,
            watch_dir: None,
            fetched: Mutex::new(Vec::new()),
            previous_file_ready: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(mut self, page: usize) -> Self {
        self.fail_on = Some(page);
        self
    }

    fn watching(mut self, dir: &Path) -> Self {
        self.watch_dir = Some(dir.to_path_buf());
        self
    }

    fn fetched(&self) -> Vec<usize> {
        self.fetched.lock().unwrap().clone()
    }
}

struct FakeDocument<'a> {
    engine: &'a FakeEngine,
}

struct FakePage<'a> {
    engine: &'a FakeEngine,
    number: usize,
}

impl PdfEngine for FakeEngine {
    fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn PdfDocumentHandle + 'a>, Pdf2ImgError> {
        if !bytes.starts_with(b"%PDF") {
            return Err(Pdf2ImgError::CorruptPdf {
                detail: "missing %PDF header".into(),
            });
        }
        Ok(Box::new(FakeDocument { engine: self }))
    }
}

impl PdfDocumentHandle for FakeDocument<'_> {
    fn page_count(&self) -> usize {
        self.engine.page_count
    }

    fn page(&self, number: usize) -> Result<Box<dyn PdfPageHandle + '_>, Pdf2ImgError> {
        assert!(number >= 1 && number <= self.engine.page_count);
        self.engine.fetched.lock().unwrap().push(number);

        if let Some(ref dir) = self.engine.watch_dir {
            let ready = number == 1
                || std::fs::metadata(dir.join(format!("page-{}.png", number - 1)))
                    .map(|m| m.len() > 0)
                    .unwrap_or(false);
            self.engine.previous_file_ready.lock().unwrap().push(ready);
        }

        Ok(Box::new(FakePage {
            engine: self.engine,
            number,
        }))
    }
}

impl PdfPageHandle for FakePage<'_> {
    fn size(&self) -> (f32, f32) {
        (612.0, 792.0)
    }

    fn paint(&self, surface: &mut RasterSurface, _viewport: &Viewport) -> Result<(), Pdf2ImgError> {
        if self.engine.fail_on == Some(self.number) {
            return Err(Pdf2ImgError::RasterisationFailed {
                page: self.number,
                detail: "unsupported shading".into(),
            });
        }
        let tag = (self.number * 40 % 256) as u8;
        for (x, y, px) in surface.image_mut().enumerate_pixels_mut() {
            *px = Rgba([tag, (x * 3 % 256) as u8, (y * 5 % 256) as u8, 255]);
        }
        Ok(())
    }
}

fn pdf_with(engine: &Arc<FakeEngine>) -> Pdf2Img {
    Pdf2Img::with_engine(b"%PDF-1.7 fake".to_vec(), engine.clone()).unwrap()
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn is_data_url(s: &str) -> bool {
    let payload = s
        .strip_prefix("data:image/png;base64,")
        .or_else(|| s.strip_prefix("data:image/jpeg;base64,"));
    match payload {
        Some(p) => {
            !p.is_empty()
                && p
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
        }
        None => false,
    }
}

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run pdfium e2e tests");
            return;
        }
    }};
}

// ── File output ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_three_pages_to_png_files_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new(3).watching(dir.path()));
    let pdf = pdf_with(&engine);

    let options = ConversionOptions::builder()
        .output_dir(dir.path())
        .build()
        .unwrap();
    let outputs = pdf.download(&options).await.unwrap();

    let expected: Vec<String> = (1..=3)
        .map(|n| dir.path().join(format!("page-{n}.png")).to_string_lossy().into_owned())
        .collect();
    assert_eq!(outputs, expected);
    assert_eq!(files_in(dir.path()), vec!["page-1.png", "page-2.png", "page-3.png"]);
    assert_eq!(engine.fetched(), vec![1, 2, 3]);

    // Strictly sequential: every page's predecessor was on disk first.
    assert!(engine.previous_file_ready.lock().unwrap().iter().all(|&r| r));

    // Default scale 1.5 on a 612x792 pt page.
    let img = image::open(&outputs[0]).unwrap();
    assert_eq!((img.width(), img.height()), (918, 1188));
}

#[tokio::test]
async fn test_jpeg_files_use_jpg_extension() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new(2));
    let pdf = pdf_with(&engine).with_viewport_scale(0.25);

    let options = ConversionOptions::builder()
        .output_dir(dir.path())
        .build()
        .unwrap();
    let outputs = pdf.download_jpeg(&options).await.unwrap();

    assert_eq!(files_in(dir.path()), vec!["page-1.jpg", "page-2.jpg"]);
    let bytes = std::fs::read(&outputs[1]).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_descending_pair_and_clipped_maximum() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new(5));
    let pdf = pdf_with(&engine).with_viewport_scale(0.1);

    let options = ConversionOptions::builder()
        .pages((40, 4))
        .output_dir(dir.path())
        .build()
        .unwrap();
    let outputs = pdf.download_png(&options).await.unwrap();

    assert_eq!(outputs.len(), 2);
    assert_eq!(files_in(dir.path()), vec!["page-4.png", "page-5.png"]);
    assert_eq!(engine.fetched(), vec![4, 5]);
}

#[tokio::test]
async fn test_minimum_past_the_end_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new(3));
    let pdf = pdf_with(&engine);

    let options = ConversionOptions::builder()
        .pages(PageSelector::Single(9))
        .output_dir(dir.path())
        .build()
        .unwrap();
    let outputs = pdf.download(&options).await.unwrap();

    assert!(outputs.is_empty());
    assert!(files_in(dir.path()).is_empty());
    assert!(engine.fetched().is_empty());
}

#[tokio::test]
async fn test_invalid_selection_falls_back_to_every_page() {
    let engine = Arc::new(FakeEngine::new(2));
    let pdf = pdf_with(&engine).with_viewport_scale(0.1);

    for selector in [PageSelector::Single(0), PageSelector::Pair(-1, 5), PageSelector::from("x")] {
        let options = ConversionOptions::builder().pages(selector).build().unwrap();
        let urls = pdf.to_data_url(&options).await.unwrap();
        assert_eq!(urls.len(), 2, "{selector:?}");
    }
}

// ── Data URLs ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_data_urls_touch_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new(2));
    let pdf = pdf_with(&engine).with_viewport_scale(0.2);

    let options = ConversionOptions::builder()
        .output_dir(dir.path())
        .build()
        .unwrap();
    let urls = pdf.to_data_url(&options).await.unwrap();
    assert_eq!(urls.len(), 2);
    assert!(urls.iter().all(|u| u.starts_with("data:image/png;base64,") && is_data_url(u)));

    let jpeg = ConversionOptions::builder()
        .jpeg(JpegSettings::default())
        .data_url(true)
        .output_dir(dir.path())
        .build()
        .unwrap();
    let urls = pdf.convert(&jpeg).await.unwrap();
    assert!(urls.iter().all(|u| u.starts_with("data:image/jpeg;base64,") && is_data_url(u)));

    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_lower_jpeg_quality_is_not_larger() {
    let engine = Arc::new(FakeEngine::new(1));
    let pdf = pdf_with(&engine).with_viewport_scale(0.5);

    let mut sizes = Vec::new();
    for quality in [0.5, 0.9] {
        let options = ConversionOptions::builder()
            .jpeg(JpegSettings {
                quality,
                ..Default::default()
            })
            .build()
            .unwrap();
        let urls = pdf.to_data_url(&options).await.unwrap();
        sizes.push(urls[0].len());
    }
    assert!(sizes[0] <= sizes[1], "q0.5={} q0.9={}", sizes[0], sizes[1]);
}

// ── Scale ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_derived_scale_fits_width() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new(1));
    let pdf = pdf_with(&engine);

    let options = ConversionOptions::builder()
        .viewport_scale(ViewportScale::fit_width(306.0))
        .output_dir(dir.path())
        .build()
        .unwrap();
    let outputs = pdf.download(&options).await.unwrap();

    let img = image::open(&outputs[0]).unwrap();
    assert_eq!((img.width(), img.height()), (306, 396));
}

#[tokio::test]
async fn test_derived_scale_returning_zero_fails_the_page() {
    let engine = Arc::new(FakeEngine::new(2));
    let pdf = pdf_with(&engine);

    let options = ConversionOptions::builder()
        .derived_scale(|_, _| 0.0)
        .data_url(true)
        .build()
        .unwrap();
    let err = pdf.convert(&options).await.unwrap_err();
    assert!(matches!(err, Pdf2ImgError::InvalidScale { page: 1, .. }), "got {err:?}");
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_corrupt_input_rejects_before_any_file() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new(3));
    let pdf = Pdf2Img::with_engine(b"<html>not a pdf</html>".to_vec(), engine.clone()).unwrap();

    let options = ConversionOptions::builder()
        .output_dir(dir.path())
        .build()
        .unwrap();
    let err = pdf.download(&options).await.unwrap_err();

    assert!(matches!(err, Pdf2ImgError::CorruptPdf { .. }), "got {err:?}");
    assert!(files_in(dir.path()).is_empty());
    assert!(engine.fetched().is_empty());
}

#[tokio::test]
async fn test_missing_input_file() {
    let engine: Arc<dyn PdfEngine> = Arc::new(FakeEngine::new(1));
    let err = Pdf2Img::with_engine("/no/such/document.pdf", engine).unwrap_err();
    assert!(matches!(err, Pdf2ImgError::FileNotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_unwritable_destination_fails_once() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("never-created");
    let engine = Arc::new(FakeEngine::new(3));
    let pdf = pdf_with(&engine).with_viewport_scale(0.1);

    let options = ConversionOptions::builder()
        .output_dir(&missing)
        .build()
        .unwrap();
    let err = pdf.download(&options).await.unwrap_err();

    assert!(matches!(err, Pdf2ImgError::OutputWriteFailed { .. }), "got {err:?}");
    assert_eq!(engine.fetched(), vec![1], "no retry and no further pages");
    assert!(!missing.exists(), "output directory is never created");
}

#[tokio::test]
async fn test_render_failure_keeps_earlier_files() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new(4).failing_on(3));
    let pdf = pdf_with(&engine).with_viewport_scale(0.1);

    let options = ConversionOptions::builder()
        .output_dir(dir.path())
        .build()
        .unwrap();
    let err = pdf.download(&options).await.unwrap_err();

    assert!(
        matches!(err, Pdf2ImgError::RasterisationFailed { page: 3, .. }),
        "got {err:?}"
    );
    assert_eq!(engine.fetched(), vec![1, 2, 3]);
    assert_eq!(files_in(dir.path()), vec!["page-1.png", "page-2.png"]);
}

// ── Progress callbacks ───────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingCallback {
    events: Mutex<Vec<String>>,
}

impl ConversionProgressCallback for RecordingCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.events.lock().unwrap().push(format!("start {total_pages}"));
    }

    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("page {page_num}/{total_pages}"));
    }

    fn on_page_complete(&self, page_num: usize, _total_pages: usize, output: &str) {
        let name = Path::new(output)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.events
            .lock()
            .unwrap()
            .push(format!("done {page_num} {name}"));
    }

    fn on_page_error(&self, page_num: usize, _total_pages: usize, _error: &str) {
        self.events.lock().unwrap().push(format!("error {page_num}"));
    }

    fn on_conversion_complete(&self, total_pages: usize, written: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("complete {written}/{total_pages}"));
    }
}

#[tokio::test]
async fn test_progress_events_arrive_in_page_order() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new(5));
    let pdf = pdf_with(&engine).with_viewport_scale(0.1);
    let cb = Arc::new(RecordingCallback::default());

    let options = ConversionOptions::builder()
        .pages((2, 3))
        .output_dir(dir.path())
        .progress_callback(cb.clone())
        .build()
        .unwrap();
    pdf.download(&options).await.unwrap();

    assert_eq!(
        *cb.events.lock().unwrap(),
        vec![
            "start 2",
            "page 2/2",
            "done 2 page-2.png",
            "page 3/2",
            "done 3 page-3.png",
            "complete 2/2",
        ]
    );
}

#[tokio::test]
async fn test_progress_reports_error_and_skips_completion() {
    let engine = Arc::new(FakeEngine::new(3).failing_on(2));
    let pdf = pdf_with(&engine).with_viewport_scale(0.1);
    let cb = Arc::new(RecordingCallback::default());

    let options = ConversionOptions::builder()
        .data_url(true)
        .progress_callback(cb.clone())
        .build()
        .unwrap();
    assert!(pdf.convert(&options).await.is_err());

    let events = cb.events.lock().unwrap();
    assert_eq!(events.last().map(String::as_str), Some("error 2"));
    assert!(!events.iter().any(|e| e.starts_with("complete")));
}

#[tokio::test]
async fn test_callback_send_in_tokio_spawn() {
    let engine = Arc::new(FakeEngine::new(2));
    let pdf = pdf_with(&engine).with_viewport_scale(0.1);
    let options = ConversionOptions::builder()
        .data_url(true)
        .progress_callback(Arc::new(NoopProgressCallback))
        .build()
        .unwrap();

    let handle = tokio::spawn(async move { pdf.convert(&options).await });
    assert_eq!(handle.await.unwrap().unwrap().len(), 2);
}

// ── Reuse, sync wrapper, inspection ──────────────────────────────────────────

#[tokio::test]
async fn test_converter_is_reusable_with_fresh_options() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new(3));
    let pdf = pdf_with(&engine).with_viewport_scale(0.1);

    let first = ConversionOptions::builder()
        .pages(1)
        .output_dir(dir.path())
        .build()
        .unwrap();
    let second = ConversionOptions::builder()
        .pages((2, 3))
        .png(PngSettings {
            compression_level: 9,
            ..Default::default()
        })
        .output_dir(dir.path())
        .build()
        .unwrap();

    assert_eq!(pdf.download(&first).await.unwrap().len(), 1);
    assert_eq!(pdf.download(&second).await.unwrap().len(), 2);
    assert_eq!(files_in(dir.path()), vec!["page-1.png", "page-2.png", "page-3.png"]);
}

#[test]
fn test_convert_sync_outside_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new(2));
    let pdf = pdf_with(&engine).with_viewport_scale(0.1);

    let options = ConversionOptions::builder()
        .format(OutputFormat::Jpeg(JpegSettings::default()))
        .output_dir(dir.path())
        .build()
        .unwrap();
    let outputs = pdf.convert_sync(&options).unwrap();
    assert_eq!(outputs.len(), 2);
    assert!(outputs[0].ends_with("page-1.jpg"));
}

#[test]
fn test_page_count_via_block_on() {
    let engine = Arc::new(FakeEngine::new(7));
    let pdf = pdf_with(&engine);
    assert_eq!(tokio_test::block_on(pdf.page_count()).unwrap(), 7);
    assert!(engine.fetched().is_empty());
}

#[test]
fn test_noop_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<NoopProgressCallback>();
    assert_send_sync::<Pdf2Img>();
    assert_send_sync::<ConversionOptions>();
}

// ── PDFium-backed tests (E2E_ENABLED) ────────────────────────────────────────

/// Build a PDF with `pages` 200x100 pt pages, each holding one black bar.
fn minimal_pdf(pages: usize) -> Vec<u8> {
    let mut objects: Vec<String> = Vec::new();
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", 3 + i * 2)).collect();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".into());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        pages
    ));
    for i in 0..pages {
        let content = format!("0 0 0 rg 20 20 {} 40 re f", 40 + i * 30);
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 100] /Contents {} 0 R >>",
            4 + i * 2
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, obj) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, obj).as_bytes());
    }
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for off in offsets {
        out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    out
}

#[tokio::test]
async fn test_pdfium_renders_minimal_pdf() {
    e2e_skip_unless_enabled!();

    let dir = tempfile::tempdir().unwrap();
    let pdf = Pdf2Img::new(minimal_pdf(3)).unwrap();
    assert_eq!(pdf.page_count().await.unwrap(), 3);

    let options = ConversionOptions::builder()
        .pages((2, 9))
        .viewport_scale(2.0)
        .output_dir(dir.path())
        .build()
        .unwrap();
    let outputs = pdf.download_png(&options).await.unwrap();
    assert_eq!(files_in(dir.path()), vec!["page-2.png", "page-3.png"]);

    let img: RgbaImage = image::open(&outputs[0]).unwrap().into_rgba8();
    assert_eq!(img.dimensions(), (400, 200));
    // Bar drawn from (20,20) pt, i.e. bottom-left; white page elsewhere.
    assert_eq!(img.get_pixel(5, 5), &Rgba([255, 255, 255, 255]));
    let dark = img.get_pixel(60, 200 - 60);
    assert!(dark.0[0] < 64, "expected the bar, got {dark:?}");

    let urls = pdf
        .to_data_url(&ConversionOptions::builder().pages(1).build().unwrap())
        .await
        .unwrap();
    assert!(is_data_url(&urls[0]));
    println!("✓ pdfium rendered {} files and {} data URL", outputs.len(), urls.len());
}

#[tokio::test]
async fn test_pdfium_rejects_garbage() {
    e2e_skip_unless_enabled!();

    let pdf = Pdf2Img::new(b"definitely not a pdf".to_vec()).unwrap();
    let err = pdf.page_count().await.unwrap_err();
    assert!(matches!(err, Pdf2ImgError::CorruptPdf { .. }), "got {err:?}");
}
