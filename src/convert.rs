//! Conversion entry points.
//!
//! [`Pdf2Img`] holds one loaded PDF and converts any page range of it, as
//! many times as asked, each call with its own [`ConversionOptions`].
//!
//! ## Page loop
//!
//! Pages are produced strictly one at a time, in ascending order: page N+1
//! is not fetched until page N's file is flushed (or its data URL built).
//! The whole loop runs inside a single `spawn_blocking` task because pdfium
//! is a synchronous C library. The first failure ends the conversion and is
//! returned unchanged; files already written for earlier pages stay on disk.

use crate::config::{
    validate_fixed_scale, ConversionOptions, JpegSettings, OutputFormat, OutputMode, PngSettings,
    ViewportScale,
};
use crate::engine::{PdfDocumentHandle, PdfEngine, PdfiumEngine};
use crate::error::Pdf2ImgError;
use crate::pipeline::input::{PdfInput, SourceDocument};
use crate::pipeline::{encode, render};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A loaded PDF, ready to be converted to images.
///
/// # Example
/// ```rust,no_run
/// use pdf2img::{ConversionOptions, Pdf2Img};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), pdf2img::Pdf2ImgError> {
/// let pdf = Pdf2Img::new("document.pdf")?.with_viewport_scale(2.0);
///
/// let files = pdf
///     .download_png(&ConversionOptions::builder().pages((1, 3)).output_dir("out").build()?)
///     .await?;
/// assert_eq!(files.len(), 3);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Pdf2Img {
    source: SourceDocument,
    engine: Option<Arc<dyn PdfEngine>>,
    viewport_scale: Option<ViewportScale>,
}

impl fmt::Debug for Pdf2Img {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pdf2Img")
            .field("path", &self.source.path())
            .field("bytes", &self.source.bytes().len())
            .field(
                "engine",
                &self.engine.as_ref().map_or("<shared pdfium>", |_| "<dyn PdfEngine>"),
            )
            .field("viewport_scale", &self.viewport_scale)
            .finish()
    }
}

impl Pdf2Img {
    /// Load a PDF from a path or an owned buffer.
    ///
    /// Paths are read immediately. The pdfium library is bound lazily, on
    /// the first conversion.
    pub fn new(input: impl Into<PdfInput>) -> Result<Self, Pdf2ImgError> {
        Ok(Self {
            source: SourceDocument::load(input)?,
            engine: None,
            viewport_scale: None,
        })
    }

    /// Load a PDF that will be opened by `engine` instead of pdfium.
    pub fn with_engine(
        input: impl Into<PdfInput>,
        engine: Arc<dyn PdfEngine>,
    ) -> Result<Self, Pdf2ImgError> {
        Ok(Self {
            source: SourceDocument::load(input)?,
            engine: Some(engine),
            viewport_scale: None,
        })
    }

    /// Scale used when a conversion's options don't set one.
    pub fn with_viewport_scale(mut self, scale: impl Into<ViewportScale>) -> Self {
        self.viewport_scale = Some(scale.into());
        self
    }

    pub fn source(&self) -> &SourceDocument {
        &self.source
    }

    /// Convert the selected pages.
    ///
    /// Returns one string per page, in page order: the written file path in
    /// [`OutputMode::Files`], the `data:` URL in [`OutputMode::DataUrl`].
    /// A selection that lies entirely past the end of the document gives an
    /// empty vector.
    ///
    /// # Errors
    /// The first failure of any page, unchanged. See [`Pdf2ImgError`].
    pub async fn convert(&self, options: &ConversionOptions) -> Result<Vec<String>, Pdf2ImgError> {
        options.validate()?;
        let scale = self.resolve_scale(options);
        if let ViewportScale::Fixed(s) = &scale {
            validate_fixed_scale(*s)?;
        }

        let engine = self.engine()?;
        let bytes = self.source.shared_bytes();
        let options = options.clone();

        tokio::task::spawn_blocking(move || run_conversion(engine.as_ref(), &bytes, &options, &scale))
            .await
            .map_err(|e| Pdf2ImgError::Internal(format!("Conversion task failed: {e}")))?
    }

    /// Blocking wrapper around [`Pdf2Img::convert`].
    ///
    /// Creates a temporary tokio runtime internally, so it must not be called
    /// from inside an async context.
    pub fn convert_sync(&self, options: &ConversionOptions) -> Result<Vec<String>, Pdf2ImgError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| Pdf2ImgError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.convert(options))
    }

    /// Convert to inline data URLs. Nothing is written to disk.
    pub async fn to_data_url(
        &self,
        options: &ConversionOptions,
    ) -> Result<Vec<String>, Pdf2ImgError> {
        let mut options = options.clone();
        options.mode = OutputMode::DataUrl;
        self.convert(&options).await
    }

    /// Write `page-<N>.<ext>` files in the options' format.
    pub async fn download(&self, options: &ConversionOptions) -> Result<Vec<String>, Pdf2ImgError> {
        let mut options = options.clone();
        options.mode = OutputMode::Files;
        self.convert(&options).await
    }

    /// Write PNG files. PNG settings in `options` are kept; anything else
    /// is replaced by default PNG settings.
    pub async fn download_png(
        &self,
        options: &ConversionOptions,
    ) -> Result<Vec<String>, Pdf2ImgError> {
        let mut options = options.clone();
        options.mode = OutputMode::Files;
        if !options.format.is_png() {
            options.format = OutputFormat::Png(PngSettings::default());
        }
        self.convert(&options).await
    }

    /// Write JPEG files. JPEG settings in `options` are kept; anything else
    /// is replaced by default JPEG settings.
    pub async fn download_jpeg(
        &self,
        options: &ConversionOptions,
    ) -> Result<Vec<String>, Pdf2ImgError> {
        let mut options = options.clone();
        options.mode = OutputMode::Files;
        if options.format.is_png() {
            options.format = OutputFormat::Jpeg(JpegSettings::default());
        }
        self.convert(&options).await
    }

    /// Open the document and report how many pages it has, without rendering.
    pub async fn page_count(&self) -> Result<usize, Pdf2ImgError> {
        let engine = self.engine()?;
        let bytes = self.source.shared_bytes();

        tokio::task::spawn_blocking(move || {
            let document = engine.open(&bytes)?;
            Ok::<_, Pdf2ImgError>(document.page_count())
        })
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Inspection task failed: {e}")))?
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn engine(&self) -> Result<Arc<dyn PdfEngine>, Pdf2ImgError> {
        match self.engine {
            Some(ref engine) => Ok(Arc::clone(engine)),
            None => {
                let engine: Arc<dyn PdfEngine> = PdfiumEngine::shared()?;
                Ok(engine)
            }
        }
    }

    /// Options first, then this instance's default, then 1.5.
    fn resolve_scale(&self, options: &ConversionOptions) -> ViewportScale {
        options
            .viewport_scale
            .clone()
            .or_else(|| self.viewport_scale.clone())
            .unwrap_or_default()
    }
}

/// Load `input` with the shared pdfium engine and convert it in one call.
pub async fn convert(
    input: impl Into<PdfInput>,
    options: &ConversionOptions,
) -> Result<Vec<String>, Pdf2ImgError> {
    Pdf2Img::new(input)?.convert(options).await
}

/// The page loop. Runs on a blocking thread.
fn run_conversion(
    engine: &dyn PdfEngine,
    bytes: &[u8],
    options: &ConversionOptions,
    scale: &ViewportScale,
) -> Result<Vec<String>, Pdf2ImgError> {
    let start = Instant::now();

    // ── Step 1: Open ─────────────────────────────────────────────────────
    let document = engine.open(bytes)?;
    let page_count = document.page_count();

    // ── Step 2: Resolve the range ────────────────────────────────────────
    let range = options.pages.normalize(page_count);
    let total = range.len();
    info!(
        "Converting pages {}..={} of {} as {} ({:?})",
        range.first,
        range.last,
        page_count,
        options.format.extension(),
        options.mode
    );
    if range.is_empty() {
        warn!(
            "Selection {:?} covers no pages of a {}-page document",
            options.pages, page_count
        );
    }

    if let Some(ref cb) = options.progress_callback {
        cb.on_conversion_start(total);
    }

    // ── Step 3: One page at a time ───────────────────────────────────────
    let mut outputs = Vec::with_capacity(total);
    for page_num in range.pages() {
        if let Some(ref cb) = options.progress_callback {
            cb.on_page_start(page_num, total);
        }

        match produce_page(document.as_ref(), page_num, options, scale) {
            Ok(output) => {
                if let Some(ref cb) = options.progress_callback {
                    cb.on_page_complete(page_num, total, &output);
                }
                outputs.push(output);
            }
            Err(e) => {
                warn!("Page {} failed: {}", page_num, e);
                if let Some(ref cb) = options.progress_callback {
                    cb.on_page_error(page_num, total, &e.to_string());
                }
                return Err(e);
            }
        }
    }

    if let Some(ref cb) = options.progress_callback {
        cb.on_conversion_complete(total, outputs.len());
    }

    info!(
        "Conversion complete: {} pages in {}ms",
        outputs.len(),
        start.elapsed().as_millis()
    );
    Ok(outputs)
}

/// Fetch, rasterise and deliver a single page.
fn produce_page(
    document: &dyn PdfDocumentHandle,
    page_num: usize,
    options: &ConversionOptions,
    scale: &ViewportScale,
) -> Result<String, Pdf2ImgError> {
    let page = document.page(page_num)?;
    let surface = render::render_page(page.as_ref(), page_num, scale)?;

    match options.mode {
        OutputMode::DataUrl => encode::encode_data_url(&surface, &options.format, page_num),
        OutputMode::Files => {
            let path =
                encode::write_page_file(&surface, &options.format, &options.output_dir, page_num)?;
            debug!("Page {} → {}", page_num, path.display());
            Ok(path.to_string_lossy().into_owned())
        }
    }
}
