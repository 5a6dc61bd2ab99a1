//! # pdf2img
//!
//! Convert the pages of a PDF document into PNG or JPEG images, written as
//! files or returned as base64 data URLs.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF (path or bytes)
//!  │
//!  ├─ 1. Input   read the whole document into memory
//!  ├─ 2. Open    hand the bytes to the engine (pdfium by default)
//!  ├─ 3. Range   normalise the page selection against the page count
//!  └─ for each page, one at a time:
//!       ├─ 4. Render  viewport at the chosen scale → RGBA surface
//!       └─ 5. Encode  PNG/JPEG → page-<N>.<ext> or data:image/…;base64,…
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2img::{ConversionOptions, JpegSettings, Pdf2Img};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pdf = Pdf2Img::new("document.pdf")?;
//!
//!     // page-1.png, page-2.png, … in the working directory
//!     let files = pdf.download(&ConversionOptions::default()).await?;
//!     eprintln!("wrote {} files", files.len());
//!
//!     // Pages 2–4 as JPEG data URLs, nothing written to disk
//!     let options = ConversionOptions::builder()
//!         .pages((2, 4))
//!         .jpeg(JpegSettings { quality: 0.6, ..Default::default() })
//!         .build()?;
//!     for url in pdf.to_data_url(&options).await? {
//!         println!("{}…", &url[..40]);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## PDFium
//!
//! Rendering uses the pdfium C library through `pdfium-render`. It is looked
//! up in `PDFIUM_LIB_PATH` (file or directory), then the working directory,
//! then the system library path. Any other renderer can be plugged in by
//! implementing [`PdfEngine`] and using [`Pdf2Img::with_engine`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2img` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2img = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionOptions, ConversionOptionsBuilder, JpegSettings, OutputFormat, OutputMode,
    PageSelector, PngFilters, PngSettings, ScaleFn, ViewportScale, DEFAULT_JPEG_QUALITY,
    DEFAULT_PNG_COMPRESSION_LEVEL, DEFAULT_VIEWPORT_SCALE,
};
pub use convert::{convert, Pdf2Img};
pub use engine::{PdfDocumentHandle, PdfEngine, PdfPageHandle, PdfiumEngine, PDFIUM_LIB_PATH_ENV};
pub use error::Pdf2ImgError;
pub use pipeline::input::{PdfInput, SourceDocument};
pub use pipeline::range::PageRange;
pub use pipeline::render::{RasterSurface, Viewport};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
