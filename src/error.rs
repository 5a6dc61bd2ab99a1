//! Error type for the pdf2img library.
//!
//! A conversion either produces every selected page or fails on the first
//! page that cannot be produced. There is therefore a single error type,
//! [`Pdf2ImgError`], returned unchanged from whichever stage failed. Files
//! written for earlier pages are left where they are.
//!
//! Malformed page selections are not errors at all: they are normalised to a
//! usable range (see [`crate::pipeline::range`]).

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdf2img library.
#[derive(Debug, Error)]
pub enum Pdf2ImgError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Reading the input file failed for another reason.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The engine rejected the byte stream.
    #[error("PDF could not be opened: {detail}")]
    CorruptPdf { detail: String },

    /// The engine could not hand out a page that the document claims to have.
    #[error("Could not access page {page}: {detail}")]
    PageAccessFailed { page: usize, detail: String },

    /// A derived viewport scale came back unusable.
    #[error("Viewport scale for page {page} must be a positive finite number, got {scale}")]
    InvalidScale { page: usize, scale: f32 },

    /// The engine failed to paint a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// PNG/JPEG encoding failed.
    #[error("Encoding page {page} failed: {detail}")]
    EncodeFailed { page: usize, detail: String },

    /// Could not create or write a page image file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (or its directory).\n\
  • Place libpdfium next to the working directory.\n\
  • Install pdfium system-wide so the dynamic loader can find it.\n\
Pre-built libraries: https://github.com/bblanchon/pdfium-binaries/releases\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
