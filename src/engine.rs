//! The PDF engine seam.
//!
//! Parsing and painting PDF pages is entirely the engine's job. The rest of
//! the crate only talks to these three traits:
//!
//! ```text
//! PdfEngine ──open(bytes)──▶ PdfDocumentHandle ──page(n)──▶ PdfPageHandle
//!                              └ page_count()                 ├ size() / viewport(scale)
//!                                                             └ paint(surface, viewport)
//! ```
//!
//! [`PdfiumEngine`] implements them on top of `pdfium-render`. Tests plug in
//! their own engine so the page loop can be exercised without a native
//! library.

use crate::error::Pdf2ImgError;
use crate::pipeline::render::{RasterSurface, Viewport};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Opens PDF byte streams.
pub trait PdfEngine: Send + Sync {
    /// Parse `bytes` into a document handle. Rejections are reported as
    /// [`Pdf2ImgError::CorruptPdf`].
    fn open<'a>(&'a self, bytes: &'a [u8])
        -> Result<Box<dyn PdfDocumentHandle + 'a>, Pdf2ImgError>;
}

/// An opened document.
pub trait PdfDocumentHandle {
    fn page_count(&self) -> usize;

    /// Fetch a page by its 1-based number.
    fn page(&self, number: usize) -> Result<Box<dyn PdfPageHandle + '_>, Pdf2ImgError>;
}

/// One page of an opened document.
pub trait PdfPageHandle {
    /// Intrinsic `(width, height)` in PDF points, i.e. the viewport at scale 1.
    fn size(&self) -> (f32, f32);

    /// Viewport at the given scale.
    fn viewport(&self, scale: f32) -> Viewport {
        let (width, height) = self.size();
        Viewport::new(scale, width * scale, height * scale)
    }

    /// Paint the page onto `surface`, which is already sized to `viewport`.
    fn paint(&self, surface: &mut RasterSurface, viewport: &Viewport) -> Result<(), Pdf2ImgError>;
}

// ── PDFium ───────────────────────────────────────────────────────────────

/// Environment variable naming a pdfium library file or the directory holding it.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

static SHARED: OnceLock<Arc<PdfiumEngine>> = OnceLock::new();

/// [`PdfEngine`] backed by the pdfium C library.
pub struct PdfiumEngine {
    pdfium: Pdfium,
}

impl PdfiumEngine {
    /// Process-wide engine, bound on first use.
    ///
    /// Lookup order: `PDFIUM_LIB_PATH`, the working directory, then the
    /// system library path.
    pub fn shared() -> Result<Arc<PdfiumEngine>, Pdf2ImgError> {
        if let Some(engine) = SHARED.get() {
            return Ok(Arc::clone(engine));
        }
        let engine = Arc::new(Self::bind()?);
        // A concurrent first call may have won the race; either instance works.
        Ok(Arc::clone(SHARED.get_or_init(|| engine)))
    }

    /// Bind a new engine using the default lookup order.
    pub fn bind() -> Result<Self, Pdf2ImgError> {
        if let Ok(env_path) = std::env::var(PDFIUM_LIB_PATH_ENV) {
            if !env_path.is_empty() {
                return Self::bind_to_path(Path::new(&env_path));
            }
        }

        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| Pdf2ImgError::PdfiumBindingFailed(e.to_string()))?;

        info!("Bound pdfium library");
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    /// Bind to a library file, or to the platform library name inside a directory.
    pub fn bind_to_path(path: &Path) -> Result<Self, Pdf2ImgError> {
        let lib_path: PathBuf = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(path)
        } else {
            path.to_path_buf()
        };

        let bindings = Pdfium::bind_to_library(&lib_path).map_err(|e| {
            Pdf2ImgError::PdfiumBindingFailed(format!("{}: {}", lib_path.display(), e))
        })?;

        info!("Bound pdfium library at {}", lib_path.display());
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl PdfEngine for PdfiumEngine {
    fn open<'a>(
        &'a self,
        bytes: &'a [u8],
    ) -> Result<Box<dyn PdfDocumentHandle + 'a>, Pdf2ImgError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| Pdf2ImgError::CorruptPdf {
                detail: format!("{:?}", e),
            })?;
        debug!("pdfium opened document: {} pages", document.pages().len());
        Ok(Box::new(PdfiumDocument { document }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl PdfDocumentHandle for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page(&self, number: usize) -> Result<Box<dyn PdfPageHandle + '_>, Pdf2ImgError> {
        let index = number
            .checked_sub(1)
            .and_then(|i| u16::try_from(i).ok())
            .ok_or_else(|| Pdf2ImgError::PageAccessFailed {
                page: number,
                detail: "page number outside pdfium's index range".into(),
            })?;

        let page = self
            .document
            .pages()
            .get(index)
            .map_err(|e| Pdf2ImgError::PageAccessFailed {
                page: number,
                detail: format!("{:?}", e),
            })?;

        Ok(Box::new(PdfiumPage { number, page }))
    }
}

struct PdfiumPage<'a> {
    number: usize,
    page: PdfPage<'a>,
}

impl PdfPageHandle for PdfiumPage<'_> {
    fn size(&self) -> (f32, f32) {
        (self.page.width().value, self.page.height().value)
    }

    fn paint(&self, surface: &mut RasterSurface, _viewport: &Viewport) -> Result<(), Pdf2ImgError> {
        let render_config = PdfRenderConfig::new()
            .set_target_width(surface.width() as i32)
            .set_target_height(surface.height() as i32)
            .render_form_data(true)
            .render_annotations(true);

        let bitmap = self.page.render_with_config(&render_config).map_err(|e| {
            Pdf2ImgError::RasterisationFailed {
                page: self.number,
                detail: format!("{:?}", e),
            }
        })?;

        let rendered = bitmap.as_image().into_rgba8();
        image::imageops::replace(surface.image_mut(), &rendered, 0, 0);
        Ok(())
    }
}
