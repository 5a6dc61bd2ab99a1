//! Page rasterisation: resolve a viewport, allocate a surface, let the engine paint.
//!
//! A derived scale needs the page's intrinsic size, so it costs one extra
//! viewport query at scale 1 before the real one. Every page gets its own
//! freshly allocated [`RasterSurface`]; nothing is reused across pages.

use crate::config::ViewportScale;
use crate::engine::PdfPageHandle;
use crate::error::Pdf2ImgError;
use image::RgbaImage;
use std::fmt;
use tracing::debug;

/// Largest surface, in pixels, that will be allocated for one page (1 GiB of RGBA).
pub const MAX_SURFACE_PIXELS: u64 = 1 << 28;

/// Pixel-space rectangle for a page at a given scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(scale: f32, width: f32, height: f32) -> Self {
        Self {
            scale,
            width,
            height,
        }
    }

    /// Surface width: the viewport width truncated to whole pixels, at least 1.
    pub fn pixel_width(&self) -> u32 {
        (self.width as u32).max(1)
    }

    /// Surface height: the viewport height truncated to whole pixels, at least 1.
    pub fn pixel_height(&self) -> u32 {
        (self.height as u32).max(1)
    }
}

/// Off-screen RGBA buffer one page is painted onto.
pub struct RasterSurface {
    image: RgbaImage,
}

impl RasterSurface {
    /// Allocate a transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterSurface")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl From<RgbaImage> for RasterSurface {
    fn from(image: RgbaImage) -> Self {
        Self { image }
    }
}

/// Work out the viewport a page will be rendered at.
pub fn resolve_viewport(
    page: &dyn PdfPageHandle,
    page_num: usize,
    scale: &ViewportScale,
) -> Result<Viewport, Pdf2ImgError> {
    let scale = match scale {
        ViewportScale::Fixed(s) => *s,
        ViewportScale::Derived(f) => {
            let intrinsic = page.viewport(1.0);
            f(intrinsic.width, intrinsic.height)
        }
    };

    if !scale.is_finite() || scale <= 0.0 {
        return Err(Pdf2ImgError::InvalidScale {
            page: page_num,
            scale,
        });
    }

    Ok(page.viewport(scale))
}

/// Rasterise one page onto a new surface.
pub fn render_page(
    page: &dyn PdfPageHandle,
    page_num: usize,
    scale: &ViewportScale,
) -> Result<RasterSurface, Pdf2ImgError> {
    let viewport = resolve_viewport(page, page_num, scale)?;
    let (width, height) = (viewport.pixel_width(), viewport.pixel_height());

    if u64::from(width) * u64::from(height) > MAX_SURFACE_PIXELS {
        return Err(Pdf2ImgError::RasterisationFailed {
            page: page_num,
            detail: format!(
                "{width}x{height} px surface at scale {} exceeds the {MAX_SURFACE_PIXELS} px limit",
                viewport.scale
            ),
        });
    }

    let mut surface = RasterSurface::new(width, height);
    page.paint(&mut surface, &viewport)?;

    debug!(
        "Rendered page {} at scale {:.3} → {}x{} px",
        page_num, viewport.scale, width, height
    );
    Ok(surface)
}
