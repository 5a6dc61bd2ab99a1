//! Configuration types for PDF-to-image conversion.
//!
//! Every conversion is described by one [`ConversionOptions`] value, built via
//! its [`ConversionOptionsBuilder`]. Nothing is persisted between calls: the
//! page range, scale, format and destination are all re-read per conversion.
//!
//! Format-specific encoder settings live in explicit structs
//! ([`PngSettings`], [`JpegSettings`]) carried by the [`OutputFormat`]
//! variant they belong to, so a JPEG quality can never be handed to the PNG
//! encoder by accident.

use crate::error::Pdf2ImgError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Scale used when neither the options nor the [`crate::Pdf2Img`] instance set one.
pub const DEFAULT_VIEWPORT_SCALE: f32 = 1.5;

/// Default JPEG quality on the 0.0–1.0 scale.
pub const DEFAULT_JPEG_QUALITY: f32 = 0.8;

/// Default zlib compression level for PNG output.
pub const DEFAULT_PNG_COMPRESSION_LEVEL: u8 = 6;

/// Options for one conversion run.
///
/// Built via [`ConversionOptions::builder()`] or using
/// [`ConversionOptions::default()`].
///
/// # Example
/// ```rust
/// use pdf2img::{ConversionOptions, JpegSettings, PageSelector};
///
/// let options = ConversionOptions::builder()
///     .pages(PageSelector::Pair(2, 4))
///     .viewport_scale(2.0)
///     .jpeg(JpegSettings { quality: 0.6, ..Default::default() })
///     .output_dir("out")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionOptions {
    /// Which pages to convert. Default: all pages.
    ///
    /// Malformed selections are never rejected; see
    /// [`PageSelector::normalize`](crate::PageSelector::normalize).
    pub pages: PageSelector,

    /// Viewport scale. `None` falls back to the converter's default, then to
    /// [`DEFAULT_VIEWPORT_SCALE`].
    pub viewport_scale: Option<ViewportScale>,

    /// Image format plus its encoder settings. Default: PNG with default settings.
    pub format: OutputFormat,

    /// Whether each page becomes a file or an inline data URL. Default: files.
    pub mode: OutputMode,

    /// Directory receiving `page-<N>.<ext>` files. Default: `./`.
    ///
    /// Must already exist; it is never created.
    pub output_dir: PathBuf,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            pages: PageSelector::default(),
            viewport_scale: None,
            format: OutputFormat::default(),
            mode: OutputMode::default(),
            output_dir: PathBuf::from("./"),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionOptions")
            .field("pages", &self.pages)
            .field("viewport_scale", &self.viewport_scale)
            .field("format", &self.format)
            .field("mode", &self.mode)
            .field("output_dir", &self.output_dir)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionOptions {
    /// Create a new builder for `ConversionOptions`.
    pub fn builder() -> ConversionOptionsBuilder {
        ConversionOptionsBuilder {
            options: Self::default(),
        }
    }

    /// Check every constraint the builder enforces.
    ///
    /// Called again by the converter, since the fields are public and may
    /// have been edited after `build()`.
    pub fn validate(&self) -> Result<(), Pdf2ImgError> {
        if let Some(ViewportScale::Fixed(scale)) = self.viewport_scale {
            validate_fixed_scale(scale)?;
        }
        self.format.validate()
    }
}

/// Builder for [`ConversionOptions`].
#[derive(Debug)]
pub struct ConversionOptionsBuilder {
    options: ConversionOptions,
}

impl ConversionOptionsBuilder {
    pub fn pages(mut self, selector: impl Into<PageSelector>) -> Self {
        self.options.pages = selector.into();
        self
    }

    pub fn viewport_scale(mut self, scale: impl Into<ViewportScale>) -> Self {
        self.options.viewport_scale = Some(scale.into());
        self
    }

    /// Derive the scale per page from its intrinsic size in points.
    pub fn derived_scale<F>(mut self, f: F) -> Self
    where
        F: Fn(f32, f32) -> f32 + Send + Sync + 'static,
    {
        self.options.viewport_scale = Some(ViewportScale::derived(f));
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.options.format = format;
        self
    }

    pub fn png(mut self, settings: PngSettings) -> Self {
        self.options.format = OutputFormat::Png(settings);
        self
    }

    pub fn jpeg(mut self, settings: JpegSettings) -> Self {
        self.options.format = OutputFormat::Jpeg(settings);
        self
    }

    pub fn mode(mut self, mode: OutputMode) -> Self {
        self.options.mode = mode;
        self
    }

    pub fn data_url(mut self, v: bool) -> Self {
        self.options.mode = if v {
            OutputMode::DataUrl
        } else {
            OutputMode::Files
        };
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.output_dir = dir.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.options.progress_callback = Some(cb);
        self
    }

    /// Build the options, validating constraints.
    pub fn build(self) -> Result<ConversionOptions, Pdf2ImgError> {
        self.options.validate()?;
        Ok(self.options)
    }
}

pub(crate) fn validate_fixed_scale(scale: f32) -> Result<(), Pdf2ImgError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(Pdf2ImgError::InvalidConfig(format!(
            "Viewport scale must be a positive finite number, got {scale}"
        )));
    }
    Ok(())
}

// ── Viewport scale ───────────────────────────────────────────────────────

/// Callback deriving a scale from a page's intrinsic `(width, height)` in points.
pub type ScaleFn = Arc<dyn Fn(f32, f32) -> f32 + Send + Sync>;

/// How large each page is rasterised.
#[derive(Clone)]
pub enum ViewportScale {
    /// The same factor for every page. 1.0 renders one pixel per PDF point.
    Fixed(f32),
    /// Computed per page from its size at scale 1.
    Derived(ScaleFn),
}

impl ViewportScale {
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(f32, f32) -> f32 + Send + Sync + 'static,
    {
        ViewportScale::Derived(Arc::new(f))
    }

    /// Scale every page so that it ends up `width` pixels wide.
    pub fn fit_width(width: f32) -> Self {
        Self::derived(move |w, _| width / w)
    }

    /// Scale every page so that it ends up `height` pixels tall.
    pub fn fit_height(height: f32) -> Self {
        Self::derived(move |_, h| height / h)
    }
}

impl Default for ViewportScale {
    fn default() -> Self {
        ViewportScale::Fixed(DEFAULT_VIEWPORT_SCALE)
    }
}

impl From<f32> for ViewportScale {
    fn from(scale: f32) -> Self {
        ViewportScale::Fixed(scale)
    }
}

impl fmt::Debug for ViewportScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewportScale::Fixed(s) => f.debug_tuple("Fixed").field(s).finish(),
            ViewportScale::Derived(_) => f.write_str("Derived(<fn>)"),
        }
    }
}

// ── Page selection ───────────────────────────────────────────────────────

/// Raw page selection as supplied by the caller (1-indexed).
///
/// Values are signed on purpose: zero and negative numbers are legal input
/// and fall back to the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSelector {
    /// Every page (default).
    #[default]
    All,
    /// One page.
    Single(i64),
    /// Two bounds, in either order, both inclusive.
    Pair(i64, i64),
}

impl From<i64> for PageSelector {
    fn from(page: i64) -> Self {
        PageSelector::Single(page)
    }
}

impl From<(i64, i64)> for PageSelector {
    fn from((a, b): (i64, i64)) -> Self {
        PageSelector::Pair(a, b)
    }
}

impl From<[i64; 2]> for PageSelector {
    fn from([a, b]: [i64; 2]) -> Self {
        PageSelector::Pair(a, b)
    }
}

impl From<&str> for PageSelector {
    /// Parse `"all"`, `"5"`, `"3-7"` or `"7,3"`. Anything else selects all pages.
    fn from(s: &str) -> Self {
        let s = s.trim();
        let pair = s.split_once('-').or_else(|| s.split_once(','));
        if let Some((a, b)) = pair {
            return match (a.trim().parse(), b.trim().parse()) {
                (Ok(a), Ok(b)) => PageSelector::Pair(a, b),
                _ => PageSelector::All,
            };
        }
        s.parse().map(PageSelector::Single).unwrap_or_default()
    }
}

// ── Output format ────────────────────────────────────────────────────────

/// PNG row filter choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PngFilters {
    /// Try every filter per row and keep the best one (default).
    #[default]
    All,
    /// No filtering.
    None,
    Sub,
    Up,
    Avg,
    Paeth,
}

/// PNG encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PngSettings {
    /// zlib level 0–9. Default: 6.
    pub compression_level: u8,
    /// Row filter mode. Default: [`PngFilters::All`].
    pub filters: PngFilters,
    /// RGBA palette. When set, the image is written as indexed colour.
    pub palette: Option<Vec<[u8; 4]>>,
    /// Palette index written as the background colour. Default: 0.
    pub background_index: u8,
    /// Pixels per inch stored in the file. Default: unset.
    pub resolution: Option<u32>,
}

impl Default for PngSettings {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_PNG_COMPRESSION_LEVEL,
            filters: PngFilters::default(),
            palette: None,
            background_index: 0,
            resolution: None,
        }
    }
}

/// JPEG encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JpegSettings {
    /// 0.0–1.0. Default: 0.8.
    pub quality: f32,
    /// Progressive scan order. Default: false.
    pub progressive: bool,
    /// 4:2:0 chroma subsampling when true, 4:4:4 when false. Default: true.
    pub chroma_subsampling: bool,
}

impl Default for JpegSettings {
    fn default() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
            progressive: false,
            chroma_subsampling: true,
        }
    }
}

/// Output image format together with its encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum OutputFormat {
    Png(PngSettings),
    Jpeg(JpegSettings),
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Png(PngSettings::default())
    }
}

impl OutputFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png(_) => "png",
            OutputFormat::Jpeg(_) => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png(_) => "image/png",
            OutputFormat::Jpeg(_) => "image/jpeg",
        }
    }

    pub fn is_png(&self) -> bool {
        matches!(self, OutputFormat::Png(_))
    }

    fn validate(&self) -> Result<(), Pdf2ImgError> {
        match self {
            OutputFormat::Png(png) => {
                if png.compression_level > 9 {
                    return Err(Pdf2ImgError::InvalidConfig(format!(
                        "PNG compression level must be 0–9, got {}",
                        png.compression_level
                    )));
                }
                if let Some(ref palette) = png.palette {
                    if palette.is_empty() || palette.len() > 256 {
                        return Err(Pdf2ImgError::InvalidConfig(format!(
                            "PNG palette must have 1–256 entries, got {}",
                            palette.len()
                        )));
                    }
                    if usize::from(png.background_index) >= palette.len() {
                        return Err(Pdf2ImgError::InvalidConfig(format!(
                            "PNG background index {} is outside the {}-entry palette",
                            png.background_index,
                            palette.len()
                        )));
                    }
                }
            }
            OutputFormat::Jpeg(jpeg) => {
                if !(0.0..=1.0).contains(&jpeg.quality) {
                    return Err(Pdf2ImgError::InvalidConfig(format!(
                        "JPEG quality must be 0.0–1.0, got {}",
                        jpeg.quality
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Where each rasterised page ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// `page-<N>.<ext>` inside the output directory (default).
    #[default]
    Files,
    /// Inline `data:<mime>;base64,…` strings; nothing touches the disk.
    DataUrl,
}
