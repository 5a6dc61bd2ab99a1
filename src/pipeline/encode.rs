//! Image encoding: `RasterSurface` → PNG/JPEG bytes, data URL, or page file.
//!
//! Encoders write straight into the destination: a `Vec` for data URLs, a
//! buffered file for `page-<N>.<ext>`. The destination writer is wrapped so
//! that an I/O failure (disk full, permission revoked) can be told apart from
//! a codec failure, even though the codec is what reports it.
//!
//! PNG goes through the `png` crate and JPEG through `jpeg-encoder`, because
//! between them they expose every setting in [`PngSettings`] and
//! [`JpegSettings`]: zlib level, row filters, palettes, `bKGD`, `pHYs`,
//! progressive scans and chroma subsampling.

use crate::config::{JpegSettings, OutputFormat, PngFilters, PngSettings};
use crate::error::Pdf2ImgError;
use crate::pipeline::render::RasterSurface;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbaImage;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const METERS_PER_INCH: f64 = 0.0254;

/// `page-<N>.<ext>`
pub fn page_file_name(page_num: usize, format: &OutputFormat) -> String {
    format!("page-{}.{}", page_num, format.extension())
}

/// Stream the encoded surface into any writer.
///
/// The writer has no path attached, so its I/O failures are reported as
/// [`Pdf2ImgError::EncodeFailed`] like codec failures.
pub fn encode_to_writer<W: Write>(
    surface: &RasterSurface,
    format: &OutputFormat,
    writer: W,
    page_num: usize,
) -> Result<(), Pdf2ImgError> {
    encode_into(surface.image(), format, writer).map_err(|e| Pdf2ImgError::EncodeFailed {
        page: page_num,
        detail: match e {
            EncodeError::Io(e) => format!("write failed: {e}"),
            EncodeError::Codec(detail) => detail,
        },
    })
}

/// Encode a surface into memory.
pub fn encode_to_vec(
    surface: &RasterSurface,
    format: &OutputFormat,
    page_num: usize,
) -> Result<Vec<u8>, Pdf2ImgError> {
    let mut buf = Vec::new();
    encode_to_writer(surface, format, &mut buf, page_num)?;
    Ok(buf)
}

/// Encode a surface as a `data:<mime>;base64,…` string.
pub fn encode_data_url(
    surface: &RasterSurface,
    format: &OutputFormat,
    page_num: usize,
) -> Result<String, Pdf2ImgError> {
    let buf = encode_to_vec(surface, format, page_num)?;
    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded page {} → {} bytes, {} bytes base64",
        page_num,
        buf.len(),
        b64.len()
    );
    Ok(format!("data:{};base64,{}", format.mime_type(), b64))
}

/// Stream a surface into `<output_dir>/page-<N>.<ext>` and return that path.
///
/// On failure the file handle is closed before the error is returned. The
/// partially written file is left on disk.
pub fn write_page_file(
    surface: &RasterSurface,
    format: &OutputFormat,
    output_dir: &Path,
    page_num: usize,
) -> Result<PathBuf, Pdf2ImgError> {
    let path = output_dir.join(page_file_name(page_num, format));

    let file = File::create(&path).map_err(|e| Pdf2ImgError::OutputWriteFailed {
        path: path.clone(),
        source: e,
    })?;
    let mut writer = TrackedWriter::new(BufWriter::new(file));

    let result = encode_into(surface.image(), format, &mut writer)
        .and_then(|()| writer.flush().map_err(EncodeError::Io));

    if let Err(e) = result {
        let io_error = writer.take_error();
        drop(writer);
        return Err(match (io_error, e) {
            (Some(source), _) | (None, EncodeError::Io(source)) => {
                Pdf2ImgError::OutputWriteFailed { path, source }
            }
            (None, EncodeError::Codec(detail)) => Pdf2ImgError::EncodeFailed {
                page: page_num,
                detail,
            },
        });
    }

    debug!("Wrote page {} → {}", page_num, path.display());
    Ok(path)
}

// ── Internals ────────────────────────────────────────────────────────────

#[derive(Debug)]
enum EncodeError {
    Io(io::Error),
    Codec(String),
}

fn encode_into<W: Write>(
    image: &RgbaImage,
    format: &OutputFormat,
    writer: W,
) -> Result<(), EncodeError> {
    match format {
        OutputFormat::Png(settings) => encode_png(image, settings, writer).map_err(|e| match e {
            png::EncodingError::IoError(e) => EncodeError::Io(e),
            other => EncodeError::Codec(other.to_string()),
        }),
        OutputFormat::Jpeg(settings) => encode_jpeg(image, settings, writer),
    }
}

fn encode_png<W: Write>(
    image: &RgbaImage,
    settings: &PngSettings,
    writer: W,
) -> Result<(), png::EncodingError> {
    let mut encoder = png::Encoder::new(writer, image.width(), image.height());
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png_compression(settings.compression_level));

    match png_filter(settings.filters) {
        None => encoder.set_adaptive_filter(png::AdaptiveFilterType::Adaptive),
        Some(filter) => {
            encoder.set_adaptive_filter(png::AdaptiveFilterType::NonAdaptive);
            encoder.set_filter(filter);
        }
    }

    if let Some(ppi) = settings.resolution {
        let ppm = (f64::from(ppi) / METERS_PER_INCH).round() as u32;
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppm,
            yppu: ppm,
            unit: png::Unit::Meter,
        }));
    }

    match settings.palette {
        Some(ref palette) => {
            encoder.set_color(png::ColorType::Indexed);
            encoder.set_palette(palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect::<Vec<u8>>());
            encoder.set_trns(palette.iter().map(|c| c[3]).collect::<Vec<u8>>());

            let indices = quantize(image, palette);
            let mut png_writer = encoder.write_header()?;
            png_writer.write_chunk(png::chunk::ChunkType(*b"bKGD"), &[settings.background_index])?;
            png_writer.write_image_data(&indices)?;
            png_writer.finish()
        }
        None => {
            encoder.set_color(png::ColorType::Rgba);
            let mut png_writer = encoder.write_header()?;
            png_writer.write_image_data(image.as_raw())?;
            png_writer.finish()
        }
    }
}

fn png_compression(level: u8) -> png::Compression {
    match level {
        0..=3 => png::Compression::Fast,
        4..=6 => png::Compression::Default,
        _ => png::Compression::Best,
    }
}

/// `None` means adaptive filtering.
fn png_filter(filters: PngFilters) -> Option<png::FilterType> {
    match filters {
        PngFilters::All => None,
        PngFilters::None => Some(png::FilterType::NoFilter),
        PngFilters::Sub => Some(png::FilterType::Sub),
        PngFilters::Up => Some(png::FilterType::Up),
        PngFilters::Avg => Some(png::FilterType::Avg),
        PngFilters::Paeth => Some(png::FilterType::Paeth),
    }
}

/// Map every pixel to its nearest palette entry.
fn quantize(image: &RgbaImage, palette: &[[u8; 4]]) -> Vec<u8> {
    let mut cache: HashMap<[u8; 4], u8> = HashMap::new();
    image
        .pixels()
        .map(|px| {
            *cache.entry(px.0).or_insert_with(|| {
                palette
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, entry)| colour_distance(px.0, **entry))
                    .map(|(i, _)| i as u8)
                    .unwrap_or(0)
            })
        })
        .collect()
}

fn colour_distance(a: [u8; 4], b: [u8; 4]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = i32::from(x) - i32::from(y);
            (d * d) as u32
        })
        .sum()
}

fn encode_jpeg<W: Write>(
    image: &RgbaImage,
    settings: &JpegSettings,
    writer: W,
) -> Result<(), EncodeError> {
    let (width, height) = match (u16::try_from(image.width()), u16::try_from(image.height())) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(EncodeError::Codec(format!(
                "{}x{} px exceeds the JPEG limit of 65535 px per side",
                image.width(),
                image.height()
            )))
        }
    };

    let mut encoder = jpeg_encoder::Encoder::new(writer, jpeg_quality(settings.quality));
    encoder.set_progressive(settings.progressive);
    encoder.set_sampling_factor(if settings.chroma_subsampling {
        jpeg_encoder::SamplingFactor::R_4_2_0
    } else {
        jpeg_encoder::SamplingFactor::R_4_4_4
    });

    let rgb = flatten_onto_white(image);
    encoder
        .encode(&rgb, width, height, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| EncodeError::Codec(e.to_string()))
}

/// 0.0–1.0 → 1–100.
fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// JPEG has no alpha channel; composite over white like a page background.
fn flatten_onto_white(image: &RgbaImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(image.width() as usize * image.height() as usize * 3);
    for px in image.pixels() {
        let [r, g, b, a] = px.0;
        let a = u32::from(a);
        for c in [r, g, b] {
            rgb.push(((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8);
        }
    }
    rgb
}

/// Remembers the first real I/O error seen by the destination.
struct TrackedWriter<W> {
    inner: W,
    error: Option<io::Error>,
}

impl<W> TrackedWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, error: None }
    }

    fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    fn record(&mut self, e: io::Error) -> io::Error {
        if e.kind() == ErrorKind::Interrupted {
            return e;
        }
        let copy = io::Error::new(e.kind(), e.to_string());
        self.error.get_or_insert(e);
        copy
    }
}

impl<W: Write> Write for TrackedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner.write(buf) {
            Ok(n) => Ok(n),
            Err(e) => Err(self.record(e)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.flush() {
            Ok(()) => Ok(()),
            Err(e) => Err(self.record(e)),
        }
    }
}
