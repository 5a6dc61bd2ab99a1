//! Pipeline stages for PDF-to-image conversion.
//!
//! Each submodule implements one step of the per-page loop driven by
//! [`crate::convert`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ range ──▶ render ──▶ encode
//! (bytes)   (pages)   (surface)  (file / data URL)
//! ```
//!
//! 1. [`input`]  — read the PDF into memory once, up front
//! 2. [`range`]  — turn a lenient page selection into a concrete range
//! 3. [`render`] — resolve the viewport and paint one page onto a fresh surface
//! 4. [`encode`] — PNG/JPEG-encode the surface into a file or a data URL

pub mod encode;
pub mod input;
pub mod range;
pub mod render;
