//! Input loading: turn a path or an owned buffer into PDF bytes.
//!
//! Paths are read fully and synchronously when the [`SourceDocument`] is
//! built, before any conversion starts. The bytes are not inspected here:
//! deciding whether they form a valid PDF is the engine's job, and its
//! verdict reaches the caller as [`Pdf2ImgError::CorruptPdf`].

use crate::error::Pdf2ImgError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Where the PDF comes from. Exactly one of the two.
#[derive(Debug, Clone)]
pub enum PdfInput {
    FromPath(PathBuf),
    FromBytes(Vec<u8>),
}

impl From<&Path> for PdfInput {
    fn from(p: &Path) -> Self {
        PdfInput::FromPath(p.to_path_buf())
    }
}

impl From<PathBuf> for PdfInput {
    fn from(p: PathBuf) -> Self {
        PdfInput::FromPath(p)
    }
}

impl From<&str> for PdfInput {
    fn from(p: &str) -> Self {
        PdfInput::FromPath(PathBuf::from(p))
    }
}

impl From<Vec<u8>> for PdfInput {
    fn from(bytes: Vec<u8>) -> Self {
        PdfInput::FromBytes(bytes)
    }
}

/// PDF bytes held in memory for the lifetime of a converter.
///
/// Cloning is cheap; the buffer is shared and never mutated.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    path: Option<PathBuf>,
    bytes: Arc<[u8]>,
}

impl SourceDocument {
    /// Materialise the input's bytes.
    pub fn load(input: impl Into<PdfInput>) -> Result<Self, Pdf2ImgError> {
        match input.into() {
            PdfInput::FromPath(path) => Self::from_path(path),
            PdfInput::FromBytes(bytes) => Ok(Self::from_bytes(bytes)),
        }
    }

    /// Read a file eagerly.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Pdf2ImgError> {
        let path = path.as_ref().to_path_buf();
        let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Pdf2ImgError::FileNotFound { path: path.clone() },
            ErrorKind::PermissionDenied => Pdf2ImgError::PermissionDenied { path: path.clone() },
            _ => Pdf2ImgError::ReadFailed {
                path: path.clone(),
                source: e,
            },
        })?;

        debug!("Loaded {} bytes from {}", bytes.len(), path.display());
        Ok(Self {
            path: Some(path),
            bytes: bytes.into(),
        })
    }

    /// Take ownership of an in-memory buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            path: None,
            bytes: bytes.into(),
        }
    }

    /// The file the bytes were read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }
}
