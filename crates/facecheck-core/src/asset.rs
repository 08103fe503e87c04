//! Image assets on disk and the error type shared by every preparation step.

use image::{DynamicImage, ImageFormat, ImageReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Encodings the comparison service accepts without conversion.
pub const ACCEPTED_FORMATS: [ImageFormat; 2] = [ImageFormat::Jpeg, ImageFormat::Png];

#[derive(Error, Debug)]
pub enum ImageProcessingError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unrecognized image encoding: {0}")]
    UnknownFormat(PathBuf),
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{path} is {bytes} bytes after re-encoding, limit is {limit}")]
    TooLarge { path: PathBuf, bytes: u64, limit: u64 },
    #[error("preparation worker failed: {0}")]
    Worker(String),
}

/// An image file together with its sniffed encoding and pixel dimensions.
///
/// Preparation steps never modify the file behind an asset; they return a
/// new asset pointing at a derived sibling file instead.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    pub path: PathBuf,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl ImageAsset {
    /// Sniff the encoding from the file contents and read the dimensions
    /// from the header. The pixel data is not decoded.
    pub fn probe(path: impl AsRef<Path>) -> Result<Self, ImageProcessingError> {
        let path = path.as_ref();
        let reader = ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|source| ImageProcessingError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let format = reader
            .format()
            .ok_or_else(|| ImageProcessingError::UnknownFormat(path.to_path_buf()))?;

        let (width, height) =
            reader
                .into_dimensions()
                .map_err(|source| ImageProcessingError::Decode {
                    path: path.to_path_buf(),
                    source,
                })?;

        Ok(Self {
            path: path.to_path_buf(),
            format,
            width,
            height,
        })
    }

    /// Whether the encoding is one the comparison service takes as-is.
    pub fn is_accepted(&self) -> bool {
        ACCEPTED_FORMATS.contains(&self.format)
    }

    /// Size of the file on disk in bytes.
    pub fn byte_len(&self) -> Result<u64, ImageProcessingError> {
        std::fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|source| ImageProcessingError::Io {
                path: self.path.clone(),
                source,
            })
    }

    /// Read the raw encoded bytes.
    pub fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    /// Fully decode the pixel data.
    pub fn decode(&self) -> Result<DynamicImage, ImageProcessingError> {
        ImageReader::open(&self.path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|source| ImageProcessingError::Io {
                path: self.path.clone(),
                source,
            })?
            .decode()
            .map_err(|source| ImageProcessingError::Decode {
                path: self.path.clone(),
                source,
            })
    }

    /// File name for display, falling back to the full path.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Sibling path `<dir>/<stem><suffix>.jpg`.
pub(crate) fn sibling_jpeg(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{suffix}.jpg"))
}
