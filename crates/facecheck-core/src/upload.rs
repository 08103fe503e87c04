//! Upload boundary: the image a user submits for identification.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Declared types the tool accepts from a user.
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Base name the upload is staged under inside the work directory.
const STAGED_NAME: &str = "src";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("failed to read upload {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported upload type {mime_type} for {name} (expected PNG or JPEG)")]
    UnsupportedType { name: String, mime_type: String },
    #[error("failed to stage upload at {path}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An uploaded image payload with its declared metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Upload {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    #[serde(skip)]
    bytes: Vec<u8>,
}

impl Upload {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        Self {
            mime_type: mime_type_for(&name).to_string(),
            size: bytes.len() as u64,
            name,
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        let bytes = std::fs::read(path).map_err(|source| UploadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_bytes(name, bytes))
    }

    /// Reject anything not declared as PNG or JPEG. The content itself is
    /// sniffed later, during normalization.
    pub fn validate(&self) -> Result<(), UploadError> {
        match extension(&self.name) {
            Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
            _ => Err(UploadError::UnsupportedType {
                name: self.name.clone(),
                mime_type: self.mime_type.clone(),
            }),
        }
    }

    /// Write the payload to `<work_dir>/src.<ext>` and return that path.
    pub fn stage(&self, work_dir: &Path) -> Result<PathBuf, UploadError> {
        let ext = match extension(&self.name).as_deref() {
            Some("png") => "png",
            _ => "jpg",
        };
        let path = work_dir.join(format!("{STAGED_NAME}.{ext}"));
        std::fs::write(&path, &self.bytes).map_err(|source| UploadError::Stage {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(name = %self.name, staged = %path.display(), size = self.size, "upload staged");
        Ok(path)
    }
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn mime_type_for(name: &str) -> &'static str {
    match extension(name).as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tif" | "tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}
