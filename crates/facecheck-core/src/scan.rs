//! Reference set enumeration.
//!
//! A reference set is a flat directory of face images maintained outside
//! this tool. Only regular files directly inside it are candidates.

use std::fs::ReadDir;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("reference directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One candidate file in the reference set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub path: PathBuf,
    /// File name as shown to the user.
    pub name: String,
}

/// Handle to a reference directory that is known to exist.
#[derive(Debug, Clone)]
pub struct ReferenceSet {
    dir: PathBuf,
}

impl ReferenceSet {
    /// Check that `dir` exists and is a directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ScanError> {
        let dir = dir.into();
        match std::fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => Ok(Self { dir }),
            Ok(_) => Err(ScanError::NotADirectory(dir)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ScanError::DirectoryNotFound(dir))
            }
            Err(source) => Err(ScanError::Io { path: dir, source }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Start a fresh, lazy pass over the directory.
    ///
    /// Each call re-reads the directory, so the set can be enumerated any
    /// number of times. Order is whatever the filesystem reports.
    pub fn entries(&self) -> Result<ReferenceEntries, ScanError> {
        let inner = std::fs::read_dir(&self.dir).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ScanError::DirectoryNotFound(self.dir.clone())
            } else {
                ScanError::Io {
                    path: self.dir.clone(),
                    source,
                }
            }
        })?;
        Ok(ReferenceEntries { inner })
    }
}

/// Iterator over the regular files of a [`ReferenceSet`].
///
/// Subdirectories are not descended into. Entries that cannot be read are
/// logged and skipped.
pub struct ReferenceEntries {
    inner: ReadDir,
}

impl Iterator for ReferenceEntries {
    type Item = ReferenceEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };

            let path = entry.path();
            // Follows symlinks, so a link to an image counts as a file
            if !path.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            return Some(ReferenceEntry { path, name });
        }
    }
}
