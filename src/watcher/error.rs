//! Error types for the directory watcher.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience type for fallible watcher operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The watched directory could not be opened or listed.
    #[error("Directory not found: {path}: {source}")]
    DirectoryNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A file expected in a watched directory could not be opened or located.
    ///
    /// Usually the file vanished between listing the directory and opening it.
    #[error("File not found: {path}: {source}")]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The OS refused a descriptor or event queue allocation.
    #[error("Resource exhausted: {reason}")]
    ResourceExhausted { reason: String },

    /// No kernel event queue is available on this target.
    #[error("Unsupported platform: {reason}")]
    Unsupported { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl WatchError {
    pub(crate) fn directory_not_found(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::DirectoryNotFound {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn file_not_found(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileNotFound {
            path: path.into(),
            source,
        }
    }

    /// True when the error means the file is gone rather than unreadable.
    ///
    /// Only vanished files are retried by a later rescan.
    pub fn is_vanished(&self) -> bool {
        match self {
            Self::FileNotFound { source, .. } | Self::DirectoryNotFound { source, .. } => {
                source.kind() == io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}
