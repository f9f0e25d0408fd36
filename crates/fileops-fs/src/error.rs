//! Error types for filesystem access.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while accessing the filesystem.
#[derive(Debug, Error)]
pub enum FsError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Directory still has entries.
    #[error("Directory not empty: {path}")]
    DirectoryNotEmpty { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error reported by the directory walker for a single entry.
    #[error("Walk error at {path}: {message}")]
    Walk { path: PathBuf, message: String },

    /// The requested hash algorithm cannot be computed here.
    #[error("Hash algorithm not available: {algorithm}")]
    UnsupportedHash { algorithm: String },

    /// The operation is not available on this platform.
    #[error("{operation} is not supported on this platform")]
    Unsupported { operation: &'static str },
}

impl FsError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::DirectoryNotEmpty => Self::DirectoryNotEmpty { path },
            _ => Self::Io { path, source },
        }
    }
}
