//! Error types for folder scanning.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Errors that can occur while enumerating images.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Directory not found.
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// The root exists but is a file.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Invalid exclude pattern or extension.
    #[error("invalid scan configuration: {0}")]
    InvalidPattern(String),

    /// The root could not be inspected.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Walking the tree failed.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}
