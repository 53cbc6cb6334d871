//! Error types for the embedding store.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur in the embedding store.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An entry was added without a vector.
    #[error("entry {id} has an empty embedding")]
    EmptyEmbedding { id: String },

    /// Reading or writing the index file failed.
    #[error("failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The index file could not be encoded or decoded.
    #[error("serialization error in {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The index file was written for a different model or dimension.
    #[error("{} was written with {field} {found}, expected {expected}", path.display())]
    HeaderMismatch {
        path: PathBuf,
        field: &'static str,
        expected: String,
        found: String,
    },

    /// The index file uses a format this build cannot read.
    #[error("{} has unsupported format version {version}", path.display())]
    UnsupportedFormat { path: PathBuf, version: u32 },
}

impl EmbeddingError {
    /// Whether the error came from reading or writing the index file.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::Persistence { .. }
                | Self::Serialization { .. }
                | Self::HeaderMismatch { .. }
                | Self::UnsupportedFormat { .. }
        )
    }
}
