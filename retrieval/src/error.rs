//! Error types for indexing and search.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for LocalLens operations.
pub type Result<T> = std::result::Result<T, LensError>;

/// Errors that can occur while indexing or searching.
#[derive(Error, Debug)]
pub enum LensError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Model lifecycle or inference error.
    #[error("inference error: {0}")]
    Inference(#[from] locallens_inference::InferenceError),

    /// Embedding store error.
    #[error("embedding store error: {0}")]
    Embedding(#[from] locallens_embeddings::EmbeddingError),

    /// Image enumeration error.
    #[error("scan error: {0}")]
    Scan(#[from] locallens_folder_scan::ScanError),

    /// IO error.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// A blocking task panicked or was aborted.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,
}

impl LensError {
    /// Whether this error was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Inference(e) => e.is_cancelled(),
            _ => false,
        }
    }
}
