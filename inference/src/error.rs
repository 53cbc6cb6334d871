//! Error types for the inference layer.

use thiserror::Error;

use crate::backend::BoxError;
use crate::handle::CapabilityKind;

/// Result type alias for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;

/// Errors that can occur while managing or invoking a model.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// Bad construction parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The handle was invoked while no model was loaded.
    #[error("{kind} model is not loaded")]
    ResourceUnavailable { kind: CapabilityKind },

    /// The inference runtime reported a failure.
    #[error("{kind} inference failed: {source}")]
    Upstream {
        kind: CapabilityKind,
        #[source]
        source: BoxError,
    },

    /// The request was rejected before reaching the runtime.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,
}

impl InferenceError {
    /// Whether this error was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this error means the handle had no model loaded.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ResourceUnavailable { .. })
    }
}
