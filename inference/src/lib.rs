//! # Inference
//!
//! This crate owns the two heavyweight inference capabilities used by
//! LocalLens: the image **describer** and the text **embedder**.
//!
//! ## Features
//!
//! - **Resource Handles**: Exclusive, stateful wrappers around one loaded model
//! - **Typed Requests**: Explicit request structs per capability
//! - **Streaming**: Lazy, cancellable description fragments
//! - **Collaborator Traits**: The seam to the actual inference runtime
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Resource Handle                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ModelLoader ──► Box<Model> ──► RwLock (read = invoke,          │
//! │       │                                  write = load/unload)   │
//! │       ▼                                                         │
//! │  ModelConfig        watch::Sender<ResourceState>                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod handle;
pub mod request;
pub mod stream;

pub use backend::{
    BackendResult, BoxError, EmbeddingModel, InferenceBackend, LoadedModel, ModelLoader,
    VisionModel,
};
pub use config::{CacheType, ModelConfig};
pub use error::{InferenceError, Result};
pub use handle::{CapabilityKind, Describer, Embedder, ResourceHandle, ResourceState};
pub use request::{
    DEFAULT_DESCRIBE_PROMPT, DescribeChunk, DescribeRequest, EmbedRequest, EmbedResponse,
    FinishReason,
};
pub use stream::DescriptionStream;

/// Re-exported so callers can build tokens without a direct dependency.
pub use tokio_util::sync::CancellationToken;
