//! Traits implemented by the inference runtime.
//!
//! The runtime itself (llama.cpp bindings, a remote server, a test double)
//! lives outside this crate. Handles only ever see these traits.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::ModelConfig;
use crate::request::{DescribeChunk, DescribeRequest, EmbedRequest, EmbedResponse};

/// Error type produced by runtime implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for runtime calls.
pub type BackendResult<T> = std::result::Result<T, BoxError>;

/// A model instance that is resident in memory.
#[async_trait]
pub trait LoadedModel: Send + Sync {
    /// Release the instance's resources. The handle drops the instance
    /// right after this returns, whatever the outcome.
    async fn release(&self) -> BackendResult<()> {
        Ok(())
    }
}

/// A loaded vision model.
#[async_trait]
pub trait VisionModel: LoadedModel {
    /// Start describing an image. The returned stream must be finite.
    async fn describe_stream(
        &self,
        request: DescribeRequest,
    ) -> BackendResult<BoxStream<'static, DescribeChunk>>;
}

/// A loaded text embedding model.
#[async_trait]
pub trait EmbeddingModel: LoadedModel {
    /// Embed one text.
    async fn embed(&self, request: EmbedRequest) -> BackendResult<EmbedResponse>;
}

/// Allocates model instances of one kind.
#[async_trait]
pub trait ModelLoader<M: ?Sized + 'static>: Send + Sync {
    /// Load a model with the given configuration.
    async fn load(&self, config: &ModelConfig) -> BackendResult<Box<M>>;
}

/// An inference runtime able to load both capabilities.
pub trait InferenceBackend: Send + Sync {
    /// Loader for the image describer.
    fn vision_loader(&self) -> Arc<dyn ModelLoader<dyn VisionModel>>;

    /// Loader for the text embedder.
    fn embedding_loader(&self) -> Arc<dyn ModelLoader<dyn EmbeddingModel>>;
}
