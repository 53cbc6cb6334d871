//! Resource handles for the describer and embedder.
//!
//! A [`ResourceHandle`] owns at most one model instance. The instance sits in
//! a readers-writer lock: every invocation (including an open
//! [`DescriptionStream`]) holds a read lease for its whole duration, while
//! `load` and `unload` take the write lock. `unload` therefore waits for
//! in-flight calls to drain instead of freeing the model under them.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{BackendResult, BoxError, EmbeddingModel, LoadedModel, ModelLoader, VisionModel};
use crate::config::ModelConfig;
use crate::error::{InferenceError, Result};
use crate::request::{DescribeRequest, EmbedRequest};
use crate::stream::DescriptionStream;

/// Which capability a handle manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Describer,
    Embedder,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Describer => f.write_str("describer"),
            Self::Embedder => f.write_str("embedder"),
        }
    }
}

/// Lifecycle state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Unloaded,
    Loading,
    Loaded,
    Unloading,
}

type Slot<M> = Option<Box<M>>;

/// Exclusive owner of one inference model instance.
pub struct ResourceHandle<M: ?Sized + LoadedModel + 'static> {
    kind: CapabilityKind,
    config: ModelConfig,
    loader: Arc<dyn ModelLoader<M>>,
    slot: Arc<RwLock<Slot<M>>>,
    state: watch::Sender<ResourceState>,
}

/// Handle for the image describer.
pub type Describer = ResourceHandle<dyn VisionModel>;

/// Handle for the text embedder.
pub type Embedder = ResourceHandle<dyn EmbeddingModel>;

impl<M: ?Sized + LoadedModel + 'static> ResourceHandle<M> {
    /// Create an unloaded handle. The configuration is validated here and
    /// never changes afterwards.
    pub fn new(
        kind: CapabilityKind,
        config: ModelConfig,
        loader: Arc<dyn ModelLoader<M>>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| InferenceError::Configuration(format!("{kind}: {e}")))?;

        let (state, _) = watch::channel(ResourceState::Unloaded);
        Ok(Self {
            kind,
            config,
            loader,
            slot: Arc::new(RwLock::new(None)),
            state,
        })
    }

    /// The capability this handle manages.
    pub fn kind(&self) -> CapabilityKind {
        self.kind
    }

    /// The configuration used for every load.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ResourceState {
        *self.state.borrow()
    }

    /// Whether a model instance is resident and ready.
    pub fn is_loaded(&self) -> bool {
        self.state() == ResourceState::Loaded
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<ResourceState> {
        self.state.subscribe()
    }

    /// Load the model. Does nothing if it is already loaded.
    ///
    /// On failure or cancellation the handle stays unloaded.
    pub async fn load(&self, cancel: &CancellationToken) -> Result<()> {
        let mut slot = self.write_slot(cancel).await?;
        if slot.is_some() {
            debug!(kind = %self.kind, "model already loaded");
            return Ok(());
        }

        self.state.send_replace(ResourceState::Loading);
        info!(kind = %self.kind, files = self.config.model_files.len(), "loading model");
        let started = Instant::now();

        let loaded = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InferenceError::Cancelled),
            result = self.loader.load(&self.config) => result.map_err(|source| self.upstream(source)),
        };

        match loaded {
            Ok(model) => {
                *slot = Some(model);
                self.state.send_replace(ResourceState::Loaded);
                info!(
                    kind = %self.kind,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    context_window = self.config.context_window,
                    "model loaded"
                );
                Ok(())
            }
            Err(error) => {
                self.state.send_replace(ResourceState::Unloaded);
                warn!(kind = %self.kind, %error, "failed to load model");
                Err(error)
            }
        }
    }

    /// Unload the model. Does nothing if no model is loaded.
    ///
    /// Waits for in-flight invocations to finish first. Once teardown has
    /// started the instance is always dropped and the handle ends unloaded;
    /// a release failure reported by the runtime is still returned.
    pub async fn unload(&self, cancel: &CancellationToken) -> Result<()> {
        let mut slot = self.write_slot(cancel).await?;
        let Some(model) = slot.take() else {
            return Ok(());
        };

        self.state.send_replace(ResourceState::Unloading);
        info!(kind = %self.kind, "unloading model");

        let released = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InferenceError::Cancelled),
            result = model.release() => result.map_err(|source| self.upstream(source)),
        };
        drop(model);
        self.state.send_replace(ResourceState::Unloaded);

        match &released {
            Ok(()) => info!(kind = %self.kind, "model unloaded"),
            Err(error) => warn!(kind = %self.kind, %error, "model released with error"),
        }
        released
    }

    /// Run one call against the loaded model.
    ///
    /// The read lease is held until `call` completes, so a concurrent
    /// `unload` waits for it.
    pub async fn invoke<T, F>(&self, cancel: &CancellationToken, call: F) -> Result<T>
    where
        F: for<'m> FnOnce(&'m M) -> BoxFuture<'m, BackendResult<T>>,
    {
        let guard = self.read_slot(cancel).await?;
        let model = guard.as_deref().ok_or(InferenceError::ResourceUnavailable {
            kind: self.kind,
        })?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InferenceError::Cancelled),
            result = call(model) => result.map_err(|source| self.upstream(source)),
        }
    }

    async fn read_slot(&self, cancel: &CancellationToken) -> Result<RwLockReadGuard<'_, Slot<M>>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InferenceError::Cancelled),
            guard = self.slot.read() => Ok(guard),
        }
    }

    async fn read_slot_owned(&self, cancel: &CancellationToken) -> Result<OwnedRwLockReadGuard<Slot<M>>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InferenceError::Cancelled),
            guard = Arc::clone(&self.slot).read_owned() => Ok(guard),
        }
    }

    async fn write_slot(&self, cancel: &CancellationToken) -> Result<RwLockWriteGuard<'_, Slot<M>>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InferenceError::Cancelled),
            guard = self.slot.write() => Ok(guard),
        }
    }

    fn upstream(&self, source: BoxError) -> InferenceError {
        InferenceError::Upstream {
            kind: self.kind,
            source,
        }
    }
}

impl ResourceHandle<dyn VisionModel> {
    /// Start describing an image.
    ///
    /// The returned stream holds a read lease on the model; the model stays
    /// resident until the stream is finished or dropped.
    pub async fn describe_stream(
        &self,
        cancel: &CancellationToken,
        request: DescribeRequest,
    ) -> Result<DescriptionStream> {
        request.validate()?;

        let lease = self.read_slot_owned(cancel).await?;
        let model = lease.as_deref().ok_or(InferenceError::ResourceUnavailable {
            kind: self.kind,
        })?;

        let chunks = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(InferenceError::Cancelled),
            result = model.describe_stream(request) => result.map_err(|source| self.upstream(source))?,
        };

        Ok(DescriptionStream::new(self.kind, chunks, lease, cancel.clone()))
    }
}

impl ResourceHandle<dyn EmbeddingModel> {
    /// Embed one text.
    pub async fn embed(&self, cancel: &CancellationToken, request: EmbedRequest) -> Result<Vec<f32>> {
        request.validate()?;

        let response = self
            .invoke(cancel, move |model| model.embed(request))
            .await?;

        if response.embedding.is_empty() {
            return Err(self.upstream(BoxError::from("no embedding data returned")));
        }
        Ok(response.embedding)
    }
}

impl<M: ?Sized + LoadedModel + 'static> fmt::Debug for ResourceHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
