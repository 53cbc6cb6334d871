//! The `LocalLens` facade.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use locallens_embeddings::{EmbeddingStore, SearchResult};
use locallens_inference::{
    CancellationToken, CapabilityKind, Describer, Embedder, InferenceBackend, ResourceState,
};

use crate::config::LensConfig;
use crate::error::Result;
use crate::indexing::{IndexReport, IndexingPipeline};
use crate::query::QueryEngine;
use crate::residency::ModelResidency;

/// Owns both model handles and the store, and wires them into indexing and
/// search.
///
/// This is the main entry point for LocalLens:
/// - Batch indexing of image folders
/// - Semantic search over indexed images
/// - Orderly release of both models
pub struct LocalLens {
    config: LensConfig,
    describer: Arc<Describer>,
    embedder: Arc<Embedder>,
    store: Arc<EmbeddingStore>,
    indexing: IndexingPipeline,
    query: QueryEngine,
}

impl LocalLens {
    /// Build the engine. No model is loaded and nothing is read from disk.
    pub fn new(config: LensConfig, backend: &dyn InferenceBackend) -> Result<Self> {
        config.validate()?;

        let describer = Arc::new(Describer::new(
            CapabilityKind::Describer,
            config.describer.model.clone(),
            backend.vision_loader(),
        )?);
        let embedder = Arc::new(Embedder::new(
            CapabilityKind::Embedder,
            config.embedder.model.clone(),
            backend.embedding_loader(),
        )?);

        let mut store = EmbeddingStore::new(&config.index_path);
        if let Some(model_id) = &config.model_id {
            store = store.with_model_id(model_id);
        }
        if let Some(dimension) = config.expected_dimension {
            store = store.with_dimension(dimension);
        }
        let store = Arc::new(store);
        let residency = Arc::new(ModelResidency::new());

        let indexing = IndexingPipeline::new(
            Arc::clone(&describer),
            Arc::clone(&embedder),
            Arc::clone(&store),
            Arc::clone(&residency),
            &config,
        );
        let query = QueryEngine::new(
            Arc::clone(&embedder),
            Arc::clone(&store),
            residency,
            config.embedder.truncate,
        );

        Ok(Self {
            config,
            describer,
            embedder,
            store,
            indexing,
            query,
        })
    }

    /// Build the engine and load the persisted index, if any.
    pub async fn open(config: LensConfig, backend: &dyn InferenceBackend) -> Result<Self> {
        let lens = Self::new(config, backend)?;
        lens.store.load().await?;
        info!(
            index_path = %lens.config.index_path.display(),
            entries = lens.store.len().await,
            "opened index"
        );
        Ok(lens)
    }

    /// Index every image under `folder`.
    pub async fn index_folder(
        &self,
        cancel: &CancellationToken,
        folder: impl AsRef<Path>,
    ) -> Result<IndexReport> {
        self.indexing.index_folder(cancel, folder.as_ref()).await
    }

    /// Return the `k` indexed images most similar to `query`.
    pub async fn search(
        &self,
        cancel: &CancellationToken,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.query.search(cancel, query, k).await
    }

    /// Unload both models. Both are attempted; the first error is returned.
    pub async fn close(&self, cancel: &CancellationToken) -> Result<()> {
        let describer = self.describer.unload(cancel).await;
        let embedder = self.embedder.unload(cancel).await;
        describer?;
        embedder?;
        info!("closed");
        Ok(())
    }

    /// The configuration in use.
    pub fn config(&self) -> &LensConfig {
        &self.config
    }

    /// The shared embedding store.
    pub fn store(&self) -> &Arc<EmbeddingStore> {
        &self.store
    }

    /// The describer handle.
    pub fn describer(&self) -> &Arc<Describer> {
        &self.describer
    }

    /// The embedder handle.
    pub fn embedder(&self) -> &Arc<Embedder> {
        &self.embedder
    }

    /// Get engine statistics.
    pub async fn stats(&self) -> LensStats {
        LensStats {
            index_path: self.config.index_path.clone(),
            entries: self.store.len().await,
            dimension: self.store.dimension().await,
            describer: self.describer.state(),
            embedder: self.embedder.state(),
        }
    }
}

impl std::fmt::Debug for LocalLens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalLens")
            .field("index_path", &self.config.index_path)
            .field("describer", &self.describer)
            .field("embedder", &self.embedder)
            .finish_non_exhaustive()
    }
}

/// Statistics about the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LensStats {
    /// Where the index is persisted.
    pub index_path: PathBuf,

    /// Number of entries in the store.
    pub entries: usize,

    /// Established embedding dimension.
    pub dimension: Option<usize>,

    /// Describer lifecycle state.
    pub describer: ResourceState,

    /// Embedder lifecycle state.
    pub embedder: ResourceState,
}
