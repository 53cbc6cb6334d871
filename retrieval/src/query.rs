//! Semantic search over the embedding store.

use std::sync::Arc;

use tracing::debug;

use locallens_embeddings::{EmbeddingStore, SearchResult, find_top_k};
use locallens_inference::{CancellationToken, EmbedRequest, Embedder};

use crate::error::Result;
use crate::residency::ModelResidency;

/// Attempts made when the embedder is unloaded between load and embed.
const MAX_EMBED_ATTEMPTS: usize = 2;

/// Answers text queries against the store.
///
/// The embedder is loaded on first use and left resident for later
/// queries. Searches wait while an indexing run has the describer loaded.
#[derive(Debug)]
pub struct QueryEngine {
    embedder: Arc<Embedder>,
    store: Arc<EmbeddingStore>,
    residency: Arc<ModelResidency>,
    truncate: bool,
}

impl QueryEngine {
    /// Create a query engine over a shared embedder and store.
    pub fn new(
        embedder: Arc<Embedder>,
        store: Arc<EmbeddingStore>,
        residency: Arc<ModelResidency>,
        truncate: bool,
    ) -> Self {
        Self {
            embedder,
            store,
            residency,
            truncate,
        }
    }

    /// Return the `k` entries most similar to `query`.
    pub async fn search(
        &self,
        cancel: &CancellationToken,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embed_query(cancel, query).await?;
        let entries = self.store.all().await;
        let results = find_top_k(&vector, &entries, k);

        debug!(
            k,
            candidates = entries.len(),
            returned = results.len(),
            top_score = ?results.first().map(|r| r.score),
            "search complete"
        );
        Ok(results)
    }

    async fn embed_query(&self, cancel: &CancellationToken, query: &str) -> Result<Vec<f32>> {
        let _embedding = self.residency.embedder(cancel).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            if !self.embedder.is_loaded() {
                self.embedder.load(cancel).await?;
            }

            let request = EmbedRequest::new(query).with_truncate(self.truncate);
            match self.embedder.embed(cancel, request).await {
                Ok(vector) => return Ok(vector),
                Err(e) if e.is_unavailable() && attempt < MAX_EMBED_ATTEMPTS => {
                    debug!(attempt, "embedder unloaded during search, reloading");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
