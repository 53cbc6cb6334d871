//! Two-phase batch indexing.
//!
//! ```text
//!  find_images ──► Phase 1: describer ──► (path, description)
//!                   load ─ describe* ─ unload
//!                                             │
//!                                             ▼
//!                  Phase 2: embedder  ──► EmbeddingStore::add ──► save
//!                   load ─ embed*    ─ unload
//! ```
//!
//! Only one model is resident at a time: the describe phase holds the
//! exclusive side of [`ModelResidency`], which searches share while they
//! use the embedder. A single item that fails to read,
//! describe or embed is recorded in the [`IndexReport`] and skipped; only
//! batch-level failures abort the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use locallens_embeddings::{EmbeddingStore, Entry};
use locallens_folder_scan::{ScanConfig, find_images};
use locallens_inference::{
    CancellationToken, DescribeRequest, Describer, EmbedRequest, Embedder, InferenceError,
};

use crate::config::LensConfig;
use crate::error::{LensError, Result};
use crate::residency::ModelResidency;

/// Stage at which an item failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexPhase {
    /// Reading the image file.
    Read,
    /// Describing the image.
    Describe,
    /// Embedding the description.
    Embed,
    /// Writing the entry into the store.
    Store,
}

/// A non-fatal, per-item failure.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    /// The image that failed.
    pub path: PathBuf,

    /// Where it failed.
    pub phase: IndexPhase,

    /// Rendered error.
    pub error: String,
}

/// Summary of one indexing run.
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    /// Folder that was indexed.
    pub folder: PathBuf,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Images found.
    pub attempted: usize,

    /// Images that produced a description.
    pub described: usize,

    /// Entries written to the store.
    pub embedded: usize,

    /// Items that were skipped.
    pub failures: Vec<ItemFailure>,

    /// Store size after the run.
    pub total_entries: usize,

    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl IndexReport {
    fn new(folder: &Path) -> Self {
        Self {
            folder: folder.to_path_buf(),
            started_at: Utc::now(),
            attempted: 0,
            described: 0,
            embedded: 0,
            failures: Vec::new(),
            total_entries: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Whether every image found was indexed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, path: &Path, phase: IndexPhase, error: impl ToString) {
        let failure = ItemFailure {
            path: path.to_path_buf(),
            phase,
            error: error.to_string(),
        };
        warn!(path = %path.display(), phase = ?phase, error = %failure.error, "skipping image");
        self.failures.push(failure);
    }
}

/// An image that produced a description.
#[derive(Debug)]
struct Described {
    path: PathBuf,
    id: String,
    description: String,
}

/// Per-request settings taken from the configuration.
#[derive(Debug, Clone)]
struct RequestSettings {
    prompt: String,
    temperature: f32,
    max_tokens: u32,
    truncate: bool,
}

/// Runs indexing batches against shared handles and store.
pub struct IndexingPipeline {
    describer: Arc<Describer>,
    embedder: Arc<Embedder>,
    store: Arc<EmbeddingStore>,
    residency: Arc<ModelResidency>,
    scan: ScanConfig,
    requests: RequestSettings,
    /// One batch at a time; concurrent runs would unload each other's models.
    run_lock: Mutex<()>,
}

impl IndexingPipeline {
    /// Create a pipeline over shared handles and store.
    pub fn new(
        describer: Arc<Describer>,
        embedder: Arc<Embedder>,
        store: Arc<EmbeddingStore>,
        residency: Arc<ModelResidency>,
        config: &LensConfig,
    ) -> Self {
        Self {
            describer,
            embedder,
            store,
            residency,
            scan: config.scan.clone(),
            requests: RequestSettings {
                prompt: config.describer.prompt.clone(),
                temperature: config.describer.temperature,
                max_tokens: config.describer.max_tokens,
                truncate: config.embedder.truncate,
            },
            run_lock: Mutex::new(()),
        }
    }

    /// Index every image under `folder` and persist the store.
    pub async fn index_folder(
        &self,
        cancel: &CancellationToken,
        folder: &Path,
    ) -> Result<IndexReport> {
        let _run = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LensError::Cancelled),
            guard = self.run_lock.lock() => guard,
        };

        let started = Instant::now();
        let mut report = IndexReport::new(folder);

        let root = folder.to_path_buf();
        let scan = self.scan.clone();
        let images = tokio::task::spawn_blocking(move || find_images(&root, &scan)).await??;
        report.attempted = images.len();

        if images.is_empty() {
            info!(folder = %folder.display(), "no images found");
            report.total_entries = self.store.len().await;
            report.elapsed = started.elapsed();
            return Ok(report);
        }
        info!(folder = %folder.display(), count = images.len(), "found images");

        let described = {
            let _describing = self.residency.describer(cancel).await?;

            // A search may have left the embedder resident.
            self.embedder.unload(cancel).await?;

            self.describer.load(cancel).await?;
            let described = self.describe_all(cancel, &images, &mut report).await;
            let unloaded = self.describer.unload(&CancellationToken::new()).await;
            let described = described?;
            unloaded?;
            described
        };
        report.described = described.len();

        if !described.is_empty() {
            self.embedder.load(cancel).await?;
            let embedded = self.embed_all(cancel, described, &mut report).await;
            let unloaded = self.embedder.unload(&CancellationToken::new()).await;
            report.embedded = embedded?;
            unloaded?;
        }

        self.store.save().await?;

        report.total_entries = self.store.len().await;
        report.elapsed = started.elapsed();
        info!(
            folder = %folder.display(),
            attempted = report.attempted,
            described = report.described,
            embedded = report.embedded,
            failed = report.failures.len(),
            total_entries = report.total_entries,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "indexing complete"
        );
        Ok(report)
    }

    async fn describe_all(
        &self,
        cancel: &CancellationToken,
        images: &[PathBuf],
        report: &mut IndexReport,
    ) -> Result<Vec<Described>> {
        let mut described = Vec::with_capacity(images.len());

        for path in images {
            if cancel.is_cancelled() {
                return Err(LensError::Cancelled);
            }
            debug!(path = %path.display(), "describing image");

            let Some(id) = path.to_str() else {
                report.record(path, IndexPhase::Read, "path is not valid UTF-8");
                continue;
            };

            let image = match tokio::fs::read(path).await {
                Ok(image) => image,
                Err(e) => {
                    report.record(path, IndexPhase::Read, e);
                    continue;
                }
            };

            match self.describe(cancel, image).await {
                Ok(text) if text.trim().is_empty() => {
                    report.record(path, IndexPhase::Describe, "model returned an empty description");
                }
                Ok(text) => described.push(Described {
                    path: path.clone(),
                    id: id.to_string(),
                    description: text.trim().to_string(),
                }),
                Err(e) if e.is_cancelled() => return Err(LensError::Cancelled),
                Err(e) => report.record(path, IndexPhase::Describe, e),
            }
        }

        Ok(described)
    }

    async fn describe(
        &self,
        cancel: &CancellationToken,
        image: Vec<u8>,
    ) -> std::result::Result<String, InferenceError> {
        let request = DescribeRequest::new(image)
            .with_prompt(self.requests.prompt.clone())
            .with_temperature(self.requests.temperature)
            .with_max_tokens(self.requests.max_tokens);

        self.describer
            .describe_stream(cancel, request)
            .await?
            .collect_text()
            .await
    }

    async fn embed_all(
        &self,
        cancel: &CancellationToken,
        described: Vec<Described>,
        report: &mut IndexReport,
    ) -> Result<usize> {
        let mut embedded = 0;

        for Described {
            path,
            id,
            description,
        } in described
        {
            if cancel.is_cancelled() {
                return Err(LensError::Cancelled);
            }
            debug!(path = %path.display(), "embedding description");

            let request = EmbedRequest::new(description.as_str()).with_truncate(self.requests.truncate);
            let vector = match self.embedder.embed(cancel, request).await {
                Ok(vector) => vector,
                Err(e) if e.is_cancelled() => return Err(LensError::Cancelled),
                Err(e) => {
                    report.record(&path, IndexPhase::Embed, e);
                    continue;
                }
            };

            let entry = Entry::new(id, description, vector);
            match self.store.add(entry).await {
                Ok(()) => embedded += 1,
                Err(e) => report.record(&path, IndexPhase::Store, e),
            }
        }

        Ok(embedded)
    }
}

impl std::fmt::Debug for IndexingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexingPipeline")
            .field("describer", &self.describer)
            .field("embedder", &self.embedder)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
