//! The embedding store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::snapshot::{Snapshot, SnapshotRef, write_atomic};

/// One indexed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique identifier (the source image path).
    pub id: String,

    /// Text description produced by the describer.
    pub description: String,

    /// Embedding of the description.
    pub embedding: Embedding,
}

impl Entry {
    /// Create a new entry.
    pub fn new(id: impl Into<String>, description: impl Into<String>, embedding: Embedding) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            embedding,
        }
    }

    /// Vector length of this entry.
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    /// Established dimension. Fixed when configured, otherwise taken from
    /// the first entry and forgotten when the store empties.
    dimension: Option<usize>,
}

/// Concurrent id → entry mapping backed by a single JSON file.
///
/// Reads (`get`, `len`, `all`, `save`) share the lock; writes (`add`,
/// `remove`, `load`, `clear`) take it exclusively.
pub struct EmbeddingStore {
    path: PathBuf,
    model_id: Option<String>,
    expected_dimension: Option<usize>,
    inner: RwLock<Inner>,
    /// Serializes writers of the backing file.
    save_lock: Mutex<()>,
}

impl EmbeddingStore {
    /// Create an empty store persisted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            model_id: None,
            expected_dimension: None,
            inner: RwLock::new(Inner::default()),
            save_lock: Mutex::new(()),
        }
    }

    /// Record the embedding model id in saved files and require it on load.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Fix the embedding dimension up front.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.expected_dimension = Some(dimension);
        self.inner.get_mut().dimension = Some(dimension);
        self
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Embedding model id, if configured.
    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    /// Currently established dimension.
    pub async fn dimension(&self) -> Option<usize> {
        self.inner.read().await.dimension
    }

    /// Insert or overwrite an entry.
    pub async fn add(&self, entry: Entry) -> Result<()> {
        if entry.embedding.is_empty() {
            return Err(EmbeddingError::EmptyEmbedding { id: entry.id });
        }

        let mut inner = self.inner.write().await;
        let established = inner.dimension;
        match established {
            Some(expected) if expected != entry.dimension() => {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: entry.dimension(),
                });
            }
            Some(_) => {}
            None => inner.dimension = Some(entry.dimension()),
        }

        debug!(id = %entry.id, dimension = entry.dimension(), "storing embedding");
        inner.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    /// Look up an entry by id.
    pub async fn get(&self, id: &str) -> Option<Entry> {
        self.inner.read().await.entries.get(id).cloned()
    }

    /// Remove an entry by id.
    pub async fn remove(&self, id: &str) -> Option<Entry> {
        let mut inner = self.inner.write().await;
        let removed = inner.entries.remove(id);
        if inner.entries.is_empty() && self.expected_dimension.is_none() {
            inner.dimension = None;
        }
        removed
    }

    /// Number of entries.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Whether the store has no entries.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// Point-in-time copy of every entry, sorted by id.
    pub async fn all(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self.inner.read().await.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.dimension = self.expected_dimension;
        info!(path = %self.path.display(), "cleared embedding store");
    }

    /// Write the whole store to disk atomically.
    pub async fn save(&self) -> Result<()> {
        let _writer = self.save_lock.lock().await;
        let (bytes, count) = {
            let inner = self.inner.read().await;
            let snapshot = SnapshotRef::new(self.model_id.as_deref(), inner.dimension, &inner.entries);
            (snapshot.to_bytes(&self.path)?, inner.entries.len())
        };

        write_atomic(&self.path, &bytes).await?;
        info!(path = %self.path.display(), entries = count, "saved embedding store");
        Ok(())
    }

    /// Replace the in-memory entries with the contents of the backing file.
    ///
    /// A missing file is not an error and leaves the store untouched.
    pub async fn load(&self) -> Result<()> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no saved embedding store");
                return Ok(());
            }
            Err(source) => {
                return Err(EmbeddingError::Persistence {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let decoded = Snapshot::from_bytes(&self.path, &bytes)?.validate(
            &self.path,
            self.model_id.as_deref(),
            self.expected_dimension,
        )?;

        let mut inner = self.inner.write().await;
        inner.dimension = if decoded.entries.is_empty() {
            self.expected_dimension
        } else {
            decoded.dimension
        };
        inner.entries = decoded.entries;
        info!(path = %self.path.display(), entries = inner.entries.len(), "loaded embedding store");
        Ok(())
    }
}

impl std::fmt::Debug for EmbeddingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingStore")
            .field("path", &self.path)
            .field("model_id", &self.model_id)
            .field("expected_dimension", &self.expected_dimension)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn entry(id: &str, embedding: Vec<f32>) -> Entry {
        Entry::new(id, format!("photo {id}"), embedding)
    }

    fn store_in(dir: &TempDir) -> EmbeddingStore {
        EmbeddingStore::new(dir.path().join("index.json"))
    }

    #[tokio::test]
    async fn test_add_get_remove() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.is_empty().await);

        store.add(entry("a.png", vec![1.0, 0.0])).await.unwrap();
        store.add(entry("b.png", vec![0.0, 1.0])).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(store.get("a.png").await.unwrap().embedding, vec![1.0, 0.0]);
        assert!(store.get("missing.png").await.is_none());

        let removed = store.remove("a.png").await.unwrap();
        assert_eq!(removed.id, "a.png");
        assert!(store.remove("a.png").await.is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_add_overwrites_existing_id() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.add(entry("a.png", vec![1.0, 0.0])).await.unwrap();
        store
            .add(Entry::new("a.png", "a red car", vec![0.5, 0.5]))
            .await
            .unwrap();

        let stored = store.get("a.png").await.unwrap();
        assert_eq!(stored.description, "a red car");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_dimension_is_enforced_and_reset_when_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.add(entry("a.png", vec![1.0, 0.0])).await.unwrap();
        let err = store.add(entry("b.png", vec![1.0, 0.0, 0.0])).await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch { expected: 2, actual: 3 }
        ));
        assert!(store.get("b.png").await.is_none());

        store.remove("a.png").await;
        assert_eq!(store.dimension().await, None);
        store.add(entry("b.png", vec![1.0, 0.0, 0.0])).await.unwrap();
        assert_eq!(store.dimension().await, Some(3));
    }

    #[tokio::test]
    async fn test_configured_dimension_survives_clear() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).with_dimension(4);

        assert!(store.add(entry("a.png", vec![1.0, 0.0])).await.is_err());
        store.add(entry("a.png", vec![1.0, 0.0, 0.0, 0.0])).await.unwrap();
        store.clear().await;

        assert!(store.is_empty().await);
        assert_eq!(store.dimension().await, Some(4));
    }

    #[tokio::test]
    async fn test_rejects_empty_embedding() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let err = store.add(entry("a.png", Vec::new())).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::EmptyEmbedding { .. }));
    }

    #[tokio::test]
    async fn test_all_is_sorted_independent_copy() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add(entry("c.png", vec![1.0])).await.unwrap();
        store.add(entry("a.png", vec![2.0])).await.unwrap();
        store.add(entry("b.png", vec![3.0])).await.unwrap();

        let mut snapshot = store.all().await;
        let ids: Vec<&str> = snapshot.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a.png", "b.png", "c.png"]);

        snapshot[0].embedding[0] = 99.0;
        snapshot.clear();
        assert_eq!(store.get("a.png").await.unwrap().embedding, vec![2.0]);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("index.json");

        let store = EmbeddingStore::new(&path).with_model_id("embeddinggemma-300m");
        store.add(entry("a.png", vec![0.1, 0.2, 0.3])).await.unwrap();
        store.add(entry("b.png", vec![-1.5, 0.0, 2.25])).await.unwrap();
        store.save().await.unwrap();

        let reopened = EmbeddingStore::new(&path).with_model_id("embeddinggemma-300m");
        reopened.add(entry("stale.png", vec![9.0, 9.0, 9.0])).await.unwrap();
        reopened.load().await.unwrap();

        assert_eq!(reopened.all().await, store.all().await);
        assert_eq!(reopened.dimension().await, Some(3));
    }

    #[tokio::test]
    async fn test_load_missing_file_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add(entry("a.png", vec![1.0])).await.unwrap();

        store.load().await.unwrap();

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_load_rejects_other_model() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");

        let store = EmbeddingStore::new(&path).with_model_id("model-a");
        store.add(entry("a.png", vec![1.0])).await.unwrap();
        store.save().await.unwrap();

        let other = EmbeddingStore::new(&path).with_model_id("model-b");
        let err = other.load().await.unwrap_err();
        assert!(err.is_persistence());
        assert!(matches!(err, EmbeddingError::HeaderMismatch { field: "model", .. }));
        assert!(other.is_empty().await);

        let err = EmbeddingStore::new(&path).with_dimension(8).load().await.unwrap_err();
        assert!(matches!(err, EmbeddingError::HeaderMismatch { field: "dimension", .. }));
    }

    #[tokio::test]
    async fn test_load_corrupt_file_keeps_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = EmbeddingStore::new(&path);
        store.add(entry("a.png", vec![1.0])).await.unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Serialization { .. }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_access() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store_in(&dir));

        for i in 0..30 {
            store
                .add(entry(&format!("old-{i}.png"), vec![9.0, i as f32]))
                .await
                .unwrap();
        }

        let mut tasks = Vec::new();
        for remover in 0..2 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                for i in (remover..30).step_by(2).filter(|i| i % 3 != 0) {
                    let id = format!("old-{i}.png");
                    assert!(store.remove(&id).await.is_some());
                    assert!(store.get(&id).await.is_none());
                }
            }));
        }
        for writer in 0..4 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                for i in 0..50 {
                    let id = format!("w{writer}-{i}.png");
                    store.add(entry(&id, vec![writer as f32, i as f32])).await.unwrap();
                    assert!(store.get(&id).await.is_some());
                }
            }));
        }
        for _ in 0..2 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let snapshot = store.all().await;
                    assert!(snapshot.iter().all(|e| e.dimension() == 2));
                    store.save().await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // 230 added, 20 of the 30 seeded entries removed.
        assert_eq!(store.len().await, 210);
        assert!(store.get("old-3.png").await.is_some());
        assert!(store.get("old-4.png").await.is_none());
        store.save().await.unwrap();

        let reopened = store_in(&dir);
        reopened.load().await.unwrap();
        assert_eq!(reopened.len().await, 210);
    }
}
