//! Mutual exclusion between the describer and the embedder.
//!
//! Indexing holds the exclusive side while the describer is loaded.
//! Searches hold the shared side across their embedder load and embed, so
//! they wait out the describe phase instead of loading a second model next
//! to the describer.

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use locallens_inference::CancellationToken;

use crate::error::{LensError, Result};

/// Shared between the indexing pipeline and the query engine.
#[derive(Debug, Default)]
pub struct ModelResidency {
    lock: RwLock<()>,
}

impl ModelResidency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold while the describer may be resident.
    pub async fn describer(&self, cancel: &CancellationToken) -> Result<RwLockWriteGuard<'_, ()>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LensError::Cancelled),
            guard = self.lock.write() => Ok(guard),
        }
    }

    /// Hold while the embedder is loaded or used outside an indexing run.
    pub async fn embedder(&self, cancel: &CancellationToken) -> Result<RwLockReadGuard<'_, ()>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LensError::Cancelled),
            guard = self.lock.read() => Ok(guard),
        }
    }
}
