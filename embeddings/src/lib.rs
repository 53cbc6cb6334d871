//! # Embeddings
//!
//! This crate stores image embeddings for LocalLens and ranks them against a
//! query vector.
//!
//! ## Features
//!
//! - **Embedding Store**: Concurrent id → entry mapping with a fixed dimension
//! - **Crash-safe Persistence**: Whole-store JSON snapshots, written atomically
//! - **Similarity Ranking**: Deterministic cosine top-K
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Embedding Store                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  add/get/remove ──► RwLock<HashMap<id, Entry>> ──► all()        │
//! │                            │                        │           │
//! │                            ▼                        ▼           │
//! │                 Snapshot (tmp + rename)        find_top_k       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod similarity;
mod snapshot;
pub mod store;

pub use error::{EmbeddingError, Result};
pub use similarity::{SearchResult, cosine_similarity, find_top_k};
pub use snapshot::FORMAT_VERSION;
pub use store::{EmbeddingStore, Entry};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
