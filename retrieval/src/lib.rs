//! # LocalLens Retrieval
//!
//! This crate ties the inference handles, the embedding store and folder
//! scanning together into image indexing and semantic search.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           LocalLens                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  Describer   │  │   Embedder   │  │  Embedding   │           │
//! │  │   Handle     │  │    Handle    │  │    Store     │           │
//! │  └──────────────┘  └──────────────┘  └──────────────┘           │
//! │         │                │                  │                   │
//! │         └────────┬───────┴──────────┬───────┘                   │
//! │                  ▼                  ▼                           │
//! │          ┌──────────────┐   ┌──────────────┐                    │
//! │          │   Indexing   │   │    Query     │                    │
//! │          │   Pipeline   │   │    Engine    │                    │
//! │          └──────────────┘   └──────────────┘                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use locallens_retrieval::{CancellationToken, LensConfig, LocalLens};
//!
//! let config = LensConfig::from_file("locallens.toml").await?;
//! let lens = LocalLens::open(config, &backend).await?;
//! let cancel = CancellationToken::new();
//!
//! let report = lens.index_folder(&cancel, "~/Pictures").await?;
//! let hits = lens.search(&cancel, "a dog on the beach", 5).await?;
//! lens.close(&cancel).await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod indexing;
pub mod query;
pub mod residency;

pub use config::{DescriberConfig, EmbedderConfig, LensConfig};
pub use engine::{LensStats, LocalLens};
pub use error::{LensError, Result};
pub use indexing::{IndexPhase, IndexReport, IndexingPipeline, ItemFailure};
pub use query::QueryEngine;
pub use residency::ModelResidency;

// Re-export from dependencies for convenience
pub use locallens_embeddings::{EmbeddingStore, Entry, SearchResult};
pub use locallens_folder_scan::ScanConfig;
pub use locallens_inference::{CancellationToken, InferenceBackend, ModelConfig, ResourceState};
