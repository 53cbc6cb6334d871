//! Scripted inference runtime for integration tests.
//!
//! Image files contain plain text naming their subject. The vision model
//! echoes it back as "a photo of <subject>"; the embedding model counts
//! vocabulary words, so descriptions and queries that share words score
//! high.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use tempfile::TempDir;

use locallens_inference::{
    BackendResult, DescribeChunk, DescribeRequest, EmbedRequest, EmbedResponse, EmbeddingModel,
    FinishReason, InferenceBackend, LoadedModel, ModelConfig, ModelLoader, VisionModel,
};
use locallens_retrieval::LensConfig;

pub const VOCABULARY: [&str; 4] = ["dog", "cat", "beach", "mountain"];

/// Shared counters and failure switches.
#[derive(Default)]
pub struct Counters {
    pub resident: AtomicUsize,
    pub peak_resident: AtomicUsize,
    pub vision_loads: AtomicUsize,
    pub embed_loads: AtomicUsize,
    pub releases: AtomicUsize,
    pub fail_vision_load: AtomicBool,
    pub fail_embed_load: AtomicBool,
    pub fail_release: AtomicBool,
}

impl Counters {
    fn loaded(&self) {
        let now = self.resident.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_resident.fetch_max(now, Ordering::SeqCst);
    }

    fn released(&self) -> BackendResult<()> {
        self.resident.fetch_sub(1, Ordering::SeqCst);
        self.releases.fetch_add(1, Ordering::SeqCst);
        if self.fail_release.load(Ordering::SeqCst) {
            return Err("device lost while freeing model".into());
        }
        Ok(())
    }

    pub fn peak(&self) -> usize {
        self.peak_resident.load(Ordering::SeqCst)
    }

    pub fn resident(&self) -> usize {
        self.resident.load(Ordering::SeqCst)
    }
}

pub struct MockBackend {
    pub counters: Arc<Counters>,
    /// Delay per description, to widen race windows.
    pub describe_delay: Duration,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            describe_delay: Duration::ZERO,
        }
    }

    pub fn with_describe_delay(mut self, delay: Duration) -> Self {
        self.describe_delay = delay;
        self
    }
}

impl InferenceBackend for MockBackend {
    fn vision_loader(&self) -> Arc<dyn ModelLoader<dyn VisionModel>> {
        Arc::new(VisionLoader {
            counters: Arc::clone(&self.counters),
            delay: self.describe_delay,
        })
    }

    fn embedding_loader(&self) -> Arc<dyn ModelLoader<dyn EmbeddingModel>> {
        Arc::new(EmbeddingLoader {
            counters: Arc::clone(&self.counters),
        })
    }
}

struct VisionLoader {
    counters: Arc<Counters>,
    delay: Duration,
}

#[async_trait]
impl ModelLoader<dyn VisionModel> for VisionLoader {
    async fn load(&self, config: &ModelConfig) -> BackendResult<Box<dyn VisionModel>> {
        if self.counters.fail_vision_load.load(Ordering::SeqCst) {
            return Err(format!("cannot open {}", config.model_files[0].display()).into());
        }
        self.counters.vision_loads.fetch_add(1, Ordering::SeqCst);
        self.counters.loaded();
        Ok(Box::new(MockVision {
            counters: Arc::clone(&self.counters),
            delay: self.delay,
        }))
    }
}

struct MockVision {
    counters: Arc<Counters>,
    delay: Duration,
}

#[async_trait]
impl LoadedModel for MockVision {
    async fn release(&self) -> BackendResult<()> {
        self.counters.released()
    }
}

#[async_trait]
impl VisionModel for MockVision {
    async fn describe_stream(
        &self,
        request: DescribeRequest,
    ) -> BackendResult<BoxStream<'static, DescribeChunk>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let subject = String::from_utf8_lossy(&request.image).trim().to_string();
        if subject.contains("corrupt") {
            return Err("cannot decode image".into());
        }

        let chunks = if subject.contains("glitch") {
            vec![
                DescribeChunk::text("a photo of "),
                DescribeChunk::error("kv cache exhausted"),
            ]
        } else {
            let mut chunks = vec![DescribeChunk::text("a photo of")];
            chunks.extend(subject.split_whitespace().map(|w| DescribeChunk::text(format!(" {w}"))));
            chunks.push(DescribeChunk::finished(FinishReason::Stop));
            chunks
        };
        Ok(Box::pin(stream::iter(chunks)))
    }
}

struct EmbeddingLoader {
    counters: Arc<Counters>,
}

#[async_trait]
impl ModelLoader<dyn EmbeddingModel> for EmbeddingLoader {
    async fn load(&self, _config: &ModelConfig) -> BackendResult<Box<dyn EmbeddingModel>> {
        if self.counters.fail_embed_load.load(Ordering::SeqCst) {
            return Err("out of device memory".into());
        }
        self.counters.embed_loads.fetch_add(1, Ordering::SeqCst);
        self.counters.loaded();
        Ok(Box::new(MockEmbedding {
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct MockEmbedding {
    counters: Arc<Counters>,
}

#[async_trait]
impl LoadedModel for MockEmbedding {
    async fn release(&self) -> BackendResult<()> {
        self.counters.released()
    }
}

#[async_trait]
impl EmbeddingModel for MockEmbedding {
    async fn embed(&self, request: EmbedRequest) -> BackendResult<EmbedResponse> {
        let text = request.text.to_lowercase();
        if text.contains("unembeddable") {
            return Err("tokenizer rejected input".into());
        }
        Ok(EmbedResponse {
            embedding: vocabulary_vector(&text),
            model: "mock-embed".to_string(),
            tokens_used: Some(text.split_whitespace().count() as u64),
        })
    }
}

/// Word counts over [`VOCABULARY`], plus a small constant component so no
/// vector is all zeros.
pub fn vocabulary_vector(text: &str) -> Vec<f32> {
    let mut vector: Vec<f32> = VOCABULARY
        .iter()
        .map(|word| text.split_whitespace().filter(|w| w == word).count() as f32)
        .collect();
    vector.push(0.1);
    vector
}

pub fn config_for(dir: &TempDir) -> LensConfig {
    LensConfig::new(dir.path().join("index").join("index.json"))
        .with_model_id("mock-embed")
        .with_describer_model(ModelConfig::vision(
            vec!["/models/vision.gguf".into()],
            "/models/mmproj.gguf",
        ))
        .with_embedder_model(ModelConfig::embedding(vec!["/models/embed.gguf".into()]))
}

/// Write an "image" whose content names its subject.
pub fn write_image(folder: &Path, name: &str, subject: &str) {
    let path = folder.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, subject).unwrap();
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
