//! Model configuration fixed at handle construction.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, Result};

/// Parameters used to allocate a model instance.
///
/// A handle keeps its `ModelConfig` for its whole life; every load uses the
/// same values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model weight files (GGUF shards).
    pub model_files: Vec<PathBuf>,

    /// Multimodal projection file, required by vision models.
    pub projection_file: Option<PathBuf>,

    /// Context window in tokens.
    pub context_window: u32,

    /// Logical batch size.
    pub batch_size: u32,

    /// Physical micro-batch size.
    pub micro_batch_size: u32,

    /// KV cache element type.
    pub cache_type: CacheType,

    /// Whether flash attention is enabled.
    pub flash_attention: bool,
}

impl ModelConfig {
    /// Settings for the image describer.
    pub fn vision(model_files: Vec<PathBuf>, projection_file: impl Into<PathBuf>) -> Self {
        Self {
            model_files,
            projection_file: Some(projection_file.into()),
            context_window: 8192,
            batch_size: 2048,
            micro_batch_size: 2048,
            cache_type: CacheType::Q8_0,
            flash_attention: false,
        }
    }

    /// Settings for the text embedder.
    pub fn embedding(model_files: Vec<PathBuf>) -> Self {
        Self {
            model_files,
            projection_file: None,
            context_window: 2048,
            batch_size: 2048,
            micro_batch_size: 512,
            cache_type: CacheType::Q8_0,
            flash_attention: true,
        }
    }

    /// Set the context window.
    pub fn with_context_window(mut self, tokens: u32) -> Self {
        self.context_window = tokens;
        self
    }

    /// Set the batch sizes.
    pub fn with_batch_sizes(mut self, batch: u32, micro_batch: u32) -> Self {
        self.batch_size = batch;
        self.micro_batch_size = micro_batch;
        self
    }

    /// Check that the parameters can describe a loadable model.
    pub fn validate(&self) -> Result<()> {
        if self.model_files.is_empty() {
            return Err(InferenceError::Configuration(
                "at least one model file is required".to_string(),
            ));
        }
        if self.context_window == 0 {
            return Err(InferenceError::Configuration(
                "context window must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 || self.micro_batch_size == 0 {
            return Err(InferenceError::Configuration(
                "batch sizes must be positive".to_string(),
            ));
        }
        if self.micro_batch_size > self.batch_size {
            return Err(InferenceError::Configuration(format!(
                "micro batch {} exceeds batch {}",
                self.micro_batch_size, self.batch_size
            )));
        }
        Ok(())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::embedding(Vec::new())
    }
}

/// KV cache element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    F16,
    Q8_0,
    Q4_0,
}
