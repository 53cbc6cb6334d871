//! Configuration for LocalLens.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use locallens_folder_scan::ScanConfig;
use locallens_inference::{CacheType, DEFAULT_DESCRIBE_PROMPT, ModelConfig};

use crate::error::{LensError, Result};

/// Top-level configuration, usually read from a TOML file.
///
/// ```toml
/// index_path = "/home/me/.local/share/locallens/index.json"
/// model_id = "embeddinggemma-300m-q8_0"
///
/// [describer.model]
/// model_files = ["/models/qwen2.5-vl-3b.gguf"]
/// projection_file = "/models/mmproj-qwen2.5-vl-3b.gguf"
///
/// [embedder.model]
/// model_files = ["/models/embeddinggemma-300m.gguf"]
///
/// [scan]
/// max_depth = 4
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    /// Where the embedding store is persisted.
    pub index_path: PathBuf,

    /// Embedding model identifier recorded in the index file.
    pub model_id: Option<String>,

    /// Embedding dimension, if known up front.
    pub expected_dimension: Option<usize>,

    /// Image describer settings.
    pub describer: DescriberConfig,

    /// Text embedder settings.
    pub embedder: EmbedderConfig,

    /// Which files count as images.
    pub scan: ScanConfig,
}

impl LensConfig {
    /// Create a new configuration with default values.
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            model_id: None,
            expected_dimension: None,
            describer: DescriberConfig::default(),
            embedder: EmbedderConfig::default(),
            scan: ScanConfig::default(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LensError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&source)
    }

    /// Set the index path.
    pub fn with_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = path.into();
        self
    }

    /// Set the embedding model identifier.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Fix the embedding dimension.
    pub fn with_expected_dimension(mut self, dimension: usize) -> Self {
        self.expected_dimension = Some(dimension);
        self
    }

    /// Set the describer model.
    pub fn with_describer_model(mut self, model: ModelConfig) -> Self {
        self.describer.model = model;
        self
    }

    /// Set the embedder model.
    pub fn with_embedder_model(mut self, model: ModelConfig) -> Self {
        self.embedder.model = model;
        self
    }

    /// Set the describe prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.describer.prompt = prompt.into();
        self
    }

    /// Set the scan configuration.
    pub fn with_scan(mut self, scan: ScanConfig) -> Self {
        self.scan = scan;
        self
    }

    /// Check every setting before any model is touched.
    pub fn validate(&self) -> Result<()> {
        if self.index_path.as_os_str().is_empty() {
            return Err(config_error("index_path must not be empty"));
        }
        if self.expected_dimension == Some(0) {
            return Err(config_error("expected_dimension must be positive"));
        }
        if self.model_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(config_error("model_id must not be blank"));
        }

        self.describer
            .model
            .validate()
            .map_err(|e| config_error(format!("describer: {e}")))?;
        if self.describer.model.projection_file.is_none() {
            return Err(config_error("describer: projection_file is required"));
        }
        if self.describer.prompt.trim().is_empty() {
            return Err(config_error("describer: prompt must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.describer.temperature) {
            return Err(config_error(format!(
                "describer: temperature {} outside [0, 2]",
                self.describer.temperature
            )));
        }
        if self.describer.max_tokens == 0 {
            return Err(config_error("describer: max_tokens must be positive"));
        }

        self.embedder
            .model
            .validate()
            .map_err(|e| config_error(format!("embedder: {e}")))?;

        self.scan
            .validate()
            .map_err(|e| config_error(format!("scan: {e}")))?;
        Ok(())
    }
}

impl Default for LensConfig {
    fn default() -> Self {
        Self::new(
            dirs::data_dir()
                .unwrap_or_default()
                .join("locallens")
                .join("index.json"),
        )
    }
}

/// Settings for the image describer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriberConfig {
    /// Model parameters. Fields left out of the file take the vision
    /// presets.
    #[serde(deserialize_with = "vision_model")]
    pub model: ModelConfig,

    /// Instruction sent with every image.
    pub prompt: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Token budget per description.
    pub max_tokens: u32,
}

impl Default for DescriberConfig {
    fn default() -> Self {
        let mut model = ModelConfig::vision(Vec::new(), PathBuf::new());
        model.projection_file = None;
        Self {
            model,
            prompt: DEFAULT_DESCRIBE_PROMPT.to_string(),
            temperature: 0.3,
            max_tokens: 256,
        }
    }
}

/// Settings for the text embedder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    /// Model parameters.
    pub model: ModelConfig,

    /// Truncate over-long text instead of failing.
    pub truncate: bool,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::embedding(Vec::new()),
            truncate: true,
        }
    }
}

/// Overlay a partial `[describer.model]` table on the vision presets.
fn vision_model<'de, D>(deserializer: D) -> std::result::Result<ModelConfig, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Partial {
        model_files: Option<Vec<PathBuf>>,
        projection_file: Option<PathBuf>,
        context_window: Option<u32>,
        batch_size: Option<u32>,
        micro_batch_size: Option<u32>,
        cache_type: Option<CacheType>,
        flash_attention: Option<bool>,
    }

    let partial = Partial::deserialize(deserializer)?;
    let mut model = DescriberConfig::default().model;
    if let Some(files) = partial.model_files {
        model.model_files = files;
    }
    model.projection_file = partial.projection_file;
    if let Some(tokens) = partial.context_window {
        model.context_window = tokens;
    }
    if let Some(batch) = partial.batch_size {
        model.batch_size = batch;
    }
    if let Some(micro_batch) = partial.micro_batch_size {
        model.micro_batch_size = micro_batch;
    }
    if let Some(cache_type) = partial.cache_type {
        model.cache_type = cache_type;
    }
    if let Some(flash) = partial.flash_attention {
        model.flash_attention = flash;
    }
    Ok(model)
}

fn config_error(message: impl Into<String>) -> LensError {
    LensError::Configuration(message.into())
}
