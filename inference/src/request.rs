//! Typed requests and responses for each capability.

use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, Result};

/// Prompt sent with every image unless overridden.
pub const DEFAULT_DESCRIBE_PROMPT: &str = "Describe this image in detail for semantic search. \
Focus on objects, people, actions, colors, and setting.";

/// Request for describing one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeRequest {
    /// Encoded image bytes.
    pub image: Vec<u8>,

    /// Instruction given to the vision model.
    pub prompt: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Token budget for the description.
    pub max_tokens: u32,
}

impl DescribeRequest {
    /// Create a request with the default prompt and sampling settings.
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image,
            prompt: DEFAULT_DESCRIBE_PROMPT.to_string(),
            temperature: 0.3,
            max_tokens: 256,
        }
    }

    /// Set the prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.image.is_empty() {
            return Err(InferenceError::InvalidInput("empty image data".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(InferenceError::InvalidInput(
                "max_tokens must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// One fragment of a streamed description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribeChunk {
    /// Text delta. For an error fragment this carries the error message.
    pub content: String,

    /// Set on the last fragment of a response.
    pub finish: Option<FinishReason>,
}

impl DescribeChunk {
    /// A plain text fragment.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish: None,
        }
    }

    /// A terminal fragment with no text.
    pub fn finished(reason: FinishReason) -> Self {
        Self {
            content: String::new(),
            finish: Some(reason),
        }
    }

    /// The error sentinel.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            finish: Some(FinishReason::Error),
        }
    }

    /// Whether this fragment reports a model error.
    pub fn is_error(&self) -> bool {
        self.finish == Some(FinishReason::Error)
    }
}

/// Why a streamed response ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model finished naturally.
    Stop,
    /// The token budget was exhausted.
    Length,
    /// The model failed mid-response.
    Error,
}

/// Request for embedding one text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    /// Text to embed.
    pub text: String,

    /// Truncate input that exceeds the context window instead of failing.
    pub truncate: bool,
}

impl EmbedRequest {
    /// Create a new embedding request with truncation enabled.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            truncate: true,
        }
    }

    /// Set the truncation flag.
    pub fn with_truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(InferenceError::InvalidInput("empty text".to_string()));
        }
        Ok(())
    }
}

/// Response from embedding generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    /// The generated embedding.
    pub embedding: Vec<f32>,

    /// Model that produced the embedding.
    pub model: String,

    /// Token usage (if available).
    pub tokens_used: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_describe_request_defaults() {
        let request = DescribeRequest::new(vec![1, 2, 3])
            .with_temperature(0.1)
            .with_max_tokens(64);

        assert_eq!(request.prompt, DEFAULT_DESCRIBE_PROMPT);
        assert_eq!(request.max_tokens, 64);
        assert!(request.validate().is_ok());
        assert!(DescribeRequest::new(Vec::new()).validate().is_err());
    }

    #[test]
    fn test_embed_request_rejects_blank_text() {
        assert!(EmbedRequest::new("   ").validate().is_err());
        assert!(EmbedRequest::new("a dog").with_truncate(false).validate().is_ok());
    }

    #[test]
    fn test_error_chunk() {
        assert!(DescribeChunk::error("boom").is_error());
        assert!(!DescribeChunk::finished(FinishReason::Stop).is_error());
    }
}
