//! LLM provider trait and common types.
//!
//! Defines the completion interface the synthesizer and writer depend on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{ServiceError, ServiceResult};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIRole {
    /// System message (sets context/behavior)
    System,
    /// User message (input)
    User,
    /// Assistant message (AI response)
    Assistant,
}

/// A message in a conversation with an AI model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AIMessage {
    /// Role of the message sender
    pub role: AIRole,
    /// Content of the message
    pub content: String,
}

impl AIMessage {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: AIRole::System,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: AIRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: AIRole::Assistant,
            content: content.into(),
        }
    }
}

/// Token usage reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub input_tokens: u32,
    /// Completion tokens
    pub output_tokens: u32,
    /// Total tokens (input + output)
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Usage with the total filled in.
    #[must_use]
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }

    /// Accumulate another call's usage.
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// Response from an AI model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIResponse {
    /// Generated text content
    pub text: String,
    /// Token usage information
    pub usage: TokenUsage,
    /// Model that generated the response
    pub model: String,
    /// Provider that generated the response
    pub provider: String,
}

/// Options for text generation.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Temperature for sampling (0.0 to 1.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Stop sequences
    pub stop_sequences: Option<Vec<String>>,
    /// Whether to request JSON output
    pub json_mode: bool,
}

/// Trait for LLM completion providers.
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// Get the provider name (e.g., "gemini", "anthropic").
    fn name(&self) -> &'static str;

    /// Get the environment variable name for the API key.
    fn api_key_env_var(&self) -> &'static str;

    /// Check if the provider is configured (has API key).
    fn is_configured(&self) -> bool;

    /// Model name prefixes this provider serves.
    fn model_prefixes(&self) -> &'static [&'static str];

    /// Check if a model is supported.
    fn supports_model(&self, model: &str) -> bool {
        self.model_prefixes().iter().any(|p| model.starts_with(p))
    }

    /// Generate text from messages.
    async fn generate_text(
        &self,
        model: &str,
        messages: &[AIMessage],
        options: &GenerateOptions,
    ) -> ServiceResult<AIResponse>;
}

/// Strip a markdown code fence the model may wrap JSON in.
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .and_then(|s| s.trim_end().strip_suffix("```"));
    inner.map_or(text, str::trim)
}

/// Parse a structured object out of a model response.
///
/// This is a standalone function rather than a trait method because
/// generic methods are not dyn-compatible.
pub fn parse_ai_response<T: for<'de> Deserialize<'de>>(response: &AIResponse) -> ServiceResult<T> {
    let json_text = strip_code_fence(&response.text);
    serde_json::from_str(json_text).map_err(|e| {
        ServiceError::Parse(format!(
            "Failed to parse AI response as JSON: {e}. Response: {}",
            response.text.trim()
        ))
    })
}
