//! Google Gemini provider implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{ServiceError, ServiceResult};

use super::provider::{AIMessage, AIProvider, AIResponse, AIRole, GenerateOptions, TokenUsage};

/// Gemini API base
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    #[serde(default)]
    status: String,
    message: String,
}

/// Google Gemini provider.
pub struct GeminiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiProvider {
    /// Create a provider, unconfigured when `api_key` is `None`.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    /// Set a custom base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn build_request(messages: &[AIMessage], options: &GenerateOptions) -> GeminiRequest {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();

        for msg in messages {
            let part = GeminiPart {
                text: msg.content.clone(),
            };
            match msg.role {
                AIRole::System => system_parts.push(part),
                AIRole::User => contents.push(GeminiContent {
                    role: Some("user".to_string()),
                    parts: vec![part],
                }),
                AIRole::Assistant => contents.push(GeminiContent {
                    role: Some("model".to_string()),
                    parts: vec![part],
                }),
            }
        }

        GeminiRequest {
            contents,
            system_instruction: (!system_parts.is_empty()).then(|| GeminiContent {
                role: None,
                parts: system_parts,
            }),
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
                stop_sequences: options.stop_sequences.clone(),
                response_mime_type: options.json_mode.then_some("application/json"),
            },
        }
    }
}

#[async_trait]
impl AIProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn api_key_env_var(&self) -> &'static str {
        "GOOGLE_API_KEY"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn model_prefixes(&self) -> &'static [&'static str] {
        &["gemini-"]
    }

    async fn generate_text(
        &self,
        model: &str,
        messages: &[AIMessage],
        options: &GenerateOptions,
    ) -> ServiceResult<AIResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ServiceError::NotConfigured("GOOGLE_API_KEY not set".to_string()))?;

        let request = Self::build_request(messages, options);
        let url = format!("{}/models/{model}:generateContent", self.base_url);

        tracing::debug!(model, "Calling Gemini API");

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<GeminiErrorResponse>(&body) {
                Ok(parsed) => format!("{} - {}", parsed.error.status, parsed.error.message),
                Err(_) => body,
            };
            return Err(ServiceError::from_status(status, message));
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(format!("Gemini response: {e}")))?;

        let candidate = body
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Parse("Gemini returned no candidates".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ServiceError::Parse(format!(
                "Gemini returned empty content (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        let usage = body.usage_metadata.unwrap_or_default();

        Ok(AIResponse {
            text,
            usage: TokenUsage::new(usage.prompt_token_count, usage.candidates_token_count),
            model: body.model_version.unwrap_or_else(|| model.to_string()),
            provider: self.name().to_string(),
        })
    }
}
