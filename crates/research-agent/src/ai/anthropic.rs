//! Anthropic Claude provider implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{ServiceError, ServiceResult};

use super::provider::{AIMessage, AIProvider, AIResponse, AIRole, GenerateOptions, TokenUsage};

/// Anthropic API endpoint
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Normalize short model names to API identifiers.
fn normalize_model(model: &str) -> &str {
    match model {
        "opus" => "claude-opus-4-1-20250805",
        "sonnet" => "claude-sonnet-4-20250514",
        "haiku" => "claude-3-5-haiku-20241022",
        _ => model,
    }
}

/// Anthropic API request message
#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

/// Anthropic API request
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

/// Anthropic API response content block
#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

/// Anthropic API usage
#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Anthropic API response
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    model: String,
    usage: AnthropicUsage,
}

/// Anthropic API error
#[derive(Debug, Deserialize)]
struct AnthropicError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Anthropic API error response
#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl AnthropicProvider {
    /// Create a provider, unconfigured when `api_key` is `None`.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Set a custom base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Convert messages to Anthropic format, extracting system message.
    fn convert_messages(messages: &[AIMessage]) -> (Option<String>, Vec<AnthropicMessage>) {
        let mut system = None;
        let mut converted = Vec::new();

        for msg in messages {
            match msg.role {
                // Anthropic uses a separate system field
                AIRole::System => system = Some(msg.content.clone()),
                AIRole::User => converted.push(AnthropicMessage {
                    role: "user",
                    content: msg.content.clone(),
                }),
                AIRole::Assistant => converted.push(AnthropicMessage {
                    role: "assistant",
                    content: msg.content.clone(),
                }),
            }
        }

        (system, converted)
    }
}

#[async_trait]
impl AIProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn api_key_env_var(&self) -> &'static str {
        "ANTHROPIC_API_KEY"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn model_prefixes(&self) -> &'static [&'static str] {
        &["claude-", "opus", "sonnet", "haiku"]
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
            .ok_or_else(|| ServiceError::NotConfigured("ANTHROPIC_API_KEY not set".to_string()))?;

        let (mut system, converted_messages) = Self::convert_messages(messages);
        if options.json_mode {
            // No native JSON mode; ask for it in the system prompt instead.
            let base = system.unwrap_or_default();
            system = Some(format!(
                "{base}\n\nRespond with a single JSON object and nothing else."
            ));
        }

        let request = AnthropicRequest {
            model: normalize_model(model),
            messages: converted_messages,
            max_tokens: options.max_tokens.unwrap_or(4096),
            system,
            temperature: options.temperature,
            stop_sequences: options.stop_sequences.clone(),
        };

        tracing::debug!(model = request.model, "Calling Anthropic API");

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<AnthropicErrorResponse>(&body) {
                Ok(parsed) => format!("{} - {}", parsed.error.error_type, parsed.error.message),
                Err(_) => body,
            };
            return Err(ServiceError::from_status(status, message));
        }

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(format!("Anthropic response: {e}")))?;

        let text: String = body
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .map(|block| block.text.as_str())
            .collect();

        Ok(AIResponse {
            text,
            usage: TokenUsage::new(body.usage.input_tokens, body.usage.output_tokens),
            model: body.model,
            provider: self.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_provider_name() {
        let provider = AnthropicProvider::new(Some("test-key".to_string()));
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.api_key_env_var(), "ANTHROPIC_API_KEY");
        assert!(provider.is_configured());
        assert!(!AnthropicProvider::new(None).is_configured());
    }

    #[test]
    fn test_supports_models() {
        let provider = AnthropicProvider::new(None);
        assert!(provider.supports_model("claude-sonnet-4-20250514"));
        assert!(provider.supports_model("haiku"));
        assert!(!provider.supports_model("gemini-1.5-flash"));
    }

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            AIMessage::system("You are helpful"),
            AIMessage::user("Hello"),
            AIMessage::assistant("Hi there!"),
        ];

        let (system, converted) = AnthropicProvider::convert_messages(&messages);

        assert_eq!(system, Some("You are helpful".to_string()));
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[1].role, "assistant");
    }

    #[tokio::test]
    async fn test_generate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "Hello "}, {"type": "text", "text": "world"}],
                "model": "claude-sonnet-4-20250514",
                "usage": {"input_tokens": 12, "output_tokens": 3}
            })))
            .mount(&server)
            .await;

        let provider =
            AnthropicProvider::new(Some("test-key".to_string())).with_base_url(server.uri());
        let response = provider
            .generate_text("sonnet", &[AIMessage::user("hi")], &GenerateOptions::default())
            .await
            .unwrap();

        assert_eq!(response.text, "Hello world");
        assert_eq!(response.usage.total_tokens, 15);
        assert_eq!(response.provider, "anthropic");
    }

    #[tokio::test]
    async fn test_overloaded_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_json(serde_json::json!({
                "type": "error",
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            })))
            .mount(&server)
            .await;

        let provider =
            AnthropicProvider::new(Some("test-key".to_string())).with_base_url(server.uri());
        let err = provider
            .generate_text("sonnet", &[AIMessage::user("hi")], &GenerateOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(err.to_string().contains("overloaded_error"));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let err = AnthropicProvider::new(None)
            .generate_text("sonnet", &[AIMessage::user("hi")], &GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured(_)));
    }
}
