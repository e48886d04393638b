//! LLM completion providers.

mod anthropic;
mod gemini;
mod provider;
mod registry;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use provider::{
    parse_ai_response, strip_code_fence, AIMessage, AIProvider, AIResponse, AIRole,
    GenerateOptions, TokenUsage,
};
pub use registry::ProviderRegistry;
