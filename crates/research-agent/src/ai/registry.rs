//! Provider Registry - picks the LLM provider for a model.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Settings;
use crate::errors::{ServiceError, ServiceResult};

use super::anthropic::AnthropicProvider;
use super::gemini::GeminiProvider;
use super::provider::AIProvider;

/// Registry of LLM providers keyed by name.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn AIProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in providers, keyed from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GeminiProvider::new(
            settings.google_api_key.clone(),
        )));
        registry.register(Arc::new(AnthropicProvider::new(
            settings.anthropic_api_key.clone(),
        )));
        registry
    }

    /// Register a provider, replacing any with the same name.
    pub fn register(&mut self, provider: Arc<dyn AIProvider>) {
        self.providers.insert(provider.name(), provider);
    }

    /// Get a provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn AIProvider>> {
        self.providers.get(name).cloned()
    }

    /// Get a provider that supports a specific model.
    pub fn get_for_model(&self, model: &str) -> Option<Arc<dyn AIProvider>> {
        self.providers
            .values()
            .find(|p| p.supports_model(model))
            .cloned()
    }

    /// Get the configured provider for a model, or explain why there is none.
    pub fn require_for_model(&self, model: &str) -> ServiceResult<Arc<dyn AIProvider>> {
        let provider = self.get_for_model(model).ok_or_else(|| {
            ServiceError::NotConfigured(format!("No provider serves model '{model}'"))
        })?;

        if !provider.is_configured() {
            return Err(ServiceError::NotConfigured(format!(
                "Model '{model}' needs {} to be set",
                provider.api_key_env_var()
            )));
        }

        Ok(provider)
    }

    /// Get all registered provider names.
    pub fn provider_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.providers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = ProviderRegistry::new();
        assert!(registry.provider_names().is_empty());

        let registry = ProviderRegistry::from_settings(&Settings::default());
        assert_eq!(registry.provider_names(), vec!["anthropic", "gemini"]);
    }

    #[test]
    fn test_routes_by_model_prefix() {
        let settings = Settings {
            google_api_key: Some("g".into()),
            anthropic_api_key: Some("a".into()),
            ..Settings::default()
        };
        let registry = ProviderRegistry::from_settings(&settings);

        let provider = registry.require_for_model("gemini-1.5-flash").unwrap();
        assert_eq!(provider.name(), "gemini");

        let provider = registry.require_for_model("claude-sonnet-4-20250514").unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn test_unconfigured_or_unknown_model() {
        let registry = ProviderRegistry::from_settings(&Settings::default());

        let err = registry.require_for_model("gemini-1.5-pro").err().unwrap();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));

        let err = registry.require_for_model("gpt-4o").err().unwrap();
        assert!(err.to_string().contains("gpt-4o"));
    }
}
