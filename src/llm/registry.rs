//! Model registry for managing available LLM providers

use super::{all_models, LlmService, LoggingService, ModelDef, Provider};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Keys shipped in sample `.env` files; treated as unset
const PLACEHOLDER_KEYS: &[&str] = &[
    "sk-fake-key-for-development",
    "your-openai-api-key",
    "your-anthropic-api-key",
    "sk-...",
];

/// Configuration for LLM providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub openai_base_url: Option<String>,
    /// Preferred provider when both are configured
    pub provider: Option<Provider>,
    /// Default model ID
    pub default_model: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let api_key = |key: &str| non_empty(key).filter(|v| !PLACEHOLDER_KEYS.contains(&v.trim()));

        let provider = non_empty("AI_PROVIDER").and_then(|v| {
            let parsed = Provider::from_setting(&v);
            if parsed.is_none() {
                tracing::warn!(value = %v, "Unknown AI_PROVIDER, ignoring");
            }
            parsed
        });

        Self {
            anthropic_api_key: api_key("ANTHROPIC_API_KEY"),
            openai_api_key: api_key("OPENAI_API_KEY"),
            anthropic_base_url: non_empty("ANTHROPIC_BASE_URL"),
            openai_base_url: non_empty("OPENAI_BASE_URL"),
            provider,
            default_model: non_empty("DEFAULT_MODEL"),
        }
    }

    fn credentials(&self, provider: Provider) -> Option<(&str, Option<&str>)> {
        match provider {
            Provider::Anthropic => self
                .anthropic_api_key
                .as_deref()
                .map(|k| (k, self.anthropic_base_url.as_deref())),
            Provider::OpenAI => self
                .openai_api_key
                .as_deref()
                .map(|k| (k, self.openai_base_url.as_deref())),
        }
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        self.credentials(provider).is_some()
    }
}

/// Model metadata exposed over the API
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
    pub description: String,
    pub context_window: usize,
}

/// Registry of available LLM models
pub struct ModelRegistry {
    services: HashMap<String, Arc<dyn LlmService>>,
    default_model: String,
    preferred: Provider,
}

impl ModelRegistry {
    pub fn new(config: &LlmConfig) -> Self {
        let mut services: HashMap<String, Arc<dyn LlmService>> = HashMap::new();

        for model_def in all_models() {
            if let Some(service) = Self::try_create_model(model_def, config) {
                services.insert(model_def.id.to_string(), service);
            }
        }

        // Explicit preference wins; otherwise whichever provider has a key
        let preferred = config.provider.unwrap_or_else(|| {
            if !config.is_configured(Provider::Anthropic) && config.is_configured(Provider::OpenAI) {
                Provider::OpenAI
            } else {
                Provider::Anthropic
            }
        });

        let default_model = config
            .default_model
            .clone()
            .filter(|id| services.contains_key(id))
            .or_else(|| {
                [preferred.primary_model(), preferred.cheap_model()]
                    .into_iter()
                    .find(|id| services.contains_key(*id))
                    .map(str::to_string)
            })
            .or_else(|| {
                let mut ids: Vec<_> = services.keys().cloned().collect();
                ids.sort();
                ids.into_iter().next()
            })
            .unwrap_or_else(|| preferred.primary_model().to_string());

        Self {
            services,
            default_model,
            preferred,
        }
    }

    /// Registry backed by the given services, for wiring fakes in tests
    #[cfg(test)]
    pub fn with_services(services: Vec<Arc<dyn LlmService>>, default_model: &str) -> Self {
        Self {
            services: services
                .into_iter()
                .map(|s| (s.model_id().to_string(), s))
                .collect(),
            default_model: default_model.to_string(),
            preferred: Provider::Anthropic,
        }
    }

    /// Try to create a model service, validating prerequisites
    fn try_create_model(model_def: &ModelDef, config: &LlmConfig) -> Option<Arc<dyn LlmService>> {
        let (api_key, base_url) = config.credentials(model_def.provider)?;

        match (model_def.factory)(api_key, base_url) {
            Ok(service) => Some(Arc::new(LoggingService::new(service))),
            Err(e) => {
                tracing::warn!(model = model_def.id, error = %e, "Skipping model");
                None
            }
        }
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).cloned()
    }

    /// Get the default model
    pub fn default(&self) -> Option<Arc<dyn LlmService>> {
        self.get(&self.default_model)
    }

    /// Get the default model ID
    pub fn default_model_id(&self) -> &str {
        &self.default_model
    }

    /// List all available model IDs
    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<_> = self.services.keys().cloned().collect();
        models.sort();
        models
    }

    /// Get detailed information about available models
    pub fn available_model_info(&self) -> Vec<ModelInfo> {
        all_models()
            .iter()
            .filter(|def| self.services.contains_key(def.id))
            .map(|def| ModelInfo {
                id: def.id.to_string(),
                provider: def.provider.display_name().to_string(),
                description: def.description.to_string(),
                context_window: def.context_window,
            })
            .collect()
    }

    /// Check if any models are available
    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }

    /// Get a cheap/fast model for auxiliary tasks like title generation.
    /// Prefers the preferred provider's cheap model, then the other's, then the default.
    pub fn get_cheap_model(&self) -> Option<Arc<dyn LlmService>> {
        let other = match self.preferred {
            Provider::Anthropic => Provider::OpenAI,
            Provider::OpenAI => Provider::Anthropic,
        };

        [self.preferred.cheap_model(), other.cheap_model()]
            .into_iter()
            .find_map(|id| self.get(id))
            .or_else(|| self.default())
    }
}
