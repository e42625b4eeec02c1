//! Centralized model definitions for all LLM providers

use super::anthropic::AnthropicModel;
use super::openai::OpenAIModel;
use super::{AnthropicService, LlmService, OpenAIService};
use std::sync::Arc;

/// LLM provider enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Anthropic,
    OpenAI,
}

impl Provider {
    /// Get the display name for this provider
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Anthropic => "Anthropic",
            Provider::OpenAI => "OpenAI",
        }
    }

    /// Parse the `AI_PROVIDER` setting
    pub fn from_setting(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Some(Provider::Anthropic),
            "openai" => Some(Provider::OpenAI),
            _ => None,
        }
    }

    /// Model used for character replies when nothing else is configured
    pub fn primary_model(self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-3.5-sonnet",
            Provider::OpenAI => "gpt-4o",
        }
    }

    /// Fast model used for auxiliary work such as titles
    pub fn cheap_model(self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-3.5-haiku",
            Provider::OpenAI => "gpt-4o-mini",
        }
    }
}

type Factory = fn(&str, Option<&str>) -> Result<Arc<dyn LlmService>, String>;

/// Model definition with metadata
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// User-facing model ID (e.g., "claude-3.5-sonnet")
    pub id: &'static str,
    pub provider: Provider,
    /// Human-readable description
    pub description: &'static str,
    /// Context window size in tokens
    pub context_window: usize,
    /// Builds the service from an API key and optional base URL
    pub factory: Factory,
}

fn anthropic(
    model: AnthropicModel,
    api_key: &str,
    base_url: Option<&str>,
) -> Result<Arc<dyn LlmService>, String> {
    if api_key.is_empty() {
        return Err(format!("{} requires ANTHROPIC_API_KEY", model.model_id()));
    }
    AnthropicService::new(api_key.to_string(), model, base_url)
        .map(|s| Arc::new(s) as Arc<dyn LlmService>)
        .map_err(|e| e.message)
}

fn openai(
    model: OpenAIModel,
    api_key: &str,
    base_url: Option<&str>,
) -> Result<Arc<dyn LlmService>, String> {
    if api_key.is_empty() {
        return Err(format!("{} requires OPENAI_API_KEY", model.model_id()));
    }
    OpenAIService::new(api_key.to_string(), model, base_url)
        .map(|s| Arc::new(s) as Arc<dyn LlmService>)
        .map_err(|e| e.message)
}

/// Get all available model definitions
pub fn all_models() -> &'static [ModelDef] {
    &[
        ModelDef {
            id: "claude-3.5-sonnet",
            provider: Provider::Anthropic,
            description: "Claude 3.5 Sonnet (balanced, default for replies)",
            context_window: 200_000,
            factory: |api_key, base_url| anthropic(AnthropicModel::Claude35Sonnet, api_key, base_url),
        },
        ModelDef {
            id: "claude-3.5-haiku",
            provider: Provider::Anthropic,
            description: "Claude 3.5 Haiku (fast, used for titles)",
            context_window: 200_000,
            factory: |api_key, base_url| anthropic(AnthropicModel::Claude35Haiku, api_key, base_url),
        },
        ModelDef {
            id: "gpt-4o",
            provider: Provider::OpenAI,
            description: "GPT-4o (balanced, default for replies)",
            context_window: 128_000,
            factory: |api_key, base_url| openai(OpenAIModel::GPT4o, api_key, base_url),
        },
        ModelDef {
            id: "gpt-4o-mini",
            provider: Provider::OpenAI,
            description: "GPT-4o mini (fast, used for titles)",
            context_window: 128_000,
            factory: |api_key, base_url| openai(OpenAIModel::GPT4oMini, api_key, base_url),
        },
    ]
}
