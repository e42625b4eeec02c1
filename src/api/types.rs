//! API request and response types

use crate::llm::ModelInfo;
use serde::{Deserialize, Serialize};

/// Request to create a conversation
#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub title: String,
    #[serde(alias = "participantIds")]
    pub participant_ids: Vec<i64>,
    #[serde(default, alias = "isAutonomous")]
    pub is_autonomous: bool,
    #[serde(default, alias = "ownerId")]
    pub owner_id: Option<String>,
}

/// Partial conversation update; only the title is client-editable
#[derive(Debug, Deserialize)]
pub struct UpdateConversationRequest {
    pub title: Option<String>,
}

/// Request to append a user message
#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub content: String,
    #[serde(default, alias = "turnNumber")]
    pub turn_number: Option<i64>,
}

/// Request to generate the next turn
#[derive(Debug, Default, Deserialize)]
pub struct GenerateResponseRequest {
    #[serde(default, alias = "characterId")]
    pub character_id: Option<i64>,
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Response for delete actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Response for model list
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default: String,
}

/// Which providers have usable credentials
#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub openai_configured: bool,
    pub anthropic_configured: bool,
    pub ai_provider: Option<String>,
    pub default_model: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Generated text that could not be stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            content: None,
        }
    }
}
