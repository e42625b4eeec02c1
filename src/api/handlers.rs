//! HTTP request handlers

use super::types::{
    ConfigResponse, CreateConversationRequest, ErrorResponse, GenerateResponseRequest,
    ModelsResponse, PostMessageRequest, SuccessResponse, UpdateConversationRequest,
};
use super::AppState;
use crate::db::{
    Character, CharacterUpdate, Conversation, ConversationDetail, ConversationUpdate, DbError,
    Message, NewCharacter, NewConversation,
};
use crate::engine::{CatalogStore, ConversationStore, EngineError, TurnOutcome, TurnRequest};
use crate::llm::Provider;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Characters
        .route(
            "/api/characters",
            get(list_characters).post(create_character),
        )
        .route("/api/characters/active", get(list_active_characters))
        .route(
            "/api/characters/:id",
            get(get_character)
                .put(update_character)
                .delete(delete_character),
        )
        // Conversations
        .route(
            "/api/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/api/conversations/:id",
            get(get_conversation)
                .patch(update_conversation)
                .delete(delete_conversation),
        )
        // Turns
        .route("/api/conversations/:id/messages", post(post_message))
        .route(
            "/api/conversations/:id/generate-response",
            post(generate_response),
        )
        .route("/api/conversations/:id/generate-title", post(generate_title))
        // Model info
        .route("/api/models", get(list_models))
        .route("/api/config", get(get_config))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Characters
// ============================================================

async fn list_characters(State(state): State<AppState>) -> Result<Json<Vec<Character>>, AppError> {
    Ok(Json(state.store.list_characters(false).await?))
}

async fn list_active_characters(
    State(state): State<AppState>,
) -> Result<Json<Vec<Character>>, AppError> {
    Ok(Json(state.store.list_characters(true).await?))
}

async fn create_character(
    State(state): State<AppState>,
    Json(mut req): Json<NewCharacter>,
) -> Result<(StatusCode, Json<Character>), AppError> {
    req.name = req.name.trim().to_string();
    if req.name.is_empty() {
        return Err(AppError::BadRequest(
            "Character name must not be empty".to_string(),
        ));
    }

    let character = state.store.create_character(&req).await?;
    tracing::info!(character_id = character.id, name = %character.name, "Character created");
    Ok((StatusCode::CREATED, Json(character)))
}

async fn get_character(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Character>, AppError> {
    Ok(Json(state.store.get_character(id).await?))
}

async fn update_character(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CharacterUpdate>,
) -> Result<Json<Character>, AppError> {
    if req.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest(
            "Character name must not be empty".to_string(),
        ));
    }
    Ok(Json(state.store.update_character(id, &req).await?))
}

async fn delete_character(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.store.delete_character(id).await?;
    tracing::info!(character_id = id, "Character deleted");
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Conversations
// ============================================================

async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Conversation>>, AppError> {
    Ok(Json(state.store.list_conversations().await?))
}

async fn create_conversation(
    State(state): State<AppState>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<Conversation>), AppError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title must not be empty".to_string()));
    }
    if req.participant_ids.is_empty() {
        return Err(AppError::BadRequest(
            "A conversation needs at least one participant".to_string(),
        ));
    }

    let mut participant_ids: Vec<i64> = Vec::with_capacity(req.participant_ids.len());
    for id in req.participant_ids {
        if participant_ids.contains(&id) {
            return Err(AppError::BadRequest(format!(
                "Character {id} is listed twice"
            )));
        }
        match state.store.get_character(id).await {
            Ok(_) => participant_ids.push(id),
            Err(e) if e.is_not_found() => {
                return Err(AppError::BadRequest(format!("Unknown character {id}")));
            }
            Err(e) => return Err(e.into()),
        }
    }

    let conversation = state
        .store
        .create_conversation(&NewConversation {
            title: title.to_string(),
            participant_ids,
            is_autonomous: req.is_autonomous,
            owner_id: req.owner_id,
        })
        .await?;
    tracing::info!(conv_id = conversation.id, "Conversation created");
    Ok((StatusCode::CREATED, Json(conversation)))
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ConversationDetail>, AppError> {
    Ok(Json(state.store.get_conversation(id).await?))
}

async fn update_conversation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateConversationRequest>,
) -> Result<Json<Conversation>, AppError> {
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("Title must not be empty".to_string()))?;

    let conversation = state
        .store
        .update_conversation(id, &ConversationUpdate::title(title))
        .await?;
    Ok(Json(conversation))
}

async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.store.delete_conversation(id).await?;
    tracing::info!(conv_id = id, "Conversation deleted");
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Turns
// ============================================================

async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let message = state
        .engine
        .post_user_message(id, &req.content, req.turn_number)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn generate_response(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<TurnOutcome>, AppError> {
    // An empty body means round-robin with no prompt; anything else must parse
    let req: GenerateResponseRequest = if body.iter().all(u8::is_ascii_whitespace) {
        GenerateResponseRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?
    };
    let request = TurnRequest {
        character_id: req.character_id,
        prompt: req.prompt,
    };
    Ok(Json(state.engine.generate_next_turn(id, &request).await?))
}

async fn generate_title(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Conversation>, AppError> {
    Ok(Json(state.engine.regenerate_title(id).await?))
}

// ============================================================
// Model Info
// ============================================================

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.llm_registry.available_model_info(),
        default: state.llm_registry.default_model_id().to_string(),
    })
}

async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let config = &state.llm_config;
    Json(ConfigResponse {
        openai_configured: config.is_configured(Provider::OpenAI),
        anthropic_configured: config.is_configured(Provider::Anthropic),
        ai_provider: config.provider.map(|p| p.display_name().to_string()),
        default_model: state
            .llm_registry
            .has_models()
            .then(|| state.llm_registry.default_model_id().to_string()),
    })
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("roundtable ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    Internal(String),
    /// Generated text that was lost on the way to storage
    Unrecorded { message: String, content: String },
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::NotFound { .. } => AppError::NotFound(message),
            EngineError::InvalidInput(_) | EngineError::NoParticipants(_) => {
                AppError::BadRequest(message)
            }
            EngineError::ParticipantNotInConversation { .. } => AppError::Conflict(message),
            EngineError::GenerationFailed { .. } => AppError::BadGateway(message),
            EngineError::Persistence(_) => AppError::Internal(message),
            EngineError::UnrecordedReply { content, .. } => {
                AppError::Unrecorded { message, content }
            }
        }
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        EngineError::from(err).into()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg)),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse::new(msg)),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ErrorResponse::new(msg)),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, ErrorResponse::new(msg)),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(msg))
            }
            AppError::Unrecorded { message, content } => {
                tracing::error!(error = %message, "Reply generated but not recorded");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: message,
                        content: Some(content),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
