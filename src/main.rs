//! Roundtable - multi-character LLM conversations
//!
//! An axum backend that runs turn-based conversations between AI
//! characters, with user steering between turns.

mod api;
mod config;
mod db;
mod engine;
mod generation;
mod llm;
mod prompts;
mod title_generator;

use api::{create_router, AppState, SharedStore};
use axum::http::HeaderValue;
use config::{ServerConfig, StoreKind};
use db::{Database, MemoryStore};
use engine::{DatabaseStorage, EngineConfig, Generator, TurnEngine};
use generation::LlmGenerator;
use llm::{LlmConfig, ModelRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roundtable=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    if let Ok(path) = dotenv {
        tracing::info!(path = %path.display(), "Loaded environment file");
    }

    // Configuration
    let config = ServerConfig::from_env();
    let store = open_store(&config)?;

    // Initialize LLM registry
    let llm_config = LlmConfig::from_env();
    let llm_registry = Arc::new(ModelRegistry::new(&llm_config));

    if llm_registry.has_models() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            default = %llm_registry.default_model_id(),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!(
            "No LLM API keys configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY."
        );
    }

    let generator: Arc<dyn Generator> = Arc::new(LlmGenerator::new(llm_registry.clone()));
    let engine = TurnEngine::new(
        store.clone(),
        generator,
        EngineConfig {
            generation_timeout: config.generation_timeout,
        },
    );

    // Create application state
    let state = AppState::new(store, engine, llm_registry, llm_config);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors_layer(&config))
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Roundtable server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn open_store(config: &ServerConfig) -> Result<SharedStore, Box<dyn std::error::Error>> {
    match config.store {
        StoreKind::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreKind::Sqlite => {
            // Ensure database directory exists
            if let Some(parent) = config.db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            tracing::info!(path = %config.db_path.display(), "Opening database");
            let db = Database::open(&config.db_path)?;
            Ok(Arc::new(DatabaseStorage::new(db)))
        }
    }
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}
