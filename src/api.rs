//! HTTP API for Roundtable
//!
//! Character and conversation management plus the turn endpoints.

mod handlers;
mod types;

pub use handlers::create_router;

use crate::engine::{Generator, Store, TurnEngine};
use crate::llm::{LlmConfig, ModelRegistry};
use std::sync::Arc;

pub type SharedStore = Arc<dyn Store>;
pub type SharedEngine = TurnEngine<SharedStore, Arc<dyn Generator>>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub engine: Arc<SharedEngine>,
    pub llm_registry: Arc<ModelRegistry>,
    pub llm_config: Arc<LlmConfig>,
}

impl AppState {
    pub fn new(
        store: SharedStore,
        engine: SharedEngine,
        llm_registry: Arc<ModelRegistry>,
        llm_config: LlmConfig,
    ) -> Self {
        Self {
            store,
            engine: Arc::new(engine),
            llm_registry,
            llm_config: Arc::new(llm_config),
        }
    }
}
