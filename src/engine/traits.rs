//! Trait abstractions for engine I/O
//!
//! The turn engine only talks to storage and the language model through
//! these traits, so tests can swap in the arena store and mock generators.

use crate::db::{
    Character, CharacterUpdate, Conversation, ConversationDetail, ConversationUpdate, Database,
    DbError, DbResult, MemoryStore, Message, NewCharacter, NewConversation, NewMessage,
};
use crate::llm::LlmError;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Everything the generation collaborator needs to voice one character
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyRequest {
    pub character_name: String,
    pub personality: String,
    pub transcript: String,
    pub prompt: Option<String>,
}

/// Decoded model reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyPayload {
    pub content: String,
    pub should_continue: bool,
}

/// Storage operations the turn engine depends on
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get_character(&self, id: i64) -> DbResult<Character>;

    /// Conversation with messages in turn order and resolved participants
    async fn get_conversation(&self, id: i64) -> DbResult<ConversationDetail>;

    /// Append `message` and apply `update` to the conversation as one
    /// write: either both land or neither does
    async fn commit_message(
        &self,
        conversation_id: i64,
        message: &NewMessage,
        update: &ConversationUpdate,
    ) -> DbResult<Message>;

    async fn update_conversation(
        &self,
        id: i64,
        update: &ConversationUpdate,
    ) -> DbResult<Conversation>;
}

/// Record management outside the turn cycle
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_character(&self, new: &NewCharacter) -> DbResult<Character>;
    async fn list_characters(&self, active_only: bool) -> DbResult<Vec<Character>>;
    async fn update_character(&self, id: i64, update: &CharacterUpdate) -> DbResult<Character>;
    async fn delete_character(&self, id: i64) -> DbResult<()>;
    async fn create_conversation(&self, new: &NewConversation) -> DbResult<Conversation>;
    async fn list_conversations(&self) -> DbResult<Vec<Conversation>>;
    async fn delete_conversation(&self, id: i64) -> DbResult<()>;
}

/// Combined storage trait for convenience
pub trait Store: ConversationStore + CatalogStore {}
impl<T: ConversationStore + CatalogStore> Store for T {}

/// Language model collaborator
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce the next line for a character. A reply that arrives but
    /// cannot be decoded is reported as [`crate::llm::LlmErrorKind::Malformed`].
    async fn generate_reply(&self, request: &ReplyRequest) -> Result<ReplyPayload, LlmError>;

    /// Name a conversation from an excerpt. Never fails.
    async fn generate_title(&self, excerpt: &str) -> String;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ConversationStore + ?Sized> ConversationStore for Arc<T> {
    async fn get_character(&self, id: i64) -> DbResult<Character> {
        (**self).get_character(id).await
    }

    async fn get_conversation(&self, id: i64) -> DbResult<ConversationDetail> {
        (**self).get_conversation(id).await
    }

    async fn commit_message(
        &self,
        conversation_id: i64,
        message: &NewMessage,
        update: &ConversationUpdate,
    ) -> DbResult<Message> {
        (**self).commit_message(conversation_id, message, update).await
    }

    async fn update_conversation(
        &self,
        id: i64,
        update: &ConversationUpdate,
    ) -> DbResult<Conversation> {
        (**self).update_conversation(id, update).await
    }
}

#[async_trait]
impl<T: CatalogStore + ?Sized> CatalogStore for Arc<T> {
    async fn create_character(&self, new: &NewCharacter) -> DbResult<Character> {
        (**self).create_character(new).await
    }

    async fn list_characters(&self, active_only: bool) -> DbResult<Vec<Character>> {
        (**self).list_characters(active_only).await
    }

    async fn update_character(&self, id: i64, update: &CharacterUpdate) -> DbResult<Character> {
        (**self).update_character(id, update).await
    }

    async fn delete_character(&self, id: i64) -> DbResult<()> {
        (**self).delete_character(id).await
    }

    async fn create_conversation(&self, new: &NewConversation) -> DbResult<Conversation> {
        (**self).create_conversation(new).await
    }

    async fn list_conversations(&self) -> DbResult<Vec<Conversation>> {
        (**self).list_conversations().await
    }

    async fn delete_conversation(&self, id: i64) -> DbResult<()> {
        (**self).delete_conversation(id).await
    }
}

#[async_trait]
impl<T: Generator + ?Sized> Generator for Arc<T> {
    async fn generate_reply(&self, request: &ReplyRequest) -> Result<ReplyPayload, LlmError> {
        (**self).generate_reply(request).await
    }

    async fn generate_title(&self, excerpt: &str) -> String {
        (**self).generate_title(excerpt).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use the SQLite [`Database`] as a store.
/// Every call runs on the blocking pool.
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn blocking<T, F>(&self, f: F) -> DbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> DbResult<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "spawn_blocking join error");
                DbError::Unavailable(e.to_string())
            })?
    }
}

#[async_trait]
impl ConversationStore for DatabaseStorage {
    async fn get_character(&self, id: i64) -> DbResult<Character> {
        self.blocking(move |db| db.get_character(id)).await
    }

    async fn get_conversation(&self, id: i64) -> DbResult<ConversationDetail> {
        self.blocking(move |db| db.get_conversation(id)).await
    }

    async fn commit_message(
        &self,
        conversation_id: i64,
        message: &NewMessage,
        update: &ConversationUpdate,
    ) -> DbResult<Message> {
        let message = message.clone();
        let update = update.clone();
        self.blocking(move |db| db.commit_message(conversation_id, &message, &update))
            .await
    }

    async fn update_conversation(
        &self,
        id: i64,
        update: &ConversationUpdate,
    ) -> DbResult<Conversation> {
        let update = update.clone();
        self.blocking(move |db| db.update_conversation(id, &update))
            .await
    }
}

#[async_trait]
impl CatalogStore for DatabaseStorage {
    async fn create_character(&self, new: &NewCharacter) -> DbResult<Character> {
        let new = new.clone();
        self.blocking(move |db| db.create_character(&new)).await
    }

    async fn list_characters(&self, active_only: bool) -> DbResult<Vec<Character>> {
        self.blocking(move |db| db.list_characters(active_only))
            .await
    }

    async fn update_character(&self, id: i64, update: &CharacterUpdate) -> DbResult<Character> {
        let update = update.clone();
        self.blocking(move |db| db.update_character(id, &update))
            .await
    }

    async fn delete_character(&self, id: i64) -> DbResult<()> {
        self.blocking(move |db| db.delete_character(id)).await
    }

    async fn create_conversation(&self, new: &NewConversation) -> DbResult<Conversation> {
        let new = new.clone();
        self.blocking(move |db| db.create_conversation(&new)).await
    }

    async fn list_conversations(&self) -> DbResult<Vec<Conversation>> {
        self.blocking(Database::list_conversations).await
    }

    async fn delete_conversation(&self, id: i64) -> DbResult<()> {
        self.blocking(move |db| db.delete_conversation(id)).await
    }
}

// The arena store never blocks for long; it runs inline.

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn get_character(&self, id: i64) -> DbResult<Character> {
        MemoryStore::get_character(self, id)
    }

    async fn get_conversation(&self, id: i64) -> DbResult<ConversationDetail> {
        MemoryStore::get_conversation(self, id)
    }

    async fn commit_message(
        &self,
        conversation_id: i64,
        message: &NewMessage,
        update: &ConversationUpdate,
    ) -> DbResult<Message> {
        MemoryStore::commit_message(self, conversation_id, message, update)
    }

    async fn update_conversation(
        &self,
        id: i64,
        update: &ConversationUpdate,
    ) -> DbResult<Conversation> {
        MemoryStore::update_conversation(self, id, update)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn create_character(&self, new: &NewCharacter) -> DbResult<Character> {
        MemoryStore::create_character(self, new)
    }

    async fn list_characters(&self, active_only: bool) -> DbResult<Vec<Character>> {
        MemoryStore::list_characters(self, active_only)
    }

    async fn update_character(&self, id: i64, update: &CharacterUpdate) -> DbResult<Character> {
        MemoryStore::update_character(self, id, update)
    }

    async fn delete_character(&self, id: i64) -> DbResult<()> {
        MemoryStore::delete_character(self, id)
    }

    async fn create_conversation(&self, new: &NewConversation) -> DbResult<Conversation> {
        MemoryStore::create_conversation(self, new)
    }

    async fn list_conversations(&self) -> DbResult<Vec<Conversation>> {
        MemoryStore::list_conversations(self)
    }

    async fn delete_conversation(&self, id: i64) -> DbResult<()> {
        MemoryStore::delete_conversation(self, id)
    }
}
