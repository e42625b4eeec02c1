//! Mock implementations for testing
//!
//! These mocks enable engine and API tests without a model or disk.

use super::traits::{CatalogStore, ConversationStore, Generator, ReplyPayload, ReplyRequest};
use crate::db::{
    Character, CharacterUpdate, Conversation, ConversationDetail, ConversationUpdate, DbError,
    DbResult, MemoryStore, Message, NewCharacter, NewConversation, NewMessage,
};
use crate::llm::LlmError;
use crate::title_generator::DEFAULT_TITLE;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock Generator
// ============================================================================

/// Generator that returns queued replies and records what it was asked
pub struct MockGenerator {
    replies: Mutex<VecDeque<Result<ReplyPayload, LlmError>>>,
    title: Mutex<Option<String>>,
    requests: Mutex<Vec<ReplyRequest>>,
    excerpts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            title: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            excerpts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply
    pub fn queue_reply(&self, content: impl Into<String>, should_continue: bool) {
        self.replies.lock().unwrap().push_back(Ok(ReplyPayload {
            content: content.into(),
            should_continue,
        }));
    }

    /// Queue an error reply
    pub fn queue_error(&self, error: LlmError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    /// Title returned by `generate_title`; the default title when unset
    pub fn set_title(&self, title: impl Into<String>) {
        *self.title.lock().unwrap() = Some(title.into());
    }

    pub fn recorded_requests(&self) -> Vec<ReplyRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn recorded_excerpts(&self) -> Vec<String> {
        self.excerpts.lock().unwrap().clone()
    }

    fn next_reply(&self, request: &ReplyRequest) -> Result<ReplyPayload, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock reply queued")))
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate_reply(&self, request: &ReplyRequest) -> Result<ReplyPayload, LlmError> {
        self.next_reply(request)
    }

    async fn generate_title(&self, excerpt: &str) -> String {
        self.excerpts.lock().unwrap().push(excerpt.to_string());
        self.title
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| DEFAULT_TITLE.to_string())
    }
}

// ============================================================================
// Delayed Mock Generator (for timeout and concurrency testing)
// ============================================================================

/// Generator that sleeps before answering
pub struct DelayedMockGenerator {
    inner: MockGenerator,
    delay: Duration,
}

impl DelayedMockGenerator {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockGenerator::new(),
            delay,
        }
    }

    pub fn queue_reply(&self, content: impl Into<String>, should_continue: bool) {
        self.inner.queue_reply(content, should_continue);
    }
}

#[async_trait]
impl Generator for DelayedMockGenerator {
    async fn generate_reply(&self, request: &ReplyRequest) -> Result<ReplyPayload, LlmError> {
        tokio::time::sleep(self.delay).await;
        self.inner.next_reply(request)
    }

    async fn generate_title(&self, excerpt: &str) -> String {
        tokio::time::sleep(self.delay).await;
        self.inner.generate_title(excerpt).await
    }
}

// ============================================================================
// Failing Store (for persistence failure testing)
// ============================================================================

/// Arena store whose writes can be switched to fail
pub struct FailingStore {
    inner: MemoryStore,
    fail_appends: AtomicBool,
}

impl FailingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_appends: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Make every subsequent `commit_message` fail
    pub fn fail_appends(&self) {
        self.fail_appends.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConversationStore for FailingStore {
    async fn get_character(&self, id: i64) -> DbResult<Character> {
        self.inner.get_character(id)
    }

    async fn get_conversation(&self, id: i64) -> DbResult<ConversationDetail> {
        self.inner.get_conversation(id)
    }

    async fn commit_message(
        &self,
        conversation_id: i64,
        message: &NewMessage,
        update: &ConversationUpdate,
    ) -> DbResult<Message> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("disk full".to_string()));
        }
        self.inner.commit_message(conversation_id, message, update)
    }

    async fn update_conversation(
        &self,
        id: i64,
        update: &ConversationUpdate,
    ) -> DbResult<Conversation> {
        self.inner.update_conversation(id, update)
    }
}

#[async_trait]
impl CatalogStore for FailingStore {
    async fn create_character(&self, new: &NewCharacter) -> DbResult<Character> {
        self.inner.create_character(new)
    }

    async fn list_characters(&self, active_only: bool) -> DbResult<Vec<Character>> {
        self.inner.list_characters(active_only)
    }

    async fn update_character(&self, id: i64, update: &CharacterUpdate) -> DbResult<Character> {
        self.inner.update_character(id, update)
    }

    async fn delete_character(&self, id: i64) -> DbResult<()> {
        self.inner.delete_character(id)
    }

    async fn create_conversation(&self, new: &NewConversation) -> DbResult<Conversation> {
        self.inner.create_conversation(new)
    }

    async fn list_conversations(&self) -> DbResult<Vec<Conversation>> {
        self.inner.list_conversations()
    }

    async fn delete_conversation(&self, id: i64) -> DbResult<()> {
        self.inner.delete_conversation(id)
    }
}
