//! In-memory arena store
//!
//! Records live in id-keyed maps behind a single mutex; ids come from
//! per-table auto-incrementing counters. Nothing survives a restart.

use super::{
    Character, CharacterUpdate, Conversation, ConversationDetail, ConversationUpdate, DbError,
    DbResult, Message, NewCharacter, NewConversation, NewMessage, ResolvedMessage,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Arena {
    characters: BTreeMap<i64, Character>,
    conversations: BTreeMap<i64, Conversation>,
    messages: BTreeMap<i64, Message>,
    next_character_id: i64,
    next_conversation_id: i64,
    next_message_id: i64,
}

impl Arena {
    fn allocate(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn resolved_messages(&self, conversation_id: i64) -> Vec<ResolvedMessage> {
        let mut messages: Vec<ResolvedMessage> = self
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .map(|m| ResolvedMessage {
                message: m.clone(),
                character: m
                    .character_id
                    .and_then(|id| self.characters.get(&id).cloned()),
            })
            .collect();
        messages.sort_by_key(|m| (m.message.turn_number, m.message.id));
        messages
    }
}

/// Process-memory store with the same contract as the SQLite [`super::Database`]
#[derive(Clone, Default)]
pub struct MemoryStore {
    arena: Arc<Mutex<Arena>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_arena<T>(&self, f: impl FnOnce(&mut Arena) -> DbResult<T>) -> DbResult<T> {
        let mut arena = self
            .arena
            .lock()
            .map_err(|_| DbError::Unavailable("arena mutex poisoned".to_string()))?;
        f(&mut arena)
    }

    pub fn create_character(&self, new: &NewCharacter) -> DbResult<Character> {
        self.with_arena(|arena| {
            let id = Arena::allocate(&mut arena.next_character_id);
            let character = Character {
                id,
                name: new.name.clone(),
                role: new.role.clone(),
                personality: new.personality.clone(),
                avatar_url: new.avatar_url.clone(),
                is_active: new.is_active,
                is_public: new.is_public,
                owner_id: new.owner_id.clone(),
                created_at: Utc::now(),
            };
            arena.characters.insert(id, character.clone());
            Ok(character)
        })
    }

    pub fn get_character(&self, id: i64) -> DbResult<Character> {
        self.with_arena(|arena| {
            arena
                .characters
                .get(&id)
                .cloned()
                .ok_or(DbError::CharacterNotFound(id))
        })
    }

    /// List characters, newest first
    pub fn list_characters(&self, active_only: bool) -> DbResult<Vec<Character>> {
        self.with_arena(|arena| {
            let mut characters: Vec<Character> = arena
                .characters
                .values()
                .filter(|c| !active_only || c.is_active)
                .cloned()
                .collect();
            characters.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(characters)
        })
    }

    pub fn update_character(&self, id: i64, update: &CharacterUpdate) -> DbResult<Character> {
        self.with_arena(|arena| {
            let character = arena
                .characters
                .get_mut(&id)
                .ok_or(DbError::CharacterNotFound(id))?;
            update.apply(character);
            Ok(character.clone())
        })
    }

    pub fn delete_character(&self, id: i64) -> DbResult<()> {
        self.with_arena(|arena| {
            arena
                .characters
                .remove(&id)
                .map(|_| ())
                .ok_or(DbError::CharacterNotFound(id))
        })
    }

    pub fn create_conversation(&self, new: &NewConversation) -> DbResult<Conversation> {
        self.with_arena(|arena| {
            let id = Arena::allocate(&mut arena.next_conversation_id);
            let now = Utc::now();
            let conversation = Conversation {
                id,
                title: new.title.clone(),
                participant_ids: new.participant_ids.clone(),
                is_autonomous: new.is_autonomous,
                current_turn: 0,
                speaker_cursor: 0,
                owner_id: new.owner_id.clone(),
                created_at: now,
                updated_at: now,
            };
            arena.conversations.insert(id, conversation.clone());
            Ok(conversation)
        })
    }

    pub fn get_conversation(&self, id: i64) -> DbResult<ConversationDetail> {
        self.with_arena(|arena| {
            let conversation = arena
                .conversations
                .get(&id)
                .cloned()
                .ok_or(DbError::ConversationNotFound(id))?;
            let participants = conversation
                .participant_ids
                .iter()
                .filter_map(|pid| arena.characters.get(pid).cloned())
                .collect();
            Ok(ConversationDetail {
                messages: arena.resolved_messages(id),
                conversation,
                participants,
            })
        })
    }

    /// List conversations, most recently updated first
    pub fn list_conversations(&self) -> DbResult<Vec<Conversation>> {
        self.with_arena(|arena| {
            let mut conversations: Vec<Conversation> =
                arena.conversations.values().cloned().collect();
            conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
            Ok(conversations)
        })
    }

    pub fn update_conversation(&self, id: i64, update: &ConversationUpdate) -> DbResult<Conversation> {
        self.with_arena(|arena| {
            let conversation = arena
                .conversations
                .get_mut(&id)
                .ok_or(DbError::ConversationNotFound(id))?;
            update.apply(conversation, Utc::now());
            Ok(conversation.clone())
        })
    }

    pub fn delete_conversation(&self, id: i64) -> DbResult<()> {
        self.with_arena(|arena| {
            arena
                .conversations
                .remove(&id)
                .ok_or(DbError::ConversationNotFound(id))?;
            arena.messages.retain(|_, m| m.conversation_id != id);
            Ok(())
        })
    }

    #[cfg(test)]
    pub fn append_message(&self, conversation_id: i64, new: &NewMessage) -> DbResult<Message> {
        self.commit_message(conversation_id, new, &ConversationUpdate::default())
    }

    /// Append a message and apply `update` to its conversation under one lock
    pub fn commit_message(
        &self,
        conversation_id: i64,
        new: &NewMessage,
        update: &ConversationUpdate,
    ) -> DbResult<Message> {
        self.with_arena(|arena| {
            let now = Utc::now();
            let conversation = arena
                .conversations
                .get_mut(&conversation_id)
                .ok_or(DbError::ConversationNotFound(conversation_id))?;
            update.apply(conversation, now);

            let id = Arena::allocate(&mut arena.next_message_id);
            let message = Message {
                id,
                conversation_id,
                character_id: new.character_id,
                content: new.content.clone(),
                is_user_prompt: new.is_user_prompt,
                turn_number: new.turn_number,
                created_at: now,
            };
            arena.messages.insert(id, message.clone());
            Ok(message)
        })
    }
}
