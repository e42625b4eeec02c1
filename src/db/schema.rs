//! Database schema and record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS characters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    role TEXT NOT NULL,
    personality TEXT NOT NULL,
    avatar_url TEXT,
    is_active BOOLEAN NOT NULL DEFAULT 1,
    is_public BOOLEAN NOT NULL DEFAULT 1,
    owner_id TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS conversations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    participant_ids TEXT NOT NULL,
    is_autonomous BOOLEAN NOT NULL DEFAULT 0,
    current_turn INTEGER NOT NULL DEFAULT 0,
    speaker_cursor INTEGER NOT NULL DEFAULT 0,
    owner_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_updated ON conversations(updated_at DESC);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id INTEGER NOT NULL,
    character_id INTEGER,
    content TEXT NOT NULL,
    is_user_prompt BOOLEAN NOT NULL DEFAULT 0,
    turn_number INTEGER NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, turn_number);
";

/// A persona usable as a conversation participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: i64,
    pub name: String,
    pub role: String,
    /// Used verbatim as generation instructions
    pub personality: String,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub is_public: bool,
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating a character
#[derive(Debug, Clone, Deserialize)]
pub struct NewCharacter {
    pub name: String,
    pub role: String,
    pub personality: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub owner_id: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Partial character update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CharacterUpdate {
    pub name: Option<String>,
    pub role: Option<String>,
    pub personality: Option<String>,
    pub avatar_url: Option<String>,
    pub is_active: Option<bool>,
    pub is_public: Option<bool>,
}

impl CharacterUpdate {
    pub fn apply(&self, character: &mut Character) {
        if let Some(name) = &self.name {
            character.name.clone_from(name);
        }
        if let Some(role) = &self.role {
            character.role.clone_from(role);
        }
        if let Some(personality) = &self.personality {
            character.personality.clone_from(personality);
        }
        if let Some(avatar_url) = &self.avatar_url {
            character.avatar_url = Some(avatar_url.clone());
        }
        if let Some(is_active) = self.is_active {
            character.is_active = is_active;
        }
        if let Some(is_public) = self.is_public {
            character.is_public = is_public;
        }
    }
}

/// Conversation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub title: String,
    /// Participant character ids in creation order. Weak references.
    pub participant_ids: Vec<i64>,
    pub is_autonomous: bool,
    /// Highest committed turn number
    pub current_turn: i64,
    /// Round-robin index; only moves when a character reply is committed
    pub speaker_cursor: i64,
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a conversation
#[derive(Debug, Clone, Deserialize)]
pub struct NewConversation {
    pub title: String,
    pub participant_ids: Vec<i64>,
    #[serde(default)]
    pub is_autonomous: bool,
    #[serde(default)]
    pub owner_id: Option<String>,
}

/// Partial conversation update. `updated_at` is always bumped.
#[derive(Debug, Clone, Default)]
pub struct ConversationUpdate {
    pub title: Option<String>,
    pub current_turn: Option<i64>,
    pub speaker_cursor: Option<i64>,
}

impl ConversationUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn apply(&self, conversation: &mut Conversation, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            conversation.title.clone_from(title);
        }
        if let Some(turn) = self.current_turn {
            // current_turn never goes backward
            conversation.current_turn = conversation.current_turn.max(turn);
        }
        if let Some(cursor) = self.speaker_cursor {
            conversation.speaker_cursor = cursor;
        }
        conversation.updated_at = now;
    }
}

/// Message record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    /// `None` means the user authored it
    pub character_id: Option<i64>,
    pub content: String,
    pub is_user_prompt: bool,
    pub turn_number: i64,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_user_authored(&self) -> bool {
        self.is_user_prompt || self.character_id.is_none()
    }
}

/// Fields supplied when appending a message
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub character_id: Option<i64>,
    pub content: String,
    pub is_user_prompt: bool,
    pub turn_number: i64,
}

impl NewMessage {
    pub fn user(content: impl Into<String>, turn_number: i64) -> Self {
        Self {
            character_id: None,
            content: content.into(),
            is_user_prompt: true,
            turn_number,
        }
    }

    pub fn character(character_id: i64, content: impl Into<String>, turn_number: i64) -> Self {
        Self {
            character_id: Some(character_id),
            content: content.into(),
            is_user_prompt: false,
            turn_number,
        }
    }
}

/// A message with its author resolved at the read boundary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMessage {
    #[serde(flatten)]
    pub message: Message,
    pub character: Option<Character>,
}

/// Conversation with its messages (turn order) and resolved participants
#[derive(Debug, Clone, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<ResolvedMessage>,
    /// Participants that still resolve, in `participant_ids` order
    pub participants: Vec<Character>,
}

impl ConversationDetail {
    pub fn max_turn_number(&self) -> i64 {
        self.messages
            .iter()
            .map(|m| m.message.turn_number)
            .max()
            .unwrap_or(0)
    }
}
