//! Database module for Roundtable
//!
//! Provides persistence for characters, conversations and messages. Two
//! backends exist: [`Database`] (SQLite, durable) and [`MemoryStore`]
//! (process memory, lost on restart).

mod memory;
mod schema;

pub use memory::MemoryStore;
pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Character not found: {0}")]
    CharacterNotFound(i64),
    #[error("Conversation not found: {0}")]
    ConversationNotFound(i64),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl DbError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DbError::CharacterNotFound(_) | DbError::ConversationNotFound(_)
        )
    }
}

pub type DbResult<T> = Result<T, DbError>;

const CHARACTER_COLUMNS: &str =
    "id, name, role, personality, avatar_url, is_active, is_public, owner_id, created_at";

const CONVERSATION_COLUMNS: &str = "id, title, participant_ids, is_autonomous, current_turn, \
     speaker_cursor, owner_id, created_at, updated_at";

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> DbResult<T>) -> DbResult<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Unavailable("connection mutex poisoned".to_string()))?;
        f(&mut *conn)
    }

    // ==================== Character Operations ====================

    pub fn create_character(&self, new: &NewCharacter) -> DbResult<Character> {
        self.with_conn(|conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO characters (name, role, personality, avatar_url, is_active, is_public, owner_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    new.name,
                    new.role,
                    new.personality,
                    new.avatar_url,
                    new.is_active,
                    new.is_public,
                    new.owner_id,
                    now.to_rfc3339(),
                ],
            )?;

            Ok(Character {
                id: conn.last_insert_rowid(),
                name: new.name.clone(),
                role: new.role.clone(),
                personality: new.personality.clone(),
                avatar_url: new.avatar_url.clone(),
                is_active: new.is_active,
                is_public: new.is_public,
                owner_id: new.owner_id.clone(),
                created_at: now,
            })
        })
    }

    pub fn get_character(&self, id: i64) -> DbResult<Character> {
        self.with_conn(|conn| {
            query_character(conn, id)?.ok_or(DbError::CharacterNotFound(id))
        })
    }

    /// List characters, newest first
    pub fn list_characters(&self, active_only: bool) -> DbResult<Vec<Character>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {CHARACTER_COLUMNS} FROM characters
                 WHERE (?1 = 0 OR is_active = 1)
                 ORDER BY created_at DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![active_only], parse_character_row)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })
    }

    pub fn update_character(&self, id: i64, update: &CharacterUpdate) -> DbResult<Character> {
        self.with_conn(|conn| {
            let mut character = query_character(conn, id)?.ok_or(DbError::CharacterNotFound(id))?;
            update.apply(&mut character);

            conn.execute(
                "UPDATE characters SET name = ?1, role = ?2, personality = ?3, avatar_url = ?4,
                        is_active = ?5, is_public = ?6
                 WHERE id = ?7",
                params![
                    character.name,
                    character.role,
                    character.personality,
                    character.avatar_url,
                    character.is_active,
                    character.is_public,
                    id,
                ],
            )?;
            Ok(character)
        })
    }

    /// Delete a character. Messages keep their dangling `character_id`.
    pub fn delete_character(&self, id: i64) -> DbResult<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM characters WHERE id = ?1", params![id])?;
            if deleted == 0 {
                return Err(DbError::CharacterNotFound(id));
            }
            Ok(())
        })
    }

    // ==================== Conversation Operations ====================

    pub fn create_conversation(&self, new: &NewConversation) -> DbResult<Conversation> {
        self.with_conn(|conn| {
            let now = Utc::now();
            let participants = serde_json::to_string(&new.participant_ids)
                .map_err(|e| DbError::Corrupt(e.to_string()))?;

            conn.execute(
                "INSERT INTO conversations (title, participant_ids, is_autonomous, current_turn, speaker_cursor, owner_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, 0, ?4, ?5, ?5)",
                params![
                    new.title,
                    participants,
                    new.is_autonomous,
                    new.owner_id,
                    now.to_rfc3339(),
                ],
            )?;

            Ok(Conversation {
                id: conn.last_insert_rowid(),
                title: new.title.clone(),
                participant_ids: new.participant_ids.clone(),
                is_autonomous: new.is_autonomous,
                current_turn: 0,
                speaker_cursor: 0,
                owner_id: new.owner_id.clone(),
                created_at: now,
                updated_at: now,
            })
        })
    }

    /// Get a conversation with its messages (turn order) and resolved participants
    pub fn get_conversation(&self, id: i64) -> DbResult<ConversationDetail> {
        self.with_conn(|conn| {
            let conversation =
                query_conversation(conn, id)?.ok_or(DbError::ConversationNotFound(id))?;
            let messages = query_messages(conn, id)?;

            let mut participants = Vec::with_capacity(conversation.participant_ids.len());
            for pid in &conversation.participant_ids {
                // Deleted characters are dropped silently
                if let Some(character) = query_character(conn, *pid)? {
                    participants.push(character);
                }
            }

            Ok(ConversationDetail {
                conversation,
                messages,
                participants,
            })
        })
    }

    /// List conversations, most recently updated first
    pub fn list_conversations(&self) -> DbResult<Vec<Conversation>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations ORDER BY updated_at DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], parse_conversation_row)?;
            let rows = rows.collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(RawConversation::into_conversation).collect()
        })
    }

    pub fn update_conversation(&self, id: i64, update: &ConversationUpdate) -> DbResult<Conversation> {
        self.with_conn(|conn| {
            let mut conversation =
                query_conversation(conn, id)?.ok_or(DbError::ConversationNotFound(id))?;
            update.apply(&mut conversation, Utc::now());

            conn.execute(
                "UPDATE conversations SET title = ?1, current_turn = ?2, speaker_cursor = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    conversation.title,
                    conversation.current_turn,
                    conversation.speaker_cursor,
                    conversation.updated_at.to_rfc3339(),
                    id,
                ],
            )?;
            Ok(conversation)
        })
    }

    /// Delete a conversation and all its messages
    pub fn delete_conversation(&self, id: i64) -> DbResult<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM messages WHERE conversation_id = ?1", params![id])?;
            let deleted = tx.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
            if deleted == 0 {
                return Err(DbError::ConversationNotFound(id));
            }
            tx.commit()?;
            Ok(())
        })
    }

    // ==================== Message Operations ====================

    /// Append a message and bump the conversation's `updated_at`
    #[cfg(test)]
    pub fn append_message(&self, conversation_id: i64, new: &NewMessage) -> DbResult<Message> {
        self.commit_message(conversation_id, new, &ConversationUpdate::default())
    }

    /// Append a message and apply `update` to its conversation in one
    /// transaction; on error neither is written
    pub fn commit_message(
        &self,
        conversation_id: i64,
        new: &NewMessage,
        update: &ConversationUpdate,
    ) -> DbResult<Message> {
        self.with_conn(|conn| {
            let now = Utc::now();
            let tx = conn.transaction()?;

            let mut conversation = query_conversation(&tx, conversation_id)?
                .ok_or(DbError::ConversationNotFound(conversation_id))?;
            update.apply(&mut conversation, now);

            tx.execute(
                "UPDATE conversations SET title = ?1, current_turn = ?2, speaker_cursor = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    conversation.title,
                    conversation.current_turn,
                    conversation.speaker_cursor,
                    conversation.updated_at.to_rfc3339(),
                    conversation_id,
                ],
            )?;

            tx.execute(
                "INSERT INTO messages (conversation_id, character_id, content, is_user_prompt, turn_number, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    conversation_id,
                    new.character_id,
                    new.content,
                    new.is_user_prompt,
                    new.turn_number,
                    now.to_rfc3339(),
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;

            Ok(Message {
                id,
                conversation_id,
                character_id: new.character_id,
                content: new.content.clone(),
                is_user_prompt: new.is_user_prompt,
                turn_number: new.turn_number,
                created_at: now,
            })
        })
    }
}

fn query_character(conn: &Connection, id: i64) -> DbResult<Option<Character>> {
    let sql = format!("SELECT {CHARACTER_COLUMNS} FROM characters WHERE id = ?1");
    conn.query_row(&sql, params![id], parse_character_row)
        .optional()
        .map_err(DbError::from)
}

fn query_conversation(conn: &Connection, id: i64) -> DbResult<Option<Conversation>> {
    let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1");
    conn.query_row(&sql, params![id], parse_conversation_row)
        .optional()?
        .map(RawConversation::into_conversation)
        .transpose()
}

fn query_messages(conn: &Connection, conversation_id: i64) -> DbResult<Vec<ResolvedMessage>> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.conversation_id, m.character_id, m.content, m.is_user_prompt, m.turn_number, m.created_at,
                c.id, c.name, c.role, c.personality, c.avatar_url, c.is_active, c.is_public, c.owner_id, c.created_at
         FROM messages m LEFT JOIN characters c ON c.id = m.character_id
         WHERE m.conversation_id = ?1
         ORDER BY m.turn_number ASC, m.id ASC",
    )?;

    let rows = stmt.query_map(params![conversation_id], |row| {
        let message = Message {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            character_id: row.get(2)?,
            content: row.get(3)?,
            is_user_prompt: row.get(4)?,
            turn_number: row.get(5)?,
            created_at: parse_datetime(&row.get::<_, String>(6)?),
        };
        let character = match row.get::<_, Option<i64>>(7)? {
            Some(id) => Some(Character {
                id,
                name: row.get(8)?,
                role: row.get(9)?,
                personality: row.get(10)?,
                avatar_url: row.get(11)?,
                is_active: row.get(12)?,
                is_public: row.get(13)?,
                owner_id: row.get(14)?,
                created_at: parse_datetime(&row.get::<_, String>(15)?),
            }),
            None => None,
        };
        Ok(ResolvedMessage { message, character })
    })?;

    rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
}

fn parse_character_row(row: &Row<'_>) -> rusqlite::Result<Character> {
    Ok(Character {
        id: row.get(0)?,
        name: row.get(1)?,
        role: row.get(2)?,
        personality: row.get(3)?,
        avatar_url: row.get(4)?,
        is_active: row.get(5)?,
        is_public: row.get(6)?,
        owner_id: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

/// Row with participant ids still JSON-encoded
struct RawConversation {
    conversation: Conversation,
    participant_json: String,
}

impl RawConversation {
    fn into_conversation(self) -> DbResult<Conversation> {
        let participant_ids: Vec<i64> = serde_json::from_str(&self.participant_json)
            .map_err(|e| {
                DbError::Corrupt(format!(
                    "conversation {} participant_ids: {e}",
                    self.conversation.id
                ))
            })?;
        Ok(Conversation {
            participant_ids,
            ..self.conversation
        })
    }
}

fn parse_conversation_row(row: &Row<'_>) -> rusqlite::Result<RawConversation> {
    Ok(RawConversation {
        conversation: Conversation {
            id: row.get(0)?,
            title: row.get(1)?,
            participant_ids: Vec::new(),
            is_autonomous: row.get(3)?,
            current_turn: row.get(4)?,
            speaker_cursor: row.get(5)?,
            owner_id: row.get(6)?,
            created_at: parse_datetime(&row.get::<_, String>(7)?),
            updated_at: parse_datetime(&row.get::<_, String>(8)?),
        },
        participant_json: row.get(2)?,
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
