//! Turn engine errors

use super::scheduler::ScheduleError;
use crate::db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conversation {0} has no participants that can speak")]
    NoParticipants(i64),

    #[error("Character {character_id} is not a participant of conversation {conversation_id}")]
    ParticipantNotInConversation {
        character_id: i64,
        conversation_id: i64,
    },

    #[error("Failed to generate response for {character}: {reason}")]
    GenerationFailed { character: String, reason: String },

    #[error("Persistence failed: {0}")]
    Persistence(DbError),

    /// The model replied but the reply could not be stored
    #[error("Generated reply could not be recorded: {source}")]
    UnrecordedReply {
        content: String,
        #[source]
        source: DbError,
    },
}

impl EngineError {
    pub(crate) fn from_schedule(err: ScheduleError, conversation_id: i64) -> Self {
        match err {
            ScheduleError::NoParticipants => EngineError::NoParticipants(conversation_id),
            ScheduleError::NotAParticipant(character_id) => {
                EngineError::ParticipantNotInConversation {
                    character_id,
                    conversation_id,
                }
            }
            ScheduleError::TurnOverflow => EngineError::InvalidInput(format!(
                "conversation {conversation_id} has no turn numbers left"
            )),
        }
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::CharacterNotFound(id) => EngineError::NotFound {
                entity: "Character",
                id,
            },
            DbError::ConversationNotFound(id) => EngineError::NotFound {
                entity: "Conversation",
                id,
            },
            other => EngineError::Persistence(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_storage_errors_surface_as_not_found() {
        let err = EngineError::from(DbError::ConversationNotFound(9));
        assert!(matches!(
            err,
            EngineError::NotFound {
                entity: "Conversation",
                id: 9
            }
        ));
        assert_eq!(err.to_string(), "Conversation 9 not found");

        let err = EngineError::from(DbError::Unavailable("gone".to_string()));
        assert!(matches!(err, EngineError::Persistence(_)));
    }

    #[test]
    fn test_schedule_errors_carry_conversation() {
        let err = EngineError::from_schedule(ScheduleError::NotAParticipant(4), 2);
        assert_eq!(
            err.to_string(),
            "Character 4 is not a participant of conversation 2"
        );
    }
}
