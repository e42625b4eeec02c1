//! Turn execution and commit
//!
//! Each turn reads the conversation, schedules a speaker, asks the
//! generator for a reply and writes it back, all under the conversation's
//! lock. Either a new message appears with an advanced turn or nothing is
//! written and an error comes back.

use super::error::EngineError;
use super::locks::ConversationLocks;
use super::scheduler::{self, Selection};
use super::traits::{ConversationStore, Generator, ReplyPayload, ReplyRequest};
use super::transcript::{build_excerpt, build_transcript};
use crate::db::{
    Character, Conversation, ConversationDetail, ConversationUpdate, Message, NewMessage,
    ResolvedMessage,
};
use crate::llm::LlmErrorKind;
use serde::Serialize;
use std::time::Duration;

/// Stored when the model answers with something that cannot be decoded
pub const PLACEHOLDER_REPLY: &str = "I need a moment to think.";

/// Messages fed to the title generator
pub const TITLE_EXCERPT_MESSAGES: usize = 3;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on one reply generation
    pub generation_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(60),
        }
    }
}

/// Parameters for generating the next turn
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    /// Speaker to use instead of round-robin
    pub character_id: Option<i64>,
    /// Steering prompt for this turn only
    pub prompt: Option<String>,
}

/// Committed reply plus the model's continuation hint
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub message: ResolvedMessage,
    pub should_continue: bool,
}

/// The conversation turn engine
pub struct TurnEngine<S, G> {
    store: S,
    generator: G,
    locks: ConversationLocks,
    config: EngineConfig,
}

impl<S: ConversationStore, G: Generator> TurnEngine<S, G> {
    pub fn new(store: S, generator: G, config: EngineConfig) -> Self {
        Self {
            store,
            generator,
            locks: ConversationLocks::new(),
            config,
        }
    }

    #[cfg(test)]
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Append a user-authored message.
    ///
    /// `turn_number` must exceed every existing turn when given; otherwise
    /// the next turn is assigned.
    pub async fn post_user_message(
        &self,
        conversation_id: i64,
        content: &str,
        turn_number: Option<i64>,
    ) -> Result<Message, EngineError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(EngineError::InvalidInput(
                "message content must not be empty".to_string(),
            ));
        }

        let _guard = self.locks.acquire(conversation_id).await;

        let detail = self.store.get_conversation(conversation_id).await?;
        let last_turn = detail.max_turn_number();
        let turn_number = match turn_number {
            Some(requested) if requested <= last_turn => {
                return Err(EngineError::InvalidInput(format!(
                    "turn number {requested} must be greater than {last_turn}"
                )));
            }
            // A turn must always remain for the reply that follows
            Some(i64::MAX) => {
                return Err(EngineError::InvalidInput(format!(
                    "turn number must be less than {}",
                    i64::MAX
                )));
            }
            Some(requested) => requested,
            None => scheduler::next_turn_number([last_turn]).ok_or_else(|| {
                EngineError::InvalidInput(format!(
                    "conversation {conversation_id} has no turn numbers left"
                ))
            })?,
        };

        let message = self
            .store
            .commit_message(
                conversation_id,
                &NewMessage::user(content, turn_number),
                &ConversationUpdate {
                    current_turn: Some(turn_number),
                    ..ConversationUpdate::default()
                },
            )
            .await?;

        tracing::info!(conv_id = conversation_id, turn = turn_number, "User message appended");
        Ok(message)
    }

    /// Generate, persist and return the next character turn
    pub async fn generate_next_turn(
        &self,
        conversation_id: i64,
        request: &TurnRequest,
    ) -> Result<TurnOutcome, EngineError> {
        let _guard = self.locks.acquire(conversation_id).await;

        let detail = self.store.get_conversation(conversation_id).await?;
        let selection = Selection::from_request(request.character_id);
        if let Selection::Explicit(character_id) = selection {
            // Unknown characters are NotFound before membership is checked
            self.store.get_character(character_id).await?;
        }

        let participant_ids: Vec<i64> = detail.participants.iter().map(|c| c.id).collect();
        let decision = scheduler::schedule(
            &participant_ids,
            selection,
            detail.conversation.speaker_cursor,
            detail.max_turn_number(),
        )
        .map_err(|e| EngineError::from_schedule(e, conversation_id))?;
        let speaker = detail.participants[decision.speaker_index].clone();

        tracing::debug!(
            conv_id = conversation_id,
            character_id = decision.character_id,
            speaker = %speaker.name,
            turn = decision.turn_number,
            ?selection,
            "Scheduled turn"
        );

        let reply_request = ReplyRequest {
            character_name: speaker.name.clone(),
            personality: speaker.personality.clone(),
            transcript: build_transcript(&detail.messages),
            prompt: Some(steering_prompt(request.prompt.as_deref(), &detail)),
        };
        let payload = self.generate(&speaker, &reply_request).await?;

        let message = self
            .store
            .commit_message(
                conversation_id,
                &NewMessage::character(speaker.id, payload.content.clone(), decision.turn_number),
                &ConversationUpdate {
                    current_turn: Some(decision.turn_number),
                    speaker_cursor: Some(decision.next_cursor()),
                    ..ConversationUpdate::default()
                },
            )
            .await
            .map_err(|source| {
                tracing::error!(conv_id = conversation_id, error = %source, "Reply generated but not stored");
                EngineError::UnrecordedReply {
                    content: payload.content.clone(),
                    source,
                }
            })?;

        tracing::info!(
            conv_id = conversation_id,
            speaker = %speaker.name,
            turn = decision.turn_number,
            should_continue = payload.should_continue,
            "Turn committed"
        );

        Ok(TurnOutcome {
            message: ResolvedMessage {
                message,
                character: Some(speaker),
            },
            should_continue: payload.should_continue,
        })
    }

    /// Ask the generator for a new title and store it
    pub async fn regenerate_title(&self, conversation_id: i64) -> Result<Conversation, EngineError> {
        let detail = self.store.get_conversation(conversation_id).await?;
        if detail.messages.is_empty() {
            return Err(EngineError::InvalidInput(
                "conversation has no messages to title".to_string(),
            ));
        }

        let excerpt = build_excerpt(&detail.messages, TITLE_EXCERPT_MESSAGES);
        let title = self.generator.generate_title(&excerpt).await;

        let conversation = self
            .store
            .update_conversation(conversation_id, &ConversationUpdate::title(title))
            .await?;
        tracing::info!(conv_id = conversation_id, title = %conversation.title, "Title updated");
        Ok(conversation)
    }

    async fn generate(
        &self,
        speaker: &Character,
        request: &ReplyRequest,
    ) -> Result<ReplyPayload, EngineError> {
        let timeout = self.config.generation_timeout;
        match tokio::time::timeout(timeout, self.generator.generate_reply(request)).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(e)) if e.kind == LlmErrorKind::Malformed => {
                tracing::warn!(speaker = %speaker.name, error = %e, "Undecodable reply, using placeholder");
                Ok(ReplyPayload {
                    content: PLACEHOLDER_REPLY.to_string(),
                    should_continue: false,
                })
            }
            Ok(Err(e)) => Err(EngineError::GenerationFailed {
                character: speaker.name.clone(),
                reason: e.message,
            }),
            Err(_) => Err(EngineError::GenerationFailed {
                character: speaker.name.clone(),
                reason: format!("timed out after {}s", timeout.as_secs()),
            }),
        }
    }
}

/// Explicit prompt, else the newest user-authored message, else the title
fn steering_prompt(explicit: Option<&str>, detail: &ConversationDetail) -> String {
    if let Some(prompt) = explicit.map(str::trim).filter(|p| !p.is_empty()) {
        return prompt.to_string();
    }

    detail
        .messages
        .iter()
        .filter(|m| m.message.is_user_authored())
        .max_by_key(|m| (m.message.turn_number, m.message.id))
        .map_or_else(
            || detail.conversation.title.clone(),
            |m| m.message.content.clone(),
        )
}
