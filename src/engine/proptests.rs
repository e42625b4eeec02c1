//! Property-based tests for the turn engine
//!
//! - Transcripts have one line per resolvable message, in turn order
//! - Round-robin is `cursor mod N` and depends only on its inputs
//! - Turn numbers strictly increase across mixed user and generated appends
//! - A failed generation leaves the conversation untouched

use super::committer::{EngineConfig, TurnEngine, TurnRequest};
use super::scheduler::{round_robin_index, schedule, Selection};
use super::testing::MockGenerator;
use super::transcript::build_transcript;
use crate::db::{Character, MemoryStore, Message, NewCharacter, NewConversation, ResolvedMessage};
use crate::llm::LlmError;
use chrono::Utc;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// (turn, author) pairs; author `None` is the user, `Some((id, resolvable))` a character
fn arb_messages() -> impl Strategy<Value = Vec<(i64, Option<(i64, bool)>)>> {
    proptest::collection::vec(
        (
            1i64..50,
            proptest::option::of((1i64..5, any::<bool>())),
        ),
        0..20,
    )
}

fn materialize(layout: &[(i64, Option<(i64, bool)>)]) -> Vec<ResolvedMessage> {
    layout.iter()
        .enumerate()
        .map(|(i, (turn, author))| {
            let id = i64::try_from(i).unwrap() + 1;
            ResolvedMessage {
                message: Message {
                    id,
                    conversation_id: 1,
                    character_id: author.map(|(cid, _)| cid),
                    content: format!("line {id}"),
                    is_user_prompt: author.is_none(),
                    turn_number: *turn,
                    created_at: Utc::now(),
                },
                character: author.filter(|(_, resolvable)| *resolvable).map(|(cid, _)| Character {
                    id: cid,
                    name: format!("C{cid}"),
                    role: String::new(),
                    personality: String::new(),
                    avatar_url: None,
                    is_active: true,
                    is_public: true,
                    owner_id: None,
                    created_at: Utc::now(),
                }),
            }
        })
        .collect()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn seeded_engine(participants: usize) -> (MemoryStore, TurnEngine<MemoryStore, MockGenerator>, i64) {
    let store = MemoryStore::new();
    let ids = (0..participants)
        .map(|i| {
            store
                .create_character(&NewCharacter {
                    name: format!("P{i}"),
                    role: "Panelist".to_string(),
                    personality: "Concise".to_string(),
                    avatar_url: None,
                    is_active: true,
                    is_public: true,
                    owner_id: None,
                })
                .unwrap()
                .id
        })
        .collect();
    let conv = store
        .create_conversation(&NewConversation {
            title: "Property".to_string(),
            participant_ids: ids,
            is_autonomous: true,
            owner_id: None,
        })
        .unwrap();
    let engine = TurnEngine::new(store.clone(), MockGenerator::new(), EngineConfig::default());
    (store, engine, conv.id)
}

// ============================================================================
// Transcript
// ============================================================================

proptest! {
    #[test]
    fn prop_transcript_one_line_per_resolvable_message(layout in arb_messages()) {
        let messages = materialize(&layout);
        let transcript = build_transcript(&messages);

        let expected = layout
            .iter()
            .filter(|(_, author)| author.is_none_or(|(_, resolvable)| resolvable))
            .count();
        let lines: Vec<&str> = if transcript.is_empty() {
            Vec::new()
        } else {
            transcript.lines().collect()
        };
        prop_assert_eq!(lines.len(), expected);
    }

    #[test]
    fn prop_transcript_lines_follow_turn_order(layout in arb_messages()) {
        let messages = materialize(&layout);
        let transcript = build_transcript(&messages);

        // Content is "line <id>"; map each line back to its message's turn
        let turns: Vec<i64> = transcript
            .lines()
            .filter_map(|line| line.rsplit_once("line "))
            .filter_map(|(_, id)| id.parse::<i64>().ok())
            .map(|id| messages.iter().find(|m| m.message.id == id).unwrap().message.turn_number)
            .collect();
        prop_assert!(turns.windows(2).all(|w| w[0] <= w[1]));

        for line in transcript.lines() {
            let (speaker, _) = line.split_once(": ").unwrap();
            prop_assert!(speaker == "User" || speaker.starts_with('C'));
        }
    }
}

// ============================================================================
// Scheduling
// ============================================================================

proptest! {
    #[test]
    fn prop_round_robin_is_cursor_mod_len(
        participants in proptest::collection::vec(1i64..1000, 1..10),
        cursor in 0i64..10_000,
        last_turn in 0i64..100,
    ) {
        let first = schedule(&participants, Selection::RoundRobin, cursor, last_turn).unwrap();
        let again = schedule(&participants, Selection::RoundRobin, cursor, last_turn).unwrap();

        let n = i64::try_from(participants.len()).unwrap();
        let expected = usize::try_from(cursor % n).unwrap();
        prop_assert_eq!(first.speaker_index, expected);
        prop_assert_eq!(first.character_id, participants[expected]);
        prop_assert_eq!(first.turn_number, last_turn + 1);
        prop_assert_eq!(first, again);
    }

    #[test]
    fn prop_round_robin_index_in_range(cursor in any::<i64>(), len in 1usize..64) {
        let index = round_robin_index(cursor, len).unwrap();
        prop_assert!(index < len);
    }
}

// ============================================================================
// Committing
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_turn_numbers_strictly_increase(
        ops in proptest::collection::vec(any::<bool>(), 1..12),
        participants in 1usize..4,
    ) {
        let (store, engine, conv_id) = seeded_engine(participants);

        runtime().block_on(async {
            for user_turn in &ops {
                if *user_turn {
                    engine.post_user_message(conv_id, "steer", None).await.unwrap();
                } else {
                    engine.generator().queue_reply("reply", true);
                    engine
                        .generate_next_turn(conv_id, &TurnRequest::default())
                        .await
                        .unwrap();
                }
            }
        });

        let detail = store.get_conversation(conv_id).unwrap();
        let turns: Vec<i64> = detail.messages.iter().map(|m| m.message.turn_number).collect();
        prop_assert_eq!(turns.len(), ops.len());
        prop_assert!(turns.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(detail.conversation.current_turn, *turns.last().unwrap());
    }

    #[test]
    fn prop_failed_generation_changes_nothing(
        prior_user_messages in 0usize..4,
        participants in 1usize..4,
    ) {
        let (store, engine, conv_id) = seeded_engine(participants);

        let err = runtime().block_on(async {
            for _ in 0..prior_user_messages {
                engine.post_user_message(conv_id, "steer", None).await.unwrap();
            }
            engine.generator().queue_error(LlmError::network("connection reset"));
            engine
                .generate_next_turn(conv_id, &TurnRequest::default())
                .await
                .unwrap_err()
        });
        prop_assert!(err.to_string().contains("connection reset"));

        let detail = store.get_conversation(conv_id).unwrap();
        prop_assert_eq!(detail.messages.len(), prior_user_messages);
        prop_assert_eq!(
            detail.conversation.current_turn,
            i64::try_from(prior_user_messages).unwrap()
        );
        prop_assert_eq!(detail.conversation.speaker_cursor, 0);
    }
}
