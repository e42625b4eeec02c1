//! Transcript assembly

use crate::db::ResolvedMessage;

/// Speaker label for user-authored messages
pub const USER_SPEAKER: &str = "User";

/// Render messages as `"<speaker>: <content>"` lines in turn order.
///
/// Messages whose character no longer resolves are skipped.
pub fn build_transcript(messages: &[ResolvedMessage]) -> String {
    render(ordered(messages))
}

/// Transcript of the first `limit` messages in turn order
pub fn build_excerpt(messages: &[ResolvedMessage], limit: usize) -> String {
    render(ordered(messages).into_iter().take(limit).collect())
}

fn ordered(messages: &[ResolvedMessage]) -> Vec<&ResolvedMessage> {
    let mut sorted: Vec<&ResolvedMessage> = messages.iter().collect();
    sorted.sort_by_key(|m| (m.message.turn_number, m.message.id));
    sorted
}

fn render(messages: Vec<&ResolvedMessage>) -> String {
    messages
        .into_iter()
        .filter_map(|m| {
            let speaker = if m.message.is_user_authored() {
                USER_SPEAKER
            } else {
                m.character.as_ref()?.name.as_str()
            };
            Some(format!("{speaker}: {}", m.message.content))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Character, Message};
    use chrono::Utc;

    fn character(id: i64, name: &str) -> Character {
        Character {
            id,
            name: name.to_string(),
            role: "Guest".to_string(),
            personality: String::new(),
            avatar_url: None,
            is_active: true,
            is_public: true,
            owner_id: None,
            created_at: Utc::now(),
        }
    }

    fn message(id: i64, turn: i64, author: Option<Character>, content: &str) -> ResolvedMessage {
        ResolvedMessage {
            message: Message {
                id,
                conversation_id: 1,
                character_id: author.as_ref().map(|c| c.id),
                content: content.to_string(),
                is_user_prompt: author.is_none(),
                turn_number: turn,
                created_at: Utc::now(),
            },
            character: author,
        }
    }

    #[test]
    fn test_empty_transcript() {
        assert_eq!(build_transcript(&[]), "");
    }

    #[test]
    fn test_sorts_by_turn_and_labels_user() {
        let alice = character(1, "Alice");
        let messages = vec![
            message(2, 2, Some(alice), "Hello"),
            message(1, 1, None, "Discuss X"),
        ];
        assert_eq!(build_transcript(&messages), "User: Discuss X\nAlice: Hello");
    }

    #[test]
    fn test_skips_unresolvable_authors() {
        let mut orphan = message(2, 2, Some(character(9, "Gone")), "Lost line");
        orphan.character = None;
        let messages = vec![message(1, 1, None, "Hi"), orphan];
        assert_eq!(build_transcript(&messages), "User: Hi");
    }

    #[test]
    fn test_excerpt_takes_first_messages() {
        let bob = character(2, "Bob");
        let messages: Vec<_> = (1..=5)
            .map(|turn| message(turn, turn, Some(bob.clone()), &format!("line {turn}")))
            .collect();
        assert_eq!(
            build_excerpt(&messages, 3),
            "Bob: line 1\nBob: line 2\nBob: line 3"
        );
    }
}
