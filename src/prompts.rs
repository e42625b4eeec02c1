//! Prompt construction for character replies
//!
//! The system prompt introduces the character and the reply contract; the
//! user message carries the transcript and the steering prompt.

use std::fmt::Write;

/// Shown to the model in place of an empty transcript
pub const EMPTY_TRANSCRIPT: &str = "This is the beginning of the conversation.";

const REPLY_INSTRUCTIONS: &str = r#"Instructions:
- Stay in character at all times
- Respond naturally as {name} would, considering your personality and expertise
- Keep responses conversational but substantial (2-4 sentences typically)
- Build on previous messages in the conversation
- Ask questions or make points that could lead to interesting dialogue
- Respond in JSON format: {"content": "your response", "shouldContinue": true/false}
- Set shouldContinue to true if the conversation should naturally continue, false if it feels like a natural ending point"#;

/// System prompt for a character: identity, personality, then the reply rules
pub fn character_system_prompt(name: &str, personality: &str) -> String {
    let mut prompt = format!("You are {name}.");
    let personality = personality.trim();
    if !personality.is_empty() {
        prompt.push(' ');
        prompt.push_str(personality);
    }
    prompt.push_str("\n\n");
    prompt.push_str(&REPLY_INSTRUCTIONS.replace("{name}", name));
    prompt
}

/// User message asking `name` for the next line
pub fn character_user_message(name: &str, transcript: &str, prompt: Option<&str>) -> String {
    let history = if transcript.trim().is_empty() {
        EMPTY_TRANSCRIPT
    } else {
        transcript
    };

    let mut message = format!("Conversation so far:\n{history}");
    if let Some(prompt) = prompt.map(str::trim).filter(|p| !p.is_empty()) {
        let _ = write!(message, "\n\nUser prompt: {prompt}");
    }
    let _ = write!(message, "\n\nPlease respond as {name}:");
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_embeds_identity_and_contract() {
        let prompt = character_system_prompt("Ada Lovelace", "A mathematician fond of engines.");

        assert!(prompt.starts_with("You are Ada Lovelace. A mathematician fond of engines."));
        assert!(prompt.contains("Respond naturally as Ada Lovelace would"));
        assert!(prompt.contains(r#""shouldContinue": true/false"#));
        assert!(!prompt.contains("{name}"));
    }

    #[test]
    fn test_system_prompt_without_personality() {
        let prompt = character_system_prompt("Echo", "   ");
        assert!(prompt.starts_with("You are Echo.\n\n"));
    }

    #[test]
    fn test_user_message_with_prompt() {
        let message = character_user_message("Bob", "User: Discuss X", Some("Be brief"));
        assert_eq!(
            message,
            "Conversation so far:\nUser: Discuss X\n\nUser prompt: Be brief\n\nPlease respond as Bob:"
        );
    }

    #[test]
    fn test_user_message_for_empty_transcript() {
        let message = character_user_message("Bob", "", None);
        assert_eq!(
            message,
            format!("Conversation so far:\n{EMPTY_TRANSCRIPT}\n\nPlease respond as Bob:")
        );
    }
}
