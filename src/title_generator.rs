//! Conversation title generation using a fast/cheap LLM
//!
//! Generates short titles from the opening lines of a conversation. Never
//! fails: any error, timeout or empty answer yields [`DEFAULT_TITLE`].

use crate::llm::{LlmRequest, LlmService};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

pub const DEFAULT_TITLE: &str = "Untitled Conversation";

const TITLE_PROMPT: &str = r#"Generate a concise, engaging title (2-6 words) for this conversation. Respond in JSON format: {"title": "your title"}"#;

const TITLE_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_TITLE_LENGTH: usize = 60;
const MAX_EXCERPT_CHARS: usize = 2000;

/// Generate a title from a transcript excerpt
pub async fn generate_title(excerpt: &str, llm_service: Arc<dyn LlmService>) -> String {
    generate_title_within(excerpt, llm_service, TITLE_TIMEOUT).await
}

async fn generate_title_within(
    excerpt: &str,
    llm_service: Arc<dyn LlmService>,
    limit: Duration,
) -> String {
    // Truncate very long excerpts for the prompt
    let truncated: String = excerpt.chars().take(MAX_EXCERPT_CHARS).collect();

    let request = LlmRequest::single(TITLE_PROMPT, format!("Conversation excerpt:\n{truncated}"))
        .with_max_tokens(100)
        .with_temperature(0.7)
        .with_json_output();

    match timeout(limit, llm_service.complete(&request)).await {
        Ok(Ok(response)) => extract_title(&response.text)
            .map(|t| sanitize_title(&t))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| {
                tracing::warn!("Title generation returned nothing usable");
                DEFAULT_TITLE.to_string()
            }),
        Ok(Err(e)) => {
            tracing::warn!(error = %e.message, "Title generation LLM error");
            DEFAULT_TITLE.to_string()
        }
        Err(_) => {
            tracing::warn!("Title generation timed out");
            DEFAULT_TITLE.to_string()
        }
    }
}

#[derive(Deserialize)]
struct TitleReply {
    title: Option<String>,
}

/// Read `{"title": ...}`; a bare line of text is accepted as the title
fn extract_title(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str::<TitleReply>(trimmed).ok()?.title;
    }
    trimmed.lines().next().map(str::to_string)
}

/// Strip quotes, collapse whitespace and cap the length at a word boundary
fn sanitize_title(title: &str) -> String {
    let unquoted = title.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`');
    let collapsed = unquoted.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= MAX_TITLE_LENGTH {
        return collapsed;
    }

    let mut truncated = String::new();
    let mut length = 0;
    for word in collapsed.split(' ') {
        let separator = usize::from(!truncated.is_empty());
        let word_length = word.chars().count();
        if length + separator + word_length > MAX_TITLE_LENGTH {
            break;
        }
        if separator == 1 {
            truncated.push(' ');
        }
        truncated.push_str(word);
        length += separator + word_length;
    }

    // A single oversized word is cut mid-word
    if truncated.is_empty() {
        collapsed.chars().take(MAX_TITLE_LENGTH).collect()
    } else {
        truncated
    }
}
