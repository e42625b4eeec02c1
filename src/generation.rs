//! Model-backed generation collaborator
//!
//! Builds character prompts, calls the registry's models and decodes the
//! structured reply.

use crate::engine::{Generator, ReplyPayload, ReplyRequest};
use crate::llm::{LlmError, LlmRequest, ModelRegistry};
use crate::prompts::{character_system_prompt, character_user_message};
use crate::title_generator::{self, DEFAULT_TITLE};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

const REPLY_MAX_TOKENS: u32 = 1000;
const REPLY_TEMPERATURE: f32 = 0.8;

/// [`Generator`] over the configured model registry
pub struct LlmGenerator {
    registry: Arc<ModelRegistry>,
}

impl LlmGenerator {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate_reply(&self, request: &ReplyRequest) -> Result<ReplyPayload, LlmError> {
        let llm = self
            .registry
            .default()
            .ok_or_else(|| LlmError::unavailable("No LLM provider configured"))?;

        let llm_request = LlmRequest::single(
            character_system_prompt(&request.character_name, &request.personality),
            character_user_message(
                &request.character_name,
                &request.transcript,
                request.prompt.as_deref(),
            ),
        )
        .with_max_tokens(REPLY_MAX_TOKENS)
        .with_temperature(REPLY_TEMPERATURE)
        .with_json_output();

        let response = llm.complete(&llm_request).await?;
        decode_reply_payload(&response.text)
    }

    async fn generate_title(&self, excerpt: &str) -> String {
        match self.registry.get_cheap_model() {
            Some(llm) => title_generator::generate_title(excerpt, llm).await,
            None => {
                tracing::debug!("No model for title generation, using default");
                DEFAULT_TITLE.to_string()
            }
        }
    }
}

/// Wire shape of a character reply
#[derive(Debug, Deserialize)]
struct RawReply {
    content: Option<String>,
    #[serde(rename = "shouldContinue", alias = "should_continue")]
    should_continue: Option<bool>,
}

/// Decode `{"content": ..., "shouldContinue": ...}`.
///
/// Markdown code fences around the object are tolerated. A missing
/// `shouldContinue` means continue; missing or blank `content` is malformed.
pub fn decode_reply_payload(text: &str) -> Result<ReplyPayload, LlmError> {
    let body = strip_code_fence(text);
    let raw: RawReply = serde_json::from_str(body)
        .map_err(|e| LlmError::malformed(format!("reply is not the expected JSON object: {e}")))?;

    let content = raw
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| LlmError::malformed("reply has no content"))?;

    Ok(ReplyPayload {
        content,
        should_continue: raw.should_continue.unwrap_or(true),
    })
}

/// Remove a surrounding ```` ``` ```` / ```` ```json ```` fence, if any
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // First line holds the optional language tag
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmErrorKind, LlmResponse, LlmService};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Provider stand-in returning canned text
    struct CannedLlm {
        id: &'static str,
        replies: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl CannedLlm {
        fn new(id: &'static str, replies: Vec<Result<LlmResponse, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                id,
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmService for CannedLlm {
        async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::network("nothing queued")))
        }

        fn model_id(&self) -> &str {
            self.id
        }
    }

    fn reply_request() -> ReplyRequest {
        ReplyRequest {
            character_name: "Socrates".to_string(),
            personality: "Answers questions with questions.".to_string(),
            transcript: "User: What is virtue?".to_string(),
            prompt: Some("What is virtue?".to_string()),
        }
    }

    #[test]
    fn test_decode_plain_json() {
        let payload =
            decode_reply_payload(r#"{"content": "Is it knowledge?", "shouldContinue": false}"#)
                .unwrap();
        assert_eq!(payload.content, "Is it knowledge?");
        assert!(!payload.should_continue);
    }

    #[test]
    fn test_decode_defaults_to_continue() {
        let payload = decode_reply_payload(r#"{"content": "Go on."}"#).unwrap();
        assert!(payload.should_continue);
    }

    #[test]
    fn test_decode_fenced_json() {
        let text = "```json\n{\"content\": \"Fenced\", \"should_continue\": true}\n```";
        assert_eq!(decode_reply_payload(text).unwrap().content, "Fenced");
    }

    #[test]
    fn test_decode_rejects_bad_payloads() {
        for text in [
            "Just prose, no JSON",
            r#"{"content": "   "}"#,
            r#"{"shouldContinue": true}"#,
            r#"{"content": "x", "shouldContinue": "maybe"}"#,
            "",
        ] {
            let err = decode_reply_payload(text).unwrap_err();
            assert_eq!(err.kind, LlmErrorKind::Malformed, "input: {text}");
        }
    }

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```{}```"), "{}");
    }

    #[tokio::test]
    async fn test_generate_reply_uses_default_model_in_json_mode() {
        let llm = CannedLlm::new(
            "claude-3.5-sonnet",
            vec![Ok(LlmResponse::from_text(
                r#"{"content": "Define virtue first.", "shouldContinue": true}"#,
            ))],
        );
        let registry = ModelRegistry::with_services(
            vec![llm.clone() as Arc<dyn LlmService>],
            "claude-3.5-sonnet",
        );
        let generator = LlmGenerator::new(Arc::new(registry));

        let payload = generator.generate_reply(&reply_request()).await.unwrap();

        assert_eq!(payload.content, "Define virtue first.");
        let requests = llm.requests.lock().unwrap();
        assert!(requests[0].json_output);
        assert!(requests[0]
            .system
            .as_deref()
            .unwrap()
            .starts_with("You are Socrates."));
        assert!(requests[0].messages[0].text.contains("User prompt: What is virtue?"));
    }

    #[tokio::test]
    async fn test_generate_reply_without_models() {
        let generator = LlmGenerator::new(Arc::new(ModelRegistry::with_services(vec![], "none")));
        let err = generator.generate_reply(&reply_request()).await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_provider_error_passes_through() {
        let llm = CannedLlm::new("gpt-4o", vec![Err(LlmError::rate_limit("slow down"))]);
        let registry = ModelRegistry::with_services(vec![llm as Arc<dyn LlmService>], "gpt-4o");
        let generator = LlmGenerator::new(Arc::new(registry));

        let err = generator.generate_reply(&reply_request()).await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::RateLimit);
    }

    #[tokio::test]
    async fn test_title_falls_back_without_models() {
        let generator = LlmGenerator::new(Arc::new(ModelRegistry::with_services(vec![], "none")));
        assert_eq!(generator.generate_title("User: hi").await, DEFAULT_TITLE);
    }
}
