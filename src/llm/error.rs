//! Provider call failures

use thiserror::Error;

/// Failed completion: what went wrong, in the provider's words
#[derive(Debug, Error)]
#[error("{message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

/// Where a completion failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Connect failure or HTTP timeout
    Network,
    /// HTTP 429
    RateLimit,
    /// HTTP 5xx
    ServerError,
    /// HTTP 401/403; the configured key is wrong
    Auth,
    /// HTTP 400
    InvalidRequest,
    /// Reply arrived but is not the `{content, shouldContinue}` object
    Malformed,
    /// No model configured
    Unavailable,
    Unknown,
}

impl LlmErrorKind {
    /// Whether asking again for the next turn may succeed. Logged with every
    /// failed call; the engine itself never retries.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::RateLimit | Self::ServerError)
    }
}

macro_rules! constructors {
    ($($name:ident => $kind:ident),* $(,)?) => {
        impl LlmError {
            $(
                pub fn $name(message: impl Into<String>) -> Self {
                    Self {
                        kind: LlmErrorKind::$kind,
                        message: message.into(),
                    }
                }
            )*
        }
    };
}

constructors! {
    network => Network,
    rate_limit => RateLimit,
    server_error => ServerError,
    auth => Auth,
    invalid_request => InvalidRequest,
    malformed => Malformed,
    unavailable => Unavailable,
    unknown => Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_the_message() {
        let err = LlmError::malformed("reply has no content");
        assert_eq!(err.kind, LlmErrorKind::Malformed);
        assert_eq!(err.to_string(), "reply has no content");
    }

    #[test]
    fn test_transient_kinds() {
        assert!(LlmError::network("reset").kind.is_transient());
        assert!(LlmError::rate_limit("slow down").kind.is_transient());
        assert!(LlmError::server_error("502").kind.is_transient());
        assert!(!LlmError::auth("bad key").kind.is_transient());
        assert!(!LlmError::malformed("prose").kind.is_transient());
        assert!(!LlmError::unavailable("no models").kind.is_transient());
    }
}
