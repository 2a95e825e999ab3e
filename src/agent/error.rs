use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent provider returned an error: {0}")]
    Provider(String),

    #[error("agent call timed out")]
    Timeout,

    #[error("agent session channel closed unexpectedly")]
    ChannelClosed,

    #[error("structured output did not satisfy the requested schema: {0}")]
    SchemaMismatch(String),
}

/// Provider error messages matching any of these substrings are retried;
/// everything else is surfaced immediately. Case-insensitive.
const RETRY_PATTERNS: &[&str] = &["rate limit", "overloaded", "timed out", "timeout", "connection reset", "temporarily unavailable"];

impl AgentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Timeout | AgentError::ChannelClosed => true,
            AgentError::Provider(message) => {
                let lower = message.to_lowercase();
                RETRY_PATTERNS.iter().any(|pattern| lower.contains(pattern))
            }
            AgentError::SchemaMismatch(_) => false,
        }
    }
}
