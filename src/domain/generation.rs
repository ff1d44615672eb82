use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("language model did not answer within {0:?}")]
    Timeout(Duration),

    #[error("language model is unreachable: {0}")]
    Unreachable(String),

    #[error("language model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed language model response: {0}")]
    MalformedResponse(String),
}

impl GenerationError {
    /// Whether a later attempt may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Timeout(_) | GenerationError::Unreachable(_) => true,
            GenerationError::Status { status, .. } => *status >= 500,
            GenerationError::MalformedResponse(_) => false,
        }
    }
}

/// A language model that completes an assembled prompt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
