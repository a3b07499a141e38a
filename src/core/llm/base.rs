use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

/// Errors reported by a dialogue-generation collaborator
#[derive(Debug, Clone, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Timeout error: {0}")]
    TimeoutError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One immutable entry of the dialogue history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub role: Role,
    pub content: String,
}

impl DialogueTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One streamed event of a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// A text fragment to be spoken
    Fragment(String),
    Warning(String),
    /// Terminal event carrying the final assistant message, which may be empty
    Complete(String),
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub session_id: &'a str,
    pub history: &'a [DialogueTurn],
}

pub type GenerationStream = Pin<Box<dyn Stream<Item = Result<GenerationEvent, LLMError>> + Send>>;

/// Base trait for dialogue generators
#[async_trait::async_trait]
pub trait DialogueGenerator: Send + Sync {
    /// Open a streaming reply for the given dialogue history.
    ///
    /// The history is copied into the request; the returned stream does not
    /// borrow from it.
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<GenerationStream, LLMError>;
}
