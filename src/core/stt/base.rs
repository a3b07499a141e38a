use bytes::Bytes;

/// Errors reported by a speech-recognition collaborator
#[derive(Debug, Clone, thiserror::Error)]
pub enum STTError {
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

/// One utterance handed to the recognizer
#[derive(Debug, Clone, Copy)]
pub struct RecognitionRequest<'a> {
    pub session_id: &'a str,
    /// Raw audio chunks in arrival order
    pub chunks: &'a [Bytes],
}

/// Base trait for speech recognizers
#[async_trait::async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe one complete utterance
    ///
    /// # Arguments
    /// * `request` - Session metadata and the utterance audio
    ///
    /// # Returns
    /// * `Result<String, STTError>` - The transcript or an error
    async fn recognize(&self, request: RecognitionRequest<'_>) -> Result<String, STTError>;
}
