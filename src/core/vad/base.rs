/// Errors reported by a voice-activity collaborator
#[derive(Debug, Clone, thiserror::Error)]
pub enum VADError {
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

/// Classifies fixed-size windows of linear audio as voiced or unvoiced.
///
/// Implementations must be safe to call concurrently from many sessions.
#[async_trait::async_trait]
pub trait VoiceActivityDetector: Send + Sync {
    /// Classify one analysis window of 16-bit little-endian PCM
    ///
    /// # Returns
    /// * `Ok(true)` when the window contains speech
    async fn is_voice(&self, window: &[u8]) -> Result<bool, VADError>;
}
