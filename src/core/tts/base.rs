use std::time::Duration;

use bytes::Bytes;

/// Errors reported by a speech-synthesis collaborator
#[derive(Debug, Clone, thiserror::Error)]
pub enum TTSError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Audio generation failed: {0}")]
    AudioGenerationFailed(String),
    #[error("Timeout error: {0}")]
    TimeoutError(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Audio for one synthesized fragment
#[derive(Debug, Clone, Default)]
pub struct SynthesizedSpeech {
    /// Encoded audio packets in playback order
    pub frames: Vec<Bytes>,
    /// Total playback duration of `frames`
    pub duration: Duration,
}

/// Base trait for speech synthesizers
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize one text fragment.
    ///
    /// # Arguments
    /// * `session_id` - Session the fragment belongs to
    /// * `text` - The fragment to speak
    async fn synthesize(&self, session_id: &str, text: &str) -> Result<SynthesizedSpeech, TTSError>;
}
