//! Hands completed utterances to the recognizer.

use std::sync::Arc;

use tracing::{debug, info};

use super::base::{RecognitionRequest, STTError, SpeechRecognizer};
use crate::core::vad::SegmentState;

#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("utterance too short: {chunks} chunks, need at least {min}")]
    TooShort { chunks: usize, min: usize },
    #[error("utterance too large: {size} bytes exceeds {max}")]
    TooLarge { size: usize, max: usize },
    #[error(transparent)]
    Upstream(#[from] STTError),
}

/// Validates a buffered utterance and sends it for recognition.
///
/// Audio intake is paused for the duration of a dispatch and the utterance
/// is cleared afterwards whatever the outcome.
pub struct RecognitionDispatcher {
    recognizer: Arc<dyn SpeechRecognizer>,
    max_audio_bytes: usize,
    min_chunks: usize,
}

impl RecognitionDispatcher {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        max_audio_bytes: usize,
        min_chunks: usize,
    ) -> Self {
        Self {
            recognizer,
            max_audio_bytes,
            min_chunks,
        }
    }

    pub async fn dispatch(
        &self,
        session_id: &str,
        state: &mut SegmentState,
    ) -> Result<String, RecognitionError> {
        state.accepting_audio = false;
        let result = self.recognize_buffered(session_id, state).await;
        state.reset_utterance();
        state.accepting_audio = true;
        result
    }

    async fn recognize_buffered(
        &self,
        session_id: &str,
        state: &SegmentState,
    ) -> Result<String, RecognitionError> {
        let chunks = state.utterance.len();
        if chunks < self.min_chunks {
            debug!("Discarding utterance with {} chunks", chunks);
            return Err(RecognitionError::TooShort {
                chunks,
                min: self.min_chunks,
            });
        }

        let size = state.utterance_bytes();
        if size > self.max_audio_bytes {
            return Err(RecognitionError::TooLarge {
                size,
                max: self.max_audio_bytes,
            });
        }

        let text = self
            .recognizer
            .recognize(RecognitionRequest {
                session_id,
                chunks: &state.utterance,
            })
            .await?;

        info!("Recognized {} chunks ({} bytes): {:?}", chunks, size, text);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingRecognizer {
        seen: Mutex<Vec<usize>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl SpeechRecognizer for RecordingRecognizer {
        async fn recognize(&self, request: RecognitionRequest<'_>) -> Result<String, STTError> {
            self.seen.lock().push(request.chunks.len());
            if self.fail {
                Err(STTError::NetworkError("connection refused".to_string()))
            } else {
                Ok(format!("{} chunks", request.chunks.len()))
            }
        }
    }

    fn state_with(chunks: usize, chunk_len: usize) -> SegmentState {
        let mut state = SegmentState::new();
        state.has_voice = true;
        state.voice_stop = true;
        state.utterance = (0..chunks).map(|_| Bytes::from(vec![0u8; chunk_len])).collect();
        state
    }

    #[tokio::test]
    async fn test_dispatch_returns_transcript_and_clears() {
        let recognizer = Arc::new(RecordingRecognizer::default());
        let dispatcher = RecognitionDispatcher::new(recognizer.clone(), 1024, 3);
        let mut state = state_with(4, 10);

        let text = dispatcher.dispatch("s-1", &mut state).await.unwrap();

        assert_eq!(text, "4 chunks");
        assert_eq!(*recognizer.seen.lock(), vec![4]);
        assert!(state.utterance.is_empty());
        assert!(!state.has_voice);
        assert!(!state.voice_stop);
        assert!(state.accepting_audio);
    }

    #[tokio::test]
    async fn test_short_utterance_never_reaches_recognizer() {
        let recognizer = Arc::new(RecordingRecognizer::default());
        let dispatcher = RecognitionDispatcher::new(recognizer.clone(), 1024, 3);
        let mut state = state_with(2, 10);

        let err = dispatcher.dispatch("s-1", &mut state).await.unwrap_err();

        assert!(matches!(err, RecognitionError::TooShort { chunks: 2, min: 3 }));
        assert!(recognizer.seen.lock().is_empty());
        assert!(state.utterance.is_empty());
        assert!(state.accepting_audio);
    }

    #[tokio::test]
    async fn test_oversized_utterance_rejected() {
        let recognizer = Arc::new(RecordingRecognizer::default());
        let dispatcher = RecognitionDispatcher::new(recognizer.clone(), 100, 3);
        let mut state = state_with(3, 50);

        let err = dispatcher.dispatch("s-1", &mut state).await.unwrap_err();

        assert!(matches!(err, RecognitionError::TooLarge { size: 150, max: 100 }));
        assert!(recognizer.seen.lock().is_empty());
        assert!(state.accepting_audio);
    }

    #[tokio::test]
    async fn test_upstream_failure_still_resets_state() {
        let recognizer = Arc::new(RecordingRecognizer {
            fail: true,
            ..Default::default()
        });
        let dispatcher = RecognitionDispatcher::new(recognizer, 1024, 3);
        let mut state = state_with(5, 10);

        let err = dispatcher.dispatch("s-1", &mut state).await.unwrap_err();

        assert!(matches!(err, RecognitionError::Upstream(STTError::NetworkError(_))));
        assert!(state.utterance.is_empty());
        assert!(!state.has_voice);
        assert!(state.accepting_audio);
    }
}
