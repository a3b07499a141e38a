//! Binary frame handling: segmentation and utterance dispatch.

use tracing::{debug, info, warn};

use super::{
    error::WebSocketResult,
    lifecycle::{CloseReason, SessionLifecycle},
    pipeline::DialoguePipeline,
    state::ConnectionState,
};
use crate::core::stt::{RecognitionDispatcher, RecognitionError};
use crate::core::vad::{AudioSegmenter, SegmentOutcome};
use bytes::Bytes;

/// Feed one inbound audio frame through the segmenter and act on the result.
pub async fn handle_audio_message(
    data: Bytes,
    state: &mut ConnectionState,
    segmenter: &mut AudioSegmenter,
    dispatcher: &RecognitionDispatcher,
    pipeline: &DialoguePipeline,
    lifecycle: &SessionLifecycle,
) -> WebSocketResult<()> {
    match segmenter.ingest(&mut state.audio, data).await {
        SegmentOutcome::UtteranceComplete => {
            dispatch_utterance(state, dispatcher, pipeline, lifecycle).await
        }
        SegmentOutcome::IdleTimeout => {
            lifecycle.cancel(CloseReason::IdleTimeout);
            Ok(())
        }
        SegmentOutcome::Dropped | SegmentOutcome::Silence | SegmentOutcome::Buffered => Ok(()),
    }
}

/// Recognize the buffered utterance and hand the text to the pipeline.
///
/// Recognition failures are contained here; only a closed pipeline is
/// reported to the caller. Returns as soon as the session is cancelled.
pub async fn dispatch_utterance(
    state: &mut ConnectionState,
    dispatcher: &RecognitionDispatcher,
    pipeline: &DialoguePipeline,
    lifecycle: &SessionLifecycle,
) -> WebSocketResult<()> {
    state.reply.clear_abort();
    if state.reply.is_generating() {
        info!(session_id = %state.session_id, "New utterance while a reply is still generating");
    }

    let result = tokio::select! {
        biased;
        _ = lifecycle.cancelled() => {
            debug!(session_id = %state.session_id, "Session closing, recognition abandoned");
            return Ok(());
        }
        result = dispatcher.dispatch(&state.session_id, &mut state.audio) => result,
    };

    match result {
        Ok(text) if text.trim().is_empty() => {
            debug!(session_id = %state.session_id, "Empty transcript, nothing to answer");
        }
        Ok(text) => {
            info!(session_id = %state.session_id, "User said: {}", text);
            pipeline.submit(text).await?;
        }
        Err(e @ RecognitionError::TooShort { .. }) => {
            debug!(session_id = %state.session_id, "{}", e);
        }
        Err(e) => {
            warn!(session_id = %state.session_id, "Recognition failed: {}", e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::core::CoreState;
    use crate::core::llm::{
        DialogueGenerator, GenerationRequest, GenerationStream, LLMError,
    };
    use crate::core::stt::{RecognitionRequest, STTError, SpeechRecognizer};
    use crate::core::tts::{SpeechSynthesizer, SynthesizedSpeech, TTSError};
    use crate::core::vad::{VADError, VoiceActivityDetector};
    use crate::handlers::ws::writer::spawn_response_writer;
    use axum::extract::ws::Message;
    use futures::channel::mpsc as fmpsc;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Silent;

    #[async_trait::async_trait]
    impl VoiceActivityDetector for Silent {
        async fn is_voice(&self, _window: &[u8]) -> Result<bool, VADError> {
            Ok(false)
        }
    }

    #[async_trait::async_trait]
    impl SpeechSynthesizer for Silent {
        async fn synthesize(&self, _: &str, _: &str) -> Result<SynthesizedSpeech, TTSError> {
            Ok(SynthesizedSpeech::default())
        }
    }

    struct FixedRecognizer {
        reply: Result<String, STTError>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SpeechRecognizer for FixedRecognizer {
        async fn recognize(&self, _request: RecognitionRequest<'_>) -> Result<String, STTError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl DialogueGenerator for RecordingGenerator {
        async fn generate(
            &self,
            request: GenerationRequest<'_>,
        ) -> Result<GenerationStream, LLMError> {
            if let Some(turn) = request.history.last() {
                self.prompts.lock().push(turn.content.clone());
            }
            Ok(Box::pin(futures::stream::empty()))
        }
    }

    /// Never answers
    struct HangingRecognizer;

    #[async_trait::async_trait]
    impl SpeechRecognizer for HangingRecognizer {
        async fn recognize(&self, _request: RecognitionRequest<'_>) -> Result<String, STTError> {
            futures::future::pending().await
        }
    }

    struct Fixture<R = FixedRecognizer> {
        state: ConnectionState,
        dispatcher: RecognitionDispatcher,
        pipeline: DialoguePipeline,
        lifecycle: SessionLifecycle,
        recognizer: Arc<R>,
        generator: Arc<RecordingGenerator>,
        _written: fmpsc::UnboundedReceiver<Message>,
    }

    impl<R> Fixture<R> {
        async fn dispatch(&mut self) -> WebSocketResult<()> {
            dispatch_utterance(&mut self.state, &self.dispatcher, &self.pipeline, &self.lifecycle)
                .await
        }
    }

    fn fixture(reply: Result<String, STTError>, chunks: usize) -> Fixture {
        fixture_with(
            Arc::new(FixedRecognizer {
                reply,
                calls: AtomicUsize::new(0),
            }),
            chunks,
        )
    }

    fn fixture_with<R: SpeechRecognizer + 'static>(
        recognizer: Arc<R>,
        chunks: usize,
    ) -> Fixture<R> {
        let generator = Arc::new(RecordingGenerator::default());
        let core = CoreState::with_collaborators(
            Arc::new(Silent),
            recognizer.clone(),
            generator.clone(),
            Arc::new(Silent),
        );
        let lifecycle = SessionLifecycle::new();
        let (sink, written) = fmpsc::unbounded::<Message>();
        let (outbound, _writer) = spawn_response_writer(sink, 8, lifecycle.clone());

        let mut state = ConnectionState::new("s-1".to_string(), String::new(), None);
        state.audio.has_voice = true;
        state.audio.voice_stop = true;
        state.audio.utterance = (0..chunks).map(|_| Bytes::from_static(b"pcm")).collect();

        let pipeline = DialoguePipeline::spawn(
            "s-1",
            &core,
            &SessionConfig::default(),
            state.reply.clone(),
            outbound,
            lifecycle.clone(),
        );
        Fixture {
            state,
            dispatcher: core.dispatcher(&crate::config::ServerConfig::default()),
            pipeline,
            lifecycle,
            recognizer,
            generator,
            _written: written,
        }
    }

    #[tokio::test]
    async fn test_transcript_routed_to_pipeline() {
        let mut f = fixture(Ok("turn on the light".to_string()), 4);
        f.state.reply.abort();

        f.dispatch().await.unwrap();
        f.pipeline.shutdown(Duration::from_secs(1)).await;

        assert!(!f.state.reply.is_aborted());
        assert!(f.state.audio.accepting_audio);
        assert!(f.state.audio.utterance.is_empty());
        assert_eq!(*f.generator.prompts.lock(), vec!["turn on the light".to_string()]);
    }

    #[tokio::test]
    async fn test_recognition_failure_routes_nothing() {
        let mut f = fixture(Err(STTError::ProviderError("status fail".to_string())), 4);

        f.dispatch().await.unwrap();
        f.pipeline.shutdown(Duration::from_secs(1)).await;

        assert_eq!(f.recognizer.calls.load(Ordering::SeqCst), 1);
        assert!(f.state.audio.utterance.is_empty());
        assert!(!f.state.audio.voice_stop);
        assert!(f.state.audio.accepting_audio);
        assert!(f.generator.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_short_utterance_and_blank_transcript_not_routed() {
        let mut f = fixture(Ok("  ".to_string()), 2);
        f.dispatch().await.unwrap();
        assert_eq!(f.recognizer.calls.load(Ordering::SeqCst), 0);

        f.state.audio.utterance = (0..3).map(|_| Bytes::from_static(b"pcm")).collect();
        f.dispatch().await.unwrap();
        f.pipeline.shutdown(Duration::from_secs(1)).await;

        assert_eq!(f.recognizer.calls.load(Ordering::SeqCst), 1);
        assert!(f.generator.prompts.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_recognition() {
        let mut f = fixture_with(Arc::new(HangingRecognizer), 4);
        let lifecycle = f.lifecycle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            lifecycle.cancel(CloseReason::TransportError);
        });

        tokio::time::timeout(Duration::from_secs(1), f.dispatch())
            .await
            .expect("recognition kept the read loop blocked")
            .unwrap();
        assert_eq!(f.lifecycle.reason(), Some(CloseReason::TransportError));
        assert!(f.generator.prompts.lock().is_empty());
        f.pipeline.shutdown(Duration::from_secs(1)).await;
    }
}
