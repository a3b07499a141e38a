use std::sync::Arc;

use tracing::info;

use crate::config::ServerConfig;
use crate::core::audio::create_frame_decoder;
use crate::core::llm::{DialogueGenerator, HttpDialogueGenerator};
use crate::core::stt::{HttpSpeechRecognizer, RecognitionDispatcher, SpeechRecognizer};
use crate::core::tts::{HttpSpeechSynthesizer, SpeechSynthesizer};
use crate::core::vad::{
    AudioSegmenter, HttpVoiceActivityDetector, SegmenterConfig, VoiceActivityDetector,
};

/// Core-specific shared state for the application.
///
/// Holds the inference collaborators shared by every session. Each session
/// builds its own segmenter and dispatcher on top of these.
#[derive(Clone)]
pub struct CoreState {
    pub detector: Arc<dyn VoiceActivityDetector>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub generator: Arc<dyn DialogueGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl CoreState {
    /// Build HTTP clients for every collaborator from configuration.
    pub fn new(config: &ServerConfig) -> anyhow::Result<Arc<Self>> {
        let detector = HttpVoiceActivityDetector::from_config(&config.vad, config.audio.sample_rate)?;
        let recognizer = HttpSpeechRecognizer::from_config(&config.asr)?;
        let generator = HttpDialogueGenerator::from_config(&config.llm)?;
        let synthesizer = HttpSpeechSynthesizer::from_config(&config.tts)?;

        info!(
            "Inference collaborators: vad={} asr={} llm={} tts={}",
            config.vad.url, config.asr.url, config.llm.url, config.tts.url
        );

        Ok(Self::with_collaborators(
            Arc::new(detector),
            Arc::new(recognizer),
            Arc::new(generator),
            Arc::new(synthesizer),
        ))
    }

    /// Assemble core state from already constructed collaborators.
    pub fn with_collaborators(
        detector: Arc<dyn VoiceActivityDetector>,
        recognizer: Arc<dyn SpeechRecognizer>,
        generator: Arc<dyn DialogueGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            detector,
            recognizer,
            generator,
            synthesizer,
        })
    }

    /// A fresh segmenter for one connection, with its own frame decoder.
    pub fn segmenter(&self, config: &ServerConfig) -> AudioSegmenter {
        AudioSegmenter::new(
            self.detector.clone(),
            create_frame_decoder(config.audio.format, config.audio.sample_rate),
            SegmenterConfig {
                window_bytes: config.vad.window_bytes(),
                silence_threshold: config.vad.silence_threshold(),
                idle_close: config.session.close_connection_timeout(),
            },
        )
    }

    pub fn dispatcher(&self, config: &ServerConfig) -> RecognitionDispatcher {
        RecognitionDispatcher::new(
            self.recognizer.clone(),
            config.asr.max_audio_bytes,
            config.session.min_utterance_chunks,
        )
    }
}
