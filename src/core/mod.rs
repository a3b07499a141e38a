pub mod audio;
pub mod llm;
pub mod state;
pub mod stt;
pub mod tts;
pub mod vad;

pub use audio::{AudioFormat, FrameDecoder, create_frame_decoder};
pub use llm::{DialogueGenerator, DialogueTurn, GenerationEvent, LLMError, Role};
pub use stt::{RecognitionDispatcher, RecognitionError, STTError, SpeechRecognizer};
pub use tts::{SpeechSynthesizer, SynthesizedSpeech, TTSError};
pub use vad::{AudioSegmenter, ListenMode, SegmentOutcome, SegmentState, VADError, VoiceActivityDetector};

// Re-export CoreState for external use
pub use state::CoreState;
