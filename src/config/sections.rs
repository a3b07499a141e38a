//! Typed configuration sections.
//!
//! Each section groups the settings for one concern of the gateway. All
//! sections implement [`Default`] with the values used when neither YAML nor
//! the environment provides one.

use std::time::Duration;

use crate::core::audio::AudioFormat;

pub const DEFAULT_VAD_URL: &str = "http://127.0.0.1:8001/vad";
pub const DEFAULT_ASR_URL: &str = "http://127.0.0.1:8001/asr";
pub const DEFAULT_LLM_URL: &str = "http://127.0.0.1:8001/llm";
pub const DEFAULT_TTS_URL: &str = "http://127.0.0.1:8001/tts";

/// Audio parameters negotiated with devices.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioConfig {
    /// Encoding of inbound binary frames
    pub format: AudioFormat,
    pub sample_rate: u32,
    pub channels: u16,
    /// Duration of one outbound audio packet, advertised in the hello reply
    pub frame_duration_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            sample_rate: 16000,
            channels: 1,
            frame_duration_ms: 60,
        }
    }
}

/// Per-connection session limits.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Idle time (no voice, no inbound frames) after which a session is closed
    pub close_connection_timeout_seconds: u64,
    /// Utterances with fewer chunks are discarded without recognition
    pub min_utterance_chunks: usize,
    pub text_queue_capacity: usize,
    pub fragment_queue_capacity: usize,
    pub outbound_queue_capacity: usize,
}

impl SessionConfig {
    pub fn close_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.close_connection_timeout_seconds)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            close_connection_timeout_seconds: 120,
            min_utterance_chunks: 3,
            text_queue_capacity: 10,
            fragment_queue_capacity: 10,
            outbound_queue_capacity: 10,
        }
    }
}

/// Voice-activity collaborator settings.
#[derive(Debug, Clone, PartialEq)]
pub struct VadConfig {
    pub url: String,
    /// Samples per analysis window
    pub frame_size: usize,
    pub silence_threshold_ms: u64,
    pub timeout_ms: u64,
}

impl VadConfig {
    /// Size in bytes of one analysis window of 16-bit samples.
    pub fn window_bytes(&self) -> usize {
        self.frame_size * 2
    }

    pub fn silence_threshold(&self) -> Duration {
        Duration::from_millis(self.silence_threshold_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_VAD_URL.to_string(),
            frame_size: 512,
            silence_threshold_ms: 500,
            timeout_ms: 5000,
        }
    }
}

/// Speech-recognition collaborator settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AsrConfig {
    pub url: String,
    pub language: String,
    pub channel_count: u16,
    pub timeout_seconds: u64,
    /// Upper bound on the buffered audio of one utterance
    pub max_audio_bytes: usize,
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ASR_URL.to_string(),
            language: "zh-CN".to_string(),
            channel_count: 1,
            timeout_seconds: 10,
            max_audio_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Dialogue-generation collaborator settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub url: String,
    pub timeout_seconds: u64,
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_LLM_URL.to_string(),
            timeout_seconds: 60,
            system_prompt: None,
        }
    }
}

/// Speech-synthesis collaborator settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TtsConfig {
    pub url: String,
    pub timeout_seconds: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_TTS_URL.to_string(),
            timeout_seconds: 30,
        }
    }
}

/// A device token accepted during the connection handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub token: String,
    /// Human readable owner of the token, used in logs only
    pub name: String,
}

/// Device authentication settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthConfig {
    pub required: bool,
    /// How long to wait for the token frame
    pub timeout_seconds: u64,
    pub tokens: Vec<AuthToken>,
    /// When non-empty, only these device ids may connect
    pub allowed_devices: Vec<String>,
}

impl AuthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn is_device_allowed(&self, device_id: &str) -> bool {
        self.allowed_devices.is_empty() || self.allowed_devices.iter().any(|d| d == device_id)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            required: false,
            timeout_seconds: 10,
            tokens: Vec::new(),
            allowed_devices: Vec::new(),
        }
    }
}

/// Readiness probe for the inference service.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    pub health_url: Option<String>,
    pub ready_timeout_seconds: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            health_url: None,
            ready_timeout_seconds: 30,
        }
    }
}

/// Logging output settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
