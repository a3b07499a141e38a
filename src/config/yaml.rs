use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// This structure represents the full configuration that can be loaded from a YAML file.
/// All fields are optional to allow partial configuration. Environment variables can
/// override any values specified here.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8000
///
/// audio:
///   format: "opus"             # needs the `opus` feature, otherwise "pcm16"
///   sample_rate: 16000
///   channels: 1
///   frame_duration_ms: 60
///
/// session:
///   close_connection_timeout_seconds: 120
///   min_utterance_chunks: 3
///   text_queue_capacity: 10
///   fragment_queue_capacity: 10
///   outbound_queue_capacity: 10
///
/// vad:
///   url: "http://127.0.0.1:8001/vad"
///   frame_size: 512
///   silence_threshold_ms: 500
///   timeout_ms: 5000
///
/// asr:
///   url: "http://127.0.0.1:8001/asr"
///   language: "zh-CN"
///   channel_count: 1
///   timeout_seconds: 10
///   max_audio_bytes: 2097152
///
/// llm:
///   url: "http://127.0.0.1:8001/llm"
///   timeout_seconds: 60
///   system_prompt: "You are a helpful voice assistant."
///
/// tts:
///   url: "http://127.0.0.1:8001/tts"
///   timeout_seconds: 30
///
/// auth:
///   required: true
///   timeout_seconds: 10
///   tokens:
///     - token: "device-secret"
///       name: "living-room"
///   allowed_devices:
///     - "aa:bb:cc:dd:ee:ff"
///
/// inference:
///   health_url: "http://127.0.0.1:8001/health"
///   ready_timeout_seconds: 30
///
/// log:
///   level: "info"
///   json: false
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub audio: Option<AudioYaml>,
    pub session: Option<SessionYaml>,
    pub vad: Option<VadYaml>,
    pub asr: Option<AsrYaml>,
    pub llm: Option<LlmYaml>,
    pub tts: Option<TtsYaml>,
    pub auth: Option<AuthYaml>,
    pub inference: Option<InferenceYaml>,
    pub log: Option<LogYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioYaml {
    pub format: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub frame_duration_ms: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub close_connection_timeout_seconds: Option<u64>,
    pub min_utterance_chunks: Option<usize>,
    pub text_queue_capacity: Option<usize>,
    pub fragment_queue_capacity: Option<usize>,
    pub outbound_queue_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VadYaml {
    pub url: Option<String>,
    pub frame_size: Option<usize>,
    pub silence_threshold_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AsrYaml {
    pub url: Option<String>,
    pub language: Option<String>,
    pub channel_count: Option<u16>,
    pub timeout_seconds: Option<u64>,
    pub max_audio_bytes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LlmYaml {
    pub url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TtsYaml {
    pub url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Authentication configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthYaml {
    pub required: Option<bool>,
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub tokens: Vec<AuthTokenYaml>,
    #[serde(default)]
    pub allowed_devices: Vec<String>,
}

/// Device token entry from YAML
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTokenYaml {
    pub token: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InferenceYaml {
    pub health_url: Option<String>,
    pub ready_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LogYaml {
    pub level: Option<String>,
    pub json: Option<bool>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
