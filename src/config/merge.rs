use std::env;

use super::ServerConfig;
use super::sections::{
    AsrConfig, AudioConfig, AuthConfig, AuthToken, InferenceConfig, LlmConfig, LogConfig,
    SessionConfig, TtsConfig, VadConfig,
};
use super::utils::{parse_auth_tokens, parse_bool, parse_list};
use super::yaml::YamlConfig;
use crate::core::audio::AudioFormat;

/// Merge YAML configuration with environment variables
///
/// Priority order (highest to lowest):
/// 1. Environment variables
/// 2. YAML configuration values
/// 3. Default values
///
/// # Arguments
/// * `yaml_config` - Optional YAML configuration providing base values
///
/// # Returns
/// * `Result<ServerConfig, Box<dyn std::error::Error>>` - The merged configuration or an error
pub fn merge_config(
    yaml_config: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml_config.unwrap_or_default();

    // Helper macro for string values: ENV > YAML > Default
    macro_rules! get_value {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            env::var($env_var)
                .ok()
                .or($yaml_value)
                .unwrap_or_else(|| $default.to_string())
        };
    }

    // Helper macro for optional values: ENV > YAML
    macro_rules! get_optional {
        ($env_var:expr, $yaml_value:expr) => {
            env::var($env_var).ok().or($yaml_value)
        };
    }

    // Helper macro for parsed values: ENV > YAML > Default, invalid ENV is an error
    macro_rules! get_parsed {
        ($env_var:expr, $ty:ty, $yaml_value:expr, $default:expr) => {
            match env::var($env_var) {
                Ok(raw) => raw
                    .trim()
                    .parse::<$ty>()
                    .map_err(|e| format!("Invalid {} environment variable: {e}", $env_var))?,
                Err(_) => $yaml_value.unwrap_or($default),
            }
        };
    }

    // Server
    let host = get_value!(
        "HOST",
        yaml.server.as_ref().and_then(|s| s.host.clone()),
        "0.0.0.0"
    );
    let port = get_parsed!(
        "PORT",
        u16,
        yaml.server.as_ref().and_then(|s| s.port),
        8000
    );

    // Audio
    let audio_defaults = AudioConfig::default();
    let format_raw = get_optional!(
        "AUDIO_FORMAT",
        yaml.audio.as_ref().and_then(|a| a.format.clone())
    );
    let format = match format_raw {
        Some(raw) => raw.parse::<AudioFormat>()?,
        None => audio_defaults.format,
    };
    let audio = AudioConfig {
        format,
        sample_rate: get_parsed!(
            "SAMPLE_RATE",
            u32,
            yaml.audio.as_ref().and_then(|a| a.sample_rate),
            audio_defaults.sample_rate
        ),
        channels: yaml
            .audio
            .as_ref()
            .and_then(|a| a.channels)
            .unwrap_or(audio_defaults.channels),
        frame_duration_ms: yaml
            .audio
            .as_ref()
            .and_then(|a| a.frame_duration_ms)
            .unwrap_or(audio_defaults.frame_duration_ms),
    };

    // Session
    let session_defaults = SessionConfig::default();
    let session_yaml = yaml.session.clone().unwrap_or_default();
    let session = SessionConfig {
        close_connection_timeout_seconds: get_parsed!(
            "CLOSE_CONNECTION_TIMEOUT_SECONDS",
            u64,
            session_yaml.close_connection_timeout_seconds,
            session_defaults.close_connection_timeout_seconds
        ),
        min_utterance_chunks: session_yaml
            .min_utterance_chunks
            .unwrap_or(session_defaults.min_utterance_chunks),
        text_queue_capacity: session_yaml
            .text_queue_capacity
            .unwrap_or(session_defaults.text_queue_capacity),
        fragment_queue_capacity: session_yaml
            .fragment_queue_capacity
            .unwrap_or(session_defaults.fragment_queue_capacity),
        outbound_queue_capacity: session_yaml
            .outbound_queue_capacity
            .unwrap_or(session_defaults.outbound_queue_capacity),
    };

    // Voice activity
    let vad_defaults = VadConfig::default();
    let vad_yaml = yaml.vad.clone().unwrap_or_default();
    let vad = VadConfig {
        url: get_value!("VAD_URL", vad_yaml.url, vad_defaults.url),
        frame_size: vad_yaml.frame_size.unwrap_or(vad_defaults.frame_size),
        silence_threshold_ms: get_parsed!(
            "VAD_SILENCE_THRESHOLD_MS",
            u64,
            vad_yaml.silence_threshold_ms,
            vad_defaults.silence_threshold_ms
        ),
        timeout_ms: vad_yaml.timeout_ms.unwrap_or(vad_defaults.timeout_ms),
    };

    // Recognition
    let asr_defaults = AsrConfig::default();
    let asr_yaml = yaml.asr.clone().unwrap_or_default();
    let asr = AsrConfig {
        url: get_value!("ASR_URL", asr_yaml.url, asr_defaults.url),
        language: get_value!("ASR_LANGUAGE", asr_yaml.language, asr_defaults.language),
        channel_count: asr_yaml.channel_count.unwrap_or(asr_defaults.channel_count),
        timeout_seconds: asr_yaml
            .timeout_seconds
            .unwrap_or(asr_defaults.timeout_seconds),
        max_audio_bytes: asr_yaml
            .max_audio_bytes
            .unwrap_or(asr_defaults.max_audio_bytes),
    };

    // Dialogue generation
    let llm_defaults = LlmConfig::default();
    let llm_yaml = yaml.llm.clone().unwrap_or_default();
    let llm = LlmConfig {
        url: get_value!("LLM_URL", llm_yaml.url, llm_defaults.url),
        timeout_seconds: llm_yaml
            .timeout_seconds
            .unwrap_or(llm_defaults.timeout_seconds),
        system_prompt: get_optional!("LLM_SYSTEM_PROMPT", llm_yaml.system_prompt)
            .filter(|prompt| !prompt.trim().is_empty()),
    };

    // Speech synthesis
    let tts_defaults = TtsConfig::default();
    let tts_yaml = yaml.tts.clone().unwrap_or_default();
    let tts = TtsConfig {
        url: get_value!("TTS_URL", tts_yaml.url, tts_defaults.url),
        timeout_seconds: tts_yaml
            .timeout_seconds
            .unwrap_or(tts_defaults.timeout_seconds),
    };

    let auth = merge_auth_config(&yaml)?;

    // Inference readiness
    let inference_yaml = yaml.inference.clone().unwrap_or_default();
    let inference = InferenceConfig {
        health_url: get_optional!("INFERENCE_HEALTH_URL", inference_yaml.health_url),
        ready_timeout_seconds: inference_yaml
            .ready_timeout_seconds
            .unwrap_or(InferenceConfig::default().ready_timeout_seconds),
    };

    // Logging
    let log_yaml = yaml.log.clone().unwrap_or_default();
    let log = LogConfig {
        level: get_value!("LOG_LEVEL", log_yaml.level, LogConfig::default().level),
        json: env::var("LOG_JSON")
            .ok()
            .and_then(|s| parse_bool(&s))
            .or(log_yaml.json)
            .unwrap_or(false),
    };

    Ok(ServerConfig {
        host,
        port,
        audio,
        session,
        vad,
        asr,
        llm,
        tts,
        auth,
        inference,
        log,
    })
}

/// Merge authentication settings
///
/// Token and device lists are taken whole from one source: a non-empty
/// environment list replaces the YAML list instead of extending it.
fn merge_auth_config(yaml: &YamlConfig) -> Result<AuthConfig, Box<dyn std::error::Error>> {
    let defaults = AuthConfig::default();
    let auth_yaml = yaml.auth.clone().unwrap_or_default();

    let required = match env::var("AUTH_REQUIRED") {
        Ok(raw) => parse_bool(&raw)
            .ok_or_else(|| format!("Invalid AUTH_REQUIRED environment variable: {raw}"))?,
        Err(_) => auth_yaml.required.unwrap_or(defaults.required),
    };

    let env_tokens = env::var("AUTH_TOKENS")
        .ok()
        .map(|raw| parse_auth_tokens(&raw))
        .filter(|tokens| !tokens.is_empty());
    let tokens = match env_tokens {
        Some(tokens) => tokens,
        None => auth_yaml
            .tokens
            .iter()
            .enumerate()
            .map(|(idx, entry)| AuthToken {
                token: entry.token.clone(),
                name: entry.name.clone().unwrap_or_else(|| format!("token-{idx}")),
            })
            .collect(),
    };

    let allowed_devices = env::var("AUTH_ALLOWED_DEVICES")
        .ok()
        .map(|raw| parse_list(&raw))
        .filter(|devices| !devices.is_empty())
        .unwrap_or(auth_yaml.allowed_devices);

    Ok(AuthConfig {
        required,
        timeout_seconds: auth_yaml.timeout_seconds.unwrap_or(defaults.timeout_seconds),
        tokens,
        allowed_devices,
    })
}
