use super::ServerConfig;
use super::sections::{AudioConfig, AuthConfig, SessionConfig, VadConfig};

/// Run every validation against a fully merged configuration
pub fn validate_config(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_audio(&config.audio)?;
    validate_auth(&config.auth)?;
    validate_session(&config.session)?;
    validate_vad(&config.vad)?;
    validate_collaborator_url("vad.url", &config.vad.url)?;
    validate_collaborator_url("asr.url", &config.asr.url)?;
    validate_collaborator_url("llm.url", &config.llm.url)?;
    validate_collaborator_url("tts.url", &config.tts.url)?;
    if let Some(health_url) = &config.inference.health_url {
        validate_collaborator_url("inference.health_url", health_url)?;
    }
    Ok(())
}

/// Reject inbound formats this build cannot decode
pub fn validate_audio(audio: &AudioConfig) -> Result<(), Box<dyn std::error::Error>> {
    if !audio.format.is_supported() {
        return Err(format!(
            "audio.format '{}' requires building with the `opus` feature; use 'pcm16' instead",
            audio.format
        )
        .into());
    }
    if audio.sample_rate == 0 {
        return Err("audio.sample_rate must be greater than 0".into());
    }
    Ok(())
}

/// Validate that when auth is required, at least one usable token exists
pub fn validate_auth(auth: &AuthConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(entry) = auth.tokens.iter().find(|t| t.token.trim().is_empty()) {
        return Err(format!("Auth token '{}' is empty", entry.name).into());
    }

    if auth.required && auth.tokens.is_empty() {
        return Err(
            "When AUTH_REQUIRED=true, at least one token must be configured (auth.tokens or AUTH_TOKENS)"
                .into(),
        );
    }

    Ok(())
}

/// Validate queue capacities and utterance limits
pub fn validate_session(session: &SessionConfig) -> Result<(), Box<dyn std::error::Error>> {
    for (name, value) in [
        ("session.text_queue_capacity", session.text_queue_capacity),
        (
            "session.fragment_queue_capacity",
            session.fragment_queue_capacity,
        ),
        (
            "session.outbound_queue_capacity",
            session.outbound_queue_capacity,
        ),
        ("session.min_utterance_chunks", session.min_utterance_chunks),
    ] {
        if value == 0 {
            return Err(format!("{name} must be greater than 0").into());
        }
    }

    if session.close_connection_timeout_seconds == 0 {
        return Err("session.close_connection_timeout_seconds must be greater than 0".into());
    }

    Ok(())
}

pub fn validate_vad(vad: &VadConfig) -> Result<(), Box<dyn std::error::Error>> {
    if vad.frame_size == 0 {
        return Err("vad.frame_size must be greater than 0".into());
    }
    Ok(())
}

pub fn validate_collaborator_url(name: &str, url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(format!("{name} must be an http(s) URL, got '{url}'").into());
    }
    Ok(())
}
