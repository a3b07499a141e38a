//! HTTP client for the speech-synthesis collaborator.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::base::{SpeechSynthesizer, SynthesizedSpeech, TTSError};
use crate::config::TtsConfig;

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    config: TtsRequestConfig<'a>,
}

#[derive(Debug, Serialize)]
struct TtsRequestConfig<'a> {
    #[serde(rename = "SessionId")]
    session_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct TtsResponse {
    status: String,
    #[serde(default)]
    audio_data: Vec<String>,
    /// Seconds
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    format: Option<String>,
}

/// Synthesizer backed by `POST {url}` on the inference service.
#[derive(Debug, Clone)]
pub struct HttpSpeechSynthesizer {
    client: reqwest::Client,
    url: String,
}

impl HttpSpeechSynthesizer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TTSError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TTSError::InvalidConfiguration(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &TtsConfig) -> Result<Self, TTSError> {
        Self::new(config.url.clone(), Duration::from_secs(config.timeout_seconds))
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, session_id: &str, text: &str) -> Result<SynthesizedSpeech, TTSError> {
        let body = TtsRequest {
            text,
            config: TtsRequestConfig { session_id },
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TTSError::TimeoutError(e.to_string())
                } else {
                    TTSError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("TTS API error ({}): {}", status, error_body);
            return Err(TTSError::ProviderError(format!(
                "API error ({status}): {error_body}"
            )));
        }

        let parsed: TtsResponse = response
            .json()
            .await
            .map_err(|e| TTSError::AudioGenerationFailed(format!("invalid response: {e}")))?;

        if parsed.status != "success" {
            return Err(TTSError::ProviderError(format!(
                "TTS returned status '{}'",
                parsed.status
            )));
        }

        let frames = parsed
            .audio_data
            .iter()
            .map(|packet| BASE64.decode(packet).map(Bytes::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TTSError::AudioGenerationFailed(format!("invalid audio packet: {e}")))?;

        let duration = if parsed.duration.is_finite() && parsed.duration > 0.0 {
            Duration::from_secs_f64(parsed.duration)
        } else {
            Duration::ZERO
        };

        debug!(
            "Synthesized {} frames ({:?}, format {:?}) for {:?}",
            frames.len(),
            duration,
            parsed.format,
            text
        );

        Ok(SynthesizedSpeech { frames, duration })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn synthesizer_for(server: &MockServer) -> HttpSpeechSynthesizer {
        HttpSpeechSynthesizer::new(format!("{}/tts", server.uri()), Duration::from_millis(500))
            .unwrap()
    }

    #[tokio::test]
    async fn test_synthesize_decodes_frames_and_duration() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tts"))
            .and(body_json(json!({"text": "Hello.", "config": {"SessionId": "s-1"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "audio_data": [BASE64.encode(b"frame-1"), BASE64.encode(b"frame-2")],
                "duration": 1.5,
                "format": "opus",
                "frame_duration": 60
            })))
            .expect(1)
            .mount(&server)
            .await;

        let speech = synthesizer_for(&server)
            .synthesize("s-1", "Hello.")
            .await
            .unwrap();

        assert_eq!(
            speech.frames,
            vec![Bytes::from_static(b"frame-1"), Bytes::from_static(b"frame-2")]
        );
        assert_eq!(speech.duration, Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_synthesize_rejects_bad_base64() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "audio_data": ["***"],
                "duration": 0.2
            })))
            .mount(&server)
            .await;

        let err = synthesizer_for(&server)
            .synthesize("s-1", "Hi")
            .await
            .unwrap_err();
        assert!(matches!(err, TTSError::AudioGenerationFailed(_)));
    }

    #[tokio::test]
    async fn test_synthesize_failure_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "error"})))
            .mount(&server)
            .await;

        let err = synthesizer_for(&server)
            .synthesize("s-1", "Hi")
            .await
            .unwrap_err();
        assert!(matches!(err, TTSError::ProviderError(_)));
    }

    #[tokio::test]
    async fn test_synthesize_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "success", "audio_data": [], "duration": 0}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = synthesizer_for(&server)
            .synthesize("s-1", "Hi")
            .await
            .unwrap_err();
        assert!(matches!(err, TTSError::TimeoutError(_)));
    }
}
