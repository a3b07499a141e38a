//! HTTP client for the speech-recognition collaborator.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::base::{RecognitionRequest, STTError, SpeechRecognizer};
use crate::config::AsrConfig;

#[derive(Debug, Serialize)]
struct AsrRequest<'a> {
    audio_data: Vec<String>,
    config: AsrRequestConfig<'a>,
}

#[derive(Debug, Serialize)]
struct AsrRequestConfig<'a> {
    #[serde(rename = "SessionId")]
    session_id: &'a str,
    channel_count: u16,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct AsrResponse {
    status: String,
    #[serde(default, alias = "result")]
    text: String,
}

/// Recognizer backed by `POST {url}` on the inference service.
#[derive(Debug, Clone)]
pub struct HttpSpeechRecognizer {
    client: reqwest::Client,
    url: String,
    language: String,
    channel_count: u16,
}

impl HttpSpeechRecognizer {
    pub fn new(
        url: impl Into<String>,
        language: impl Into<String>,
        channel_count: u16,
        timeout: Duration,
    ) -> Result<Self, STTError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| STTError::ConfigurationError(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            language: language.into(),
            channel_count,
        })
    }

    pub fn from_config(config: &AsrConfig) -> Result<Self, STTError> {
        Self::new(
            config.url.clone(),
            config.language.clone(),
            config.channel_count,
            Duration::from_secs(config.timeout_seconds),
        )
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for HttpSpeechRecognizer {
    async fn recognize(&self, request: RecognitionRequest<'_>) -> Result<String, STTError> {
        let body = AsrRequest {
            audio_data: request.chunks.iter().map(|c| BASE64.encode(c)).collect(),
            config: AsrRequestConfig {
                session_id: request.session_id,
                channel_count: self.channel_count,
                language: &self.language,
            },
        };

        debug!(
            "Sending {} audio chunks to recognizer for session {}",
            request.chunks.len(),
            request.session_id
        );

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    STTError::TimeoutError(e.to_string())
                } else {
                    STTError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("ASR API error ({}): {}", status, error_body);
            return Err(STTError::ProviderError(format!(
                "API error ({status}): {error_body}"
            )));
        }

        let parsed: AsrResponse = response
            .json()
            .await
            .map_err(|e| STTError::InvalidResponse(e.to_string()))?;

        if parsed.status != "success" {
            return Err(STTError::ProviderError(format!(
                "ASR returned status '{}'",
                parsed.status
            )));
        }

        Ok(parsed.text)
    }
}
