//! HTTP client for the voice-activity collaborator.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::base::{VADError, VoiceActivityDetector};
use crate::config::VadConfig;

#[derive(Debug, Serialize)]
struct VadRequest {
    audio_data: String,
    config: VadRequestConfig,
}

#[derive(Debug, Serialize)]
struct VadRequestConfig {
    sample_rate: u32,
    frame_size: usize,
}

#[derive(Debug, Deserialize)]
struct VadResponse {
    #[serde(default)]
    status: Option<String>,
    result: VoiceFlag,
}

/// The inference service reports the flag either as a JSON boolean or as the
/// strings "true"/"false".
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VoiceFlag {
    Bool(bool),
    Text(String),
}

impl VoiceFlag {
    fn into_bool(self) -> Result<bool, VADError> {
        match self {
            VoiceFlag::Bool(value) => Ok(value),
            VoiceFlag::Text(text) => match text.trim().to_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                other => Err(VADError::InvalidResponse(format!(
                    "unexpected voice flag '{other}'"
                ))),
            },
        }
    }
}

/// Voice-activity detector backed by `POST {url}` on the inference service.
#[derive(Debug, Clone)]
pub struct HttpVoiceActivityDetector {
    client: reqwest::Client,
    url: String,
    sample_rate: u32,
    frame_size: usize,
}

impl HttpVoiceActivityDetector {
    pub fn new(
        url: impl Into<String>,
        sample_rate: u32,
        frame_size: usize,
        timeout: Duration,
    ) -> Result<Self, VADError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VADError::ConfigurationError(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            sample_rate,
            frame_size,
        })
    }

    pub fn from_config(config: &VadConfig, sample_rate: u32) -> Result<Self, VADError> {
        Self::new(
            config.url.clone(),
            sample_rate,
            config.frame_size,
            config.timeout(),
        )
    }
}

fn map_request_error(e: reqwest::Error) -> VADError {
    if e.is_timeout() {
        VADError::TimeoutError(e.to_string())
    } else {
        VADError::NetworkError(e.to_string())
    }
}

#[async_trait::async_trait]
impl VoiceActivityDetector for HttpVoiceActivityDetector {
    async fn is_voice(&self, window: &[u8]) -> Result<bool, VADError> {
        let body = VadRequest {
            audio_data: BASE64.encode(window),
            config: VadRequestConfig {
                sample_rate: self.sample_rate,
                frame_size: self.frame_size,
            },
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("VAD API error ({}): {}", status, error_body);
            return Err(VADError::ProviderError(format!(
                "API error ({status}): {error_body}"
            )));
        }

        let parsed: VadResponse = response
            .json()
            .await
            .map_err(|e| VADError::InvalidResponse(e.to_string()))?;

        if let Some(status) = parsed.status.as_deref()
            && status != "success"
        {
            return Err(VADError::ProviderError(format!(
                "VAD returned status '{status}'"
            )));
        }

        parsed.result.into_bool()
    }
}
