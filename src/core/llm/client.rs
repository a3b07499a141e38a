//! HTTP client for the dialogue-generation collaborator.
//!
//! The collaborator answers with newline-delimited JSON, one event per line:
//!
//! ```text
//! {"status":"streaming","chunk":"Hello"}
//! {"status":"streaming","chunk":" there."}
//! {"status":"complete","message":"Hello there."}
//! ```

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::base::{
    DialogueGenerator, DialogueTurn, GenerationEvent, GenerationRequest, GenerationStream,
    LLMError,
};
use crate::config::LlmConfig;

#[derive(Debug, Serialize)]
struct LlmRequest<'a> {
    dialogue: &'a [DialogueTurn],
    config: LlmRequestConfig<'a>,
}

#[derive(Debug, Serialize)]
struct LlmRequestConfig<'a> {
    #[serde(rename = "SessionId")]
    session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_prompt: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct LlmLine {
    status: String,
    #[serde(default)]
    chunk: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Dialogue generator backed by a streaming `POST {url}`.
#[derive(Debug, Clone)]
pub struct HttpDialogueGenerator {
    client: reqwest::Client,
    url: String,
    system_prompt: Option<String>,
}

impl HttpDialogueGenerator {
    pub fn new(
        url: impl Into<String>,
        system_prompt: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LLMError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LLMError::ConfigurationError(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            system_prompt,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LLMError> {
        Self::new(
            config.url.clone(),
            config.system_prompt.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }
}

fn map_request_error(e: reqwest::Error) -> LLMError {
    if e.is_timeout() {
        LLMError::TimeoutError(e.to_string())
    } else {
        LLMError::NetworkError(e.to_string())
    }
}

#[async_trait::async_trait]
impl DialogueGenerator for HttpDialogueGenerator {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<GenerationStream, LLMError> {
        let body = LlmRequest {
            dialogue: request.history,
            config: LlmRequestConfig {
                session_id: request.session_id,
                system_prompt: self.system_prompt.as_deref(),
            },
        };

        debug!(
            "Requesting reply for session {} with {} turns",
            request.session_id,
            request.history.len()
        );

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
            error!("LLM API error ({}): {}", status, error_body);
            return Err(LLMError::ProviderError(format!(
                "API error ({status}): {error_body}"
            )));
        }

        Ok(ndjson_events(response.bytes_stream()))
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

struct LineReader {
    bytes: ByteStream,
    buffer: Vec<u8>,
    finished: bool,
}

/// Split a byte stream into lines and decode each into a generation event.
///
/// The stream ends after a `complete` event, after a transport error, or at
/// end of input.
fn ndjson_events(
    bytes: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> GenerationStream {
    let reader = LineReader {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        finished: false,
    };

    Box::pin(futures::stream::unfold(reader, |mut reader| async move {
        loop {
            let line = if let Some(pos) = reader.buffer.iter().position(|b| *b == b'\n') {
                Some(reader.buffer.drain(..=pos).collect::<Vec<u8>>())
            } else if reader.finished {
                if reader.buffer.is_empty() {
                    return None;
                }
                Some(std::mem::take(&mut reader.buffer))
            } else {
                None
            };

            if let Some(line) = line {
                if let Some(item) = decode_line(&line) {
                    if matches!(item, Ok(GenerationEvent::Complete(_))) {
                        reader.finished = true;
                        reader.buffer.clear();
                    }
                    return Some((item, reader));
                }
                continue;
            }

            match reader.bytes.next().await {
                Some(Ok(chunk)) => reader.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    reader.finished = true;
                    reader.buffer.clear();
                    return Some((Err(map_request_error(e)), reader));
                }
                None => reader.finished = true,
            }
        }
    }))
}

/// Decode one NDJSON line. Blank lines and unknown statuses yield `None`.
fn decode_line(line: &[u8]) -> Option<Result<GenerationEvent, LLMError>> {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(e) => return Some(Err(LLMError::InvalidResponse(e.to_string()))),
    };
    if text.is_empty() {
        return None;
    }

    let parsed: LlmLine = match serde_json::from_str(text) {
        Ok(parsed) => parsed,
        Err(e) => {
            return Some(Err(LLMError::InvalidResponse(format!(
                "{e}: {text}"
            ))));
        }
    };

    match parsed.status.as_str() {
        "streaming" => match parsed.chunk {
            Some(chunk) if !chunk.is_empty() => Some(Ok(GenerationEvent::Fragment(chunk))),
            _ => None,
        },
        "warning" => Some(Ok(GenerationEvent::Warning(
            parsed.message.or(parsed.chunk).unwrap_or_default(),
        ))),
        "complete" => Some(Ok(GenerationEvent::Complete(
            parsed.message.unwrap_or_default(),
        ))),
        "error" => Some(Err(LLMError::ProviderError(
            parsed.message.unwrap_or_else(|| "generation failed".to_string()),
        ))),
        other => {
            debug!("Skipping LLM event with status '{}'", other);
            None
        }
    }
}
