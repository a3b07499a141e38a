//! WebSocket message types and routing
//!
//! Control frames in both directions are JSON objects tagged by `type`.
//! [`decode`] and [`encode`] are the only translation points between text
//! frames and [`Command`]s.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::DecodeError;
use crate::config::AudioConfig;
use crate::core::vad::ListenMode;

/// Audio parameters negotiated in `hello`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_duration: Option<u32>,
}

impl From<&AudioConfig> for AudioParams {
    fn from(audio: &AudioConfig) -> Self {
        Self {
            format: Some(audio.format.as_str().to_string()),
            sample_rate: Some(audio.sample_rate),
            channels: Some(audio.channels),
            frame_duration: Some(audio.frame_duration_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenState {
    Start,
    Stop,
    Detect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsState {
    Start,
    SentenceStart,
    Stop,
}

/// A control frame, inbound or outbound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Command {
    Hello {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transport: Option<String>,
        #[serde(default, alias = "session", skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio_params: Option<AudioParams>,
    },
    Listen {
        #[serde(default, alias = "session", skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<ListenMode>,
        state: ListenState,
        /// Wake word or other device-side text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Abort {
        #[serde(default, alias = "session", skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Opaque device payloads, stored and never interpreted
    Iot {
        #[serde(default, alias = "session", skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        states: Option<Value>,
    },
    Tts {
        #[serde(default, alias = "session", skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        state: TtsState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

const KNOWN_TYPES: [&str; 5] = ["hello", "listen", "abort", "iot", "tts"];

impl Command {
    pub fn hello_reply(session_id: &str, audio: &AudioConfig) -> Self {
        Command::Hello {
            version: None,
            transport: Some("websocket".to_string()),
            session_id: Some(session_id.to_string()),
            audio_params: Some(AudioParams::from(audio)),
        }
    }

    pub fn tts_start(session_id: &str) -> Self {
        Self::tts(session_id, TtsState::Start, None)
    }

    pub fn tts_sentence_start(session_id: &str, text: impl Into<String>) -> Self {
        Self::tts(session_id, TtsState::SentenceStart, Some(text.into()))
    }

    pub fn tts_stop(session_id: &str) -> Self {
        Self::tts(session_id, TtsState::Stop, None)
    }

    fn tts(session_id: &str, state: TtsState, text: Option<String>) -> Self {
        Command::Tts {
            session_id: Some(session_id.to_string()),
            state,
            text,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Command::Hello { .. } => "hello",
            Command::Listen { .. } => "listen",
            Command::Abort { .. } => "abort",
            Command::Iot { .. } => "iot",
            Command::Tts { .. } => "tts",
        }
    }
}

/// Parse one inbound text frame.
pub fn decode(frame: &str) -> Result<Command, DecodeError> {
    let value: Value =
        serde_json::from_str(frame).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let kind = match value.as_object().and_then(|obj| obj.get("type")) {
        Some(Value::String(kind)) => kind.clone(),
        Some(_) => return Err(DecodeError::Malformed("`type` is not a string".to_string())),
        None => return Err(DecodeError::Malformed("missing `type`".to_string())),
    };

    if !KNOWN_TYPES.contains(&kind.as_str()) {
        return Err(DecodeError::UnknownType(kind));
    }

    serde_json::from_value(value).map_err(|e| DecodeError::Malformed(format!("{kind}: {e}")))
}

/// Serialize one outbound control frame.
pub fn encode(command: &Command) -> String {
    // A Command holds only strings, numbers and JSON values, none of which fail to serialize.
    serde_json::to_string(command).unwrap_or_default()
}

/// Everything the response writer can put on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum MessageRoute {
    Outgoing(Command),
    Binary(Bytes),
}
