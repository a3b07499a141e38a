//! Per-connection state owned by the session's read loop.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;

use super::pipeline::ReplyControl;
use crate::core::vad::SegmentState;

/// Everything one connection owns.
///
/// Only the read loop mutates this; the pipeline stages see the shared
/// [`ReplyControl`] flags and keep the dialogue history themselves.
pub struct ConnectionState {
    pub session_id: String,
    pub device_id: String,
    pub client_addr: Option<SocketAddr>,
    /// Voice timeline, audio accumulator and utterance queue
    pub audio: SegmentState,
    pub reply: Arc<ReplyControl>,
    pub iot_description: Option<Value>,
    pub iot_states: Option<Value>,
}

impl ConnectionState {
    pub fn new(session_id: String, device_id: String, client_addr: Option<SocketAddr>) -> Self {
        Self {
            session_id,
            device_id,
            client_addr,
            audio: SegmentState::new(),
            reply: Arc::new(ReplyControl::new()),
            iot_description: None,
            iot_states: None,
        }
    }
}
