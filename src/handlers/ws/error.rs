//! WebSocket error types and handling
//!
//! Recognition, generation and synthesis failures are contained where they
//! happen and never reach the read loop; only transport failures end it.

use thiserror::Error;

/// Control frame that could not be turned into a command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown message type '{0}'")]
    UnknownType(String),
    #[error("malformed message: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The outbound queue is closed because the session is shutting down
    #[error("outbound queue closed")]
    Closed,
    #[error("read failed: {0}")]
    Read(String),
    #[error("write failed: {0}")]
    Write(String),
}

/// WebSocket handler error types
#[derive(Debug, Error)]
pub enum WebSocketError {
    #[error("Invalid message: {0}")]
    Decode(#[from] DecodeError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl WebSocketError {
    /// Whether the error ends the session
    pub fn is_fatal(&self) -> bool {
        matches!(self, WebSocketError::Transport(_))
    }
}

/// Result type for WebSocket operations
pub type WebSocketResult<T> = Result<T, WebSocketError>;
