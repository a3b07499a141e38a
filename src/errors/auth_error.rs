/// Handshake authentication failures.
///
/// Every variant is fatal: the connection is closed before the session's read
/// loop starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The device closed the connection before sending a token
    #[error("Connection closed before authentication")]
    ConnectionClosed,

    /// The first frame was not a text token
    #[error("Expected an authentication token, got {0}")]
    InvalidFrame(String),

    /// The token matched none of the configured tokens
    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("No authentication token within {0} seconds")]
    Timeout(u64),
}

impl AuthError {
    /// Short reason carried in the close frame
    pub fn close_reason(&self) -> &'static str {
        match self {
            AuthError::ConnectionClosed => "closed",
            AuthError::InvalidFrame(_) => "invalid auth frame",
            AuthError::InvalidToken => "unauthorized",
            AuthError::Timeout(_) => "auth timeout",
        }
    }

    /// Log the error at the appropriate level
    pub fn log(&self) {
        match self {
            AuthError::ConnectionClosed => tracing::debug!("{}", self),
            AuthError::InvalidFrame(_) | AuthError::Timeout(_) => tracing::info!("{}", self),
            AuthError::InvalidToken => tracing::warn!("{}", self),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
