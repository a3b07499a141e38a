//! Session-wide cancellation.
//!
//! One [`SessionLifecycle`] is shared by the read loop, both pipeline stages
//! and the response writer. Any of them may end the session; the first
//! reason wins and later calls are no-ops.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientClosed,
    TransportError,
    IdleTimeout,
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CloseReason::ClientClosed => "client closed",
            CloseReason::TransportError => "transport error",
            CloseReason::IdleTimeout => "idle timeout",
            CloseReason::Shutdown => "shutdown",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionLifecycle {
    token: CancellationToken,
    reason: Arc<OnceLock<CloseReason>>,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the session.
    ///
    /// Returns true only for the call that actually cancelled.
    pub fn cancel(&self, reason: CloseReason) -> bool {
        if self.reason.set(reason).is_err() {
            return false;
        }
        info!("Session closing: {}", reason);
        self.token.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn reason(&self) -> Option<CloseReason> {
        self.reason.get().copied()
    }
}
