//! The response writer: the only task that writes to the socket.
//!
//! Every producer (read loop, generation stage, synthesis stage) enqueues
//! [`MessageRoute`]s through an [`OutboundSender`]; the writer drains the
//! bounded queue in order and performs one physical write per frame.

use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::error::TransportError;
use super::lifecycle::{CloseReason, SessionLifecycle};
use super::messages::{Command, MessageRoute, encode};
use bytes::Bytes;

/// Producer handle for the outbound queue
#[derive(Clone)]
pub struct OutboundSender {
    tx: mpsc::Sender<MessageRoute>,
    lifecycle: SessionLifecycle,
}

impl OutboundSender {
    /// Enqueue one frame, waiting for space if the queue is full.
    ///
    /// Gives up with [`TransportError::Closed`] once the session is cancelled.
    pub async fn send(&self, route: MessageRoute) -> Result<(), TransportError> {
        tokio::select! {
            biased;
            _ = self.lifecycle.cancelled() => Err(TransportError::Closed),
            sent = self.tx.send(route) => sent.map_err(|_| TransportError::Closed),
        }
    }

    pub async fn send_command(&self, command: Command) -> Result<(), TransportError> {
        self.send(MessageRoute::Outgoing(command)).await
    }

    pub async fn send_binary(&self, data: Bytes) -> Result<(), TransportError> {
        self.send(MessageRoute::Binary(data)).await
    }
}

/// Spawn the writer task over `sink`.
///
/// The task exits when the session is cancelled, when every sender is
/// dropped, or on the first write failure (which cancels the session). It
/// closes the sink on the way out.
pub fn spawn_response_writer<S>(
    sink: S,
    capacity: usize,
    lifecycle: SessionLifecycle,
) -> (OutboundSender, JoinHandle<()>)
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: std::fmt::Display,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sender = OutboundSender {
        tx,
        lifecycle: lifecycle.clone(),
    };
    let handle = tokio::spawn(run_writer(sink, rx, lifecycle));
    (sender, handle)
}

async fn run_writer<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<MessageRoute>,
    lifecycle: SessionLifecycle,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    loop {
        let route = tokio::select! {
            biased;
            _ = lifecycle.cancelled() => break,
            route = rx.recv() => match route {
                Some(route) => route,
                None => break,
            },
        };

        let message = match route {
            MessageRoute::Outgoing(command) => Message::Text(encode(&command).into()),
            MessageRoute::Binary(data) => Message::Binary(data),
        };

        if let Err(e) = sink.send(message).await {
            error!("{}", TransportError::Write(e.to_string()));
            lifecycle.cancel(CloseReason::TransportError);
            break;
        }
    }

    if let Err(e) = sink.close().await {
        debug!("Closing WebSocket sink failed: {}", e);
    }
    debug!("Response writer stopped");
}
