//! Axum WebSocket handler
//!
//! This module contains the upgrade handler and the per-connection session:
//! handshake authentication, the inbound read loop and teardown.

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ConnectInfo, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocketUpgrade, close_code},
    },
    http::{Extensions, HeaderMap},
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{bearer_token, device_id, match_device_token};
use crate::config::AuthConfig;
use crate::errors::app_error::AppError;
use crate::errors::auth_error::AuthError;
use crate::state::AppState;

use super::{
    audio_handler::{dispatch_utterance, handle_audio_message},
    error::{TransportError, WebSocketResult},
    lifecycle::{CloseReason, SessionLifecycle},
    messages::decode,
    pipeline::DialoguePipeline,
    processor::{CommandOutcome, handle_incoming_message},
    state::ConnectionState,
    writer::spawn_response_writer,
};

/// How long teardown waits for the pipeline and writer tasks
const TEARDOWN_GRACE: Duration = Duration::from_secs(2);

/// Who is on the other end of a connection, as known at upgrade time
#[derive(Debug, Clone, Default)]
pub struct SessionPeer {
    pub device_id: String,
    pub client_addr: Option<SocketAddr>,
    /// Token name when the upgrade request already authenticated
    pub authenticated_as: Option<String>,
}

/// WebSocket voice processing handler
///
/// Rejects devices outside the allow list before upgrading, then hands the
/// socket to [`run_session`].
pub async fn ws_voice_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    extensions: Extensions,
    State(app_state): State<Arc<AppState>>,
) -> Result<Response, AppError> {
    let auth = &app_state.config.auth;
    let device_id = device_id(&headers);

    if !auth.is_device_allowed(&device_id) {
        return Err(AppError::Unauthorized(format!(
            "device '{device_id}' is not in the allow list"
        )));
    }

    let peer = SessionPeer {
        authenticated_as: bearer_token(&headers)
            .and_then(|token| match_device_token(token, &auth.tokens))
            .map(str::to_string),
        client_addr: extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr),
        device_id,
    };

    info!(
        "WebSocket upgrade from device '{}' at {:?}",
        peer.device_id, peer.client_addr
    );

    Ok(ws.on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        run_session(sink, stream, app_state, peer).await;
    }))
}

/// Serve one connection until it closes.
///
/// Generic over the socket halves so the session can run over any
/// message sink and stream.
pub async fn run_session<S, R, E>(mut sink: S, mut stream: R, app_state: Arc<AppState>, peer: SessionPeer)
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let config = &app_state.config;

    if config.auth.required && peer.authenticated_as.is_none() {
        match authenticate(&mut stream, &config.auth).await {
            Ok(name) => info!("Device '{}' authenticated as '{}'", peer.device_id, name),
            Err(e) => {
                e.log();
                reject(&mut sink, &e).await;
                return;
            }
        }
    } else if let Some(name) = &peer.authenticated_as {
        info!("Device '{}' authenticated as '{}'", peer.device_id, name);
    }

    let session_id = Uuid::new_v4().to_string();
    info!(session_id = %session_id, device_id = %peer.device_id, "WebSocket session started");

    let lifecycle = SessionLifecycle::new();
    let (outbound, mut writer) = spawn_response_writer(
        sink,
        config.session.outbound_queue_capacity,
        lifecycle.clone(),
    );

    let mut state = ConnectionState::new(session_id.clone(), peer.device_id, peer.client_addr);
    let core = &app_state.core_state;
    let pipeline = DialoguePipeline::spawn(
        &session_id,
        core,
        &config.session,
        state.reply.clone(),
        outbound.clone(),
        lifecycle.clone(),
    );
    let mut segmenter = core.segmenter(config);
    let dispatcher = core.dispatcher(config);
    let idle = config.session.close_connection_timeout();

    loop {
        let next = tokio::select! {
            biased;
            _ = lifecycle.cancelled() => break,
            next = tokio::time::timeout(idle, stream.next()) => next,
        };

        let message = match next {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(e))) => {
                let e = TransportError::Read(e.to_string());
                warn!(session_id = %session_id, "{}", e);
                lifecycle.cancel(CloseReason::TransportError);
                break;
            }
            Ok(None) => {
                lifecycle.cancel(CloseReason::ClientClosed);
                break;
            }
            Err(_) => {
                info!(session_id = %session_id, "No inbound frame for {:?}", idle);
                lifecycle.cancel(CloseReason::IdleTimeout);
                break;
            }
        };

        let result: WebSocketResult<()> = match message {
            Message::Text(text) => {
                debug!(session_id = %session_id, "Received text message: {} bytes", text.len());
                match decode(text.as_str()) {
                    Ok(command) => {
                        match handle_incoming_message(command, &mut state, &outbound, config).await
                        {
                            Ok(CommandOutcome::DispatchUtterance) => {
                                dispatch_utterance(&mut state, &dispatcher, &pipeline, &lifecycle)
                                    .await
                            }
                            Ok(CommandOutcome::Handled) => Ok(()),
                            Err(e) => Err(e),
                        }
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Message::Binary(data) => {
                debug!(session_id = %session_id, "Received binary message: {} bytes", data.len());
                handle_audio_message(
                    data,
                    &mut state,
                    &mut segmenter,
                    &dispatcher,
                    &pipeline,
                    &lifecycle,
                )
                .await
            }
            Message::Ping(_) | Message::Pong(_) => Ok(()),
            Message::Close(frame) => {
                debug!(session_id = %session_id, "Close frame from client: {:?}", frame);
                lifecycle.cancel(CloseReason::ClientClosed);
                break;
            }
        };

        if let Err(e) = result {
            if e.is_fatal() {
                warn!(session_id = %session_id, "Ending session: {}", e);
                lifecycle.cancel(CloseReason::TransportError);
                break;
            }
            warn!(session_id = %session_id, "{}", e);
        }
    }

    // Teardown: the first reason recorded above is the one that sticks
    lifecycle.cancel(CloseReason::Shutdown);
    drop(outbound);
    pipeline.shutdown(TEARDOWN_GRACE).await;
    if tokio::time::timeout(TEARDOWN_GRACE, &mut writer).await.is_err() {
        warn!(session_id = %session_id, "Response writer did not stop, aborting");
        writer.abort();
    }

    info!(
        session_id = %session_id,
        "WebSocket session terminated ({})",
        lifecycle.reason().unwrap_or(CloseReason::Shutdown)
    );
}

/// Wait for the first frame and check it against the configured tokens.
async fn authenticate<R, E>(stream: &mut R, auth: &AuthConfig) -> Result<String, AuthError>
where
    R: Stream<Item = Result<Message, E>> + Unpin,
{
    let first = match tokio::time::timeout(auth.timeout(), stream.next()).await {
        Err(_) => return Err(AuthError::Timeout(auth.timeout_seconds)),
        Ok(None) | Ok(Some(Err(_))) => return Err(AuthError::ConnectionClosed),
        Ok(Some(Ok(message))) => message,
    };

    let token = match first {
        Message::Text(text) => text.as_str().trim().to_string(),
        Message::Binary(data) => String::from_utf8(data.to_vec())
            .map_err(|_| AuthError::InvalidFrame("non-UTF-8 binary frame".to_string()))?
            .trim()
            .to_string(),
        Message::Close(_) => return Err(AuthError::ConnectionClosed),
        Message::Ping(_) | Message::Pong(_) => {
            return Err(AuthError::InvalidFrame("control frame".to_string()));
        }
    };

    match_device_token(&token, &auth.tokens)
        .map(str::to_string)
        .ok_or(AuthError::InvalidToken)
}

async fn reject<S>(sink: &mut S, error: &AuthError)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: Utf8Bytes::from_static(error.close_reason()),
    };
    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        debug!("Failed to send close frame: {}", e);
    }
    if let Err(e) = sink.close().await {
        debug!("Failed to close socket: {}", e);
    }
}
