//! Control command routing
//!
//! Applies one decoded [`Command`] to the connection state. Audio-related
//! follow-up work (dispatching an utterance) is reported back to the read
//! loop instead of being done here, since it needs the session's dispatcher
//! and pipeline.

use tracing::{debug, info, warn};

use super::{
    error::WebSocketResult,
    messages::{Command, ListenState},
    state::ConnectionState,
    writer::OutboundSender,
};
use crate::config::ServerConfig;

/// What the read loop should do after a command was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Handled,
    /// A manual `listen stop` closed an utterance that is ready now
    DispatchUtterance,
}

/// Process one inbound control command.
///
/// # Arguments
/// * `command` - The decoded control frame
/// * `state` - Connection state owned by the read loop
/// * `outbound` - Queue to the response writer
/// * `config` - Server configuration, for negotiated audio parameters
///
/// # Returns
/// * `WebSocketResult<CommandOutcome>` - Only transport failures are errors
pub async fn handle_incoming_message(
    command: Command,
    state: &mut ConnectionState,
    outbound: &OutboundSender,
    config: &ServerConfig,
) -> WebSocketResult<CommandOutcome> {
    match command {
        Command::Hello { audio_params, .. } => {
            debug!(session_id = %state.session_id, "hello from device: {:?}", audio_params);
            outbound
                .send_command(Command::hello_reply(&state.session_id, &config.audio))
                .await?;
        }
        Command::Listen {
            mode, state: listen, text, ..
        } => {
            if let Some(mode) = mode {
                state.audio.mode = mode;
            }
            return Ok(apply_listen(state, listen, text.as_deref()));
        }
        Command::Abort { reason, .. } => {
            info!(session_id = %state.session_id, "Client abort: {:?}", reason);
            state.reply.abort();
            outbound
                .send_command(Command::tts_stop(&state.session_id))
                .await?;
        }
        Command::Iot {
            description,
            states,
            ..
        } => {
            if let Some(description) = description {
                state.iot_description = Some(description);
            }
            if let Some(states) = states {
                state.iot_states = Some(states);
            }
            debug!(session_id = %state.session_id, "Stored device iot payload");
        }
        Command::Tts { state: tts, .. } => {
            warn!(session_id = %state.session_id, "Ignoring inbound tts {:?} frame", tts);
        }
    }
    Ok(CommandOutcome::Handled)
}

fn apply_listen(
    state: &mut ConnectionState,
    listen: ListenState,
    text: Option<&str>,
) -> CommandOutcome {
    let audio = &mut state.audio;
    match listen {
        ListenState::Start => {
            audio.has_voice = true;
            audio.voice_stop = false;
            debug!(session_id = %state.session_id, "listen start ({:?})", audio.mode);
        }
        ListenState::Stop => {
            audio.has_voice = true;
            audio.mark_voice_stop();
            debug!(session_id = %state.session_id, "listen stop");
            if !audio.utterance.is_empty() {
                return CommandOutcome::DispatchUtterance;
            }
        }
        ListenState::Detect => {
            // Timers are left running
            audio.has_voice = false;
            audio.utterance.clear();
            info!(session_id = %state.session_id, "listen detect: {:?}", text);
        }
    }
    CommandOutcome::Handled
}
