//! # WebSocket Voice Session Module
//!
//! One WebSocket connection carries one device session. Inbound binary
//! frames are audio packets; inbound text frames are JSON control commands.
//! The server answers with JSON control frames and binary synthesized audio.
//!
//! ## Connection Flow
//! 1. Device connects to `/` or `/ws`, optionally with `device-id` and
//!    `Authorization: Bearer <token>` headers
//! 2. When authentication is required and no header token matched, the first
//!    frame must carry the raw token
//! 3. Device sends `hello`; the server echoes its audio parameters
//! 4. Device streams audio. The server segments it into utterances, recognizes
//!    each one, streams a language-model reply and speaks it back
//!
//! ## Message Types
//!
//! **Incoming:**
//! - `{"type": "hello", "version": 1, "transport": "websocket", "audio_params": {...}}`
//! - `{"type": "listen", "state": "start" | "stop" | "detect", "mode": "auto" | "manual" | "realtime", "text": "..."}`
//! - `{"type": "abort", "reason": "..."}` - stop the reply being spoken
//! - `{"type": "iot", "description": {...}, "states": {...}}` - opaque device documents
//! - **Binary messages** - one encoded audio packet each
//!
//! **Outgoing:**
//! - `{"type": "hello", "transport": "websocket", "session_id": "...", "audio_params": {...}}`
//! - `{"type": "tts", "state": "start", "session_id": "..."}` - reply begins
//! - `{"type": "tts", "state": "sentence_start", "text": "...", "session_id": "..."}` - before each fragment's audio
//! - `{"type": "tts", "state": "stop", "session_id": "..."}` - after playback time has elapsed, or on abort
//! - **Binary messages** - synthesized audio packets
//!
//! ## Module Structure
//! - `messages`: control frame codec
//! - `state`: per-connection state owned by the read loop
//! - `lifecycle`: shared cancellation and close reason
//! - `writer`: the single task that owns the socket's write half
//! - `pipeline`: generation and synthesis stages
//! - `processor`: control command routing
//! - `audio_handler`: audio frame routing and utterance dispatch
//! - `handler`: upgrade handler and session read loop
//! - `error`: error types

pub mod audio_handler;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod messages;
pub mod pipeline;
pub mod processor;
pub mod state;
pub mod writer;


pub use handler::{SessionPeer, run_session, ws_voice_handler};
