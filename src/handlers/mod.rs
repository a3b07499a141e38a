pub mod api;
pub mod ws;

pub use ws::ws_voice_handler;
