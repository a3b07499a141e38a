pub mod base;
pub mod client;

pub use base::{SpeechSynthesizer, SynthesizedSpeech, TTSError};
pub use client::HttpSpeechSynthesizer;
