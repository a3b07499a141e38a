pub mod base;
pub mod client;
pub mod dispatcher;

pub use base::{RecognitionRequest, STTError, SpeechRecognizer};
pub use client::HttpSpeechRecognizer;
pub use dispatcher::{RecognitionDispatcher, RecognitionError};
