//! Voice activity detection.
//!
//! - [`VoiceActivityDetector`]: collaborator contract for classifying windows
//! - [`HttpVoiceActivityDetector`]: client for the inference service
//! - [`AudioSegmenter`]: turns a frame stream into utterances

pub mod base;
pub mod client;
pub mod segmenter;

pub use base::{VADError, VoiceActivityDetector};
pub use client::HttpVoiceActivityDetector;
pub use segmenter::{AudioSegmenter, ListenMode, SegmentOutcome, SegmentState, SegmenterConfig};
