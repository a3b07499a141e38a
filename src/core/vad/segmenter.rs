//! Utterance segmentation driven by voice-activity classification.
//!
//! The [`AudioSegmenter`] consumes inbound audio frames for one connection,
//! decodes them, slices the decoded audio into fixed analysis windows and asks
//! the voice-activity collaborator about each window. From the resulting
//! voice/silence timeline it decides when an utterance is complete and when a
//! connection has been idle long enough to close.
//!
//! # Timeline
//!
//! ```text
//! [Idle] ─── voiced window ──► [Voice]
//!   │                            │
//!   └─ no voice ≥ idle close ──► IdleTimeout
//!                                │
//! [Voice] ─── unvoiced, silence ≥ threshold ──► voice_stop (UtteranceComplete)
//! ```
//!
//! All per-connection data lives in [`SegmentState`], which the session owns
//! and lends to the segmenter for the duration of one `ingest` call.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::base::VoiceActivityDetector;
use crate::core::audio::{FrameDecoder, decode_lenient};

/// How start/stop of an utterance is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenMode {
    /// Voice-activity classification decides
    #[default]
    Auto,
    /// Explicit listen start/stop commands decide
    Manual,
    Realtime,
}

impl ListenMode {
    pub fn classifies_audio(&self) -> bool {
        matches!(self, ListenMode::Auto)
    }
}

/// Per-connection audio and voice timeline state.
#[derive(Debug)]
pub struct SegmentState {
    pub mode: ListenMode,
    pub has_voice: bool,
    pub last_voice_at: Option<Instant>,
    /// Start of the current stretch without voice
    pub no_voice_since: Option<Instant>,
    /// Set once per completed utterance, only while `has_voice` is set
    pub voice_stop: bool,
    /// Decoded audio not yet consumed by a full analysis window
    pub accumulator: Vec<u8>,
    /// Raw frames of the utterance being assembled
    pub utterance: Vec<Bytes>,
    /// False while recognition is in flight
    pub accepting_audio: bool,
}

impl Default for SegmentState {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentState {
    pub fn new() -> Self {
        Self {
            mode: ListenMode::Auto,
            has_voice: false,
            last_voice_at: None,
            no_voice_since: None,
            voice_stop: false,
            accumulator: Vec::new(),
            utterance: Vec::new(),
            accepting_audio: true,
        }
    }

    /// Total bytes buffered for the current utterance
    pub fn utterance_bytes(&self) -> usize {
        self.utterance.iter().map(Bytes::len).sum()
    }

    /// Mark the current utterance complete. Ignored unless voice was heard.
    pub fn mark_voice_stop(&mut self) -> bool {
        if self.has_voice && !self.voice_stop {
            self.voice_stop = true;
            true
        } else {
            false
        }
    }

    /// Forget the current utterance after it was dispatched or discarded.
    ///
    /// The no-voice timer is left alone; it tracks the connection, not the
    /// utterance.
    pub fn reset_utterance(&mut self) {
        self.utterance.clear();
        self.accumulator.clear();
        self.has_voice = false;
        self.last_voice_at = None;
        self.voice_stop = false;
    }
}

/// Result of ingesting one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Recognition is in flight; the frame was discarded
    Dropped,
    /// No voice now or before; nothing buffered
    Silence,
    /// Frame appended to the current utterance
    Buffered,
    /// The utterance ended and is ready for recognition
    UtteranceComplete,
    /// No voice for longer than the idle-close threshold
    IdleTimeout,
}

#[derive(Debug, Clone, Copy)]
pub struct SegmenterConfig {
    /// Bytes per analysis window
    pub window_bytes: usize,
    pub silence_threshold: Duration,
    pub idle_close: Duration,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            window_bytes: 1024,
            silence_threshold: Duration::from_millis(500),
            idle_close: Duration::from_secs(120),
        }
    }
}

pub struct AudioSegmenter {
    detector: Arc<dyn VoiceActivityDetector>,
    decoder: Box<dyn FrameDecoder>,
    config: SegmenterConfig,
}

impl AudioSegmenter {
    pub fn new(
        detector: Arc<dyn VoiceActivityDetector>,
        decoder: Box<dyn FrameDecoder>,
        config: SegmenterConfig,
    ) -> Self {
        Self {
            detector,
            decoder,
            config,
        }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Ingest one inbound audio frame.
    ///
    /// # Arguments
    /// * `state` - The connection's segment state, borrowed for this call only
    /// * `frame` - One encoded audio packet as received from the device
    ///
    /// # Returns
    /// * `SegmentOutcome` - What the session should do next
    pub async fn ingest(&mut self, state: &mut SegmentState, frame: Bytes) -> SegmentOutcome {
        if !state.accepting_audio {
            debug!("Dropping {} byte audio frame while recognition is in flight", frame.len());
            return SegmentOutcome::Dropped;
        }

        let frame_voiced = if state.mode.classifies_audio() {
            let pcm = decode_lenient(self.decoder.as_mut(), &frame);
            state.accumulator.extend_from_slice(&pcm);
            classify_windows(self.detector.as_ref(), &self.config, state).await
        } else {
            state.has_voice
        };

        let now = Instant::now();

        if !frame_voiced && !state.has_voice {
            let since = *state.no_voice_since.get_or_insert(now);
            state.utterance.clear();
            if now.duration_since(since) >= self.config.idle_close {
                info!(
                    "No voice for {:?}, closing idle connection",
                    now.duration_since(since)
                );
                state.accepting_audio = false;
                return SegmentOutcome::IdleTimeout;
            }
            return SegmentOutcome::Silence;
        }

        state.no_voice_since = None;
        state.utterance.push(frame);

        if state.voice_stop {
            SegmentOutcome::UtteranceComplete
        } else {
            SegmentOutcome::Buffered
        }
    }
}

/// Classify every complete window in the accumulator.
///
/// Returns the classification of the last window, or false when the
/// accumulator did not hold a full window.
async fn classify_windows(
    detector: &dyn VoiceActivityDetector,
    config: &SegmenterConfig,
    state: &mut SegmentState,
) -> bool {
    let window_bytes = config.window_bytes.max(1);
    let mut last_voiced = false;

    while state.accumulator.len() >= window_bytes {
        let window: Vec<u8> = state.accumulator.drain(..window_bytes).collect();

        let voiced = match detector.is_voice(&window).await {
            Ok(voiced) => voiced,
            Err(e) => {
                warn!("Voice activity check failed, treating window as silence: {}", e);
                false
            }
        };

        let now = Instant::now();
        if voiced {
            if !state.has_voice {
                debug!("Voice started");
            }
            state.has_voice = true;
            state.last_voice_at = Some(now);
        } else if state.has_voice && !state.voice_stop {
            let silent_for = state
                .last_voice_at
                .map(|at| now.duration_since(at))
                .unwrap_or_default();
            if silent_for >= config.silence_threshold && state.mark_voice_stop() {
                info!("Utterance complete after {:?} of silence", silent_for);
            }
        }

        last_voiced = voiced;
    }

    last_voiced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::Pcm16Passthrough;
    use crate::core::vad::base::VADError;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WINDOW: usize = 8;

    /// Answers from a script, then repeats the fallback.
    struct ScriptedDetector {
        script: Mutex<VecDeque<Result<bool, VADError>>>,
        fallback: bool,
        calls: AtomicUsize,
    }

    impl ScriptedDetector {
        fn new(script: Vec<Result<bool, VADError>>, fallback: bool) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl VoiceActivityDetector for ScriptedDetector {
        async fn is_voice(&self, window: &[u8]) -> Result<bool, VADError> {
            assert_eq!(window.len(), WINDOW);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .pop_front()
                .unwrap_or(Ok(self.fallback))
        }
    }

    fn segmenter(detector: Arc<ScriptedDetector>) -> AudioSegmenter {
        AudioSegmenter::new(
            detector,
            Box::new(Pcm16Passthrough),
            SegmenterConfig {
                window_bytes: WINDOW,
                silence_threshold: Duration::from_millis(500),
                idle_close: Duration::from_secs(5),
            },
        )
    }

    fn window_frame() -> Bytes {
        Bytes::from(vec![0u8; WINDOW])
    }

    #[tokio::test(start_paused = true)]
    async fn test_voice_stop_set_exactly_once_after_silence_gap() {
        let mut script: Vec<Result<bool, VADError>> = vec![Ok(true); 5];
        script.extend(std::iter::repeat_n(Ok(false), 10));
        let detector = ScriptedDetector::new(script, false);
        let mut seg = segmenter(detector.clone());
        let mut state = SegmentState::new();

        let mut completions = 0;
        for _ in 0..15 {
            let outcome = seg.ingest(&mut state, window_frame()).await;
            if outcome == SegmentOutcome::UtteranceComplete {
                completions += 1;
                assert!(state.has_voice);
                // What the session does on completion
                state.reset_utterance();
            }
            tokio::time::advance(Duration::from_millis(100)).await;
        }

        assert_eq!(completions, 1);
        assert!(!state.voice_stop);
        assert_eq!(detector.calls.load(Ordering::SeqCst), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_pause_does_not_end_utterance() {
        let script = vec![Ok(true), Ok(false), Ok(false), Ok(true), Ok(false)];
        let mut seg = segmenter(ScriptedDetector::new(script, false));
        let mut state = SegmentState::new();

        for _ in 0..5 {
            let outcome = seg.ingest(&mut state, window_frame()).await;
            assert_ne!(outcome, SegmentOutcome::UtteranceComplete);
            tokio::time::advance(Duration::from_millis(200)).await;
        }

        assert!(state.has_voice);
        assert!(!state.voice_stop);
        assert_eq!(state.utterance.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_window_is_accumulated() {
        let detector = ScriptedDetector::new(vec![Ok(true)], false);
        let mut seg = segmenter(detector.clone());
        let mut state = SegmentState::new();

        let half = Bytes::from(vec![0u8; WINDOW / 2]);
        seg.ingest(&mut state, half.clone()).await;
        assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
        assert_eq!(state.accumulator.len(), WINDOW / 2);

        let outcome = seg.ingest(&mut state, half).await;
        assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
        assert!(state.accumulator.is_empty());
        assert_eq!(outcome, SegmentOutcome::Buffered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_dropped_while_not_accepting() {
        let detector = ScriptedDetector::new(vec![], true);
        let mut seg = segmenter(detector.clone());
        let mut state = SegmentState::new();
        state.accepting_audio = false;

        let outcome = seg.ingest(&mut state, window_frame()).await;
        assert_eq!(outcome, SegmentOutcome::Dropped);
        assert!(state.utterance.is_empty());
        assert!(state.accumulator.is_empty());
        assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_after_no_voice() {
        let mut seg = segmenter(ScriptedDetector::new(vec![], false));
        let mut state = SegmentState::new();

        assert_eq!(
            seg.ingest(&mut state, window_frame()).await,
            SegmentOutcome::Silence
        );
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(
            seg.ingest(&mut state, window_frame()).await,
            SegmentOutcome::Silence
        );
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(
            seg.ingest(&mut state, window_frame()).await,
            SegmentOutcome::IdleTimeout
        );
        assert!(!state.accepting_audio);
        assert!(state.utterance.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_voice_resets_idle_timer() {
        let script = vec![Ok(false), Ok(true)];
        let mut seg = segmenter(ScriptedDetector::new(script, false));
        let mut state = SegmentState::new();

        seg.ingest(&mut state, window_frame()).await;
        assert!(state.no_voice_since.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        seg.ingest(&mut state, window_frame()).await;
        assert!(state.no_voice_since.is_none());
        assert_eq!(state.utterance.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detector_error_counts_as_silence() {
        let script = vec![Err(VADError::NetworkError("down".to_string()))];
        let mut seg = segmenter(ScriptedDetector::new(script, false));
        let mut state = SegmentState::new();

        let outcome = seg.ingest(&mut state, window_frame()).await;
        assert_eq!(outcome, SegmentOutcome::Silence);
        assert!(!state.has_voice);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_mode_skips_classification() {
        let detector = ScriptedDetector::new(vec![], true);
        let mut seg = segmenter(detector.clone());
        let mut state = SegmentState::new();
        state.mode = ListenMode::Manual;

        // listen start
        state.has_voice = true;
        assert_eq!(
            seg.ingest(&mut state, window_frame()).await,
            SegmentOutcome::Buffered
        );

        // listen stop
        state.mark_voice_stop();
        assert_eq!(
            seg.ingest(&mut state, window_frame()).await,
            SegmentOutcome::UtteranceComplete
        );
        assert_eq!(state.utterance.len(), 2);
        assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_voice_stop_requires_voice() {
        let mut state = SegmentState::new();
        assert!(!state.mark_voice_stop());
        assert!(!state.voice_stop);

        state.has_voice = true;
        assert!(state.mark_voice_stop());
        assert!(!state.mark_voice_stop());
    }

    #[test]
    fn test_reset_keeps_no_voice_timer() {
        let mut state = SegmentState::new();
        state.has_voice = true;
        state.voice_stop = true;
        state.utterance.push(Bytes::from_static(b"abc"));
        state.accumulator.extend_from_slice(b"xyz");
        state.no_voice_since = Some(Instant::now());

        assert_eq!(state.utterance_bytes(), 3);
        state.reset_utterance();

        assert!(state.utterance.is_empty());
        assert!(state.accumulator.is_empty());
        assert!(!state.has_voice);
        assert!(!state.voice_stop);
        assert!(state.no_voice_since.is_some());
    }
}
