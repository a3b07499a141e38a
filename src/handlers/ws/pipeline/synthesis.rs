use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{JobKind, ReplyControl, SynthesisJob};
use crate::core::tts::SpeechSynthesizer;
use crate::handlers::ws::error::TransportError;
use crate::handlers::ws::lifecycle::SessionLifecycle;
use crate::handlers::ws::messages::Command;
use crate::handlers::ws::writer::OutboundSender;

/// Playback bookkeeping for the reply being spoken
#[derive(Debug, Default, Clone, Copy)]
struct SpeechTiming {
    /// When the reply's first fragment reached this stage
    started_at: Option<Instant>,
    /// Total duration of audio sent so far
    synthesized: Duration,
}

impl SpeechTiming {
    /// How much longer the device will be playing, floored at zero
    fn remaining(&self) -> Duration {
        match self.started_at {
            Some(started) => self.synthesized.saturating_sub(started.elapsed()),
            None => Duration::ZERO,
        }
    }
}

/// Turns queued fragments into audio frames for the response writer.
pub struct SynthesisStage {
    session_id: String,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    control: Arc<ReplyControl>,
    outbound: OutboundSender,
    lifecycle: SessionLifecycle,
    timing: SpeechTiming,
}

impl SynthesisStage {
    pub fn new(
        session_id: String,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        control: Arc<ReplyControl>,
        outbound: OutboundSender,
        lifecycle: SessionLifecycle,
    ) -> Self {
        Self {
            session_id,
            synthesizer,
            control,
            outbound,
            lifecycle,
            timing: SpeechTiming::default(),
        }
    }

    pub async fn run(mut self, mut jobs: mpsc::Receiver<SynthesisJob>) {
        loop {
            let job = tokio::select! {
                biased;
                _ = self.lifecycle.cancelled() => break,
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            if let Err(e) = self.handle(job).await {
                debug!(session_id = %self.session_id, "Synthesis stage stopping: {}", e);
                break;
            }
        }
        debug!(session_id = %self.session_id, "Synthesis stage stopped");
    }

    async fn handle(&mut self, job: SynthesisJob) -> Result<(), TransportError> {
        match job.kind {
            JobKind::ReplyStart => {
                self.timing = SpeechTiming::default();
                if !self.control.is_stale(job.epoch) {
                    self.outbound
                        .send_command(Command::tts_start(&self.session_id))
                        .await?;
                }
            }
            JobKind::Fragment(text) => self.speak(job.epoch, text).await?,
            JobKind::ReplyEnd => {
                self.pace(job.epoch).await?;
                // An abort already sent its own stop frame
                if !self.control.is_stale(job.epoch) {
                    self.outbound
                        .send_command(Command::tts_stop(&self.session_id))
                        .await?;
                }
                self.timing = SpeechTiming::default();
            }
        }
        Ok(())
    }

    async fn speak(&mut self, epoch: u64, text: String) -> Result<(), TransportError> {
        self.timing.started_at.get_or_insert_with(Instant::now);

        if self.control.is_stale(epoch) {
            debug!(session_id = %self.session_id, "Skipping fragment of aborted reply");
            return Ok(());
        }

        let result = tokio::select! {
            biased;
            _ = self.lifecycle.cancelled() => return Err(TransportError::Closed),
            _ = self.control.stale(epoch) => {
                debug!(session_id = %self.session_id, "Reply aborted during synthesis");
                return Ok(());
            }
            result = self.synthesizer.synthesize(&self.session_id, &text) => result,
        };
        let speech = match result {
            Ok(speech) => speech,
            Err(e) => {
                warn!(session_id = %self.session_id, "Synthesis failed for {:?}: {}", text, e);
                return Ok(());
            }
        };

        if self.control.is_stale(epoch) {
            return Ok(());
        }

        self.timing.synthesized += speech.duration;
        self.outbound
            .send_command(Command::tts_sentence_start(&self.session_id, text))
            .await?;

        for frame in speech.frames {
            if self.control.is_stale(epoch) {
                debug!(session_id = %self.session_id, "Reply aborted mid-fragment");
                break;
            }
            self.outbound.send_binary(frame).await?;
        }
        Ok(())
    }

    /// Hold the stop frame until the device has had time to play the audio.
    ///
    /// Returns early when the reply is aborted while waiting.
    async fn pace(&self, epoch: u64) -> Result<(), TransportError> {
        let delay = self.timing.remaining();
        if delay.is_zero() || self.control.is_stale(epoch) {
            return Ok(());
        }
        debug!(session_id = %self.session_id, "Delaying stop by {:?}", delay);
        tokio::select! {
            biased;
            _ = self.lifecycle.cancelled() => Err(TransportError::Closed),
            _ = self.control.stale(epoch) => {
                debug!(session_id = %self.session_id, "Reply aborted during playback");
                Ok(())
            }
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
