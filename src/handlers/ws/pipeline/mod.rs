//! Dialogue pipeline: recognized text in, spoken reply out.
//!
//! ```text
//! read loop ──text──► GenerationStage ──SynthesisJob──► SynthesisStage ──► OutboundSender
//!             (bounded)                (bounded, fragments
//!                                       dropped when full)
//! ```
//!
//! Reply start/end markers travel through the fragment queue with the
//! fragments, so the synthesis stage sees one ordered stream per reply and
//! the device observes `start`, the reply's audio, then `stop`.

mod control;
mod generation;
mod synthesis;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

pub use control::ReplyControl;
pub use generation::GenerationStage;
pub use synthesis::SynthesisStage;

use super::error::TransportError;
use super::lifecycle::SessionLifecycle;
use super::writer::OutboundSender;
use crate::config::SessionConfig;
use crate::core::CoreState;

/// One unit of work for the synthesis stage, tagged with the reply's epoch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisJob {
    pub epoch: u64,
    pub kind: JobKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    ReplyStart,
    Fragment(String),
    ReplyEnd,
}

/// Handle to a session's running pipeline tasks
pub struct DialoguePipeline {
    text_tx: mpsc::Sender<String>,
    lifecycle: SessionLifecycle,
    generation: JoinHandle<()>,
    synthesis: JoinHandle<()>,
}

impl DialoguePipeline {
    pub fn spawn(
        session_id: &str,
        core: &CoreState,
        config: &SessionConfig,
        control: Arc<ReplyControl>,
        outbound: OutboundSender,
        lifecycle: SessionLifecycle,
    ) -> Self {
        let (text_tx, text_rx) = mpsc::channel(config.text_queue_capacity.max(1));
        let (job_tx, job_rx) = mpsc::channel(config.fragment_queue_capacity.max(1));

        let generation = GenerationStage::new(
            session_id.to_string(),
            core.generator.clone(),
            control.clone(),
            job_tx,
            lifecycle.clone(),
        );
        let synthesis = SynthesisStage::new(
            session_id.to_string(),
            core.synthesizer.clone(),
            control,
            outbound,
            lifecycle.clone(),
        );

        Self {
            text_tx,
            lifecycle,
            generation: tokio::spawn(generation.run(text_rx)),
            synthesis: tokio::spawn(synthesis.run(job_rx)),
        }
    }

    /// Hand recognized text to the generation stage, waiting for queue space.
    pub async fn submit(&self, text: String) -> Result<(), TransportError> {
        tokio::select! {
            biased;
            _ = self.lifecycle.cancelled() => Err(TransportError::Closed),
            sent = self.text_tx.send(text) => sent.map_err(|_| TransportError::Closed),
        }
    }

    /// Close the text queue and wait up to `grace` for both stages to exit.
    pub async fn shutdown(self, grace: Duration) {
        let Self {
            text_tx,
            mut generation,
            mut synthesis,
            ..
        } = self;
        drop(text_tx);

        let finished = tokio::time::timeout(grace, async {
            let _ = (&mut generation).await;
            let _ = (&mut synthesis).await;
        })
        .await;

        if finished.is_err() {
            warn!("Pipeline tasks did not stop within {:?}, aborting", grace);
            generation.abort();
            synthesis.abort();
        }
    }
}
