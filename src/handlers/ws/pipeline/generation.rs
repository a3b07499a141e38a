use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use super::{JobKind, ReplyControl, SynthesisJob};
use crate::core::llm::{DialogueGenerator, DialogueTurn, GenerationEvent, GenerationRequest};
use crate::handlers::ws::lifecycle::SessionLifecycle;

#[derive(Debug, PartialEq, Eq)]
enum ReplyOutcome {
    /// Append this assistant turn
    Completed(String),
    /// Drop the reply without touching history
    Abandoned,
    /// The session is going away
    Stopped,
}

/// Streams replies from the dialogue generator into the fragment queue.
///
/// Owns the dialogue history: user turns are appended when text arrives,
/// assistant turns when a reply completes.
pub struct GenerationStage {
    session_id: String,
    generator: Arc<dyn DialogueGenerator>,
    control: Arc<ReplyControl>,
    jobs: mpsc::Sender<SynthesisJob>,
    lifecycle: SessionLifecycle,
    history: Vec<DialogueTurn>,
}

impl GenerationStage {
    pub fn new(
        session_id: String,
        generator: Arc<dyn DialogueGenerator>,
        control: Arc<ReplyControl>,
        jobs: mpsc::Sender<SynthesisJob>,
        lifecycle: SessionLifecycle,
    ) -> Self {
        Self {
            session_id,
            generator,
            control,
            jobs,
            lifecycle,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[DialogueTurn] {
        &self.history
    }

    pub async fn run(mut self, mut texts: mpsc::Receiver<String>) {
        loop {
            let text = tokio::select! {
                biased;
                _ = self.lifecycle.cancelled() => break,
                text = texts.recv() => match text {
                    Some(text) => text,
                    None => break,
                },
            };

            if !self.respond(text).await {
                break;
            }
        }
        debug!(session_id = %self.session_id, "Generation stage stopped");
    }

    /// Produce one reply. Returns false once the stage should stop.
    pub async fn respond(&mut self, text: String) -> bool {
        let epoch = self.control.epoch();
        self.history.push(DialogueTurn::user(text));

        if !self.send_marker(epoch, JobKind::ReplyStart).await {
            return false;
        }

        self.control.set_generating(true);
        let outcome = self.stream_reply(epoch).await;
        self.control.set_generating(false);

        match &outcome {
            ReplyOutcome::Completed(content) if !content.is_empty() => {
                self.history.push(DialogueTurn::assistant(content.clone()));
            }
            ReplyOutcome::Completed(_) | ReplyOutcome::Abandoned => {}
            ReplyOutcome::Stopped => return false,
        }

        self.send_marker(epoch, JobKind::ReplyEnd).await
    }

    async fn stream_reply(&self, epoch: u64) -> ReplyOutcome {
        let request = GenerationRequest {
            session_id: &self.session_id,
            history: &self.history,
        };
        let opened = tokio::select! {
            biased;
            _ = self.lifecycle.cancelled() => return ReplyOutcome::Stopped,
            _ = self.control.stale(epoch) => return ReplyOutcome::Abandoned,
            opened = self.generator.generate(request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                warn!(session_id = %self.session_id, "Dialogue generation failed: {}", e);
                return ReplyOutcome::Abandoned;
            }
        };

        let mut spoken = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = self.lifecycle.cancelled() => return ReplyOutcome::Stopped,
                _ = self.control.stale(epoch) => None,
                next = stream.next() => Some(next),
            };

            let Some(next) = next.filter(|_| !self.control.is_stale(epoch)) else {
                info!(session_id = %self.session_id, "Reply aborted by client");
                return ReplyOutcome::Abandoned;
            };

            match next {
                Some(Ok(GenerationEvent::Fragment(fragment))) => {
                    spoken.push_str(&fragment);
                    let job = SynthesisJob {
                        epoch,
                        kind: JobKind::Fragment(fragment),
                    };
                    match self.jobs.try_send(job) {
                        Ok(()) => {}
                        Err(TrySendError::Full(job)) => {
                            warn!(
                                session_id = %self.session_id,
                                "Fragment queue full, dropping {:?}",
                                job.kind
                            );
                        }
                        Err(TrySendError::Closed(_)) => return ReplyOutcome::Stopped,
                    }
                }
                Some(Ok(GenerationEvent::Warning(message))) => {
                    warn!(session_id = %self.session_id, "Dialogue generator warning: {}", message);
                }
                Some(Ok(GenerationEvent::Complete(message))) => {
                    let content = if message.is_empty() { spoken } else { message };
                    return ReplyOutcome::Completed(content);
                }
                Some(Err(e)) => {
                    warn!(session_id = %self.session_id, "Dialogue stream failed: {}", e);
                    return ReplyOutcome::Abandoned;
                }
                None => return ReplyOutcome::Completed(spoken),
            }
        }
    }

    /// Markers are never dropped; they wait for queue space.
    async fn send_marker(&self, epoch: u64, kind: JobKind) -> bool {
        tokio::select! {
            biased;
            _ = self.lifecycle.cancelled() => false,
            sent = self.jobs.send(SynthesisJob { epoch, kind }) => sent.is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::{GenerationStream, LLMError, Role};
    use crate::handlers::ws::lifecycle::CloseReason;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Hands out one scripted event list per call
    struct ScriptedGenerator {
        replies: Mutex<VecDeque<Result<Vec<Result<GenerationEvent, LLMError>>, LLMError>>>,
        seen_turns: Mutex<Vec<usize>>,
    }

    impl ScriptedGenerator {
        fn new(
            replies: Vec<Result<Vec<Result<GenerationEvent, LLMError>>, LLMError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen_turns: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl DialogueGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            request: GenerationRequest<'_>,
        ) -> Result<GenerationStream, LLMError> {
            self.seen_turns.lock().push(request.history.len());
            let events = self
                .replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))?;
            Ok(Box::pin(futures::stream::iter(events)))
        }
    }

    fn fragment(text: &str) -> Result<GenerationEvent, LLMError> {
        Ok(GenerationEvent::Fragment(text.to_string()))
    }

    fn stage(
        generator: Arc<ScriptedGenerator>,
        capacity: usize,
    ) -> (GenerationStage, mpsc::Receiver<SynthesisJob>, Arc<ReplyControl>) {
        let (tx, rx) = mpsc::channel(capacity);
        let control = Arc::new(ReplyControl::new());
        let stage = GenerationStage::new(
            "s-1".to_string(),
            generator,
            control.clone(),
            tx,
            SessionLifecycle::new(),
        );
        (stage, rx, control)
    }

    fn drain(rx: &mut mpsc::Receiver<SynthesisJob>) -> Vec<JobKind> {
        let mut kinds = Vec::new();
        while let Ok(job) = rx.try_recv() {
            kinds.push(job.kind);
        }
        kinds
    }

    #[tokio::test]
    async fn test_complete_appends_both_turns() {
        let generator = ScriptedGenerator::new(vec![Ok(vec![
            fragment("Hi "),
            fragment("there."),
            Ok(GenerationEvent::Complete("Hi there.".to_string())),
        ])]);
        let (mut stage, mut rx, control) = stage(generator.clone(), 10);

        assert!(stage.respond("hello".to_string()).await);

        assert_eq!(
            stage.history(),
            &[DialogueTurn::user("hello"), DialogueTurn::assistant("Hi there.")]
        );
        assert_eq!(
            drain(&mut rx),
            vec![
                JobKind::ReplyStart,
                JobKind::Fragment("Hi ".to_string()),
                JobKind::Fragment("there.".to_string()),
                JobKind::ReplyEnd,
            ]
        );
        assert!(!control.is_generating());
        assert_eq!(*generator.seen_turns.lock(), vec![1]);
    }

    #[tokio::test]
    async fn test_empty_complete_uses_streamed_text() {
        let generator = ScriptedGenerator::new(vec![Ok(vec![
            fragment("a"),
            fragment("b"),
            Ok(GenerationEvent::Complete(String::new())),
        ])]);
        let (mut stage, _rx, _control) = stage(generator, 10);

        stage.respond("q".to_string()).await;
        assert_eq!(stage.history()[1], DialogueTurn::assistant("ab"));
    }

    #[tokio::test]
    async fn test_stream_end_without_complete_keeps_streamed_text() {
        let generator = ScriptedGenerator::new(vec![
            Ok(vec![fragment("partial")]),
            Ok(vec![]),
        ]);
        let (mut stage, _rx, _control) = stage(generator, 10);

        stage.respond("first".to_string()).await;
        stage.respond("second".to_string()).await;

        let roles: Vec<Role> = stage.history().iter().map(|turn| turn.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(stage.history()[1].content, "partial");
    }

    #[tokio::test]
    async fn test_upstream_error_abandons_reply() {
        let generator = ScriptedGenerator::new(vec![
            Err(LLMError::NetworkError("refused".to_string())),
            Ok(vec![
                fragment("x"),
                Err(LLMError::InvalidResponse("garbage".to_string())),
            ]),
        ]);
        let (mut stage, mut rx, _control) = stage(generator, 10);

        assert!(stage.respond("one".to_string()).await);
        assert!(stage.respond("two".to_string()).await);

        assert_eq!(
            stage.history(),
            &[DialogueTurn::user("one"), DialogueTurn::user("two")]
        );
        // Markers still bracket each reply so the synthesis stage can reset
        assert_eq!(
            drain(&mut rx),
            vec![
                JobKind::ReplyStart,
                JobKind::ReplyEnd,
                JobKind::ReplyStart,
                JobKind::Fragment("x".to_string()),
                JobKind::ReplyEnd,
            ]
        );
    }

    #[tokio::test]
    async fn test_aborted_reply_appends_no_assistant_turn() {
        let generator = ScriptedGenerator::new(vec![Ok(vec![
            fragment("never"),
            Ok(GenerationEvent::Complete("never".to_string())),
        ])]);
        let (mut stage, mut rx, control) = stage(generator, 10);
        control.abort();

        stage.respond("hello".to_string()).await;

        assert_eq!(stage.history(), &[DialogueTurn::user("hello")]);
        assert_eq!(drain(&mut rx), vec![JobKind::ReplyStart, JobKind::ReplyEnd]);
    }

    /// Yields one fragment, then never finishes
    struct StallingGenerator;

    #[async_trait::async_trait]
    impl DialogueGenerator for StallingGenerator {
        async fn generate(
            &self,
            _request: GenerationRequest<'_>,
        ) -> Result<GenerationStream, LLMError> {
            Ok(Box::pin(
                futures::stream::iter(vec![fragment("Let me think.")])
                    .chain(futures::stream::pending()),
            ))
        }
    }

    #[tokio::test]
    async fn test_abort_releases_stalled_stream() {
        let (tx, mut rx) = mpsc::channel(10);
        let control = Arc::new(ReplyControl::new());
        let stage = GenerationStage::new(
            "s-1".to_string(),
            Arc::new(StallingGenerator),
            control.clone(),
            tx,
            SessionLifecycle::new(),
        );
        let task = tokio::spawn(async move {
            let mut stage = stage;
            let running = stage.respond("hello".to_string()).await;
            (stage, running)
        });

        assert_eq!(rx.recv().await.unwrap().kind, JobKind::ReplyStart);
        assert_eq!(
            rx.recv().await.unwrap().kind,
            JobKind::Fragment("Let me think.".to_string())
        );
        control.abort();

        let (stage, running) = tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(running);
        assert_eq!(stage.history(), &[DialogueTurn::user("hello")]);
        assert_eq!(rx.recv().await.unwrap().kind, JobKind::ReplyEnd);
        assert!(!control.is_generating());
    }

    #[tokio::test]
    async fn test_full_fragment_queue_drops_fragments() {
        let generator = ScriptedGenerator::new(vec![Ok(vec![
            fragment("one"),
            fragment("two"),
            fragment("three"),
            Ok(GenerationEvent::Complete(String::new())),
        ])]);
        // Room for the start marker and a single fragment
        let (stage, mut rx, _control) = stage(generator, 2);

        let task = tokio::spawn(async move {
            let mut stage = stage;
            stage.respond("count".to_string()).await;
            stage
        });

        let mut kinds = Vec::new();
        while kinds.last() != Some(&JobKind::ReplyEnd) {
            kinds.push(rx.recv().await.unwrap().kind);
        }
        let stage = task.await.unwrap();

        assert_eq!(
            kinds,
            vec![
                JobKind::ReplyStart,
                JobKind::Fragment("one".to_string()),
                JobKind::ReplyEnd,
            ]
        );
        // History still records the whole reply
        assert_eq!(stage.history()[1].content, "onetwothree");
    }

    #[tokio::test]
    async fn test_cancelled_stage_stops() {
        let generator = ScriptedGenerator::new(vec![]);
        let (tx, mut rx) = mpsc::channel(4);
        let lifecycle = SessionLifecycle::new();
        let mut stage = GenerationStage::new(
            "s-1".to_string(),
            generator,
            Arc::new(ReplyControl::new()),
            tx,
            lifecycle.clone(),
        );
        lifecycle.cancel(CloseReason::Shutdown);

        assert!(!stage.respond("hello".to_string()).await);
        assert!(rx.try_recv().is_err());
    }
}
