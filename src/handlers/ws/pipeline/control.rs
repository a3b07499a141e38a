use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

/// Abort and in-flight flags shared by the session and both pipeline stages.
///
/// An abort sets the client-abort flag and bumps the epoch. Every reply
/// captures the epoch when it starts; work carrying an older epoch, or any
/// work while the flag is set, is discarded.
#[derive(Debug, Default)]
pub struct ReplyControl {
    client_abort: AtomicBool,
    abort_epoch: AtomicU64,
    generating: AtomicBool,
    aborted: Notify,
}

impl ReplyControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.abort_epoch.fetch_add(1, Ordering::SeqCst);
        self.client_abort.store(true, Ordering::SeqCst);
        self.aborted.notify_waiters();
    }

    /// Resolve once work tagged with `epoch` has been aborted.
    pub async fn stale(&self, epoch: u64) {
        loop {
            let notified = self.aborted.notified();
            tokio::pin!(notified);
            // Register before checking so an abort in between is not missed
            notified.as_mut().enable();
            if self.is_stale(epoch) {
                return;
            }
            notified.await;
        }
    }

    /// Cleared when the next utterance is dispatched
    pub fn clear_abort(&self) {
        self.client_abort.store(false, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.client_abort.load(Ordering::SeqCst)
    }

    pub fn epoch(&self) -> u64 {
        self.abort_epoch.load(Ordering::SeqCst)
    }

    pub fn is_stale(&self, epoch: u64) -> bool {
        self.is_aborted() || epoch != self.epoch()
    }

    pub fn set_generating(&self, generating: bool) {
        self.generating.store(generating, Ordering::SeqCst);
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::SeqCst)
    }
}
