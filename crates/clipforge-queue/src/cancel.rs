//! Cooperative cancellation flag.
//!
//! Workers inspect the flag at checkpoints; whoever trips it first
//! decides the reason, and that decision is final.

use std::sync::Arc;

use tokio::sync::watch;

/// Why a running job is being asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The owning principal requested cancellation
    User,
    /// The global job deadline expired; classified as a retryable timeout
    Deadline,
}

/// Shared cancellation flag, cheap to clone across stages.
#[derive(Clone)]
pub struct CancelFlag {
    tx: Arc<watch::Sender<Option<CancelReason>>>,
    rx: watch::Receiver<Option<CancelReason>>,
}

impl CancelFlag {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(None);
        Self { tx: Arc::new(tx), rx }
    }

    /// Trip the flag. The first reason wins; later calls are no-ops.
    pub fn cancel(&self, reason: CancelReason) {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    pub fn get(&self) -> Option<CancelReason> {
        *self.rx.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.get().is_some()
    }

    /// Wait until the flag is tripped.
    pub async fn cancelled(&self) -> CancelReason {
        let mut rx = self.rx.clone();
        loop {
            if let Some(reason) = *rx.borrow_and_update() {
                return reason;
            }
            if rx.changed().await.is_err() {
                // Sender gone without cancelling; treat as user cancel so
                // the stage machine still unwinds.
                return CancelReason::User;
            }
        }
    }
}

impl Default for CancelFlag {
    fn default() -> Self {
        Self::new()
    }
}
