//! Cooperative cancellation handle shared across a send's whole lifecycle
//! (spec §5, §4.4: "any prior job's sendCancel is invoked; a new cancel
//! function is installed"). One token is installed per send and threaded
//! through OAuth, transport, and the Stream Runner so a single cancel call
//! unwinds every suspension point at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone, Default)]
pub struct CancelToken {
    notify: Arc<Notify>,
    canceled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel()` has been called. Safe to await repeatedly
    /// and from multiple clones.
    pub async fn canceled(&self) {
        if self.is_canceled() {
            return;
        }
        self.notify.notified().await;
    }
}
