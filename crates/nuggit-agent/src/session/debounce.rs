//! Single-slot debouncer.
//!
//! At most one item is pending. Pushing a new item replaces the pending one
//! and restarts the quiescence window, so only the latest item of a burst
//! is ever delivered.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Schedule `item`, discarding anything still pending. Returns true
    /// when a pending item was replaced.
    pub fn push(&mut self, item: T) -> bool {
        let deadline = Instant::now() + self.window;
        self.pending.replace((deadline, item)).is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop the pending item without delivering it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, item)| item)
    }

    /// Resolve with the pending item once its window elapses. Never
    /// resolves while nothing is pending.
    ///
    /// Cancel safe: dropping the future leaves the pending item in place.
    pub async fn fired(&mut self) -> T {
        loop {
            let deadline = match &self.pending {
                Some((deadline, _)) => *deadline,
                None => return std::future::pending().await,
            };
            tokio::time::sleep_until(deadline).await;
            if let Some((_, item)) = self.pending.take() {
                return item;
            }
        }
    }
}
