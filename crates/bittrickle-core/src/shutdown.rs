//! Cooperative shutdown signal shared by long-running tasks.
//!
//! A [`Shutdown`] is a one-way latch: once triggered it stays triggered.
//! Loops either poll [`Shutdown::is_triggered`] between iterations or race
//! [`Shutdown::cancelled`] against their blocking call in `tokio::select!`.
//!
//! Wrap it in an `Arc` to share it between tasks.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct Shutdown {
    triggered: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latches the signal and wakes every current waiter.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Completes once [`Shutdown::trigger`] has been called.
    ///
    /// Returns immediately if the signal is already latched.
    pub async fn cancelled(&self) {
        loop {
            // Register interest before checking the flag so a trigger between
            // the check and the await is not lost.
            let notified = self.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}
