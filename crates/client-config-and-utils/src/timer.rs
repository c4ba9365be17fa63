//! Single-shot, cancellable delayed callbacks on the tokio runtime.
//!
//! A [`Timer`] owns the task that sleeps and then runs its callback.
//! Cancelling (or dropping) the handle aborts the task; a callback that has
//! already started runs to completion because callbacks are synchronous.

use std::time::Duration;
use tokio::task::JoinHandle;

/// Handle to a scheduled callback. Dropping it cancels the callback.
#[must_use = "dropping a Timer cancels it"]
#[derive(Debug)]
pub struct Timer {
    handle: JoinHandle<()>,
}

impl Timer {
    /// Run `callback` once after `delay`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn after<F>(delay: Duration, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let deadline = tokio::time::Instant::now() + delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            callback();
        });
        Self { handle }
    }

    /// Cancel the callback if it has not fired yet.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// True once the callback ran or the timer was cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
