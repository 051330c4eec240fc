//! Cancellable one-shot timers on the tokio runtime
//!
//! Each chain owns at most one [`Timer`]. Cancelling it aborts the task while
//! it still sleeps. Once the delay has elapsed the task runs its callback to
//! completion; from that point cancellation is left to the generation check
//! the callback performs.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Handle to a pending timer
#[derive(Debug)]
pub struct Timer {
    handle: JoinHandle<()>,
    delay: Duration,
}

impl Timer {
    /// Delay the timer was armed with
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// True once the callback has run or the timer was cancelled
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the timer if it has not fired yet
    pub fn cancel(self) {
        self.handle.abort();
    }

    /// Lets an already fired timer run its callback to completion
    pub(crate) fn detach(self) {
        drop(self.handle);
    }
}

/// Arms a timer that runs `on_fire` after `delay`
///
/// Must be called from within a tokio runtime.
pub fn schedule<F>(delay: Duration, on_fire: F) -> Timer
where
    F: Future<Output = ()> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        sleep(delay).await;
        on_fire.await;
    });

    Timer { handle, delay }
}
