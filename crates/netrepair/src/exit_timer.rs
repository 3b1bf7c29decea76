//! Self-termination timer
//!
//! Owned by the entry point rather than the sequencer, so a run can be
//! driven (and tested) without the process going away.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Cancels the timer it was taken from
#[derive(Debug, Clone)]
pub struct TimerCancel {
    notify: Arc<Notify>,
}

impl TimerCancel {
    pub fn cancel(&self) {
        self.notify.notify_one();
    }
}

pub struct ExitTimer {
    delay: Duration,
    cancel: TimerCancel,
    handle: JoinHandle<bool>,
}

impl ExitTimer {
    pub fn schedule(delay: Duration) -> Self {
        let notify = Arc::new(Notify::new());
        let cancelled = Arc::clone(&notify);
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => true,
                _ = cancelled.notified() => false,
            }
        });

        Self {
            delay,
            cancel: TimerCancel { notify },
            handle,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn canceller(&self) -> TimerCancel {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the timer. `true` when the delay elapsed, `false` when it
    /// was cancelled first.
    pub async fn wait(self) -> bool {
        self.handle.await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_elapses() {
        let timer = ExitTimer::schedule(Duration::from_secs(60));
        assert_eq!(timer.delay(), Duration::from_secs(60));
        assert!(timer.wait().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_expiry() {
        let timer = ExitTimer::schedule(Duration::from_secs(60));
        timer.cancel();
        assert!(!timer.wait().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_from_another_task() {
        let timer = ExitTimer::schedule(Duration::from_secs(60));
        let canceller = timer.canceller();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });
        assert!(!timer.wait().await);
    }
}
