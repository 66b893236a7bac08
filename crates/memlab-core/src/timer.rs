//! Exposure timer.
//!
//! Each [`ExposureTimer::arm`] spawns one sleeping task that delivers a
//! single message on the driver's event channel. Cancelling aborts the task.
//! A message that was already queued when the timer was cancelled still
//! reaches the channel; the state machine drops it because its ticket no
//! longer matches.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Delivers one message after a delay, unless cancelled first.
pub struct ExposureTimer<T: Send + 'static> {
    tx: UnboundedSender<T>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> ExposureTimer<T> {
    pub fn new(tx: UnboundedSender<T>) -> Self {
        Self { tx, pending: None }
    }

    /// Schedule `message` to be sent after `duration`.
    ///
    /// Re-arming replaces any pending expiry. `duration` must be positive.
    pub fn arm(&mut self, duration: Duration, message: T) {
        debug_assert!(!duration.is_zero(), "exposure duration must be positive");
        self.cancel();

        let tx = self.tx.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // The receiver is gone only when the driver was dropped.
            let _ = tx.send(message);
        }));
    }

    /// Suppress the pending expiry. Returns `true` if one was armed.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    /// `true` while an expiry is scheduled and has not yet fired.
    pub fn is_armed(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<T: Send + 'static> Drop for ExposureTimer<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::error::TryRecvError;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = ExposureTimer::new(tx);

        timer.arm(Duration::from_millis(1500), "elapsed");
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_millis(1499)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        assert_eq!(rx.recv().await, Some("elapsed"));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_expiry_suppresses() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = ExposureTimer::new(tx);

        timer.arm(Duration::from_millis(500), 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(timer.cancel());
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert!(!timer.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_replaces_pending_expiry() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = ExposureTimer::new(tx);

        timer.arm(Duration::from_millis(300), "first");
        timer.arm(Duration::from_millis(800), "second");

        assert_eq!(rx.recv().await, Some("second"));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_after_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = ExposureTimer::new(tx);

        timer.arm(Duration::from_millis(300), "cancelled");
        timer.cancel();
        timer.arm(Duration::from_millis(300), "rearmed");

        assert_eq!(rx.recv().await, Some("rearmed"));
    }
}
