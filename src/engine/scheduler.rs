//! Cancellable deferred delivery, used for CPU "thinking" time.
//!
//! A scheduled payload is posted back to the owning event loop after a delay,
//! tagged with the generation it was scheduled under. Cancelling aborts the
//! timer and bumps the generation, so a payload that was already in flight
//! fails [`Deferred::accept`] and is never applied.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A payload that survived its delay.
#[derive(Debug)]
pub struct Fired<T> {
    pub generation: u64,
    pub payload: T,
}

pub struct Deferred<T> {
    generation: u64,
    pending: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<Fired<T>>,
}

impl<T: Send + 'static> Deferred<T> {
    /// New scheduler plus the receiver the owning loop should poll.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Fired<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { generation: 0, pending: None, tx }, rx)
    }

    /// Schedule `payload` for delivery after `delay`, cancelling anything
    /// scheduled before. Must be called inside a tokio runtime.
    pub fn schedule(&mut self, delay: Duration, payload: T) {
        self.cancel();
        let generation = self.generation;
        let tx = self.tx.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the loop shut down.
            let _ = tx.send(Fired { generation, payload });
        }));
    }

    /// Drop whatever is pending. Safe to call when nothing is.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.generation += 1;
    }

    /// Scheduled and neither accepted nor cancelled yet.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether a fired payload is current. Consumes the pending slot on success.
    pub fn accept(&mut self, fired: &Fired<T>) -> bool {
        if fired.generation != self.generation {
            tracing::debug!(fired = fired.generation, current = self.generation, "stale deferred payload dropped");
            return false;
        }
        self.pending = None;
        self.generation += 1;
        true
    }
}

impl<T> Drop for Deferred<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fires_after_delay() {
        let (mut d, mut rx) = Deferred::channel();
        d.schedule(Duration::from_millis(10), "move");
        assert!(d.is_pending());
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.payload, "move");
        assert!(d.accept(&fired));
        // Accepting twice is impossible.
        assert!(!d.accept(&fired));
    }

    #[tokio::test]
    async fn cancelled_payload_never_arrives() {
        let (mut d, mut rx) = Deferred::channel();
        d.schedule(Duration::from_millis(20), 1u8);
        d.cancel();
        let waited = tokio::time::timeout(Duration::from_millis(80), rx.recv()).await;
        assert!(waited.is_err(), "nothing should be delivered");
        assert!(!d.is_pending());
    }

    #[tokio::test]
    async fn payload_in_flight_during_cancel_is_rejected() {
        let (mut d, mut rx) = Deferred::channel();
        d.schedule(Duration::from_millis(1), 7u8);
        tokio::time::sleep(Duration::from_millis(30)).await;
        // Already sitting in the channel; cancel must still win.
        d.cancel();
        let fired = rx.recv().await.unwrap();
        assert!(!d.accept(&fired));
    }

    #[tokio::test]
    async fn rescheduling_replaces_the_pending_payload() {
        let (mut d, mut rx) = Deferred::channel();
        d.schedule(Duration::from_millis(40), "old");
        d.schedule(Duration::from_millis(5), "new");
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.payload, "new");
        assert!(d.accept(&fired));
        let late = tokio::time::timeout(Duration::from_millis(80), rx.recv()).await;
        assert!(late.is_err());
    }
}
