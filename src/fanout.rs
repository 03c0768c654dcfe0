//! Multicast distribution of one inbound sequence.
//!
//! A [`Fanout`] drains a single channel and republishes every value to
//! any number of independently-paced subscriber streams. Each subscriber
//! owns its own buffered queue, so a slow consumer delays only itself.
//! Registration, cancellation and the broadcast step are mutually
//! exclusive under one lock, which is never held across an await: the
//! per-subscriber queues are pushed synchronously.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures_util::Stream;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Close reason delivered to every live subscriber when the drained
/// source stops producing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("source channel has finished sending messages")]
pub struct FinishedSource;

struct RegistryInner<T> {
    subscribers: HashMap<u64, mpsc::UnboundedSender<Result<T, FinishedSource>>>,
    exhausted: bool,
}

struct Registry<T> {
    inner: Mutex<RegistryInner<T>>,
    next_id: AtomicU64,
}

/// Republishes one channel to many subscriber streams.
pub struct Fanout<T> {
    registry: Arc<Registry<T>>,
    source: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<T>>>,
    drain: Mutex<Option<DrainTask>>,
}

struct DrainTask {
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl<T: Clone + Send + 'static> Fanout<T> {
    /// Wraps a source channel. Nothing is drained until [`start`] is
    /// called.
    ///
    /// [`start`]: Fanout::start
    pub fn new(source: mpsc::UnboundedReceiver<T>) -> Self {
        Self {
            registry: Arc::new(Registry {
                inner: Mutex::new(RegistryInner {
                    subscribers: HashMap::new(),
                    exhausted: false,
                }),
                next_id: AtomicU64::new(0),
            }),
            source: Arc::new(tokio::sync::Mutex::new(source)),
            drain: Mutex::new(None),
        }
    }

    /// Begins draining the source. Idempotent while a drain task is
    /// alive.
    pub fn start(&self) {
        let mut drain = self.drain.lock().unwrap();
        if drain.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            return;
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(drain_source(
            self.registry.clone(),
            self.source.clone(),
            cancel.clone(),
        ));
        *drain = Some(DrainTask { cancel, handle });
    }

    /// True while the drain task is running.
    pub fn is_running(&self) -> bool {
        self.drain
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Stops draining. Registered subscribers stay registered; a later
    /// [`start`] resumes delivery to them.
    ///
    /// [`start`]: Fanout::start
    pub fn stop(&self) {
        if let Some(task) = self.drain.lock().unwrap().take() {
            task.cancel.cancel();
        }
    }

    /// Throws away values already queued in the source while the fanout
    /// is stopped. A running drain task delivers promptly, so there is
    /// nothing stale to discard then and this is a no-op.
    pub async fn discard_backlog(&self) {
        if self.is_running() {
            return;
        }
        let mut source = self.source.lock().await;
        while source.try_recv().is_ok() {}
    }

    /// Forcibly removes every registered subscriber without touching the
    /// source. Their streams end without a close reason.
    pub fn clear(&self) {
        self.registry.inner.lock().unwrap().subscribers.clear();
    }

    /// Registers a new subscriber stream.
    ///
    /// The stream sees every value drained after this call, in drain
    /// order. If the source is already exhausted the stream is closed
    /// immediately, carrying [`FinishedSource`].
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut inner = self.registry.inner.lock().unwrap();
            if inner.exhausted {
                let _ = tx.send(Err(FinishedSource));
            } else {
                inner.subscribers.insert(id, tx);
            }
        }
        Subscription {
            id,
            registry: self.registry.clone(),
            rx,
            reason: None,
            done: false,
        }
    }
}

async fn drain_source<T: Clone>(
    registry: Arc<Registry<T>>,
    source: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<T>>>,
    cancel: CancellationToken,
) {
    let mut source = source.lock().await;
    loop {
        // Biased so a stop wins over a value that arrived after it.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            value = source.recv() => match value {
                Some(value) => {
                    let inner = registry.inner.lock().unwrap();
                    for tx in inner.subscribers.values() {
                        let _ = tx.send(Ok(value.clone()));
                    }
                }
                None => {
                    trace!("fanout source exhausted");
                    let mut inner = registry.inner.lock().unwrap();
                    inner.exhausted = true;
                    for (_, tx) in inner.subscribers.drain() {
                        let _ = tx.send(Err(FinishedSource));
                    }
                    return;
                }
            }
        }
    }
}

/// One consumer's view of the fanned-out sequence.
///
/// Yields values in drain order; ends when the subscription is
/// cancelled, the registry is cleared, or the source is exhausted (in
/// which case [`close_reason`] is set). Dropping the subscription
/// cancels it, which is safe concurrently with an in-flight broadcast
/// and does not affect other subscribers.
///
/// [`close_reason`]: Subscription::close_reason
pub struct Subscription<T> {
    id: u64,
    registry: Arc<Registry<T>>,
    rx: mpsc::UnboundedReceiver<Result<T, FinishedSource>>,
    reason: Option<FinishedSource>,
    done: bool,
}

impl<T> Subscription<T> {
    /// Deregisters this subscriber. Safe to call repeatedly or after the
    /// stream already ended.
    pub fn cancel(&mut self) {
        self.registry.inner.lock().unwrap().subscribers.remove(&self.id);
        self.rx.close();
        self.done = true;
    }

    /// Why the stream ended, if the source finished while this
    /// subscription was live.
    pub fn close_reason(&self) -> Option<FinishedSource> {
        self.reason
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.registry.inner.lock().unwrap().subscribers.remove(&self.id);
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(value))) => Poll::Ready(Some(value)),
            Poll::Ready(Some(Err(reason))) => {
                this.reason = Some(reason);
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_two_subscribers_see_every_value_in_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        let fanout = Fanout::new(rx);
        let mut a = fanout.subscribe();
        let mut b = fanout.subscribe();
        fanout.start();

        for i in 0..3 {
            tx.send(i).unwrap();
        }

        for i in 0..3 {
            assert_eq!(a.next().await, Some(i));
        }
        for i in 0..3 {
            assert_eq!(b.next().await, Some(i));
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_history() {
        let (tx, rx) = mpsc::unbounded_channel();
        let fanout = Fanout::new(rx);
        let mut early = fanout.subscribe();
        fanout.start();

        tx.send(1).unwrap();
        tx.send(2).unwrap();
        // Draining 1 and 2 has happened once `early` observed both.
        assert_eq!(early.next().await, Some(1));
        assert_eq!(early.next().await, Some(2));

        let mut late = fanout.subscribe();
        tx.send(3).unwrap();
        assert_eq!(late.next().await, Some(3));
        assert_eq!(early.next().await, Some(3));
    }

    #[tokio::test]
    async fn test_cancel_leaves_other_subscribers_alone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let fanout = Fanout::new(rx);
        let mut kept = fanout.subscribe();
        let mut cancelled = fanout.subscribe();
        fanout.start();

        tx.send(1).unwrap();
        assert_eq!(kept.next().await, Some(1));
        assert_eq!(cancelled.next().await, Some(1));

        cancelled.cancel();
        cancelled.cancel(); // repeat is fine

        tx.send(2).unwrap();
        assert_eq!(kept.next().await, Some(2));
        assert_eq!(cancelled.next().await, None);
    }

    #[tokio::test]
    async fn test_exhausted_source_closes_subscribers_with_reason() {
        let (tx, rx) = mpsc::unbounded_channel::<u32>();
        let fanout = Fanout::new(rx);
        let mut sub = fanout.subscribe();
        fanout.start();

        drop(tx);
        assert_eq!(sub.next().await, None);
        assert_eq!(sub.close_reason(), Some(FinishedSource));

        // Subscribing after exhaustion yields an immediately closed stream.
        let mut after = fanout.subscribe();
        assert_eq!(after.next().await, None);
        assert_eq!(after.close_reason(), Some(FinishedSource));
    }

    #[tokio::test]
    async fn test_stop_pauses_and_start_resumes() {
        let (tx, rx) = mpsc::unbounded_channel();
        let fanout = Fanout::new(rx);
        let mut sub = fanout.subscribe();

        fanout.start();
        tx.send(1).unwrap();
        assert_eq!(sub.next().await, Some(1));

        fanout.stop();
        tx.send(2).unwrap();

        fanout.start();
        assert!(fanout.is_running());
        assert_eq!(sub.next().await, Some(2));
    }

    #[tokio::test]
    async fn test_discard_backlog_drops_values_queued_while_stopped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let fanout = Fanout::new(rx);
        let mut sub = fanout.subscribe();
        fanout.start();

        tx.send(1).unwrap();
        assert_eq!(sub.next().await, Some(1));

        fanout.stop();
        tx.send(2).unwrap();
        fanout.discard_backlog().await;

        fanout.start();
        tx.send(3).unwrap();
        assert_eq!(sub.next().await, Some(3));
    }

    #[tokio::test]
    async fn test_clear_ends_streams_without_reason() {
        let (tx, rx) = mpsc::unbounded_channel::<u32>();
        let fanout = Fanout::new(rx);
        let mut sub = fanout.subscribe();
        fanout.start();

        fanout.clear();
        drop(tx); // let the drain task end too
        assert_eq!(sub.next().await, None);
        assert_eq!(sub.close_reason(), None);
    }
}
