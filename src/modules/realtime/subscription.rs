//! Live snapshot subscriptions
//!
//! A [`Subscription`] owns one background task that loads a complete, ordered
//! snapshot, delivers it, then waits on the change feed for a relevant event
//! and repeats. Snapshots are delivered whole, never as deltas.
//!
//! Lifecycle: the subscription is acquired by the view that consumes it and
//! released when that view goes away. `cancel()` and `Drop` both stop the
//! task; nothing is delivered after cancellation.
use futures_util::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::feed::ChangeEvent;
use crate::api::error;

#[derive(Debug, Clone)]
pub struct SubscriptionSettings {
    /// Snapshots buffered for a slow consumer before the loader waits
    pub buffer: usize,
    /// Reload attempts after a transient store failure before giving up
    pub max_retries: u32,
    /// Delay before the first retry; grows linearly with each attempt
    pub retry_backoff: Duration,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self { buffer: 16, max_retries: 3, retry_backoff: Duration::from_millis(250) }
    }
}

#[derive(Debug)]
pub enum SubscriptionEvent<T> {
    /// Full current state, already ordered
    Snapshot(Vec<T>),
    /// Terminal failure. Delivered once; the subscription ends afterwards.
    Failed(error::SystemError),
}

pub struct Subscription<T> {
    rx: mpsc::Receiver<SubscriptionEvent<T>>,
    task: JoinHandle<()>,
}

impl<T> Subscription<T> {
    /// Wait for the next delivery. `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<SubscriptionEvent<T>> {
        self.rx.recv().await
    }

    /// Stop the subscription and discard anything not yet delivered.
    pub fn cancel(&mut self) {
        self.task.abort();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = SubscriptionEvent<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Start a snapshot subscription.
///
/// `changes` must be taken from the hub before anything is loaded so that a
/// write racing with the first load still triggers a reload.
pub fn spawn_snapshot<T, L, Fut, R>(
    mut changes: broadcast::Receiver<ChangeEvent>,
    settings: SubscriptionSettings,
    is_relevant: R,
    load: L,
) -> Subscription<T>
where
    T: Clone + PartialEq + Send + 'static,
    L: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>, error::SystemError>> + Send,
    R: Fn(&ChangeEvent) -> bool + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel(settings.buffer.max(1));

    let task = tokio::spawn(async move {
        let mut last: Option<Vec<T>> = None;

        loop {
            match load_with_retry(&load, &settings).await {
                Ok(snapshot) => {
                    if last.as_ref() != Some(&snapshot) {
                        if tx.send(SubscriptionEvent::Snapshot(snapshot.clone())).await.is_err() {
                            return;
                        }
                        last = Some(snapshot);
                    }
                }
                Err(e) => {
                    tracing::warn!("Subscription ended: {}", e);
                    let _ = tx.send(SubscriptionEvent::Failed(e)).await;
                    return;
                }
            }

            if let Err(e) = wait_for_change(&mut changes, &is_relevant, &tx).await {
                tracing::warn!("Subscription ended: {}", e);
                let _ = tx.send(SubscriptionEvent::Failed(e)).await;
                return;
            }

            if tx.is_closed() {
                return;
            }
        }
    });

    Subscription { rx, task }
}

async fn load_with_retry<T, L, Fut>(
    load: &L,
    settings: &SubscriptionSettings,
) -> Result<Vec<T>, error::SystemError>
where
    L: Fn() -> Fut,
    Fut: Future<Output = Result<Vec<T>, error::SystemError>>,
{
    let mut attempt = 0;
    loop {
        match load().await {
            Ok(snapshot) => return Ok(snapshot),
            Err(e) if e.is_transient() && attempt < settings.max_retries => {
                attempt += 1;
                tracing::debug!("Snapshot load failed ({}), retry {}", e, attempt);
                tokio::time::sleep(settings.retry_backoff * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Block until a relevant change arrives, then drain whatever else is queued
/// so a burst of writes costs a single reload.
async fn wait_for_change<T, R>(
    changes: &mut broadcast::Receiver<ChangeEvent>,
    is_relevant: &R,
    tx: &mpsc::Sender<SubscriptionEvent<T>>,
) -> Result<(), error::SystemError>
where
    R: Fn(&ChangeEvent) -> bool,
{
    loop {
        tokio::select! {
            received = changes.recv() => match received {
                Ok(event) if is_relevant(&event) => break,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Subscription lagged by {} events, resyncing", skipped);
                    break;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(error::SystemError::store_unavailable("Change feed closed"));
                }
            },
            _ = tx.closed() => return Ok(()),
        }
    }

    loop {
        match changes.try_recv() {
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(broadcast::error::TryRecvError::Empty) => return Ok(()),
            Err(broadcast::error::TryRecvError::Closed) => {
                return Err(error::SystemError::store_unavailable("Change feed closed"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::realtime::feed::ChangeHub;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::timeout;

    fn fast_settings() -> SubscriptionSettings {
        SubscriptionSettings { buffer: 4, max_retries: 2, retry_backoff: Duration::from_millis(1) }
    }

    async fn expect_snapshot<T: std::fmt::Debug>(sub: &mut Subscription<T>) -> Vec<T> {
        match timeout(Duration::from_secs(2), sub.next()).await {
            Ok(Some(SubscriptionEvent::Snapshot(items))) => items,
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_initial_snapshot_then_reload_on_change() {
        let hub = ChangeHub::new(16);
        let state = Arc::new(Mutex::new(vec![1]));

        let loader_state = state.clone();
        let mut sub = spawn_snapshot(hub.subscribe(), fast_settings(), |_| true, move || {
            let items = loader_state.lock().unwrap().clone();
            async move { Ok::<_, error::SystemError>(items) }
        });

        assert_eq!(expect_snapshot(&mut sub).await, vec![1]);

        state.lock().unwrap().push(2);
        hub.publish(ChangeEvent::Resync);

        assert_eq!(expect_snapshot(&mut sub).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_irrelevant_and_identical_changes_are_not_delivered() {
        let hub = ChangeHub::new(16);
        let mut sub = spawn_snapshot(
            hub.subscribe(),
            fast_settings(),
            |event| matches!(event, ChangeEvent::Resync),
            || async { Ok::<_, error::SystemError>(vec!["same"]) },
        );

        assert_eq!(expect_snapshot(&mut sub).await, vec!["same"]);

        hub.publish(ChangeEvent::Message { conversation_id: uuid::Uuid::now_v7() });
        hub.publish(ChangeEvent::Resync);

        assert!(timeout(Duration::from_millis(100), sub.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let hub = ChangeHub::new(16);
        let calls = Arc::new(AtomicU32::new(0));

        let loader_calls = calls.clone();
        let mut sub = spawn_snapshot(hub.subscribe(), fast_settings(), |_| true, move || {
            let n = loader_calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(error::SystemError::store_unavailable("connection reset"))
                } else {
                    Ok(vec![n])
                }
            }
        });

        assert_eq!(expect_snapshot(&mut sub).await, vec![2]);
    }

    #[tokio::test]
    async fn test_terminal_failure_is_delivered_once() {
        let hub = ChangeHub::new(16);
        let mut sub = spawn_snapshot(hub.subscribe(), fast_settings(), |_| true, || async {
            Err::<Vec<u8>, _>(error::SystemError::store_unavailable("down for good"))
        });

        match timeout(Duration::from_secs(2), sub.next()).await {
            Ok(Some(SubscriptionEvent::Failed(e))) => assert!(e.is_transient()),
            other => panic!("expected failure, got {:?}", other),
        }

        hub.publish(ChangeEvent::Resync);
        assert!(timeout(Duration::from_secs(2), sub.next()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_closed_feed_fails_the_subscription() {
        let hub = ChangeHub::new(16);
        let changes = hub.subscribe();
        let mut sub = spawn_snapshot(changes, fast_settings(), |_| true, || async {
            Ok::<_, error::SystemError>(vec![1])
        });

        assert_eq!(expect_snapshot(&mut sub).await, vec![1]);
        drop(hub);

        match timeout(Duration::from_secs(2), sub.next()).await {
            Ok(Some(SubscriptionEvent::Failed(e))) => assert!(e.is_transient()),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_stops_deliveries() {
        let hub = ChangeHub::new(16);
        let state = Arc::new(Mutex::new(vec![1]));

        let loader_state = state.clone();
        let mut sub = spawn_snapshot(hub.subscribe(), fast_settings(), |_| true, move || {
            let items = loader_state.lock().unwrap().clone();
            async move { Ok::<_, error::SystemError>(items) }
        });
        expect_snapshot(&mut sub).await;

        sub.cancel();
        state.lock().unwrap().push(2);
        hub.publish(ChangeEvent::Resync);

        assert!(timeout(Duration::from_secs(1), sub.next()).await.unwrap().is_none());
    }
}
