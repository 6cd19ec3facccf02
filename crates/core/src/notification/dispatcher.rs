//! Background delivery of notifications.
//!
//! Ledger operations enqueue after their commit and return immediately. A
//! single worker task drains the queue in order and writes each notification
//! through the store, retrying with linear backoff. A delivery that keeps
//! failing is logged and dropped; it never affects the committed ledger change.

use std::sync::Arc;
use std::time::Duration;

use ledgerdesk_shared::config::NotificationConfig;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::types::Notification;
use crate::store::LedgerStore;

enum Job {
    Deliver(Notification),
    Flush(oneshot::Sender<()>),
}

/// Handle used to queue notifications for the worker.
///
/// Cloning is cheap; the worker stops once every handle is dropped and the
/// queue is drained.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<Job>,
}

impl NotificationDispatcher {
    /// Starts the worker on the current runtime.
    pub fn spawn(
        store: Arc<dyn LedgerStore>,
        config: &NotificationConfig,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let worker = Worker {
            store,
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        };
        let handle = tokio::spawn(worker.run(receiver));
        (Self { sender }, handle)
    }

    /// Queues a notification without waiting.
    ///
    /// Returns false if the queue is full or the worker has stopped; the
    /// notification is then dropped and a warning logged.
    pub fn enqueue(&self, notification: Notification) -> bool {
        let kind = notification.kind;
        match self.sender.try_send(Job::Deliver(notification)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(kind = %kind, "Notification queue full, dropping notification");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(kind = %kind, "Notification worker stopped, dropping notification");
                false
            }
        }
    }

    /// Waits until every notification queued before this call was handled.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Job::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }
}

struct Worker {
    store: Arc<dyn LedgerStore>,
    max_attempts: u32,
    backoff: Duration,
}

impl Worker {
    async fn run(self, mut receiver: mpsc::Receiver<Job>) {
        while let Some(job) = receiver.recv().await {
            match job {
                Job::Deliver(notification) => self.deliver(notification).await,
                Job::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("Notification worker stopped");
    }

    async fn deliver(&self, notification: Notification) {
        let id = notification.id;
        let kind = notification.kind;

        for attempt in 1..=self.max_attempts {
            match self.store.insert_notification(notification.clone()).await {
                Ok(()) => {
                    debug!(notification_id = %id, kind = %kind, attempt, "Notification delivered");
                    return;
                }
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        error = %e,
                        notification_id = %id,
                        attempt,
                        "Notification delivery failed, retrying"
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        notification_id = %id,
                        kind = %kind,
                        attempts = attempt,
                        "Giving up on notification delivery"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::FlakyStore;
    use ledgerdesk_shared::types::UserId;
    use rust_decimal_macros::dec;

    fn config(max_attempts: u32) -> NotificationConfig {
        NotificationConfig {
            queue_capacity: 16,
            max_attempts,
            retry_backoff_ms: 1,
        }
    }

    fn note() -> Notification {
        Notification::deposit_credit(UserId::parse("u1").unwrap(), dec!(10))
    }

    #[tokio::test]
    async fn test_flush_waits_for_delivery() {
        let store = Arc::new(MemoryStore::new());
        let (dispatcher, _handle) = NotificationDispatcher::spawn(store.clone(), &config(3));

        assert!(dispatcher.enqueue(note()));
        assert!(dispatcher.enqueue(note()));
        dispatcher.flush().await;

        assert_eq!(store.notifications().await.len(), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let store = Arc::new(FlakyStore::new());
        store.fail_next_notifications(2);
        let (dispatcher, _handle) = NotificationDispatcher::spawn(store.clone(), &config(3));

        dispatcher.enqueue(note());
        dispatcher.flush().await;

        assert_eq!(store.inner().notifications().await.len(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let store = Arc::new(FlakyStore::new());
        store.fail_next_notifications(5);
        let (dispatcher, _handle) = NotificationDispatcher::spawn(store.clone(), &config(2));

        dispatcher.enqueue(note());
        dispatcher.enqueue(note());
        dispatcher.flush().await;

        // First exhausts both attempts, second hits the remaining failures too.
        assert!(store.inner().notifications().await.is_empty());
    }

    #[tokio::test]
    async fn test_worker_stops_when_handles_dropped() {
        let store = Arc::new(MemoryStore::new());
        let (dispatcher, handle) = NotificationDispatcher::spawn(store.clone(), &config(1));
        dispatcher.enqueue(note());
        drop(dispatcher);

        handle.await.unwrap();
        assert_eq!(store.notifications().await.len(), 1);
    }
}
