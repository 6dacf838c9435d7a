//! Best-effort operator notification.
//!
//! `Notifier` is a cheap handle that queues messages without waiting;
//! `NotifierWorker` drains the queue on its own task and retries each
//! message with backoff. A broken gateway costs log lines, nothing more.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::config::NotificationConfig;
use crate::health::state::StatusSnapshot;
use crate::notify::gateway::NotificationGateway;
use crate::notify::message::Notification;
use crate::observability::metrics;
use crate::recovery::attempt::RecoveryAttempt;
use crate::resilience::Backoff;

/// Create a notifier handle and the worker that serves it.
pub fn channel(
    config: &NotificationConfig,
    gateway: Arc<dyn NotificationGateway>,
) -> (Notifier, NotifierWorker) {
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    (
        Notifier {
            tx,
            recipient: config.recipient.clone(),
        },
        NotifierWorker {
            rx,
            gateway,
            backoff: Backoff::from(config),
            max_attempts: config.max_attempts.max(1),
        },
    )
}

#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Notification>,
    recipient: String,
}

impl Notifier {
    pub fn notify_success(&self, attempt: &RecoveryAttempt, snapshot: &StatusSnapshot) {
        self.enqueue(Notification::recovered(&self.recipient, attempt, snapshot));
    }

    pub fn notify_critical(&self, attempt: &RecoveryAttempt, snapshot: &StatusSnapshot) {
        self.enqueue(Notification::unrecovered(&self.recipient, attempt, snapshot));
    }

    pub fn notify_dispatch_failing(&self, attempt: &RecoveryAttempt, snapshot: &StatusSnapshot) {
        self.enqueue(Notification::dispatch_failing(&self.recipient, attempt, snapshot));
    }

    fn enqueue(&self, notification: Notification) {
        let kind = notification.kind.as_str();
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(subject = %dropped.subject, "Notification queue full, dropping message");
                metrics::record_notification(kind, "dropped");
            }
            Err(TrySendError::Closed(dropped)) => {
                tracing::warn!(subject = %dropped.subject, "Notification worker stopped, dropping message");
                metrics::record_notification(kind, "dropped");
            }
        }
    }
}

pub struct NotifierWorker {
    rx: mpsc::Receiver<Notification>,
    gateway: Arc<dyn NotificationGateway>,
    backoff: Backoff,
    max_attempts: u32,
}

impl NotifierWorker {
    /// Deliver queued messages until every `Notifier` handle is dropped.
    pub async fn run(mut self) {
        tracing::debug!("Notification worker started");
        while let Some(notification) = self.rx.recv().await {
            self.deliver(notification).await;
        }
        tracing::debug!("Notification worker stopped");
    }

    async fn deliver(&self, notification: Notification) {
        let kind = notification.kind.as_str();
        for attempt in 1..=self.max_attempts {
            match self.gateway.send(&notification).await {
                Ok(()) => {
                    tracing::info!(subject = %notification.subject, attempt, "Notification sent");
                    metrics::record_notification(kind, "sent");
                    return;
                }
                Err(e) if attempt < self.max_attempts => {
                    let delay = self.backoff.delay(attempt);
                    tracing::warn!(
                        subject = %notification.subject,
                        attempt,
                        delay = ?delay,
                        error = %e,
                        "Notification failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        subject = %notification.subject,
                        attempts = self.max_attempts,
                        error = %e,
                        "Notification failed, giving up"
                    );
                }
            }
        }
        metrics::record_notification(kind, "failed");
    }
}

/// Wait for the worker to flush, bounded by `grace`.
pub async fn drain(worker: tokio::task::JoinHandle<()>, grace: Duration) {
    if tokio::time::timeout(grace, worker).await.is_err() {
        tracing::warn!(grace = ?grace, "Notification worker did not drain in time");
    }
}
