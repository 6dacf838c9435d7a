//! Recovery attempt records and the audit trail.
//!
//! A [`PendingAttempt`] exists while a heal is in flight. Finalizing it
//! consumes it and yields a [`RecoveryAttempt`], which has no mutators.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// How a recovery attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Verification found the bridge healthy again.
    Recovered,
    /// Verification found the bridge still unhealthy.
    StillUnhealthy,
    /// The restart hook itself could not be reached.
    DispatchFailed { error: String },
}

/// A heal that has been dispatched but not yet judged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingAttempt {
    pub id: Uuid,
    pub triggered_at: DateTime<Utc>,
    pub method: String,
    pub reason: String,
    /// Started through `force-heal` rather than the failure counter.
    pub forced: bool,
}

impl PendingAttempt {
    pub fn new(triggered_at: DateTime<Utc>, method: &str, reason: &str, forced: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            triggered_at,
            method: method.to_string(),
            reason: reason.to_string(),
            forced,
        }
    }

    /// Close the attempt with a verdict.
    ///
    /// Downtime runs from the start of the outage (or the trigger time when
    /// no outage was being tracked) to `finished_at`.
    pub fn finalize(
        self,
        outcome: AttemptOutcome,
        finished_at: DateTime<Utc>,
        outage_started_at: Option<DateTime<Utc>>,
    ) -> RecoveryAttempt {
        let since = outage_started_at
            .unwrap_or(self.triggered_at)
            .min(self.triggered_at);
        let downtime_secs = (finished_at - since).num_seconds().max(0) as u64;

        RecoveryAttempt {
            id: self.id,
            triggered_at: self.triggered_at,
            finished_at,
            method: self.method,
            reason: self.reason,
            forced: self.forced,
            succeeded: outcome == AttemptOutcome::Recovered,
            outcome,
            downtime_secs,
        }
    }
}

/// A finalized recovery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub id: Uuid,
    pub triggered_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub method: String,
    pub reason: String,
    pub forced: bool,
    pub succeeded: bool,
    pub outcome: AttemptOutcome,
    pub downtime_secs: u64,
}

impl RecoveryAttempt {
    pub fn downtime(&self) -> Duration {
        Duration::from_secs(self.downtime_secs)
    }
}

/// Append-only record of finished attempts.
///
/// Keeps the most recent attempts in memory and, when a path is set, hands
/// each one to a background writer that appends it as a JSON line. Write
/// failures are logged and never returned.
#[derive(Debug)]
pub struct RecoveryLog {
    recent: VecDeque<RecoveryAttempt>,
    capacity: usize,
    writer: Option<mpsc::UnboundedSender<AuditCommand>>,
    total: u64,
    succeeded: u64,
}

#[derive(Debug)]
enum AuditCommand {
    Record(RecoveryAttempt),
    Flush(oneshot::Sender<()>),
}

impl RecoveryLog {
    /// The audit writer needs a tokio runtime; without one the file is
    /// disabled and only the in-memory history is kept.
    pub fn new(capacity: usize, path: Option<PathBuf>) -> Self {
        let writer = path.and_then(|path| match Handle::try_current() {
            Ok(runtime) => {
                let (tx, rx) = mpsc::unbounded_channel();
                runtime.spawn(run_audit_writer(path, rx));
                Some(tx)
            }
            Err(_) => {
                tracing::error!(path = ?path, "No async runtime; recovery audit file disabled");
                None
            }
        });

        Self {
            recent: VecDeque::with_capacity(capacity),
            capacity,
            writer,
            total: 0,
            succeeded: 0,
        }
    }

    pub fn append(&mut self, attempt: RecoveryAttempt) {
        if let Some(writer) = &self.writer {
            if writer.send(AuditCommand::Record(attempt.clone())).is_err() {
                tracing::error!(attempt_id = %attempt.id, "Audit writer stopped; recovery attempt not persisted");
            }
        }

        self.total += 1;
        if attempt.succeeded {
            self.succeeded += 1;
        }

        if self.capacity == 0 {
            return;
        }
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(attempt);
    }

    /// Wait until every attempt appended so far has been written.
    pub async fn flush(&self) {
        let Some(writer) = &self.writer else {
            return;
        };
        let (tx, rx) = oneshot::channel();
        if writer.send(AuditCommand::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Most recent attempts, oldest first.
    pub fn recent(&self) -> Vec<RecoveryAttempt> {
        self.recent.iter().cloned().collect()
    }

    pub fn last(&self) -> Option<&RecoveryAttempt> {
        self.recent.back()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded
    }
}

async fn run_audit_writer(path: PathBuf, mut rx: mpsc::UnboundedReceiver<AuditCommand>) {
    // Opened lazily; dropped after a failed write so the next record reopens it.
    let mut file: Option<File> = None;

    while let Some(command) = rx.recv().await {
        match command {
            AuditCommand::Record(attempt) => match write_line(&path, file.take(), &attempt).await {
                Ok(handle) => file = Some(handle),
                Err(e) => {
                    tracing::error!(path = ?path, attempt_id = %attempt.id, error = %e, "Failed to persist recovery attempt");
                }
            },
            AuditCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn write_line(
    path: &PathBuf,
    file: Option<File>,
    attempt: &RecoveryAttempt,
) -> std::io::Result<File> {
    let mut line = serde_json::to_string(attempt)?;
    line.push('\n');

    let mut file = match file {
        Some(file) => file,
        None => OpenOptions::new().create(true).append(true).open(path).await?,
    };
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(file)
}
