//! Control messages between the outside world and the watchdog loop.
//!
//! The loop is the only writer of watchdog state. Everyone else holds a
//! [`WatchdogHandle`]: reads come from the published snapshot, and actions
//! are sent as commands the loop executes in order with its own probes.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::health::probe::HealthCheckResult;
use crate::health::state::StatusSnapshot;
use crate::recovery::trigger::HealDecision;

/// Commands accepted by the watchdog loop.
#[derive(Debug)]
pub enum WatchdogCommand {
    /// Run an out-of-cycle probe and report its result.
    ForceSync(oneshot::Sender<HealthCheckResult>),
    /// Heal now, ignoring the failure counter but not the cooldown.
    ForceHeal {
        reason: String,
        reply: oneshot::Sender<HealDecision>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("watchdog loop is not running")]
    Unavailable,

    #[error("watchdog did not answer within {0:?}")]
    Timeout(Duration),
}

/// Shared, cloneable access to a running watchdog.
#[derive(Clone)]
pub struct WatchdogHandle {
    snapshot: Arc<ArcSwap<StatusSnapshot>>,
    commands: mpsc::Sender<WatchdogCommand>,
    reply_timeout: Duration,
}

impl WatchdogHandle {
    pub(crate) fn new(
        snapshot: Arc<ArcSwap<StatusSnapshot>>,
        commands: mpsc::Sender<WatchdogCommand>,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            snapshot,
            commands,
            reply_timeout,
        }
    }

    /// Latest published state.
    pub fn status(&self) -> Arc<StatusSnapshot> {
        self.snapshot.load_full()
    }

    pub async fn force_sync(&self) -> Result<HealthCheckResult, CommandError> {
        let (reply, rx) = oneshot::channel();
        self.request(WatchdogCommand::ForceSync(reply), rx).await
    }

    pub async fn force_heal(&self, reason: impl Into<String>) -> Result<HealDecision, CommandError> {
        let (reply, rx) = oneshot::channel();
        let command = WatchdogCommand::ForceHeal {
            reason: reason.into(),
            reply,
        };
        self.request(command, rx).await
    }

    async fn request<T>(
        &self,
        command: WatchdogCommand,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, CommandError> {
        let exchange = async {
            self.commands
                .send(command)
                .await
                .map_err(|_| CommandError::Unavailable)?;
            rx.await.map_err(|_| CommandError::Unavailable)
        };

        match tokio::time::timeout(self.reply_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(CommandError::Timeout(self.reply_timeout)),
        }
    }
}
