//! Startup orchestration.
//!
//! # Responsibilities
//! - Build probe, trigger, notifier and audit log from configuration
//! - Spawn the notification worker, the watchdog loop and the admin server
//! - Stop them in order: loop first, then admin, then drain notifications
//!
//! # Design Decisions
//! - Fail fast: a listener that cannot bind aborts startup
//! - Collaborators can be injected so the whole service runs against fakes

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin;
use crate::config::WatchdogConfig;
use crate::health::probe::{BridgeProbe, HealthProbe};
use crate::lifecycle::Shutdown;
use crate::notify::{self, gateway_from_config, NotificationGateway};
use crate::recovery::attempt::RecoveryLog;
use crate::recovery::trigger::{RecoveryTrigger, RemoteExecutor, WorkflowDispatcher};
use crate::watchdog::{LoopSettings, WatchdogHandle, WatchdogLoop};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind admin API on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// External collaborators of the watchdog.
pub struct Components {
    pub probe: Arc<dyn HealthProbe>,
    pub executor: Arc<dyn RemoteExecutor>,
    pub gateway: Arc<dyn NotificationGateway>,
}

impl Components {
    /// Real HTTP-backed collaborators.
    pub fn from_config(config: &WatchdogConfig) -> Self {
        Self {
            probe: Arc::new(BridgeProbe::new(&config.bridge)),
            executor: Arc::new(WorkflowDispatcher::new(&config.remote_execution)),
            gateway: gateway_from_config(&config.notification),
        }
    }
}

/// A started watchdog service.
pub struct Running {
    handle: WatchdogHandle,
    admin_address: Option<SocketAddr>,
    shutdown: Shutdown,
    grace: Duration,
    watchdog: JoinHandle<()>,
    notifier: JoinHandle<()>,
    admin: Option<JoinHandle<()>>,
}

pub async fn start(config: &WatchdogConfig) -> Result<Running, StartupError> {
    start_with(config, Components::from_config(config)).await
}

pub async fn start_with(
    config: &WatchdogConfig,
    components: Components,
) -> Result<Running, StartupError> {
    let shutdown = Shutdown::new();

    let (notifier, worker) = notify::channel(&config.notification, components.gateway);
    let notifier_task = tokio::spawn(worker.run());

    let log = RecoveryLog::new(
        config.audit.history_len,
        config.audit.path.as_ref().map(PathBuf::from),
    );
    let trigger = RecoveryTrigger::from_config(
        components.executor,
        &config.watchdog,
        &config.remote_execution,
    );
    let (watchdog, handle) = WatchdogLoop::new(
        LoopSettings::from(config),
        components.probe,
        trigger,
        notifier,
        log,
    );

    let (admin_task, admin_address) = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address)
            .await
            .map_err(|source| StartupError::Bind {
                address: config.admin.bind_address.clone(),
                source,
            })?;
        let address = listener.local_addr().ok();
        let router = admin::admin_router(handle.clone(), &config.admin);
        let admin_shutdown = shutdown.subscribe();
        let task = tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, router, admin_shutdown).await {
                tracing::error!(error = %e, "Admin server failed");
            }
        });
        (Some(task), address)
    } else {
        tracing::info!("Admin API disabled");
        (None, None)
    };

    let watchdog_task = tokio::spawn(watchdog.run(shutdown.subscribe()));

    tracing::info!(
        bridge = %config.bridge.base_url,
        admin = ?admin_address,
        "Watchdog started"
    );

    Ok(Running {
        handle,
        admin_address,
        shutdown,
        grace: config.watchdog.shutdown_grace(),
        watchdog: watchdog_task,
        notifier: notifier_task,
        admin: admin_task,
    })
}

impl Running {
    pub fn handle(&self) -> &WatchdogHandle {
        &self.handle
    }

    /// Address the admin API actually bound to.
    pub fn admin_address(&self) -> Option<SocketAddr> {
        self.admin_address
    }

    /// Graceful stop. The loop gets the grace period plus a margin to finish
    /// an in-flight verification; the notification queue then drains.
    pub async fn stop(self) {
        tracing::info!("Shutting down watchdog");
        self.shutdown.trigger();

        let loop_budget = self.grace + Duration::from_secs(5);
        let mut watchdog = self.watchdog;
        if tokio::time::timeout(loop_budget, &mut watchdog).await.is_err() {
            tracing::warn!("Watchdog loop did not stop in time, aborting");
            watchdog.abort();
        }

        if let Some(admin) = self.admin {
            let _ = admin.await;
        }

        drop(self.handle);
        notify::notifier::drain(self.notifier, self.grace).await;
        tracing::info!("Shutdown complete");
    }
}
