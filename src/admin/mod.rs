//! Admin HTTP interface for dashboards and operators.
//!
//! # Routes
//! ```text
//! GET  /watchdog/status      → latest StatusSnapshot
//! POST /watchdog/force-sync  → out-of-cycle probe, returns HealthCheckResult
//! POST /watchdog/force-heal  → heal ignoring the counter, returns HealDecision
//! ```
//!
//! Every route sits behind bearer auth when `admin.api_key` is set.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use self::auth::require_bearer;
use self::handlers::{force_heal, force_sync, get_status};
use crate::config::AdminConfig;
use crate::watchdog::WatchdogHandle;

pub fn admin_router(handle: WatchdogHandle, config: &AdminConfig) -> Router {
    let mut router = Router::new()
        .route("/watchdog/status", get(get_status))
        .route("/watchdog/force-sync", post(force_sync))
        .route("/watchdog/force-heal", post(force_heal))
        .with_state(handle);

    if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
        let key: Arc<str> = Arc::from(key);
        router = router.layer(middleware::from_fn_with_state(key, require_bearer));
    }

    router
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(TraceLayer::new_for_http())
}

/// Serve the admin router until shutdown fires.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Admin server stopped");
    Ok(())
}
