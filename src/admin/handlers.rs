use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::health::probe::HealthCheckResult;
use crate::health::state::StatusSnapshot;
use crate::recovery::trigger::HealDecision;
use crate::watchdog::{CommandError, WatchdogHandle};

const DEFAULT_HEAL_REASON: &str = "manual heal requested via admin API";

#[derive(Debug, Default, Deserialize)]
pub struct ForceHealRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Command failures mapped onto HTTP.
#[derive(Debug)]
pub enum AdminError {
    Command(CommandError),
    BadRequest(String),
}

impl From<CommandError> for AdminError {
    fn from(e: CommandError) -> Self {
        AdminError::Command(e)
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AdminError::Command(e @ CommandError::Unavailable) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            AdminError::Command(e @ CommandError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, e.to_string())
            }
            AdminError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub async fn get_status(State(handle): State<WatchdogHandle>) -> Json<StatusSnapshot> {
    Json(StatusSnapshot::clone(&handle.status()))
}

pub async fn force_sync(
    State(handle): State<WatchdogHandle>,
) -> Result<Json<HealthCheckResult>, AdminError> {
    let result = handle.force_sync().await?;
    Ok(Json(result))
}

/// Body is optional; an empty body uses the default reason.
pub async fn force_heal(
    State(handle): State<WatchdogHandle>,
    body: Bytes,
) -> Result<Json<HealDecision>, AdminError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ForceHealRequest::default()
    } else {
        serde_json::from_slice::<ForceHealRequest>(&body)
            .map_err(|e| AdminError::BadRequest(format!("invalid force-heal body: {e}")))?
    };

    let reason = request
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_HEAL_REASON.to_string());

    let decision = handle.force_heal(reason).await?;
    Ok(Json(decision))
}
