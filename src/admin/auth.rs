use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};

/// Reject requests that do not carry `Authorization: Bearer <api_key>`.
pub async fn require_bearer(
    State(api_key): State<Arc<str>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == &*api_key);

    if !authorized {
        tracing::warn!(path = %request.uri().path(), "Rejected admin request without valid token");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(request).await)
}
