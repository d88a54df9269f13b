//! Static bearer-token authentication middleware.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::app::AppState;
use crate::error::ApiError;

/// Reject requests whose `Authorization` header does not carry the
/// configured bearer token.
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));

    match token {
        Some(token) if token == state.auth_token => next.run(request).await,
        _ => {
            debug!("rejecting request without valid bearer token");
            ApiError::unauthorized().into_response()
        }
    }
}
