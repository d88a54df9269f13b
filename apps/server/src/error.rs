//! REST error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use siteagent_shared::SiteAgentError;

/// An API-facing error: a status code plus a client-readable message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    /// A 400 with the given message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// A 401 with the canonical body.
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Unauthorized".into(),
        }
    }
}

impl From<SiteAgentError> for ApiError {
    fn from(err: SiteAgentError) -> Self {
        let status = match &err {
            // Bad input or unusable upstream content is the caller's 400;
            // everything else is on us
            SiteAgentError::Validation { .. } | SiteAgentError::Parse { .. } => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, message = %self.message, "request failed");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let api: ApiError = SiteAgentError::validation("failed to fetch the website").into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn parse_maps_to_400() {
        let api: ApiError = SiteAgentError::parse("model output was not JSON").into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_errors_map_to_500() {
        let api: ApiError = SiteAgentError::Completion("boom".into()).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);

        let api: ApiError = SiteAgentError::Storage("db gone".into()).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
