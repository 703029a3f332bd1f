//! API types, error mapping and DTOs.

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use canvas_core::now_millis;
use canvas_ops::{CanvasOps, OpsError, ProviderInfo};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Shared application state for the API.
pub struct ApiState {
    /// The operations context.
    pub ops: CanvasOps,
}

/// Response wrapper with timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Response data.
    pub data: T,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
}

impl<T> ApiResponse<T> {
    /// Create a new API response with current timestamp.
    pub fn new(data: T) -> Self {
        Self {
            data,
            timestamp: now_millis(),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Active LLM provider, if credentials are stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderInfo>,
    /// Number of stored canvases.
    pub canvas_count: usize,
}

// =============================================================================
// Errors
// =============================================================================

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// An error ready to be turned into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                details: Vec::new(),
            },
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn unauthorized(error: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error)
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.body.details = details;
        self
    }
}

impl From<OpsError> for ApiError {
    fn from(err: OpsError) -> Self {
        let status = match &err {
            OpsError::CanvasNotFound { .. }
            | OpsError::WorkItemNotFound(_)
            | OpsError::SuggestionNotFound(_) => StatusCode::NOT_FOUND,
            OpsError::Forbidden { .. } => StatusCode::FORBIDDEN,
            OpsError::Validation { .. }
            | OpsError::Conflict(_)
            | OpsError::InvalidCredentials(_) => StatusCode::BAD_REQUEST,
            OpsError::ResponseParse(_) => StatusCode::UNPROCESSABLE_ENTITY,
            OpsError::ProviderNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            OpsError::Llm(_)
            | OpsError::Io(_)
            | OpsError::Json(_)
            | OpsError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match status {
            StatusCode::INTERNAL_SERVER_ERROR => error!(error = %err, "Request failed"),
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::SERVICE_UNAVAILABLE => {
                warn!(status = status.as_u16(), error = %err, "Request failed")
            }
            _ => debug!(status = status.as_u16(), error = %err, "Request rejected"),
        }

        match err {
            OpsError::Validation { message, details } => {
                ApiError::new(status, message).with_details(details)
            }
            other => ApiError::new(status, other.to_string()),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request("Invalid path parameter").with_details(vec![rejection.body_text()])
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request("Invalid query string").with_details(vec![rejection.body_text()])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Handler result carrying a wrapped payload.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Wrap `data` in a successful response.
pub fn respond<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::new(data)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops_errors_map_to_status_codes() {
        let cases = [
            (OpsError::not_found("x"), StatusCode::NOT_FOUND),
            (
                OpsError::Forbidden { id: "x".into() },
                StatusCode::FORBIDDEN,
            ),
            (
                OpsError::validation("bad", vec![]),
                StatusCode::BAD_REQUEST,
            ),
            (
                OpsError::ResponseParse("no marker".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                OpsError::ProviderNotConfigured,
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                OpsError::Config("broken".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[test]
    fn validation_details_are_carried_over() {
        let err = ApiError::from(OpsError::validation(
            "Invalid request",
            vec!["'title' must not be empty".into()],
        ));
        assert_eq!(err.body.error, "Invalid request");
        assert_eq!(err.body.details, vec!["'title' must not be empty".to_string()]);
    }

    #[test]
    fn empty_details_are_omitted_from_the_body() {
        let body = serde_json::to_value(ApiError::unauthorized("who are you").body).unwrap();
        assert_eq!(body, serde_json::json!({"error": "who are you"}));
    }
}
