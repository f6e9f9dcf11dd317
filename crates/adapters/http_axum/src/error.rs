//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use homelink_domain::error::{CommandError, HomeLinkError, ValidationError};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`HomeLinkError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(HomeLinkError);

impl From<HomeLinkError> for ApiError {
    fn from(err: HomeLinkError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            HomeLinkError::Validation(_) => StatusCode::BAD_REQUEST,
            HomeLinkError::NotFound(_) => StatusCode::NOT_FOUND,
            HomeLinkError::Unauthorized(_) => StatusCode::FORBIDDEN,
            HomeLinkError::Command(err) => match err {
                CommandError::AlreadyInFlight { .. } | CommandError::OutstandingLimit { .. } => {
                    StatusCode::CONFLICT
                }
                CommandError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                CommandError::Rejected { .. } => StatusCode::BAD_GATEWAY,
                CommandError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
            },
            HomeLinkError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
            HomeLinkError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            HomeLinkError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                "internal server error".to_string()
            }
            HomeLinkError::Transport(err) => {
                tracing::warn!(error = %err, "transport error");
                self.0.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
