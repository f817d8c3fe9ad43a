//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use thiefwatch_domain::error::{FieldViolation, ValidationError, WatchError};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<ViolationBody>,
}

#[derive(Serialize)]
struct ViolationBody {
    field: String,
    problem: String,
}

impl From<&FieldViolation> for ViolationBody {
    fn from(violation: &FieldViolation) -> Self {
        Self {
            field: violation.field.clone(),
            problem: violation.problem.to_string(),
        }
    }
}

/// Maps [`WatchError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(WatchError);

impl From<WatchError> for ApiError {
    fn from(err: WatchError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut violations = Vec::new();
        let (status, message) = match &self.0 {
            WatchError::Validation(err) => {
                violations = err.violations().iter().map(ViolationBody::from).collect();
                (StatusCode::BAD_REQUEST, "validation failed".to_string())
            }
            WatchError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            WatchError::MalformedEvent(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            WatchError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            WatchError::Transport(err) => {
                tracing::error!(error = %err, "transport error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorBody {
                error: message,
                violations,
            }),
        )
            .into_response()
    }
}
