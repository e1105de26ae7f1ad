//! Handler error type and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::accel::AccelError;
use crate::matrix::ValidationError;
use crate::telemetry::TelemetryError;

/// Errors surfaced by API handlers. Caller mistakes map to 400, device and
/// telemetry failures to 500; every body is `{"detail": "<message>"}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Compute(AccelError),
    Telemetry(TelemetryError),
    Internal(String),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<AccelError> for ApiError {
    fn from(err: AccelError) -> Self {
        match err {
            // Shape mismatch is a caller error, not a device failure.
            AccelError::ShapeMismatch { .. } => Self::BadRequest(err.to_string()),
            other => Self::Compute(other),
        }
    }
}

impl From<TelemetryError> for ApiError {
    fn from(err: TelemetryError) -> Self {
        Self::Telemetry(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Compute(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("GPU computation failed: {err}"),
            ),
            ApiError::Telemetry(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("device query failed: {err}"),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
