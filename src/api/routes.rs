//! API route definitions and handlers.

use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use super::error::ApiError;
use super::state::AppState;
use crate::matrix::Matrix;
use crate::telemetry;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/add", post(add_matrices))
        .route("/gpu-info", get(gpu_info))
        .route("/metrics", get(metrics))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Add two uploaded matrices on the GPU.
///
/// Expects a multipart form with npz files `file_a` and `file_b`. The
/// response carries the result shape and timing only; the matrix body is
/// deliberately not returned.
async fn add_matrices(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut file_a = None;
    let mut file_b = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read uploaded file: {e}")))?;
        match name.as_str() {
            "file_a" => file_a = Some((filename, bytes)),
            "file_b" => file_b = Some((filename, bytes)),
            _ => {}
        }
    }

    let (name_a, bytes_a) =
        file_a.ok_or_else(|| ApiError::BadRequest("missing upload field: file_a".into()))?;
    let (name_b, bytes_b) =
        file_b.ok_or_else(|| ApiError::BadRequest("missing upload field: file_b".into()))?;

    if !name_a.ends_with(".npz") || !name_b.ends_with(".npz") {
        return Err(ApiError::BadRequest("both files must be .npz".into()));
    }

    let a = Matrix::from_npz_bytes(&bytes_a)?;
    let b = Matrix::from_npz_bytes(&bytes_b)?;

    // Device work blocks on the synchronization barrier; keep it off the
    // async reactor.
    let executor = state.executor.clone();
    let report = tokio::task::spawn_blocking(move || executor.add(a, b))
        .await
        .map_err(|e| ApiError::Internal(format!("compute task failed: {e}")))??;

    info!(
        rows = report.rows,
        cols = report.cols,
        elapsed = report.elapsed_seconds,
        "matrix addition complete"
    );
    Ok(Json(json!({
        "matrix_shape": [report.rows, report.cols],
        "elapsed_time": report.elapsed_seconds,
        "device": "GPU",
    })))
}

/// Per-accelerator memory occupancy as a structured summary.
async fn gpu_info(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let samples = telemetry::sample(state.device_query.as_ref())?;
    Ok(Json(json!({ "gpus": samples })))
}

/// Same sample set as `/gpu-info`, rendered as a Prometheus exposition.
async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let samples = telemetry::sample(state.device_query.as_ref())?;
    let body = telemetry::metrics::render(&samples);
    Ok((
        [(header::CONTENT_TYPE, telemetry::metrics::CONTENT_TYPE)],
        body,
    )
        .into_response())
}
