//! mataccel -- GPU-accelerated matrix addition service with device telemetry.
//!
//! This crate provides the core library for staging 2D matrices on a GPU,
//! running the elementwise add kernel over a tiled launch grid, and exposing
//! accelerator memory occupancy as JSON and Prometheus gauges.

pub mod accel;
pub mod api;
pub mod matrix;
pub mod telemetry;

use std::sync::Arc;

use anyhow::Result;

/// Start the mataccel daemon: construct the application context and serve
/// the API on `0.0.0.0:port`.
pub async fn serve(port: u16) -> Result<()> {
    let state = api::state::AppState {
        executor: Arc::new(accel::GpuExecutor::new()),
        device_query: Arc::new(telemetry::query::NvidiaSmi),
    };

    let app = api::router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "mataccel listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
