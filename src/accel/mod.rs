//! Accelerated matrix addition -- launch planning, device transfer, and
//! kernel execution on the GPU.
//!
//! The orchestrator drives any [`device::MatrixDevice`]; production uses the
//! wgpu-backed [`gpu::WgpuDevice`] behind the object-safe [`AddExecutor`]
//! seam the API layer depends on.

pub mod device;
pub mod gpu;
pub mod launch;
pub mod orchestrator;

use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use crate::matrix::Matrix;

#[derive(Debug, Error)]
pub enum AccelError {
    #[error("matrices have different shapes: {left_rows}x{left_cols} vs {right_rows}x{right_cols}")]
    ShapeMismatch {
        left_rows: usize,
        left_cols: usize,
        right_rows: usize,
        right_cols: usize,
    },

    #[error("no compatible GPU adapter available")]
    AdapterUnavailable,

    #[error("device error: {0}")]
    Device(String),
}

/// Outcome of one accelerated addition: the result shape and the wall-clock
/// cost of the launch + synchronize window. The computed matrix itself is
/// retrieved to confirm completion but never returned to the caller.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AddReport {
    pub rows: usize,
    pub cols: usize,
    pub elapsed_seconds: f64,
}

/// Object-safe execution seam. The HTTP layer holds an `Arc<dyn AddExecutor>`
/// so handlers can be tested against a host-side implementation.
pub trait AddExecutor: Send + Sync {
    fn add(&self, a: Matrix, b: Matrix) -> Result<AddReport, AccelError>;
}

/// Production executor: one lazily initialized wgpu device, at most one
/// launch in flight at a time.
///
/// The GPU is a process-wide shared resource and this service makes no
/// isolation promises between concurrent requests, so launches are
/// serialized here; the device slot doubles as the admission gate.
pub struct GpuExecutor {
    device: Mutex<Option<gpu::WgpuDevice>>,
}

impl GpuExecutor {
    pub fn new() -> Self {
        Self {
            device: Mutex::new(None),
        }
    }
}

impl Default for GpuExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl AddExecutor for GpuExecutor {
    fn add(&self, a: Matrix, b: Matrix) -> Result<AddReport, AccelError> {
        let mut guard = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            tracing::info!("initializing GPU device on first use");
            *guard = Some(gpu::WgpuDevice::new()?);
        }
        match guard.as_ref() {
            Some(device) => orchestrator::execute_add(device, a, b),
            None => Err(AccelError::Device("GPU device slot empty after init".into())),
        }
    }
}
