//! Device transfer seam.
//!
//! The orchestrator is generic over [`MatrixDevice`] so its control flow can
//! be exercised against a host-memory implementation without hardware.

use crate::accel::launch::LaunchConfig;
use crate::accel::AccelError;
use crate::matrix::Matrix;

/// Transfer and execution surface of one accelerator.
///
/// Buffers are owned handles: dropping a `Buffer` releases the underlying
/// device allocation, and release never fails. Ownership keeps buffer
/// lifetimes scoped to a single orchestrated request on every exit path.
pub trait MatrixDevice {
    type Buffer;

    /// Copy a host matrix into a freshly allocated device buffer sized to it.
    /// The matrix must already be coerced to f32.
    fn upload(&self, matrix: &Matrix) -> Result<Self::Buffer, AccelError>;

    /// Allocate uninitialized device space for a `rows` x `cols` result.
    fn allocate_output(&self, rows: usize, cols: usize) -> Result<Self::Buffer, AccelError>;

    /// Enqueue the elementwise add kernel over `config.grid`. Returns once
    /// the launch is submitted, not once it has finished.
    fn launch_add(
        &self,
        a: &Self::Buffer,
        b: &Self::Buffer,
        out: &Self::Buffer,
        config: &LaunchConfig,
        rows: usize,
        cols: usize,
    ) -> Result<(), AccelError>;

    /// Block until all submitted work has finished on the device.
    fn synchronize(&self) -> Result<(), AccelError>;

    /// Copy a device buffer back into a freshly materialized host matrix.
    fn download(&self, buffer: &Self::Buffer, rows: usize, cols: usize)
        -> Result<Matrix, AccelError>;
}
