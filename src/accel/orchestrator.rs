//! Execution orchestration: validate, coerce, transfer, launch, retrieve.

use std::time::Instant;

use tracing::debug;

use crate::accel::device::MatrixDevice;
use crate::accel::{launch, AccelError, AddReport};
use crate::matrix::Matrix;

/// Add two equally shaped matrices on `device` and report shape + timing.
///
/// Validation happens before any device resource is acquired. All device
/// buffers are owned locals, so they are released on every exit path,
/// including mid-sequence device failures. No retries: the first device
/// error aborts the whole operation.
pub fn execute_add<D: MatrixDevice>(
    device: &D,
    a: Matrix,
    b: Matrix,
) -> Result<AddReport, AccelError> {
    if a.shape() != b.shape() {
        let (left_rows, left_cols) = a.shape();
        let (right_rows, right_cols) = b.shape();
        return Err(AccelError::ShapeMismatch {
            left_rows,
            left_cols,
            right_rows,
            right_cols,
        });
    }
    let (rows, cols) = a.shape();

    // The kernel computes in f32; coerce both operands unconditionally
    // rather than guessing from the stored element type.
    let a = a.into_f32();
    let b = b.into_f32();

    let d_a = device.upload(&a)?;
    let d_b = device.upload(&b)?;
    let d_out = device.allocate_output(rows, cols)?;

    let config = launch::plan(rows, cols);
    debug!(
        rows,
        cols,
        grid_x = config.grid.0,
        grid_y = config.grid.1,
        "launching add kernel"
    );

    let started = Instant::now();
    device.launch_add(&d_a, &d_b, &d_out, &config, rows, cols)?;
    device.synchronize()?;
    let elapsed = started.elapsed();

    // The caller only gets shape + timing, but the result still has to come
    // back: the completed transfer is what proves the launch finished before
    // the buffers are retired.
    let _result = device.download(&d_out, rows, cols)?;

    Ok(AddReport {
        rows,
        cols,
        elapsed_seconds: elapsed.as_secs_f64(),
    })
}
