//! Launch planning: partition a 2D matrix into a covering grid of fixed-size
//! thread tiles.

/// Threads per tile on each axis. Must agree with the `@workgroup_size`
/// declared in `kernels/matrix_add.wgsl`.
pub const TILE_DIM: (u32, u32) = (16, 16);

/// How device threads are partitioned to cover one matrix launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LaunchConfig {
    pub tile: (u32, u32),
    pub grid: (u32, u32),
}

/// Compute the minimal grid of [`TILE_DIM`] tiles covering `rows` x `cols`.
///
/// Ceiling division on each axis, so the grid may overshoot the matrix
/// extent; the kernel bounds-checks per-thread indices.
pub fn plan(rows: usize, cols: usize) -> LaunchConfig {
    let grid_x = rows.div_ceil(TILE_DIM.0 as usize) as u32;
    let grid_y = cols.div_ceil(TILE_DIM.1 as usize) as u32;
    LaunchConfig {
        tile: TILE_DIM,
        grid: (grid_x, grid_y),
    }
}
