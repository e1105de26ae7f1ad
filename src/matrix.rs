//! Host-side matrix model and npz container ingestion.
//!
//! A [`Matrix`] is a dense row-major 2D array created from one uploaded
//! `.npz` container. It lives for a single request; the kernel computes in
//! f32, so callers coerce with [`Matrix::into_f32`] before staging data on
//! the device.

use std::io::Cursor;

use ndarray::ArrayD;
use ndarray_npy::NpzReader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("not a readable npz archive: {0}")]
    BadArchive(String),

    #[error("npz archive contains no arrays")]
    EmptyArchive,

    #[error("unsupported element type, expected f32 or f64: {0}")]
    UnsupportedDtype(String),

    #[error("only 2D matrices are supported (got rank {ndim})")]
    NotTwoDimensional { ndim: usize },

    #[error("matrix dimensions must be non-zero (got {rows}x{cols})")]
    ZeroDimension { rows: usize, cols: usize },

    #[error("data length {len} does not match shape {rows}x{cols}")]
    LengthMismatch { len: usize, rows: usize, cols: usize },
}

/// Element width of the host-side payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    F32,
    F64,
}

#[derive(Debug, Clone, PartialEq)]
enum Elements {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// A dense row-major 2D matrix of floats.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    elements: Elements,
}

impl Matrix {
    pub fn from_f32(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, ValidationError> {
        if data.len() != rows * cols {
            return Err(ValidationError::LengthMismatch {
                len: data.len(),
                rows,
                cols,
            });
        }
        Ok(Self {
            rows,
            cols,
            elements: Elements::F32(data),
        })
    }

    pub fn from_f64(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, ValidationError> {
        if data.len() != rows * cols {
            return Err(ValidationError::LengthMismatch {
                len: data.len(),
                rows,
                cols,
            });
        }
        Ok(Self {
            rows,
            cols,
            elements: Elements::F64(data),
        })
    }

    /// Decode the first array of an npz container.
    ///
    /// The container must hold at least one array of rank 2 with f32 or f64
    /// elements and no zero dimension; any additional arrays are ignored.
    pub fn from_npz_bytes(bytes: &[u8]) -> Result<Self, ValidationError> {
        let mut npz = NpzReader::new(Cursor::new(bytes))
            .map_err(|e| ValidationError::BadArchive(e.to_string()))?;
        let names = npz
            .names()
            .map_err(|e| ValidationError::BadArchive(e.to_string()))?;
        let Some(first) = names.into_iter().next() else {
            return Err(ValidationError::EmptyArchive);
        };

        // Probe f32 first (the kernel's native width), then f64.
        let attempt: Result<ArrayD<f32>, _> = npz.by_name(&first);
        match attempt {
            Ok(array) => Self::from_dyn_f32(array),
            Err(_) => {
                let array: ArrayD<f64> = npz
                    .by_name(&first)
                    .map_err(|e| ValidationError::UnsupportedDtype(e.to_string()))?;
                Self::from_dyn_f64(array)
            }
        }
    }

    fn from_dyn_f32(array: ArrayD<f32>) -> Result<Self, ValidationError> {
        let (rows, cols) = require_2d(array.shape())?;
        Self::from_f32(rows, cols, array.iter().copied().collect())
    }

    fn from_dyn_f64(array: ArrayD<f64>) -> Result<Self, ValidationError> {
        let (rows, cols) = require_2d(array.shape())?;
        Self::from_f64(rows, cols, array.iter().copied().collect())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn element_type(&self) -> ElementType {
        match self.elements {
            Elements::F32(_) => ElementType::F32,
            Elements::F64(_) => ElementType::F64,
        }
    }

    /// Coerce to the kernel's fixed f32 width. Applied unconditionally by the
    /// orchestrator; a no-op move when the payload is already f32.
    pub fn into_f32(self) -> Matrix {
        let elements = match self.elements {
            Elements::F32(data) => Elements::F32(data),
            Elements::F64(data) => Elements::F32(data.into_iter().map(|v| v as f32).collect()),
        };
        Matrix {
            rows: self.rows,
            cols: self.cols,
            elements,
        }
    }

    /// The f32 payload, or `None` if the matrix has not been coerced yet.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.elements {
            Elements::F32(data) => Some(data),
            Elements::F64(_) => None,
        }
    }
}

fn require_2d(shape: &[usize]) -> Result<(usize, usize), ValidationError> {
    if shape.len() != 2 {
        return Err(ValidationError::NotTwoDimensional { ndim: shape.len() });
    }
    let (rows, cols) = (shape[0], shape[1]);
    // A zero-sized operand would reach the device as an empty binding;
    // reject it here with the rest of the caller errors.
    if rows == 0 || cols == 0 {
        return Err(ValidationError::ZeroDimension { rows, cols });
    }
    Ok((rows, cols))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};
    use ndarray_npy::NpzWriter;

    fn npz_with_f64(array: &Array2<f64>) -> Vec<u8> {
        let mut writer = NpzWriter::new(Cursor::new(Vec::new()));
        writer.add_array("arr_0", array).expect("write array");
        writer.finish().expect("finish npz").into_inner()
    }

    #[test]
    fn test_decode_f64_container() {
        let array = Array2::from_shape_fn((3, 4), |(i, j)| (i * 4 + j) as f64);
        let matrix = Matrix::from_npz_bytes(&npz_with_f64(&array)).expect("decode");
        assert_eq!(matrix.shape(), (3, 4));
        assert_eq!(matrix.element_type(), ElementType::F64);
    }

    #[test]
    fn test_decode_f32_container() {
        let array = Array2::<f32>::ones((2, 2));
        let mut writer = NpzWriter::new(Cursor::new(Vec::new()));
        writer.add_array("arr_0", &array).expect("write array");
        let bytes = writer.finish().expect("finish npz").into_inner();

        let matrix = Matrix::from_npz_bytes(&bytes).expect("decode");
        assert_eq!(matrix.element_type(), ElementType::F32);
        assert_eq!(matrix.as_f32(), Some(&[1.0f32, 1.0, 1.0, 1.0][..]));
    }

    #[test]
    fn test_coercion_converts_f64_payload() {
        let matrix = Matrix::from_f64(2, 2, vec![1.5, 2.5, 3.5, 4.5]).expect("build");
        let coerced = matrix.into_f32();
        assert_eq!(coerced.element_type(), ElementType::F32);
        assert_eq!(coerced.as_f32(), Some(&[1.5f32, 2.5, 3.5, 4.5][..]));
    }

    #[test]
    fn test_first_array_of_multi_array_container_is_used() {
        let first = Array2::from_shape_fn((2, 3), |(i, j)| (i * 3 + j) as f64);
        let second = Array2::<f64>::ones((5, 5));
        let mut writer = NpzWriter::new(Cursor::new(Vec::new()));
        writer.add_array("arr_0", &first).expect("write first");
        writer.add_array("arr_1", &second).expect("write second");
        let bytes = writer.finish().expect("finish npz").into_inner();

        let matrix = Matrix::from_npz_bytes(&bytes).expect("decode");
        assert_eq!(matrix.shape(), (2, 3));
        assert_eq!(
            matrix.into_f32().as_f32(),
            Some(&[0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0][..])
        );
    }

    #[test]
    fn test_integer_dtype_is_rejected() {
        let array = Array2::<i32>::zeros((2, 2));
        let mut writer = NpzWriter::new(Cursor::new(Vec::new()));
        writer.add_array("arr_0", &array).expect("write array");
        let bytes = writer.finish().expect("finish npz").into_inner();

        let err = Matrix::from_npz_bytes(&bytes).expect_err("i32 must fail");
        assert!(matches!(err, ValidationError::UnsupportedDtype(_)));
    }

    #[test]
    fn test_zero_dimension_is_rejected() {
        let array = Array2::<f64>::zeros((0, 5));
        let bytes = npz_with_f64(&array);

        let err = Matrix::from_npz_bytes(&bytes).expect_err("0x5 must fail");
        assert!(matches!(
            err,
            ValidationError::ZeroDimension { rows: 0, cols: 5 }
        ));
    }

    #[test]
    fn test_rank_3_array_is_rejected() {
        let array = Array3::<f64>::ones((1, 1, 1));
        let mut writer = NpzWriter::new(Cursor::new(Vec::new()));
        writer.add_array("arr_0", &array).expect("write array");
        let bytes = writer.finish().expect("finish npz").into_inner();

        let err = Matrix::from_npz_bytes(&bytes).expect_err("rank 3 must fail");
        assert!(matches!(err, ValidationError::NotTwoDimensional { ndim: 3 }));
    }

    #[test]
    fn test_empty_container_is_rejected() {
        let writer = NpzWriter::new(Cursor::new(Vec::new()));
        let bytes = writer.finish().expect("finish npz").into_inner();

        let err = Matrix::from_npz_bytes(&bytes).expect_err("empty must fail");
        assert!(matches!(err, ValidationError::EmptyArchive));
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        let err = Matrix::from_npz_bytes(b"definitely not a zip").expect_err("garbage");
        assert!(matches!(err, ValidationError::BadArchive(_)));
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let err = Matrix::from_f32(2, 3, vec![0.0; 5]).expect_err("short payload");
        assert!(matches!(
            err,
            ValidationError::LengthMismatch {
                len: 5,
                rows: 2,
                cols: 3
            }
        ));
    }
}
