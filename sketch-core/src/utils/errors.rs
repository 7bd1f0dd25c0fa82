use common::SketchType;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SketchError {
    #[error("Invalid sketch dimension: {0}")]
    InvalidDimension(String),
    #[error("Sketch source dimension is {expected} but the input matrix has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Output shape mismatch, expected {expected:?} but got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("Output matrix must be empty, found {0} stored entries")]
    OutputNotEmpty(usize),
    #[error("Row {row} out of bounds for {nrows} rows")]
    RowOutOfBounds { row: usize, nrows: usize },
    #[error("Index ({row}, {col}) out of bounds for a {nrows} x {ncols} matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    },
    #[error("Invalid input length, expected length {0} but got {1}")]
    LengthMismatch(usize, usize),
    #[error("Buffer too small: {0} needs {1} slots but got {2}")]
    BufferTooSmall(&'static str, usize, usize),
    #[error("Index {0} does not fit in a 32-bit signed integer")]
    IndexOverflow(usize),
    #[error("Malformed buffer: {0}")]
    MalformedBuffer(String),
    #[error("Unknown dimension tag {0}, expected 0 (columnwise) or 1 (rowwise)")]
    InvalidDimensionTag(u8),
    #[error("Descriptor is for a {actual} sketch, not {expected}")]
    SketchTypeMismatch {
        expected: SketchType,
        actual: SketchType,
    },
}
