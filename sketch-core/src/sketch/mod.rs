use clap::ValueEnum;
use common::constants::{COLUMNWISE_TAG, ROWWISE_TAG};
use serde::{Deserialize, Serialize};

use crate::sparse::{CompressedRowMatrix, CoordinateEntry, Scalar, SparseMatrix};
use crate::utils::errors::SketchError;

pub mod apply;
pub mod hash_transform;

pub use hash_transform::{HashTransform, HashTransformData, HashTransformDescriptor, CWT};

/// Which dimension of the input a sketch reduces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum Dimension {
    /// Reduce the row count: `Pi * A`.
    Columnwise,
    /// Reduce the column count: `A * Pi^T`.
    Rowwise,
}

impl TryFrom<u8> for Dimension {
    type Error = SketchError;

    fn try_from(tag: u8) -> Result<Self, SketchError> {
        match tag {
            COLUMNWISE_TAG => Ok(Dimension::Columnwise),
            ROWWISE_TAG => Ok(Dimension::Rowwise),
            _ => Err(SketchError::InvalidDimensionTag(tag)),
        }
    }
}

/// A matrix a sketch can be written into.
pub trait SketchOutput<F: Scalar> {
    /// Fails unless this output is empty and can hold an `nrows x ncols`
    /// result.
    fn check_target(&self, nrows: usize, ncols: usize) -> Result<(), SketchError>;

    /// Replaces the contents with `entries`, every one of which lies inside
    /// the shape accepted by [`SketchOutput::check_target`].
    fn fill(&mut self, entries: Vec<CoordinateEntry<F>>, nrows: usize, ncols: usize);
}

impl<F: Scalar> SketchOutput<F> for SparseMatrix<F> {
    fn check_target(&self, nrows: usize, ncols: usize) -> Result<(), SketchError> {
        if self.shape() != (nrows, ncols) {
            return Err(SketchError::ShapeMismatch {
                expected: (nrows, ncols),
                actual: self.shape(),
            });
        }
        if self.nnz() != 0 {
            return Err(SketchError::OutputNotEmpty(self.nnz()));
        }
        Ok(())
    }

    fn fill(&mut self, entries: Vec<CoordinateEntry<F>>, _nrows: usize, _ncols: usize) {
        self.replace_entries(entries);
    }
}

impl<F: Scalar> SketchOutput<F> for CompressedRowMatrix<F> {
    fn check_target(&self, nrows: usize, ncols: usize) -> Result<(), SketchError> {
        // The local container does not record a column count, and one
        // without rows has not been sized yet.
        if self.size().0 != 0 && self.num_rows() != nrows {
            return Err(SketchError::ShapeMismatch {
                expected: (nrows, ncols),
                actual: (self.num_rows(), ncols),
            });
        }
        if self.nnz() != 0 {
            return Err(SketchError::OutputNotEmpty(self.nnz()));
        }
        Ok(())
    }

    fn fill(&mut self, entries: Vec<CoordinateEntry<F>>, nrows: usize, _ncols: usize) {
        self.replace(crate::sparse::compress_rows(entries, nrows));
    }
}
