//! Sparse containers: the coordinate entry type, the row compression shared
//! by every container, and the two matrix types built on it.

use std::fmt::Debug;

use num_traits::Float;
use rayon::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::errors::SketchError;

pub mod csr;
pub mod matrix;

pub use csr::CompressedRowMatrix;
pub use matrix::SparseMatrix;

/// Matrix value type.
pub trait Scalar: Float + Debug + Send + Sync + 'static {}

impl<T: Float + Debug + Send + Sync + 'static> Scalar for T {}

/// One `(row, col, value)` triple. Unsigned indices make the `row, col >= 0`
/// precondition hold by construction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinateEntry<F> {
    pub row: usize,
    pub col: usize,
    pub value: F,
}

impl<F> CoordinateEntry<F> {
    pub fn new(row: usize, col: usize, value: F) -> Self {
        Self { row, col, value }
    }
}

impl<F> From<(usize, usize, F)> for CoordinateEntry<F> {
    fn from((row, col, value): (usize, usize, F)) -> Self {
        Self::new(row, col, value)
    }
}

/// Addition and multiplication used by [`SparseMatrix::spgemm`].
pub trait Semiring<F> {
    fn zero() -> F;
    fn add(a: F, b: F) -> F;
    fn mul(a: F, b: F) -> F;
}

/// The arithmetic `(+, *)` semiring.
pub struct PlusTimes;

impl<F: Scalar> Semiring<F> for PlusTimes {
    #[inline(always)]
    fn zero() -> F {
        F::zero()
    }

    #[inline(always)]
    fn add(a: F, b: F) -> F {
        a + b
    }

    #[inline(always)]
    fn mul(a: F, b: F) -> F {
        a * b
    }
}

/// Canonical compressed-row arrays: rows in order, columns strictly
/// increasing within a row, no repeated `(row, col)`.
///
/// Deserialization runs [`CompressedRows::validate`], so a decoded value is
/// as canonical as one built by [`compress_rows`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub(crate) struct CompressedRows<F> {
    pub row_ptr: Vec<usize>,
    pub col_index: Vec<usize>,
    pub values: Vec<F>,
}

impl<F> CompressedRows<F> {
    pub fn empty(num_rows: usize) -> Self {
        Self {
            row_ptr: vec![0; num_rows + 1],
            col_index: vec![],
            values: vec![],
        }
    }

    pub fn num_rows(&self) -> usize {
        self.row_ptr.len().saturating_sub(1)
    }

    pub fn nnz(&self) -> usize {
        self.col_index.len()
    }

    pub fn row_range(&self, row: usize) -> std::ops::Range<usize> {
        self.row_ptr[row]..self.row_ptr[row + 1]
    }

    /// Checks the canonical layout: `row_ptr` is empty (no rows, no entries)
    /// or starts at zero, never decreases and ends at `nnz`, and the columns
    /// of every row are strictly increasing.
    pub fn validate(&self) -> Result<(), SketchError> {
        if self.col_index.len() != self.values.len() {
            return Err(SketchError::LengthMismatch(
                self.col_index.len(),
                self.values.len(),
            ));
        }
        match (self.row_ptr.first(), self.row_ptr.last()) {
            (None, _) if !self.col_index.is_empty() => {
                return Err(SketchError::MalformedBuffer(
                    "entries without row pointers".to_string(),
                ));
            }
            (Some(&first), _) if first != 0 => {
                return Err(SketchError::MalformedBuffer(format!(
                    "row_ptr starts at {first}"
                )));
            }
            (_, Some(&last)) if last != self.col_index.len() => {
                return Err(SketchError::MalformedBuffer(format!(
                    "row_ptr ends at {last} but there are {} entries",
                    self.col_index.len()
                )));
            }
            _ => {}
        }
        if self.row_ptr.windows(2).any(|window| window[0] > window[1]) {
            return Err(SketchError::MalformedBuffer(
                "row_ptr is decreasing".to_string(),
            ));
        }
        for window in self.row_ptr.windows(2) {
            if self.col_index[window[0]..window[1]]
                .windows(2)
                .any(|cols| cols[0] >= cols[1])
            {
                return Err(SketchError::MalformedBuffer(
                    "column indices within a row are not strictly increasing".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl<'de, F: Deserialize<'de>> Deserialize<'de> for CompressedRows<F> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw<F> {
            row_ptr: Vec<usize>,
            col_index: Vec<usize>,
            values: Vec<F>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let rows = CompressedRows {
            row_ptr: raw.row_ptr,
            col_index: raw.col_index,
            values: raw.values,
        };
        rows.validate().map_err(serde::de::Error::custom)?;
        Ok(rows)
    }
}

/// Sorts `entries` by `(row, col)` and compresses them into rows, summing
/// duplicates. The sort is stable, so duplicates are summed in input order.
///
/// Every `entry.row` must be below `row_count`; callers validate.
#[tracing::instrument(skip_all, name = "sparse::compress_rows")]
pub(crate) fn compress_rows<F: Scalar>(
    mut entries: Vec<CoordinateEntry<F>>,
    row_count: usize,
) -> CompressedRows<F> {
    debug_assert!(entries.iter().all(|entry| entry.row < row_count));

    entries.par_sort_by(|a, b| (a.row, a.col).cmp(&(b.row, b.col)));

    let mut row_ptr = Vec::with_capacity(row_count + 1);
    let mut col_index = Vec::with_capacity(entries.len());
    let mut values = Vec::with_capacity(entries.len());

    let mut entries = entries.into_iter().peekable();
    while let Some(entry) = entries.next() {
        while row_ptr.len() <= entry.row {
            row_ptr.push(col_index.len());
        }

        let mut value = entry.value;
        while let Some(duplicate) =
            entries.next_if(|next| next.row == entry.row && next.col == entry.col)
        {
            value = value + duplicate.value;
        }

        col_index.push(entry.col);
        values.push(value);
    }
    row_ptr.resize(row_count + 1, col_index.len());

    CompressedRows {
        row_ptr,
        col_index,
        values,
    }
}
