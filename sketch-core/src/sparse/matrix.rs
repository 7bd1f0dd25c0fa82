use std::collections::BTreeMap;
use std::fmt;

use itertools::izip;
use rayon::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};

use super::{compress_rows, CompressedRows, CoordinateEntry, Scalar, Semiring};
use crate::utils::errors::SketchError;

/// Row-major sparse matrix with a fixed shape.
///
/// Stands in for a distributed sparse matrix: it can be built from parallel
/// coordinate arrays, multiplied over a semiring, transposed and compared.
/// Storage is canonical (see [`CompressedRows`]), so `==` is entry-for-entry
/// equality including explicitly stored zeros.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SparseMatrix<F> {
    nrows: usize,
    ncols: usize,
    rows: CompressedRows<F>,
}

impl<F: Scalar> SparseMatrix<F> {
    /// An `nrows x ncols` matrix with no stored entries.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            rows: CompressedRows::empty(nrows),
        }
    }

    /// Builds a matrix from parallel `(rows, cols, vals)` arrays. Repeated
    /// coordinates are summed.
    pub fn from_triples(
        nrows: usize,
        ncols: usize,
        rows: &[usize],
        cols: &[usize],
        vals: &[F],
    ) -> Result<Self, SketchError> {
        if cols.len() != rows.len() {
            return Err(SketchError::LengthMismatch(rows.len(), cols.len()));
        }
        if vals.len() != rows.len() {
            return Err(SketchError::LengthMismatch(rows.len(), vals.len()));
        }
        let entries = izip!(rows, cols, vals)
            .map(|(&row, &col, &value)| CoordinateEntry::new(row, col, value))
            .collect();
        Self::from_entries(nrows, ncols, entries)
    }

    pub fn from_entries(
        nrows: usize,
        ncols: usize,
        entries: Vec<CoordinateEntry<F>>,
    ) -> Result<Self, SketchError> {
        if let Some(entry) = entries
            .iter()
            .find(|entry| entry.row >= nrows || entry.col >= ncols)
        {
            return Err(SketchError::IndexOutOfBounds {
                row: entry.row,
                col: entry.col,
                nrows,
                ncols,
            });
        }
        Ok(Self::from_entries_unchecked(nrows, ncols, entries))
    }

    /// Caller guarantees every entry lies inside `nrows x ncols`.
    pub(crate) fn from_entries_unchecked(
        nrows: usize,
        ncols: usize,
        entries: Vec<CoordinateEntry<F>>,
    ) -> Self {
        Self {
            nrows,
            ncols,
            rows: compress_rows(entries, nrows),
        }
    }

    pub(crate) fn replace_entries(&mut self, entries: Vec<CoordinateEntry<F>>) {
        self.rows = compress_rows(entries, self.nrows);
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.rows.nnz()
    }

    /// `(col, value)` pairs of one row, by increasing column.
    ///
    /// # Panics
    /// If `row >= self.nrows()`.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, F)> + '_ {
        let range = self.rows.row_range(row);
        self.rows.col_index[range.clone()]
            .iter()
            .copied()
            .zip(self.rows.values[range].iter().copied())
    }

    /// Stored entries in row-major order.
    pub fn entries(&self) -> impl Iterator<Item = CoordinateEntry<F>> + '_ {
        (0..self.nrows).flat_map(move |row| {
            self.row(row)
                .map(move |(col, value)| CoordinateEntry::new(row, col, value))
        })
    }

    /// Stored value at `(row, col)`, `None` for a column with no entry.
    ///
    /// # Panics
    /// If `row >= self.nrows()`.
    pub fn get(&self, row: usize, col: usize) -> Option<F> {
        let range = self.rows.row_range(row);
        let cols = &self.rows.col_index[range.clone()];
        cols.binary_search(&col)
            .ok()
            .map(|offset| self.rows.values[range.start + offset])
    }

    #[tracing::instrument(skip_all, name = "SparseMatrix::transpose")]
    pub fn transpose(&self) -> Self {
        let entries = self
            .entries()
            .map(|entry| CoordinateEntry::new(entry.col, entry.row, entry.value))
            .collect();
        Self::from_entries_unchecked(self.ncols, self.nrows, entries)
    }

    /// Sparse x sparse product `a * b` over the semiring `S` (row-by-row
    /// Gustavson). Products contributing to one output entry are added in
    /// increasing order of the inner index.
    #[tracing::instrument(skip_all, name = "SparseMatrix::spgemm")]
    pub fn spgemm<S: Semiring<F>>(a: &Self, b: &Self) -> Result<Self, SketchError> {
        if a.ncols != b.nrows {
            return Err(SketchError::DimensionMismatch {
                expected: a.ncols,
                actual: b.nrows,
            });
        }

        let product_rows: Vec<Vec<(usize, F)>> = (0..a.nrows)
            .into_par_iter()
            .map(|i| {
                let mut accumulator: BTreeMap<usize, F> = BTreeMap::new();
                for (k, a_ik) in a.row(i) {
                    for (j, b_kj) in b.row(k) {
                        let acc = accumulator.entry(j).or_insert_with(S::zero);
                        *acc = S::add(*acc, S::mul(a_ik, b_kj));
                    }
                }
                accumulator.into_iter().collect()
            })
            .collect();

        let mut rows = CompressedRows {
            row_ptr: Vec::with_capacity(a.nrows + 1),
            col_index: vec![],
            values: vec![],
        };
        rows.row_ptr.push(0);
        for product_row in product_rows {
            for (col, value) in product_row {
                rows.col_index.push(col);
                rows.values.push(value);
            }
            rows.row_ptr.push(rows.col_index.len());
        }

        Ok(Self {
            nrows: a.nrows,
            ncols: b.ncols,
            rows,
        })
    }

    pub fn to_dense(&self) -> Vec<Vec<F>> {
        let mut dense = vec![vec![F::zero(); self.ncols]; self.nrows];
        for entry in self.entries() {
            dense[entry.row][entry.col] = entry.value;
        }
        dense
    }
}

impl<'de, F: Deserialize<'de>> Deserialize<'de> for SparseMatrix<F> {
    /// Rejects row arrays that do not describe an `nrows x ncols` matrix.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw<F> {
            nrows: usize,
            ncols: usize,
            rows: CompressedRows<F>,
        }

        let Raw { nrows, ncols, rows } = Raw::deserialize(deserializer)?;
        if rows.row_ptr.len() != nrows + 1 {
            return Err(serde::de::Error::custom(format!(
                "{} row pointers for {nrows} rows",
                rows.row_ptr.len()
            )));
        }
        if let Some(&col) = rows.col_index.iter().find(|&&col| col >= ncols) {
            return Err(serde::de::Error::custom(format!(
                "column {col} out of bounds for {ncols} columns"
            )));
        }
        Ok(Self { nrows, ncols, rows })
    }
}

impl<F: Scalar + fmt::Display> fmt::Display for SparseMatrix<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} x {} ({} stored)", self.nrows, self.ncols, self.nnz())?;
        for row in self.to_dense() {
            let cells: Vec<String> = row.iter().map(|value| format!("{value:>8.2}")).collect();
            writeln!(f, "[{}]", cells.join(" "))?;
        }
        Ok(())
    }
}
