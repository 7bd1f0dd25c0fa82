use serde::{Deserialize, Serialize};

use super::{compress_rows, CompressedRows, CoordinateEntry, Scalar};
use crate::utils::errors::SketchError;

/// Local compressed-row container.
///
/// Contents are only ever replaced wholesale, either by ingesting a list of
/// coordinates or by attaching externally owned buffers. The generation flag
/// flips on every ingestion (whether or not the contents changed) so a reader
/// can tell that something was written since it last looked; `attach` clears
/// it because the caller already holds the data it attached.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressedRowMatrix<F> {
    rows: CompressedRows<F>,
    generation: bool,
}

impl<F: Scalar> CompressedRowMatrix<F> {
    /// A matrix without any rows. As a sketch output it accepts any shape.
    pub fn new() -> Self {
        Self {
            rows: CompressedRows {
                row_ptr: vec![],
                col_index: vec![],
                values: vec![],
            },
            generation: false,
        }
    }

    /// A matrix with `num_rows` empty rows.
    pub fn with_rows(num_rows: usize) -> Self {
        Self {
            rows: CompressedRows::empty(num_rows),
            generation: false,
        }
    }

    /// Replaces the contents with `entries`, sorted by `(row, col)` with
    /// duplicates summed, and `row_count` rows in total.
    ///
    /// Every entry must satisfy `row < row_count`; otherwise nothing is
    /// modified.
    #[tracing::instrument(skip_all, name = "CompressedRowMatrix::ingest")]
    pub fn ingest(
        &mut self,
        entries: Vec<CoordinateEntry<F>>,
        row_count: usize,
    ) -> Result<(), SketchError> {
        if let Some(entry) = entries.iter().find(|entry| entry.row >= row_count) {
            return Err(SketchError::RowOutOfBounds {
                row: entry.row,
                nrows: row_count,
            });
        }
        self.replace(compress_rows(entries, row_count));
        Ok(())
    }

    pub(crate) fn replace(&mut self, rows: CompressedRows<F>) {
        tracing::debug!(rows = rows.num_rows(), nnz = rows.nnz(), "replaced compressed rows");
        self.rows = rows;
        self.generation = !self.generation;
    }

    /// `(row_ptr.len(), nnz)`, the buffer sizes [`CompressedRowMatrix::detach`]
    /// needs.
    pub fn size(&self) -> (usize, usize) {
        (self.rows.row_ptr.len(), self.rows.nnz())
    }

    pub fn needs_update(&self) -> bool {
        self.generation
    }

    pub fn num_rows(&self) -> usize {
        self.rows.num_rows()
    }

    pub fn nnz(&self) -> usize {
        self.rows.nnz()
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.rows.row_ptr
    }

    pub fn col_index(&self) -> &[usize] {
        &self.rows.col_index
    }

    pub fn values(&self) -> &[F] {
        &self.rows.values
    }

    /// `(col, value)` pairs of one row, by increasing column.
    ///
    /// # Panics
    /// If `row >= self.num_rows()`.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, F)> + '_ {
        let range = self.rows.row_range(row);
        self.rows.col_index[range.clone()]
            .iter()
            .copied()
            .zip(self.rows.values[range].iter().copied())
    }

    pub fn entries(&self) -> impl Iterator<Item = CoordinateEntry<F>> + '_ {
        (0..self.num_rows()).flat_map(move |row| {
            self.row(row)
                .map(move |(col, value)| CoordinateEntry::new(row, col, value))
        })
    }

    /// Copies the arrays into caller-allocated buffers, narrowing indices to
    /// `i32` and values to `f64`. Size the buffers with
    /// [`CompressedRowMatrix::size`].
    pub fn detach(
        &self,
        row_ptr: &mut [i32],
        indices: &mut [i32],
        values: &mut [f64],
    ) -> Result<(), SketchError> {
        let (n_row_ptr, nnz) = self.size();
        if row_ptr.len() < n_row_ptr {
            return Err(SketchError::BufferTooSmall("row_ptr", n_row_ptr, row_ptr.len()));
        }
        if indices.len() < nnz {
            return Err(SketchError::BufferTooSmall("indices", nnz, indices.len()));
        }
        if values.len() < nnz {
            return Err(SketchError::BufferTooSmall("values", nnz, values.len()));
        }

        let narrow = |index: usize| {
            i32::try_from(index).map_err(|_| SketchError::IndexOverflow(index))
        };
        // The last row pointer is the largest index of either array.
        if let Some(&last) = self.rows.row_ptr.last() {
            narrow(last)?;
        }
        if let Some(&widest) = self.rows.col_index.iter().max() {
            narrow(widest)?;
        }

        for (dst, &src) in row_ptr.iter_mut().zip(&self.rows.row_ptr) {
            *dst = src as i32;
        }
        for (dst, &src) in indices.iter_mut().zip(&self.rows.col_index) {
            *dst = src as i32;
        }
        for (dst, src) in values.iter_mut().zip(&self.rows.values) {
            *dst = src.to_f64().unwrap_or(f64::NAN);
        }
        Ok(())
    }

    /// Replaces the contents with externally owned buffers and clears the
    /// generation flag. The buffers must already be canonical: `row_ptr`
    /// starts at zero, never decreases and ends at `indices.len()`, and the
    /// column indices of every row are non-negative and strictly increasing.
    pub fn attach(
        &mut self,
        row_ptr: &[i32],
        indices: &[i32],
        values: &[f64],
    ) -> Result<(), SketchError> {
        if indices.len() != values.len() {
            return Err(SketchError::LengthMismatch(indices.len(), values.len()));
        }
        let widen = |name: &str, index: i32| {
            usize::try_from(index).map_err(|_| {
                SketchError::MalformedBuffer(format!("negative {name} entry {index}"))
            })
        };

        let row_ptr = row_ptr
            .iter()
            .map(|&p| widen("row_ptr", p))
            .collect::<Result<Vec<_>, _>>()?;
        let col_index = indices
            .iter()
            .map(|&i| widen("indices", i))
            .collect::<Result<Vec<_>, _>>()?;
        let values = values
            .iter()
            .map(|&v| {
                F::from(v).ok_or_else(|| {
                    SketchError::MalformedBuffer(format!("value {v} is not representable"))
                })
            })
            .collect::<Result<Vec<F>, _>>()?;

        let rows = CompressedRows {
            row_ptr,
            col_index,
            values,
        };
        rows.validate()?;
        self.rows = rows;
        self.generation = false;
        Ok(())
    }
}
