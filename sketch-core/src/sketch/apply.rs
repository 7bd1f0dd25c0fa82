//! Applying a hashing transform without materializing the sketch matrix.
//!
//! Since every source index owns exactly one nonzero of the sketch, each
//! stored entry of the input maps to exactly one output coordinate. The
//! mapped coordinates are produced in the input's row-major order and then
//! compressed with a stable sort, so contributions to the same output entry
//! are summed in increasing order of the source index. That is the order in
//! which [`SparseMatrix::spgemm`] adds them, so both paths agree bit for bit.

use rayon::prelude::*;

use super::{Dimension, HashTransform, HashTransformData, SketchOutput};
use crate::sparse::{CoordinateEntry, Scalar, SparseMatrix};
use crate::utils::errors::SketchError;

impl<F: Scalar> HashTransformData<F> {
    /// Shape of the sketch of an `nrows x ncols` input along `dim`, after
    /// checking that the reduced dimension is this transform's source
    /// dimension.
    pub fn output_shape(
        &self,
        nrows: usize,
        ncols: usize,
        dim: Dimension,
    ) -> Result<(usize, usize), SketchError> {
        let (source, shape) = match dim {
            Dimension::Columnwise => (nrows, (self.s(), ncols)),
            Dimension::Rowwise => (ncols, (nrows, self.s())),
        };
        if source != self.n() {
            return Err(SketchError::DimensionMismatch {
                expected: self.n(),
                actual: source,
            });
        }
        Ok(shape)
    }

    /// Writes the sketch of `a` into `out`, which must be empty and shaped
    /// for the result. Nothing is written if any check fails.
    #[tracing::instrument(skip_all, name = "HashTransformData::apply")]
    pub fn apply<O: SketchOutput<F>>(
        &self,
        a: &SparseMatrix<F>,
        out: &mut O,
        dim: Dimension,
    ) -> Result<(), SketchError> {
        let (nrows, ncols) = self.output_shape(a.nrows(), a.ncols(), dim)?;
        out.check_target(nrows, ncols)?;

        let target_index = self.target_index();
        let value = self.value();
        let entries: Vec<CoordinateEntry<F>> = (0..a.nrows())
            .into_par_iter()
            .flat_map_iter(|row| {
                a.row(row).map(move |(col, v)| match dim {
                    Dimension::Columnwise => {
                        CoordinateEntry::new(target_index[row], col, value[row] * v)
                    }
                    Dimension::Rowwise => {
                        CoordinateEntry::new(row, target_index[col], value[col] * v)
                    }
                })
            })
            .collect();
        tracing::debug!(
            ?dim,
            input_nnz = a.nnz(),
            rows = nrows,
            cols = ncols,
            "mapped sketch contributions"
        );

        out.fill(entries, nrows, ncols);
        Ok(())
    }
}

impl<F: Scalar, V> HashTransform<F, V> {
    /// See [`HashTransformData::apply`].
    pub fn apply<O: SketchOutput<F>>(
        &self,
        a: &SparseMatrix<F>,
        out: &mut O,
        dim: Dimension,
    ) -> Result<(), SketchError> {
        self.data().apply(a, out, dim)
    }

    /// [`HashTransform::apply`] with the dimension given as a binding tag:
    /// `0` for columnwise, `1` for rowwise.
    pub fn apply_dim<O: SketchOutput<F>>(
        &self,
        a: &SparseMatrix<F>,
        out: &mut O,
        dim: u8,
    ) -> Result<(), SketchError> {
        self.apply(a, out, Dimension::try_from(dim)?)
    }

    /// Sketch of `a` into a fresh [`SparseMatrix`].
    pub fn sketch(
        &self,
        a: &SparseMatrix<F>,
        dim: Dimension,
    ) -> Result<SparseMatrix<F>, SketchError> {
        let (nrows, ncols) = self.data().output_shape(a.nrows(), a.ncols(), dim)?;
        let mut out = SparseMatrix::zeros(nrows, ncols);
        self.apply(a, &mut out, dim)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{RandomContext, Uniform};
    use crate::sketch::CWT;
    use crate::sparse::{CompressedRowMatrix, PlusTimes};
    use rand::distributions::Distribution;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    /// `rows x cols` matrix with every entry stored, `A[i][j] = i * cols + j + 1`.
    fn counting_matrix(rows: usize, cols: usize) -> SparseMatrix<f64> {
        let (mut r, mut c, mut v) = (vec![], vec![], vec![]);
        for i in 0..rows * cols {
            r.push(i / cols);
            c.push(i % cols);
            v.push((i + 1) as f64);
        }
        SparseMatrix::from_triples(rows, cols, &r, &c, &v).unwrap()
    }

    fn random_matrix(rows: usize, cols: usize, density: f64, seed: u64) -> SparseMatrix<f64> {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let keep = Uniform::new(0.0, 1.0);
        let value = Uniform::new(-1.0, 1.0);
        let mut entries = vec![];
        for i in 0..rows {
            for j in 0..cols {
                if keep.sample(&mut rng) < density {
                    entries.push(CoordinateEntry::new(i, j, value.sample(&mut rng)));
                }
            }
        }
        SparseMatrix::from_entries(rows, cols, entries).unwrap()
    }

    #[test]
    fn columnwise_matches_explicit_product() {
        let a = counting_matrix(10, 5);
        let mut context = RandomContext::new(0);
        let sketch = CWT::<f64>::new(10, 6, &mut context).unwrap();

        let mut sketch_a = SparseMatrix::zeros(6, 5);
        sketch.apply(&a, &mut sketch_a, Dimension::Columnwise).unwrap();

        let expected = SparseMatrix::spgemm::<PlusTimes>(&sketch.sketch_matrix(), &a).unwrap();
        assert_eq!(sketch_a, expected);
    }

    #[test]
    fn columnwise_rows_are_signed_sums() {
        let a = counting_matrix(10, 5);
        let sketch = CWT::<f64>::new(10, 6, &mut RandomContext::new(0)).unwrap();
        let dense = sketch.sketch(&a, Dimension::Columnwise).unwrap().to_dense();

        let mut expected = vec![vec![0.0; 5]; 6];
        for i in 0..10 {
            for j in 0..5 {
                expected[sketch.target_index()[i]][j] +=
                    sketch.value()[i] * (i * 5 + j + 1) as f64;
            }
        }
        assert_eq!(dense, expected);
    }

    #[test]
    fn rowwise_matches_explicit_product() {
        let a = counting_matrix(10, 5);
        let mut context = RandomContext::new(0);
        context.allocate_stream();
        let sketch = CWT::<f64>::new(5, 3, &mut context).unwrap();

        let mut sketch_a = SparseMatrix::zeros(10, 3);
        sketch.apply(&a, &mut sketch_a, Dimension::Rowwise).unwrap();

        let pi_t = sketch.sketch_matrix().transpose();
        let expected = SparseMatrix::spgemm::<PlusTimes>(&a, &pi_t).unwrap();
        assert_eq!(sketch_a, expected);
    }

    #[test]
    fn random_matrices_match_exactly() {
        let mut context = RandomContext::new(2024);
        for (trial, &(rows, cols, s)) in [(40, 30, 7), (25, 60, 4), (100, 3, 9), (1, 17, 2)]
            .iter()
            .enumerate()
        {
            let a = random_matrix(rows, cols, 0.3, trial as u64);

            let by_rows = CWT::<f64>::new(rows, s, &mut context).unwrap();
            assert_eq!(
                by_rows.sketch(&a, Dimension::Columnwise).unwrap(),
                SparseMatrix::spgemm::<PlusTimes>(&by_rows.sketch_matrix(), &a).unwrap()
            );

            let by_cols = CWT::<f64>::new(cols, s, &mut context).unwrap();
            assert_eq!(
                by_cols.sketch(&a, Dimension::Rowwise).unwrap(),
                SparseMatrix::spgemm::<PlusTimes>(&a, &by_cols.sketch_matrix().transpose())
                    .unwrap()
            );
        }
    }

    #[test]
    fn local_output_matches_sparse_output() {
        let a = counting_matrix(10, 5);
        let sketch = CWT::<f64>::new(10, 6, &mut RandomContext::new(0)).unwrap();
        let expected = sketch.sketch(&a, Dimension::Columnwise).unwrap();

        let mut local = CompressedRowMatrix::new();
        sketch.apply(&a, &mut local, Dimension::Columnwise).unwrap();
        assert!(local.needs_update());
        assert_eq!(local.num_rows(), 6);
        assert_eq!(local.entries().collect::<Vec<_>>(), expected.entries().collect::<Vec<_>>());
    }

    #[test]
    fn dimension_tag_selects_mode() {
        let a = counting_matrix(10, 5);
        let columnwise = CWT::<f64>::new(10, 6, &mut RandomContext::new(1)).unwrap();
        let mut out = SparseMatrix::zeros(6, 5);
        columnwise.apply_dim(&a, &mut out, 0).unwrap();
        assert_eq!(out, columnwise.sketch(&a, Dimension::Columnwise).unwrap());

        let rowwise = CWT::<f64>::new(5, 3, &mut RandomContext::new(1)).unwrap();
        let mut out = SparseMatrix::zeros(10, 3);
        rowwise.apply_dim(&a, &mut out, 1).unwrap();
        assert_eq!(out, rowwise.sketch(&a, Dimension::Rowwise).unwrap());

        assert_eq!(
            rowwise.apply_dim(&a, &mut SparseMatrix::zeros(10, 3), 7),
            Err(SketchError::InvalidDimensionTag(7))
        );
    }

    #[test]
    fn rejects_source_dimension_mismatch() {
        let a = counting_matrix(10, 5);
        let sketch = CWT::<f64>::new(9, 6, &mut RandomContext::new(0)).unwrap();
        let mut out = SparseMatrix::zeros(6, 5);
        assert_eq!(
            sketch.apply(&a, &mut out, Dimension::Columnwise),
            Err(SketchError::DimensionMismatch {
                expected: 9,
                actual: 10
            })
        );
        assert_eq!(
            sketch.apply(&a, &mut SparseMatrix::zeros(10, 6), Dimension::Rowwise),
            Err(SketchError::DimensionMismatch {
                expected: 9,
                actual: 5
            })
        );
        assert_eq!(out.nnz(), 0);
    }

    #[test]
    fn rejects_wrong_or_dirty_output() {
        let a = counting_matrix(10, 5);
        let sketch = CWT::<f64>::new(10, 6, &mut RandomContext::new(0)).unwrap();

        let mut wrong_shape = SparseMatrix::zeros(6, 4);
        assert_eq!(
            sketch.apply(&a, &mut wrong_shape, Dimension::Columnwise),
            Err(SketchError::ShapeMismatch {
                expected: (6, 5),
                actual: (6, 4)
            })
        );

        let mut dirty = SparseMatrix::from_triples(6, 5, &[0], &[0], &[1.0]).unwrap();
        let before = dirty.clone();
        assert_eq!(
            sketch.apply(&a, &mut dirty, Dimension::Columnwise),
            Err(SketchError::OutputNotEmpty(1))
        );
        assert_eq!(dirty, before);

        let mut local = CompressedRowMatrix::with_rows(5);
        assert!(matches!(
            sketch.apply(&a, &mut local, Dimension::Columnwise),
            Err(SketchError::ShapeMismatch { .. })
        ));
        assert!(!local.needs_update());
    }

    #[test]
    fn transform_is_reusable_across_inputs() {
        let sketch = CWT::<f64>::new(10, 4, &mut RandomContext::new(6)).unwrap();
        let first = counting_matrix(10, 5);
        let second = random_matrix(10, 12, 0.5, 99);
        for a in [&first, &second] {
            assert_eq!(
                sketch.sketch(a, Dimension::Columnwise).unwrap(),
                SparseMatrix::spgemm::<PlusTimes>(&sketch.sketch_matrix(), a).unwrap()
            );
        }
    }
}
