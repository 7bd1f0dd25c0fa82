use std::marker::PhantomData;

use common::SketchType;
use rand::distributions::Distribution;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

use crate::random::{RandomContext, Rademacher, StreamId, StreamProvider, Uniform};
use crate::sparse::{CoordinateEntry, Scalar, SparseMatrix};
use crate::utils::errors::SketchError;

/// Value distribution of a one-nonzero-per-column transform, together with
/// the name the transform is serialized under.
pub trait HashValueDistribution<F>: Distribution<F> + Default {
    const SKETCH_TYPE: SketchType;
}

impl<F: Scalar> HashValueDistribution<F> for Rademacher
where
    Rademacher: Distribution<F>,
{
    const SKETCH_TYPE: SketchType = SketchType::Cwt;
}

/// Everything needed to regenerate a transform bit for bit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashTransformDescriptor {
    pub sketch_type: SketchType,
    /// Source dimension.
    pub n: usize,
    /// Target dimension.
    pub s: usize,
    pub seed: u64,
    pub stream: StreamId,
}

/// The random data of a hashing transform: column `i` of the `s x n` sketch
/// matrix has a single nonzero `value[i]` at row `target_index[i]`.
///
/// For a CWT every value is a sign in `{-1, +1}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HashTransformData<F> {
    n: usize,
    s: usize,
    target_index: Vec<usize>,
    value: Vec<F>,
}

impl<'de, F: Deserialize<'de>> Deserialize<'de> for HashTransformData<F> {
    /// Accepts only data [`HashTransformData::generate`] could have produced:
    /// `n` targets and `n` values, every target below a positive `s`.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        #[derive(Deserialize)]
        struct Raw<F> {
            n: usize,
            s: usize,
            target_index: Vec<usize>,
            value: Vec<F>,
        }

        let Raw {
            n,
            s,
            target_index,
            value,
        } = Raw::deserialize(deserializer)?;
        if s == 0 {
            return Err(D::Error::custom("target dimension must be positive"));
        }
        if target_index.len() != n || value.len() != n {
            return Err(D::Error::custom(format!(
                "{} targets and {} values for source dimension {n}",
                target_index.len(),
                value.len()
            )));
        }
        if let Some(&target) = target_index.iter().find(|&&target| target >= s) {
            return Err(D::Error::custom(format!(
                "target {target} out of bounds for target dimension {s}"
            )));
        }
        Ok(Self {
            n,
            s,
            target_index,
            value,
        })
    }
}

impl<F: Scalar> HashTransformData<F> {
    /// Draws `n` independent `(target_index, value)` pairs from `rng`: for
    /// each source index one uniform target in `[0, s)` followed by one draw
    /// of `value_distribution`.
    #[tracing::instrument(skip_all, name = "HashTransformData::generate")]
    pub fn generate<V, R>(
        n: usize,
        s: usize,
        value_distribution: &V,
        rng: &mut R,
    ) -> Result<Self, SketchError>
    where
        V: Distribution<F>,
        R: Rng + ?Sized,
    {
        if s == 0 {
            return Err(SketchError::InvalidDimension(format!(
                "target dimension must be positive (source dimension {n})"
            )));
        }

        let index_distribution = Uniform::new(0usize, s);
        let mut target_index = Vec::with_capacity(n);
        let mut value = Vec::with_capacity(n);
        for _ in 0..n {
            target_index.push(index_distribution.sample(rng));
            value.push(value_distribution.sample(rng));
        }
        tracing::debug!(n, s, "generated hash transform");

        Ok(Self {
            n,
            s,
            target_index,
            value,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn s(&self) -> usize {
        self.s
    }

    pub fn target_index(&self) -> &[usize] {
        &self.target_index
    }

    pub fn value(&self) -> &[F] {
        &self.value
    }

    /// The explicit `s x n` sketch matrix.
    pub fn sketch_matrix(&self) -> SparseMatrix<F> {
        let entries = self
            .target_index
            .iter()
            .zip(&self.value)
            .enumerate()
            .map(|(i, (&row, &value))| CoordinateEntry::new(row, i, value))
            .collect();
        SparseMatrix::from_entries_unchecked(self.s, self.n, entries)
    }
}

/// A hashing transform with its provenance.
#[derive(Clone, Debug, PartialEq)]
pub struct HashTransform<F, V = Rademacher> {
    descriptor: HashTransformDescriptor,
    data: HashTransformData<F>,
    _distribution: PhantomData<V>,
}

/// Clarkson-Woodruff transform (CountSketch).
pub type CWT<F> = HashTransform<F, Rademacher>;

impl<F: Scalar, V: HashValueDistribution<F>> HashTransform<F, V> {
    /// Reserves a fresh stream from `context` and draws an `s x n` transform
    /// from it.
    pub fn new(n: usize, s: usize, context: &mut RandomContext) -> Result<Self, SketchError> {
        if s == 0 {
            return Err(SketchError::InvalidDimension(format!(
                "target dimension must be positive (source dimension {n})"
            )));
        }
        let stream = context.allocate_stream();
        Self::from_stream(n, s, &*context, stream)
    }

    /// Draws the transform from stream `stream` of `provider`. The descriptor
    /// records the provider's own seed, so it always regenerates this data.
    pub fn from_stream<P: StreamProvider>(
        n: usize,
        s: usize,
        provider: &P,
        stream: StreamId,
    ) -> Result<Self, SketchError> {
        let seed = provider.seed();
        let mut rng = provider.stream(stream);
        let data = HashTransformData::generate(n, s, &V::default(), &mut rng)?;
        Ok(Self {
            descriptor: HashTransformDescriptor {
                sketch_type: V::SKETCH_TYPE,
                n,
                s,
                seed,
                stream,
            },
            data,
            _distribution: PhantomData,
        })
    }

    /// Regenerates the transform a descriptor was taken from.
    pub fn from_descriptor(descriptor: &HashTransformDescriptor) -> Result<Self, SketchError> {
        if descriptor.sketch_type != V::SKETCH_TYPE {
            return Err(SketchError::SketchTypeMismatch {
                expected: V::SKETCH_TYPE,
                actual: descriptor.sketch_type,
            });
        }
        let context = RandomContext::new(descriptor.seed);
        Self::from_stream(descriptor.n, descriptor.s, &context, descriptor.stream)
    }
}

impl<F: Scalar, V> HashTransform<F, V> {
    pub fn descriptor(&self) -> &HashTransformDescriptor {
        &self.descriptor
    }

    pub fn data(&self) -> &HashTransformData<F> {
        &self.data
    }

    pub fn n(&self) -> usize {
        self.data.n
    }

    pub fn s(&self) -> usize {
        self.data.s
    }

    pub fn target_index(&self) -> &[usize] {
        &self.data.target_index
    }

    pub fn value(&self) -> &[F] {
        &self.data.value
    }

    pub fn sketch_matrix(&self) -> SparseMatrix<F> {
        self.data.sketch_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn same_seed_same_sketch() {
        let a = CWT::<f64>::new(100, 7, &mut RandomContext::new(5)).unwrap();
        let b = CWT::<f64>::new(100, 7, &mut RandomContext::new(5)).unwrap();
        assert_eq!(a.target_index(), b.target_index());
        assert_eq!(a.value(), b.value());
        assert_eq!(a, b);
    }

    #[test]
    fn consecutive_sketches_use_distinct_streams() {
        let mut context = RandomContext::new(5);
        let first = CWT::<f64>::new(100, 7, &mut context).unwrap();
        let second = CWT::<f64>::new(100, 7, &mut context).unwrap();
        assert_eq!(first.descriptor().stream, 0);
        assert_eq!(second.descriptor().stream, 1);
        assert_ne!(first.target_index(), second.target_index());
    }

    #[test]
    fn descriptor_regenerates_identically() {
        let mut context = RandomContext::new(77);
        context.allocate_stream();
        let sketch = CWT::<f32>::new(64, 9, &mut context).unwrap();

        let json = serde_json::to_string(sketch.descriptor()).unwrap();
        let descriptor: HashTransformDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(descriptor.sketch_type, SketchType::Cwt);
        assert_eq!(descriptor.stream, 1);

        let regenerated = CWT::<f32>::from_descriptor(&descriptor).unwrap();
        assert_eq!(regenerated, sketch);
    }

    #[test]
    fn generate_is_deterministic_for_a_fixed_engine() {
        let generate = || {
            let mut rng = ChaCha20Rng::seed_from_u64(1234);
            HashTransformData::<f64>::generate(50, 4, &Rademacher, &mut rng).unwrap()
        };
        assert_eq!(generate(), generate());
    }

    #[test]
    fn draws_interleave_index_then_value() {
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let data = HashTransformData::<f64>::generate(20, 5, &Rademacher, &mut rng).unwrap();

        let mut rng = ChaCha20Rng::seed_from_u64(8);
        for i in 0..20 {
            let index: usize = Uniform::new(0usize, 5).sample(&mut rng);
            let value: f64 = Rademacher.sample(&mut rng);
            assert_eq!(data.target_index()[i], index);
            assert_eq!(data.value()[i], value);
        }
    }

    #[test]
    fn structure_is_in_range() {
        let sketch = CWT::<f64>::new(10_000, 13, &mut RandomContext::new(0)).unwrap();
        assert_eq!(sketch.target_index().len(), 10_000);
        assert!(sketch.target_index().iter().all(|&t| t < 13));
        assert!(sketch.value().iter().all(|&v| v == 1.0 || v == -1.0));
    }

    #[test]
    fn targets_are_uniform_and_signs_balanced() {
        const N: usize = 60_000;
        const S: usize = 12;
        let sketch = CWT::<f64>::new(N, S, &mut RandomContext::new(31)).unwrap();

        let mut buckets = [0usize; S];
        for &t in sketch.target_index() {
            buckets[t] += 1;
        }
        let expected = (N / S) as f64;
        for count in buckets {
            assert!(
                (count as f64 - expected).abs() < 0.06 * expected,
                "bucket count {count} too far from {expected}"
            );
        }

        let positives = sketch.value().iter().filter(|&&v| v > 0.0).count();
        let ratio = positives as f64 / N as f64;
        assert!((ratio - 0.5).abs() < 0.01, "ratio {ratio}");
    }

    #[test]
    fn invalid_target_dimension_fails_fast() {
        let mut context = RandomContext::new(0);
        assert!(matches!(
            CWT::<f64>::new(10, 0, &mut context),
            Err(SketchError::InvalidDimension(_))
        ));
        // The failed call must not consume a stream.
        assert_eq!(context.counter(), 0);
    }

    #[test]
    fn empty_source_dimension_is_allowed() {
        let sketch = CWT::<f64>::new(0, 3, &mut RandomContext::new(0)).unwrap();
        assert!(sketch.target_index().is_empty());
        assert_eq!(sketch.sketch_matrix().shape(), (3, 0));
    }

    #[test]
    fn sketch_matrix_has_one_nonzero_per_column() {
        let sketch = CWT::<f64>::new(40, 6, &mut RandomContext::new(3)).unwrap();
        let pi = sketch.sketch_matrix();
        assert_eq!(pi.shape(), (6, 40));
        assert_eq!(pi.nnz(), 40);
        for i in 0..40 {
            assert_eq!(pi.get(sketch.target_index()[i], i), Some(sketch.value()[i]));
        }
    }

    #[test]
    fn descriptor_records_the_provider_seed() {
        let provider = RandomContext::new(1);
        let sketch = CWT::<f64>::from_stream(50, 7, &provider, 2).unwrap();
        assert_eq!(sketch.descriptor().seed, 1);
        assert_eq!(sketch.descriptor().stream, 2);

        let regenerated = CWT::<f64>::from_descriptor(sketch.descriptor()).unwrap();
        assert_eq!(regenerated, sketch);
    }

    #[test]
    fn decoded_data_round_trips() {
        let sketch = CWT::<f64>::new(30, 4, &mut RandomContext::new(12)).unwrap();
        let json = serde_json::to_string(sketch.data()).unwrap();
        let decoded: HashTransformData<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(&decoded, sketch.data());
    }

    #[test]
    fn decoding_rejects_inconsistent_data() {
        let decode = |json: &str| serde_json::from_str::<HashTransformData<f64>>(json);
        // too few targets for the source dimension
        assert!(decode(r#"{"n":3,"s":2,"target_index":[0],"value":[1.0]}"#).is_err());
        // target past the end
        assert!(decode(r#"{"n":1,"s":2,"target_index":[2],"value":[1.0]}"#).is_err());
        assert!(decode(r#"{"n":1,"s":0,"target_index":[0],"value":[1.0]}"#).is_err());
        assert!(decode(r#"{"n":2,"s":2,"target_index":[0,1],"value":[1.0]}"#).is_err());
        assert!(decode(r#"{"n":1,"s":2,"target_index":[1],"value":[-1.0]}"#).is_ok());
    }
}
