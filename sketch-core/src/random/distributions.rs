//! Single-draw random variates.
//!
//! Every variate here is a stateless value object implementing
//! [`Distribution`]. Each call to `sample` builds a fresh parameterized
//! distribution and draws exactly one value from the caller's engine, so the
//! number of engine words consumed per draw only depends on the variate and
//! never on earlier calls.

use rand::distributions::{Distribution, Uniform as RangeDistribution, WeightedIndex};
use rand::Rng;
use rand_distr::Gamma;

/// Outcome weights of the Rademacher draw. The middle outcome is unreachable,
/// which maps `{0, 2}` onto `{-1, +1}` through `outcome - 1`.
const RADEMACHER_WEIGHTS: [f64; 3] = [0.5, 0.0, 0.5];

const LEVY_GAMMA_SHAPE: f64 = 0.5;
const LEVY_GAMMA_SCALE: f64 = 2.0;

mod sealed {
    pub trait Sealed {}
}

/// Value types that [`Uniform`] can draw. There is one implementation per
/// numeric category: integers and reals draw on `[low, high)`, booleans are a
/// fair coin and ignore the range.
pub trait UniformCategory: Copy + sealed::Sealed {
    fn draw<R: Rng + ?Sized>(low: Self, high: Self, rng: &mut R) -> Self;
}

macro_rules! impl_uniform_half_open {
    ($($t:ty),*) => {
        $(
            impl sealed::Sealed for $t {}

            impl UniformCategory for $t {
                #[inline]
                fn draw<R: Rng + ?Sized>(low: Self, high: Self, rng: &mut R) -> Self {
                    RangeDistribution::new(low, high).sample(rng)
                }
            }
        )*
    };
}

// integers
impl_uniform_half_open!(i32, i64, u32, u64, usize);
// reals
impl_uniform_half_open!(f32, f64);

impl sealed::Sealed for bool {}

impl UniformCategory for bool {
    #[inline]
    fn draw<R: Rng + ?Sized>(_low: Self, _high: Self, rng: &mut R) -> Self {
        RangeDistribution::new_inclusive(0u8, 1u8).sample(rng) == 1
    }
}

/// Uniform variate on `[low, high)`.
///
/// `low < high` is a precondition for integers and reals; violating it panics
/// inside the draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Uniform<T> {
    low: T,
    high: T,
}

impl<T: UniformCategory> Uniform<T> {
    pub fn new(low: T, high: T) -> Self {
        Self { low, high }
    }

    pub fn low(&self) -> T {
        self.low
    }

    pub fn high(&self) -> T {
        self.high
    }
}

impl Uniform<bool> {
    /// A fair coin.
    pub fn coin() -> Self {
        Self::new(false, true)
    }
}

impl<T: UniformCategory> Distribution<T> for Uniform<T> {
    #[inline]
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        T::draw(self.low, self.high, rng)
    }
}

/// `+1` or `-1` with equal probability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rademacher;

impl Rademacher {
    #[inline]
    fn outcome<R: Rng + ?Sized>(rng: &mut R) -> usize {
        WeightedIndex::new(RADEMACHER_WEIGHTS)
            .expect("Rademacher weights are non-negative with a positive sum")
            .sample(rng)
    }
}

macro_rules! impl_rademacher {
    ($($t:ty),*) => {
        $(
            impl Distribution<$t> for Rademacher {
                #[inline]
                fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> $t {
                    Self::outcome(rng) as $t - 1 as $t
                }
            }
        )*
    };
}

impl_rademacher!(i32, i64, f32, f64);

/// Heavy-tailed variate `1 / y` with `y ~ Gamma(0.5, 2)`, i.e. a standard
/// Lévy draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Levy;

macro_rules! impl_levy {
    ($($t:ty),*) => {
        $(
            impl Distribution<$t> for Levy {
                #[inline]
                fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> $t {
                    let gamma = Gamma::<$t>::new(LEVY_GAMMA_SHAPE as $t, LEVY_GAMMA_SCALE as $t)
                        .expect("Levy gamma parameters are positive");
                    let y: $t = gamma.sample(rng);
                    1.0 / y
                }
            }
        )*
    };
}

impl_levy!(f32, f64);
