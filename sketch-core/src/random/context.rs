use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

pub type StreamId = u64;

/// Hands out reproducible, mutually independent uniform engines keyed by an
/// integer stream id.
pub trait StreamProvider {
    type Engine: RngCore;

    /// Seed every stream of this provider derives from.
    fn seed(&self) -> u64;

    fn stream(&self, id: StreamId) -> Self::Engine;
}

/// Seeded source of random streams.
///
/// Each logical sketch reserves its own stream id through
/// [`RandomContext::allocate_stream`], so no two sketches ever interleave
/// draws on a shared engine. Rebuilding the stream for the same `(seed, id)`
/// yields the same engine, which is what lets a sketch be regenerated from
/// its descriptor alone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomContext {
    seed: u64,
    counter: StreamId,
}

impl RandomContext {
    pub fn new(seed: u64) -> Self {
        Self { seed, counter: 0 }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Next stream id that [`RandomContext::allocate_stream`] will return.
    pub fn counter(&self) -> StreamId {
        self.counter
    }

    pub fn allocate_stream(&mut self) -> StreamId {
        let id = self.counter;
        self.counter += 1;
        tracing::debug!(seed = self.seed, stream = id, "allocated random stream");
        id
    }
}

impl StreamProvider for RandomContext {
    type Engine = ChaCha20Rng;

    fn seed(&self) -> u64 {
        self.seed
    }

    fn stream(&self, id: StreamId) -> ChaCha20Rng {
        let mut rng = ChaCha20Rng::seed_from_u64(self.seed);
        rng.set_stream(id);
        rng
    }
}
