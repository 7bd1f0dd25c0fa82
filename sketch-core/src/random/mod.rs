pub mod context;
pub mod distributions;

pub use context::{RandomContext, StreamId, StreamProvider};
pub use distributions::{Levy, Rademacher, Uniform, UniformCategory};
