/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 123834;

/// Binding-layer tag selecting columnwise application (reduce the row count).
pub const COLUMNWISE_TAG: u8 = 0;
/// Binding-layer tag selecting rowwise application (reduce the column count).
pub const ROWWISE_TAG: u8 = 1;
