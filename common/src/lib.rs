pub mod metrics;
pub mod tracer;

/// Scalar type of samples, filter outputs and characteristic functions.
pub type Real = f64;

/// Position of a sample in a stream.
/// Signed so that indices relative to the current block may reach back into earlier blocks.
pub type SampleIndex = i64;
