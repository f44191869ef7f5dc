use thiserror::Error;

/// Fatal, input-level failures. Every other failure mode inside the engine
/// (numerical degeneracy, an empty sub-window, a candidate that fails its own
/// acceptance test) is non-fatal and is reported as a warning string instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("series has {actual} bars, need at least {minimum}")]
    TooFewBars { actual: usize, minimum: usize },

    #[error("malformed bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: String },

    #[error("timestamps are not strictly increasing at index {index}")]
    NonMonotonicTimestamps { index: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
