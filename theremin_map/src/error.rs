//! Error types for the mapping pipeline.

use thiserror::Error;

/// Construction-time failures: a frame, policy or range that can never
/// produce a meaningful value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    /// The sample buffer cannot hold `height` rows of `stride` samples.
    #[error("depth buffer too small: {width}x{height} (stride {stride}) needs {needed} samples, got {actual}")]
    BufferTooSmall {
        width:  usize,
        height: usize,
        stride: usize,
        needed: usize,
        actual: usize,
    },

    /// A row stride shorter than the row itself.
    #[error("row stride {stride} is narrower than frame width {width}")]
    StrideTooNarrow { stride: usize, width: usize },

    /// Depth policy constants that contradict each other.
    #[error("invalid depth policy: {0}")]
    InvalidPolicy(String),

    /// Frequency band that is empty, inverted or not finite.
    #[error("invalid frequency range: {min_hz} Hz .. {max_hz} Hz")]
    InvalidRange { min_hz: f64, max_hz: f64 },
}

/// Failure to start the motion sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MotionError {
    #[error("device motion is not available")]
    Unavailable,
}
