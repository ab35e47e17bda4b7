//! Error types for gansynth-spectral

use thiserror::Error;

/// Result type alias for spectral operations
pub type SpectralResult<T> = Result<T, SpectralError>;

/// Errors that can occur while building or running a spectral transform
#[derive(Debug, Error)]
pub enum SpectralError {
    /// Invalid transform configuration (rejected at construction time)
    #[error("config error: {0}")]
    Config(String),

    /// Input array does not have the shape the transform was built for
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        actual: Vec<usize>,
    },

    /// Invalid audio data or parameters
    #[error("audio error: {0}")]
    Audio(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Config (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SpectralError {
    /// Shorthand for a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Shorthand for a shape mismatch
    #[must_use]
    pub fn shape(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}
