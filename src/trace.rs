//! Tracing utilities for transform instrumentation
//!
//! Each stage of the spectral pipeline (mel construction, STFT, inverse STFT,
//! forward/inverse transform, cross-correlation) enters a named span. When
//! the `tracing` feature is enabled those spans go to the `tracing` crate;
//! without it the macros compile to no-ops.
//!
//! # Usage
//!
//! ```rust,ignore
//! fn forward() {
//!     let _span = trace_enter!("spectral_forward");
//!     trace_event!(frames = 128, "framed waveform");
//! }
//! ```

/// Placeholder for span guard when tracing is disabled
#[cfg(not(feature = "tracing"))]
pub struct NoopSpanGuard;

/// Enter a tracing span (no-op when tracing feature is disabled)
#[macro_export]
#[cfg(feature = "tracing")]
macro_rules! trace_enter {
    ($name:expr) => {
        tracing::span!(tracing::Level::DEBUG, $name).entered()
    };
}

/// Enter a tracing span (no-op when tracing feature is disabled)
#[macro_export]
#[cfg(not(feature = "tracing"))]
macro_rules! trace_enter {
    ($name:expr) => {
        $crate::trace::NoopSpanGuard
    };
}

/// Log a tracing event (no-op when tracing feature is disabled)
#[macro_export]
#[cfg(feature = "tracing")]
macro_rules! trace_event {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

/// Log a tracing event (no-op when tracing feature is disabled)
#[macro_export]
#[cfg(not(feature = "tracing"))]
macro_rules! trace_event {
    ($($arg:tt)*) => {};
}

// Re-export macros at module level
pub use trace_enter;
pub use trace_event;
