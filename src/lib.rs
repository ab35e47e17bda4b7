//! # gansynth-spectral
//!
//! Spectral transforms for GANSynth-style audio synthesis: fixed-length
//! waveforms become a pair of `[time_steps, num_freq_bins]` channels, a
//! normalized log-mel magnitude and a normalized mel instantaneous frequency,
//! and are reconstructed from them.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gansynth_spectral::{SpectralConfig, SpectralTransform};
//!
//! // NSynth setup: 4 s at 16 kHz, 128 frames of 1024 mel bins, 75% overlap
//! let transform = SpectralTransform::new(SpectralConfig::default())?;
//! let pair = transform.to_spectrograms(&waveform)?;
//! let reconstructed = transform.to_waveform(&pair)?;
//! ```
//!
//! ## Features
//!
//! - `parallel` (default): batch conversion across rayon's thread pool
//! - `tracing`: spans around every pipeline stage
//! - `cli`: the `gansynth-spectral` command-line tool

#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]

#[macro_use]
pub mod trace;

pub mod audio;
pub mod config;
pub mod correlation;
pub mod error;
/// Batch parallelism with sequential fallback
pub mod parallel;
pub mod spectrogram;
pub mod transform;

/// CLI module for the native command-line tool
#[cfg(feature = "cli")]
pub mod cli;

pub use config::{
    FramingParams, Normalization, PaddingMode, SpectralConfig, SpectrogramShape,
};
pub use correlation::{cross_correlate, cross_correlation, reconstruction_scores, Histogram, Padding};
pub use error::{SpectralError, SpectralResult};
pub use spectrogram::{linear_map, Axis, MelSpectrogramPair, Spectrogram, SpectrogramStats};
pub use transform::{to_spectrograms, to_waveforms, SpectralTransform};
