//! Transform configuration
//!
//! Everything the forward and inverse transforms need is carried by a
//! [`SpectralConfig`] value: there are no module-level tunables. The same
//! config must be used in both directions for the inverse to line up with
//! the forward transform.
//!
//! Configs round-trip through JSON so the CLI (and any training harness) can
//! keep them next to a dataset:
//!
//! ```json
//! {
//!   "waveform_length": 64000,
//!   "sample_rate": 16000,
//!   "spectrogram_shape": { "time_steps": 128, "num_freq_bins": 1024 },
//!   "overlap": 0.75
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SpectralError, SpectralResult};

/// Default waveform length (4 s at 16 kHz, the NSynth clip length)
pub const DEFAULT_WAVEFORM_LENGTH: usize = 64000;

/// Default time resolution of the spectrogram
pub const DEFAULT_TIME_STEPS: usize = 128;

/// Default frequency resolution of the spectrogram
pub const DEFAULT_NUM_FREQ_BINS: usize = 1024;

/// Default frame overlap
pub const DEFAULT_OVERLAP: f64 = 0.75;

/// Floor added to mel magnitudes before taking the log
pub const DEFAULT_LOG_FLOOR: f32 = 1e-6;

/// Target time/frequency resolution of a mel spectrogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpectrogramShape {
    /// Number of STFT frames
    pub time_steps: usize,
    /// Number of frequency (and mel) bins; the STFT frame is twice this long
    pub num_freq_bins: usize,
}

impl SpectrogramShape {
    /// Create a new shape
    #[must_use]
    pub const fn new(time_steps: usize, num_freq_bins: usize) -> Self {
        Self {
            time_steps,
            num_freq_bins,
        }
    }

    /// Shape as `[time_steps, num_freq_bins]`
    #[must_use]
    pub const fn dims(&self) -> [usize; 2] {
        [self.time_steps, self.num_freq_bins]
    }

    /// Total number of cells
    #[must_use]
    pub const fn len(&self) -> usize {
        self.time_steps * self.num_freq_bins
    }

    /// True if either dimension is zero
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SpectrogramShape {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_STEPS, DEFAULT_NUM_FREQ_BINS)
    }
}

impl From<(usize, usize)> for SpectrogramShape {
    fn from((time_steps, num_freq_bins): (usize, usize)) -> Self {
        Self::new(time_steps, num_freq_bins)
    }
}

/// Affine normalization `(x - mean) / std`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    /// Value mapped to zero
    pub mean: f32,
    /// Value mapped to unit scale
    pub std: f32,
}

impl Normalization {
    /// Empirical constants for NSynth log-mel magnitudes
    pub const LOG_MAGNITUDE: Self = Self {
        mean: -3.76,
        std: 10.05,
    };

    /// Instantaneous frequencies are already in roughly [-1, 1]
    pub const INSTANTANEOUS_FREQUENCY: Self = Self {
        mean: 0.0,
        std: 1.0,
    };

    /// Create a new normalization
    #[must_use]
    pub const fn new(mean: f32, std: f32) -> Self {
        Self { mean, std }
    }

    /// Map a raw value to normalized scale
    #[inline]
    #[must_use]
    pub fn normalize(&self, x: f32) -> f32 {
        (x - self.mean) / self.std
    }

    /// Map a normalized value back to raw scale
    #[inline]
    #[must_use]
    pub fn unnormalize(&self, x: f32) -> f32 {
        x.mul_add(self.std, self.mean)
    }

    fn validate(&self, what: &str) -> SpectralResult<()> {
        if !self.mean.is_finite() || !self.std.is_finite() || self.std == 0.0 {
            return Err(SpectralError::config(format!(
                "{what} normalization needs finite mean and non-zero std, got mean={} std={}",
                self.mean, self.std
            )));
        }
        Ok(())
    }
}

/// Where the zero padding up to `num_samples` goes
///
/// NSynth clips are trimmed at the start, so the default puts all padding
/// in front and pushes the overlap-add edge effects to the tail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingMode {
    /// All padding before the waveform
    #[default]
    Front,
    /// All padding after the waveform
    Back,
    /// Half before (rounded down), the rest after
    Symmetric,
}

impl PaddingMode {
    /// Split `total` padding samples into `(before, after)`
    #[must_use]
    pub const fn split(self, total: usize) -> (usize, usize) {
        match self {
            Self::Front => (total, 0),
            Self::Back => (0, total),
            Self::Symmetric => (total / 2, total - total / 2),
        }
    }
}

/// STFT framing derived from a [`SpectrogramShape`] and an overlap fraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramingParams {
    /// Samples per frame (`2 * num_freq_bins`); also the FFT length
    pub frame_length: usize,
    /// Hop between frames
    pub frame_step: usize,
    /// Padded signal length that yields exactly `time_steps` frames
    pub num_samples: usize,
}

impl FramingParams {
    /// Derive framing for `shape` at `overlap`
    ///
    /// # Errors
    /// Returns a config error if the shape is empty, `overlap` is outside
    /// `[0, 1)`, or the hop rounds to zero samples.
    pub fn derive(shape: SpectrogramShape, overlap: f64) -> SpectralResult<Self> {
        if shape.time_steps == 0 {
            return Err(SpectralError::config("time_steps must be positive"));
        }
        if shape.num_freq_bins == 0 {
            return Err(SpectralError::config("num_freq_bins must be positive"));
        }
        if !overlap.is_finite() || !(0.0..1.0).contains(&overlap) {
            return Err(SpectralError::config(format!(
                "overlap must be in [0, 1), got {overlap}"
            )));
        }

        let frame_length = 2 * shape.num_freq_bins;
        let frame_step = ((1.0 - overlap) * frame_length as f64).round() as usize;
        if frame_step == 0 {
            return Err(SpectralError::config(format!(
                "overlap {overlap} leaves no hop for frame length {frame_length}"
            )));
        }
        let num_samples = frame_step * (shape.time_steps - 1) + frame_length;

        Ok(Self {
            frame_length,
            frame_step,
            num_samples,
        })
    }

    /// Number of frames that cover `num_samples`
    #[must_use]
    pub const fn num_frames(&self) -> usize {
        (self.num_samples - self.frame_length) / self.frame_step + 1
    }

    /// Number of one-sided FFT bins including DC and Nyquist
    #[must_use]
    pub const fn fft_bins(&self) -> usize {
        self.frame_length / 2 + 1
    }
}

fn default_overlap() -> f64 {
    DEFAULT_OVERLAP
}

fn default_log_floor() -> f32 {
    DEFAULT_LOG_FLOOR
}

fn default_log_magnitude_norm() -> Normalization {
    Normalization::LOG_MAGNITUDE
}

fn default_instantaneous_frequency_norm() -> Normalization {
    Normalization::INSTANTANEOUS_FREQUENCY
}

/// Full configuration of a spectral transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralConfig {
    /// Length `L` of every waveform, in samples
    pub waveform_length: usize,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Target spectrogram shape
    #[serde(default)]
    pub spectrogram_shape: SpectrogramShape,
    /// Fraction of each frame shared with the next, in `[0, 1)`
    #[serde(default = "default_overlap")]
    pub overlap: f64,
    /// Lower edge of the mel filterbank in Hz
    #[serde(default)]
    pub lower_edge_hz: f64,
    /// Upper edge of the mel filterbank in Hz (Nyquist when absent)
    #[serde(default)]
    pub upper_edge_hz: Option<f64>,
    /// Padding placement
    #[serde(default)]
    pub padding: PaddingMode,
    /// Normalization of the log-mel magnitude channel
    #[serde(default = "default_log_magnitude_norm")]
    pub log_magnitude_norm: Normalization,
    /// Normalization of the instantaneous-frequency channel
    #[serde(default = "default_instantaneous_frequency_norm")]
    pub instantaneous_frequency_norm: Normalization,
    /// Floor added before the log
    #[serde(default = "default_log_floor")]
    pub log_floor: f32,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_WAVEFORM_LENGTH,
            crate::audio::DEFAULT_SAMPLE_RATE,
            SpectrogramShape::default(),
            DEFAULT_OVERLAP,
        )
    }
}

impl SpectralConfig {
    /// Create a config with default mel edges, padding and normalization
    #[must_use]
    pub fn new(
        waveform_length: usize,
        sample_rate: u32,
        spectrogram_shape: SpectrogramShape,
        overlap: f64,
    ) -> Self {
        Self {
            waveform_length,
            sample_rate,
            spectrogram_shape,
            overlap,
            lower_edge_hz: 0.0,
            upper_edge_hz: None,
            padding: PaddingMode::Front,
            log_magnitude_norm: Normalization::LOG_MAGNITUDE,
            instantaneous_frequency_norm: Normalization::INSTANTANEOUS_FREQUENCY,
            log_floor: DEFAULT_LOG_FLOOR,
        }
    }

    /// Set the overlap fraction
    #[must_use]
    pub fn with_overlap(mut self, overlap: f64) -> Self {
        self.overlap = overlap;
        self
    }

    /// Set the padding placement
    #[must_use]
    pub fn with_padding(mut self, padding: PaddingMode) -> Self {
        self.padding = padding;
        self
    }

    /// Set the mel filterbank edges in Hz
    #[must_use]
    pub fn with_mel_edges(mut self, lower_edge_hz: f64, upper_edge_hz: f64) -> Self {
        self.lower_edge_hz = lower_edge_hz;
        self.upper_edge_hz = Some(upper_edge_hz);
        self
    }

    /// Set both channel normalizations
    #[must_use]
    pub fn with_normalization(mut self, log_magnitude: Normalization, inst_freq: Normalization) -> Self {
        self.log_magnitude_norm = log_magnitude;
        self.instantaneous_frequency_norm = inst_freq;
        self
    }

    /// Set the log floor
    #[must_use]
    pub fn with_log_floor(mut self, log_floor: f32) -> Self {
        self.log_floor = log_floor;
        self
    }

    /// Nyquist frequency in Hz
    #[must_use]
    pub fn nyquist_hz(&self) -> f64 {
        f64::from(self.sample_rate) / 2.0
    }

    /// Effective upper mel edge in Hz
    #[must_use]
    pub fn upper_edge(&self) -> f64 {
        self.upper_edge_hz.unwrap_or_else(|| self.nyquist_hz())
    }

    /// Derive the STFT framing
    ///
    /// # Errors
    /// See [`FramingParams::derive`].
    pub fn framing(&self) -> SpectralResult<FramingParams> {
        FramingParams::derive(self.spectrogram_shape, self.overlap)
    }

    /// Check every field and return the derived framing
    ///
    /// # Errors
    /// Returns a config error describing the first invalid field.
    pub fn validate(&self) -> SpectralResult<FramingParams> {
        if self.sample_rate == 0 {
            return Err(SpectralError::config("sample_rate must be positive"));
        }
        if self.waveform_length == 0 {
            return Err(SpectralError::config("waveform_length must be positive"));
        }

        let framing = self.framing()?;
        if framing.num_samples < self.waveform_length {
            return Err(SpectralError::config(format!(
                "spectrogram covers {} samples but waveform_length is {}",
                framing.num_samples, self.waveform_length
            )));
        }

        let nyquist = self.nyquist_hz();
        let upper = self.upper_edge();
        if !self.lower_edge_hz.is_finite() || self.lower_edge_hz < 0.0 {
            return Err(SpectralError::config(format!(
                "lower_edge_hz must be non-negative, got {}",
                self.lower_edge_hz
            )));
        }
        if !upper.is_finite() || upper <= self.lower_edge_hz || upper > nyquist {
            return Err(SpectralError::config(format!(
                "upper_edge_hz must be in ({}, {nyquist}], got {upper}",
                self.lower_edge_hz
            )));
        }

        if !self.log_floor.is_finite() || self.log_floor <= 0.0 {
            return Err(SpectralError::config(format!(
                "log_floor must be positive, got {}",
                self.log_floor
            )));
        }
        self.log_magnitude_norm.validate("log-magnitude")?;
        self.instantaneous_frequency_norm
            .validate("instantaneous-frequency")?;

        Ok(framing)
    }

    /// Parse a config from JSON
    ///
    /// # Errors
    /// Returns a serialization error on malformed JSON.
    pub fn from_json_str(json: &str) -> SpectralResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config from a JSON file
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be read, or a serialization
    /// error if it is not a valid config.
    pub fn from_json_file(path: impl AsRef<Path>) -> SpectralResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty-printed JSON
    ///
    /// # Errors
    /// Returns a serialization error if a float is not representable.
    pub fn to_json(&self) -> SpectralResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SpectralConfig::default();
        assert_eq!(config.waveform_length, 64000);
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.spectrogram_shape, SpectrogramShape::new(128, 1024));
        assert!((config.overlap - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.padding, PaddingMode::Front);
        assert!((config.upper_edge() - 8000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_nsynth_framing() {
        let framing = SpectralConfig::default().validate().expect("valid");
        assert_eq!(framing.frame_length, 2048);
        assert_eq!(framing.frame_step, 512);
        assert_eq!(framing.num_samples, 67072);
        assert_eq!(framing.num_frames(), 128);
        assert_eq!(framing.fft_bins(), 1025);
    }

    #[test]
    fn test_frame_step_rounds() {
        // (1 - 0.7) * 20 = 6.000000000000001 -> 6
        let framing = FramingParams::derive(SpectrogramShape::new(4, 10), 0.7).expect("valid");
        assert_eq!(framing.frame_step, 6);
        assert_eq!(framing.num_samples, 6 * 3 + 20);
    }

    #[test]
    fn test_overlap_out_of_range() {
        for overlap in [1.0, 1.5, -0.1, f64::NAN] {
            let result = FramingParams::derive(SpectrogramShape::new(8, 16), overlap);
            assert!(
                matches!(result, Err(SpectralError::Config(_))),
                "overlap {overlap} accepted"
            );
        }
    }

    #[test]
    fn test_zero_bins_rejected() {
        let result = FramingParams::derive(SpectrogramShape::new(8, 0), 0.5);
        assert!(matches!(result, Err(SpectralError::Config(_))));
        let result = FramingParams::derive(SpectrogramShape::new(0, 16), 0.5);
        assert!(matches!(result, Err(SpectralError::Config(_))));
    }

    #[test]
    fn test_zero_hop_rejected() {
        // frame_length 2, (1 - 0.9) * 2 = 0.2 -> 0
        let result = FramingParams::derive(SpectrogramShape::new(8, 1), 0.9);
        assert!(matches!(result, Err(SpectralError::Config(_))));
    }

    #[test]
    fn test_waveform_longer_than_coverage_rejected() {
        let config = SpectralConfig::new(70000, 16000, SpectrogramShape::new(128, 1024), 0.75);
        assert!(matches!(config.validate(), Err(SpectralError::Config(_))));
    }

    #[test]
    fn test_mel_edges_validated() {
        let base = SpectralConfig::new(1000, 16000, SpectrogramShape::new(8, 128), 0.5);
        assert!(base.clone().with_mel_edges(0.0, 8000.0).validate().is_ok());
        assert!(base.clone().with_mel_edges(100.0, 9000.0).validate().is_err());
        assert!(base.clone().with_mel_edges(4000.0, 4000.0).validate().is_err());
        assert!(base.with_mel_edges(-1.0, 4000.0).validate().is_err());
    }

    #[test]
    fn test_normalization_validated() {
        let config = SpectralConfig::default()
            .with_normalization(Normalization::new(0.0, 0.0), Normalization::INSTANTANEOUS_FREQUENCY);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalization_inverse() {
        let norm = Normalization::LOG_MAGNITUDE;
        for x in [-13.8, -3.76, 0.0, 2.5] {
            let y = norm.unnormalize(norm.normalize(x));
            assert!((x - y).abs() < 1e-5, "{x} -> {y}");
        }
        assert!(norm.normalize(-3.76).abs() < 1e-7);
    }

    #[test]
    fn test_padding_split() {
        assert_eq!(PaddingMode::Front.split(7), (7, 0));
        assert_eq!(PaddingMode::Back.split(7), (0, 7));
        assert_eq!(PaddingMode::Symmetric.split(7), (3, 4));
    }

    #[test]
    fn test_json_round_trip() {
        let config = SpectralConfig::default()
            .with_padding(PaddingMode::Symmetric)
            .with_overlap(0.5);
        let json = config.to_json().expect("serialize");
        let parsed = SpectralConfig::from_json_str(&json).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_json_defaults_filled() {
        let json = r#"{ "waveform_length": 16000, "sample_rate": 16000 }"#;
        let config = SpectralConfig::from_json_str(json).expect("parse");
        assert_eq!(config.spectrogram_shape, SpectrogramShape::default());
        assert_eq!(config.log_magnitude_norm, Normalization::LOG_MAGNITUDE);
        assert_eq!(config.padding, PaddingMode::Front);
        assert!((config.log_floor - 1e-6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_json_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("spectral.json");
        std::fs::write(&path, r#"{ "waveform_length": 8000, "sample_rate": 8000, "padding": "back" }"#)
            .expect("write");
        let config = SpectralConfig::from_json_file(&path).expect("load");
        assert_eq!(config.padding, PaddingMode::Back);
        assert_eq!(config.sample_rate, 8000);

        let missing = SpectralConfig::from_json_file(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(SpectralError::Io(_))));
    }
}
