//! Waveform ⇄ mel spectrogram transform
//!
//! # Forward
//!
//! 1. Zero-pad the waveform to `num_samples` (placement per [`PaddingMode`])
//! 2. STFT with a periodic Hann window, `frame_length = 2F`
//! 3. Drop the DC bin, leaving `F` bins per frame
//! 4. Project magnitude and phase angle through the linear-to-mel matrix
//! 5. `ln(mel_magnitude + floor)`; instantaneous frequency of the mel phase
//!    along time
//! 6. Normalize both channels
//!
//! # Inverse
//!
//! The same steps in reverse: unnormalize, `exp`, integrate instantaneous
//! frequency, project through the mel-to-linear matrix, rebuild the complex
//! spectrum, restore a zero DC bin, inverse STFT and strip the padding.
//!
//! The transform is lossy; mel projection discards detail that the
//! pseudo-inverse cannot restore.
//!
//! [`PaddingMode`]: crate::config::PaddingMode

use std::sync::Arc;

use rustfft::num_complex::Complex;

use crate::audio::batch::WaveformBatch;
use crate::audio::mel::{cached_filterbank, MelFilterbank, MelParams};
use crate::audio::phase::{instantaneous_frequency, integrate_instantaneous_frequency};
use crate::audio::stft::{ComplexSpectrogram, StftPlan};
use crate::config::{FramingParams, SpectralConfig, SpectrogramShape};
use crate::error::{SpectralError, SpectralResult};
use crate::parallel::parallel_try_map;
use crate::spectrogram::{Axis, MelSpectrogramPair, Spectrogram};

/// A validated, reusable spectral transform
///
/// Construction validates the config, plans the FFTs and fetches the shared
/// mel filterbank; conversions afterwards only allocate their outputs.
/// `SpectralTransform` is `Send + Sync` and can be shared across threads.
#[derive(Debug, Clone)]
pub struct SpectralTransform {
    config: SpectralConfig,
    framing: FramingParams,
    plan: StftPlan,
    filterbank: Arc<MelFilterbank>,
    pad_before: usize,
}

impl SpectralTransform {
    /// Build a transform from `config`
    ///
    /// # Errors
    /// Returns a config error if any field is invalid.
    pub fn new(config: SpectralConfig) -> SpectralResult<Self> {
        let framing = config.validate()?;
        let plan = StftPlan::new(framing.frame_length, framing.frame_step)?;

        let bins = config.spectrogram_shape.num_freq_bins;
        let filterbank = cached_filterbank(MelParams::new(
            bins,
            bins,
            config.sample_rate,
            config.lower_edge_hz,
            config.upper_edge(),
        ))?;

        let (pad_before, _) = config
            .padding
            .split(framing.num_samples - config.waveform_length);

        crate::trace_event!(
            frame_length = framing.frame_length,
            frame_step = framing.frame_step,
            num_samples = framing.num_samples,
            "spectral transform ready"
        );

        Ok(Self {
            config,
            framing,
            plan,
            filterbank,
            pad_before,
        })
    }

    /// Configuration this transform was built from
    #[must_use]
    pub const fn config(&self) -> &SpectralConfig {
        &self.config
    }

    /// Derived STFT framing
    #[must_use]
    pub const fn framing(&self) -> FramingParams {
        self.framing
    }

    /// Shape of every spectrogram channel
    #[must_use]
    pub const fn spectrogram_shape(&self) -> SpectrogramShape {
        self.config.spectrogram_shape
    }

    /// Samples per waveform
    #[must_use]
    pub const fn waveform_length(&self) -> usize {
        self.config.waveform_length
    }

    /// Shared mel filterbank
    #[must_use]
    pub fn filterbank(&self) -> &MelFilterbank {
        &self.filterbank
    }

    /// Zero samples inserted before the waveform
    #[must_use]
    pub const fn pad_before(&self) -> usize {
        self.pad_before
    }

    /// Convert one waveform to a normalized mel spectrogram pair
    ///
    /// # Errors
    /// Returns a shape mismatch if `waveform` is not `waveform_length` long.
    pub fn to_spectrograms(&self, waveform: &[f32]) -> SpectralResult<MelSpectrogramPair> {
        let _span = crate::trace_enter!("spectral_forward");

        let length = self.config.waveform_length;
        if waveform.len() != length {
            return Err(SpectralError::shape(&[length], &[waveform.len()]));
        }

        let mut padded = vec![0.0_f32; self.framing.num_samples];
        padded[self.pad_before..self.pad_before + length].copy_from_slice(waveform);

        let stft = self.plan.stft(&padded);
        let (magnitude, phase) = polar_without_dc(&stft);

        let shape = self.spectrogram_shape();
        magnitude.expect_shape(shape)?;

        let forward = self.filterbank.forward();
        let mel_magnitude = forward.project(&magnitude)?;
        let mel_phase = forward.project(&phase)?;

        let floor = self.config.log_floor;
        let mag_norm = self.config.log_magnitude_norm;
        let if_norm = self.config.instantaneous_frequency_norm;

        let log_magnitude = mel_magnitude.map(|x| mag_norm.normalize((x + floor).ln()));
        let inst_freq =
            instantaneous_frequency(&mel_phase, Axis::Time).map(|x| if_norm.normalize(x));

        let pair = MelSpectrogramPair::new(log_magnitude, inst_freq)?;
        pair.expect_shape(shape)?;
        Ok(pair)
    }

    /// Convert a normalized mel spectrogram pair back to a waveform
    ///
    /// # Errors
    /// Returns a shape mismatch if either channel does not have
    /// `spectrogram_shape`.
    pub fn to_waveform(&self, pair: &MelSpectrogramPair) -> SpectralResult<Vec<f32>> {
        let _span = crate::trace_enter!("spectral_inverse");

        pair.expect_shape(self.spectrogram_shape())?;

        let mag_norm = self.config.log_magnitude_norm;
        let if_norm = self.config.instantaneous_frequency_norm;

        let mel_magnitude = pair
            .log_magnitude
            .clone()
            .map(|x| mag_norm.unnormalize(x).exp());
        let inst_freq = pair
            .instantaneous_frequency
            .clone()
            .map(|x| if_norm.unnormalize(x));
        let mel_phase = integrate_instantaneous_frequency(&inst_freq, Axis::Time);

        let inverse = self.filterbank.inverse();
        let magnitude = inverse.project(&mel_magnitude)?;
        let phase = inverse.project(&mel_phase)?;

        let spectrum = polar_with_dc(&magnitude, &phase);
        let signal = self.plan.istft(&spectrum)?;

        let start = self.pad_before;
        let end = start + self.config.waveform_length;
        signal
            .get(start..end)
            .map(<[f32]>::to_vec)
            .ok_or_else(|| SpectralError::shape(&[end], &[signal.len()]))
    }

    /// Forward transform over a batch, in parallel across examples
    ///
    /// # Errors
    /// Fails on the first example with the wrong length.
    pub fn to_spectrograms_batch(&self, waveforms: &[Vec<f32>]) -> SpectralResult<Vec<MelSpectrogramPair>> {
        parallel_try_map(0..waveforms.len(), |i| self.to_spectrograms(&waveforms[i]))
    }

    /// Inverse transform over a batch, in parallel across examples
    ///
    /// # Errors
    /// Fails on the first pair with the wrong shape.
    pub fn to_waveforms_batch(&self, pairs: &[MelSpectrogramPair]) -> SpectralResult<Vec<Vec<f32>>> {
        parallel_try_map(0..pairs.len(), |i| self.to_waveform(&pairs[i]))
    }

    /// Forward transform of a [`WaveformBatch`]
    ///
    /// # Errors
    /// Returns a shape mismatch if the batch was built for a different
    /// waveform length.
    pub fn encode_batch(&self, batch: &WaveformBatch) -> SpectralResult<Vec<MelSpectrogramPair>> {
        if batch.waveform_length() != self.config.waveform_length {
            return Err(SpectralError::shape(
                &[batch.len(), self.config.waveform_length],
                &[batch.len(), batch.waveform_length()],
            ));
        }
        self.to_spectrograms_batch(batch.examples())
    }
}

/// Split a one-sided STFT into magnitude and angle, dropping the DC bin
fn polar_without_dc(stft: &ComplexSpectrogram) -> (Spectrogram, Spectrogram) {
    let bins = stft.bins().saturating_sub(1);
    let magnitude = Spectrogram::from_fn(stft.frames(), bins, |t, k| stft.frame(t)[k + 1].norm());
    let phase = Spectrogram::from_fn(stft.frames(), bins, |t, k| stft.frame(t)[k + 1].arg());
    (magnitude, phase)
}

/// Rebuild a one-sided STFT from magnitude and angle with a zero DC bin
fn polar_with_dc(magnitude: &Spectrogram, phase: &Spectrogram) -> ComplexSpectrogram {
    let mut spectrum = ComplexSpectrogram::zeros(magnitude.time_steps(), magnitude.bins() + 1);
    for t in 0..magnitude.time_steps() {
        let frame = spectrum.frame_mut(t);
        for (k, (&mag, &angle)) in magnitude.row(t).iter().zip(phase.row(t)).enumerate() {
            frame[k + 1] = Complex::from_polar(mag, angle);
        }
    }
    spectrum
}

/// Convert a batch of waveforms to mel spectrogram pairs
///
/// Uses default mel edges, front padding and the standard normalization.
///
/// # Errors
/// Returns a config error for an invalid configuration and a shape mismatch
/// for any waveform that is not `waveform_length` long.
pub fn to_spectrograms(
    waveforms: &[Vec<f32>],
    waveform_length: usize,
    sample_rate: u32,
    spectrogram_shape: impl Into<SpectrogramShape>,
    overlap: f64,
) -> SpectralResult<Vec<MelSpectrogramPair>> {
    let config = SpectralConfig::new(
        waveform_length,
        sample_rate,
        spectrogram_shape.into(),
        overlap,
    );
    SpectralTransform::new(config)?.to_spectrograms_batch(waveforms)
}

/// Convert a batch of mel spectrogram pairs back to waveforms
///
/// Parameters must match the ones used for [`to_spectrograms`].
///
/// # Errors
/// Returns a config error for an invalid configuration and a shape mismatch
/// for any pair that does not have `spectrogram_shape`.
pub fn to_waveforms(
    pairs: &[MelSpectrogramPair],
    waveform_length: usize,
    sample_rate: u32,
    spectrogram_shape: impl Into<SpectrogramShape>,
    overlap: f64,
) -> SpectralResult<Vec<Vec<f32>>> {
    let config = SpectralConfig::new(
        waveform_length,
        sample_rate,
        spectrogram_shape.into(),
        overlap,
    );
    SpectralTransform::new(config)?.to_waveforms_batch(pairs)
}
