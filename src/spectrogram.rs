//! Spectrogram containers
//!
//! A [`Spectrogram`] is a dense row-major `[time_steps, bins]` matrix of
//! `f32`. The forward transform produces a [`MelSpectrogramPair`] and the
//! inverse transform consumes one.

use serde::Serialize;

use crate::config::SpectrogramShape;
use crate::error::{SpectralError, SpectralResult};

/// Axis of a spectrogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Along frames (rows)
    Time,
    /// Along bins within a frame (columns)
    Frequency,
}

/// Row-major `[time_steps, bins]` matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    time_steps: usize,
    bins: usize,
    data: Vec<f32>,
}

impl Spectrogram {
    /// Zero-filled spectrogram
    #[must_use]
    pub fn zeros(time_steps: usize, bins: usize) -> Self {
        Self {
            time_steps,
            bins,
            data: vec![0.0; time_steps * bins],
        }
    }

    /// Wrap flat row-major data
    ///
    /// # Errors
    /// Returns a shape mismatch if `data.len() != time_steps * bins`.
    pub fn from_vec(time_steps: usize, bins: usize, data: Vec<f32>) -> SpectralResult<Self> {
        if data.len() != time_steps * bins {
            return Err(SpectralError::shape(&[time_steps * bins], &[data.len()]));
        }
        Ok(Self {
            time_steps,
            bins,
            data,
        })
    }

    /// Build from a function of `(t, f)`
    pub fn from_fn(time_steps: usize, bins: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(time_steps * bins);
        for t in 0..time_steps {
            for k in 0..bins {
                data.push(f(t, k));
            }
        }
        Self {
            time_steps,
            bins,
            data,
        }
    }

    /// Number of frames
    #[must_use]
    pub const fn time_steps(&self) -> usize {
        self.time_steps
    }

    /// Number of bins per frame
    #[must_use]
    pub const fn bins(&self) -> usize {
        self.bins
    }

    /// Shape as `[time_steps, bins]`
    #[must_use]
    pub const fn dims(&self) -> [usize; 2] {
        [self.time_steps, self.bins]
    }

    /// Check this spectrogram has exactly `shape`
    ///
    /// # Errors
    /// Returns a shape mismatch otherwise.
    pub fn expect_shape(&self, shape: SpectrogramShape) -> SpectralResult<()> {
        if self.dims() != shape.dims() {
            return Err(SpectralError::shape(&shape.dims(), &self.dims()));
        }
        Ok(())
    }

    /// Value at `(t, k)`
    ///
    /// # Panics
    /// Panics if the index is out of bounds; see [`Self::checked_get`].
    #[inline]
    #[must_use]
    pub fn get(&self, t: usize, k: usize) -> f32 {
        assert!(t < self.time_steps && k < self.bins, "index out of bounds");
        self.data[t * self.bins + k]
    }

    /// Value at `(t, k)`, or `None` when out of bounds
    #[inline]
    #[must_use]
    pub fn checked_get(&self, t: usize, k: usize) -> Option<f32> {
        if t < self.time_steps && k < self.bins {
            Some(self.data[t * self.bins + k])
        } else {
            None
        }
    }

    /// One frame
    #[must_use]
    pub fn row(&self, t: usize) -> &[f32] {
        &self.data[t * self.bins..(t + 1) * self.bins]
    }

    /// One frame, mutably
    pub fn row_mut(&mut self, t: usize) -> &mut [f32] {
        &mut self.data[t * self.bins..(t + 1) * self.bins]
    }

    /// Flat row-major data
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Flat row-major data, mutably
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consume into flat row-major data
    #[must_use]
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Apply `f` to every value
    #[must_use]
    pub fn map(mut self, f: impl Fn(f32) -> f32) -> Self {
        for x in &mut self.data {
            *x = f(*x);
        }
        self
    }

    /// Number of lanes and lane length along `axis`
    ///
    /// A lane is a 1-D slice running along `axis`: a column for
    /// [`Axis::Time`], a row for [`Axis::Frequency`].
    #[must_use]
    pub const fn lanes(&self, axis: Axis) -> (usize, usize) {
        match axis {
            Axis::Time => (self.bins, self.time_steps),
            Axis::Frequency => (self.time_steps, self.bins),
        }
    }

    /// Flat index of element `i` in lane `lane` along `axis`
    #[inline]
    #[must_use]
    pub const fn lane_index(&self, axis: Axis, lane: usize, i: usize) -> usize {
        match axis {
            Axis::Time => i * self.bins + lane,
            Axis::Frequency => lane * self.bins + i,
        }
    }

    /// Summary statistics over every cell
    #[must_use]
    pub fn stats(&self) -> SpectrogramStats {
        if self.data.is_empty() {
            return SpectrogramStats::default();
        }
        let n = self.data.len() as f64;
        let (mut min, mut max, mut sum) = (f32::INFINITY, f32::NEG_INFINITY, 0.0_f64);
        for &x in &self.data {
            min = min.min(x);
            max = max.max(x);
            sum += f64::from(x);
        }
        let mean = sum / n;
        let var = self
            .data
            .iter()
            .map(|&x| (f64::from(x) - mean).powi(2))
            .sum::<f64>()
            / n;
        SpectrogramStats {
            min,
            max,
            mean: mean as f32,
            std: var.sqrt() as f32,
        }
    }
}

/// Min / max / mean / standard deviation of a spectrogram
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SpectrogramStats {
    /// Smallest value
    pub min: f32,
    /// Largest value
    pub max: f32,
    /// Mean value
    pub mean: f32,
    /// Population standard deviation
    pub std: f32,
}

/// Dual-channel spectral representation of one waveform
#[derive(Debug, Clone, PartialEq)]
pub struct MelSpectrogramPair {
    /// Normalized `ln(mel magnitude + floor)`, `[T, F]`
    pub log_magnitude: Spectrogram,
    /// Normalized mel instantaneous frequency, `[T, F]`
    pub instantaneous_frequency: Spectrogram,
}

impl MelSpectrogramPair {
    /// Pair two channels, checking they agree in shape
    ///
    /// # Errors
    /// Returns a shape mismatch if the channels differ.
    pub fn new(log_magnitude: Spectrogram, instantaneous_frequency: Spectrogram) -> SpectralResult<Self> {
        if log_magnitude.dims() != instantaneous_frequency.dims() {
            return Err(SpectralError::shape(
                &log_magnitude.dims(),
                &instantaneous_frequency.dims(),
            ));
        }
        Ok(Self {
            log_magnitude,
            instantaneous_frequency,
        })
    }

    /// Shape shared by both channels
    #[must_use]
    pub const fn dims(&self) -> [usize; 2] {
        self.log_magnitude.dims()
    }

    /// Check both channels have exactly `shape`
    ///
    /// # Errors
    /// Returns a shape mismatch naming the first offending channel.
    pub fn expect_shape(&self, shape: SpectrogramShape) -> SpectralResult<()> {
        self.log_magnitude.expect_shape(shape)?;
        self.instantaneous_frequency.expect_shape(shape)
    }
}

/// Map `x` linearly from `[in_min, in_max]` to `[out_min, out_max]`
///
/// Used to bring normalized channels (roughly `[-1, 1]`) into a display
/// range such as `[0, 255]`.
#[inline]
#[must_use]
pub fn linear_map(x: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    out_min + (x - in_min) / (in_max - in_min) * (out_max - out_min)
}
