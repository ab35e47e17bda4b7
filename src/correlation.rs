//! Cross-correlation scoring
//!
//! Compares original and reconstructed waveforms. The correlation does not
//! flip the kernel:
//!
//! ```text
//! out[k] = Σ_j x[k + j - pad] · y[j]
//! ```
//!
//! where samples outside `x` read as zero. With both signals L2-normalized
//! and equal in length, the single `Valid` output is the cosine similarity of
//! the two waveforms, 1.0 for a perfect reconstruction.

use serde::Serialize;

use crate::error::{SpectralError, SpectralResult};
use crate::parallel::parallel_try_map;
use crate::transform::SpectralTransform;

/// Output extent of a correlation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Padding {
    /// Only lags where `y` lies fully inside `x`; `len(x) - len(y) + 1` outputs
    #[default]
    Valid,
    /// `len(x)` outputs; `(len(y) - 1) / 2` zeros before `x`, the rest after
    Same,
}

impl Padding {
    /// Output length and leading pad for signals of these lengths
    fn extent(self, x_len: usize, y_len: usize) -> (usize, usize) {
        match self {
            Self::Valid => (x_len + 1 - y_len, 0),
            Self::Same => (x_len, (y_len - 1) / 2),
        }
    }
}

fn l2_normalized(signal: &[f32]) -> Vec<f32> {
    let norm = signal.iter().map(|&v| f64::from(v) * f64::from(v)).sum::<f64>().sqrt();
    // Silent signals stay as they are
    if norm == 0.0 {
        return signal.to_vec();
    }
    signal.iter().map(|&v| (f64::from(v) / norm) as f32).collect()
}

/// Correlate one pair of signals
///
/// # Errors
/// Returns a shape mismatch if `y` is empty, or longer than `x` with
/// [`Padding::Valid`].
pub fn cross_correlate(x: &[f32], y: &[f32], padding: Padding, normalize: bool) -> SpectralResult<Vec<f32>> {
    if y.is_empty() || (padding == Padding::Valid && y.len() > x.len()) {
        return Err(SpectralError::shape(&[x.len()], &[y.len()]));
    }

    let (x, y) = if normalize {
        (l2_normalized(x), l2_normalized(y))
    } else {
        (x.to_vec(), y.to_vec())
    };

    let (out_len, pad) = padding.extent(x.len(), y.len());
    let out = (0..out_len)
        .map(|k| {
            // Range of j for which x[k + j - pad] is in bounds
            let j_start = pad.saturating_sub(k);
            let j_end = y.len().min((x.len() + pad).saturating_sub(k));
            (j_start..j_end)
                .map(|j| f64::from(x[k + j - pad]) * f64::from(y[j]))
                .sum::<f64>() as f32
        })
        .collect();
    Ok(out)
}

/// Correlate paired batches, one output sequence per example
///
/// Examples run in parallel; `x[i]` is correlated with `y[i]`.
///
/// # Errors
/// Returns a shape mismatch if the batches differ in size or any pair fails
/// [`cross_correlate`].
pub fn cross_correlation(
    x: &[Vec<f32>],
    y: &[Vec<f32>],
    padding: Padding,
    normalize: bool,
) -> SpectralResult<Vec<Vec<f32>>> {
    let _span = crate::trace_enter!("cross_correlation");

    if x.len() != y.len() {
        return Err(SpectralError::shape(&[x.len()], &[y.len()]));
    }
    parallel_try_map(0..x.len(), |i| cross_correlate(&x[i], &y[i], padding, normalize))
}

/// Round-trip each waveform and score it against its reconstruction
///
/// Each score is the normalized zero-lag correlation of a waveform with its
/// own reconstruction, in `[-1, 1]`.
///
/// # Errors
/// Fails if any waveform has the wrong length.
pub fn reconstruction_scores(transform: &SpectralTransform, waveforms: &[Vec<f32>]) -> SpectralResult<Vec<f32>> {
    let pairs = transform.to_spectrograms_batch(waveforms)?;
    let reconstructed = transform.to_waveforms_batch(&pairs)?;
    let scores = cross_correlation(waveforms, &reconstructed, Padding::Valid, true)?;
    Ok(scores.into_iter().map(|s| s.first().copied().unwrap_or(0.0)).collect())
}

/// Fixed-width histogram over `[min, max]`
///
/// Values equal to `max` land in the last bin; values outside the range are
/// counted separately.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    min: f32,
    max: f32,
    counts: Vec<u64>,
    underflow: u64,
    overflow: u64,
}

impl Histogram {
    /// Empty histogram with `num_bins` equal bins (at least one)
    #[must_use]
    pub fn new(min: f32, max: f32, num_bins: usize) -> Self {
        Self {
            min,
            max,
            counts: vec![0; num_bins.max(1)],
            underflow: 0,
            overflow: 0,
        }
    }

    /// Histogram of correlation scores over `[-1, 1]`
    #[must_use]
    pub fn of_scores(scores: &[f32], num_bins: usize) -> Self {
        let mut hist = Self::new(-1.0, 1.0, num_bins);
        hist.accumulate(scores);
        hist
    }

    /// Width of one bin
    #[must_use]
    pub fn bin_width(&self) -> f32 {
        (self.max - self.min) / self.counts.len() as f32
    }

    /// Count one value
    pub fn add(&mut self, value: f32) {
        if value.is_nan() || value > self.max {
            self.overflow += 1;
        } else if value < self.min {
            self.underflow += 1;
        } else {
            let last = self.counts.len() - 1;
            let bin = (((value - self.min) / self.bin_width()) as usize).min(last);
            self.counts[bin] += 1;
        }
    }

    /// Count every value in `values`
    pub fn accumulate(&mut self, values: &[f32]) {
        for &v in values {
            self.add(v);
        }
    }

    /// Per-bin counts
    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// `num_bins + 1` bin edges
    #[must_use]
    pub fn bin_edges(&self) -> Vec<f32> {
        let width = self.bin_width();
        (0..=self.counts.len())
            .map(|i| self.min + i as f32 * width)
            .collect()
    }

    /// Values below the range
    #[must_use]
    pub const fn underflow(&self) -> u64 {
        self.underflow
    }

    /// Values above the range (or NaN)
    #[must_use]
    pub const fn overflow(&self) -> u64 {
        self.overflow
    }

    /// Values counted, in range or not
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum::<u64>() + self.underflow + self.overflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SpectralConfig, SpectrogramShape};

    fn noise(len: usize, seed: u32) -> Vec<f32> {
        // Small LCG, deterministic across platforms
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1 << 24) as f32 - 0.5
            })
            .collect()
    }

    #[test]
    fn test_valid_output_length() {
        let out = cross_correlate(&[1.0; 10], &[1.0; 3], Padding::Valid, false).expect("valid");
        assert_eq!(out.len(), 8);
        assert!(out.iter().all(|&v| (v - 3.0).abs() < 1e-6));
    }

    #[test]
    fn test_no_kernel_flip() {
        // x = [1, 2, 3], y = [1, 0]: correlation picks x[k], convolution would not
        let out = cross_correlate(&[1.0, 2.0, 3.0], &[1.0, 0.0], Padding::Valid, false).expect("valid");
        assert_eq!(out, vec![1.0, 2.0]);
    }

    #[test]
    fn test_same_padding() {
        // len(y) = 3: one zero before, one after
        let out = cross_correlate(&[1.0, 2.0, 3.0, 4.0], &[1.0, 1.0, 1.0], Padding::Same, false).expect("same");
        assert_eq!(out, vec![3.0, 6.0, 9.0, 7.0]);

        // len(y) = 2: no zeros before, one after
        let out = cross_correlate(&[1.0, 2.0, 3.0], &[1.0, 1.0], Padding::Same, false).expect("same");
        assert_eq!(out, vec![3.0, 5.0, 3.0]);
    }

    #[test]
    fn test_same_with_kernel_longer_than_signal() {
        let out = cross_correlate(&[1.0, 1.0], &[1.0; 5], Padding::Same, false).expect("same");
        assert_eq!(out, vec![2.0, 2.0]);
    }

    #[test]
    fn test_self_score_is_one() {
        let x = noise(512, 7);
        let out = cross_correlate(&x, &x, Padding::Valid, true).expect("valid");
        assert_eq!(out.len(), 1);
        assert!((out[0] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_self_score_peaks_at_zero_lag() {
        let x = noise(256, 3);
        let out = cross_correlate(&x, &x, Padding::Same, true).expect("same");
        let centre = (x.len() - 1) / 2;
        assert!((out[centre] - 1.0).abs() < 1e-5);
        assert!(out.iter().all(|&v| v <= 1.0 + 1e-5));
    }

    #[test]
    fn test_negated_signal_scores_minus_one() {
        let x = noise(128, 11);
        let y: Vec<f32> = x.iter().map(|v| -2.0 * v).collect();
        let out = cross_correlate(&x, &y, Padding::Valid, true).expect("valid");
        assert!((out[0] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_norm_left_unscaled() {
        let out = cross_correlate(&[0.0; 4], &[1.0; 4], Padding::Valid, true).expect("valid");
        assert_eq!(out, vec![0.0]);
    }

    #[test]
    fn test_rejects_bad_lengths() {
        assert!(cross_correlate(&[1.0; 2], &[1.0; 3], Padding::Valid, false).is_err());
        assert!(cross_correlate(&[1.0; 2], &[], Padding::Same, false).is_err());
        assert!(cross_correlation(&[vec![1.0]], &[], Padding::Valid, false).is_err());
    }

    #[test]
    fn test_batch_correlation() {
        let x = vec![noise(64, 1), noise(64, 2)];
        let out = cross_correlation(&x, &x, Padding::Valid, true).expect("batch");
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|o| (o[0] - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_reconstruction_scores_bounded() {
        let config = SpectralConfig::new(600, 16_000, SpectrogramShape::new(16, 64), 0.75);
        let transform = SpectralTransform::new(config).expect("transform");
        let waves = vec![noise(600, 5), vec![0.0; 600]];
        let scores = reconstruction_scores(&transform, &waves).expect("scores");
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| s.is_finite() && s.abs() <= 1.0 + 1e-5));
    }

    #[test]
    fn test_histogram_binning() {
        let mut hist = Histogram::new(-1.0, 1.0, 4);
        hist.accumulate(&[-1.0, -0.6, 0.0, 0.49, 1.0, 1.5, -2.0, f32::NAN]);
        assert_eq!(hist.counts(), &[2, 0, 2, 1]);
        assert_eq!(hist.underflow(), 1);
        assert_eq!(hist.overflow(), 2);
        assert_eq!(hist.total(), 8);
        assert_eq!(hist.bin_edges(), vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_histogram_of_scores() {
        let hist = Histogram::of_scores(&[1.0, 0.95, 0.25], 10);
        assert_eq!(hist.counts().len(), 10);
        assert_eq!(hist.counts()[9], 2);
        assert_eq!(hist.counts()[6], 1);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(50))]

            #[test]
            fn property_normalized_scores_bounded(
                x in prop::collection::vec(-1.0f32..1.0, 8..64),
                y in prop::collection::vec(-1.0f32..1.0, 1..8),
            ) {
                let out = cross_correlate(&x, &y, Padding::Same, true).expect("same");
                prop_assert_eq!(out.len(), x.len());
                for v in out {
                    prop_assert!(v.abs() <= 1.0 + 1e-4);
                }
            }

            #[test]
            fn property_valid_length(xl in 1usize..64, yl in 1usize..64) {
                prop_assume!(yl <= xl);
                let out = cross_correlate(&vec![0.5; xl], &vec![0.5; yl], Padding::Valid, false)
                    .expect("valid");
                prop_assert_eq!(out.len(), xl - yl + 1);
            }
        }
    }
}
