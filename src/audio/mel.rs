//! Mel filterbank construction
//!
//! Builds the fixed linear-to-mel weight matrix used by the forward
//! transform and its normalized-transpose pseudo-inverse used by the inverse
//! transform.
//!
//! # Algorithm
//!
//! 1. Split `[mel(lower_edge), mel(upper_edge)]` into `num_mel_bins + 2`
//!    evenly spaced edges (HTK scale, `mel = 1127 ln(1 + hz/700)`)
//! 2. Filter `i` rises from `edge[i]` to `edge[i+1]` and falls to `edge[i+2]`
//! 3. Filters narrower than 1.5 linear bins (in Hz) are widened around
//!    their mel center until they are exactly that wide
//! 4. Weight = `max(0, min(lower_slope, upper_slope))`; the DC bin is zeroed
//!
//! Weights are computed in `f64` and stored as `f32`.
//!
//! # References
//!
//! - HTK book, mel filterbank analysis
//! - Engel et al., "GANSynth: Adversarial Neural Audio Synthesis" (2019)

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::error::{SpectralError, SpectralResult};
use crate::spectrogram::Spectrogram;

/// Break frequency of the HTK mel scale
pub const MEL_BREAK_FREQUENCY_HZ: f64 = 700.0;

/// Scale factor of the HTK mel scale
pub const MEL_HIGH_FREQUENCY_Q: f64 = 1127.0;

/// Filters are never narrower than this many linear bins (in Hz)
pub const MIN_BANDWIDTH_BINS: f64 = 1.5;

/// Below this magnitude a pseudo-inverse scale is not inverted
pub const INVERSE_GUARD_EPSILON: f64 = 1e-8;

/// Number of low spectrogram bins excluded from every filter (HTK drops DC)
const BANDS_TO_ZERO: usize = 1;

/// Convert frequency in Hz to HTK mel
#[inline]
#[must_use]
pub fn hz_to_mel(hz: f64) -> f64 {
    MEL_HIGH_FREQUENCY_Q * (1.0 + hz / MEL_BREAK_FREQUENCY_HZ).ln()
}

/// Convert HTK mel to frequency in Hz
#[inline]
#[must_use]
pub fn mel_to_hz(mel: f64) -> f64 {
    MEL_BREAK_FREQUENCY_HZ * ((mel / MEL_HIGH_FREQUENCY_Q).exp() - 1.0)
}

/// `n` evenly spaced values from `start` to `stop` inclusive
fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// The five scalars a filterbank depends on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MelParams {
    /// Output (mel) dimension
    pub num_mel_bins: usize,
    /// Input (linear) dimension
    pub num_spectrogram_bins: usize,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Lowest frequency covered
    pub lower_edge_hz: f64,
    /// Highest frequency covered
    pub upper_edge_hz: f64,
}

impl MelParams {
    /// Group the five filterbank scalars
    #[must_use]
    pub const fn new(
        num_mel_bins: usize,
        num_spectrogram_bins: usize,
        sample_rate: u32,
        lower_edge_hz: f64,
        upper_edge_hz: f64,
    ) -> Self {
        Self {
            num_mel_bins,
            num_spectrogram_bins,
            sample_rate,
            lower_edge_hz,
            upper_edge_hz,
        }
    }

    /// Nyquist frequency in Hz
    #[must_use]
    pub fn nyquist_hz(&self) -> f64 {
        f64::from(self.sample_rate) / 2.0
    }

    /// Minimum filter width in Hz
    #[must_use]
    pub fn min_bandwidth_hz(&self) -> f64 {
        MIN_BANDWIDTH_BINS * self.nyquist_hz() / self.num_spectrogram_bins as f64
    }

    fn validate(&self) -> SpectralResult<()> {
        if self.num_mel_bins == 0 || self.num_spectrogram_bins == 0 {
            return Err(SpectralError::config(format!(
                "filterbank needs positive dimensions, got {} mel x {} linear",
                self.num_mel_bins, self.num_spectrogram_bins
            )));
        }
        if self.sample_rate == 0 {
            return Err(SpectralError::config("sample_rate must be positive"));
        }
        let nyquist = self.nyquist_hz();
        if !(self.lower_edge_hz >= 0.0
            && self.lower_edge_hz < self.upper_edge_hz
            && self.upper_edge_hz <= nyquist)
        {
            return Err(SpectralError::config(format!(
                "mel edges must satisfy 0 <= lower < upper <= {nyquist}, got [{}, {}]",
                self.lower_edge_hz, self.upper_edge_hz
            )));
        }
        Ok(())
    }

    fn key(&self) -> MelKey {
        MelKey {
            num_mel_bins: self.num_mel_bins,
            num_spectrogram_bins: self.num_spectrogram_bins,
            sample_rate: self.sample_rate,
            lower_edge_bits: self.lower_edge_hz.to_bits(),
            upper_edge_bits: self.upper_edge_hz.to_bits(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MelKey {
    num_mel_bins: usize,
    num_spectrogram_bins: usize,
    sample_rate: u32,
    lower_edge_bits: u64,
    upper_edge_bits: u64,
}

/// Edges of one triangular filter, in Hz
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MelBand {
    /// Where the filter starts rising
    pub lower_hz: f64,
    /// Peak
    pub center_hz: f64,
    /// Where the filter reaches zero again
    pub upper_hz: f64,
}

impl MelBand {
    /// Width in Hz
    #[must_use]
    pub fn width_hz(&self) -> f64 {
        self.upper_hz - self.lower_hz
    }

    /// Triangular weight at `hz`
    #[inline]
    #[must_use]
    pub fn weight(&self, hz: f64) -> f64 {
        let lower_slope = (hz - self.lower_hz) / (self.center_hz - self.lower_hz);
        let upper_slope = (self.upper_hz - hz) / (self.upper_hz - self.center_hz);
        lower_slope.min(upper_slope).max(0.0)
    }
}

/// Compute the filter edges, widening filters that are too narrow
///
/// Widening keeps the mel center and moves both edges by the same mel
/// distance `dm`, chosen so the Hz width equals the threshold exactly:
/// `(c + 700) * 2 sinh(dm / 1127) = th`.
#[must_use]
pub fn mel_bands(params: &MelParams) -> Vec<MelBand> {
    let edges = linspace(
        hz_to_mel(params.lower_edge_hz),
        hz_to_mel(params.upper_edge_hz),
        params.num_mel_bins + 2,
    );
    let threshold = params.min_bandwidth_hz();

    edges
        .windows(3)
        .map(|w| {
            let (mut lower_mel, center_mel, mut upper_mel) = (w[0], w[1], w[2]);
            let center_hz = mel_to_hz(center_mel);
            if mel_to_hz(upper_mel) - mel_to_hz(lower_mel) < threshold {
                let rhs = 0.5 * threshold / (center_hz + MEL_BREAK_FREQUENCY_HZ);
                let dm = MEL_HIGH_FREQUENCY_Q * rhs.asinh();
                lower_mel = center_mel - dm;
                upper_mel = center_mel + dm;
            }
            MelBand {
                lower_hz: mel_to_hz(lower_mel),
                center_hz,
                upper_hz: mel_to_hz(upper_mel),
            }
        })
        .collect()
}

/// Center frequency in Hz of each linear spectrogram bin
#[must_use]
pub fn linear_bin_frequencies(params: &MelParams) -> Vec<f64> {
    linspace(0.0, params.nyquist_hz(), params.num_spectrogram_bins)
}

/// Dense weight matrix stored row-major as `rows x cols`
///
/// Rows are the input dimension and columns the output dimension, so
/// projecting a frame is `out[c] = sum_r x[r] * w[r][c]`. Each row also
/// records the column range holding its non-zero weights, which keeps the
/// projection proportional to the filter overlap instead of `rows * cols`.
#[derive(Debug, Clone, PartialEq)]
pub struct MelWeightMatrix {
    rows: usize,
    cols: usize,
    weights: Vec<f32>,
    support: Vec<(usize, usize)>,
}

impl MelWeightMatrix {
    fn from_f64(rows: usize, cols: usize, weights: &[f64]) -> Self {
        debug_assert_eq!(weights.len(), rows * cols);
        let weights: Vec<f32> = weights.iter().map(|&w| w as f32).collect();
        let support = weights
            .chunks_exact(cols.max(1))
            .take(rows)
            .map(|row| {
                let first = row.iter().position(|&w| w != 0.0);
                let last = row.iter().rposition(|&w| w != 0.0);
                match (first, last) {
                    (Some(lo), Some(hi)) => (lo, hi + 1),
                    _ => (0, 0),
                }
            })
            .collect();
        Self {
            rows,
            cols,
            weights,
            support,
        }
    }

    /// Input dimension
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Output dimension
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Weight at `(row, col)`
    #[inline]
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.weights[row * self.cols + col]
    }

    /// One input row
    #[must_use]
    pub fn row(&self, row: usize) -> &[f32] {
        &self.weights[row * self.cols..(row + 1) * self.cols]
    }

    /// Flat row-major weights
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.weights
    }

    /// Project one frame: `out = input · W`
    ///
    /// # Errors
    /// Returns a shape mismatch if `input` or `out` has the wrong length.
    pub fn project_into(&self, input: &[f32], out: &mut [f32]) -> SpectralResult<()> {
        if input.len() != self.rows {
            return Err(SpectralError::shape(&[self.rows], &[input.len()]));
        }
        if out.len() != self.cols {
            return Err(SpectralError::shape(&[self.cols], &[out.len()]));
        }

        out.fill(0.0);
        for (r, &x) in input.iter().enumerate() {
            let (lo, hi) = self.support[r];
            let row = &self.weights[r * self.cols..(r + 1) * self.cols];
            for (o, &w) in out[lo..hi].iter_mut().zip(&row[lo..hi]) {
                *o += x * w;
            }
        }
        Ok(())
    }

    /// Project every frame of a spectrogram along the frequency axis
    ///
    /// # Errors
    /// Returns a shape mismatch if the spectrogram has the wrong bin count.
    pub fn project(&self, input: &Spectrogram) -> SpectralResult<Spectrogram> {
        if input.bins() != self.rows {
            return Err(SpectralError::shape(
                &[input.time_steps(), self.rows],
                &input.dims(),
            ));
        }
        let mut out = Spectrogram::zeros(input.time_steps(), self.cols);
        for t in 0..input.time_steps() {
            self.project_into(input.row(t), out.row_mut(t))?;
        }
        Ok(out)
    }
}

/// Forward weights as `f64`, `[num_spectrogram_bins, num_mel_bins]`
fn forward_weights_f64(params: &MelParams) -> Vec<f64> {
    let bands = mel_bands(params);
    let freqs = linear_bin_frequencies(params);
    let m = params.num_mel_bins;

    let mut weights = vec![0.0_f64; params.num_spectrogram_bins * m];
    for (bin, &hz) in freqs.iter().enumerate().skip(BANDS_TO_ZERO) {
        for (mel, band) in bands.iter().enumerate() {
            weights[bin * m + mel] = band.weight(hz);
        }
    }
    weights
}

/// Build the linear-to-mel weight matrix
///
/// Shape `[num_spectrogram_bins, num_mel_bins]`; row 0 (DC) is all zero.
///
/// # Errors
/// Returns a config error for empty dimensions, a zero sample rate or edges
/// outside `0 <= lower < upper <= nyquist`.
pub fn linear_to_mel_weights(
    num_mel_bins: usize,
    num_spectrogram_bins: usize,
    sample_rate: u32,
    lower_edge_hz: f64,
    upper_edge_hz: f64,
) -> SpectralResult<MelWeightMatrix> {
    let params = MelParams::new(
        num_mel_bins,
        num_spectrogram_bins,
        sample_rate,
        lower_edge_hz,
        upper_edge_hz,
    );
    params.validate()?;
    let weights = forward_weights_f64(&params);
    Ok(MelWeightMatrix::from_f64(
        num_spectrogram_bins,
        num_mel_bins,
        &weights,
    ))
}

/// Per-linear-bin scale of the pseudo-inverse
///
/// `d_j = sum_i (W Wᵀ)[i][j] = sum_m W[j][m] * colsum_m`. With this scale a
/// flat linear spectrum survives mel -> linear unchanged wherever bin `j` is
/// covered by at least one filter. When `|d_j| <= 1e-8` the raw `d_j` is
/// returned instead of its reciprocal.
fn inverse_scales(weights: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    let mut col_sums = vec![0.0_f64; cols];
    for row in weights.chunks_exact(cols).take(rows) {
        for (s, &w) in col_sums.iter_mut().zip(row) {
            *s += w;
        }
    }

    weights
        .chunks_exact(cols)
        .take(rows)
        .map(|row| {
            let d: f64 = row.iter().zip(&col_sums).map(|(&w, &s)| w * s).sum();
            if d.abs() > INVERSE_GUARD_EPSILON {
                1.0 / d
            } else {
                d
            }
        })
        .collect()
}

/// Build the mel-to-linear weight matrix (normalized transpose)
///
/// Shape `[num_mel_bins, num_spectrogram_bins]`.
///
/// # Errors
/// Same conditions as [`linear_to_mel_weights`].
pub fn mel_to_linear_weights(
    num_mel_bins: usize,
    num_spectrogram_bins: usize,
    sample_rate: u32,
    lower_edge_hz: f64,
    upper_edge_hz: f64,
) -> SpectralResult<MelWeightMatrix> {
    let params = MelParams::new(
        num_mel_bins,
        num_spectrogram_bins,
        sample_rate,
        lower_edge_hz,
        upper_edge_hz,
    );
    params.validate()?;
    let forward = forward_weights_f64(&params);
    Ok(inverse_from_forward(&forward, num_spectrogram_bins, num_mel_bins))
}

fn inverse_from_forward(forward: &[f64], s: usize, m: usize) -> MelWeightMatrix {
    let scales = inverse_scales(forward, s, m);
    let mut inverse = vec![0.0_f64; m * s];
    for j in 0..s {
        for mel in 0..m {
            inverse[mel * s + j] = forward[j * m + mel] * scales[j];
        }
    }
    MelWeightMatrix::from_f64(m, s, &inverse)
}

/// Forward and inverse matrices for one parameter set
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    params: MelParams,
    bands: Vec<MelBand>,
    forward: MelWeightMatrix,
    inverse: MelWeightMatrix,
}

impl MelFilterbank {
    /// Build both directions from one set of parameters
    ///
    /// # Errors
    /// Same conditions as [`linear_to_mel_weights`].
    pub fn new(params: MelParams) -> SpectralResult<Self> {
        let _span = crate::trace_enter!("mel_build");
        params.validate()?;

        let s = params.num_spectrogram_bins;
        let m = params.num_mel_bins;
        let forward_f64 = forward_weights_f64(&params);
        let forward = MelWeightMatrix::from_f64(s, m, &forward_f64);
        let inverse = inverse_from_forward(&forward_f64, s, m);

        crate::trace_event!(
            num_mel_bins = m,
            num_spectrogram_bins = s,
            "built mel filterbank"
        );

        Ok(Self {
            params,
            bands: mel_bands(&params),
            forward,
            inverse,
        })
    }

    /// Parameters this filterbank was built from
    #[must_use]
    pub const fn params(&self) -> &MelParams {
        &self.params
    }

    /// Filter edges in Hz (after widening)
    #[must_use]
    pub fn bands(&self) -> &[MelBand] {
        &self.bands
    }

    /// Linear-to-mel matrix `[num_spectrogram_bins, num_mel_bins]`
    #[must_use]
    pub const fn forward(&self) -> &MelWeightMatrix {
        &self.forward
    }

    /// Mel-to-linear matrix `[num_mel_bins, num_spectrogram_bins]`
    #[must_use]
    pub const fn inverse(&self) -> &MelWeightMatrix {
        &self.inverse
    }

    /// Number of filters widened to the minimum bandwidth
    #[must_use]
    pub fn widened_count(&self) -> usize {
        let edges = linspace(
            hz_to_mel(self.params.lower_edge_hz),
            hz_to_mel(self.params.upper_edge_hz),
            self.params.num_mel_bins + 2,
        );
        let threshold = self.params.min_bandwidth_hz();
        edges
            .windows(3)
            .filter(|w| mel_to_hz(w[2]) - mel_to_hz(w[0]) < threshold)
            .count()
    }
}

type FilterbankCache = Mutex<HashMap<MelKey, Arc<MelFilterbank>>>;

fn cache() -> &'static FilterbankCache {
    static CACHE: OnceLock<FilterbankCache> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Fetch (or build and memoize) the filterbank for `params`
///
/// Filterbanks depend only on their five scalars, so one instance is shared
/// process-wide per parameter set.
///
/// # Errors
/// Same conditions as [`linear_to_mel_weights`].
pub fn cached_filterbank(params: MelParams) -> SpectralResult<Arc<MelFilterbank>> {
    let key = params.key();
    if let Some(bank) = cache()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return Ok(Arc::clone(bank));
    }

    // Built outside the lock; a concurrent builder for the same key just
    // loses the insert race.
    let bank = Arc::new(MelFilterbank::new(params)?);
    let mut map = cache().lock().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(map.entry(key).or_insert(bank)))
}
