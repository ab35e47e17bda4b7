//! Short-time Fourier transform and its overlap-add inverse
//!
//! Framing follows the "no end padding" convention: a signal of `n` samples
//! yields `(n - frame_length) / frame_step + 1` frames, and the inverse of
//! `frames` frames is `frame_step * (frames - 1) + frame_length` samples
//! long. The FFT length equals the frame length, so a frame of `2F` samples
//! has `F + 1` one-sided bins (DC through Nyquist).
//!
//! The analysis window is a periodic Hann window. The inverse uses the
//! matching synthesis window
//!
//! ```text
//! s[n] = w[n] / sum_k w[(n mod step) + k * step]^2
//! ```
//!
//! which makes overlap-add reconstruct the input exactly wherever every
//! window offset contributes (everything except the first and last
//! `frame_length - frame_step` samples).

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::{SpectralError, SpectralResult};

/// Hann window of `size` samples
///
/// The periodic variant (`periodic = true`) divides by `size`, the symmetric
/// one by `size - 1`.
#[must_use]
pub fn hann_window(size: usize, periodic: bool) -> Vec<f32> {
    match size {
        0 => return Vec::new(),
        1 => return vec![1.0],
        _ => {}
    }
    let denom = if periodic { size } else { size - 1 } as f32;
    (0..size)
        .map(|n| 0.5 * (1.0 - (2.0 * PI * n as f32 / denom).cos()))
        .collect()
}

/// Synthesis window matched to a forward window and hop
///
/// Where the overlapped energy is zero (only possible where the forward
/// window itself is zero) the synthesis window is zero.
#[must_use]
pub fn inverse_stft_window(forward_window: &[f32], frame_step: usize) -> Vec<f32> {
    let step = frame_step.max(1);
    let mut denom = vec![0.0_f32; step];
    for (n, &w) in forward_window.iter().enumerate() {
        denom[n % step] += w * w;
    }
    forward_window
        .iter()
        .enumerate()
        .map(|(n, &w)| {
            let d = denom[n % step];
            if d > 0.0 {
                w / d
            } else {
                0.0
            }
        })
        .collect()
}

/// Complex STFT frames stored row-major as `[frames, bins]`
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexSpectrogram {
    frames: usize,
    bins: usize,
    data: Vec<Complex<f32>>,
}

impl ComplexSpectrogram {
    /// Zero-filled frames
    #[must_use]
    pub fn zeros(frames: usize, bins: usize) -> Self {
        Self {
            frames,
            bins,
            data: vec![Complex::new(0.0, 0.0); frames * bins],
        }
    }

    /// Number of frames
    #[must_use]
    pub const fn frames(&self) -> usize {
        self.frames
    }

    /// Bins per frame
    #[must_use]
    pub const fn bins(&self) -> usize {
        self.bins
    }

    /// One frame
    #[must_use]
    pub fn frame(&self, t: usize) -> &[Complex<f32>] {
        &self.data[t * self.bins..(t + 1) * self.bins]
    }

    /// One frame, mutably
    pub fn frame_mut(&mut self, t: usize) -> &mut [Complex<f32>] {
        &mut self.data[t * self.bins..(t + 1) * self.bins]
    }
}

/// Reusable forward/inverse STFT for one frame length and hop
#[derive(Clone)]
pub struct StftPlan {
    frame_length: usize,
    frame_step: usize,
    analysis_window: Vec<f32>,
    synthesis_window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for StftPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StftPlan")
            .field("frame_length", &self.frame_length)
            .field("frame_step", &self.frame_step)
            .finish_non_exhaustive()
    }
}

impl StftPlan {
    /// Plan transforms for `frame_length`-sample frames every `frame_step`
    ///
    /// # Errors
    /// Returns a config error if either length is zero or the hop exceeds
    /// the frame (which would leave gaps overlap-add cannot fill).
    pub fn new(frame_length: usize, frame_step: usize) -> SpectralResult<Self> {
        if frame_length == 0 || frame_step == 0 {
            return Err(SpectralError::config(format!(
                "STFT needs positive frame length and step, got {frame_length}/{frame_step}"
            )));
        }
        if frame_step > frame_length {
            return Err(SpectralError::config(format!(
                "frame_step {frame_step} exceeds frame_length {frame_length}"
            )));
        }

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(frame_length);
        let inverse = planner.plan_fft_inverse(frame_length);
        let analysis_window = hann_window(frame_length, true);
        let synthesis_window = inverse_stft_window(&analysis_window, frame_step);

        Ok(Self {
            frame_length,
            frame_step,
            analysis_window,
            synthesis_window,
            forward,
            inverse,
        })
    }

    /// Samples per frame
    #[must_use]
    pub const fn frame_length(&self) -> usize {
        self.frame_length
    }

    /// Hop between frames
    #[must_use]
    pub const fn frame_step(&self) -> usize {
        self.frame_step
    }

    /// One-sided bins per frame (DC through Nyquist)
    #[must_use]
    pub const fn bins(&self) -> usize {
        self.frame_length / 2 + 1
    }

    /// Periodic Hann analysis window
    #[must_use]
    pub fn analysis_window(&self) -> &[f32] {
        &self.analysis_window
    }

    /// Matching synthesis window
    #[must_use]
    pub fn synthesis_window(&self) -> &[f32] {
        &self.synthesis_window
    }

    /// Frames produced by a signal of `len` samples
    #[must_use]
    pub const fn num_frames(&self, len: usize) -> usize {
        if len < self.frame_length {
            0
        } else {
            (len - self.frame_length) / self.frame_step + 1
        }
    }

    /// Samples produced by overlap-adding `frames` frames
    #[must_use]
    pub const fn output_length(&self, frames: usize) -> usize {
        if frames == 0 {
            0
        } else {
            self.frame_step * (frames - 1) + self.frame_length
        }
    }

    /// Forward STFT, `[frames, bins]`
    #[must_use]
    pub fn stft(&self, signal: &[f32]) -> ComplexSpectrogram {
        let _span = crate::trace_enter!("stft");

        let frames = self.num_frames(signal.len());
        let bins = self.bins();
        let mut out = ComplexSpectrogram::zeros(frames, bins);
        let mut buffer = vec![Complex::new(0.0_f32, 0.0); self.frame_length];

        for t in 0..frames {
            let start = t * self.frame_step;
            let frame = &signal[start..start + self.frame_length];
            for ((b, &x), &w) in buffer.iter_mut().zip(frame).zip(&self.analysis_window) {
                *b = Complex::new(x * w, 0.0);
            }
            self.forward.process(&mut buffer);
            out.frame_mut(t).copy_from_slice(&buffer[..bins]);
        }

        out
    }

    /// Inverse STFT by windowed overlap-add
    ///
    /// Imaginary parts of the DC and Nyquist bins are ignored, as for a
    /// real inverse FFT.
    ///
    /// # Errors
    /// Returns a shape mismatch if the frames do not have [`Self::bins`] bins.
    pub fn istft(&self, spectrum: &ComplexSpectrogram) -> SpectralResult<Vec<f32>> {
        let _span = crate::trace_enter!("istft");

        let bins = self.bins();
        if spectrum.bins() != bins {
            return Err(SpectralError::shape(
                &[spectrum.frames(), bins],
                &[spectrum.frames(), spectrum.bins()],
            ));
        }

        let n = self.frame_length;
        let scale = 1.0 / n as f32;
        let mut output = vec![0.0_f32; self.output_length(spectrum.frames())];
        let mut buffer = vec![Complex::new(0.0_f32, 0.0); n];

        for t in 0..spectrum.frames() {
            let half = spectrum.frame(t);
            for (k, b) in buffer.iter_mut().enumerate() {
                *b = if k < bins { half[k] } else { half[n - k].conj() };
            }
            buffer[0].im = 0.0;
            if n % 2 == 0 {
                buffer[n / 2].im = 0.0;
            }

            self.inverse.process(&mut buffer);

            let start = t * self.frame_step;
            let out = &mut output[start..start + n];
            for ((o, b), &w) in out.iter_mut().zip(&buffer).zip(&self.synthesis_window) {
                *o += b.re * scale * w;
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signal(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32;
                0.5 * (t * 0.05).sin() + 0.3 * (t * 0.31 + 1.0).cos() + 0.1 * (t * 1.7).sin()
            })
            .collect()
    }

    #[test]
    fn test_hann_window_periodic() {
        let w = hann_window(8, true);
        assert!(w[0].abs() < 1e-7);
        assert!((w[4] - 1.0).abs() < 1e-6);
        // Periodic: w[n] == w[N - n]
        for n in 1..8 {
            assert!((w[n] - w[8 - n]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_hann_window_symmetric() {
        let w = hann_window(9, false);
        assert!(w[0].abs() < 1e-7);
        assert!(w[8].abs() < 1e-6);
        assert!((w[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_synthesis_window_cola_constant() {
        // Periodic Hann at 75% overlap: sum of squares is 1.5 everywhere
        let w = hann_window(16, true);
        let s = inverse_stft_window(&w, 4);
        for (wi, si) in w.iter().zip(&s) {
            assert!((si - wi / 1.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_synthesis_window_zero_overlap() {
        // No overlap: w / w^2 = 1 / w, and the zero at n = 0 stays zero
        let w = hann_window(8, true);
        let s = inverse_stft_window(&w, 8);
        assert!(s[0].abs() < f32::EPSILON);
        assert!((s[4] - 1.0).abs() < 1e-6);
        assert!((s[2] - 1.0 / w[2]).abs() < 1e-4);
    }

    #[test]
    fn test_plan_rejects_bad_framing() {
        assert!(StftPlan::new(0, 1).is_err());
        assert!(StftPlan::new(16, 0).is_err());
        assert!(StftPlan::new(16, 17).is_err());
    }

    #[test]
    fn test_frame_counts() {
        let plan = StftPlan::new(2048, 512).expect("plan");
        assert_eq!(plan.bins(), 1025);
        assert_eq!(plan.num_frames(67072), 128);
        assert_eq!(plan.num_frames(2047), 0);
        assert_eq!(plan.num_frames(2048), 1);
        assert_eq!(plan.output_length(128), 67072);
        assert_eq!(plan.output_length(0), 0);
    }

    #[test]
    fn test_stft_shape() {
        let plan = StftPlan::new(64, 16).expect("plan");
        let spec = plan.stft(&test_signal(64 + 16 * 9));
        assert_eq!(spec.frames(), 10);
        assert_eq!(spec.bins(), 33);
    }

    #[test]
    fn test_stft_tone_peaks_at_bin() {
        let n = 64;
        let bin = 5;
        let plan = StftPlan::new(n, 16).expect("plan");
        let signal: Vec<f32> = (0..n * 4)
            .map(|i| (2.0 * PI * bin as f32 * i as f32 / n as f32).cos())
            .collect();
        let spec = plan.stft(&signal);
        for t in 0..spec.frames() {
            let frame = spec.frame(t);
            let peak = frame
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
                .map(|(k, _)| k)
                .expect("non-empty frame");
            assert_eq!(peak, bin);
        }
    }

    #[test]
    fn test_perfect_reconstruction_interior() {
        let plan = StftPlan::new(64, 16).expect("plan");
        let frames = 20;
        let signal = test_signal(plan.output_length(frames));
        let spec = plan.stft(&signal);
        assert_eq!(spec.frames(), frames);

        let recon = plan.istft(&spec).expect("istft");
        assert_eq!(recon.len(), signal.len());

        let edge = plan.frame_length() - plan.frame_step();
        for i in edge..signal.len() - edge {
            assert!(
                (recon[i] - signal[i]).abs() < 1e-4,
                "sample {i}: {} vs {}",
                recon[i],
                signal[i]
            );
        }
    }

    #[test]
    fn test_perfect_reconstruction_half_overlap() {
        let plan = StftPlan::new(32, 16).expect("plan");
        let signal = test_signal(plan.output_length(12));
        let recon = plan.istft(&plan.stft(&signal)).expect("istft");
        for i in 16..signal.len() - 16 {
            assert!((recon[i] - signal[i]).abs() < 1e-4, "sample {i}");
        }
    }

    #[test]
    fn test_istft_bin_mismatch() {
        let plan = StftPlan::new(32, 8).expect("plan");
        let wrong = ComplexSpectrogram::zeros(4, 16);
        assert!(matches!(
            plan.istft(&wrong),
            Err(SpectralError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_istft_silence() {
        let plan = StftPlan::new(32, 8).expect("plan");
        let recon = plan.istft(&ComplexSpectrogram::zeros(6, 17)).expect("istft");
        assert_eq!(recon.len(), 8 * 5 + 32);
        assert!(recon.iter().all(|&x| x == 0.0));
    }
}
