//! Phase unwrapping and instantaneous frequency
//!
//! Unwrapping removes the 2π jumps from a wrapped phase sequence:
//!
//! ```text
//! d[i]       = p[i+1] - p[i]
//! wrapped[i] = ((d[i] + π) mod 2π) - π        (floored modulo)
//! wrapped[i] = π   if wrapped[i] == -π and d[i] > 0
//! out[0]     = p[0]
//! out[i+1]   = p[i+1] + sum_{j<=i} (wrapped[j] - d[j])
//! ```
//!
//! Instantaneous frequency is the first difference of the unwrapped phase
//! divided by π, with the first unwrapped value itself standing in for the
//! first difference. [`integrate_instantaneous_frequency`] undoes it with a
//! cumulative sum, reproducing the unwrapped phase.
//!
//! Every operation runs along one axis of a [`Spectrogram`]; lanes are
//! independent, but values within a lane depend on every earlier value.

use std::f32::consts::PI;

use crate::spectrogram::{Axis, Spectrogram};

const TWO_PI: f32 = 2.0 * PI;

/// Wrap one phase difference into `(-π, π]`
#[inline]
#[must_use]
pub fn wrap_difference(diff: f32) -> f32 {
    let wrapped = (diff + PI).rem_euclid(TWO_PI) - PI;
    if wrapped == -PI && diff > 0.0 {
        PI
    } else {
        wrapped
    }
}

/// Unwrap a 1-D phase sequence
#[must_use]
pub fn unwrap_phase(phases: &[f32]) -> Vec<f32> {
    let mut out = phases.to_vec();
    unwrap_lane(&mut out, 1, phases.len(), 0);
    out
}

/// Unwrap in place the lane starting at `offset` with the given stride
fn unwrap_lane(data: &mut [f32], stride: usize, len: usize, offset: usize) {
    let mut correction = 0.0_f32;
    let mut prev = match len {
        0 => return,
        _ => data[offset],
    };
    for i in 1..len {
        let idx = offset + i * stride;
        let current = data[idx];
        let diff = current - prev;
        correction += wrap_difference(diff) - diff;
        data[idx] = current + correction;
        prev = current;
    }
}

/// Lane start offset and stride for `axis`
fn lane_layout(s: &Spectrogram, axis: Axis, lane: usize) -> (usize, usize) {
    let start = s.lane_index(axis, lane, 0);
    let stride = match axis {
        Axis::Time => s.bins(),
        Axis::Frequency => 1,
    };
    (start, stride)
}

/// Unwrap every lane of `phases` along `axis`
#[must_use]
pub fn unwrap(phases: &Spectrogram, axis: Axis) -> Spectrogram {
    let mut out = phases.clone();
    let (lanes, len) = out.lanes(axis);
    for lane in 0..lanes {
        let (start, stride) = lane_layout(&out, axis, lane);
        unwrap_lane(out.as_mut_slice(), stride, len, start);
    }
    out
}

/// Normalized instantaneous frequency along `axis`
///
/// Output has the same shape as the input; the first element of every lane
/// is the first unwrapped phase divided by π.
#[must_use]
pub fn instantaneous_frequency(phases: &Spectrogram, axis: Axis) -> Spectrogram {
    let mut out = unwrap(phases, axis);
    let (lanes, len) = out.lanes(axis);
    for lane in 0..lanes {
        let (start, stride) = lane_layout(&out, axis, lane);
        let data = out.as_mut_slice();
        // Walk backwards so each difference reads the untouched predecessor
        for i in (1..len).rev() {
            let idx = start + i * stride;
            data[idx] = (data[idx] - data[idx - stride]) / PI;
        }
        if len > 0 {
            data[start] /= PI;
        }
    }
    out
}

/// Invert [`instantaneous_frequency`]: cumulative sum of `if * π`
///
/// The result is the unwrapped phase, equal to the original phase modulo 2π.
#[must_use]
pub fn integrate_instantaneous_frequency(inst_freq: &Spectrogram, axis: Axis) -> Spectrogram {
    let mut out = inst_freq.clone();
    let (lanes, len) = out.lanes(axis);
    for lane in 0..lanes {
        let (start, stride) = lane_layout(&out, axis, lane);
        let data = out.as_mut_slice();
        let mut acc = 0.0_f32;
        for i in 0..len {
            let idx = start + i * stride;
            acc += data[idx] * PI;
            data[idx] = acc;
        }
    }
    out
}
